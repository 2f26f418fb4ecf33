// End-to-end checks against the public API: track list edits, timeline
// derivation, playback control and the JSON round trip.

use drumloop::{
    Command, Config, DrumError, Engine, Instrument, JsonStore, NoteEvent, Session, Timeline,
    TrackList,
};
use tempfile::tempdir;

#[derive(Default)]
struct SilentEngine {
    running: bool,
}

impl Engine for SilentEngine {
    fn open_resource(&mut self) -> drumloop::Result<()> {
        Ok(())
    }
    fn set_tempo(&mut self, _bpm: u32) {}
    fn set_loop_infinite(&mut self) {}
    fn load_timeline(&mut self, _timeline: Timeline) {}
    fn start(&mut self) -> drumloop::Result<()> {
        self.running = true;
        Ok(())
    }
    fn stop(&mut self) {
        self.running = false;
    }
    fn is_running(&self) -> bool {
        self.running
    }
}

fn event(voice: u8, on: bool, tick: u64) -> NoteEvent {
    NoteEvent { voice, on, tick }
}

#[test]
fn empty_track_list_plays_silence() {
    let dir = tempdir().unwrap();
    let config = Config {
        store_path: dir.path().join("a.json"),
        ..Config::default()
    };
    let mut session = Session::new(&config, SilentEngine::default()).unwrap();

    assert_eq!(session.tracks().bpm(), 120);
    assert!(session.tracks().timeline().is_empty());
    session.dispatch(Command::Start).unwrap();
    assert!(session.is_playing());
}

#[test]
fn single_instrument_block() {
    let mut tracks = TrackList::new(120).unwrap();
    tracks.add_instrument(Instrument::new(35, "x-x-").unwrap());

    assert_eq!(
        tracks.timeline().blocks()[0],
        vec![
            event(35, true, 1),
            event(35, false, 2),
            event(35, true, 3),
            event(35, false, 4),
        ]
    );
}

#[test]
fn removing_first_instrument_leaves_second() {
    let mut tracks = TrackList::new(120).unwrap();
    let a = Instrument::new(35, "x---").unwrap();
    let b = Instrument::new(42, "x-x-x-x-").unwrap();
    tracks.add_instrument(a);
    tracks.add_instrument(b.clone());

    tracks.remove_instrument(0).unwrap();
    assert_eq!(tracks.instruments(), &[b.clone()]);
    assert_eq!(tracks.timeline(), &Timeline::build(&[b]));
    assert!(tracks.timeline().events().all(|e| e.voice == 42));
}

#[test]
fn zero_tempo_is_rejected() {
    let mut tracks = TrackList::new(100).unwrap();
    assert!(matches!(tracks.set_tempo(0), Err(DrumError::InvalidTempo(_))));
    assert_eq!(tracks.bpm(), 100);
}

#[test]
fn stored_track_list_round_trips() {
    let dir = tempdir().unwrap();
    let store = JsonStore::new(dir.path().join("e.json"));

    let mut tracks = TrackList::new(85).unwrap();
    tracks.add_instrument(Instrument::new(35, "x-x-").unwrap());
    tracks.add_instrument(Instrument::new(60, "-x-x").unwrap());
    store.write(&tracks).unwrap();

    let loaded = store.read().unwrap();
    assert_eq!(loaded.bpm(), 85);
    let pairs: Vec<(u8, &str)> = loaded
        .instruments()
        .iter()
        .map(|i| (i.code(), i.pattern()))
        .collect();
    assert_eq!(pairs, vec![(35, "x-x-"), (60, "-x-x")]);
}

#[test]
fn removal_drops_one_event_per_step() {
    let patterns = ["x-x-", "", "xxxxxxxxxxxxxxxx", "-x", "x?x?x"];
    for index in 0..patterns.len() {
        let mut tracks = TrackList::new(120).unwrap();
        for (n, pattern) in patterns.iter().enumerate() {
            tracks.add_instrument(Instrument::new(35 + n as i64, *pattern).unwrap());
        }

        let before = tracks.timeline().len();
        let removed = tracks.remove_instrument(index).unwrap();
        assert_eq!(tracks.len(), patterns.len() - 1);
        assert_eq!(tracks.timeline().len(), before - removed.step_count());

        let codes: Vec<u8> = tracks.instruments().iter().map(|i| i.code()).collect();
        let expected: Vec<u8> = (0..patterns.len())
            .filter(|n| *n != index)
            .map(|n| 35 + n as u8)
            .collect();
        assert_eq!(codes, expected);
    }
}
