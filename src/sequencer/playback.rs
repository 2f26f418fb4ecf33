/// Playback - the looping clock and the controller that drives it
use crate::error::{DrumError, Result};
use crate::sequencer::timeline::{NoteEvent, Timeline, NOTE_VELOCITY, TICKS_PER_BEAT};
use crate::sequencer::TrackList;
use log::{debug, error, info, warn};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::mpsc::{sync_channel, Receiver, SyncSender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackEvent {
    StepAdvanced(u64),
    NoteOn(u8, u8), // voice, velocity
    NoteOff(u8),    // voice
}

/// Somewhere the clock can send drum hits (a MIDI port, a preview synth)
pub trait VoiceOutput: Send {
    fn play(&mut self, event: &NoteEvent);
}

/// Sound engine collaborator driven by [`PlaybackController`]
pub trait Engine {
    /// Acquire whatever the engine needs to make sound
    fn open_resource(&mut self) -> Result<()>;
    /// Release it again; called on stop and after a failed start
    fn close_resource(&mut self) {}
    fn set_tempo(&mut self, bpm: u32);
    fn set_loop_infinite(&mut self);
    fn load_timeline(&mut self, timeline: Timeline);
    fn start(&mut self) -> Result<()>;
    fn stop(&mut self);
    fn is_running(&self) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    #[default]
    Stopped,
    Running,
}

/// STOPPED/RUNNING state machine over an [`Engine`].
///
/// The engine resource is held only while running. The engine plays a copy
/// of the timeline taken at `start`, so edits made to a `TrackList` while
/// running are not heard until the next start. Front ends should go through
/// [`Session`](crate::session::Session), which stops playback before every
/// structural edit.
pub struct PlaybackController<E: Engine> {
    engine: E,
    state: PlaybackState,
}

impl<E: Engine> PlaybackController<E> {
    pub fn new(engine: E) -> Self {
        Self {
            engine,
            state: PlaybackState::Stopped,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == PlaybackState::Running
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn start(&mut self, tracks: &TrackList) -> Result<()> {
        if self.is_running() {
            return Ok(());
        }

        if let Err(err) = self.launch(tracks) {
            error!("Failed to start playback: {}", err);
            self.engine.close_resource();
            return Err(err);
        }

        self.state = PlaybackState::Running;
        info!(
            "Playback started at {} bpm with {} tracks",
            tracks.bpm(),
            tracks.len()
        );
        Ok(())
    }

    fn launch(&mut self, tracks: &TrackList) -> Result<()> {
        self.engine.open_resource()?;
        self.engine.set_tempo(tracks.bpm());
        self.engine.set_loop_infinite();
        self.engine.load_timeline(tracks.timeline().clone());
        self.engine.start()
    }

    pub fn stop(&mut self) {
        if !self.is_running() {
            return;
        }
        self.engine.stop();
        self.engine.close_resource();
        self.state = PlaybackState::Stopped;
        info!("Playback stopped");
    }

    /// Retime the running clock without restarting it
    pub fn change_tempo(&mut self, bpm: u32) {
        if self.is_running() {
            debug!("Changing tempo to {} bpm while running", bpm);
            self.engine.set_tempo(bpm);
        }
    }
}

impl<E: Engine> Drop for PlaybackController<E> {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Duration of one tick at the given tempo
pub fn tick_duration(bpm: u32) -> Duration {
    let ticks_per_second = bpm.max(1) as f64 / 60.0 * TICKS_PER_BEAT as f64;
    Duration::from_secs_f64(1.0 / ticks_per_second)
}

/// Playback events kept for a UI that has not polled yet; newer ones are dropped
pub const EVENT_QUEUE: usize = 256;

pub type OutputConnector = Box<dyn FnMut() -> Result<Box<dyn VoiceOutput>>>;

type SharedOutput = Arc<Mutex<Box<dyn VoiceOutput>>>;

/// Looping clock running on its own thread.
///
/// The voice output is acquired through the connector in `open_resource`
/// and dropped in `close_resource`. The clock thread plays a snapshot of the
/// loaded timeline and publishes progress on a channel for UIs to poll.
pub struct ClockEngine {
    connect: OutputConnector,
    output: Option<SharedOutput>,
    timeline: Arc<Timeline>,
    bpm: Arc<AtomicU32>,
    looping: bool,
    is_running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
    sender: SyncSender<PlaybackEvent>,
    receiver: Receiver<PlaybackEvent>,
}

impl ClockEngine {
    pub fn new(connect: OutputConnector) -> Self {
        let (sender, receiver) = sync_channel(EVENT_QUEUE);

        Self {
            connect,
            output: None,
            timeline: Arc::new(Timeline::default()),
            bpm: Arc::new(AtomicU32::new(120)),
            looping: false,
            is_running: Arc::new(AtomicBool::new(false)),
            handle: None,
            sender,
            receiver,
        }
    }

    pub fn poll_events(&self) -> Vec<PlaybackEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.receiver.try_recv() {
            events.push(event);
        }
        events
    }
}

impl Engine for ClockEngine {
    fn open_resource(&mut self) -> Result<()> {
        if self.output.is_none() {
            let output = (self.connect)()?;
            self.output = Some(Arc::new(Mutex::new(output)));
        }
        Ok(())
    }

    fn close_resource(&mut self) {
        self.stop();
        self.output = None;
        self.looping = false;
    }

    fn set_tempo(&mut self, bpm: u32) {
        self.bpm.store(bpm.max(1), Ordering::Relaxed);
    }

    fn set_loop_infinite(&mut self) {
        self.looping = true;
    }

    fn load_timeline(&mut self, timeline: Timeline) {
        self.timeline = Arc::new(timeline);
    }

    fn start(&mut self) -> Result<()> {
        if self.is_running() {
            return Ok(());
        }
        // A finished single-pass run leaves a handle behind
        self.stop();
        // Steps from the previous run must not reach the UI
        while self.receiver.try_recv().is_ok() {}

        let output = self
            .output
            .clone()
            .ok_or_else(|| DrumError::EngineUnavailable("voice output is not open".into()))?;

        self.is_running.store(true, Ordering::Release);
        let clock = Clock {
            timeline: Arc::clone(&self.timeline),
            bpm: Arc::clone(&self.bpm),
            looping: self.looping,
            is_running: Arc::clone(&self.is_running),
            output,
            sender: self.sender.clone(),
        };

        let spawned = thread::Builder::new()
            .name("drumloop-clock".into())
            .spawn(move || clock.run());

        match spawned {
            Ok(handle) => {
                self.handle = Some(handle);
                Ok(())
            }
            Err(err) => {
                self.is_running.store(false, Ordering::Release);
                Err(DrumError::EngineUnavailable(format!(
                    "failed to spawn clock thread: {}",
                    err
                )))
            }
        }
    }

    fn stop(&mut self) {
        self.is_running.store(false, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("Clock thread panicked");
            }
        }
    }

    fn is_running(&self) -> bool {
        self.is_running.load(Ordering::Acquire)
    }
}

impl Drop for ClockEngine {
    fn drop(&mut self) {
        self.stop();
    }
}

struct Clock {
    timeline: Arc<Timeline>,
    bpm: Arc<AtomicU32>,
    looping: bool,
    is_running: Arc<AtomicBool>,
    output: SharedOutput,
    sender: SyncSender<PlaybackEvent>,
}

impl Clock {
    fn run(self) {
        let max_tick = self.timeline.max_tick();
        let mut tick = 1;
        let mut next_tick_at = Instant::now();

        while self.is_running.load(Ordering::Acquire) {
            let now = Instant::now();

            if now >= next_tick_at {
                if max_tick == 0 && !self.looping {
                    break;
                }
                if max_tick > 0 {
                    self.fire(tick);
                    if tick >= max_tick {
                        if !self.looping {
                            break;
                        }
                        tick = 1;
                    } else {
                        tick += 1;
                    }
                }

                // Tempo is re-read every tick so changes apply mid-loop
                next_tick_at += tick_duration(self.bpm.load(Ordering::Relaxed));
                if next_tick_at < now {
                    next_tick_at = now;
                }
            }

            thread::sleep(Duration::from_millis(1));
        }

        self.release_voices();
        self.is_running.store(false, Ordering::Release);
    }

    fn publish(&self, event: PlaybackEvent) {
        // Nobody may be polling; a full queue just drops the event
        let _ = self.sender.try_send(event);
    }

    fn fire(&self, tick: u64) {
        self.publish(PlaybackEvent::StepAdvanced(tick));

        let mut output = self.output.lock().unwrap_or_else(PoisonError::into_inner);
        for event in self.timeline.events_at(tick) {
            output.play(event);
            if event.on {
                self.publish(PlaybackEvent::NoteOn(event.voice, NOTE_VELOCITY));
            } else {
                self.publish(PlaybackEvent::NoteOff(event.voice));
            }
        }
    }

    fn release_voices(&self) {
        let voices: BTreeSet<u8> = self.timeline.events().map(|event| event.voice).collect();
        let mut output = self.output.lock().unwrap_or_else(PoisonError::into_inner);
        for voice in voices {
            output.play(&NoteEvent {
                voice,
                on: false,
                tick: 0,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequencer::instrument::Instrument;

    #[derive(Default)]
    struct MockEngine {
        calls: Vec<String>,
        fail_open: bool,
        running: bool,
    }

    impl Engine for MockEngine {
        fn open_resource(&mut self) -> Result<()> {
            self.calls.push("open".into());
            if self.fail_open {
                return Err(DrumError::EngineUnavailable("no device".into()));
            }
            Ok(())
        }

        fn close_resource(&mut self) {
            self.calls.push("close".into());
        }

        fn set_tempo(&mut self, bpm: u32) {
            self.calls.push(format!("tempo {}", bpm));
        }

        fn set_loop_infinite(&mut self) {
            self.calls.push("loop".into());
        }

        fn load_timeline(&mut self, timeline: Timeline) {
            self.calls.push(format!("load {}", timeline.len()));
        }

        fn start(&mut self) -> Result<()> {
            self.calls.push("start".into());
            self.running = true;
            Ok(())
        }

        fn stop(&mut self) {
            self.calls.push("stop".into());
            self.running = false;
        }

        fn is_running(&self) -> bool {
            self.running
        }
    }

    #[derive(Clone, Default)]
    struct RecordingOutput {
        notes: Arc<Mutex<Vec<(bool, u8)>>>,
    }

    impl VoiceOutput for RecordingOutput {
        fn play(&mut self, event: &NoteEvent) {
            self.notes.lock().unwrap().push((event.on, event.voice));
        }
    }

    fn recording_engine() -> (ClockEngine, RecordingOutput) {
        let output = RecordingOutput::default();
        let handle = output.clone();
        let engine = ClockEngine::new(Box::new(move || -> Result<Box<dyn VoiceOutput>> {
            Ok(Box::new(handle.clone()))
        }));
        (engine, output)
    }

    fn kick_track_list() -> TrackList {
        let mut tracks = TrackList::new(120).unwrap();
        tracks.add_instrument(Instrument::new(35, "x-x-").unwrap());
        tracks
    }

    #[test]
    fn test_start_stop_sequence() {
        let mut playback = PlaybackController::new(MockEngine::default());
        let tracks = kick_track_list();

        playback.start(&tracks).unwrap();
        assert_eq!(playback.state(), PlaybackState::Running);
        // second start is a no-op
        playback.start(&tracks).unwrap();

        playback.stop();
        assert_eq!(playback.state(), PlaybackState::Stopped);
        playback.stop();

        assert_eq!(
            playback.engine().calls,
            vec!["open", "tempo 120", "loop", "load 4", "start", "stop", "close"]
        );
    }

    #[test]
    fn test_change_tempo_keeps_running() {
        let mut playback = PlaybackController::new(MockEngine::default());
        let tracks = kick_track_list();

        playback.change_tempo(90);
        assert!(playback.engine().calls.is_empty());

        playback.start(&tracks).unwrap();
        playback.change_tempo(90);
        assert!(playback.is_running());
        assert_eq!(playback.engine().calls.last().unwrap(), "tempo 90");
        assert!(!playback.engine().calls.iter().any(|call| call == "stop"));
    }

    #[test]
    fn test_engine_unavailable() {
        let engine = MockEngine {
            fail_open: true,
            ..Default::default()
        };
        let mut playback = PlaybackController::new(engine);

        let err = playback.start(&kick_track_list()).unwrap_err();
        assert!(matches!(err, DrumError::EngineUnavailable(_)));
        assert_eq!(playback.state(), PlaybackState::Stopped);
        assert_eq!(playback.engine().calls, vec!["open", "close"]);
    }

    #[test]
    fn test_tick_duration() {
        assert_eq!(tick_duration(120), Duration::from_millis(125));
        assert_eq!(tick_duration(60), Duration::from_millis(250));
    }

    #[test]
    fn test_clock_requires_open_output() {
        let (mut engine, _output) = recording_engine();
        assert!(matches!(
            engine.start(),
            Err(DrumError::EngineUnavailable(_))
        ));
        assert!(!engine.is_running());
    }

    #[test]
    fn test_connector_failure_surfaces() {
        let engine = ClockEngine::new(Box::new(|| -> Result<Box<dyn VoiceOutput>> {
            Err(DrumError::EngineUnavailable("no audio device".into()))
        }));
        let mut playback = PlaybackController::new(engine);

        let err = playback.start(&kick_track_list()).unwrap_err();
        assert!(matches!(err, DrumError::EngineUnavailable(_)));
        assert!(!playback.is_running());
        assert!(!playback.engine().is_running());
    }

    #[test]
    fn test_clock_loops_pattern() {
        let (engine, output) = recording_engine();
        let mut playback = PlaybackController::new(engine);
        let mut tracks = kick_track_list();
        tracks.set_tempo(3000).unwrap();

        playback.start(&tracks).unwrap();
        thread::sleep(Duration::from_millis(200));
        assert!(playback.engine().is_running());
        playback.stop();
        assert!(!playback.engine().is_running());

        let notes = output.notes.lock().unwrap().clone();
        // more than one pass through the 4-step loop
        assert!(notes.len() > 5, "only {} notes played", notes.len());
        assert_eq!(
            &notes[..5],
            &[(true, 35), (false, 35), (true, 35), (false, 35), (true, 35)]
        );

        let steps: Vec<u64> = playback
            .engine()
            .poll_events()
            .into_iter()
            .filter_map(|event| match event {
                PlaybackEvent::StepAdvanced(tick) => Some(tick),
                _ => None,
            })
            .collect();
        assert_eq!(&steps[..5], &[1, 2, 3, 4, 1]);
    }

    #[test]
    fn test_single_pass_without_loop() {
        let (mut engine, output) = recording_engine();
        engine.set_tempo(3000);
        engine.load_timeline(Timeline::build(&[Instrument::new(38, "x-").unwrap()]));
        engine.open_resource().unwrap();
        engine.start().unwrap();

        thread::sleep(Duration::from_millis(200));
        assert!(!engine.is_running());
        engine.close_resource();

        let notes = output.notes.lock().unwrap().clone();
        // two steps, then the release of the held voice
        assert_eq!(notes, vec![(true, 38), (false, 38), (false, 38)]);
    }

    #[test]
    fn test_silent_loop_runs() {
        let (engine, output) = recording_engine();
        let mut playback = PlaybackController::new(engine);
        let tracks = TrackList::new(120).unwrap();

        playback.start(&tracks).unwrap();
        thread::sleep(Duration::from_millis(20));
        assert!(playback.engine().is_running());
        playback.stop();
        assert!(output.notes.lock().unwrap().is_empty());
    }

    fn steps_of(events: Vec<PlaybackEvent>) -> Vec<u64> {
        events
            .into_iter()
            .filter_map(|event| match event {
                PlaybackEvent::StepAdvanced(tick) => Some(tick),
                _ => None,
            })
            .collect()
    }

    fn busy_track_list(bpm: u32, steps: usize) -> TrackList {
        let mut tracks = TrackList::new(bpm).unwrap();
        for code in 35..43 {
            tracks.add_instrument(Instrument::new(code, "x-".repeat(steps / 2)).unwrap());
        }
        tracks
    }

    #[test]
    fn test_unpolled_events_stay_bounded() {
        let (engine, _output) = recording_engine();
        let mut playback = PlaybackController::new(engine);

        playback.start(&busy_track_list(6000, 16)).unwrap();
        thread::sleep(Duration::from_millis(300));
        playback.stop();

        let events = playback.engine().poll_events();
        assert!(events.len() <= EVENT_QUEUE, "{} events queued", events.len());
        // the oldest events are the ones kept
        assert_eq!(events[0], PlaybackEvent::StepAdvanced(1));
    }

    #[test]
    fn test_restart_begins_at_first_tick() {
        let (engine, output) = recording_engine();
        let mut playback = PlaybackController::new(engine);
        let tracks = busy_track_list(6000, 16);

        playback.start(&tracks).unwrap();
        thread::sleep(Duration::from_millis(100));
        playback.stop();
        output.notes.lock().unwrap().clear();

        playback.start(&tracks).unwrap();
        thread::sleep(Duration::from_millis(30));
        playback.stop();

        let steps = steps_of(playback.engine().poll_events());
        assert!(!steps.is_empty());
        assert_eq!(steps[0], 1);
        for pair in steps.windows(2) {
            assert_eq!(pair[1], pair[0] % 16 + 1, "stale steps after restart: {:?}", steps);
        }

        // second run opened on tick 1: every voice hits first
        let notes = output.notes.lock().unwrap().clone();
        let first_tick: Vec<(bool, u8)> = (35..43).map(|code| (true, code)).collect();
        assert_eq!(&notes[..8], first_tick.as_slice());
    }

    #[test]
    fn test_tempo_change_keeps_position() {
        let (engine, _output) = recording_engine();
        let mut playback = PlaybackController::new(engine);
        let mut tracks = TrackList::new(3000).unwrap();
        tracks.add_instrument(Instrument::new(42, "x".repeat(64)).unwrap());

        playback.start(&tracks).unwrap();
        thread::sleep(Duration::from_millis(40));
        let before = steps_of(playback.engine().poll_events());
        playback.change_tempo(6000);
        thread::sleep(Duration::from_millis(40));
        playback.stop();
        let after = steps_of(playback.engine().poll_events());

        assert!(before.len() >= 2, "clock barely ran: {:?}", before);
        assert!(!after.is_empty(), "clock stalled after tempo change");

        // one unbroken walk through the loop, no jump back to the start
        let steps: Vec<u64> = before.iter().chain(after.iter()).copied().collect();
        assert_eq!(steps[0], 1);
        for pair in steps.windows(2) {
            assert_eq!(pair[1], pair[0] % 64 + 1, "step sequence broke: {:?}", steps);
        }
    }
}
