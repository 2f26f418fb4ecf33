#[cfg(feature = "gui")]
use eframe::egui;

use drumloop::{
    AudioOutput, AudioVoice, ClockEngine, Config, DrumError, MidiOutputDevice, OutputConnector,
    Session, VoiceOutput,
};
use log::warn;
use std::cell::Cell;
use std::rc::Rc;

#[cfg(feature = "gui")]
use drumloop::{voice_label, voices, Command, Instrument, PlaybackEvent};

#[cfg(feature = "gui")]
const NEW_ROW_PATTERN: &str = "----------------";

/// Connects the clock to the selected MIDI port, falling back to the preview voice
fn output_connector(
    selected_port: Rc<Cell<Option<usize>>>,
    audio: Option<AudioVoice>,
) -> OutputConnector {
    Box::new(move || -> drumloop::Result<Box<dyn VoiceOutput>> {
        if let Some(port) = selected_port.get() {
            return Ok(Box::new(MidiOutputDevice::open(port)?));
        }
        match &audio {
            Some(voice) => Ok(Box::new(voice.clone())),
            None => Err(DrumError::EngineUnavailable(
                "no MIDI port selected and no audio device".into(),
            )),
        }
    })
}

fn open_preview_audio() -> Option<AudioOutput> {
    match AudioOutput::new() {
        Ok(audio) => Some(audio),
        Err(err) => {
            warn!("Preview audio disabled: {}", err);
            None
        }
    }
}

/// Tempo edit from the slider, or `None` when the value did not really change
#[cfg(feature = "gui")]
fn tempo_command(current: u32, edited: u32) -> Option<Command> {
    (edited != current && edited > 0).then_some(Command::SetTempo(edited))
}

#[cfg(feature = "gui")]
fn main() -> Result<(), eframe::Error> {
    env_logger::init();

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([900.0, 600.0])
            .with_title("DRUMLOOP - Drum Machine"),
        ..Default::default()
    };

    eframe::run_native(
        "DRUMLOOP",
        options,
        Box::new(|_cc| Ok(Box::new(DrumMachineApp::new(Config::from_env())?))),
    )
}

#[cfg(feature = "gui")]
struct DrumMachineApp {
    session: Session<ClockEngine>,
    _audio_output: Option<AudioOutput>,

    // UI state
    available_midi_ports: Vec<String>,
    selected_port: Rc<Cell<Option<usize>>>,
    current_tick: u64,
    status: Option<String>,
}

#[cfg(feature = "gui")]
impl DrumMachineApp {
    fn new(config: Config) -> Result<Self, DrumError> {
        let audio_output = open_preview_audio();
        let selected_port = Rc::new(Cell::new(None));
        let engine = ClockEngine::new(output_connector(
            Rc::clone(&selected_port),
            audio_output.as_ref().map(AudioOutput::voice),
        ));

        Ok(Self {
            session: Session::new(&config, engine)?,
            _audio_output: audio_output,
            available_midi_ports: MidiOutputDevice::available_ports(),
            selected_port,
            current_tick: 0,
            status: None,
        })
    }

    fn handle_playback_events(&mut self) {
        for event in self.session.playback().engine().poll_events() {
            if let PlaybackEvent::StepAdvanced(tick) = event {
                self.current_tick = tick;
            }
        }
    }

    fn run(&mut self, command: Command) {
        match self.session.dispatch(command) {
            Ok(()) => self.status = None,
            Err(err) => {
                warn!("{}", err);
                self.status = Some(err.to_string());
            }
        }
    }
}

#[cfg(feature = "gui")]
impl eframe::App for DrumMachineApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        ctx.request_repaint();

        self.handle_playback_events();

        let mut commands = Vec::new();

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.heading("DRUMLOOP - Drum Machine");
            ui.add_space(10.0);

            // MIDI Port Selection
            ui.horizontal(|ui| {
                ui.label("MIDI Output:");
                if self.available_midi_ports.is_empty() {
                    ui.label("No MIDI ports available");
                } else {
                    let selected = self.selected_port.get();
                    egui::ComboBox::from_id_source("midi_port")
                        .selected_text(
                            selected
                                .map(|i| self.available_midi_ports[i].as_str())
                                .unwrap_or("Preview audio"),
                        )
                        .show_ui(ui, |ui| {
                            if ui.selectable_label(selected.is_none(), "Preview audio").clicked() {
                                self.selected_port.set(None);
                            }
                            for (i, port_name) in self.available_midi_ports.iter().enumerate() {
                                if ui.selectable_label(selected == Some(i), port_name).clicked() {
                                    self.selected_port.set(Some(i));
                                }
                            }
                        });
                }
            });

            ui.add_space(10.0);

            // Transport controls
            ui.horizontal(|ui| {
                if self.session.is_playing() {
                    if ui.button("⏸ Stop").clicked() {
                        commands.push(Command::Stop);
                    }
                } else if ui.button("▶ Play").clicked() {
                    commands.push(Command::Start);
                }

                ui.add_space(20.0);

                ui.label("BPM:");
                let current = self.session.tracks().bpm();
                let mut bpm = current;
                // Loaded files may carry any positive tempo; the slider must not rewrite it
                let slider = egui::Slider::new(&mut bpm, 20..=300).clamp_to_range(false);
                if ui.add(slider).changed() {
                    commands.extend(tempo_command(current, bpm));
                }

                ui.add_space(20.0);

                if ui.button("Save").clicked() {
                    commands.push(Command::Save);
                }
                if ui.button("Load").clicked() {
                    commands.push(Command::Load);
                }
            });

            ui.add_space(20.0);

            let is_playing = self.session.is_playing();

            for (row, instrument) in self.session.tracks().instruments().iter().enumerate() {
                ui.horizontal(|ui| {
                    egui::ComboBox::from_id_source(("voice", row))
                        .width(180.0)
                        .selected_text(voice_label(instrument.code()))
                        .show_ui(ui, |ui| {
                            for (code, _) in voices() {
                                let chosen = ui
                                    .selectable_label(code == instrument.code(), voice_label(code))
                                    .clicked();
                                if chosen && code != instrument.code() {
                                    let mut edited = instrument.clone();
                                    if edited.replace_code(i64::from(code)).is_ok() {
                                        commands.push(Command::ReplaceInstrument(row, edited));
                                    }
                                }
                            }
                        });

                    for (position, step) in instrument.steps().enumerate() {
                        let is_current = is_playing && self.current_tick == position as u64 + 1;
                        let fill = if is_current {
                            egui::Color32::from_rgb(100, 200, 100)
                        } else if step == drumloop::Step::Hit {
                            egui::Color32::from_rgb(60, 60, 200)
                        } else {
                            egui::Color32::from_rgb(40, 40, 40)
                        };

                        let button = egui::Button::new("")
                            .min_size(egui::vec2(28.0, 28.0))
                            .fill(fill);

                        if ui.add(button).clicked() {
                            commands.push(Command::ReplaceInstrument(
                                row,
                                instrument.with_step_toggled(position),
                            ));
                        }
                    }

                    if ui.button("✖").clicked() {
                        commands.push(Command::RemoveInstrument(row));
                    }
                });
            }

            ui.add_space(10.0);
            if ui.button("Add Instrument").clicked() {
                match Instrument::new(35, NEW_ROW_PATTERN) {
                    Ok(instrument) => commands.push(Command::AddInstrument(instrument)),
                    Err(err) => self.status = Some(err.to_string()),
                }
            }

            // Info
            ui.separator();
            ui.label("Click steps to toggle hits. Editing stops playback.");
            if let Some(status) = &self.status {
                ui.colored_label(egui::Color32::YELLOW, format!("⚠ {}", status));
            }
        });

        for command in commands {
            self.run(command);
        }
    }
}

#[cfg(not(feature = "gui"))]
fn main() {
    env_logger::init();

    let config = Config::from_env();
    let audio_output = open_preview_audio();
    let selected_port = Rc::new(Cell::new(None));
    let engine = ClockEngine::new(output_connector(
        Rc::clone(&selected_port),
        audio_output.as_ref().map(AudioOutput::voice),
    ));

    let session = match Session::new(&config, engine) {
        Ok(session) => session,
        Err(err) => {
            eprintln!("{}", err);
            std::process::exit(1);
        }
    };

    text_menu::run(session, &selected_port);
}

#[cfg(not(feature = "gui"))]
mod text_menu {
    use drumloop::{
        voice_code, voice_label, voices, ClockEngine, Command, Instrument, MidiOutputDevice,
        Session,
    };
    use std::cell::Cell;
    use std::io::{self, BufRead, Write};

    pub fn run(mut session: Session<ClockEngine>, selected_port: &Cell<Option<usize>>) {
        let stdin = io::stdin();
        let mut lines = stdin.lock().lines();

        loop {
            print_tracks(&session);
            print_menu();

            let Some(choice) = prompt(&mut lines, "> ") else {
                break;
            };

            let command = match choice.trim().to_lowercase().as_str() {
                "q" => break,
                "a" => read_instrument(&mut lines).map(Command::AddInstrument),
                "r" => read_index(&mut lines, &session).map(Command::RemoveInstrument),
                "m" => read_index(&mut lines, &session).and_then(|index| {
                    read_instrument(&mut lines).map(|i| Command::ReplaceInstrument(index, i))
                }),
                "b" => read_bpm(&mut lines).map(Command::SetTempo),
                "p" => Some(Command::Start),
                "s" => Some(Command::Stop),
                "w" => Some(Command::Save),
                "l" => Some(Command::Load),
                "o" => {
                    choose_port(&mut lines, selected_port);
                    None
                }
                _ => {
                    println!("Selection not valid");
                    None
                }
            };

            if let Some(command) = command {
                if let Err(err) = session.dispatch(command) {
                    println!("Error: {}", err);
                }
            }
        }

        session.stop();
    }

    fn prompt<B: BufRead>(lines: &mut io::Lines<B>, text: &str) -> Option<String> {
        print!("{}", text);
        let _ = io::stdout().flush();
        lines.next().and_then(|line| line.ok())
    }

    fn print_menu() {
        println!("\nSelect from:");
        println!("\ta -> add track");
        println!("\tr -> remove track");
        println!("\tm -> modify track");
        println!("\tp -> play the loop");
        println!("\ts -> stop the loop");
        println!("\tb -> change the bpm");
        println!("\to -> choose output");
        println!("\tw -> save");
        println!("\tl -> load");
        println!("\tq -> quit");
    }

    fn print_tracks(session: &Session<ClockEngine>) {
        let tracks = session.tracks();
        println!(
            "\nBPM: {}{}",
            tracks.bpm(),
            if session.is_playing() { " (playing)" } else { "" }
        );
        for (i, instrument) in tracks.instruments().iter().enumerate() {
            println!(
                "{:>3}. {:<24} {}",
                i + 1,
                voice_label(instrument.code()),
                instrument.pattern()
            );
        }
    }

    fn read_instrument<B: BufRead>(lines: &mut io::Lines<B>) -> Option<Instrument> {
        for (code, name) in voices() {
            println!("  {:>2} {}", code, name);
        }
        let voice = prompt(lines, "Instrument (name or number): ")?;
        let code = voice
            .trim()
            .parse::<i64>()
            .ok()
            .or_else(|| voice_code(&voice).map(i64::from));
        let Some(code) = code else {
            println!("Unknown instrument {:?}", voice.trim());
            return None;
        };

        let notes = prompt(lines, "Pattern ('x' is a hit, '-' is a rest): ")?;
        match Instrument::new(code, notes.trim()) {
            Ok(instrument) => Some(instrument),
            Err(err) => {
                println!("Error: {}", err);
                None
            }
        }
    }

    fn read_index<B: BufRead>(
        lines: &mut io::Lines<B>,
        session: &Session<ClockEngine>,
    ) -> Option<usize> {
        let answer = prompt(lines, &format!("Track number (1-{}): ", session.tracks().len()))?;
        match answer.trim().parse::<usize>() {
            Ok(number) if number > 0 => Some(number - 1),
            _ => {
                println!("Not a track number: {:?}", answer.trim());
                None
            }
        }
    }

    fn read_bpm<B: BufRead>(lines: &mut io::Lines<B>) -> Option<u32> {
        let answer = prompt(lines, "New BPM: ")?;
        match answer.trim().parse::<u32>() {
            Ok(bpm) => Some(bpm),
            Err(_) => {
                println!("Not a number: {:?}", answer.trim());
                None
            }
        }
    }

    fn choose_port<B: BufRead>(lines: &mut io::Lines<B>, selected_port: &Cell<Option<usize>>) {
        let ports = MidiOutputDevice::available_ports();
        println!("   0. Preview audio");
        for (i, port) in ports.iter().enumerate() {
            println!("{:>4}. {}", i + 1, port);
        }
        let Some(answer) = prompt(lines, "Output: ") else {
            return;
        };
        match answer.trim().parse::<usize>() {
            Ok(0) => selected_port.set(None),
            Ok(n) if n <= ports.len() => selected_port.set(Some(n - 1)),
            _ => println!("Selection not valid"),
        }
        println!("Output applies the next time playback starts");
    }
}
