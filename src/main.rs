//! sfplayer - A terminal SoundFont player.
//!
//! Loads a SoundFont and either plays a single test note or a whole MIDI
//! file, with a live waveform of the output.
//!
//! # Usage
//!
//! ```bash
//! cargo run                                   # Note mode, SoundFont fetched from the default URL
//! cargo run -- --mode file font.sf2 song.mid  # MIDI file mode
//! cargo run -- font.sf2 song.mid --render out.wav
//! ```

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use sfplayer::app::{App, FileTarget, Mode};
use sfplayer::audio::{render_to_wav, RenderJob, RustySynthFactory};
use sfplayer::config::Config;
use sfplayer::loader::{fetch_resource, read_resource};
use sfplayer::midi::{parse_note, MidiClip};
use sfplayer::session::NoteRequest;
use std::io::{self, Stdout};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Command-line options for the application.
struct CliOptions {
    /// Explicit mode; otherwise inferred from the files given.
    mode: Option<Mode>,
    soundfont: Option<PathBuf>,
    midi: Option<PathBuf>,
    /// JSON configuration file.
    config: Option<PathBuf>,
    /// Render to this WAV file instead of starting the UI.
    render: Option<PathBuf>,
    note: Option<u8>,
    preset: Option<u8>,
}

fn usage_error(message: &str) -> ! {
    eprintln!("Error: {}", message);
    eprintln!("Use --help for usage information");
    std::process::exit(1);
}

impl CliOptions {
    /// Parses command-line arguments.
    fn parse() -> Self {
        let args: Vec<String> = std::env::args().collect();
        let mut options = Self {
            mode: None,
            soundfont: None,
            midi: None,
            config: None,
            render: None,
            note: None,
            preset: None,
        };
        let mut i = 1;

        let value = |i: &mut usize, flag: &str| -> String {
            *i += 1;
            match args.get(*i) {
                Some(v) => v.clone(),
                None => usage_error(&format!("{} requires an argument", flag)),
            }
        };

        while i < args.len() {
            let arg = args[i].clone();
            match arg.as_str() {
                "--mode" => {
                    let name = value(&mut i, "--mode");
                    options.mode = Some(
                        Mode::parse(&name)
                            .unwrap_or_else(|| usage_error("--mode must be 'note' or 'file'")),
                    );
                }
                "--soundfont" | "-sf" => options.soundfont = Some(value(&mut i, &arg).into()),
                "--midi" => options.midi = Some(value(&mut i, &arg).into()),
                "--config" | "-c" => options.config = Some(value(&mut i, &arg).into()),
                "--render" | "-o" => options.render = Some(value(&mut i, &arg).into()),
                "--note" => {
                    let note = value(&mut i, &arg);
                    options.note = Some(
                        parse_note(&note)
                            .unwrap_or_else(|| usage_error("--note takes a name like C4 or 0-127")),
                    );
                }
                "--preset" => {
                    let preset = value(&mut i, &arg);
                    options.preset = Some(
                        preset
                            .parse()
                            .unwrap_or_else(|_| usage_error("--preset takes a number 0-127")),
                    );
                }
                "--help" | "-h" => {
                    print_help(args.first().map(String::as_str).unwrap_or("sfplayer"));
                    std::process::exit(0);
                }
                other => {
                    let lower = other.to_lowercase();
                    if lower.ends_with(".sf2") {
                        options.soundfont = Some(PathBuf::from(other));
                    } else if lower.ends_with(".mid") || lower.ends_with(".midi") {
                        options.midi = Some(PathBuf::from(other));
                    } else {
                        usage_error(&format!("unknown option: {}", other));
                    }
                }
            }
            i += 1;
        }

        options
    }

    /// The mode to run in: explicit, or file mode when a MIDI file was given.
    fn mode(&self) -> Mode {
        self.mode.unwrap_or(if self.midi.is_some() {
            Mode::File
        } else {
            Mode::Note
        })
    }
}

fn print_help(program: &str) {
    eprintln!("sfplayer - Terminal SoundFont player");
    eprintln!();
    eprintln!("Usage: {} [OPTIONS] [FONT.sf2] [SONG.mid]", program);
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --mode note|file       Play a single note, or a MIDI file (default: inferred)");
    eprintln!("  -sf, --soundfont PATH  Load a SoundFont file (.sf2)");
    eprintln!("  --midi PATH            Load a MIDI file (.mid)");
    eprintln!("  -c, --config PATH      Read settings from a JSON file");
    eprintln!("  --note NOTE            Test note, e.g. C4 or 60");
    eprintln!("  --preset N             Preset (program) number");
    eprintln!("  -o, --render OUT.wav   Render to a WAV file instead of playing");
    eprintln!("  -h, --help             Print this help message");
    eprintln!();
    eprintln!("Set RUST_LOG=sfplayer=debug for diagnostics on stderr.");
}

/// Main entry point.
fn main() -> Result<()> {
    let cli = CliOptions::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(note) = cli.note {
        config.note = note;
    }
    if let Some(preset) = cli.preset {
        config.preset = preset;
    }

    if let Some(output) = &cli.render {
        return render_headless(&cli, &config, output);
    }

    let mut app = App::new(cli.mode(), config, Arc::new(RustySynthFactory));
    if let Some(path) = &cli.soundfont {
        app.load_soundfont_file(path);
    }
    if let Some(path) = &cli.midi {
        app.load_midi_file(path);
    }

    let mut terminal = setup_terminal().context("Failed to setup terminal")?;
    let result = run_app(&mut terminal, &mut app);
    restore_terminal(&mut terminal).context("Failed to restore terminal")?;

    result
}

/// Renders the selected playback to a WAV file without opening a device.
fn render_headless(cli: &CliOptions, config: &Config, output: &Path) -> Result<()> {
    let soundfont = match (&cli.soundfont, &config.soundfont_url) {
        (Some(path), _) => read_resource(path)?,
        (None, Some(url)) => fetch_resource(url)?,
        (None, None) => anyhow::bail!("a SoundFont is required (--soundfont PATH)"),
    };

    match cli.mode() {
        Mode::Note => {
            let request = NoteRequest::from_config(config);
            render_to_wav(
                &soundfont,
                RenderJob::Note(&request),
                config.sample_rate,
                config.release_tail(),
                output,
            )?;
        }
        Mode::File => {
            let path = cli
                .midi
                .as_ref()
                .context("file mode needs a MIDI file (--midi PATH)")?;
            let clip = MidiClip::from_buffer(&read_resource(path)?)?;
            render_to_wav(
                &soundfont,
                RenderJob::File(&clip),
                config.sample_rate,
                config.release_tail(),
                output,
            )?;
        }
    }

    eprintln!("Wrote {}", output.display());
    Ok(())
}

/// Sets up the terminal for TUI rendering.
fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode().context("Failed to enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).context("Failed to enter alternate screen")?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend).context("Failed to create terminal")?;
    Ok(terminal)
}

/// Restores the terminal to its original state.
fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode().context("Failed to disable raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)
        .context("Failed to leave alternate screen")?;
    terminal.show_cursor().context("Failed to show cursor")?;
    Ok(())
}

/// Main application loop.
fn run_app(terminal: &mut Terminal<CrosstermBackend<Stdout>>, app: &mut App) -> Result<()> {
    loop {
        // Attempt progress and one visualizer frame per redraw
        app.tick();

        terminal.draw(|frame| sfplayer::ui::render(frame, app))?;

        if event::poll(Duration::from_millis(16))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    handle_key(app, key.code);
                }
            }
        }

        if app.should_quit {
            return Ok(());
        }
    }
}

fn handle_key(app: &mut App, code: KeyCode) {
    if let Some(browser) = &mut app.browser {
        match code {
            KeyCode::Up | KeyCode::Char('k') => browser.move_up(),
            KeyCode::Down | KeyCode::Char('j') => browser.move_down(),
            KeyCode::Enter => app.browser_select(),
            KeyCode::Esc => app.close_browser(),
            _ => {}
        }
        return;
    }

    match code {
        KeyCode::Enter | KeyCode::Char(' ') => {
            app.start();
        }
        KeyCode::Char('s') => app.open_browser(FileTarget::SoundFont),
        KeyCode::Char('m') => app.open_browser(FileTarget::Midi),
        KeyCode::Char('q') | KeyCode::Esc => app.should_quit = true,
        _ => {}
    }
}
