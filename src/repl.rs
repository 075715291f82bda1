use crate::engine::SoundEngine;
use crate::identity::IdentityProvider;
use crate::model::melody::Melody;
use crate::player::PlayerMsg;
use crate::recorder::RecorderState;
use crate::session::{PianoSession, SessionEvent};
use crate::store::MelodyStore;
use crate::util::{format_date, preview_keys};
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
    KeyModifiers, KeyboardEnhancementFlags, MouseButton, MouseEvent, MouseEventKind,
    PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags,
};
use crossterm::style::Stylize;
use crossterm::terminal::{self, ClearType, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::{cursor, execute, queue};
use log::debug;
use std::io::{self, Stdout, Write};
use std::time::{Duration, Instant};

const KEY_WIDTH: u16 = 3;
const KEYBOARD_LEFT: u16 = 2;
/// Screen rows holding the clickable keyboard.
const KEYBOARD_ROWS: [u16; 2] = [3, 4];
const NOTE_STRIP_MAX: usize = 16;
/// Without event types a held key arrives as a stream of presses; the same key
/// pressed again this soon counts as a repeat.
const REPEAT_WINDOW: Duration = Duration::from_millis(150);

const HELP: &str = "\
  Enter  initialize audio      R  record / stop     P  play recording\r\n\
  C      clear recording       S  save recording    M  my melodies\r\n\
  B      public melodies       L  load melody       X  delete melody\r\n\
  I      sign in   U  sign up   O  sign out          Esc  quit";

/// What the lower half of the screen shows.
enum Panel {
    Help,
    Melodies(String, Vec<Melody>),
}

/// Tells auto-repeat apart from fresh presses.
#[derive(Debug)]
struct RepeatFilter {
    reports_repeats: bool,
    last: Option<(char, Instant)>,
}

impl RepeatFilter {
    fn new(reports_repeats: bool) -> Self {
        Self {
            reports_repeats,
            last: None,
        }
    }

    fn is_repeat(&mut self, key: char, kind: KeyEventKind, now: Instant) -> bool {
        if self.reports_repeats {
            return kind == KeyEventKind::Repeat;
        }

        let repeat = self
            .last
            .is_some_and(|(prev, at)| prev == key && now.duration_since(at) < REPEAT_WINDOW);
        self.last = Some((key, now));
        repeat
    }
}

struct Screen {
    status: String,
    last_note: Option<String>,
    panel: Panel,
}

/// Run the interactive terminal piano until Esc / Ctrl-C.
pub fn run<E, S, I>(session: &mut PianoSession<E, S, I>) -> anyhow::Result<()>
where
    E: SoundEngine + 'static,
    S: MelodyStore,
    I: IdentityProvider,
{
    let mut stdout = io::stdout();

    terminal::enable_raw_mode()?;
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture, cursor::Hide)?;

    let enhanced = terminal::supports_keyboard_enhancement().unwrap_or(false)
        && queue!(
            stdout,
            PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES)
        )
        .is_ok()
        && stdout.flush().is_ok();
    debug!("Keyboard enhancement: {}", enhanced);

    let result = event_loop(session, &mut stdout, RepeatFilter::new(enhanced));

    if enhanced {
        let _ = execute!(stdout, PopKeyboardEnhancementFlags);
    }
    let _ = execute!(stdout, cursor::Show, DisableMouseCapture, LeaveAlternateScreen);
    let _ = terminal::disable_raw_mode();

    result
}

fn event_loop<E, S, I>(
    session: &mut PianoSession<E, S, I>,
    stdout: &mut Stdout,
    mut repeats: RepeatFilter,
) -> anyhow::Result<()>
where
    E: SoundEngine + 'static,
    S: MelodyStore,
    I: IdentityProvider,
{
    let mut screen = Screen {
        status: String::from("Press Enter to initialize audio."),
        last_note: None,
        panel: Panel::Help,
    };
    draw(stdout, session, &screen)?;

    loop {
        let updates = session.poll();
        if !updates.is_empty() {
            for update in &updates {
                if let SessionEvent::Player(PlayerMsg::Note { label: Some(label), .. }) = update {
                    screen.last_note = Some(label.clone());
                }
            }
            draw(stdout, session, &screen)?;
        }

        if !event::poll(Duration::from_millis(20))? {
            continue;
        }

        match event::read()? {
            Event::Key(KeyEvent {
                code: KeyCode::Esc,
                kind: KeyEventKind::Press,
                ..
            }) => return Ok(()),

            Event::Key(KeyEvent {
                code: KeyCode::Char('c'),
                modifiers: KeyModifiers::CONTROL,
                kind: KeyEventKind::Press,
                ..
            }) => return Ok(()),

            Event::Key(KeyEvent {
                code: KeyCode::Enter,
                kind: KeyEventKind::Press,
                ..
            }) => {
                screen.status = match session.initialize_audio() {
                    Ok(()) => String::from("Audio ready. Play with your keyboard or click the keys."),
                    Err(why) => format!("Audio failed to start: {}", why),
                };
            }

            Event::Key(KeyEvent {
                code: KeyCode::Char(c),
                kind: kind @ (KeyEventKind::Press | KeyEventKind::Repeat),
                ..
            }) if c.is_ascii_uppercase() => {
                if kind == KeyEventKind::Press {
                    handle_control(session, stdout, &mut screen, c)?;
                }
            }

            Event::Key(KeyEvent {
                code: KeyCode::Char(c),
                kind: kind @ (KeyEventKind::Press | KeyEventKind::Repeat),
                ..
            }) => {
                let is_repeat = repeats.is_repeat(c, kind, Instant::now());
                if let Some(label) = session.press_key(c, is_repeat) {
                    screen.last_note = Some(label);
                } else if !session.audio_ready() {
                    screen.status = String::from("Audio not initialized, press Enter first.");
                }
            }

            Event::Mouse(MouseEvent {
                kind: MouseEventKind::Down(MouseButton::Left),
                column,
                row,
                ..
            }) => {
                if let Some(index) = key_at(column, row) {
                    if let Some(label) = session.click_key(index) {
                        screen.last_note = Some(label);
                    } else if !session.audio_ready() {
                        screen.status = String::from("Audio not initialized, press Enter first.");
                    }
                }
            }

            _ => continue,
        }

        draw(stdout, session, &screen)?;
    }
}

fn key_at(column: u16, row: u16) -> Option<usize> {
    if !KEYBOARD_ROWS.contains(&row) || column < KEYBOARD_LEFT {
        return None;
    }
    Some(((column - KEYBOARD_LEFT) / KEY_WIDTH) as usize)
}

fn handle_control<E, S, I>(
    session: &mut PianoSession<E, S, I>,
    stdout: &mut Stdout,
    screen: &mut Screen,
    control: char,
) -> anyhow::Result<()>
where
    E: SoundEngine + 'static,
    S: MelodyStore,
    I: IdentityProvider,
{
    match control {
        'R' => {
            let was_recording = session.state() == RecorderState::Recording;
            if session.toggle_recording() {
                screen.status = if was_recording {
                    format!("Recorded {} notes.", session.recorded().len())
                } else {
                    String::from("Recording...")
                };
            }
        }
        'P' => {
            screen.status = match session.play_recording() {
                Ok(true) => String::from("Playing..."),
                Ok(false) => String::from("Nothing to play right now."),
                Err(why) => format!("Playback failed: {}", why),
            };
        }
        'C' => {
            if session.clear_recording() {
                screen.status = String::from("Recording cleared.");
            }
        }
        'S' => {
            if session.current_identity().is_none() {
                screen.status = String::from("Sign in (I) to save melodies.");
            } else if session.state() == RecorderState::Idle && !session.recorded().is_empty() {
                save_prompt(session, stdout, screen)?;
            }
        }
        'M' => {
            screen.status.clear();
            match session.my_melodies() {
                Ok(list) if list.is_empty() => {
                    screen.status = String::from("No melodies yet. Record one and save it!");
                    screen.panel = Panel::Help;
                }
                Ok(list) => screen.panel = Panel::Melodies(String::from("My Melodies"), list),
                Err(why) => screen.status = why.to_string(),
            }
        }
        'B' => match session.public_melodies() {
            Ok(list) => screen.panel = Panel::Melodies(String::from("Public Melodies"), list),
            Err(why) => screen.status = why.to_string(),
        },
        'L' => {
            if let Some(id) = prompt_id(stdout, "Load melody id")? {
                screen.status = match session.load_melody(id) {
                    Ok(true) => String::from("Melody loaded, press P to play."),
                    Ok(false) => String::from("Finish recording or playback first."),
                    Err(why) => why.to_string(),
                };
            }
        }
        'X' => {
            if let Some(id) = prompt_id(stdout, "Delete melody id")? {
                screen.status = match session.delete_melody(id) {
                    Ok(()) => {
                        if let Panel::Melodies(_, list) = &mut screen.panel {
                            list.retain(|m| m.id != id);
                        }
                        format!("Deleted melody {}.", id)
                    }
                    Err(why) => why.to_string(),
                };
            }
        }
        'I' | 'U' => {
            let Some(email) = prompt(stdout, "Email", false)? else {
                return Ok(());
            };
            let Some(password) = prompt(stdout, "Password", true)? else {
                return Ok(());
            };

            let result = if control == 'I' {
                session.sign_in(&email, &password)
            } else {
                session.sign_up(&email, &password)
            };

            screen.status = match result {
                Ok(me) => format!("Signed in as {}.", me.email),
                Err(why) => why.to_string(),
            };
        }
        'O' => {
            screen.status = match session.sign_out() {
                Ok(()) => String::from("Signed out."),
                Err(why) => why.to_string(),
            };
            screen.panel = Panel::Help;
        }
        _ => {}
    }

    Ok(())
}

fn save_prompt<E, S, I>(
    session: &PianoSession<E, S, I>,
    stdout: &mut Stdout,
    screen: &mut Screen,
) -> anyhow::Result<()>
where
    E: SoundEngine + 'static,
    S: MelodyStore,
    I: IdentityProvider,
{
    let Some(name) = prompt(stdout, "Melody name", false)? else {
        return Ok(());
    };
    let Some(public) = prompt(stdout, "Make this melody public? [Y/n]", false)? else {
        return Ok(());
    };
    let is_public = !public.trim().eq_ignore_ascii_case("n");

    screen.status = match session.save_recording(&name, is_public) {
        Ok(Some(melody)) => format!("Saved '{}' as melody {}.", melody.name, melody.id),
        Ok(None) => String::from("Nothing to save right now."),
        Err(why) => format!("Error saving melody: {}", why),
    };

    Ok(())
}

fn prompt_id(stdout: &mut Stdout, label: &str) -> anyhow::Result<Option<u64>> {
    let Some(raw) = prompt(stdout, label, false)? else {
        return Ok(None);
    };
    Ok(raw.trim().parse().ok())
}

/// Read a line on the bottom row. Esc cancels.
fn prompt(stdout: &mut Stdout, label: &str, masked: bool) -> anyhow::Result<Option<String>> {
    let (_, rows) = terminal::size()?;
    let mut input = String::new();

    loop {
        let shown = if masked {
            "*".repeat(input.chars().count())
        } else {
            input.clone()
        };
        queue!(
            stdout,
            cursor::MoveTo(0, rows.saturating_sub(1)),
            terminal::Clear(ClearType::CurrentLine)
        )?;
        write!(stdout, "  {}: {}", label.bold(), shown)?;
        stdout.flush()?;

        if let Event::Key(KeyEvent { code, kind, .. }) = event::read()? {
            if kind == KeyEventKind::Release {
                continue;
            }
            match code {
                KeyCode::Enter => return Ok(Some(input)),
                KeyCode::Esc => return Ok(None),
                KeyCode::Backspace => {
                    input.pop();
                }
                KeyCode::Char(c) => input.push(c),
                _ => {}
            }
        }
    }
}

fn draw<E, S, I>(stdout: &mut Stdout, session: &PianoSession<E, S, I>, screen: &Screen) -> anyhow::Result<()>
where
    E: SoundEngine + 'static,
    S: MelodyStore,
    I: IdentityProvider,
{
    queue!(stdout, terminal::Clear(ClearType::All), cursor::MoveTo(0, 0))?;

    let who = match session.current_identity() {
        Some(me) => format!("Signed in as {}", me.email).green().to_string(),
        None => String::from("Sign in (I) to save").dark_grey().to_string(),
    };
    write!(stdout, "  {}    {}\r\n", "ivory - virtual piano".bold(), who)?;

    let state = match session.state() {
        RecorderState::Idle => "Idle".to_string(),
        RecorderState::Recording => "Recording...".red().bold().to_string(),
        RecorderState::Playing => "Playing...".cyan().to_string(),
    };
    let audio = if session.audio_ready() { "on" } else { "off (press Enter)" };
    write!(stdout, "  State: {}   Audio: {}\r\n\r\n", state, audio)?;

    // Keyboard: note names, then the computer key that plays each one
    let pad = " ".repeat(KEYBOARD_LEFT as usize);
    let mut names = pad.clone();
    let mut labels = pad.clone();
    for key in session.keys() {
        let name = format!("{:<width$}", key.note.name(), width = KEY_WIDTH as usize);
        let label = format!(
            "{:<width$}",
            key.keyboard_key.map(String::from).unwrap_or_default(),
            width = KEY_WIDTH as usize
        );
        if key.is_black {
            names.push_str(&name.black().on_white().to_string());
        } else {
            names.push_str(&name);
        }
        labels.push_str(&label.dark_grey().to_string());
    }
    write!(stdout, "{}\r\n{}\r\n\r\n", names, labels)?;

    let last = screen.last_note.as_deref().unwrap_or("---");
    write!(stdout, "  Last note: {}\r\n", last.bold())?;

    let recorded = session.recorded();
    if !recorded.is_empty() {
        let strip: Vec<String> = recorded
            .iter()
            .rev()
            .take(NOTE_STRIP_MAX)
            .rev()
            .map(|n| {
                if n.key.contains('#') {
                    n.key.clone().reverse().to_string()
                } else {
                    n.key.clone()
                }
            })
            .collect();
        write!(
            stdout,
            "  Recorded Melody: {}\r\n  {} notes recorded\r\n",
            strip.join(" "),
            recorded.len()
        )?;
    }
    write!(stdout, "\r\n")?;

    match &screen.panel {
        Panel::Help => write!(stdout, "{}\r\n", HELP)?,
        Panel::Melodies(title, list) => {
            write!(stdout, "  {}\r\n", title.as_str().bold())?;
            for melody in list {
                write!(
                    stdout,
                    "  {:>4}  {:<24} {:<8} {}  {}\r\n",
                    melody.id,
                    melody.name,
                    melody.visibility(),
                    format_date(melody.created_at),
                    preview_keys(melody.notes.iter().map(|n| n.key.as_str()), 8)
                )?;
            }
        }
    }

    if !screen.status.is_empty() {
        write!(stdout, "\r\n  {}\r\n", screen.status)?;
    }

    stdout.flush()?;
    Ok(())
}
