use std::io::{self, Stdout};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use arboard::Clipboard;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use gitradar_core::{AppState, Config, Effect, EffectRunner, Key, Msg, RepositoryBackend};
use log::{info, warn};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::render;

const INPUT_POLL: Duration = Duration::from_millis(50);
/// Redraw at least this often so resizes show up without input.
const REDRAW_INTERVAL: Duration = Duration::from_millis(250);

type Term = Terminal<CrosstermBackend<Stdout>>;

pub fn run(
    backend: Arc<dyn RepositoryBackend>,
    config: Config,
    branch: Option<String>,
) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;

    let mut terminal = setup_terminal().context("failed to initialize terminal")?;
    let (tx, rx) = mpsc::unbounded_channel();
    let stop = Arc::new(AtomicBool::new(false));
    let input = spawn_input_thread(tx.clone(), Arc::clone(&stop));

    let mut state = AppState::new();
    if let Some(branch) = branch {
        state.current_branch = branch;
    }
    info!("dashboard started");
    let run_result = runtime.block_on(event_loop(&mut terminal, backend, config, state, tx, rx));

    stop.store(true, Ordering::Relaxed);
    if input.join().is_err() {
        warn!("input thread panicked");
    }
    let restore_result = restore_terminal(terminal);
    info!("dashboard stopped");
    run_result.and(restore_result)
}

async fn event_loop(
    terminal: &mut Term,
    backend: Arc<dyn RepositoryBackend>,
    config: Config,
    state: AppState,
    tx: UnboundedSender<Msg>,
    mut rx: UnboundedReceiver<Msg>,
) -> Result<()> {
    let runner = EffectRunner::new(backend, tx.clone(), config);
    let mut clipboard: Option<Clipboard> = None;

    let (mut state, effects) = gitradar_core::init(state);
    if dispatch(&runner, &tx, &mut clipboard, effects) {
        return Ok(());
    }

    loop {
        terminal
            .draw(|f| render::draw(f, &state))
            .context("failed to draw frame")?;

        let msg = match tokio::time::timeout(REDRAW_INTERVAL, rx.recv()).await {
            Ok(Some(msg)) => msg,
            Ok(None) => return Ok(()),
            Err(_) => continue,
        };
        let (next, effects) = gitradar_core::update(state, msg);
        state = next;
        if dispatch(&runner, &tx, &mut clipboard, effects) {
            return Ok(());
        }
    }
}

/// Starts every effect. Returns `true` once one of them asks to quit.
fn dispatch(
    runner: &EffectRunner,
    tx: &UnboundedSender<Msg>,
    clipboard: &mut Option<Clipboard>,
    effects: Vec<Effect>,
) -> bool {
    let mut quit = false;
    for effect in effects {
        match runner.spawn(effect) {
            Some(Effect::Quit) => quit = true,
            Some(Effect::CopyToClipboard { text }) => {
                if let Err(err) = copy_to_clipboard(clipboard, &text) {
                    warn!("clipboard copy failed: {err}");
                    let _ = tx.send(Msg::ShowAlert(format!("Copy failed: {err}")));
                }
            }
            Some(_) | None => {}
        }
    }
    quit
}

// The clipboard lives as long as the dashboard: on X11 the copied text is
// served by this process.
fn copy_to_clipboard(clipboard: &mut Option<Clipboard>, text: &str) -> Result<()> {
    if clipboard.is_none() {
        *clipboard = Some(Clipboard::new().context("clipboard unavailable")?);
    }
    if let Some(clipboard) = clipboard.as_mut() {
        clipboard
            .set_text(text.to_string())
            .context("failed to set clipboard text")?;
    }
    Ok(())
}

fn spawn_input_thread(tx: UnboundedSender<Msg>, stop: Arc<AtomicBool>) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        while !stop.load(Ordering::Relaxed) {
            match event::poll(INPUT_POLL) {
                Ok(false) => continue,
                Ok(true) => {}
                Err(err) => {
                    warn!("failed to poll terminal events: {err}");
                    break;
                }
            }
            let key = match event::read() {
                Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => translate_key(key),
                Ok(_) => None,
                Err(err) => {
                    warn!("failed to read terminal event: {err}");
                    break;
                }
            };
            if let Some(key) = key
                && tx.send(Msg::Key(key)).is_err()
            {
                break;
            }
        }
    })
}

fn translate_key(key: KeyEvent) -> Option<Key> {
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return matches!(key.code, KeyCode::Char('c') | KeyCode::Char('C')).then_some(Key::CtrlC);
    }
    let key = match key.code {
        KeyCode::Char(c) => Key::Char(c),
        KeyCode::Enter => Key::Enter,
        KeyCode::Esc => Key::Esc,
        KeyCode::Tab => Key::Tab,
        KeyCode::BackTab => Key::BackTab,
        KeyCode::Up => Key::Up,
        KeyCode::Down => Key::Down,
        KeyCode::Left => Key::Left,
        KeyCode::Right => Key::Right,
        KeyCode::PageUp => Key::PageUp,
        KeyCode::PageDown => Key::PageDown,
        KeyCode::Home => Key::Home,
        KeyCode::End => Key::End,
        KeyCode::Backspace => Key::Backspace,
        _ => return None,
    };
    Some(key)
}

fn setup_terminal() -> Result<Term> {
    enable_raw_mode().context("failed to enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).context("failed to enter alternate screen")?;
    let terminal = Terminal::new(CrosstermBackend::new(stdout)).context("failed to create terminal")?;
    Ok(terminal)
}

fn restore_terminal(mut terminal: Term) -> Result<()> {
    disable_raw_mode().context("failed to disable raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)
        .context("failed to leave alternate screen")?;
    terminal
        .show_cursor()
        .context("failed to restore cursor visibility")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
    use gitradar_core::Key;

    use super::translate_key;

    fn press(code: KeyCode, modifiers: KeyModifiers) -> Option<Key> {
        translate_key(KeyEvent::new(code, modifiers))
    }

    #[test]
    fn translates_keys() {
        assert_eq!(press(KeyCode::Char('j'), KeyModifiers::NONE), Some(Key::Char('j')));
        assert_eq!(press(KeyCode::Char('G'), KeyModifiers::SHIFT), Some(Key::Char('G')));
        assert_eq!(press(KeyCode::BackTab, KeyModifiers::SHIFT), Some(Key::BackTab));
        assert_eq!(press(KeyCode::Char('c'), KeyModifiers::CONTROL), Some(Key::CtrlC));
        assert_eq!(press(KeyCode::Char('x'), KeyModifiers::CONTROL), None);
        assert_eq!(press(KeyCode::F(1), KeyModifiers::NONE), None);
    }
}
