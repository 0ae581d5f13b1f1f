//! Interactive terminal player.
//!
//! One `tokio::select!` loop owns the [`Session`]. Terminal keys, autoplay
//! ticks and generation completions arrive as messages and are applied in
//! order; the screen is redrawn after any change.

use std::io::{self, Stdout, Write};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::cursor::{Hide, MoveTo, Show};
use crossterm::event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};
use crossterm::terminal::{
    self, disable_raw_mode, enable_raw_mode, Clear, ClearType, EnterAlternateScreen,
    LeaveAlternateScreen,
};
use crossterm::{execute, queue};
use futures_util::StreamExt;
use tokio::sync::mpsc::{self, UnboundedSender};
use tracing::{debug, info};

use crate::autoplay::{AutoplayLease, AutoplayTick};
use crate::orchestrator::{Completion, Orchestrator};
use crate::playback::Transition;
use crate::render::{frame_counter, render_frame, Line, Tone, NO_FRAME};
use crate::session::{Phase, Session};
use crate::source::StoryboardSource;

const EDITOR_ROWS: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Stage,
    Editor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Prev,
    Next,
    PlayPause,
    Rewind,
    ToggleComments,
    FocusEditor,
    LeaveEditor,
    Submit,
    Reset,
    Insert(char),
    Newline,
    Backspace,
    Quit,
    Ignore,
}

/// Translates a key press into an action for the current focus.
///
/// Navigation keys only act on a storyboard with frames and never while
/// the editor has focus. Submitting requires a non-blank input and no
/// request in flight.
pub fn map_key(key: KeyEvent, focus: Focus, session: &Session) -> Action {
    let control = key.modifiers.contains(KeyModifiers::CONTROL);
    if control && key.code == KeyCode::Char('c') {
        return Action::Quit;
    }

    match focus {
        Focus::Stage => match key.code {
            KeyCode::Left if session.can_navigate() => Action::Prev,
            KeyCode::Right if session.can_navigate() => Action::Next,
            KeyCode::Char(' ') if session.can_navigate() => Action::PlayPause,
            KeyCode::Char('r') => Action::Rewind,
            KeyCode::Char('c') => Action::ToggleComments,
            KeyCode::Char('e') | KeyCode::Char('i') => Action::FocusEditor,
            KeyCode::Char('g') if session.can_submit() => Action::Submit,
            KeyCode::Char('q') | KeyCode::Esc => Action::Quit,
            _ => Action::Ignore,
        },
        Focus::Editor => match key.code {
            KeyCode::Enter | KeyCode::Char('g') if control => {
                if session.can_submit() {
                    Action::Submit
                } else {
                    Action::Ignore
                }
            }
            KeyCode::Char('r') if control => Action::Reset,
            KeyCode::Esc => Action::LeaveEditor,
            KeyCode::Enter => Action::Newline,
            KeyCode::Backspace => Action::Backspace,
            KeyCode::Char(ch) if !control && !key.modifiers.contains(KeyModifiers::ALT) => {
                Action::Insert(ch)
            }
            _ => Action::Ignore,
        },
    }
}

struct Player {
    session: Session,
    orchestrator: Orchestrator,
    focus: Focus,
    lease: Option<AutoplayLease>,
    leases_issued: u64,
    ticks: UnboundedSender<AutoplayTick>,
    interval: Duration,
    quit: bool,
}

impl Player {
    fn new(
        session: Session,
        orchestrator: Orchestrator,
        ticks: UnboundedSender<AutoplayTick>,
        interval: Duration,
    ) -> Self {
        Self {
            session,
            orchestrator,
            focus: Focus::Stage,
            lease: None,
            leases_issued: 0,
            ticks,
            interval,
            quit: false,
        }
    }

    /// Applies one action; returns whether the screen needs a redraw.
    fn apply(&mut self, action: Action) -> bool {
        match action {
            Action::Prev => self.navigate(Session::prev),
            Action::Next => self.navigate(Session::next),
            Action::PlayPause => self.navigate(Session::play_pause),
            Action::Rewind => self.navigate(Session::rewind),
            Action::ToggleComments => self.session.toggle_comments(),
            Action::FocusEditor => self.focus = Focus::Editor,
            Action::LeaveEditor => self.focus = Focus::Stage,
            Action::Submit => {
                if self.orchestrator.submit(&mut self.session).is_ok() {
                    self.focus = Focus::Stage;
                }
                self.reconcile_lease(false);
            }
            Action::Reset => {
                let was_loading = self.session.is_loading();
                self.session.reset();
                if was_loading && !self.session.is_loading() {
                    self.orchestrator.cancel();
                }
                self.reconcile_lease(true);
            }
            Action::Insert(ch) => self.session.push_input(ch),
            Action::Newline => self.session.push_input('\n'),
            Action::Backspace => self.session.pop_input(),
            Action::Quit => self.quit = true,
            Action::Ignore => return false,
        }
        true
    }

    /// A user-driven step restarts the autoplay period, so the next
    /// automatic advance comes one full interval after the key press.
    fn navigate(&mut self, operation: fn(&mut Session) -> Transition) {
        if operation(&mut self.session).changed() {
            self.reconcile_lease(true);
        }
    }

    fn on_tick(&mut self, tick: AutoplayTick) -> bool {
        if !self.lease.as_ref().is_some_and(|lease| lease.owns(tick)) {
            debug!(lease = tick.lease, "ignoring tick from released lease");
            return false;
        }
        self.session.tick();
        self.reconcile_lease(false);
        true
    }

    fn on_completion(&mut self, completion: Completion) -> bool {
        let applied = self
            .session
            .complete(completion.request, completion.result);
        if applied {
            self.reconcile_lease(true);
        }
        applied
    }

    /// Keeps exactly one lease alive while the session wants a timer.
    fn reconcile_lease(&mut self, restart: bool) {
        if !self.session.wants_timer() {
            self.lease = None;
            return;
        }
        if restart || self.lease.is_none() {
            self.lease = None;
            self.leases_issued += 1;
            self.lease = Some(AutoplayLease::acquire(
                self.leases_issued,
                self.interval,
                self.ticks.clone(),
            ));
        }
    }

    /// The whole screen, top to bottom, fitted to `height` rows.
    fn screen(&self, height: usize) -> Vec<Line> {
        let session = &self.session;
        let mut top = Vec::new();
        let title = session
            .storyboard()
            .map_or("storyreel", |storyboard| storyboard.display_title());
        top.push(Line::new(title, Tone::Title));

        let status = match session.phase() {
            Phase::Idle => Line::new("Ready for an explanation.", Tone::Muted),
            Phase::Loading { .. } => Line::new("Generating storyboard...", Tone::Highlight),
            Phase::Failed => Line::new("Generation failed.", Tone::Error),
            Phase::Ready { playback, .. } => {
                let state = if playback.is_playing() { "playing" } else { "paused" };
                Line::new(
                    frame_counter(playback.position(), playback.frame_count()),
                    Tone::Heading,
                )
                .push(format!("  [{state}]"), Tone::Muted)
            }
        };
        top.push(status);
        if let Some(error) = session.error() {
            top.push(Line::new(format!("Error: {error}"), Tone::Error));
        }
        top.push(Line::blank());

        let stage = match session.storyboard() {
            Some(storyboard) => {
                render_frame(storyboard, session.current_frame(), session.show_comments())
            }
            None if session.is_loading() => Vec::new(),
            None => vec![Line::new(NO_FRAME, Tone::Muted)],
        };

        let mut bottom = vec![Line::blank()];
        let editor_label = match self.focus {
            Focus::Editor => "Explanation (editing: Ctrl+G generate, Ctrl+R reset, Esc leave)",
            Focus::Stage => "Explanation (e to edit, g to generate)",
        };
        bottom.push(Line::new(editor_label, Tone::Heading));
        let input_lines: Vec<&str> = session.input().split('\n').collect();
        let skip = input_lines.len().saturating_sub(EDITOR_ROWS);
        let last = input_lines.len().saturating_sub(1);
        for (row, text) in input_lines.iter().enumerate().skip(skip) {
            let mut line = Line::new("| ", Tone::Muted).push(*text, Tone::Plain);
            if self.focus == Focus::Editor && row == last {
                line = line.push("_", Tone::Highlight);
            }
            bottom.push(line);
        }
        bottom.push(Line::blank());
        bottom.push(Line::new(
            "Left/Right step  Space play/pause  r rewind  c comments  q quit",
            Tone::Muted,
        ));

        let room = height.saturating_sub(top.len() + bottom.len());
        let mut lines = top;
        lines.extend(stage.into_iter().take(room));
        lines.extend(bottom);
        lines.truncate(height);
        lines
    }
}

struct TerminalGuard {
    stdout: Stdout,
}

impl TerminalGuard {
    fn enter() -> Result<Self> {
        enable_raw_mode().context("enable raw mode")?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, Hide).context("enter alt screen")?;
        Ok(Self { stdout })
    }

    fn draw(&mut self, lines: &[Line]) -> Result<()> {
        let (width, _) = terminal::size().context("read terminal size")?;
        queue!(self.stdout, Clear(ClearType::All))?;
        for (row, line) in lines.iter().enumerate() {
            queue!(self.stdout, MoveTo(0, row as u16))?;
            let mut remaining = usize::from(width);
            for span in &line.spans {
                if remaining == 0 {
                    break;
                }
                let text: String = span
                    .text
                    .replace('\t', "    ")
                    .chars()
                    .take(remaining)
                    .collect();
                remaining -= text.chars().count();
                queue!(self.stdout, SetForegroundColor(color(span.tone)), Print(text))?;
            }
            queue!(self.stdout, ResetColor)?;
        }
        self.stdout.flush().context("flush terminal")?;
        Ok(())
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(self.stdout, Show, LeaveAlternateScreen);
    }
}

fn color(tone: Tone) -> Color {
    match tone {
        Tone::Plain => Color::Reset,
        Tone::Title => Color::Cyan,
        Tone::Heading => Color::Blue,
        Tone::Narration => Color::White,
        Tone::Muted => Color::DarkGrey,
        Tone::Highlight => Color::Yellow,
        Tone::Changed => Color::Green,
        Tone::Key => Color::DarkCyan,
        Tone::Value => Color::DarkYellow,
        Tone::Error => Color::Red,
    }
}

/// Runs the player until the user quits. With `autostart` the current
/// input is submitted before the first key press.
pub async fn run(
    session: Session,
    source: Arc<dyn StoryboardSource>,
    interval: Duration,
    autostart: bool,
) -> Result<()> {
    let (tick_tx, mut tick_rx) = mpsc::unbounded_channel();
    let (done_tx, mut done_rx) = mpsc::unbounded_channel();
    let mut player = Player::new(session, Orchestrator::new(source, done_tx), tick_tx, interval);

    let mut terminal = TerminalGuard::enter()?;
    let mut events = EventStream::new();
    info!("player started");

    if autostart {
        player.apply(Action::Submit);
    }

    let mut dirty = true;
    loop {
        if dirty {
            let (_, height) = terminal::size().context("read terminal size")?;
            terminal.draw(&player.screen(usize::from(height)))?;
            dirty = false;
        }
        if player.quit {
            break;
        }

        tokio::select! {
            maybe_event = events.next() => match maybe_event {
                Some(Ok(Event::Key(key))) if key.kind != KeyEventKind::Release => {
                    let action = map_key(key, player.focus, &player.session);
                    dirty = player.apply(action);
                }
                Some(Ok(Event::Resize(_, _))) => dirty = true,
                Some(Ok(_)) => {}
                Some(Err(error)) => return Err(error).context("read terminal event"),
                None => break,
            },
            Some(tick) = tick_rx.recv() => dirty = player.on_tick(tick),
            Some(completion) = done_rx.recv() => dirty = player.on_completion(completion),
        }
    }

    info!("player stopped");
    Ok(())
}
