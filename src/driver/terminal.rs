use std::io::{self, Write};
use std::time::Duration;

use crossterm::cursor::{Hide, Show};
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event as TermEvent, KeyCode, KeyEventKind,
    MouseEventKind,
};
use crossterm::execute;
use crossterm::terminal::{self, Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen};
use thiserror::Error;

use crate::document::Document;
use crate::geometry::Size;
use crate::session::Session;

pub type DriverResult<T> = std::result::Result<T, TerminalDriverError>;

#[derive(Debug, Error)]
pub enum TerminalDriverError {
    #[error("terminal error: {0}")]
    Terminal(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Minimal terminal driver that owns raw mode and alternate screen
/// transitions, maps mouse-move and resize events onto a [`Document`], and
/// pumps deferred throttle flushes for its sessions on every loop
/// iteration. One terminal cell counts as one page pixel. Esc or `q` exits.
pub struct TerminalDriver {
    document: Document,
    sessions: Vec<Session>,
    poll_interval: Duration,
}

impl TerminalDriver {
    pub fn new(document: Document) -> Self {
        Self {
            document,
            sessions: Vec::new(),
            poll_interval: Duration::from_millis(25),
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Register a session to pump on every loop iteration.
    pub fn watch(mut self, session: Session) -> Self {
        self.sessions.push(session);
        self
    }

    pub fn run(mut self) -> DriverResult<()> {
        let mut stdout = io::stdout();
        self.enter(&mut stdout)?;
        let result = self.run_inner();
        self.exit(&mut stdout);
        result
    }

    fn run_inner(&mut self) -> DriverResult<()> {
        let (width, height) = terminal::size()?;
        self.document
            .resize(Size::new(f64::from(width), f64::from(height)));

        loop {
            if event::poll(self.poll_interval)? {
                match event::read()? {
                    TermEvent::Mouse(mouse) if mouse.kind == MouseEventKind::Moved => {
                        let scroll = self.document.page_scroll();
                        self.document.pointer_move(
                            f64::from(mouse.column) + scroll.x,
                            f64::from(mouse.row) + scroll.y,
                        );
                    }
                    TermEvent::Resize(width, height) => {
                        self.document
                            .resize(Size::new(f64::from(width), f64::from(height)));
                    }
                    TermEvent::Key(key) if key.kind == KeyEventKind::Press => {
                        if matches!(key.code, KeyCode::Esc | KeyCode::Char('q')) {
                            break;
                        }
                    }
                    _ => {}
                }
            }
            for session in &self.sessions {
                session.poll_deferred();
            }
        }
        Ok(())
    }

    fn enter(&self, stdout: &mut impl Write) -> DriverResult<()> {
        terminal::enable_raw_mode()
            .map_err(|err| TerminalDriverError::Terminal(err.to_string()))?;
        execute!(
            stdout,
            EnterAlternateScreen,
            EnableMouseCapture,
            Hide,
            Clear(ClearType::All)
        )?;
        Ok(())
    }

    fn exit(&self, stdout: &mut impl Write) {
        execute!(stdout, DisableMouseCapture, Show, LeaveAlternateScreen).ok();
        terminal::disable_raw_mode().ok();
    }
}
