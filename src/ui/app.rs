use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::execute;
use crossterm::terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode};
use ratatui::backend::CrosstermBackend;
use ratatui::{Frame, Terminal};
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;

use crate::tracker::status::{self, ActivityColor};
use crate::tracker::{SessionController, TrackerEvent};

const MAX_HISTORY: usize = 500;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityView {
    pub label: String,
    pub color: ActivityColor,
}

/// Everything the screen shows, built purely from tracker events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewState {
    pub status: String,
    pub tracking: bool,
    pub activity: Option<ActivityView>,
    pub history: Vec<String>,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            status: status::not_tracking_status(),
            tracking: false,
            activity: None,
            history: Vec::new(),
        }
    }
}

impl ViewState {
    pub fn with_history(history: Vec<String>) -> Self {
        let mut state = Self::default();
        for line in history {
            state.push_history(line);
        }
        state
    }

    pub fn apply(&mut self, event: TrackerEvent) {
        match event {
            TrackerEvent::Status { text } => self.status = text,
            TrackerEvent::Tracking { active } => {
                self.tracking = active;
                if !active {
                    self.activity = None;
                }
            }
            TrackerEvent::Activity { label, color, .. } => {
                self.activity = Some(ActivityView { label, color });
            }
            TrackerEvent::History { line } => self.push_history(line),
        }
    }

    fn push_history(&mut self, line: String) {
        self.history.push(line);
        if self.history.len() > MAX_HISTORY {
            let excess = self.history.len() - MAX_HISTORY;
            self.history.drain(..excess);
        }
    }
}

pub struct App {
    controller: SessionController,
    events: UnboundedReceiver<TrackerEvent>,
    pub view: ViewState,
}

impl App {
    pub fn new(controller: SessionController, events: UnboundedReceiver<TrackerEvent>, history: Vec<String>) -> Self {
        Self {
            controller,
            events,
            view: ViewState::with_history(history),
        }
    }

    fn drain_events(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            self.view.apply(event);
        }
    }

    async fn start(&mut self) {
        if let Err(e) = self.controller.start().await {
            log::error!("Start completed without a log record: {}", e);
        }
    }

    async fn stop(&mut self) {
        if let Err(e) = self.controller.stop().await {
            log::error!("Stop completed without a log record: {}", e);
        }
    }

    pub async fn run(&mut self) -> Result<()> {
        log::info!("Starting UI...");

        let shutdown_flag = Arc::new(AtomicBool::new(false));
        signal_hook::flag::register(signal_hook::consts::SIGTERM, Arc::clone(&shutdown_flag))?;
        signal_hook::flag::register(signal_hook::consts::SIGINT, Arc::clone(&shutdown_flag))?;

        if let Err(e) = enable_raw_mode() {
            eprintln!("Failed to enable raw mode: {}. A terminal with a pseudo-tty is required.", e);
            return Err(anyhow::anyhow!("Terminal raw mode not supported: {}", e));
        }
        let mut stdout = io::stdout();
        if let Err(e) = execute!(stdout, EnterAlternateScreen) {
            eprintln!("Failed to enter alternate screen: {}", e);
            let _ = disable_raw_mode();
            return Err(anyhow::anyhow!("Failed to setup terminal: {}", e));
        }
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        let loop_result = self.event_loop(&mut terminal, &shutdown_flag).await;

        // Close the session so the log gets its STOP record, then tear down.
        self.stop().await;
        self.controller.shutdown().await;

        if let Err(e) = disable_raw_mode() {
            log::warn!("Failed to disable raw mode: {}", e);
        }
        if let Err(e) = execute!(terminal.backend_mut(), LeaveAlternateScreen) {
            log::warn!("Failed to leave alternate screen: {}", e);
        }
        loop_result
    }

    async fn event_loop(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
        shutdown_flag: &AtomicBool,
    ) -> Result<()> {
        loop {
            self.drain_events();
            terminal.draw(|f| self.draw(f))?;

            if shutdown_flag.load(Ordering::Relaxed) {
                log::info!("Received shutdown signal, stopping...");
                break;
            }

            if event::poll(Duration::from_millis(100))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind != KeyEventKind::Press {
                        continue;
                    }
                    log::debug!("Key pressed: {:?}", key.code);
                    match key.code {
                        KeyCode::Char('q') | KeyCode::Esc => break,
                        KeyCode::Char('s') => self.start().await,
                        KeyCode::Char('t') => self.stop().await,
                        _ => {}
                    }
                }
            }
        }
        Ok(())
    }

    fn draw(&self, f: &mut Frame) {
        crate::ui::render::draw(&self.view, f);
    }
}
