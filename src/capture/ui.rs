//! Terminal user interface for live capture.
//!
//! Renders the live waveform chart from a window snapshot at a fixed
//! cadence and maps keys onto capture commands. Settings changes are
//! rejected while capturing with a visible notice instead of silently
//! corrupting the session.

use crate::chart::{self, ChartGeometry, ChartMode, ChartParams, ScrollState, YAxisPolicy};
use crossterm::{
    event::{self, Event, KeyCode},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    prelude::*,
    widgets::Paragraph,
};
use std::error::Error;
use std::io::{stdout, Stdout};
use std::time::{Duration, Instant};

const FOOTER_FG: Color = Color::Rgb(185, 207, 212);
const FOOTER_BG: Color = Color::Rgb(0, 0, 0);
const NOTICE_TTL: Duration = Duration::from_secs(3);

/// User input command during capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureCommand {
    /// Continue capturing (no key pressed)
    Continue,
    /// Stop and keep the session for saving (Enter key)
    Stop,
    /// Exit without keeping the session (Escape or 'q')
    Cancel,
    /// Settings change requested ('s'); the controller decides whether it
    /// is allowed in the current state
    Settings,
}

/// Everything one live frame needs from the session.
pub struct CaptureFrame<'a> {
    /// Live window snapshot, already converted to Pascal.
    pub window: &'a [f64],
    /// Total samples accumulated this session.
    pub total_samples: usize,
    pub sample_rate: u32,
    pub source_label: &'a str,
    pub fault: Option<&'a str>,
}

/// Terminal UI for live capture with waveform charting.
pub struct CaptureTui {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    live_y_max: f64,
    recording_start_time: Instant,
    notice: Option<(String, Instant)>,
}

impl CaptureTui {
    /// Creates a new TUI instance and enters alternate screen mode.
    ///
    /// # Errors
    /// - If terminal cannot be initialized
    /// - If raw mode cannot be enabled
    /// - If alternate screen cannot be entered
    pub fn new(live_y_max: f64) -> Result<Self, Box<dyn Error>> {
        enable_raw_mode()?;
        let mut stdout = stdout();
        execute!(stdout, crossterm::terminal::EnterAlternateScreen)?;

        let backend = CrosstermBackend::new(stdout);
        let terminal = Terminal::new(backend)?;

        Ok(CaptureTui {
            terminal,
            live_y_max,
            recording_start_time: Instant::now(),
            notice: None,
        })
    }

    /// Renders the live chart and the status footer.
    ///
    /// # Errors
    /// - If terminal rendering fails
    pub fn render(&mut self, frame_data: &CaptureFrame) -> Result<(), Box<dyn Error>> {
        if let Some((_, since)) = &self.notice {
            if since.elapsed() >= NOTICE_TTL {
                self.notice = None;
            }
        }
        let notice = self.notice.as_ref().map(|(text, _)| text.clone());

        let duration = self.recording_start_time.elapsed();
        let live_y_max = self.live_y_max;

        self.terminal.draw(|frame| {
            let area = frame.area();

            let [chart_area, footer_area] =
                Layout::vertical([Constraint::Min(0), Constraint::Length(1)]).areas(area);

            let params = ChartParams {
                data: frame_data.window,
                sample_rate: frame_data.sample_rate.max(1),
                mode: ChartMode::Live,
                y_axis: YAxisPolicy::Fixed(live_y_max),
                geometry: ChartGeometry::from_area(chart_area),
                target_points: 0,
                total_samples: Some(frame_data.total_samples),
                cursor: None,
                scroll: ScrollState::default(),
            };
            let model = chart::build(&params);
            chart::render_chart(frame, chart_area, &model);

            let duration_secs = duration.as_secs();
            let minutes = duration_secs / 60;
            let secs = duration_secs % 60;

            let mut spans = vec![
                Span::styled("● ", Style::default().fg(Color::Red)),
                Span::raw(format!("{minutes}:{secs:02}")),
                Span::raw(" / "),
                Span::raw(frame_data.source_label.to_string()),
            ];
            if let Some(fault) = frame_data.fault {
                spans.push(Span::raw(" / "));
                spans.push(Span::styled(
                    format!("source fault: {fault}"),
                    Style::default().fg(Color::Yellow),
                ));
            }
            if let Some(notice) = notice {
                spans.push(Span::raw(" / "));
                spans.push(Span::styled(notice, Style::default().fg(Color::Yellow)));
            }

            let footer = Paragraph::new(Line::from(spans))
                .style(Style::default().fg(FOOTER_FG).bg(FOOTER_BG));
            frame.render_widget(footer, footer_area);
        })?;

        Ok(())
    }

    /// Processes user input and returns the appropriate capture command.
    ///
    /// # Returns
    /// - `Continue` if no key or an unrecognized key was pressed
    /// - `Stop` if Enter was pressed
    /// - `Cancel` if Escape, 'q' or Ctrl+C was pressed
    ///
    /// # Errors
    /// - If event polling fails
    pub fn handle_input(&mut self) -> Result<CaptureCommand, Box<dyn Error>> {
        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                return Ok(match key.code {
                    KeyCode::Enter => {
                        tracing::debug!("Enter pressed: stopping capture");
                        CaptureCommand::Stop
                    }
                    KeyCode::Char('q') | KeyCode::Esc => {
                        tracing::debug!("Escape or 'q' pressed: canceling capture");
                        CaptureCommand::Cancel
                    }
                    KeyCode::Char('c')
                        if key
                            .modifiers
                            .contains(crossterm::event::KeyModifiers::CONTROL) =>
                    {
                        tracing::debug!("Ctrl+C pressed: canceling capture");
                        CaptureCommand::Cancel
                    }
                    KeyCode::Char('s') => {
                        tracing::debug!("Settings change requested");
                        CaptureCommand::Settings
                    }
                    _ => CaptureCommand::Continue,
                });
            }
        }
        Ok(CaptureCommand::Continue)
    }

    /// Shows a transient footer notice for a few seconds.
    pub fn show_notice(&mut self, text: &str) {
        self.notice = Some((text.to_string(), Instant::now()));
    }

    /// Cleans up terminal state and exits alternate screen mode.
    ///
    /// # Errors
    /// - If terminal mode cannot be disabled
    /// - If cursor cannot be shown
    pub fn cleanup(&mut self) -> Result<(), Box<dyn Error>> {
        disable_raw_mode()?;
        execute!(
            self.terminal.backend_mut(),
            crossterm::terminal::LeaveAlternateScreen
        )?;
        self.terminal.show_cursor()?;
        Ok(())
    }
}

impl Drop for CaptureTui {
    fn drop(&mut self) {
        let _ = self.cleanup();
    }
}
