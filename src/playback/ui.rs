//! Terminal user interface for reviewing a finished session.
//!
//! Shows the full recording as a scrollable review chart with an optional
//! playback cursor. The viewport auto-follows the cursor until the user
//! scrolls manually; follow can be resumed with one key. Fullscreen is a
//! pure view-size change: the same draw model on a larger area.

use crate::chart::{self, ChartGeometry, ChartMode, ChartParams, ScrollState, YAxisPolicy};
use crossterm::{
    event::{self, Event, KeyCode},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    prelude::*,
    widgets::Paragraph,
};
use std::error::Error;
use std::io::{stdout, Stdout};
use std::time::Duration;

const FOOTER_FG: Color = Color::Rgb(100, 100, 100);
const BG: Color = Color::Rgb(0, 0, 0);
/// Horizontal scroll step per key press, in content pixels.
const SCROLL_STEP: f64 = 24.0;

/// User input command during review.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewCommand {
    Continue,
    /// Start (or restart) playback (Space).
    Play,
    /// Proceed to the save flow ('s').
    Save,
    /// Leave review without saving (Escape or 'q').
    Exit,
}

/// Everything one review frame needs.
pub struct ReviewFrame<'a> {
    /// Full recording in Pascal.
    pub data: &'a [f64],
    pub sample_rate: u32,
    /// Playback cursor as an index into `data`.
    pub cursor: Option<usize>,
    pub is_playing: bool,
    /// Whether the save key is offered in the footer.
    pub can_save: bool,
}

/// Terminal UI for the review chart.
pub struct ReviewTui {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    scroll: ScrollState,
    fullscreen: bool,
    y_axis: YAxisPolicy,
    target_points: usize,
}

impl ReviewTui {
    /// Creates a new review TUI and enters alternate screen mode.
    ///
    /// # Errors
    /// - If terminal cannot be initialized or raw mode cannot be enabled
    pub fn new(min_y_max: f64, target_points: usize) -> Result<Self, Box<dyn Error>> {
        enable_raw_mode()?;
        let mut stdout = stdout();
        execute!(stdout, EnterAlternateScreen)?;

        let backend = CrosstermBackend::new(stdout);
        let terminal = Terminal::new(backend)?;

        Ok(ReviewTui {
            terminal,
            scroll: ScrollState::default(),
            fullscreen: false,
            y_axis: YAxisPolicy::FromData {
                headroom: 1.1,
                min: min_y_max,
            },
            target_points,
        })
    }

    /// Renders the review chart and the control footer.
    ///
    /// # Errors
    /// - If terminal rendering fails
    pub fn render(&mut self, frame_data: &ReviewFrame) -> Result<(), Box<dyn Error>> {
        let size = self.terminal.size()?;
        let area = Rect::new(0, 0, size.width, size.height);
        let fullscreen = self.fullscreen;

        let chart_area = if fullscreen {
            area
        } else {
            let [chart_area, _] =
                Layout::vertical([Constraint::Min(0), Constraint::Length(1)]).areas(area);
            chart_area
        };

        let params = ChartParams {
            data: frame_data.data,
            sample_rate: frame_data.sample_rate.max(1),
            mode: ChartMode::Review,
            y_axis: self.y_axis,
            geometry: ChartGeometry::from_area(chart_area),
            target_points: self.target_points,
            total_samples: None,
            cursor: frame_data.cursor,
            scroll: self.scroll,
        };
        let model = chart::build(&params);

        // Keep the stored offset in sync with the clamped/followed value so
        // the next drag starts from where the viewport actually is.
        if let chart::ChartModel::Chart(drawn) = &model {
            self.scroll.offset = drawn.scroll_offset;
        }
        let scroll = self.scroll;

        self.terminal.draw(|frame| {
            chart::render_chart(frame, chart_area, &model);

            if !fullscreen {
                let [_, footer_area] =
                    Layout::vertical([Constraint::Min(0), Constraint::Length(1)]).areas(area);

                let playing = if frame_data.is_playing { "⏵ " } else { "" };
                let save_hint = if frame_data.can_save { "s save, " } else { "" };
                let follow_hint = if scroll.follow { "" } else { "f follow, " };
                let help = format!(
                    "{playing}space play, ←→ scroll, {follow_hint}{save_hint}z fullscreen, esc/q exit"
                );
                let footer = Paragraph::new(help)
                    .alignment(Alignment::Center)
                    .style(Style::default().fg(FOOTER_FG).bg(BG));
                frame.render_widget(footer, footer_area);
            }
        })?;

        Ok(())
    }

    /// Processes user input. Scroll, follow, and fullscreen keys are
    /// handled internally; the returned command covers the workflow keys.
    ///
    /// # Errors
    /// - If event polling fails
    pub fn handle_input(&mut self) -> Result<ReviewCommand, Box<dyn Error>> {
        if event::poll(Duration::from_millis(20))? {
            if let Event::Key(key) = event::read()? {
                return Ok(match key.code {
                    KeyCode::Char(' ') => ReviewCommand::Play,
                    KeyCode::Char('s') => ReviewCommand::Save,
                    KeyCode::Char('q') | KeyCode::Esc => ReviewCommand::Exit,
                    KeyCode::Char('c')
                        if key
                            .modifiers
                            .contains(crossterm::event::KeyModifiers::CONTROL) =>
                    {
                        ReviewCommand::Exit
                    }
                    KeyCode::Left => {
                        self.scroll.drag(-SCROLL_STEP);
                        ReviewCommand::Continue
                    }
                    KeyCode::Right => {
                        self.scroll.drag(SCROLL_STEP);
                        ReviewCommand::Continue
                    }
                    KeyCode::Char('f') => {
                        self.scroll.resume_follow();
                        ReviewCommand::Continue
                    }
                    KeyCode::Char('z') => {
                        self.fullscreen = !self.fullscreen;
                        ReviewCommand::Continue
                    }
                    _ => ReviewCommand::Continue,
                });
            }
        }
        Ok(ReviewCommand::Continue)
    }

    /// Cleans up terminal state and exits alternate screen mode.
    ///
    /// # Errors
    /// - If terminal mode cannot be disabled
    pub fn cleanup(&mut self) -> Result<(), Box<dyn Error>> {
        disable_raw_mode()?;
        execute!(self.terminal.backend_mut(), LeaveAlternateScreen)?;
        self.terminal.show_cursor()?;
        Ok(())
    }
}

impl Drop for ReviewTui {
    fn drop(&mut self) {
        let _ = self.cleanup();
    }
}
