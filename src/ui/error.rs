//! Full-screen error surface for session-level failures.
//!
//! Source-unavailable and save failures must be visible, never silent:
//! clinical data loss has to be observable. The screen stays up until the
//! user dismisses it with any key.

use crossterm::{
    event::{self, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{prelude::*, widgets::Paragraph};
use std::io::{self, Stdout};
use std::time::Duration;

const ERROR_BG: Color = Color::Rgb(255, 0, 0);
const ERROR_FG: Color = Color::Rgb(255, 255, 255);

/// Error screen for displaying human-readable error messages.
pub struct ErrorScreen {
    terminal: Terminal<CrosstermBackend<Stdout>>,
}

impl ErrorScreen {
    /// Creates a new error screen and enters alternate screen mode.
    ///
    /// # Errors
    /// - If terminal cannot be initialized
    /// - If raw mode cannot be enabled
    pub fn new() -> anyhow::Result<Self> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;

        let backend = CrosstermBackend::new(stdout);
        let terminal = Terminal::new(backend)?;

        Ok(ErrorScreen { terminal })
    }

    /// Displays an error message on a full red screen with centered white
    /// text, waiting for any key press to dismiss.
    ///
    /// # Errors
    /// - If terminal rendering fails
    pub fn show_error(&mut self, error_message: &str) -> anyhow::Result<()> {
        loop {
            self.terminal.draw(|frame| {
                let area = frame.area();

                frame.render_widget(
                    ratatui::widgets::Block::default().style(Style::default().bg(ERROR_BG)),
                    area,
                );

                let [_, message_area, hint_area, _] = Layout::vertical([
                    Constraint::Fill(1),
                    Constraint::Length(area.height / 4),
                    Constraint::Length(1),
                    Constraint::Fill(1),
                ])
                .areas(area);

                let padding_x = area.width / 10;
                let message_area = Rect {
                    x: message_area.x + padding_x,
                    width: message_area.width.saturating_sub(padding_x * 2),
                    ..message_area
                };

                let paragraph = Paragraph::new(error_message.to_string())
                    .alignment(Alignment::Center)
                    .style(Style::default().fg(ERROR_FG).bg(ERROR_BG))
                    .wrap(ratatui::widgets::Wrap { trim: true });
                frame.render_widget(paragraph, message_area);

                let hint = Paragraph::new("press any key to continue")
                    .alignment(Alignment::Center)
                    .style(Style::default().fg(ERROR_FG).bg(ERROR_BG));
                frame.render_widget(hint, hint_area);
            })?;

            if event::poll(Duration::from_millis(100))? {
                if let Event::Key(_) = event::read()? {
                    break;
                }
            }
        }

        Ok(())
    }

    /// Cleans up terminal state and exits alternate screen mode.
    ///
    /// # Errors
    /// - If terminal mode cannot be disabled
    pub fn cleanup(&mut self) -> anyhow::Result<()> {
        disable_raw_mode()?;
        execute!(self.terminal.backend_mut(), LeaveAlternateScreen)?;
        self.terminal.show_cursor()?;
        Ok(())
    }
}

impl Drop for ErrorScreen {
    fn drop(&mut self) {
        let _ = self.cleanup();
    }
}
