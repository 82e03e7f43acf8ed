//! Interactive terminal UI for browsing a patient's meterings.
//!
//! Provides a scrollable list of saved sessions with keyboard navigation
//! and selection; the selected metering is handed back for review.

use crate::records::storage::{Metering, Tag};
use anyhow::Result;
use crossterm::{
    event::{
        self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, MouseEvent, MouseEventKind,
    },
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, HighlightSpacing, List, ListItem, ListState, Padding, Paragraph},
};
use std::io::{self, Stdout};
use std::time::Duration;

const BG: Color = Color::Rgb(0, 0, 0);
const FG: Color = Color::Rgb(255, 255, 255);
const TIMESTAMP_FG: Color = Color::Rgb(100, 100, 100);
const HIGHLIGHT_BG: Color = Color::Rgb(20, 20, 20);
const HELP_FG: Color = Color::Rgb(100, 100, 100);

fn tag_color(tag: Tag) -> Color {
    match tag {
        Tag::Red => Color::Red,
        Tag::Green => Color::Green,
        Tag::Blue => Color::Blue,
    }
}

/// Interactive browser over a patient's saved meterings.
pub struct MeteringBrowser {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    patient_name: String,
    entries: Vec<Metering>,
    list_state: ListState,
}

impl MeteringBrowser {
    /// Creates a browser over the given meterings, most recent first.
    pub fn new(patient_name: String, entries: Vec<Metering>) -> Result<Self> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;

        let backend = CrosstermBackend::new(stdout);
        let terminal = Terminal::new(backend)?;

        let mut list_state = ListState::default();
        if !entries.is_empty() {
            list_state.select(Some(0));
        }

        Ok(Self {
            terminal,
            patient_name,
            entries,
            list_state,
        })
    }

    /// Runs the browser loop; returns the id of the selected metering, or
    /// `None` when the user exited without selecting.
    pub fn run(&mut self) -> Result<Option<i64>> {
        if self.entries.is_empty() {
            self.cleanup()?;
            return Ok(None);
        }

        tracing::debug!("Metering browser started with {} entries", self.entries.len());

        let selected = loop {
            self.draw()?;

            if event::poll(Duration::from_millis(50))? {
                match event::read()? {
                    Event::Key(key) => match key.code {
                        KeyCode::Char('q') | KeyCode::Esc => break None,
                        KeyCode::Up => self.list_state.select_previous(),
                        KeyCode::Down => self.list_state.select_next(),
                        KeyCode::Enter => {
                            if let Some(idx) = self.list_state.selected() {
                                break Some(self.entries[idx].id);
                            }
                        }
                        _ => {}
                    },
                    Event::Mouse(mouse) => self.handle_mouse(mouse),
                    _ => {}
                }
            }
        };

        self.cleanup()?;
        Ok(selected)
    }

    fn handle_mouse(&mut self, mouse: MouseEvent) {
        match mouse.kind {
            MouseEventKind::ScrollUp => self.list_state.select_previous(),
            MouseEventKind::ScrollDown => self.list_state.select_next(),
            _ => {}
        }
    }

    /// Renders the current state of the browser.
    fn draw(&mut self) -> Result<()> {
        let title = format!(" {} ", self.patient_name);

        self.terminal.draw(|frame| {
            let area = frame.area();

            let padding_block = Block::default()
                .padding(Padding::uniform(1))
                .style(Style::default().bg(BG));
            frame.render_widget(&padding_block, area);
            let padded_area = padding_block.inner(area);

            let [list_area, footer_area] =
                Layout::vertical([Constraint::Min(0), Constraint::Length(1)]).areas(padded_area);

            let items: Vec<ListItem> = self
                .entries
                .iter()
                .map(|entry| {
                    let duration = entry.data.len();
                    let header = Line::from(vec![
                        Span::styled("● ", Style::default().fg(tag_color(entry.tag))),
                        Span::styled(
                            entry.date.format("%Y-%m-%d %H:%M:%S").to_string(),
                            Style::default().fg(TIMESTAMP_FG),
                        ),
                        Span::styled(
                            format!("  {duration} samples"),
                            Style::default().fg(TIMESTAMP_FG),
                        ),
                    ]);
                    let observations = Line::styled(
                        entry.observations.clone().unwrap_or_default(),
                        Style::default().fg(FG),
                    );
                    ListItem::new(vec![header, observations])
                })
                .collect();

            let list = List::new(items)
                .block(
                    Block::default()
                        .title(title.clone())
                        .borders(Borders::ALL)
                        .padding(Padding::bottom(1)),
                )
                .highlight_style(Style::default().bg(HIGHLIGHT_BG))
                .highlight_symbol("> ")
                .highlight_spacing(HighlightSpacing::Always);

            frame.render_stateful_widget(list, list_area, &mut self.list_state);

            let help_text = "↑↓ select, ↵ review, esc/q exit";
            let help_paragraph = Paragraph::new(help_text)
                .alignment(Alignment::Center)
                .style(Style::default().fg(HELP_FG));
            frame.render_widget(help_paragraph, footer_area);
        })?;

        Ok(())
    }

    /// Cleans up terminal and restores normal mode.
    fn cleanup(&mut self) -> Result<()> {
        disable_raw_mode()?;
        execute!(
            self.terminal.backend_mut(),
            LeaveAlternateScreen,
            DisableMouseCapture
        )?;
        self.terminal.show_cursor()?;
        tracing::debug!("Metering browser terminal cleanup complete");
        Ok(())
    }
}

impl Drop for MeteringBrowser {
    fn drop(&mut self) {
        let _ = self.cleanup();
    }
}
