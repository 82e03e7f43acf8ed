//! Painting of a chart draw model onto a ratatui frame.
//!
//! The model is pure geometry in abstract pixels; this module maps it onto
//! a braille canvas whose coordinate bounds match the model's canvas, so
//! the mapping math stays in one place. Scrolled-out primitives are culled
//! here, not in the model.

use crate::chart::model::{ChartModel, DrawModel, PADDING_LEFT};
use ratatui::{
    prelude::*,
    symbols,
    widgets::{
        canvas::{Canvas, Line as CanvasLine},
        Block, Paragraph,
    },
};

const WAVEFORM: Color = Color::Rgb(206, 224, 220);
const GRID: Color = Color::Rgb(60, 60, 60);
const GRID_ZERO: Color = Color::Rgb(150, 150, 150);
const AXIS: Color = Color::Gray;
const LABEL: Color = Color::Rgb(100, 100, 100);
const CURSOR: Color = Color::Red;
const BG: Color = Color::Rgb(0, 0, 0);

impl crate::chart::model::ChartGeometry {
    /// Chart geometry for a terminal area, at braille dot resolution
    /// (2 dots per cell horizontally, 4 vertically).
    pub fn from_area(area: Rect) -> Self {
        Self::new(f64::from(area.width) * 2.0, f64::from(area.height) * 4.0)
    }
}

/// Renders a chart frame into `area`.
pub fn render_chart(frame: &mut Frame, area: Rect, chart: &ChartModel) {
    match chart {
        ChartModel::Placeholder { message } => render_placeholder(frame, area, message),
        ChartModel::Chart(model) => render_model(frame, area, model),
    }
}

fn render_placeholder(frame: &mut Frame, area: Rect, message: &str) {
    let block = Block::default().style(Style::default().bg(BG));
    frame.render_widget(&block, area);

    let [_, middle, _] = Layout::vertical([
        Constraint::Fill(1),
        Constraint::Length(1),
        Constraint::Fill(1),
    ])
    .areas(area);

    let paragraph = Paragraph::new(message.to_string())
        .alignment(Alignment::Center)
        .style(Style::default().fg(LABEL).bg(BG));
    frame.render_widget(paragraph, middle);
}

fn render_model(frame: &mut Frame, area: Rect, model: &DrawModel) {
    let height = model.geometry.canvas_height;
    let viewport_right = PADDING_LEFT + model.geometry.viewport_width();
    let offset = model.scroll_offset;

    let canvas = Canvas::default()
        .background_color(BG)
        .marker(symbols::Marker::Braille)
        .x_bounds([0.0, model.geometry.canvas_width])
        .y_bounds([0.0, height])
        .paint(|ctx| {
            // The model's y axis grows downward; the canvas grows upward.
            let flip = |y: f64| height - y;

            for gridline in &model.gridlines {
                let color = if gridline.zero { GRID_ZERO } else { GRID };
                ctx.draw(&CanvasLine {
                    x1: PADDING_LEFT,
                    y1: flip(gridline.y),
                    x2: viewport_right,
                    y2: flip(gridline.y),
                    color,
                });
                ctx.print(
                    2.0,
                    flip(gridline.y),
                    Line::styled(
                        format!("{:>5.2}", gridline.value),
                        Style::default().fg(LABEL),
                    ),
                );
            }

            ctx.draw(&CanvasLine {
                x1: model.y_axis.from.x,
                y1: flip(model.y_axis.from.y),
                x2: model.y_axis.to.x,
                y2: flip(model.y_axis.to.y),
                color: AXIS,
            });
            ctx.print(
                2.0,
                flip(model.y_axis.from.y - 8.0),
                Line::styled("(Pa)", Style::default().fg(LABEL)),
            );

            for pair in model.polyline.windows(2) {
                let x1 = pair[0].x - offset;
                let x2 = pair[1].x - offset;
                if x2 < PADDING_LEFT || x1 > viewport_right {
                    continue;
                }
                ctx.draw(&CanvasLine {
                    x1: x1.max(PADDING_LEFT),
                    y1: flip(pair[0].y),
                    x2: x2.min(viewport_right),
                    y2: flip(pair[1].y),
                    color: WAVEFORM,
                });
            }

            for tick in &model.x_ticks {
                let x = tick.x - offset;
                if x < PADDING_LEFT || x > viewport_right {
                    continue;
                }
                ctx.print(
                    x,
                    2.0,
                    Line::styled(tick.label.clone(), Style::default().fg(LABEL)),
                );
            }

            if let Some(cursor) = &model.cursor {
                let x = cursor.x - offset;
                if x >= PADDING_LEFT && x <= viewport_right {
                    ctx.draw(&CanvasLine {
                        x1: x,
                        y1: flip(model.y_axis.from.y),
                        x2: x,
                        y2: flip(model.y_axis.to.y),
                        color: CURSOR,
                    });
                    ctx.print(
                        x,
                        flip(model.y_axis.from.y - 8.0),
                        Line::styled(cursor.label.clone(), Style::default().fg(CURSOR)),
                    );
                }
            }
        });

    frame.render_widget(canvas, area);
}
