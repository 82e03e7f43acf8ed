//! Draw-model construction for the waveform chart.
//!
//! A chart frame is computed as plain geometry first (axis, gridlines,
//! polyline, ticks, cursor) and only then painted by the view layer. The
//! builder is a pure function of its inputs, so scroll clamping, cursor
//! rescaling, and the degenerate cases are all testable without a terminal.
//!
//! Coordinates are abstract pixels. The polyline is emitted in content
//! space: in review mode the content may be wider than the viewport and the
//! view shifts primitives left by the resolved scroll offset.

use crate::chart::downsample::downsample;

/// Chart paddings around the plot region.
pub const PADDING_TOP: f64 = 20.0;
pub const PADDING_BOTTOM: f64 = 30.0;
pub const PADDING_LEFT: f64 = 40.0;
pub const PADDING_RIGHT: f64 = 20.0;

/// Number of divisions of the y range `[-y_max, +y_max]`.
const Y_DIVISIONS: usize = 12;
/// Number of x-axis tick labels in review mode.
const X_TICKS: usize = 5;

/// Rendering mode of the chart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartMode {
    /// Fixed viewport fed by the live capture window; x axis shows only the
    /// total elapsed time (a full tick scale would thrash at capture rate).
    Live,
    /// Scrollable view over a full recording, downsampled to a bounded
    /// point budget, with an optional playback cursor.
    Review,
}

/// How the vertical range is chosen.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum YAxisPolicy {
    /// Fixed `y_max` in Pascal (live mode).
    Fixed(f64),
    /// Derived from the data: `max(|data|) * headroom`, clamped to `min`
    /// so quiet recordings don't render as flat lines (review mode).
    FromData { headroom: f64, min: f64 },
}

impl YAxisPolicy {
    fn resolve(&self, data: &[f64]) -> f64 {
        match *self {
            YAxisPolicy::Fixed(y_max) => y_max,
            YAxisPolicy::FromData { headroom, min } => {
                let peak = data.iter().fold(0.0f64, |acc, v| acc.max(v.abs()));
                (peak * headroom).max(min)
            }
        }
    }
}

/// Canvas size available for one chart frame.
#[derive(Debug, Clone, Copy)]
pub struct ChartGeometry {
    pub canvas_width: f64,
    pub canvas_height: f64,
}

impl ChartGeometry {
    pub fn new(canvas_width: f64, canvas_height: f64) -> Self {
        Self {
            canvas_width,
            canvas_height,
        }
    }

    /// Width of the plot region visible at once.
    pub fn viewport_width(&self) -> f64 {
        (self.canvas_width - PADDING_LEFT - PADDING_RIGHT).max(1.0)
    }

    pub fn plot_height(&self) -> f64 {
        (self.canvas_height - PADDING_TOP - PADDING_BOTTOM).max(1.0)
    }
}

/// Horizontal scroll state of a review chart.
///
/// `offset` is in content pixels; `follow` re-centers the viewport on the
/// playback cursor each frame until the user drags manually.
#[derive(Debug, Clone, Copy)]
pub struct ScrollState {
    pub offset: f64,
    pub follow: bool,
}

impl Default for ScrollState {
    fn default() -> Self {
        Self {
            offset: 0.0,
            follow: true,
        }
    }
}

impl ScrollState {
    /// User drag: moves the viewport and disables follow.
    pub fn drag(&mut self, delta: f64) {
        self.offset += delta;
        self.follow = false;
    }

    pub fn resume_follow(&mut self) {
        self.follow = true;
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    pub from: Point,
    pub to: Point,
}

/// One horizontal guide line with its Pascal value.
#[derive(Debug, Clone, PartialEq)]
pub struct Gridline {
    pub y: f64,
    pub value: f64,
    /// The zero line is drawn emphasized.
    pub zero: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct XTick {
    pub x: f64,
    pub label: String,
}

/// Vertical playback indicator in content coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct CursorIndicator {
    pub x: f64,
    /// Index into the downsampled polyline the cursor maps to.
    pub ds_index: usize,
    /// Elapsed-time label, e.g. "3.42s".
    pub label: String,
}

/// Everything the view needs to paint one chart frame.
#[derive(Debug, Clone)]
pub struct DrawModel {
    pub geometry: ChartGeometry,
    pub y_max: f64,
    /// Width of the full plotted content; `>= viewport_width` in review.
    pub content_width: f64,
    /// Clamped horizontal offset the view subtracts from content x.
    pub scroll_offset: f64,
    pub y_axis: Segment,
    pub gridlines: Vec<Gridline>,
    /// Polyline through the (downsampled) data, content coordinates.
    pub polyline: Vec<Point>,
    pub x_ticks: Vec<XTick>,
    pub cursor: Option<CursorIndicator>,
}

/// A chart frame: either drawable content or a placeholder.
#[derive(Debug, Clone)]
pub enum ChartModel {
    /// Fewer than two samples: a single point cannot define a line, so the
    /// view shows a message instead of a degenerate path.
    Placeholder { message: String },
    Chart(DrawModel),
}

/// Inputs for one chart frame.
pub struct ChartParams<'a> {
    /// Full-resolution values (Pascal), oldest first.
    pub data: &'a [f64],
    pub sample_rate: u32,
    pub mode: ChartMode,
    pub y_axis: YAxisPolicy,
    pub geometry: ChartGeometry,
    /// Downsample budget for review mode; live mode uses the viewport width.
    pub target_points: usize,
    /// Total samples captured this session, when `data` is only the live
    /// window; drives the elapsed-time label.
    pub total_samples: Option<usize>,
    /// Playback position as an index into the original `data`.
    pub cursor: Option<usize>,
    pub scroll: ScrollState,
}

/// Maps an index in the original sequence to the downsampled sequence by
/// proportional rescale.
pub fn rescale_cursor(original_index: usize, original_len: usize, target_len: usize) -> usize {
    if original_len == 0 || target_len == 0 {
        return 0;
    }
    let scaled =
        (original_index as f64 * target_len as f64 / original_len as f64).round() as usize;
    scaled.min(target_len.saturating_sub(1))
}

/// Builds the draw model for one frame.
pub fn build(params: &ChartParams) -> ChartModel {
    if params.data.len() < 2 {
        return ChartModel::Placeholder {
            message: "waiting for data".to_string(),
        };
    }

    let geometry = params.geometry;
    let viewport_width = geometry.viewport_width();
    let plot_height = geometry.plot_height();
    let y_max = params.y_axis.resolve(params.data);

    // Live charts are decimated to the pixels actually available; review
    // charts to the configured budget so render cost stays bounded for
    // long recordings regardless of viewport width.
    let budget = match params.mode {
        ChartMode::Live => viewport_width.floor() as usize,
        ChartMode::Review => params.target_points,
    };
    let plotted = downsample(params.data, budget);

    // Review content grows to one pixel per plotted point once the data
    // outgrows the viewport, which is what makes it scrollable.
    let content_width = match params.mode {
        ChartMode::Live => viewport_width,
        ChartMode::Review => viewport_width.max(plotted.len() as f64),
    };

    let zero_y = PADDING_TOP + plot_height / 2.0;
    let value_to_y = |value: f64| zero_y - (value / y_max) * (plot_height / 2.0);

    let scale_x = if plotted.len() > 1 {
        content_width / (plotted.len() - 1) as f64
    } else {
        content_width
    };

    let polyline: Vec<Point> = plotted
        .iter()
        .enumerate()
        .map(|(i, &value)| Point {
            x: PADDING_LEFT + i as f64 * scale_x,
            y: value_to_y(value),
        })
        .collect();

    let gridlines = build_gridlines(y_max, &value_to_y);
    let x_ticks = build_x_ticks(params, content_width);

    let cursor = params.cursor.map(|original_index| {
        let ds_index = rescale_cursor(original_index, params.data.len(), plotted.len());
        let seconds = original_index as f64 / params.sample_rate as f64;
        CursorIndicator {
            x: PADDING_LEFT + ds_index as f64 * scale_x,
            ds_index,
            label: format!("{seconds:.2}s"),
        }
    });

    let scroll_offset = resolve_scroll(
        params.scroll,
        cursor.as_ref().map(|c| c.x),
        content_width,
        viewport_width,
    );

    ChartModel::Chart(DrawModel {
        geometry,
        y_max,
        content_width,
        scroll_offset,
        y_axis: Segment {
            from: Point {
                x: PADDING_LEFT,
                y: PADDING_TOP,
            },
            to: Point {
                x: PADDING_LEFT,
                y: PADDING_TOP + plot_height,
            },
        },
        gridlines,
        polyline,
        x_ticks,
        cursor,
    })
}

fn build_gridlines(y_max: f64, value_to_y: &impl Fn(f64) -> f64) -> Vec<Gridline> {
    let step = 2.0 * y_max / Y_DIVISIONS as f64;
    (0..=Y_DIVISIONS)
        .map(|i| {
            let value = y_max - i as f64 * step;
            Gridline {
                y: value_to_y(value),
                value,
                zero: value.abs() < step / 2.0,
            }
        })
        .collect()
}

fn build_x_ticks(params: &ChartParams, content_width: f64) -> Vec<XTick> {
    let total_samples = params.total_samples.unwrap_or(params.data.len());
    let total_seconds = total_samples as f64 / params.sample_rate as f64;

    match params.mode {
        // A full tick scale would redraw with every chunk; only the total
        // elapsed time is shown at the right edge.
        ChartMode::Live => vec![XTick {
            x: PADDING_LEFT + content_width,
            label: format_elapsed(total_seconds),
        }],
        ChartMode::Review => {
            let mut ticks: Vec<XTick> = (0..X_TICKS)
                .map(|i| {
                    let fraction = i as f64 / (X_TICKS - 1) as f64;
                    XTick {
                        x: PADDING_LEFT + fraction * content_width,
                        label: format!("{:.2}s", fraction * total_seconds),
                    }
                })
                .collect();
            // Pin the last tick to the exact end of the recording.
            if let Some(last) = ticks.last_mut() {
                last.x = PADDING_LEFT + content_width;
                last.label = format!("{total_seconds:.2}s");
            }
            ticks
        }
    }
}

/// Resolves the effective scroll offset: follow centers the cursor, then
/// the result is clamped so the viewport never leaves the content bounds.
fn resolve_scroll(
    scroll: ScrollState,
    cursor_x: Option<f64>,
    content_width: f64,
    viewport_width: f64,
) -> f64 {
    let max_offset = (content_width - viewport_width).max(0.0);

    let desired = if scroll.follow {
        match cursor_x {
            Some(x) => (x - PADDING_LEFT) - viewport_width / 2.0,
            None => scroll.offset,
        }
    } else {
        scroll.offset
    };

    desired.clamp(0.0, max_offset)
}

fn format_elapsed(total_seconds: f64) -> String {
    let whole = total_seconds as u64;
    format!("{}:{:02}", whole / 60, whole % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params<'a>(data: &'a [f64], mode: ChartMode) -> ChartParams<'a> {
        ChartParams {
            data,
            sample_rate: 20000,
            mode,
            y_axis: YAxisPolicy::Fixed(1.5),
            geometry: ChartGeometry::new(260.0, 150.0),
            target_points: 5000,
            total_samples: None,
            cursor: None,
            scroll: ScrollState::default(),
        }
    }

    #[test]
    fn test_fewer_than_two_samples_is_placeholder() {
        for data in [vec![], vec![0.5]] {
            match build(&params(&data, ChartMode::Live)) {
                ChartModel::Placeholder { .. } => {}
                ChartModel::Chart(_) => panic!("expected placeholder for {} samples", data.len()),
            }
        }
    }

    #[test]
    fn test_two_samples_produce_a_polyline() {
        let data = vec![0.0, 1.0];
        match build(&params(&data, ChartMode::Live)) {
            ChartModel::Chart(model) => assert_eq!(model.polyline.len(), 2),
            ChartModel::Placeholder { .. } => panic!("expected chart"),
        }
    }

    #[test]
    fn test_zero_is_vertically_centered() {
        let data = vec![0.0, 0.0, 0.0];
        let model = match build(&params(&data, ChartMode::Live)) {
            ChartModel::Chart(m) => m,
            _ => panic!("expected chart"),
        };
        let geometry = ChartGeometry::new(260.0, 150.0);
        let expected_zero_y = PADDING_TOP + geometry.plot_height() / 2.0;
        for point in &model.polyline {
            assert!((point.y - expected_zero_y).abs() < 1e-9);
        }
        let zero_line = model.gridlines.iter().find(|g| g.zero).unwrap();
        assert!((zero_line.y - expected_zero_y).abs() < 1e-9);
    }

    #[test]
    fn test_gridline_count_and_range() {
        let data = vec![0.1, -0.1];
        let model = match build(&params(&data, ChartMode::Live)) {
            ChartModel::Chart(m) => m,
            _ => panic!("expected chart"),
        };
        assert_eq!(model.gridlines.len(), 13);
        assert!((model.gridlines.first().unwrap().value - 1.5).abs() < 1e-9);
        assert!((model.gridlines.last().unwrap().value + 1.5).abs() < 1e-9);
        assert_eq!(model.gridlines.iter().filter(|g| g.zero).count(), 1);
    }

    #[test]
    fn test_review_y_max_derived_with_min_clamp() {
        let quiet = vec![0.001, -0.002, 0.0015];
        let mut p = params(&quiet, ChartMode::Review);
        p.y_axis = YAxisPolicy::FromData {
            headroom: 1.1,
            min: 0.1,
        };
        let model = match build(&p) {
            ChartModel::Chart(m) => m,
            _ => panic!("expected chart"),
        };
        assert_eq!(model.y_max, 0.1);

        let loud = vec![2.0, -3.0];
        let mut p = params(&loud, ChartMode::Review);
        p.y_axis = YAxisPolicy::FromData {
            headroom: 1.1,
            min: 0.1,
        };
        let model = match build(&p) {
            ChartModel::Chart(m) => m,
            _ => panic!("expected chart"),
        };
        assert!((model.y_max - 3.3).abs() < 1e-9);
    }

    #[test]
    fn test_cursor_rescale_is_proportional() {
        assert_eq!(rescale_cursor(5000, 10000, 1000), 500);
        assert_eq!(rescale_cursor(0, 10000, 1000), 0);
        // End of content maps to the last downsampled point.
        assert!(rescale_cursor(9999, 10000, 1000) >= 999);
    }

    #[test]
    fn test_cursor_indicator_position_and_label() {
        let data: Vec<f64> = (0..10000).map(|i| (i % 3) as f64).collect();
        let mut p = params(&data, ChartMode::Review);
        p.target_points = 1000;
        p.cursor = Some(5000);
        let model = match build(&p) {
            ChartModel::Chart(m) => m,
            _ => panic!("expected chart"),
        };
        let cursor = model.cursor.unwrap();
        assert!((cursor.ds_index as i64 - 500).unsigned_abs() <= 1);
        // 5000 samples at 20 kHz = 0.25s.
        assert_eq!(cursor.label, "0.25s");
        let expected_x = PADDING_LEFT + cursor.ds_index as f64 * model.content_width / 999.0;
        assert!((cursor.x - expected_x).abs() < 1e-9);
    }

    #[test]
    fn test_review_content_wider_than_viewport() {
        let data: Vec<f64> = (0..100000).map(|i| i as f64).collect();
        let mut p = params(&data, ChartMode::Review);
        p.target_points = 5000;
        let model = match build(&p) {
            ChartModel::Chart(m) => m,
            _ => panic!("expected chart"),
        };
        assert!(model.content_width >= 4999.0);
        assert!(model.polyline.len() <= 5000);
    }

    #[test]
    fn test_live_mode_downsamples_to_viewport() {
        let data: Vec<f64> = (0..100000).map(|i| i as f64).collect();
        let model = match build(&params(&data, ChartMode::Live)) {
            ChartModel::Chart(m) => m,
            _ => panic!("expected chart"),
        };
        let viewport = ChartGeometry::new(260.0, 150.0).viewport_width();
        assert!(model.polyline.len() as f64 <= viewport);
        assert_eq!(model.content_width, viewport);
        assert_eq!(model.scroll_offset, 0.0);
    }

    #[test]
    fn test_scroll_clamped_to_content_bounds() {
        let data: Vec<f64> = (0..100000).map(|i| i as f64).collect();
        let mut p = params(&data, ChartMode::Review);
        p.target_points = 5000;
        p.scroll = ScrollState {
            offset: 1.0e9,
            follow: false,
        };
        let model = match build(&p) {
            ChartModel::Chart(m) => m,
            _ => panic!("expected chart"),
        };
        let viewport = p.geometry.viewport_width();
        assert!((model.scroll_offset - (model.content_width - viewport)).abs() < 1e-9);

        p.scroll.offset = -500.0;
        let model = match build(&p) {
            ChartModel::Chart(m) => m,
            _ => panic!("expected chart"),
        };
        assert_eq!(model.scroll_offset, 0.0);
    }

    #[test]
    fn test_follow_centers_cursor() {
        let data: Vec<f64> = (0..100000).map(|i| i as f64).collect();
        let mut p = params(&data, ChartMode::Review);
        p.target_points = 5000;
        p.cursor = Some(50000);
        p.scroll = ScrollState {
            offset: 0.0,
            follow: true,
        };
        let model = match build(&p) {
            ChartModel::Chart(m) => m,
            _ => panic!("expected chart"),
        };
        let cursor = model.cursor.as_ref().unwrap();
        let viewport = p.geometry.viewport_width();
        let centered = (cursor.x - PADDING_LEFT) - viewport / 2.0;
        assert!((model.scroll_offset - centered).abs() < 1e-9);
    }

    #[test]
    fn test_live_shows_only_elapsed_time() {
        let data: Vec<f64> = vec![0.0; 40000];
        let model = match build(&params(&data, ChartMode::Live)) {
            ChartModel::Chart(m) => m,
            _ => panic!("expected chart"),
        };
        // 40000 samples at 20 kHz = 2 seconds.
        assert_eq!(model.x_ticks.len(), 1);
        assert_eq!(model.x_ticks[0].label, "0:02");
    }

    #[test]
    fn test_review_ticks_span_recording() {
        let data: Vec<f64> = vec![0.0; 40000];
        let model = match build(&params(&data, ChartMode::Review)) {
            ChartModel::Chart(m) => m,
            _ => panic!("expected chart"),
        };
        assert_eq!(model.x_ticks.len(), 5);
        assert_eq!(model.x_ticks[0].label, "0.00s");
        assert_eq!(model.x_ticks[4].label, "2.00s");
    }

    #[test]
    fn test_drag_disables_follow() {
        let mut scroll = ScrollState::default();
        assert!(scroll.follow);
        scroll.drag(25.0);
        assert!(!scroll.follow);
        assert_eq!(scroll.offset, 25.0);
        scroll.resume_follow();
        assert!(scroll.follow);
    }
}
