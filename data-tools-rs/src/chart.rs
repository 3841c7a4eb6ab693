//! Chart rendering collaborators.
//!
//! The shipped renderer emits deterministic SVG scatter plots (optionally
//! with a least-squares regression line) and encodes them as base64 data
//! URIs. Encoded output is held under a hard byte ceiling: one re-render at
//! reduced fidelity is attempted before the renderer gives up and the core
//! substitutes its placeholder image.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::analysis;
use crate::error::{Result, ToolError};
use crate::table::TabularData;

/// Ceiling on the encoded (data URI) byte length of any embedded image
pub const MAX_ENCODED_IMAGE_BYTES: usize = 100_000;

/// Chart geometry
const WIDTH: f64 = 640.0;
const HEIGHT: f64 = 480.0;
const MARGIN: f64 = 48.0;

/// What to draw
#[derive(Debug, Clone, PartialEq)]
pub struct ChartSpec {
    /// Column plotted on the x axis
    pub x: String,
    /// Column plotted on the y axis
    pub y: String,
    /// Draw a least-squares regression line over the points
    pub regression: bool,
    /// Stroke color of the regression line
    pub line_color: String,
    /// Render the regression line dotted
    pub dotted: bool,
}

impl ChartSpec {
    /// A scatterplot with a dotted red regression line, the shape the
    /// canonical questions ask for
    pub fn scatter_with_regression(x: impl Into<String>, y: impl Into<String>) -> Self {
        Self {
            x: x.into(),
            y: y.into(),
            regression: true,
            line_color: "red".into(),
            dotted: true,
        }
    }
}

/// An encoded chart ready for embedding in a JSON response
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedImage {
    /// MIME type declared in the data URI
    pub mime: String,
    /// Full `data:<mime>;base64,...` string
    pub data_uri: String,
}

impl EncodedImage {
    /// Encoded length in bytes, the value the ceiling applies to
    pub fn byte_len(&self) -> usize {
        self.data_uri.len()
    }
}

/// Visualization collaborator contract
#[async_trait]
pub trait ChartRenderer: Send + Sync {
    /// Collaborator name, for logging
    fn name(&self) -> &str;

    /// Render a chart from the table, honoring the encoded-size ceiling
    async fn render(&self, data: &TabularData, spec: &ChartSpec) -> Result<EncodedImage>;
}

/// Pure-Rust SVG renderer with fidelity degradation
#[derive(Debug, Clone)]
pub struct SvgChartRenderer {
    max_encoded_bytes: usize,
    full_points: usize,
    reduced_points: usize,
}

impl Default for SvgChartRenderer {
    fn default() -> Self {
        Self {
            max_encoded_bytes: MAX_ENCODED_IMAGE_BYTES,
            full_points: 400,
            reduced_points: 40,
        }
    }
}

impl SvgChartRenderer {
    /// Renderer with a custom ceiling, used by tests and configuration
    pub fn with_ceiling(max_encoded_bytes: usize) -> Self {
        Self {
            max_encoded_bytes,
            ..Self::default()
        }
    }

    fn encode(&self, svg: &str) -> EncodedImage {
        let data_uri = format!("data:image/svg+xml;base64,{}", STANDARD.encode(svg));
        EncodedImage {
            mime: "image/svg+xml".into(),
            data_uri,
        }
    }
}

#[async_trait]
impl ChartRenderer for SvgChartRenderer {
    fn name(&self) -> &str {
        "svg-chart-renderer"
    }

    async fn render(&self, data: &TabularData, spec: &ChartSpec) -> Result<EncodedImage> {
        let pairs = data.paired_numeric(&spec.x, &spec.y)?;
        if pairs.is_empty() {
            return Err(ToolError::empty_data("no numeric point pairs to plot"));
        }

        // Full fidelity first, then exactly one reduced-fidelity pass.
        let mut last_len = 0;
        for max_points in [self.full_points, self.reduced_points] {
            let svg = draw_scatter(&pairs, spec, max_points)?;
            let image = self.encode(&svg);
            last_len = image.byte_len();
            if last_len <= self.max_encoded_bytes {
                return Ok(image);
            }
            log::warn!(
                "Rendered chart is {} bytes (ceiling {}), reducing fidelity",
                last_len,
                self.max_encoded_bytes
            );
        }
        Err(ToolError::Oversize(last_len))
    }
}

/// Evenly subsample pairs down to at most `max_points`
fn subsample(pairs: &[(f64, f64)], max_points: usize) -> Vec<(f64, f64)> {
    if pairs.len() <= max_points || max_points == 0 {
        return pairs.to_vec();
    }
    (0..max_points)
        .map(|i| pairs[i * pairs.len() / max_points])
        .collect()
}

fn draw_scatter(pairs: &[(f64, f64)], spec: &ChartSpec, max_points: usize) -> Result<String> {
    let points = subsample(pairs, max_points);

    let (min_x, max_x) = bounds(points.iter().map(|p| p.0));
    let (min_y, max_y) = bounds(points.iter().map(|p| p.1));
    let span_x = if max_x > min_x { max_x - min_x } else { 1.0 };
    let span_y = if max_y > min_y { max_y - min_y } else { 1.0 };

    let plot_w = WIDTH - 2.0 * MARGIN;
    let plot_h = HEIGHT - 2.0 * MARGIN;
    let to_px = |x: f64, y: f64| {
        (
            MARGIN + (x - min_x) / span_x * plot_w,
            HEIGHT - MARGIN - (y - min_y) / span_y * plot_h,
        )
    };

    let mut svg = String::new();
    svg.push_str(&format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{w}\" height=\"{h}\" viewBox=\"0 0 {w} {h}\">",
        w = WIDTH,
        h = HEIGHT
    ));
    svg.push_str("<rect width=\"100%\" height=\"100%\" fill=\"white\"/>");

    // Axes
    svg.push_str(&format!(
        "<line x1=\"{m}\" y1=\"{b}\" x2=\"{r}\" y2=\"{b}\" stroke=\"black\"/>",
        m = MARGIN,
        b = HEIGHT - MARGIN,
        r = WIDTH - MARGIN
    ));
    svg.push_str(&format!(
        "<line x1=\"{m}\" y1=\"{t}\" x2=\"{m}\" y2=\"{b}\" stroke=\"black\"/>",
        m = MARGIN,
        t = MARGIN,
        b = HEIGHT - MARGIN
    ));
    svg.push_str(&format!(
        "<text x=\"{x}\" y=\"{y}\" text-anchor=\"middle\" font-size=\"14\">{label}</text>",
        x = WIDTH / 2.0,
        y = HEIGHT - 12.0,
        label = xml_escape(&spec.x)
    ));
    svg.push_str(&format!(
        "<text x=\"14\" y=\"{y}\" text-anchor=\"middle\" font-size=\"14\" transform=\"rotate(-90 14 {y})\">{label}</text>",
        y = HEIGHT / 2.0,
        label = xml_escape(&spec.y)
    ));

    for (x, y) in &points {
        let (px, py) = to_px(*x, *y);
        svg.push_str(&format!(
            "<circle cx=\"{:.1}\" cy=\"{:.1}\" r=\"3\" fill=\"#1f77b4\" fill-opacity=\"0.6\"/>",
            px, py
        ));
    }

    if spec.regression && points.len() >= 2 {
        // Degenerate inputs (zero x variance) just skip the line
        if let Ok(m) = analysis::slope(&points) {
            let n = points.len() as f64;
            let mean_x = points.iter().map(|p| p.0).sum::<f64>() / n;
            let mean_y = points.iter().map(|p| p.1).sum::<f64>() / n;
            let intercept = mean_y - m * mean_x;
            let (x1, y1) = to_px(min_x, m * min_x + intercept);
            let (x2, y2) = to_px(max_x, m * max_x + intercept);
            let dash = if spec.dotted {
                " stroke-dasharray=\"6 4\""
            } else {
                ""
            };
            svg.push_str(&format!(
                "<line x1=\"{:.1}\" y1=\"{:.1}\" x2=\"{:.1}\" y2=\"{:.1}\" stroke=\"{}\" stroke-width=\"2\"{}/>",
                x1,
                y1,
                x2,
                y2,
                xml_escape(&spec.line_color),
                dash
            ));
        }
    }

    svg.push_str("</svg>");
    Ok(svg)
}

fn bounds(values: impl Iterator<Item = f64>) -> (f64, f64) {
    values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    })
}

fn xml_escape(raw: &str) -> String {
    raw.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}
