//! Static SVG charts for the gold views.
//!
//! Charts are plain SVG documents built as strings; every label is escaped
//! before it is embedded.

const WIDTH: f64 = 1000.0;
const HEIGHT: f64 = 600.0;
const MARGIN_TOP: f64 = 60.0;
const MARGIN_RIGHT: f64 = 40.0;
const MARGIN_BOTTOM: f64 = 80.0;
const MARGIN_LEFT: f64 = 90.0;
/// Horizontal bar charts need room for category names on the left
const MARGIN_LEFT_WIDE: f64 = 300.0;
const VALUE_TICKS: u64 = 5;
const MAX_CATEGORY_LABELS: usize = 40;
const MAX_LABEL_CHARS: usize = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartKind {
    HorizontalBar,
    VerticalBar,
    Line,
}

/// Titles and colours of one chart
#[derive(Debug, Clone)]
pub struct ChartSpec {
    pub kind: ChartKind,
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub color: &'static str,
}

/// Escape text for use inside SVG element content or attribute values
pub fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

/// Smallest 1/2/5 × 10^n that is at least `value`
pub fn nice_ceiling(value: u64) -> u64 {
    if value == 0 {
        return 1;
    }
    let mut magnitude = 1u64;
    while magnitude.saturating_mul(10) <= value {
        magnitude *= 10;
    }
    for step in [1u64, 2, 5, 10] {
        let candidate = step.saturating_mul(magnitude);
        if candidate >= value {
            return candidate;
        }
    }
    value
}

fn truncate_label(label: &str) -> String {
    if label.chars().count() <= MAX_LABEL_CHARS {
        return label.to_string();
    }
    let mut short: String = label.chars().take(MAX_LABEL_CHARS - 1).collect();
    short.push('…');
    short
}

/// Show every k-th category label so dense axes stay readable
fn label_stride(count: usize) -> usize {
    ((count + MAX_CATEGORY_LABELS - 1) / MAX_CATEGORY_LABELS).max(1)
}

struct Plot {
    left: f64,
    top: f64,
    width: f64,
    height: f64,
    max: u64,
}

impl Plot {
    fn new(kind: ChartKind, points: &[(String, u64)]) -> Self {
        let left = if kind == ChartKind::HorizontalBar { MARGIN_LEFT_WIDE } else { MARGIN_LEFT };
        let max = nice_ceiling(points.iter().map(|(_, v)| *v).max().unwrap_or(0));
        Self {
            left,
            top: MARGIN_TOP,
            width: WIDTH - left - MARGIN_RIGHT,
            height: HEIGHT - MARGIN_TOP - MARGIN_BOTTOM,
            max,
        }
    }

    fn bottom(&self) -> f64 {
        self.top + self.height
    }

    fn scale(&self, value: u64, length: f64) -> f64 {
        value as f64 / self.max as f64 * length
    }
}

/// Render `points` (label, value) as a complete SVG document
pub fn render_chart(spec: &ChartSpec, points: &[(String, u64)]) -> String {
    let plot = Plot::new(spec.kind, points);
    let mut svg = String::new();

    svg.push_str(&format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{w}\" height=\"{h}\" viewBox=\"0 0 {w} {h}\" font-family=\"sans-serif\">\n",
        w = WIDTH,
        h = HEIGHT
    ));
    svg.push_str("<rect width=\"100%\" height=\"100%\" fill=\"white\"/>\n");
    svg.push_str(&format!(
        "<text x=\"{:.1}\" y=\"32\" font-size=\"20\" text-anchor=\"middle\">{}</text>\n",
        WIDTH / 2.0,
        escape_xml(&spec.title)
    ));

    if points.is_empty() {
        svg.push_str(&format!(
            "<text x=\"{:.1}\" y=\"{:.1}\" font-size=\"16\" fill=\"#777\" text-anchor=\"middle\">No data</text>\n",
            WIDTH / 2.0,
            HEIGHT / 2.0
        ));
    } else {
        match spec.kind {
            ChartKind::HorizontalBar => horizontal_bars(&mut svg, &plot, spec, points),
            ChartKind::VerticalBar => vertical_bars(&mut svg, &plot, spec, points),
            ChartKind::Line => line(&mut svg, &plot, spec, points),
        }
    }

    axis_titles(&mut svg, &plot, spec);
    svg.push_str("</svg>\n");
    svg
}

fn axis_titles(svg: &mut String, plot: &Plot, spec: &ChartSpec) {
    svg.push_str(&format!(
        "<text x=\"{:.1}\" y=\"{:.1}\" font-size=\"14\" text-anchor=\"middle\">{}</text>\n",
        plot.left + plot.width / 2.0,
        HEIGHT - 20.0,
        escape_xml(&spec.x_label)
    ));
    let y_center = plot.top + plot.height / 2.0;
    svg.push_str(&format!(
        "<text x=\"20\" y=\"{:.1}\" font-size=\"14\" text-anchor=\"middle\" transform=\"rotate(-90 20 {:.1})\">{}</text>\n",
        y_center,
        y_center,
        escape_xml(&spec.y_label)
    ));
}

fn axes(svg: &mut String, plot: &Plot) {
    svg.push_str(&format!(
        "<line x1=\"{l:.1}\" y1=\"{t:.1}\" x2=\"{l:.1}\" y2=\"{b:.1}\" stroke=\"black\"/>\n\
         <line x1=\"{l:.1}\" y1=\"{b:.1}\" x2=\"{r:.1}\" y2=\"{b:.1}\" stroke=\"black\"/>\n",
        l = plot.left,
        t = plot.top,
        b = plot.bottom(),
        r = plot.left + plot.width
    ));
}

/// Value ticks along the vertical axis
fn value_ticks_y(svg: &mut String, plot: &Plot) {
    for i in 0..=VALUE_TICKS {
        let value = plot.max * i / VALUE_TICKS;
        let y = plot.bottom() - plot.scale(value, plot.height);
        svg.push_str(&format!(
            "<line x1=\"{:.1}\" y1=\"{y:.1}\" x2=\"{:.1}\" y2=\"{y:.1}\" stroke=\"#ddd\"/>\n\
             <text x=\"{:.1}\" y=\"{:.1}\" font-size=\"12\" text-anchor=\"end\">{}</text>\n",
            plot.left,
            plot.left + plot.width,
            plot.left - 8.0,
            y + 4.0,
            value,
            y = y
        ));
    }
}

/// Value ticks along the horizontal axis
fn value_ticks_x(svg: &mut String, plot: &Plot) {
    for i in 0..=VALUE_TICKS {
        let value = plot.max * i / VALUE_TICKS;
        let x = plot.left + plot.scale(value, plot.width);
        svg.push_str(&format!(
            "<line x1=\"{x:.1}\" y1=\"{:.1}\" x2=\"{x:.1}\" y2=\"{:.1}\" stroke=\"#ddd\"/>\n\
             <text x=\"{x:.1}\" y=\"{:.1}\" font-size=\"12\" text-anchor=\"middle\">{}</text>\n",
            plot.top,
            plot.bottom(),
            plot.bottom() + 18.0,
            value,
            x = x
        ));
    }
}

fn category_label(svg: &mut String, x: f64, y: f64, label: &str) {
    svg.push_str(&format!(
        "<text x=\"{:.1}\" y=\"{:.1}\" font-size=\"11\" text-anchor=\"middle\">{}</text>\n",
        x,
        y,
        escape_xml(label)
    ));
}

fn horizontal_bars(svg: &mut String, plot: &Plot, spec: &ChartSpec, points: &[(String, u64)]) {
    value_ticks_x(svg, plot);
    let band = plot.height / points.len() as f64;
    for (i, (label, value)) in points.iter().enumerate() {
        let y = plot.top + band * i as f64;
        let bar_width = plot.scale(*value, plot.width);
        svg.push_str(&format!(
            "<rect x=\"{:.1}\" y=\"{:.1}\" width=\"{:.1}\" height=\"{:.1}\" fill=\"{}\"><title>{}: {}</title></rect>\n",
            plot.left,
            y + band * 0.15,
            bar_width,
            band * 0.7,
            spec.color,
            escape_xml(label),
            value
        ));
        svg.push_str(&format!(
            "<text x=\"{:.1}\" y=\"{:.1}\" font-size=\"12\" text-anchor=\"end\">{}</text>\n",
            plot.left - 8.0,
            y + band / 2.0 + 4.0,
            escape_xml(&truncate_label(label))
        ));
    }
    axes(svg, plot);
}

fn vertical_bars(svg: &mut String, plot: &Plot, spec: &ChartSpec, points: &[(String, u64)]) {
    value_ticks_y(svg, plot);
    let band = plot.width / points.len() as f64;
    let stride = label_stride(points.len());
    for (i, (label, value)) in points.iter().enumerate() {
        let x = plot.left + band * i as f64;
        let bar_height = plot.scale(*value, plot.height);
        svg.push_str(&format!(
            "<rect x=\"{:.1}\" y=\"{:.1}\" width=\"{:.1}\" height=\"{:.1}\" fill=\"{}\"><title>{}: {}</title></rect>\n",
            x + band * 0.15,
            plot.bottom() - bar_height,
            band * 0.7,
            bar_height,
            spec.color,
            escape_xml(label),
            value
        ));
        if i % stride == 0 {
            category_label(svg, x + band / 2.0, plot.bottom() + 16.0, label);
        }
    }
    axes(svg, plot);
}

fn line(svg: &mut String, plot: &Plot, spec: &ChartSpec, points: &[(String, u64)]) {
    value_ticks_y(svg, plot);
    let stride = label_stride(points.len());
    let step = if points.len() > 1 { plot.width / (points.len() - 1) as f64 } else { 0.0 };
    let coords: Vec<(f64, f64)> = points
        .iter()
        .enumerate()
        .map(|(i, (_, value))| {
            let x = if points.len() > 1 { plot.left + step * i as f64 } else { plot.left + plot.width / 2.0 };
            (x, plot.bottom() - plot.scale(*value, plot.height))
        })
        .collect();

    let path: Vec<String> = coords.iter().map(|(x, y)| format!("{:.1},{:.1}", x, y)).collect();
    svg.push_str(&format!(
        "<polyline points=\"{}\" fill=\"none\" stroke=\"{}\" stroke-width=\"2\"/>\n",
        path.join(" "),
        spec.color
    ));
    for (i, ((x, y), (label, value))) in coords.iter().zip(points).enumerate() {
        svg.push_str(&format!(
            "<circle cx=\"{:.1}\" cy=\"{:.1}\" r=\"4\" fill=\"{}\"><title>{}: {}</title></circle>\n",
            x,
            y,
            spec.color,
            escape_xml(label),
            value
        ));
        if i % stride == 0 {
            category_label(svg, *x, plot.bottom() + 16.0, label);
        }
    }
    axes(svg, plot);
}
