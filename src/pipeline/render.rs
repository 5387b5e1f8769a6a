use chrono::DateTime;
use serde::Serialize;

use crate::error::RenderError;
use crate::pipeline::progress::coordinate_at;
use crate::pipeline::project::{mercator_project, Viewport};
use crate::types::color::color_for_speed;
use crate::types::route::Route;
use crate::types::viz::{ChartOptions, Coordinate, MapOptions};

const START_FLAG_COLOR: &str = "#1B1B1B";
const END_PIN_COLOR: &str = "#E0245E";
const BOAT_COLOR: &str = "#0A3D91";
const CHART_LINE_COLOR: &str = "green";
const CHART_ACTIVE_COLOR: &str = "red";
const CHART_LABEL_FORMAT: &str = "%m.%-d %H:%M";

/// Where the moving marker sits, as a fraction of the drawn line's length.
/// `None` draws the marker at the start.
pub type MarkerProgress = Option<f64>;

pub fn render_map_svg(
    route: &Route,
    options: &MapOptions,
    marker: MarkerProgress,
) -> Result<String, RenderError> {
    if route.points.is_empty() {
        return Err(RenderError::EmptyRoute(route.route_id));
    }

    let width = options.width as f64;
    let height = options.height as f64;
    let projected: Vec<(f64, f64)> = route
        .points
        .iter()
        .map(|p| mercator_project(p.lon, p.lat))
        .collect();
    let viewport = Viewport::fit(&projected, width, height, options.padding as f64)?;
    let coords = viewport.apply_all(&projected);

    let segments = build_speed_segments(route, &coords, options);
    let start = coords[0];
    let end = coords[coords.len() - 1];
    let marker_at = coordinate_at(&coords, marker.unwrap_or(0.0)).unwrap_or(start);

    Ok(format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{}" height="{}" viewBox="0 0 {} {}">
  <rect width="100%" height="100%" fill="{}"/>
  <g id="route">{}</g>
  {}
  {}
  {}
</svg>"#,
        width,
        height,
        width,
        height,
        options.background,
        segments,
        end_pin(end, options.marker_radius as f64 * 1.6),
        start_flag(start, options.marker_radius as f64 * 1.6),
        boat_marker(marker_at, options.marker_radius as f64),
    ))
}

/// Map without a route: the background with a crosshair on `center`, which
/// sits in the middle of the canvas.
pub fn render_empty_map_svg(options: &MapOptions, center: Coordinate) -> String {
    let (cx, cy) = (options.width as f64 / 2.0, options.height as f64 / 2.0);
    let arm = options.marker_radius as f64;
    format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">
  <rect width="100%" height="100%" fill="{bg}"/>
  <g id="center" data-lon="{lon:.5}" data-lat="{lat:.5}" stroke="{color}" stroke-width="2" fill="none">
    <circle cx="{cx:.1}" cy="{cy:.1}" r="{r:.1}"/>
    <path d="M {x0:.1} {cy:.1} H {x1:.1} M {cx:.1} {y0:.1} V {y1:.1}"/>
  </g>
</svg>"#,
        bg = options.background,
        w = options.width,
        h = options.height,
        lon = center.lon,
        lat = center.lat,
        color = BOAT_COLOR,
        r = arm / 2.0,
        x0 = cx - arm,
        x1 = cx + arm,
        y0 = cy - arm,
        y1 = cy + arm,
    )
}

fn build_speed_segments(route: &Route, coords: &[(f64, f64)], options: &MapOptions) -> String {
    let mut paths = String::new();
    for i in 0..coords.len().saturating_sub(1) {
        let (x1, y1) = coords[i];
        let (x2, y2) = coords[i + 1];
        let color = color_for_speed(route.points[i].speed, options.max_speed);
        paths.push_str(&format!(
            r#"<path d="M {:.2} {:.2} L {:.2} {:.2}" fill="none" stroke="{}" stroke-width="{:.1}" stroke-linecap="round"/>"#,
            x1,
            y1,
            x2,
            y2,
            color.to_hex(),
            options.stroke_width
        ));
    }
    paths
}

fn start_flag(at: (f64, f64), size: f64) -> String {
    let (x, y) = at;
    format!(
        r#"<g id="start"><line x1="{:.2}" y1="{:.2}" x2="{:.2}" y2="{:.2}" stroke="{c}" stroke-width="2"/><rect x="{:.2}" y="{:.2}" width="{:.2}" height="{:.2}" fill="{c}"/></g>"#,
        x,
        y,
        x,
        y - size,
        x,
        y - size,
        size * 0.7,
        size * 0.45,
        c = START_FLAG_COLOR
    )
}

fn end_pin(at: (f64, f64), size: f64) -> String {
    let (x, y) = at;
    let r = size * 0.35;
    format!(
        r#"<g id="end"><path d="M {:.2} {:.2} L {:.2} {:.2} L {:.2} {:.2} Z" fill="{c}"/><circle cx="{:.2}" cy="{:.2}" r="{:.2}" fill="{c}"/></g>"#,
        x,
        y,
        x - r,
        y - size + r,
        x + r,
        y - size + r,
        x,
        y - size + r,
        r,
        c = END_PIN_COLOR
    )
}

fn boat_marker(at: (f64, f64), radius: f64) -> String {
    format!(
        r##"<circle id="marker" cx="{:.2}" cy="{:.2}" r="{:.2}" fill="{}" stroke="#FFFFFF" stroke-width="2"/>"##,
        at.0, at.1, radius, BOAT_COLOR
    )
}

#[derive(Debug, Clone, Serialize)]
pub struct ChartData {
    pub legend: String,
    pub labels: Vec<String>,
    pub speeds: Vec<f64>,
}

pub fn chart_data(route: &Route) -> ChartData {
    ChartData {
        legend: chart_legend(route),
        labels: chart_labels(route),
        speeds: route.points.iter().map(|p| p.speed).collect(),
    }
}

pub fn chart_legend(route: &Route) -> String {
    format!("{} => {}", route.from_port, route.to_port)
}

/// Timestamps are epoch milliseconds, formatted in UTC since the server has
/// no notion of the viewer's time zone.
pub fn chart_labels(route: &Route) -> Vec<String> {
    route
        .points
        .iter()
        .map(|p| {
            DateTime::from_timestamp_millis(p.timestamp as i64)
                .map(|time| time.format(CHART_LABEL_FORMAT).to_string())
                .unwrap_or_default()
        })
        .collect()
}

pub fn render_chart_svg(
    route: &Route,
    options: &ChartOptions,
    active_index: usize,
) -> Result<String, RenderError> {
    let coords = chart_coords(route, options)?;
    let line = speed_line_path(&coords, options.line_tension);
    let active = coords
        .get(active_index)
        .map(|(x, y)| {
            format!(
                r#"<circle id="active-point" cx="{:.2}" cy="{:.2}" r="{:.1}" fill="{}"/>"#,
                x, y, options.point_radius, CHART_ACTIVE_COLOR
            )
        })
        .unwrap_or_default();

    let width = options.width as f64;
    let height = options.height as f64;
    let padding = options.padding as f64;
    Ok(format!(
        r##"<svg xmlns="http://www.w3.org/2000/svg" width="{}" height="{}" viewBox="0 0 {} {}">
  <rect width="100%" height="100%" fill="#FFFFFF"/>
  <text x="{:.1}" y="{:.1}" font-family="DejaVu Sans, sans-serif" font-size="14" fill="#333333" text-anchor="middle">{}</text>
  <line x1="{:.1}" y1="{:.1}" x2="{:.1}" y2="{:.1}" stroke="#CCCCCC" stroke-width="1"/>
  <path d="{}" fill="none" stroke="{}" stroke-width="2" stroke-linejoin="round"/>
  {}
</svg>"##,
        width,
        height,
        width,
        height,
        width / 2.0,
        padding * 0.6,
        escape_text(&chart_legend(route)),
        padding,
        padding,
        padding,
        height - padding,
        line,
        CHART_LINE_COLOR,
        active
    ))
}

/// Nearest point index for a click at horizontal pixel `x`, or `None` when
/// the click falls outside the plot area.
pub fn chart_index_at(x: f64, point_count: usize, options: &ChartOptions) -> Option<usize> {
    if point_count == 0 || !x.is_finite() {
        return None;
    }
    let (left, right) = options.plot_x_range();
    let slop = options.point_radius as f64;
    if x < left - slop || x > right + slop {
        return None;
    }
    if point_count == 1 {
        return Some(0);
    }
    let step = (right - left) / (point_count - 1) as f64;
    if step <= f64::EPSILON {
        return Some(0);
    }
    let idx = ((x - left) / step).round().clamp(0.0, (point_count - 1) as f64);
    Some(idx as usize)
}

fn chart_coords(route: &Route, options: &ChartOptions) -> Result<Vec<(f64, f64)>, RenderError> {
    if route.points.is_empty() {
        return Err(RenderError::EmptyRoute(route.route_id));
    }
    let (left, right) = options.plot_x_range();
    let top = options.padding as f64;
    let bottom = options.height as f64 - options.padding as f64;
    if bottom <= top {
        return Err(RenderError::Canvas("chart plot area collapsed".to_string()));
    }

    let max_speed = route.max_speed().max(f64::EPSILON);
    let last = route.points.len().saturating_sub(1).max(1) as f64;
    Ok(route
        .points
        .iter()
        .enumerate()
        .map(|(idx, p)| {
            let x = left + (right - left) * idx as f64 / last;
            let y = bottom - (bottom - top) * (p.speed / max_speed).clamp(0.0, 1.0);
            (x, y)
        })
        .collect())
}

/// Speed series as an SVG path. A positive tension bends each segment into a
/// cubic whose control points lean towards the neighbouring samples.
fn speed_line_path(coords: &[(f64, f64)], tension: f32) -> String {
    let Some(&(x, y)) = coords.first() else {
        return String::new();
    };
    let t = f64::from(tension);
    let last = coords.len() - 1;
    let mut path = format!("M {:.2} {:.2}", x, y);
    for i in 1..coords.len() {
        let (from, to) = (coords[i - 1], coords[i]);
        if t <= 0.0 {
            path.push_str(&format!(" L {:.2} {:.2}", to.0, to.1));
            continue;
        }
        let before = coords[i.saturating_sub(2)];
        let after = coords[(i + 1).min(last)];
        let c1 = (from.0 + (to.0 - before.0) * t, from.1 + (to.1 - before.1) * t);
        let c2 = (to.0 - (after.0 - from.0) * t, to.1 - (after.1 - from.1) * t);
        path.push_str(&format!(
            " C {:.2} {:.2} {:.2} {:.2} {:.2} {:.2}",
            c1.0, c1.1, c2.0, c2.1, to.0, to.1
        ));
    }
    path
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::route::Point;

    fn route() -> Route {
        Route {
            route_id: 3,
            from_port: "Santos".to_string(),
            to_port: "Rio Grande".to_string(),
            leg_duration: 3_600_000,
            all_distance: 0.0,
            points: vec![
                Point::new(-46.30, -23.96, 1_700_000_000_000.0, 0.0),
                Point::new(-47.50, -25.00, 1_700_001_800_000.0, 7.5),
                Point::new(-50.00, -31.00, 1_700_003_600_000.0, 15.0),
            ],
        }
        .with_distances()
    }

    #[test]
    fn map_segments_are_colored_by_speed() {
        let svg = render_map_svg(&route(), &MapOptions::default(), None).unwrap();
        // first segment uses the first point's speed (0 => red)
        assert!(svg.contains("stroke=\"#FF0000\""));
        // second segment at half of max speed => yellow
        assert!(svg.contains("stroke=\"#FFFF00\""));
        assert!(!svg.contains("stroke=\"#00FF00\""));
        assert!(svg.contains("id=\"start\""));
        assert!(svg.contains("id=\"end\""));
        assert!(svg.contains("id=\"marker\""));
    }

    #[test]
    fn chart_highlights_active_point_and_legend() {
        let svg = render_chart_svg(&route(), &ChartOptions::default(), 1).unwrap();
        assert!(svg.contains("Santos =&gt; Rio Grande"));
        assert!(svg.contains("id=\"active-point\""));
        let none = render_chart_svg(&route(), &ChartOptions::default(), 99).unwrap();
        assert!(!none.contains("id=\"active-point\""));
    }

    #[test]
    fn chart_labels_use_month_day_time() {
        let labels = chart_labels(&route());
        assert_eq!(labels[0], "11.14 22:13");
        assert_eq!(labels.len(), 3);
    }

    #[test]
    fn chart_click_maps_to_nearest_index() {
        let options = ChartOptions::default();
        let (left, right) = options.plot_x_range();
        assert_eq!(chart_index_at(left, 3, &options), Some(0));
        assert_eq!(chart_index_at(right, 3, &options), Some(2));
        assert_eq!(chart_index_at((left + right) / 2.0 + 3.0, 3, &options), Some(1));
        assert_eq!(chart_index_at(1.0, 3, &options), None);
        assert_eq!(chart_index_at(left, 0, &options), None);
    }

    #[test]
    fn speed_line_bends_only_with_tension() {
        let coords = [(0.0, 10.0), (10.0, 0.0), (20.0, 10.0)];
        assert_eq!(
            speed_line_path(&coords, 0.0),
            "M 0.00 10.00 L 10.00 0.00 L 20.00 10.00"
        );
        let curved = speed_line_path(&coords, 0.1);
        assert!(curved.starts_with("M 0.00 10.00 C 1.00 9.00 8.00 0.00 10.00 0.00"));
        assert_eq!(curved.matches(" C ").count(), 2);
        assert!(speed_line_path(&[], 0.1).is_empty());
    }

    #[test]
    fn empty_map_marks_the_center() {
        let svg = render_empty_map_svg(&MapOptions::default(), Coordinate::FALLBACK_CENTER);
        assert!(!svg.contains("id=\"route\""));
        assert!(svg.contains(r#"data-lon="-50.66070" data-lat="-29.98330""#));
    }
}
