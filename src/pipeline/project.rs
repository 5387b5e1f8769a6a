use crate::error::RenderError;

const EARTH_RADIUS_M: f64 = 6_378_137.0;
const MAX_MERCATOR_LAT: f64 = 85.051_128_78;

/// Spherical Web Mercator (EPSG:3857), in meters.
pub fn mercator_project(lon: f64, lat: f64) -> (f64, f64) {
    let lat = lat.clamp(-MAX_MERCATOR_LAT, MAX_MERCATOR_LAT);
    let x = EARTH_RADIUS_M * lon.to_radians();
    let y = EARTH_RADIUS_M * (std::f64::consts::FRAC_PI_4 + lat.to_radians() / 2.0).tan().ln();
    (x, y)
}

/// Maps projected coordinates into SVG pixel space with the content centered
/// and the aspect ratio kept. The y axis is flipped.
#[derive(Debug, Clone, Copy)]
pub struct Viewport {
    min_x: f64,
    max_y: f64,
    scale: f64,
    offset_x: f64,
    offset_y: f64,
}

impl Viewport {
    pub fn fit(
        points: &[(f64, f64)],
        width: f64,
        height: f64,
        padding: f64,
    ) -> Result<Self, RenderError> {
        if points.is_empty() {
            return Err(RenderError::Canvas("nothing to fit".to_string()));
        }
        let view_width = width - 2.0 * padding;
        let view_height = height - 2.0 * padding;
        if view_width <= 0.0 || view_height <= 0.0 {
            return Err(RenderError::Canvas("viewport smaller than its padding".to_string()));
        }

        let mut min_x = f64::INFINITY;
        let mut max_x = f64::NEG_INFINITY;
        let mut min_y = f64::INFINITY;
        let mut max_y = f64::NEG_INFINITY;
        for (x, y) in points {
            min_x = min_x.min(*x);
            max_x = max_x.max(*x);
            min_y = min_y.min(*y);
            max_y = max_y.max(*y);
        }

        let content_width = (max_x - min_x).max(f64::EPSILON);
        let content_height = (max_y - min_y).max(f64::EPSILON);
        let scale = (view_width / content_width).min(view_height / content_height);
        // a single point or a degenerate extent would blow the scale up
        let scale = if scale.is_finite() && content_width.max(content_height) > 1.0 {
            scale
        } else {
            1.0
        };
        let offset_x = padding + (view_width - (max_x - min_x) * scale) * 0.5;
        let offset_y = padding + (view_height - (max_y - min_y) * scale) * 0.5;

        Ok(Self {
            min_x,
            max_y,
            scale,
            offset_x,
            offset_y,
        })
    }

    pub fn apply(&self, point: (f64, f64)) -> (f64, f64) {
        (
            self.offset_x + (point.0 - self.min_x) * self.scale,
            self.offset_y + (self.max_y - point.1) * self.scale,
        )
    }

    pub fn apply_all(&self, points: &[(f64, f64)]) -> Vec<(f64, f64)> {
        points.iter().map(|p| self.apply(*p)).collect()
    }
}
