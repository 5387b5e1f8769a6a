use serde::{Deserialize, Serialize};

use crate::types::color::{parse_hex, DEFAULT_MAX_SPEED};

/// Geographic position in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lon: f64,
    pub lat: f64,
}

impl Coordinate {
    /// Map center used until a route is selected or a location is reported
    /// (Porto Alegre, Brazil).
    pub const FALLBACK_CENTER: Coordinate = Coordinate {
        lon: -50.6607,
        lat: -29.9833,
    };

    pub fn is_valid(&self) -> bool {
        self.lon.is_finite()
            && self.lat.is_finite()
            && (-180.0..=180.0).contains(&self.lon)
            && (-90.0..=90.0).contains(&self.lat)
    }
}

#[derive(Debug, Clone)]
pub struct MapOptions {
    pub width: u32,
    pub height: u32,
    pub padding: u32,
    pub stroke_width: f32,
    pub max_speed: f64,
    pub marker_radius: f32,
    pub background: &'static str,
}

impl MapOptions {
    pub fn new(width: u32, height: u32, max_speed: f64) -> Self {
        Self {
            width,
            height,
            max_speed,
            ..Self::default()
        }
    }
}

impl Default for MapOptions {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 800,
            padding: 100,
            stroke_width: 3.0,
            max_speed: DEFAULT_MAX_SPEED,
            marker_radius: 11.0,
            background: "#AAD3DF",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChartOptions {
    pub width: u32,
    pub height: u32,
    pub padding: u32,
    /// Catmull-Rom tension of the speed line. 0.0 = straight lines.
    pub line_tension: f32,
    pub point_radius: f32,
}

impl Default for ChartOptions {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 320,
            padding: 40,
            line_tension: 0.1,
            point_radius: 5.0,
        }
    }
}

impl ChartOptions {
    /// Horizontal pixel range of the plot area.
    pub fn plot_x_range(&self) -> (f64, f64) {
        let padding = self.padding as f64;
        (padding, (self.width as f64 - padding).max(padding))
    }
}

#[derive(Debug, Clone)]
pub struct OutputConfig {
    pub width: u32,
    pub height: u32,
    pub background: Option<(u8, u8, u8, u8)>,
}

impl OutputConfig {
    pub fn for_map(options: &MapOptions) -> Self {
        Self {
            width: options.width,
            height: options.height,
            background: parse_hex(options.background),
        }
    }

    pub fn for_chart(options: &ChartOptions) -> Self {
        Self {
            width: options.width,
            height: options.height,
            background: Some((255, 255, 255, 255)),
        }
    }
}
