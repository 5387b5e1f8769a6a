use std::cell::OnceCell;

use usvg::fontdb::Database;

use crate::error::RasterError;
use crate::types::viz::OutputConfig;

// Only the chart legend carries text; the map is pure geometry.
const LEGEND_FONTS: [&str; 3] = [
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "./assets/fonts/DejaVuSans.ttf",
];

thread_local! {
    static FONTS: OnceCell<Database> = const { OnceCell::new() };
}

/// Renders a map or chart SVG into a PNG of the configured size.
pub fn rasterize(svg: &str, output: &OutputConfig) -> Result<Vec<u8>, RasterError> {
    let tree = FONTS.with(|cell| {
        let fonts = cell.get_or_init(legend_fonts);
        usvg::Tree::from_str(svg, &usvg::Options::default(), fonts)
    })
    .map_err(|e| RasterError::RenderFailed(format!("Unreadable SVG: {}", e)))?;

    let mut canvas = tiny_skia::Pixmap::new(output.width, output.height).ok_or_else(|| {
        RasterError::RenderFailed(format!(
            "Cannot allocate {}x{} canvas",
            output.width, output.height
        ))
    })?;
    if let Some((r, g, b, a)) = output.background {
        canvas.fill(tiny_skia::Color::from_rgba8(r, g, b, a));
    }

    let size = tree.size();
    let scale = tiny_skia::Transform::from_scale(
        output.width as f32 / size.width(),
        output.height as f32 / size.height(),
    );
    resvg::render(&tree, scale, &mut canvas.as_mut());

    canvas
        .encode_png()
        .map_err(|e| RasterError::RenderFailed(format!("PNG encoding: {}", e)))
}

fn legend_fonts() -> Database {
    let mut fonts = Database::new();
    for path in LEGEND_FONTS {
        if fonts.load_font_file(path).is_ok() {
            tracing::debug!("Loaded legend font {}", path);
        }
    }
    fonts.load_system_fonts();
    fonts
}
