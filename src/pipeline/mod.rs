pub mod animate;
pub mod load;
pub mod progress;
pub mod project;
pub mod rasterize;
pub mod render;
