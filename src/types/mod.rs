pub mod color;
pub mod route;
pub mod viz;
