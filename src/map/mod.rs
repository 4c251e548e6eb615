mod geometry;
mod projection;
mod renderer;

pub use projection::{Viewport, CITY_ZOOM};
pub use renderer::{dot_radius, marker_at, LineString, MapLayers, MapRenderer};
