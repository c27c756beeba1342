pub mod composite;
pub mod raster;

pub use composite::*;
pub use raster::*;
