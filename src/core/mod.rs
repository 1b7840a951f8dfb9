pub mod context;
pub mod polygon;
pub mod projection;
pub mod raster;
pub mod spatial;
pub mod terrain;
