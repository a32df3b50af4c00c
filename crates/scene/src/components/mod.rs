pub mod appearance;
pub mod geometry;

pub use appearance::*;
pub use geometry::*;
