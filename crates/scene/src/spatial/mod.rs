pub mod point_index;

pub use point_index::*;
