pub mod components;
pub mod output;
pub mod rendered;
pub mod spatial;

pub use output::*;
pub use rendered::*;
