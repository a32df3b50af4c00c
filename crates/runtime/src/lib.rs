pub mod channel;
pub mod refresh;

pub use channel::*;
pub use refresh::*;
