pub mod config;
pub mod fetch;
#[cfg(feature = "http")]
pub mod http;
pub mod memory;
pub mod protocol;
pub mod record;
pub mod request;
pub mod service;

pub use config::*;
pub use fetch::*;
#[cfg(feature = "http")]
pub use http::*;
pub use memory::*;
pub use record::*;
pub use request::*;
pub use service::*;
