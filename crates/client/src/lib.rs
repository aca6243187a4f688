// crates/client/src/lib.rs
pub mod credentials;
pub mod error;
pub mod http;
pub mod service;

pub use credentials::*;
pub use error::*;
pub use http::*;
pub use service::*;
