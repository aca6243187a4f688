// crates/types/src/lib.rs
pub mod events;
pub mod job;
pub mod progress;
pub mod status;

pub use events::*;
pub use job::*;
pub use progress::*;
pub use status::*;
