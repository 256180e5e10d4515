//! Process-wide tracing setup shared by the overlay binaries.

mod subscriber;

pub use subscriber::{init, init_with_level};
