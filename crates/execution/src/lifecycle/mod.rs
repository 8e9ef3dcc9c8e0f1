//! Pool lifecycle events.

mod events;

pub use events::*;
