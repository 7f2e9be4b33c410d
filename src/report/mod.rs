//! Turning a compression outcome into console text or an event stream

pub mod console;
pub mod events;

pub use console::{write_banner, write_batch_summary, write_summary};
pub use events::JobEvent;
