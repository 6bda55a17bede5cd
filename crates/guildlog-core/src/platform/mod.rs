//! Chat-platform abstractions (Discord today, behind the adapter crate).

pub mod port;
pub mod types;

pub use port::{ChannelHandle, PlatformClient};
pub use types::RawEvent;
