//! Process lifecycle: shutdown coordination.

pub mod shutdown;

pub use shutdown::Shutdown;
