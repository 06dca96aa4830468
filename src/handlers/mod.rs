//! Handler implementations

pub mod file;
pub mod memory;
pub mod queue;
pub mod rotating;
pub mod rotating_file;
pub mod timed_rotating_file;

#[cfg(unix)]
pub mod watched_file;

pub use file::FileHandler;
pub use memory::{BufferingHandler, FlushPredicate, MemoryHandler};
pub use queue::{QueueHandler, QueueListener, RecordQueue, DEFAULT_SHUTDOWN_TIMEOUT};
pub use rotating::{Namer, RotationHooks, Rotator};
pub use rotating_file::{RotatingFileHandler, RotatingFileHandlerBuilder};
pub use timed_rotating_file::{
    RotationInterval, TimedRotatingFileHandler, TimedRotatingFileHandlerBuilder,
};

#[cfg(unix)]
pub use watched_file::WatchedFileHandler;

// Re-export the trait for backward compatibility
pub use crate::core::Handler;
