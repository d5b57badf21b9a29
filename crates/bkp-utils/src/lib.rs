pub mod atomic;
pub mod cancel;
pub mod error;
pub mod exclude;
pub mod path;
pub mod scope;
pub mod timestamp;

// Re-export core types at crate root for convenience
pub use cancel::CancelToken;
pub use error::{Error, ErrorKind};
pub use scope::Scope;

pub type Result<T> = std::result::Result<T, Error>;

/// Minimum I/O chunk size for streaming reads. Cancellation is polled at
/// least once per chunk.
pub const IO_CHUNK_SIZE: usize = 64 * 1024;
