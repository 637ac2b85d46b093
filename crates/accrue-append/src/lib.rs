//! Append engine for accrue.
//!
//! The backing store can only replace whole objects, so an [`Appender`]
//! keeps an in-memory snapshot of one object, applies appends to it, and
//! writes the full body back on flush. Concurrent appends against one
//! appender are serialized through a per-appender operation queue: every
//! append runs strictly after the operations that were pending when it was
//! issued, so submission order is application order even when the caller
//! never awaits between calls.
//!
//! # Lifecycle
//!
//! ```text
//! Unloaded --read--> Clean --append--> Dirty --flush--> Clean
//!     ^                                  |
//!     +------------- delete -------------+
//! ```

pub mod appender;
pub mod error;
pub mod message;
pub mod options;
pub mod queue;
pub mod state;

pub use appender::{Appender, PendingAppend};
pub use error::{AppendError, AppendResult};
pub use message::format_message;
pub use options::AppendOptions;
pub use queue::OpId;
pub use state::AppendContents;
