//! Guarded byte streams for Lode.
//!
//! Every document body that moves between the resource layer, validators and
//! storage backends travels as a [`GuardedStream`]: a single-consumer stream
//! of [`Bytes`] chunks with strengthened error semantics.
//!
//! # Guarantees
//!
//! 1. An error raised by the underlying source is stored, and every later
//!    poll yields it again. A consumer that attaches late still sees it.
//! 2. A stream is consumed at most once. Consuming operations take `self`.
//! 3. Transforms of a guarded stream are guarded streams.
//!
//! [`channel`] builds a producer/consumer pair on top of this, used when a
//! body is produced incrementally (for example an upload in progress).

pub mod channel;
pub mod error;
pub mod guarded;

pub use bytes::Bytes;
pub use channel::{channel, GuardedSender};
pub use error::{StreamError, StreamResult};
pub use guarded::{guard, GuardedStream};
