//! The raw transport contract consumed by [`crate::Tube`].
//!
//! An explicit capability interface for the operations a transport may or
//! may not support: optional capabilities return
//! [`crate::error::Error::NotImplemented`] instead of being duck-typed
//! away.

#[cfg(feature = "process")]
pub mod process;
#[cfg(feature = "net")]
pub mod tcp;

use crate::deadline::Deadline;
use crate::direction::Direction;
use crate::error::Result;

/// An opaque, platform-ish file descriptor handle, returned by
/// [`RawTransport::fileno`] for transports that expose one (used by
/// `spawn_process`-style helpers).
pub type RawFdLike = i64;

/// The pluggable transport underneath a [`crate::Tube`].
///
/// Implementations are expected to respect the `deadline` passed to
/// `recv_raw`/`can_recv_raw` immediately before blocking; there is no
/// observable difference between "set a timeout, then block" and "block
/// with an explicit deadline argument" as long as the deadline used is
/// the one in effect for this call.
pub trait RawTransport: Send {
    /// Reads up to `n` bytes. `Ok(None)` means the deadline elapsed with no
    /// data available (a timeout, not an error). `Err(Error::EndOfStream)`
    /// means the stream is closed.
    fn recv_raw(&mut self, n: usize, deadline: Deadline) -> Result<Option<Box<[u8]>>>;

    /// Sends all of `data` or fails.
    fn send_raw(&mut self, data: &[u8]) -> Result<()>;

    /// True if a subsequent `recv_raw` would return data without blocking
    /// past `deadline`.
    fn can_recv_raw(&mut self, deadline: Deadline) -> Result<bool>;

    /// Shuts down one direction. Must be idempotent.
    fn shutdown_raw(&mut self, dir: Direction) -> Result<()>;

    /// Whether `dir` (which is never `Any` here; callers resolve that
    /// before reaching the transport) is still open.
    fn connected_raw(&self, dir: Direction) -> bool;

    /// The underlying file descriptor, if this transport has one.
    /// Transports without a natural fd (e.g. an in-memory test double)
    /// return `None`, which the public API surfaces as
    /// [`crate::error::Error::NotImplemented`].
    fn fileno(&self) -> Option<RawFdLike> {
        None
    }

    /// Idempotent close.
    fn close(&mut self) -> Result<()>;
}
