//! A blocking-looking, full-duplex byte tube for driving processes,
//! sockets and shells: an internal receive buffer with push-back, a
//! family of `recv_*` operations with deadline semantics, tube-to-tube
//! pumps, an interactive REPL, and a manual shell upload protocol.

pub mod buffer;
pub mod context;
pub mod deadline;
pub mod direction;
pub mod error;
pub(crate) mod logging;
pub(crate) mod matcher;
pub mod pack;
pub mod pump;
pub mod transport;
pub mod tube;

pub mod interactive;
pub mod upload;

pub use context::{Context, Endian, Tristate};
pub use deadline::Deadline;
pub use direction::Direction;
pub use error::{Error, Result};
pub use pump::SharedTube;
pub use transport::{RawFdLike, RawTransport};
pub use tube::{Captured, Tube};

#[cfg(feature = "process")]
pub use transport::process::ProcessTransport;
#[cfg(feature = "net")]
pub use transport::tcp::TcpTransport;
