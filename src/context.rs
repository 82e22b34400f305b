//! Process-wide defaults injected at tube construction.
//!
//! Modeled as a concrete, constructible object rather than ambient mutable
//! state so tests can supply an isolated context.

use crate::deadline::Deadline;
use std::time::Duration;

/// A tri-state flag: distinct from `bool` because `recv_line`'s EOS policy
/// has three distinguishable states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tristate {
    Unset,
    True,
    False,
}

/// Byte order used by the `pack`/`unpack` shims.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    Little,
    Big,
}

/// Process-wide configuration a [`crate::Tube`] falls back to when it has
/// no per-instance override.
#[derive(Debug, Clone)]
pub struct Context {
    /// The default line terminator, used when a tube has no per-instance
    /// newline.
    pub newline: Vec<u8>,
    /// The default deadline used when a call passes `Deadline::Default`.
    pub timeout: Deadline,
    /// `recv_line`'s EOS-on-incomplete-line policy. Kept tri-state rather
    /// than collapsed to a bool: `Unset` behaves like `False` but also
    /// emits a one-time warning the first time it's exercised.
    pub throw_eof_on_incomplete_line: Tristate,
    /// Byte order for `pack`/`unpack`.
    pub endian: Endian,
}

impl Default for Context {
    fn default() -> Self {
        Context {
            newline: b"\n".to_vec(),
            // Conventional default: don't hang forever by accident, but
            // tolerate real network/process latency.
            timeout: Deadline::Finite(Duration::from_secs(10)),
            throw_eof_on_incomplete_line: Tristate::Unset,
            endian: Endian::Little,
        }
    }
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }
}
