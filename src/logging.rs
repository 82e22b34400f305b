//! Internal logging shim.
//!
//! When the `logwise`
//! feature is enabled, diagnostics are routed through `logwise`'s structured
//! macros; otherwise they fall back to `eprintln!` so the crate never
//! silently drops a diagnostic just because the fancier logger isn't wired
//! up. Used both for hex-dump-at-debug-level tracing and for one-time
//! warnings (e.g. `recv_line`'s incomplete-final-line fallback).

macro_rules! tube_debug {
    ($($arg:tt)*) => {{
        #[cfg(feature = "logwise")]
        { logwise::debug_sync!($($arg)*); }
        #[cfg(not(feature = "logwise"))]
        { eprintln!($($arg)*); }
    }};
}

macro_rules! tube_warn_once {
    ($key:expr, $($arg:tt)*) => {{
        use std::collections::HashSet;
        use std::sync::{Mutex, OnceLock};
        static SEEN: OnceLock<Mutex<HashSet<&'static str>>> = OnceLock::new();
        let seen = SEEN.get_or_init(|| Mutex::new(HashSet::new()));
        let mut seen = seen.lock().unwrap();
        if seen.insert($key) {
            #[cfg(feature = "logwise")]
            { logwise::warn_sync!($($arg)*); }
            #[cfg(not(feature = "logwise"))]
            { eprintln!($($arg)*); }
        }
    }};
}

pub(crate) use tube_debug;
pub(crate) use tube_warn_once;
