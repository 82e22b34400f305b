//! Direction aliasing for `shutdown`/`connected`.

use crate::error::Error;

/// A canonical I/O direction.
///
/// `Any` is only legal as the argument to [`crate::Tube::connected`]; it is
/// rejected by `shutdown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Recv,
    Send,
    Any,
}

impl Direction {
    /// Parses the aliases `in|read|recv`, `out|write|send`, and (for
    /// `connected` only) `any`, case-sensitively.
    pub fn parse(s: &str) -> Result<Self, Error> {
        match s {
            "in" | "read" | "recv" => Ok(Direction::Recv),
            "out" | "write" | "send" => Ok(Direction::Send),
            "any" => Ok(Direction::Any),
            other => Err(Error::BadDirection {
                given: other.to_string(),
                legal: "in, read, recv, out, write, send, any",
            }),
        }
    }

    /// `shutdown` does not accept `any`; `connected` does.
    pub(crate) fn require_concrete(self) -> Result<Self, Error> {
        match self {
            Direction::Any => Err(Error::BadDirection {
                given: "any".to_string(),
                legal: "in, read, recv, out, write, send",
            }),
            d => Ok(d),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aliases_normalize() {
        for alias in ["in", "read", "recv"] {
            assert_eq!(Direction::parse(alias).unwrap(), Direction::Recv);
        }
        for alias in ["out", "write", "send"] {
            assert_eq!(Direction::parse(alias).unwrap(), Direction::Send);
        }
        assert_eq!(Direction::parse("any").unwrap(), Direction::Any);
    }

    #[test]
    fn unknown_direction_is_bad_argument() {
        let err = Direction::parse("sideways").unwrap_err();
        assert!(matches!(err, Error::BadDirection { .. }));
    }

    #[test]
    fn shutdown_rejects_any() {
        let any = Direction::parse("any").unwrap();
        assert!(any.require_concrete().is_err());
        let recv = Direction::parse("recv").unwrap();
        assert!(recv.require_concrete().is_ok());
    }
}
