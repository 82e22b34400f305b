//! TCP transport: a `WouldBlock` on a non-blocking probe means "nothing
//! yet", not an error.

use super::{RawFdLike, RawTransport};
use crate::deadline::Deadline;
use crate::direction::Direction;
use crate::error::{Error, Result};
use std::io::{Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

pub struct TcpTransport {
    stream: TcpStream,
    recv_shutdown: bool,
    send_shutdown: bool,
}

impl TcpTransport {
    pub fn connect(addr: impl ToSocketAddrs) -> Result<Self> {
        let stream = TcpStream::connect(addr)?;
        stream.set_nodelay(true)?;
        Ok(TcpTransport {
            stream,
            recv_shutdown: false,
            send_shutdown: false,
        })
    }

    pub fn from_stream(stream: TcpStream) -> Self {
        TcpTransport {
            stream,
            recv_shutdown: false,
            send_shutdown: false,
        }
    }

    pub fn peer_addr(&self) -> Result<SocketAddr> {
        Ok(self.stream.peer_addr()?)
    }
}

impl RawTransport for TcpTransport {
    fn recv_raw(&mut self, n: usize, deadline: Deadline) -> Result<Option<Box<[u8]>>> {
        if self.recv_shutdown {
            return Err(Error::EndOfStream);
        }
        match deadline {
            Deadline::Forever => self.stream.set_read_timeout(None)?,
            Deadline::Finite(d) => {
                // A zero duration is rejected by `set_read_timeout`; a
                // single nanosecond is effectively non-blocking.
                let d = if d.is_zero() { Duration::from_nanos(1) } else { d };
                self.stream.set_read_timeout(Some(d))?;
            }
            Deadline::Default => unreachable!("Tube resolves Default before reaching the transport"),
        }
        let mut buf = vec![0u8; n.max(1)];
        match self.stream.read(&mut buf) {
            Ok(0) => Err(Error::EndOfStream),
            Ok(got) => {
                buf.truncate(got);
                Ok(Some(buf.into_boxed_slice()))
            }
            Err(e) if matches!(e.kind(), std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut) => {
                Ok(None)
            }
            Err(e) => Err(Error::Io(e)),
        }
    }

    fn send_raw(&mut self, data: &[u8]) -> Result<()> {
        if self.send_shutdown {
            return Err(Error::bad_argument("send on a shut-down tube"));
        }
        self.stream.write_all(data)?;
        Ok(())
    }

    fn can_recv_raw(&mut self, _deadline: Deadline) -> Result<bool> {
        self.stream.set_nonblocking(true)?;
        let mut probe = [0u8; 1];
        let result = self.stream.peek(&mut probe);
        self.stream.set_nonblocking(false)?;
        match result {
            Ok(0) => Ok(false),
            Ok(_) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(false),
            Err(e) => Err(Error::Io(e)),
        }
    }

    fn shutdown_raw(&mut self, dir: Direction) -> Result<()> {
        match dir {
            Direction::Recv => {
                self.recv_shutdown = true;
                let _ = self.stream.shutdown(Shutdown::Read);
            }
            Direction::Send => {
                self.send_shutdown = true;
                let _ = self.stream.shutdown(Shutdown::Write);
            }
            Direction::Any => unreachable!("require_concrete rejects Any before reaching here"),
        }
        Ok(())
    }

    fn connected_raw(&self, dir: Direction) -> bool {
        match dir {
            Direction::Recv => !self.recv_shutdown,
            Direction::Send => !self.send_shutdown,
            Direction::Any => !self.recv_shutdown || !self.send_shutdown,
        }
    }

    fn fileno(&self) -> Option<RawFdLike> {
        #[cfg(unix)]
        {
            use std::os::fd::AsRawFd;
            Some(self.stream.as_raw_fd() as RawFdLike)
        }
        #[cfg(not(unix))]
        {
            None
        }
    }

    fn close(&mut self) -> Result<()> {
        self.recv_shutdown = true;
        self.send_shutdown = true;
        let _ = self.stream.shutdown(Shutdown::Both);
        Ok(())
    }
}
