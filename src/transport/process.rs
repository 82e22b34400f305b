//! Process transport: drives a child process's stdin/stdout as a tube.
//! A background `std::thread` owns the blocking `Read` side and forwards
//! what it gets through an `mpsc` channel, so `recv_raw` can honor a
//! deadline without
//! the child's pipe itself supporting one.

use super::{RawFdLike, RawTransport};
use crate::buffer::DEFAULT_CHUNK_SIZE;
use crate::deadline::Deadline;
use crate::direction::Direction;
use crate::error::{Error, Result};
use std::io::{Read, Write};
use std::process::{Child, ChildStdin, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver};

enum ReaderEvent {
    Data(Box<[u8]>),
    Eof,
    Err(std::io::Error),
}

pub struct ProcessTransport {
    child: Child,
    stdin: Option<ChildStdin>,
    rx: Receiver<ReaderEvent>,
    leftover: Option<Box<[u8]>>,
    recv_shutdown: bool,
    send_shutdown: bool,
    eof_seen: bool,
}

impl ProcessTransport {
    /// Spawns `command` with stdin/stdout piped (stderr inherited, so it
    /// still shows up on the caller's terminal rather than being silently
    /// dropped) and starts the background reader thread.
    pub fn spawn(mut command: Command) -> Result<Self> {
        command.stdin(Stdio::piped());
        command.stdout(Stdio::piped());
        command.stderr(Stdio::inherit());
        let mut child = command.spawn()?;
        let stdin = child.stdin.take().expect("stdin was requested as piped");
        let mut stdout = child.stdout.take().expect("stdout was requested as piped");

        let (tx, rx) = mpsc::channel();
        std::thread::Builder::new()
            .name("tube-process-reader".into())
            .spawn(move || {
                let mut buf = [0u8; DEFAULT_CHUNK_SIZE];
                loop {
                    match stdout.read(&mut buf) {
                        Ok(0) => {
                            let _ = tx.send(ReaderEvent::Eof);
                            break;
                        }
                        Ok(n) => {
                            if tx
                                .send(ReaderEvent::Data(buf[..n].to_vec().into_boxed_slice()))
                                .is_err()
                            {
                                break;
                            }
                        }
                        Err(e) => {
                            let _ = tx.send(ReaderEvent::Err(e));
                            break;
                        }
                    }
                }
            })
            .expect("failed to spawn process reader thread");

        Ok(ProcessTransport {
            child,
            stdin: Some(stdin),
            rx,
            leftover: None,
            recv_shutdown: false,
            send_shutdown: false,
            eof_seen: false,
        })
    }

    pub fn wait(&mut self) -> Result<ExitStatus> {
        Ok(self.child.wait()?)
    }

    fn take_up_to(&mut self, data: Box<[u8]>, n: usize) -> Box<[u8]> {
        if data.len() <= n {
            return data;
        }
        let (head, tail) = data.split_at(n);
        let head = head.to_vec().into_boxed_slice();
        self.leftover = Some(tail.to_vec().into_boxed_slice());
        head
    }

    fn stash(&mut self, event: ReaderEvent) {
        match event {
            ReaderEvent::Data(d) => self.leftover = Some(d),
            ReaderEvent::Eof | ReaderEvent::Err(_) => self.eof_seen = true,
        }
    }
}

impl RawTransport for ProcessTransport {
    fn recv_raw(&mut self, n: usize, deadline: Deadline) -> Result<Option<Box<[u8]>>> {
        if let Some(data) = self.leftover.take() {
            return Ok(Some(self.take_up_to(data, n)));
        }
        if self.eof_seen {
            return Err(Error::EndOfStream);
        }
        let event = match deadline {
            Deadline::Forever => self.rx.recv().ok(),
            Deadline::Finite(d) => self.rx.recv_timeout(d).ok(),
            Deadline::Default => unreachable!("Tube resolves Default before reaching the transport"),
        };
        match event {
            Some(ReaderEvent::Data(data)) => Ok(Some(self.take_up_to(data, n))),
            Some(ReaderEvent::Eof) => {
                self.eof_seen = true;
                Err(Error::EndOfStream)
            }
            Some(ReaderEvent::Err(e)) => Err(Error::Io(e)),
            None => Ok(None),
        }
    }

    fn send_raw(&mut self, data: &[u8]) -> Result<()> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| Error::bad_argument("send on a shut-down tube"))?;
        stdin.write_all(data)?;
        stdin.flush()?;
        Ok(())
    }

    fn can_recv_raw(&mut self, deadline: Deadline) -> Result<bool> {
        if self.leftover.is_some() || self.eof_seen {
            return Ok(true);
        }
        let event = match deadline {
            Deadline::Forever => self.rx.recv().ok(),
            Deadline::Finite(d) if d.is_zero() => self.rx.try_recv().ok(),
            Deadline::Finite(d) => self.rx.recv_timeout(d).ok(),
            Deadline::Default => unreachable!("Tube resolves Default before reaching the transport"),
        };
        match event {
            Some(event) => {
                self.stash(event);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn shutdown_raw(&mut self, dir: Direction) -> Result<()> {
        match dir {
            Direction::Send => {
                self.send_shutdown = true;
                self.stdin = None;
            }
            Direction::Recv => {
                self.recv_shutdown = true;
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
        Some(self.child.id() as RawFdLike)
    }

    fn close(&mut self) -> Result<()> {
        self.recv_shutdown = true;
        self.send_shutdown = true;
        self.stdin = None;
        let _ = self.child.kill();
        let _ = self.child.wait();
        Ok(())
    }
}
