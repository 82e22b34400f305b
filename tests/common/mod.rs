//! Shared test double for the integration suite: a transport that replays
//! scripted `recv_raw` outcomes and records everything handed to
//! `send_raw`, so scenarios can be driven deterministically without a
//! real process or socket.

use std::collections::VecDeque;
use tube::deadline::Deadline;
use tube::direction::Direction;
use tube::error::{Error, Result};
use tube::transport::RawTransport;

pub enum Scripted {
    Data(&'static [u8]),
    Timeout,
    Eof,
}

pub struct ScriptedTransport {
    reads: VecDeque<Scripted>,
    pub sent: Vec<u8>,
    recv_open: bool,
    send_open: bool,
}

impl ScriptedTransport {
    pub fn new(reads: Vec<Scripted>) -> Self {
        ScriptedTransport {
            reads: reads.into(),
            sent: Vec::new(),
            recv_open: true,
            send_open: true,
        }
    }
}

impl RawTransport for ScriptedTransport {
    fn recv_raw(&mut self, _n: usize, _deadline: Deadline) -> Result<Option<Box<[u8]>>> {
        match self.reads.pop_front() {
            Some(Scripted::Data(d)) => Ok(Some(d.to_vec().into_boxed_slice())),
            Some(Scripted::Timeout) => Ok(None),
            Some(Scripted::Eof) => {
                self.recv_open = false;
                Err(Error::EndOfStream)
            }
            None => Ok(None),
        }
    }

    fn send_raw(&mut self, data: &[u8]) -> Result<()> {
        self.sent.extend_from_slice(data);
        Ok(())
    }

    fn can_recv_raw(&mut self, _deadline: Deadline) -> Result<bool> {
        Ok(!self.reads.is_empty())
    }

    fn shutdown_raw(&mut self, dir: Direction) -> Result<()> {
        match dir {
            Direction::Recv => self.recv_open = false,
            Direction::Send => self.send_open = false,
            Direction::Any => {
                self.recv_open = false;
                self.send_open = false;
            }
        }
        Ok(())
    }

    fn connected_raw(&self, dir: Direction) -> bool {
        match dir {
            Direction::Recv => self.recv_open,
            Direction::Send => self.send_open,
            Direction::Any => self.recv_open || self.send_open,
        }
    }

    fn close(&mut self) -> Result<()> {
        self.recv_open = false;
        self.send_open = false;
        Ok(())
    }
}
