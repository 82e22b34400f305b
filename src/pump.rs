//! Tube-to-tube pumps: a dedicated `std::thread` polls one side with a
//! short deadline and forwards whatever it got to
//! the other, stopping once either side disconnects.
//!
//! A pump moves raw bytes only; it does not preserve any message framing
//! either side of it might otherwise impose.

use crate::deadline::Deadline;
use crate::direction::Direction;
use crate::transport::RawTransport;
use crate::tube::Tube;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// How long a single pump iteration waits on the source before checking
/// whether it should stop. Short enough that `shutdown`/closing a
/// transport is noticed promptly, long enough not to busy-loop.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// A cheaply-cloneable handle to a [`Tube`] shared between the caller and
/// a pump thread. `std::ops::Shl`/`Shr` give `a << b` / `a >> b` sugar for
/// wiring up pumps; Rust's `PartialEq::ne` must return `bool` so it can't
/// host a third wiring operator, hence `connect_both` as its named
/// equivalent.
pub struct SharedTube<T: RawTransport>(Arc<Mutex<Tube<T>>>);

impl<T: RawTransport> SharedTube<T> {
    pub fn new(tube: Tube<T>) -> Self {
        SharedTube(Arc::new(Mutex::new(tube)))
    }

    pub fn lock(&self) -> MutexGuard<'_, Tube<T>> {
        self.0.lock().unwrap()
    }
}

impl<T: RawTransport> Clone for SharedTube<T> {
    fn clone(&self) -> Self {
        SharedTube(self.0.clone())
    }
}

impl<T: RawTransport + 'static> SharedTube<T> {
    /// Reads from `other`, writes into `self`. Returns immediately; the
    /// copy runs on a background thread until either side disconnects.
    pub fn connect_input<U: RawTransport + 'static>(&self, other: &SharedTube<U>) {
        spawn_pump(other.clone(), self.clone());
    }

    /// Reads from `self`, writes into `other`.
    pub fn connect_output<U: RawTransport + 'static>(&self, other: &SharedTube<U>) {
        spawn_pump(self.clone(), other.clone());
    }

    /// Wires up both directions: `self`'s output feeds `other`'s input,
    /// and vice versa.
    pub fn connect_both<U: RawTransport + 'static>(&self, other: &SharedTube<U>) {
        self.connect_output(other);
        self.connect_input(other);
    }
}

fn spawn_pump<S, K>(source: SharedTube<S>, sink: SharedTube<K>)
where
    S: RawTransport + 'static,
    K: RawTransport + 'static,
{
    std::thread::Builder::new()
        .name("tube-pump".into())
        .spawn(move || pump_loop(source, sink))
        .expect("failed to spawn pump thread");
}

fn pump_loop<S, K>(source: SharedTube<S>, sink: SharedTube<K>)
where
    S: RawTransport,
    K: RawTransport,
{
    loop {
        {
            let source_guard = source.lock();
            let sink_guard = sink.lock();
            if !source_guard.connected(Direction::Recv) || !sink_guard.connected(Direction::Send) {
                break;
            }
            if !source_guard.countdown_active() {
                break;
            }
        }

        let chunk = {
            let mut source_guard = source.lock();
            source_guard.recv(None, Deadline::Finite(POLL_INTERVAL))
        };
        match chunk {
            Ok(data) if !data.is_empty() => {
                let mut sink_guard = sink.lock();
                if sink_guard.send(&data).is_err() {
                    break;
                }
            }
            Ok(_empty) => continue,
            Err(_end_of_stream_or_io_error) => break,
        }
    }

    let _ = sink.lock().shutdown(Direction::Send);
    let _ = source.lock().shutdown(Direction::Recv);
}

/// Free-function equivalents of [`SharedTube::connect_input`] /
/// `connect_output` / `connect_both`, for callers that'd rather not spell
/// out which side is the sink.
pub fn connect_input<S, K>(sink: &SharedTube<K>, source: &SharedTube<S>)
where
    S: RawTransport + 'static,
    K: RawTransport + 'static,
{
    sink.connect_input(source);
}

pub fn connect_output<S, K>(source: &SharedTube<S>, sink: &SharedTube<K>)
where
    S: RawTransport + 'static,
    K: RawTransport + 'static,
{
    source.connect_output(sink);
}

pub fn connect_both<A, B>(a: &SharedTube<A>, b: &SharedTube<B>)
where
    A: RawTransport + 'static,
    B: RawTransport + 'static,
{
    a.connect_both(b);
}

/// `&a << &b` wires `b`'s output into `a` (`a.connect_input(b)`) and
/// yields `b` back, so pumps can be chained: `&a << &b << &c` feeds `c`
/// into `b`, then `b` into `a`.
impl<'a, S, K> std::ops::Shl<&'a SharedTube<K>> for &'a SharedTube<S>
where
    S: RawTransport + 'static,
    K: RawTransport + 'static,
{
    type Output = SharedTube<K>;

    fn shl(self, sink: &'a SharedTube<K>) -> SharedTube<K> {
        self.connect_input(sink);
        sink.clone()
    }
}

/// `&source >> &sink` is the mirror image of `<<`: reads from the left,
/// writes into the right, yields the right.
impl<'a, S, K> std::ops::Shr<&'a SharedTube<K>> for &'a SharedTube<S>
where
    S: RawTransport + 'static,
    K: RawTransport + 'static,
{
    type Output = SharedTube<K>;

    fn shr(self, sink: &'a SharedTube<K>) -> SharedTube<K> {
        self.connect_output(sink);
        sink.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use crate::error::{Error, Result as TubeResult};
    use std::collections::VecDeque;

    struct ScriptedTransport {
        reads: VecDeque<TubeResult<Option<Box<[u8]>>>>,
        sent: Vec<u8>,
        open: bool,
    }

    impl ScriptedTransport {
        fn new(reads: Vec<TubeResult<Option<Box<[u8]>>>>) -> Self {
            ScriptedTransport {
                reads: reads.into(),
                sent: Vec::new(),
                open: true,
            }
        }
    }

    impl RawTransport for ScriptedTransport {
        fn recv_raw(&mut self, _n: usize, _deadline: Deadline) -> TubeResult<Option<Box<[u8]>>> {
            match self.reads.pop_front() {
                Some(Ok(v)) => Ok(v),
                Some(Err(e)) => {
                    self.open = false;
                    Err(e)
                }
                None => Ok(None),
            }
        }

        fn send_raw(&mut self, data: &[u8]) -> TubeResult<()> {
            self.sent.extend_from_slice(data);
            Ok(())
        }

        fn can_recv_raw(&mut self, _deadline: Deadline) -> TubeResult<bool> {
            Ok(!self.reads.is_empty())
        }

        fn shutdown_raw(&mut self, _dir: Direction) -> TubeResult<()> {
            self.open = false;
            Ok(())
        }

        fn connected_raw(&self, _dir: Direction) -> bool {
            self.open
        }

        fn close(&mut self) -> TubeResult<()> {
            self.open = false;
            Ok(())
        }
    }

    /// Regression test for the operator's wiring direction: `&a << &b`
    /// must read from `b` and write into `a`, the same direction
    /// `a.connect_input(b)` already gets right.
    #[test]
    fn shl_reads_from_right_operand_and_writes_into_left_operand() {
        let a = SharedTube::new(Tube::new(
            ScriptedTransport::new(vec![Ok(None)]),
            Arc::new(Context::default()),
        ));
        let b = SharedTube::new(Tube::new(
            ScriptedTransport::new(vec![
                Ok(Some(b"hi".to_vec().into_boxed_slice())),
                Err(Error::EndOfStream),
            ]),
            Arc::new(Context::default()),
        ));

        let _ = &a << &b;

        std::thread::sleep(Duration::from_millis(300));
        assert_eq!(a.lock().transport().sent, b"hi");
    }
}
