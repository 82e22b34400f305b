//! The [`Tube`] type: buffer, deadline stack and transport wired into the
//! receive and send operations.

use crate::buffer::Buffer;
use crate::context::{Context, Tristate};
use crate::deadline::{CountdownGuard, Deadline};
use crate::direction::Direction;
use crate::error::{Error, Result};
use crate::logging::{tube_debug, tube_warn_once};
use crate::matcher;
use crate::pack::{self, FlatItem};
use crate::transport::{RawFdLike, RawTransport};
use pretty_hex::PrettyHex;
use regex::bytes::Regex;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A byte-oriented, full-duplex channel over some [`RawTransport`], with an
/// internal receive buffer and a family of blocking-looking `recv_*`
/// operations.
pub struct Tube<T: RawTransport> {
    transport: T,
    buffer: Buffer,
    deadline_stack: Mutex<Vec<Deadline>>,
    newline: Option<Vec<u8>>,
    context: Arc<Context>,
    closed: bool,
}

impl<T: RawTransport> Tube<T> {
    pub fn new(transport: T, context: Arc<Context>) -> Self {
        Tube {
            transport,
            buffer: Buffer::new(),
            deadline_stack: Mutex::new(vec![Deadline::Default]),
            newline: None,
            context,
            closed: false,
        }
    }

    pub fn with_default_context(transport: T) -> Self {
        Self::new(transport, Arc::new(Context::default()))
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    /// The line terminator this tube uses, falling back to the context's
    /// default when no per-instance override has been set.
    pub fn newline(&self) -> &[u8] {
        self.newline.as_deref().unwrap_or(&self.context.newline)
    }

    pub fn set_newline(&mut self, newline: impl Into<Vec<u8>>) {
        self.newline = Some(newline.into());
    }

    // ---- deadlines -------------------------------------------------------

    /// Enters a scoped deadline override. The returned guard restores the
    /// previous deadline on drop, including on unwind.
    pub fn countdown(&self, d: Deadline) -> CountdownGuard<'_> {
        CountdownGuard::acquire(&self.deadline_stack, d)
    }

    /// Whether the currently active deadline (the top of the scope stack,
    /// resolved against the context) still has budget.
    pub fn countdown_active(&self) -> bool {
        match self.resolve_deadline(Deadline::Default) {
            Deadline::Forever => true,
            Deadline::Finite(d) => !d.is_zero(),
            Deadline::Default => unreachable!("resolve_deadline never returns Default"),
        }
    }

    /// Resolves `requested` against the current scope: `Default` defers to
    /// the enclosing scope (which itself defers to the context's timeout),
    /// and an explicit, finite `requested` is still capped by the
    /// enclosing scope — nested `countdown()` scopes can only ever shrink
    /// the effective deadline, never widen it.
    fn resolve_deadline(&self, requested: Deadline) -> Deadline {
        let scope_cap = {
            let guard = self.deadline_stack.lock().unwrap();
            *guard.last().expect("deadline stack is never empty")
        };
        let scope_cap = match scope_cap {
            Deadline::Default => self.context.timeout,
            other => other,
        };
        let requested = match requested {
            Deadline::Default => scope_cap,
            other => other,
        };
        scope_cap.combine(requested)
    }

    // ---- raw fill primitive ---------------------------------------------

    /// Performs exactly one `recv_raw` call and, if it returned data, moves
    /// it into the internal buffer. `Ok(true)` means bytes were added,
    /// `Ok(false)` means the deadline elapsed with nothing to show for it.
    fn raw_fill(&mut self, hint: Option<usize>, deadline: Deadline) -> Result<bool> {
        let n = self.buffer.get_fill_size(hint);
        match self.transport.recv_raw(n, deadline)? {
            Some(data) if !data.is_empty() => {
                tube_debug!("tube: recv {} bytes\n{:?}", data.len(), data.hex_dump());
                self.buffer.add(data);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Like [`Self::raw_fill`], but appends straight into a caller-owned
    /// `Vec` instead of the tube's buffer. Used by scanning operations
    /// (`recv_until`) that track their own accumulated-but-not-yet-returned
    /// bytes so a single push-back can restore everything atomically.
    fn raw_fill_into(&mut self, accumulated: &mut Vec<u8>, deadline: Deadline) -> Result<bool> {
        let n = self.buffer.get_fill_size(None);
        match self.transport.recv_raw(n, deadline)? {
            Some(data) if !data.is_empty() => {
                tube_debug!("tube: recv {} bytes\n{:?}", data.len(), data.hex_dump());
                accumulated.extend_from_slice(&data);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    // ---- receiving --------------------------------------------------------

    /// One buffered-or-single-raw-read fetch. If the buffer is non-empty,
    /// returns up to `n` bytes from it without touching the transport at
    /// all. Otherwise performs exactly one `recv_raw` under `deadline`;
    /// timeout is an empty return, not an error.
    pub fn recv(&mut self, n: Option<usize>, deadline: Deadline) -> Result<Box<[u8]>> {
        if !self.buffer.is_empty() {
            return Ok(self.buffer.get(n));
        }
        let effective = self.resolve_deadline(deadline);
        match self.raw_fill(n, effective) {
            Ok(_) => Ok(self.buffer.get(n)),
            Err(e) => Err(e),
        }
    }

    /// Blocks until exactly `n` bytes are available or the deadline
    /// elapses. On timeout the partially-filled buffer is left untouched
    /// (none of it is consumed) and an empty slice is returned.
    pub fn recv_n(&mut self, n: usize, deadline: Deadline) -> Result<Box<[u8]>> {
        if n == 0 {
            return Ok(Box::new([]));
        }
        let effective = self.resolve_deadline(deadline);
        let countdown = effective.start();
        while self.buffer.size() < n {
            if !countdown.active() {
                return Ok(Box::new([]));
            }
            match self.raw_fill(None, countdown.as_deadline()) {
                Ok(true) => continue,
                Ok(false) => return Ok(Box::new([])),
                Err(e) => return Err(e),
            }
        }
        Ok(self.buffer.get(Some(n)))
    }

    /// Scans for the earliest occurrence of any delimiter in `delims`,
    /// returning everything up to (and, unless `drop`, including) the
    /// match. Whatever follows the match is pushed back onto the buffer.
    /// On timeout or end of stream, every byte pulled off the transport
    /// for this call is pushed back before returning/raising, so the
    /// buffer's observable state is exactly as if the call never started.
    pub fn recv_until(
        &mut self,
        delims: &[Vec<u8>],
        drop: bool,
        deadline: Deadline,
    ) -> Result<Box<[u8]>> {
        if delims.is_empty() || delims.iter().any(|d| d.is_empty()) {
            return Err(Error::bad_argument(
                "recv_until: delims must be non-empty and contain no zero-length entries",
            ));
        }
        let longest = matcher::longest_len(delims);
        let effective = self.resolve_deadline(deadline);
        let countdown = effective.start();

        let mut accumulated: Vec<u8> = self.buffer.get(None).into_vec();
        let mut search_from = 0usize;

        loop {
            if let Some((pos, idx)) = matcher::find_earliest(&accumulated, delims, search_from) {
                let match_end = pos + delims[idx].len();
                let result_end = if drop { pos } else { match_end };
                let result = accumulated[..result_end].to_vec().into_boxed_slice();
                if match_end < accumulated.len() {
                    self.buffer.unget(accumulated[match_end..].to_vec());
                }
                return Ok(result);
            }
            search_from = accumulated.len().saturating_sub(longest.saturating_sub(1));

            if !countdown.active() {
                self.buffer.unget(std::mem::take(&mut accumulated));
                return Ok(Box::new([]));
            }
            match self.raw_fill_into(&mut accumulated, countdown.as_deadline()) {
                Ok(true) => continue,
                Ok(false) => {
                    self.buffer.unget(std::mem::take(&mut accumulated));
                    return Ok(Box::new([]));
                }
                Err(Error::EndOfStream) => {
                    self.buffer.unget(std::mem::take(&mut accumulated));
                    return Err(Error::EndOfStream);
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Reads one byte at a time, invoking `pred` with the bytes
    /// accumulated so far after each append, until it returns `true`.
    pub fn recv_pred(
        &mut self,
        mut pred: impl FnMut(&[u8]) -> bool,
        deadline: Deadline,
    ) -> Result<Box<[u8]>> {
        let effective = self.resolve_deadline(deadline);
        let countdown = effective.start();
        let mut accumulated: Vec<u8> = Vec::new();

        loop {
            if self.buffer.is_empty() {
                if !countdown.active() {
                    self.buffer.unget(std::mem::take(&mut accumulated));
                    return Ok(Box::new([]));
                }
                match self.raw_fill(None, countdown.as_deadline()) {
                    Ok(true) => {}
                    Ok(false) => {
                        self.buffer.unget(std::mem::take(&mut accumulated));
                        return Ok(Box::new([]));
                    }
                    Err(Error::EndOfStream) => {
                        self.buffer.unget(std::mem::take(&mut accumulated));
                        return Err(Error::EndOfStream);
                    }
                    Err(e) => return Err(e),
                }
            }
            let byte = self.buffer.get(Some(1));
            accumulated.extend_from_slice(&byte);
            if pred(&accumulated) {
                return Ok(accumulated.into_boxed_slice());
            }
        }
    }

    /// Like [`Self::recv_pred`], but the predicate is a regex: `exact`
    /// anchors the match at the start of the accumulated bytes (as
    /// Python's `re.match` does); otherwise the match may start anywhere.
    pub fn recv_regex(&mut self, re: &Regex, exact: bool, deadline: Deadline) -> Result<Box<[u8]>> {
        self.recv_pred(
            |acc| {
                if exact {
                    re.find(acc).is_some_and(|m| m.start() == 0)
                } else {
                    re.is_match(acc)
                }
            },
            deadline,
        )
    }

    /// Like [`Self::recv_regex`], but also returns the capture groups of
    /// the match against the final accumulated bytes.
    pub fn recv_regex_captures(
        &mut self,
        re: &Regex,
        exact: bool,
        deadline: Deadline,
    ) -> Result<Captured> {
        let bytes = self.recv_regex(re, exact, deadline)?;
        let caps = re
            .captures(&bytes)
            .expect("recv_regex's predicate guaranteed a match against these bytes");
        let groups = (1..caps.len())
            .map(|i| caps.get(i).map(|m| m.as_bytes().to_vec().into_boxed_slice()))
            .collect();
        Ok(Captured { bytes, groups })
    }

    /// Receives up to and including the next line terminator (or, if
    /// `drop`, stopping short of it). On end of stream with data still
    /// buffered, the tri-state `throw_eof_on_incomplete_line` policy
    /// decides whether that trailing partial line is returned or the
    /// end-of-stream error is still raised.
    pub fn recv_line(&mut self, drop: bool, deadline: Deadline) -> Result<Box<[u8]>> {
        let newline = self.newline().to_vec();
        match self.recv_until(std::slice::from_ref(&newline), drop, deadline) {
            Ok(b) => Ok(b),
            Err(Error::EndOfStream) => {
                let policy = self.context.throw_eof_on_incomplete_line;
                if policy != Tristate::True && !self.buffer.is_empty() {
                    if policy == Tristate::Unset {
                        tube_warn_once!(
                            "recv_line_eof_partial",
                            "recv_line: end of stream reached with a trailing line missing its terminator; returning it anyway"
                        );
                    }
                    Ok(self.buffer.get(None))
                } else {
                    Err(Error::EndOfStream)
                }
            }
            Err(e) => Err(e),
        }
    }

    pub fn recv_line_opts(
        &mut self,
        drop: Option<bool>,
        keepends: Option<bool>,
        deadline: Deadline,
    ) -> Result<Box<[u8]>> {
        let drop = normalize_drop(drop, keepends, false)?;
        self.recv_line(drop, deadline)
    }

    /// Collects up to `max` lines under one shared deadline. An
    /// intermediate end of stream stops the loop and returns the lines
    /// gathered so far; a timeout pushes everything gathered so far back
    /// onto the buffer (as raw bytes) and returns an empty list.
    pub fn recv_lines(&mut self, max: usize, drop: bool, deadline: Deadline) -> Result<Vec<Box<[u8]>>> {
        let effective = self.resolve_deadline(deadline);
        let _guard = self.countdown(effective);
        let mut lines: Vec<Box<[u8]>> = Vec::new();

        for _ in 0..max {
            match self.recv_line(false, Deadline::Default) {
                Ok(line) if !line.is_empty() => lines.push(line),
                Ok(_timed_out) => {
                    let rejoin: Vec<u8> = lines.iter().flat_map(|l| l.iter().copied()).collect();
                    self.buffer.unget(rejoin);
                    return Ok(Vec::new());
                }
                Err(Error::EndOfStream) => break,
                Err(e) => return Err(e),
            }
        }

        if drop {
            let newline = self.newline().to_vec();
            Ok(lines
                .into_iter()
                .map(|l| strip_trailing_newline(&l, &newline))
                .collect())
        } else {
            Ok(lines)
        }
    }

    pub fn recv_lines_opts(
        &mut self,
        max: usize,
        drop: Option<bool>,
        keepends: Option<bool>,
        deadline: Deadline,
    ) -> Result<Vec<Box<[u8]>>> {
        let drop = normalize_drop(drop, keepends, true)?;
        self.recv_lines(max, drop, deadline)
    }

    /// Receives lines (discarding ones that don't match) until `pred`
    /// accepts one, under one shared deadline across the whole search.
    pub fn recv_line_pred(
        &mut self,
        mut pred: impl FnMut(&[u8]) -> bool,
        drop: bool,
        deadline: Deadline,
    ) -> Result<Box<[u8]>> {
        let effective = self.resolve_deadline(deadline);
        let _guard = self.countdown(effective);
        let newline = self.newline().to_vec();
        let mut scratch: Vec<Box<[u8]>> = Vec::new();

        loop {
            match self.recv_line(false, Deadline::Default) {
                Ok(line) if !line.is_empty() => {
                    if pred(&line) {
                        return Ok(if drop {
                            strip_trailing_newline(&line, &newline)
                        } else {
                            line
                        });
                    }
                    scratch.push(line);
                }
                Ok(_timed_out) => {
                    let rejoin: Vec<u8> = scratch.iter().flat_map(|l| l.iter().copied()).collect();
                    self.buffer.unget(rejoin);
                    return Ok(Box::new([]));
                }
                Err(Error::EndOfStream) => {
                    let rejoin: Vec<u8> = scratch.iter().flat_map(|l| l.iter().copied()).collect();
                    self.buffer.unget(rejoin);
                    return Err(Error::EndOfStream);
                }
                Err(e) => return Err(e),
            }
        }
    }

    pub fn recv_line_contains(
        &mut self,
        items: &[Vec<u8>],
        drop: bool,
        deadline: Deadline,
    ) -> Result<Box<[u8]>> {
        self.recv_line_pred(
            |line| items.iter().any(|it| matcher::contains_subslice(line, it)),
            drop,
            deadline,
        )
    }

    pub fn recv_line_starts_with(
        &mut self,
        items: &[Vec<u8>],
        drop: bool,
        deadline: Deadline,
    ) -> Result<Box<[u8]>> {
        self.recv_line_pred(
            |line| items.iter().any(|it| line.starts_with(it.as_slice())),
            drop,
            deadline,
        )
    }

    pub fn recv_line_ends_with(
        &mut self,
        items: &[Vec<u8>],
        drop: bool,
        deadline: Deadline,
    ) -> Result<Box<[u8]>> {
        let newline = self.newline().to_vec();
        self.recv_line_pred(
            move |line| {
                items.iter().any(|it| {
                    let mut suffix = it.clone();
                    suffix.extend_from_slice(&newline);
                    line.ends_with(suffix.as_slice())
                })
            },
            drop,
            deadline,
        )
    }

    pub fn recv_line_regex(
        &mut self,
        re: &Regex,
        exact: bool,
        drop: bool,
        deadline: Deadline,
    ) -> Result<Box<[u8]>> {
        self.recv_line_pred(
            |line| {
                if exact {
                    re.find(line).is_some_and(|m| m.start() == 0)
                } else {
                    re.is_match(line)
                }
            },
            drop,
            deadline,
        )
    }

    /// Drains whatever arrives within `deadline`, stopping at the first
    /// raw read that times out. End of stream ends the drain too, without
    /// raising: both are "nothing more is coming right now", not errors.
    pub fn recv_repeat(&mut self, deadline: Deadline) -> Result<Box<[u8]>> {
        let effective = self.resolve_deadline(deadline);
        let countdown = effective.start();
        while countdown.active() {
            match self.raw_fill(None, countdown.as_deadline()) {
                Ok(true) => continue,
                Ok(false) => break,
                Err(Error::EndOfStream) => break,
                Err(e) => return Err(e),
            }
        }
        Ok(self.buffer.get(None))
    }

    /// Like [`Self::recv_repeat`], but intended to run to genuine end of
    /// stream (the default deadline is [`Deadline::Forever`]) and closes
    /// the tube once the stream is exhausted.
    pub fn recv_all(&mut self, deadline: Deadline) -> Result<Box<[u8]>> {
        let effective = self.resolve_deadline(deadline);
        let countdown = effective.start();
        loop {
            match self.raw_fill(None, countdown.as_deadline()) {
                Ok(true) => {
                    tube_debug!("recv_all: {} bytes buffered so far", self.buffer.size());
                }
                Ok(false) => break,
                Err(Error::EndOfStream) => break,
                Err(e) => return Err(e),
            }
        }
        let result = self.buffer.get(None);
        let _ = self.close();
        Ok(result)
    }

    /// True if the buffer already has data, or a probe under `deadline`
    /// would find some without raising.
    pub fn can_recv(&mut self, deadline: Deadline) -> Result<bool> {
        if !self.buffer.is_empty() {
            return Ok(true);
        }
        let effective = self.resolve_deadline(deadline);
        self.transport.can_recv_raw(effective)
    }

    /// Discards whatever is available. With `deadline` zero, only the
    /// already-buffered bytes are dropped and the transport is left
    /// untouched; otherwise this is `recv_repeat(deadline)` with the
    /// drained bytes discarded.
    pub fn clean(&mut self, deadline: Duration) -> Result<Box<[u8]>> {
        if deadline.is_zero() {
            return Ok(self.buffer.get(None));
        }
        self.recv_repeat(Deadline::Finite(deadline))
    }

    pub fn clean_default(&mut self) -> Result<Box<[u8]>> {
        self.clean(Duration::from_millis(50))
    }

    // ---- byte-width unpack shims -------------------------------------------

    pub fn recv_u8(&mut self, deadline: Deadline) -> Result<u8> {
        pack::u8(&self.recv_n(1, deadline)?)
    }

    pub fn recv_u16(&mut self, deadline: Deadline) -> Result<u16> {
        let endian = self.context.endian;
        pack::u16(&self.recv_n(2, deadline)?, endian)
    }

    pub fn recv_u32(&mut self, deadline: Deadline) -> Result<u32> {
        let endian = self.context.endian;
        pack::u32(&self.recv_n(4, deadline)?, endian)
    }

    pub fn recv_u64(&mut self, deadline: Deadline) -> Result<u64> {
        let endian = self.context.endian;
        pack::u64(&self.recv_n(8, deadline)?, endian)
    }

    pub fn recv_unpack(&mut self, bits: u32, deadline: Deadline) -> Result<u64> {
        if bits % 8 != 0 || bits == 0 || bits > 64 {
            return Err(Error::bad_argument(format!(
                "recv_unpack: unsupported width {bits} bits"
            )));
        }
        let bytes = self.recv_n((bits / 8) as usize, deadline)?;
        let endian = self.context.endian;
        match bits {
            8 => Ok(pack::u8(&bytes)? as u64),
            16 => Ok(pack::u16(&bytes, endian)? as u64),
            32 => Ok(pack::u32(&bytes, endian)? as u64),
            64 => pack::u64(&bytes, endian),
            other => Err(Error::bad_argument(format!(
                "recv_unpack: unsupported width {other} bits"
            ))),
        }
    }

    // ---- str convenience wrappers ----------------------------------------

    pub fn recv_str(&mut self, n: Option<usize>, deadline: Deadline) -> Result<String> {
        Ok(String::from_utf8_lossy(&self.recv(n, deadline)?).into_owned())
    }

    pub fn recv_line_str(&mut self, drop: bool, deadline: Deadline) -> Result<String> {
        Ok(String::from_utf8_lossy(&self.recv_line(drop, deadline)?).into_owned())
    }

    pub fn recv_until_str(
        &mut self,
        delims: &[Vec<u8>],
        drop: bool,
        deadline: Deadline,
    ) -> Result<String> {
        Ok(String::from_utf8_lossy(&self.recv_until(delims, drop, deadline)?).into_owned())
    }

    // ---- sending ------------------------------------------------------------

    pub fn send(&mut self, data: &[u8]) -> Result<()> {
        tube_debug!("tube: send {} bytes\n{:?}", data.len(), data.hex_dump());
        self.transport.send_raw(data)
    }

    pub fn send_line(&mut self, data: &[u8]) -> Result<()> {
        let mut buf = Vec::with_capacity(data.len() + self.newline().len());
        buf.extend_from_slice(data);
        buf.extend_from_slice(self.newline());
        self.send(&buf)
    }

    pub fn send_lines<I, S>(&mut self, lines: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<[u8]>,
    {
        for line in lines {
            self.send_line(line.as_ref())?;
        }
        Ok(())
    }

    /// Waits for `delim`, then sends `data`; returns what was received.
    pub fn send_after(
        &mut self,
        delims: &[Vec<u8>],
        data: &[u8],
        deadline: Deadline,
    ) -> Result<Box<[u8]>> {
        let received = self.recv_until(delims, false, deadline)?;
        self.send(data)?;
        Ok(received)
    }

    pub fn send_line_after(
        &mut self,
        delims: &[Vec<u8>],
        data: &[u8],
        deadline: Deadline,
    ) -> Result<Box<[u8]>> {
        let received = self.recv_until(delims, false, deadline)?;
        self.send_line(data)?;
        Ok(received)
    }

    /// Sends `data`, then waits for `delim`; returns what was received.
    pub fn send_then(
        &mut self,
        data: &[u8],
        delims: &[Vec<u8>],
        deadline: Deadline,
    ) -> Result<Box<[u8]>> {
        self.send(data)?;
        self.recv_until(delims, false, deadline)
    }

    pub fn send_line_then(
        &mut self,
        data: &[u8],
        delims: &[Vec<u8>],
        deadline: Deadline,
    ) -> Result<Box<[u8]>> {
        self.send_line(data)?;
        self.recv_until(delims, false, deadline)
    }

    // ---- pack shims -----------------------------------------------------------

    pub fn send_p8(&mut self, v: u8) -> Result<()> {
        self.send(&pack::p8(v))
    }

    pub fn send_p16(&mut self, v: u16) -> Result<()> {
        let endian = self.context.endian;
        self.send(&pack::p16(v, endian))
    }

    pub fn send_p32(&mut self, v: u32) -> Result<()> {
        let endian = self.context.endian;
        self.send(&pack::p32(v, endian))
    }

    pub fn send_p64(&mut self, v: u64) -> Result<()> {
        let endian = self.context.endian;
        self.send(&pack::p64(v, endian))
    }

    pub fn send_pack(&mut self, v: u64, bits: u32) -> Result<()> {
        let endian = self.context.endian;
        let bytes = pack::pack(v, bits, endian)?;
        self.send(&bytes)
    }

    pub fn send_flat(&mut self, items: impl IntoIterator<Item = FlatItem>) -> Result<()> {
        let endian = self.context.endian;
        let bytes = pack::flat(items, endian);
        self.send(&bytes)
    }

    pub fn send_fit(&mut self, pieces: impl IntoIterator<Item = (usize, Vec<u8>)>) -> Result<()> {
        let bytes = pack::fit(pieces)?;
        self.send(&bytes)
    }

    // ---- lifecycle --------------------------------------------------------------

    pub fn connected(&self, dir: Direction) -> bool {
        if self.closed {
            return false;
        }
        match dir {
            Direction::Any => {
                self.transport.connected_raw(Direction::Recv)
                    || self.transport.connected_raw(Direction::Send)
            }
            d => self.transport.connected_raw(d),
        }
    }

    pub fn shutdown(&mut self, dir: Direction) -> Result<()> {
        let dir = dir.require_concrete()?;
        self.transport.shutdown_raw(dir)
    }

    /// Idempotent: a second call is a no-op.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.transport.close()
    }

    pub fn fileno(&self) -> Result<RawFdLike> {
        self.transport.fileno().ok_or(Error::NotImplemented)
    }

    pub(crate) fn buffer_mut(&mut self) -> &mut Buffer {
        &mut self.buffer
    }

    /// Direct access to the underlying transport, for capabilities this
    /// tube doesn't itself surface.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }
}

impl<T: RawTransport> Drop for Tube<T> {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

/// An owned regex match against bytes returned by
/// [`Tube::recv_regex_captures`].
pub struct Captured {
    pub bytes: Box<[u8]>,
    pub groups: Vec<Option<Box<[u8]>>>,
}

/// Normalizes the legacy `keepends` argument against the newer `drop`
/// argument: the two may not be given together, and `keepends` maps onto
/// `drop = !keepends` with a one-time deprecation warning.
pub(crate) fn normalize_drop(
    drop: Option<bool>,
    keepends: Option<bool>,
    default_drop: bool,
) -> Result<bool> {
    if drop.is_some() && keepends.is_some() {
        return Err(Error::bad_argument(
            "'drop' and 'keepends' cannot both be given; 'keepends' is deprecated",
        ));
    }
    if let Some(keepends) = keepends {
        tube_warn_once!(
            "keepends_deprecated",
            "'keepends' is deprecated; pass 'drop' instead"
        );
        return Ok(!keepends);
    }
    Ok(drop.unwrap_or(default_drop))
}

fn strip_trailing_newline(line: &[u8], newline: &[u8]) -> Box<[u8]> {
    if line.ends_with(newline) {
        line[..line.len() - newline.len()].to_vec().into_boxed_slice()
    } else {
        line.to_vec().into_boxed_slice()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::RawTransport;
    use std::collections::VecDeque;

    /// A scripted transport double: `recv_raw` replays a fixed sequence of
    /// canned responses; `send_raw` records what it was given.
    struct ScriptedTransport {
        reads: VecDeque<Result<Option<Box<[u8]>>>>,
        sent: Vec<u8>,
        open: bool,
    }

    impl ScriptedTransport {
        fn new(reads: Vec<Result<Option<Box<[u8]>>>>) -> Self {
            ScriptedTransport {
                reads: reads.into(),
                sent: Vec::new(),
                open: true,
            }
        }
    }

    impl RawTransport for ScriptedTransport {
        fn recv_raw(&mut self, _n: usize, _deadline: Deadline) -> Result<Option<Box<[u8]>>> {
            match self.reads.pop_front() {
                Some(Ok(v)) => Ok(v),
                Some(Err(e)) => Err(e),
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

        fn shutdown_raw(&mut self, _dir: Direction) -> Result<()> {
            Ok(())
        }

        fn connected_raw(&self, _dir: Direction) -> bool {
            self.open
        }

        fn close(&mut self) -> Result<()> {
            self.open = false;
            Ok(())
        }
    }

    fn tube_with(reads: Vec<Result<Option<Box<[u8]>>>>) -> Tube<ScriptedTransport> {
        Tube::with_default_context(ScriptedTransport::new(reads))
    }

    #[test]
    fn recv_until_finds_delimiter_across_reads() {
        let mut t = tube_with(vec![
            Ok(Some(b"Hello ".to_vec().into_boxed_slice())),
            Ok(Some(b"World!\nrest".to_vec().into_boxed_slice())),
        ]);
        let line = t.recv_until(&[b"\n".to_vec()], false, Deadline::Forever).unwrap();
        assert_eq!(&*line, b"Hello World!\n");
        // "rest" was pushed back onto the buffer.
        let rest = t.recv(None, Deadline::Finite(Duration::ZERO)).unwrap();
        assert_eq!(&*rest, b"rest");
    }

    #[test]
    fn recv_until_drop_excludes_delimiter() {
        let mut t = tube_with(vec![Ok(Some(b"ABC\n".to_vec().into_boxed_slice()))]);
        let line = t.recv_until(&[b"\n".to_vec()], true, Deadline::Forever).unwrap();
        assert_eq!(&*line, b"ABC");
    }

    #[test]
    fn recv_until_times_out_and_restores_buffer() {
        let mut t = tube_with(vec![Ok(None)]);
        let got = t
            .recv_until(&[b"\n".to_vec()], false, Deadline::Finite(Duration::ZERO))
            .unwrap();
        assert!(got.is_empty());
    }

    #[test]
    fn recv_n_blocks_until_enough_bytes() {
        let mut t = tube_with(vec![
            Ok(Some(b"ab".to_vec().into_boxed_slice())),
            Ok(Some(b"cd".to_vec().into_boxed_slice())),
        ]);
        let got = t.recv_n(4, Deadline::Forever).unwrap();
        assert_eq!(&*got, b"abcd");
    }

    #[test]
    fn recv_n_timeout_leaves_partial_data_buffered() {
        let mut t = tube_with(vec![Ok(Some(b"ab".to_vec().into_boxed_slice())), Ok(None)]);
        let got = t.recv_n(4, Deadline::Finite(Duration::from_millis(5))).unwrap();
        assert!(got.is_empty());
        let remaining = t.recv(None, Deadline::Finite(Duration::ZERO)).unwrap();
        assert_eq!(&*remaining, b"ab");
    }

    #[test]
    fn recv_pred_stops_as_soon_as_predicate_is_true() {
        let mut t = tube_with(vec![Ok(Some(b"12345".to_vec().into_boxed_slice()))]);
        let got = t.recv_pred(|acc| acc.len() == 3, Deadline::Forever).unwrap();
        assert_eq!(&*got, b"123");
        let rest = t.recv(None, Deadline::Finite(Duration::ZERO)).unwrap();
        assert_eq!(&*rest, b"45");
    }

    #[test]
    fn recv_line_eof_with_buffered_tail_is_returned_by_default() {
        let mut t = tube_with(vec![
            Ok(Some(b"no newline here".to_vec().into_boxed_slice())),
            Err(Error::EndOfStream),
        ]);
        let line = t.recv_line(false, Deadline::Forever).unwrap();
        assert_eq!(&*line, b"no newline here");
    }

    #[test]
    fn recv_line_eof_with_empty_buffer_propagates() {
        let mut t = tube_with(vec![Err(Error::EndOfStream)]);
        let err = t.recv_line(false, Deadline::Forever).unwrap_err();
        assert!(matches!(err, Error::EndOfStream));
    }

    #[test]
    fn recv_lines_collects_up_to_max() {
        let mut t = tube_with(vec![Ok(Some(
            b"one\ntwo\nthree\n".to_vec().into_boxed_slice(),
        ))]);
        let lines = t.recv_lines(2, true, Deadline::Forever).unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(&*lines[0], b"one");
        assert_eq!(&*lines[1], b"two");
    }

    #[test]
    fn recv_repeat_drains_until_timeout_without_erroring() {
        let mut t = tube_with(vec![
            Ok(Some(b"abc".to_vec().into_boxed_slice())),
            Ok(None),
        ]);
        let got = t.recv_repeat(Deadline::Finite(Duration::from_millis(5))).unwrap();
        assert_eq!(&*got, b"abc");
    }

    #[test]
    fn recv_all_absorbs_end_of_stream_and_closes() {
        let mut t = tube_with(vec![
            Ok(Some(b"all of it".to_vec().into_boxed_slice())),
            Err(Error::EndOfStream),
        ]);
        let got = t.recv_all(Deadline::Forever).unwrap();
        assert_eq!(&*got, b"all of it");
        assert!(!t.connected(Direction::Any));
    }

    #[test]
    fn send_line_appends_newline() {
        let mut t = tube_with(vec![]);
        t.send_line(b"hi").unwrap();
        assert_eq!(&t.transport.sent, b"hi\n");
    }

    #[test]
    fn close_is_idempotent() {
        let mut t = tube_with(vec![]);
        t.close().unwrap();
        t.close().unwrap();
        assert!(!t.connected(Direction::Any));
    }

    #[test]
    fn normalize_drop_rejects_both_given() {
        assert!(normalize_drop(Some(true), Some(false), false).is_err());
    }

    #[test]
    fn normalize_drop_maps_keepends_inverse() {
        assert_eq!(normalize_drop(None, Some(true), false).unwrap(), false);
        assert_eq!(normalize_drop(None, Some(false), false).unwrap(), true);
    }

    #[test]
    fn countdown_scope_narrows_but_never_widens() {
        let t = tube_with(vec![]);
        let _outer = t.countdown(Deadline::Finite(Duration::from_millis(10)));
        let resolved = t.resolve_deadline(Deadline::Finite(Duration::from_secs(100)));
        match resolved {
            Deadline::Finite(d) => assert!(d <= Duration::from_millis(10)),
            other => panic!("expected a finite, narrowed deadline, got {other:?}"),
        }
    }
}
