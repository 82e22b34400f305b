//! The interactive REPL: a reader thread copies tube output to stdout
//! while the calling thread copies stdin input to the tube, translating
//! local line endings to the tube's configured newline as it goes.

use crate::direction::Direction;
use crate::error::{Error, Result};
use crate::pump::SharedTube;
use crate::transport::RawTransport;
use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::deadline::Deadline;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// A pluggable source of interactive input, so an embedder can swap the
/// default raw-stdin reader for a richer terminal front-end (line
/// history, completion, ...) without touching the REPL's plumbing.
pub trait LineEditor: Send {
    /// Blocks for the next chunk of bytes to forward to the tube.
    /// Returns `None` once input is exhausted (local EOF).
    fn next_input(&mut self) -> Option<Vec<u8>>;
}

/// Byte-by-byte line-ending translator: `\r\n` and a bare `\n` both
/// collapse to the tube's configured newline; a lone `\r` not followed by
/// `\n` passes through unchanged once the next byte disambiguates it.
struct OsNewlineMatcher {
    saw_cr: bool,
    tube_newline: Vec<u8>,
}

impl OsNewlineMatcher {
    fn new(tube_newline: Vec<u8>) -> Self {
        OsNewlineMatcher {
            saw_cr: false,
            tube_newline,
        }
    }

    fn feed(&mut self, byte: u8) -> Vec<u8> {
        if self.saw_cr {
            self.saw_cr = false;
            if byte == b'\n' {
                return self.tube_newline.clone();
            }
            let mut out = vec![b'\r'];
            if byte == b'\r' {
                self.saw_cr = true;
            } else {
                out.push(byte);
            }
            return out;
        }
        match byte {
            b'\r' => {
                self.saw_cr = true;
                Vec::new()
            }
            b'\n' => self.tube_newline.clone(),
            b => vec![b],
        }
    }
}

/// The default [`LineEditor`]: raw, unbuffered reads from stdin.
struct StdinEditor {
    matcher: OsNewlineMatcher,
}

impl StdinEditor {
    fn new(tube_newline: Vec<u8>) -> Self {
        StdinEditor {
            matcher: OsNewlineMatcher::new(tube_newline),
        }
    }
}

impl LineEditor for StdinEditor {
    fn next_input(&mut self) -> Option<Vec<u8>> {
        let mut raw = [0u8; 4096];
        let n = std::io::stdin().read(&mut raw).ok()?;
        if n == 0 {
            return None;
        }
        let mut out = Vec::new();
        for &b in &raw[..n] {
            out.extend(self.matcher.feed(b));
        }
        Some(out)
    }
}

/// Runs an interactive session against `tube` using the default
/// raw-stdin [`LineEditor`]. Blocks until either side disconnects or
/// stdin reaches local end of file.
pub fn interactive<T: RawTransport + 'static>(tube: &SharedTube<T>) -> Result<()> {
    let newline = tube.lock().newline().to_vec();
    interactive_with(tube, &mut StdinEditor::new(newline))
}

/// Like [`interactive`], but reads input from a caller-supplied
/// [`LineEditor`] instead of stdin directly.
pub fn interactive_with<T: RawTransport + 'static>(
    tube: &SharedTube<T>,
    editor: &mut dyn LineEditor,
) -> Result<()> {
    let stop = Arc::new(AtomicBool::new(false));

    let reader_tube = tube.clone();
    let reader_stop = stop.clone();
    let reader = std::thread::Builder::new()
        .name("tube-interactive-reader".into())
        .spawn(move || reader_loop(reader_tube, reader_stop))
        .expect("failed to spawn interactive reader thread");

    loop {
        if stop.load(Ordering::Acquire) {
            break;
        }
        {
            let g = tube.lock();
            if !g.connected(Direction::Send) {
                break;
            }
        }
        match editor.next_input() {
            Some(bytes) if !bytes.is_empty() => {
                let mut g = tube.lock();
                if !g.connected(Direction::Send) {
                    break;
                }
                g.send(&bytes)?;
            }
            Some(_empty) => continue,
            None => break,
        }
    }

    {
        let mut g = tube.lock();
        let _ = g.shutdown(Direction::Send);
    }
    let _ = reader.join();
    Ok(())
}

/// Copies tube output to stdout until the remote end reaches end of
/// stream or disconnects, at which point `stop` is set so the main loop
/// in [`interactive_with`] notices and stops blocking on stdin too.
fn reader_loop<T: RawTransport>(tube: SharedTube<T>, stop: Arc<AtomicBool>) {
    let mut stdout = std::io::stdout();
    loop {
        let chunk = {
            let mut g = tube.lock();
            if !g.connected(Direction::Recv) {
                break;
            }
            g.recv(None, Deadline::Finite(POLL_INTERVAL))
        };
        match chunk {
            Ok(data) if !data.is_empty() => {
                if stdout.write_all(&data).is_err() {
                    break;
                }
                let _ = stdout.flush();
            }
            Ok(_empty) => continue,
            Err(Error::EndOfStream) => break,
            Err(_io_error) => break,
        }
    }
    stop.store(true, Ordering::Release);
}
