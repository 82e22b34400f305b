//! Manual shell upload: negotiate a compressor the remote shell actually
//! has, base64-chunk the payload
//! through `echo | base64 -d`, then decompress and `chmod` in place.
//!
//! The target path suffix detail (`target_path + ".gz"`/`".xz"` as the
//! upload-time path, decompressed in place back onto `target_path`) isn't
//! spelled out in the distilled spec but is exactly what the original
//! source does, so that's what this follows.

use crate::buffer::DEFAULT_CHUNK_SIZE;
use crate::deadline::Deadline;
use crate::error::{Error, Result};
use crate::transport::RawTransport;
use crate::tube::Tube;
use base64::Engine;

/// Tuning knobs for [`upload_manually`].
pub struct UploadOptions {
    /// `chmod` flags applied to `target_path` once the upload (and any
    /// decompression) completes, passed through to `chmod` verbatim
    /// (e.g. `"u+x"` or `"755"`). `None` skips the `chmod` step.
    pub chmod_flags: Option<String>,
    /// The shell prompt to wait for after each command, the default way
    /// of detecting that a command has finished. An empty prompt falls
    /// back to marker mode: `marker` is echoed after every command and
    /// waited for instead, which is useful against shells with no stable
    /// prompt to match on.
    pub prompt: Vec<u8>,
    /// The sentinel echoed after each shell command in marker mode.
    /// Framing detail only; never sent as tube payload data. Unused
    /// unless `prompt` is empty.
    pub marker: Vec<u8>,
    /// How many raw bytes go into each base64-encoded shell command.
    pub chunk_size: usize,
}

impl Default for UploadOptions {
    fn default() -> Self {
        UploadOptions {
            chmod_flags: Some("u+x".to_string()),
            prompt: b"$".to_vec(),
            marker: b"--tube-upload-marker--".to_vec(),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

enum Compression {
    None,
    Gzip,
    Xz,
}

/// Writes `data` to `target_path` on the other end of `tube`, which is
/// assumed to already be attached to an interactive shell. Compression is
/// negotiated against whatever the remote shell actually has on its
/// `PATH`; if neither `gzip` nor `xz` is available, or compressing
/// doesn't actually shrink the payload, the data is sent raw.
pub fn upload_manually<T: RawTransport>(
    tube: &mut Tube<T>,
    target_path: &str,
    data: &[u8],
    opts: &UploadOptions,
    deadline: Deadline,
) -> Result<()> {
    let compression = negotiate_compression(tube, deadline)?;

    let (payload, remote_path, decompress_util): (Vec<u8>, String, Option<&'static str>) =
        match compression {
            Compression::Gzip => {
                let compressed = gzip_compress(data);
                if compressed.len() < data.len() {
                    (compressed, format!("{target_path}.gz"), Some("gzip"))
                } else {
                    (data.to_vec(), target_path.to_string(), None)
                }
            }
            Compression::Xz => {
                let compressed = xz_compress(data)?;
                if compressed.len() < data.len() {
                    (compressed, format!("{target_path}.xz"), Some("xz"))
                } else {
                    (data.to_vec(), target_path.to_string(), None)
                }
            }
            Compression::None => (data.to_vec(), target_path.to_string(), None),
        };

    send_chunks_base64(tube, &remote_path, &payload, opts, deadline)?;

    if let Some(util) = decompress_util {
        let command = format!("{util} -d -f {}", shell_quote(&remote_path));
        run_remote_command(tube, &command, opts, deadline)?;
    }

    if let Some(flags) = &opts.chmod_flags {
        let command = format!("chmod {flags} {}", shell_quote(target_path));
        run_remote_command(tube, &command, opts, deadline)?;
    }

    Ok(())
}

fn negotiate_compression<T: RawTransport>(
    tube: &mut Tube<T>,
    deadline: Deadline,
) -> Result<Compression> {
    if probe_utility(tube, "xz", deadline)? {
        return Ok(Compression::Xz);
    }
    if probe_utility(tube, "gzip", deadline)? {
        return Ok(Compression::Gzip);
    }
    Ok(Compression::None)
}

fn probe_utility<T: RawTransport>(tube: &mut Tube<T>, util: &str, deadline: Deadline) -> Result<bool> {
    let command = format!("command -v {util} >/dev/null 2>&1 && echo YEP || echo NOPE");
    tube.send_line(command.as_bytes())?;
    let answer = tube.recv_line(true, deadline)?;
    Ok(&*answer == b"YEP")
}

fn send_chunks_base64<T: RawTransport>(
    tube: &mut Tube<T>,
    remote_path: &str,
    data: &[u8],
    opts: &UploadOptions,
    deadline: Deadline,
) -> Result<()> {
    let quoted_path = shell_quote(remote_path);
    if data.is_empty() {
        return run_remote_command(tube, &format!(": > {quoted_path}"), opts, deadline);
    }
    for (i, chunk) in data.chunks(opts.chunk_size.max(1)).enumerate() {
        let encoded = base64::engine::general_purpose::STANDARD.encode(chunk);
        let redirect = if i == 0 { ">" } else { ">>" };
        let command = format!(
            "echo {} | base64 -d {redirect} {quoted_path}",
            shell_quote(&encoded)
        );
        run_remote_command(tube, &command, opts, deadline)?;
    }
    Ok(())
}

/// Runs `command` in the remote shell, then waits for it to finish
/// before returning, so the caller never races ahead of a command that's
/// still running. By default this waits for `opts.prompt` to reappear;
/// if `opts.prompt` is empty, it falls back to marker mode, appending an
/// echoed `opts.marker` sentinel to the command and waiting for that
/// instead.
fn run_remote_command<T: RawTransport>(
    tube: &mut Tube<T>,
    command: &str,
    opts: &UploadOptions,
    deadline: Deadline,
) -> Result<()> {
    let wait_for = if opts.prompt.is_empty() {
        let marker_str = String::from_utf8_lossy(&opts.marker).into_owned();
        let full = format!("{command}; echo {marker_str}");
        tube.send_line(full.as_bytes())?;
        &opts.marker
    } else {
        tube.send_line(command.as_bytes())?;
        &opts.prompt
    };
    tube.recv_until(std::slice::from_ref(wait_for), true, deadline)
        .map_err(|e| match e {
            Error::EndOfStream => Error::UploadFailed(format!(
                "remote end closed before command completed: {command}"
            )),
            other => other,
        })?;
    Ok(())
}

fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "'\\''"))
}

fn gzip_compress(data: &[u8]) -> Vec<u8> {
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .expect("writing into an in-memory encoder cannot fail");
    encoder
        .finish()
        .expect("finishing an in-memory gzip stream cannot fail")
}

fn xz_compress(data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    lzma_rs::xz_compress(&mut std::io::Cursor::new(data), &mut out)
        .map_err(|e| Error::UploadFailed(format!("xz compression failed: {e}")))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shell_quote_escapes_single_quotes() {
        assert_eq!(shell_quote("it's"), "'it'\\''s'");
        assert_eq!(shell_quote("/tmp/plain"), "'/tmp/plain'");
    }

    #[test]
    fn gzip_round_trips_through_flate2_read_side() {
        use flate2::read::GzDecoder;
        use std::io::Read;

        let data = b"the quick brown fox jumps over the lazy dog".repeat(20);
        let compressed = gzip_compress(&data);
        assert!(compressed.len() < data.len());

        let mut decoder = GzDecoder::new(&compressed[..]);
        let mut roundtrip = Vec::new();
        decoder.read_to_end(&mut roundtrip).unwrap();
        assert_eq!(roundtrip, data);
    }

    #[test]
    fn xz_round_trips() {
        let data = b"the quick brown fox jumps over the lazy dog".repeat(20);
        let compressed = xz_compress(&data).unwrap();
        assert!(compressed.len() < data.len());

        let mut roundtrip = Vec::new();
        lzma_rs::xz_decompress(&mut std::io::Cursor::new(&compressed), &mut roundtrip).unwrap();
        assert_eq!(roundtrip, data);
    }

    #[test]
    fn default_options_use_shared_chunk_size() {
        let opts = UploadOptions::default();
        assert_eq!(opts.chunk_size, DEFAULT_CHUNK_SIZE);
        assert_eq!(opts.chmod_flags.as_deref(), Some("u+x"));
        assert_eq!(opts.prompt, b"$");
    }
}
