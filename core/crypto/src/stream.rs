//! Streaming encryption.
//!
//! [`EncryptingStream`] wraps a sink and [`DecryptingStream`] wraps a source.
//! Plaintext is cut into frames of randomized length, and each frame is
//! sealed independently, so the ciphertext can be read back through reads
//! of any size regardless of how it was written.
//!
//! # Format
//! ```text
//! version (1)
//! frame*: flags (1) | sealed_len (4, LE) | nonce || ciphertext || tag
//! ```
//! Each frame authenticates `index (8, LE) || flags` as associated data.
//! Exactly one frame, the last, carries [`FLAG_FINAL`], so truncated,
//! reordered, spliced or extended streams fail to decrypt.

use rand::Rng;
use std::io::{self, Read, Write};
use tracing::warn;

use crate::aead::{open, seal, NONCE_SIZE, TAG_SIZE};
use crate::keys::DataKey;
use coffer_common::{Error, Result};

/// Stream format version.
pub const STREAM_VERSION: u8 = 1;

/// Default lower bound for frame plaintext length (4 KiB).
pub const DEFAULT_MIN_FRAME: usize = 4 * 1024;

/// Default upper bound for frame plaintext length (64 KiB).
pub const DEFAULT_MAX_FRAME: usize = 64 * 1024;

/// Largest frame plaintext a reader accepts (16 MiB).
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Frame flag marking the end of the stream.
pub const FLAG_FINAL: u8 = 0x01;

const FRAME_HEADER_SIZE: usize = 5;

fn frame_aad(index: u64, flags: u8) -> [u8; 9] {
    let mut aad = [0u8; 9];
    aad[..8].copy_from_slice(&index.to_le_bytes());
    aad[8] = flags;
    aad
}

fn invalid_data(message: impl Into<String>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, message.into())
}

/// Encrypting writer that seals plaintext into frames.
///
/// [`finish`](Self::finish) must be called to write the final frame; a
/// stream dropped without it is truncated and will not decrypt.
pub struct EncryptingStream<W: Write> {
    sink: Option<W>,
    key: DataKey,
    buffer: Vec<u8>,
    target: usize,
    min_frame: usize,
    max_frame: usize,
    index: u64,
    header_written: bool,
}

impl<W: Write> EncryptingStream<W> {
    /// Create a new encrypting stream over `sink`.
    pub fn new(sink: W, key: &DataKey) -> Self {
        let mut stream = Self {
            sink: Some(sink),
            key: key.clone(),
            buffer: Vec::new(),
            target: 0,
            min_frame: DEFAULT_MIN_FRAME,
            max_frame: DEFAULT_MAX_FRAME,
            index: 0,
            header_written: false,
        };
        stream.pick_target();
        stream
    }

    /// Set the range frame lengths are drawn from.
    ///
    /// # Errors
    /// - `min` is zero, `min > max`, or `max` exceeds [`MAX_FRAME_SIZE`]
    pub fn with_frame_range(mut self, min: usize, max: usize) -> Result<Self> {
        if min == 0 || min > max || max > MAX_FRAME_SIZE {
            return Err(Error::InvalidInput(format!(
                "Invalid frame range: {}..={}",
                min, max
            )));
        }
        self.min_frame = min;
        self.max_frame = max;
        self.pick_target();
        Ok(self)
    }

    fn pick_target(&mut self) {
        self.target = rand::thread_rng().gen_range(self.min_frame..=self.max_frame);
    }

    fn sink(&mut self) -> io::Result<&mut W> {
        self.sink
            .as_mut()
            .ok_or_else(|| io::Error::other("Stream already finished"))
    }

    fn write_header(&mut self) -> io::Result<()> {
        if !self.header_written {
            self.sink()?.write_all(&[STREAM_VERSION])?;
            self.header_written = true;
        }
        Ok(())
    }

    fn seal_frame(&mut self, flags: u8) -> io::Result<()> {
        self.write_header()?;

        let aad = frame_aad(self.index, flags);
        let sealed = seal(self.key.as_bytes(), &self.buffer, &aad)
            .map_err(|e| io::Error::other(e.to_string()))?;

        let sink = self.sink()?;
        sink.write_all(&[flags])?;
        sink.write_all(&(sealed.len() as u32).to_le_bytes())?;
        sink.write_all(&sealed)?;

        self.buffer.clear();
        self.index += 1;
        self.pick_target();
        Ok(())
    }

    /// Seal the remaining plaintext as the final frame and return the sink.
    pub fn finish(mut self) -> Result<W> {
        self.seal_frame(FLAG_FINAL)?;
        let mut sink = self
            .sink
            .take()
            .ok_or_else(|| Error::Crypto("Stream already finished".to_string()))?;
        sink.flush()?;
        Ok(sink)
    }
}

impl<W: Write> Write for EncryptingStream<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.sink()?;
        if self.buffer.len() >= self.target {
            self.seal_frame(0)?;
        }
        let room = self.target - self.buffer.len();
        let n = room.min(buf.len());
        self.buffer.extend_from_slice(&buf[..n]);
        if self.buffer.len() >= self.target {
            self.seal_frame(0)?;
        }
        Ok(n)
    }

    /// Flushes the sink; buffered plaintext stays pending until the
    /// frame fills or the stream is finished.
    fn flush(&mut self) -> io::Result<()> {
        self.sink()?.flush()
    }
}

impl<W: Write> Drop for EncryptingStream<W> {
    fn drop(&mut self) {
        if self.sink.is_some() {
            warn!(frames = self.index, "Encrypting stream dropped without finish");
        }
    }
}

/// Decrypting reader over a stream produced by [`EncryptingStream`].
///
/// Failures (wrong key, tampering, truncation) are reported as
/// [`io::ErrorKind::InvalidData`].
pub struct DecryptingStream<R: Read> {
    source: R,
    key: DataKey,
    plaintext: Vec<u8>,
    position: usize,
    index: u64,
    header_read: bool,
    finished: bool,
}

impl<R: Read> DecryptingStream<R> {
    /// Create a new decrypting stream over `source`.
    pub fn new(source: R, key: &DataKey) -> Self {
        Self {
            source,
            key: key.clone(),
            plaintext: Vec::new(),
            position: 0,
            index: 0,
            header_read: false,
            finished: false,
        }
    }

    /// Return the underlying source.
    pub fn into_inner(self) -> R {
        self.source
    }

    fn read_exact_or_truncated(&mut self, buf: &mut [u8]) -> io::Result<()> {
        self.source.read_exact(buf).map_err(|e| {
            if e.kind() == io::ErrorKind::UnexpectedEof {
                invalid_data("Encrypted stream is truncated")
            } else {
                e
            }
        })
    }

    fn read_frame(&mut self) -> io::Result<()> {
        if !self.header_read {
            let mut version = [0u8; 1];
            self.read_exact_or_truncated(&mut version)?;
            if version[0] != STREAM_VERSION {
                return Err(invalid_data(format!(
                    "Unsupported stream version: {}",
                    version[0]
                )));
            }
            self.header_read = true;
        }

        let mut header = [0u8; FRAME_HEADER_SIZE];
        self.read_exact_or_truncated(&mut header)?;
        let flags = header[0];
        if flags & !FLAG_FINAL != 0 {
            return Err(invalid_data(format!("Unknown frame flags: {:#04x}", flags)));
        }

        let mut len_bytes = [0u8; 4];
        len_bytes.copy_from_slice(&header[1..]);
        let sealed_len = u32::from_le_bytes(len_bytes) as usize;
        if sealed_len < NONCE_SIZE + TAG_SIZE || sealed_len > NONCE_SIZE + TAG_SIZE + MAX_FRAME_SIZE
        {
            return Err(invalid_data(format!("Invalid frame length: {}", sealed_len)));
        }

        let mut sealed = vec![0u8; sealed_len];
        self.read_exact_or_truncated(&mut sealed)?;

        let aad = frame_aad(self.index, flags);
        self.plaintext = open(self.key.as_bytes(), &sealed, &aad)
            .map_err(|_| invalid_data(format!("Frame {} failed authentication", self.index)))?;
        self.position = 0;
        self.index += 1;

        if flags & FLAG_FINAL != 0 {
            let mut trailing = [0u8; 1];
            loop {
                match self.source.read(&mut trailing) {
                    Ok(0) => break,
                    Ok(_) => return Err(invalid_data("Trailing data after final frame")),
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => return Err(e),
                }
            }
            self.finished = true;
        }
        Ok(())
    }
}

impl<R: Read> Read for DecryptingStream<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            if self.position < self.plaintext.len() {
                let n = (self.plaintext.len() - self.position).min(buf.len());
                buf[..n].copy_from_slice(&self.plaintext[self.position..self.position + n]);
                self.position += n;
                return Ok(n);
            }
            if self.finished {
                return Ok(0);
            }
            self.read_frame()?;
        }
    }
}

/// Encrypt a complete byte slice using streaming encryption.
pub fn encrypt_bytes(key: &DataKey, data: &[u8]) -> Result<Vec<u8>> {
    let mut stream = EncryptingStream::new(Vec::new(), key);
    stream.write_all(data)?;
    stream.finish()
}

/// Decrypt a complete byte slice that was encrypted with streaming encryption.
pub fn decrypt_bytes(key: &DataKey, data: &[u8]) -> Result<Vec<u8>> {
    let mut stream = DecryptingStream::new(data, key);
    let mut output = Vec::new();
    stream.read_to_end(&mut output)?;
    Ok(output)
}
