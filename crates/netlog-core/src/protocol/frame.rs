//! Incremental JSON object framing.
//!
//! Producers write packets back to back with no delimiter and the relay does
//! not preserve write boundaries, so the viewer treats the accumulated text
//! as the source of truth. The scanner tracks string/escape state and brace
//! depth, which keeps braces inside string values (and nested objects) from
//! ending a frame early.
//!
//! Text outside any object is not part of the protocol. It is skipped up to
//! the next `{` and counted in `skipped_bytes`.

use crate::error::{NetlogError, Result};

/// Default upper bound for a single frame.
pub const DEFAULT_MAX_FRAME_BYTES: usize = 1024 * 1024;

/// Stateful scanner over an append-only text stream.
#[derive(Debug)]
pub struct FrameDecoder {
    buf: String,
    /// Bytes before this offset are consumed; compacted on the next push.
    head: usize,
    /// Next byte to scan.
    pos: usize,
    /// Offset of the `{` that opened the pending frame.
    start: Option<usize>,
    nesting: Nesting,
    /// Inside an oversized object: follow its structure, keep none of it.
    discarding: bool,
    max_frame_bytes: usize,
    skipped: u64,
}

/// String/escape state and brace depth of the object being scanned.
#[derive(Debug, Default, Clone, Copy)]
struct Nesting {
    depth: usize,
    in_string: bool,
    escaped: bool,
}

impl Nesting {
    fn open() -> Self {
        Self { depth: 1, ..Self::default() }
    }

    /// Feed one byte; true when it closes the outermost object.
    fn step(&mut self, b: u8) -> bool {
        if self.in_string {
            if self.escaped {
                self.escaped = false;
            } else if b == b'\\' {
                self.escaped = true;
            } else if b == b'"' {
                self.in_string = false;
            }
            return false;
        }
        match b {
            b'"' => self.in_string = true,
            b'{' => self.depth += 1,
            b'}' => {
                self.depth -= 1;
                return self.depth == 0;
            }
            _ => {}
        }
        false
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::with_limit(DEFAULT_MAX_FRAME_BYTES)
    }

    pub fn with_limit(max_frame_bytes: usize) -> Self {
        Self {
            buf: String::new(),
            head: 0,
            pos: 0,
            start: None,
            nesting: Nesting::default(),
            discarding: false,
            max_frame_bytes: max_frame_bytes.max(2),
            skipped: 0,
        }
    }

    /// Append one transport message to the stream.
    pub fn push(&mut self, chunk: &str) {
        self.compact();
        self.buf.push_str(chunk);
    }

    /// Bytes waiting for the rest of an unterminated frame.
    pub fn pending_len(&self) -> usize {
        self.buf.len() - self.head
    }

    /// Total non-protocol bytes dropped between frames.
    pub fn skipped_bytes(&self) -> u64 {
        self.skipped
    }

    /// Drop any partial frame (used when the session is reset).
    pub fn reset(&mut self) {
        self.buf.clear();
        self.head = 0;
        self.pos = 0;
        self.start = None;
        self.nesting = Nesting::default();
        self.discarding = false;
    }

    /// Iterate over every frame completed by the text pushed so far.
    pub fn frames(&mut self) -> Frames<'_> {
        Frames { decoder: self }
    }

    /// Scan forward and return the next complete frame, if any.
    ///
    /// An `Err` reports a frame that outgrew the limit. The rest of that
    /// object is still scanned, so braces inside its strings cannot start a
    /// frame, but nothing of it is kept; scanning resumes after it closes.
    pub fn next_frame(&mut self) -> Option<Result<String>> {
        let bytes = self.buf.as_bytes();

        while self.pos < bytes.len() {
            let i = self.pos;
            let b = bytes[i];
            self.pos += 1;

            if self.discarding {
                if self.nesting.step(b) {
                    self.discarding = false;
                }
                self.head = self.pos;
                continue;
            }

            let Some(start) = self.start else {
                if b == b'{' {
                    self.start = Some(i);
                    self.nesting = Nesting::open();
                } else {
                    self.skipped += 1;
                    self.head = self.pos;
                }
                continue;
            };

            if self.nesting.step(b) {
                self.start = None;
                self.head = self.pos;
                return Some(Ok(self.buf[start..=i].to_string()));
            }

            let size = self.pos - start;
            if size > self.max_frame_bytes {
                self.start = None;
                self.discarding = true;
                self.head = self.pos;
                tracing::warn!(size, limit = self.max_frame_bytes, "oversized frame discarded");
                return Some(Err(NetlogError::FrameTooLarge {
                    size,
                    limit: self.max_frame_bytes,
                }));
            }
        }
        None
    }

    fn compact(&mut self) {
        if self.head == 0 {
            return;
        }
        self.buf.drain(..self.head);
        self.pos -= self.head;
        if let Some(start) = self.start.as_mut() {
            *start -= self.head;
        }
        self.head = 0;
    }
}

/// Lazy iterator returned by [`FrameDecoder::frames`].
pub struct Frames<'a> {
    decoder: &'a mut FrameDecoder,
}

impl Iterator for Frames<'_> {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        self.decoder.next_frame()
    }
}
