//! UTF-8 carry for byte chunks.
//!
//! TCP reads can end in the middle of a multi-byte character. The relay
//! forwards every read as one text message, so the incomplete tail is held
//! back and prefixed to the next read. Genuinely invalid sequences are
//! replaced with U+FFFD.

/// Per-connection UTF-8 reassembly state.
#[derive(Debug, Default)]
pub struct Utf8Carry {
    pending: Vec<u8>,
}

impl Utf8Carry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of bytes currently held back.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Accept one chunk and return the text that is complete so far.
    ///
    /// Returns `None` when the whole chunk was held back (a lone partial
    /// character), so callers never forward empty messages.
    pub fn push(&mut self, chunk: &[u8]) -> Option<String> {
        self.pending.extend_from_slice(chunk);

        let keep = incomplete_tail_len(&self.pending);
        let ready_len = self.pending.len() - keep;
        if ready_len == 0 {
            return None;
        }

        let tail = self.pending.split_off(ready_len);
        let ready = std::mem::replace(&mut self.pending, tail);
        Some(String::from_utf8_lossy(&ready).into_owned())
    }

    /// Flush whatever is held back (connection closed).
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.pending);
        Some(String::from_utf8_lossy(&rest).into_owned())
    }
}

/// Length of a trailing, possibly-valid but incomplete UTF-8 sequence.
fn incomplete_tail_len(buf: &[u8]) -> usize {
    // A sequence is at most 4 bytes, so only the last 3 can be an unfinished one.
    let start = buf.len().saturating_sub(3);
    for i in (start..buf.len()).rev() {
        let b = buf[i];
        if b & 0b1100_0000 == 0b1000_0000 {
            continue;
        }
        let need = match b {
            0xC2..=0xDF => 2,
            0xE0..=0xEF => 3,
            0xF0..=0xF4 => 4,
            _ => return 0,
        };
        let have = buf.len() - i;
        return if have < need { have } else { 0 };
    }
    0
}
