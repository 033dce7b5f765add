//! Line-oriented scanning over a [`Buffer`], ported from
//! `pb_trivial_line_reader_*` in the original C library.
//!
//! A line reader never mutates the buffer it scans. Like
//! [`DataReader`](crate::data_reader::DataReader), it takes `&Buffer` as a
//! per-call argument rather than holding a borrow of it, so a caller can
//! mutate the buffer between calls on the same reader.

use crate::buffer::Buffer;

/// Default cap on how far a single line scan looks before giving up
/// (`PB_LINE_READER_DEFAULT_LINE_MAX` in the original).
pub const LINE_MAX: u64 = 16 * 1024 * 1024;

#[derive(Clone, Copy)]
struct FoundLine {
    /// Offset, relative to the reader's current position, of the first
    /// byte after the terminator (or, for an externally terminated line,
    /// after its last content byte — there is no terminator to skip).
    total_len: u64,
    /// Length of the line's content, terminator excluded.
    content_len: u64,
    crlf: bool,
}

#[derive(Clone, Copy, Default)]
pub struct LineReader {
    offset: u64,
    max_line: u64,
    found: Option<FoundLine>,
    /// Set once `terminate_line`/`terminate_line_check_cr` has manufactured
    /// a line out of buffer content with no trailing `\n`.
    is_terminated: bool,
    is_terminated_with_cr: bool,
}

impl LineReader {
    pub fn new() -> Self {
        LineReader::with_max_line(LINE_MAX)
    }

    pub fn with_max_line(max_line: u64) -> Self {
        LineReader {
            offset: 0,
            max_line,
            found: None,
            is_terminated: false,
            is_terminated_with_cr: false,
        }
    }

    /// Scan `buffer` forward from the current position for a line
    /// terminator (`\n` or `\r\n`). Returns whether a complete line is now
    /// available via `get_line_len`/`get_line_data`.
    ///
    /// If `max_line` bytes are scanned without finding a terminator, the
    /// scanned window itself becomes the line — `total_len` and
    /// `content_len` both equal `max_line`, `is_crlf` is `false` — rather
    /// than giving up. This keeps a pathologically long, unterminated
    /// stream from starving every other line behind it.
    pub fn has_line(&mut self, buffer: &Buffer) -> bool {
        if self.found.is_some() {
            return true;
        }
        let remaining = buffer.data_size().saturating_sub(self.offset);
        let scan_len = remaining.min(self.max_line) as usize;
        let mut window = vec![0u8; scan_len];
        buffer.read_data(self.offset, &mut window);

        let mut prev_cr = false;
        for (i, &byte) in window.iter().enumerate() {
            if byte == b'\n' {
                let crlf = prev_cr;
                let total_len = i as u64 + 1;
                let content_len = if crlf { total_len - 2 } else { total_len - 1 };
                self.found = Some(FoundLine {
                    total_len,
                    content_len,
                    crlf,
                });
                return true;
            }
            prev_cr = byte == b'\r';
        }

        if scan_len as u64 >= self.max_line {
            self.found = Some(FoundLine {
                total_len: self.max_line,
                content_len: self.max_line,
                crlf: false,
            });
            return true;
        }

        false
    }

    /// Length of the found line's content, terminator excluded. Only
    /// meaningful after `has_line` (or `terminate_line`/
    /// `terminate_line_check_cr`) returns `true`.
    pub fn get_line_len(&self) -> Option<u64> {
        self.found.map(|f| f.content_len)
    }

    pub fn is_crlf(&self) -> Option<bool> {
        self.found.map(|f| f.crlf)
    }

    /// Copy the found line's content (terminator excluded) into `out`.
    pub fn get_line_data(&self, buffer: &Buffer, out: &mut [u8]) -> u64 {
        let Some(found) = self.found else { return 0 };
        let take = (found.content_len as usize).min(out.len());
        buffer.read_data(self.offset, &mut out[..take]);
        take as u64
    }

    /// True once scanning has reached the end of `buffer`'s current data
    /// with no line found.
    pub fn is_end(&self, buffer: &Buffer) -> bool {
        self.found.is_none() && self.offset >= buffer.data_size()
    }

    /// Whether the currently found line (if any) was manufactured by
    /// `terminate_line`/`terminate_line_check_cr` rather than found via a
    /// real `\n`.
    pub fn is_terminated(&self) -> bool {
        self.is_terminated
    }

    /// Whether the externally terminated line had its trailing `\r`
    /// absorbed as part of the (synthetic) terminator.
    pub fn is_terminated_with_cr(&self) -> bool {
        self.is_terminated_with_cr
    }

    /// Advance past the found line (content and terminator), clearing it
    /// so the next `has_line` scans fresh data. Returns the number of
    /// bytes advanced, 0 if no line was found.
    pub fn seek_line(&mut self) -> u64 {
        let Some(found) = self.found.take() else {
            return 0;
        };
        self.offset += found.total_len;
        self.is_terminated = false;
        self.is_terminated_with_cr = false;
        found.total_len
    }

    /// Reset the scan position to the start of the buffer.
    pub fn reset(&mut self) {
        self.offset = 0;
        self.found = None;
        self.is_terminated = false;
        self.is_terminated_with_cr = false;
    }

    /// Treat every byte of `buffer` remaining at the current position as a
    /// complete line with no `\n` terminator — for when the caller knows no
    /// more data is coming (end of stream) and wants to flush a final,
    /// otherwise-unterminated line. A no-op, returning `false`, unless
    /// `has_line` would currently return `false` and `is_end` would return
    /// `true` (there is unterminated content left to flush, and nothing is
    /// already pending).
    pub fn terminate_line(&mut self, buffer: &Buffer) -> bool {
        self.terminate(buffer, false)
    }

    /// Like `terminate_line`, but a trailing `\r` in the remaining content
    /// is treated as already having its terminator (excluded from
    /// `get_line_len`/`get_line_data`) rather than becoming content.
    pub fn terminate_line_check_cr(&mut self, buffer: &Buffer) -> bool {
        self.terminate(buffer, true)
    }

    fn terminate(&mut self, buffer: &Buffer, check_cr: bool) -> bool {
        if self.found.is_some() {
            return false;
        }
        let remaining = buffer.data_size().saturating_sub(self.offset);
        if remaining == 0 {
            return false;
        }
        let mut crlf = false;
        if check_cr {
            let mut last = [0u8; 1];
            if buffer.read_data(self.offset + remaining - 1, &mut last) == 1 && last[0] == b'\r' {
                crlf = true;
            }
        }
        let content_len = if crlf { remaining - 1 } else { remaining };
        self.found = Some(FoundLine {
            total_len: remaining,
            content_len,
            crlf,
        });
        self.is_terminated = true;
        self.is_terminated_with_cr = crlf;
        true
    }
}
