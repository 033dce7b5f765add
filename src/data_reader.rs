//! A sequential reader over a [`Buffer`] that notices structural mutation.
//!
//! Ported from `pb_trivial_data_reader_read` in the original C library: a
//! reader just remembers how much of the buffer it has already delivered.
//! If the buffer's `data_revision` moves out from under it — a `seek`,
//! `trim`, `rewind`, `insert` or write happened — the reader treats its own
//! position as stale and starts over from the beginning rather than
//! silently returning bytes that no longer mean what they used to.
//!
//! Unlike the original's iterator-style API, the reader here does not hold
//! a borrow of the buffer between calls: every method takes `&Buffer` as an
//! argument instead, so a caller can freely mutate the buffer between reads
//! from the same reader.

use crate::buffer::Buffer;

pub struct DataReader {
    revision: u64,
    offset: u64,
}

impl Default for DataReader {
    fn default() -> Self {
        DataReader::new()
    }
}

impl DataReader {
    pub fn new() -> Self {
        DataReader {
            revision: 0,
            offset: 0,
        }
    }

    /// Copy up to `out.len()` bytes from `buffer` into `out`, advancing the
    /// reader's position by the amount actually copied. Returns that
    /// amount. If `buffer`'s revision has moved since the last call, the
    /// reader discards its position and starts over from the beginning.
    pub fn read(&mut self, buffer: &Buffer, out: &mut [u8]) -> u64 {
        if buffer.data_revision() != self.revision {
            self.revision = buffer.data_revision();
            self.offset = 0;
        }
        let n = buffer.read_data(self.offset, out);
        self.offset += n;
        n
    }

    /// Rewind this reader's own position to the start, independent of the
    /// buffer's revision.
    pub fn reset(&mut self, buffer: &Buffer) {
        self.offset = 0;
        self.revision = buffer.data_revision();
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::Strategy;

    #[test]
    fn sequential_reads_advance_offset() {
        let mut buf = Buffer::with_strategy(Strategy {
            page_size: 4,
            ..Strategy::trivial()
        });
        buf.write_data(b"0123456789").unwrap();
        let mut reader = DataReader::new();

        let mut out = [0u8; 4];
        assert_eq!(reader.read(&buf, &mut out), 4);
        assert_eq!(&out, b"0123");
        assert_eq!(reader.read(&buf, &mut out), 4);
        assert_eq!(&out, b"4567");
        let mut tail = [0u8; 4];
        assert_eq!(reader.read(&buf, &mut tail), 2);
        assert_eq!(&tail[..2], b"89");
    }

    #[test]
    fn revision_change_resets_reader_to_start() {
        let mut buf = Buffer::with_strategy(Strategy {
            page_size: 4,
            ..Strategy::trivial()
        });
        buf.write_data(b"abcdefgh").unwrap();
        let mut reader = DataReader::new();
        let mut out = [0u8; 4];
        reader.read(&buf, &mut out);
        assert_eq!(reader.offset(), 4);

        buf.trim(2);
        let mut out = [0u8; 4];
        let n = reader.read(&buf, &mut out);
        assert_eq!(n, 4);
        assert_eq!(&out, b"abcd");
    }

    /// Scenario 5: an overwrite between two reads invalidates the reader's
    /// position even though `data_size` itself doesn't change. A pure
    /// append, in contrast, must not — see `buffer::tests::
    /// write_data_does_not_bump_revision_on_a_pure_append`.
    #[test]
    fn overwrite_between_reads_resets_the_reader() {
        let mut buf = Buffer::new();
        buf.write_data(b"one two three").unwrap();

        let mut reader = DataReader::new();
        let mut first = [0u8; 3];
        reader.read(&buf, &mut first);
        assert_eq!(&first, b"one");

        buf.overwrite_data(b"two one three");

        let mut from_start = [0u8; 3];
        reader.read(&buf, &mut from_start);
        assert_eq!(&from_start, b"two");
    }
}
