//! The page chain: the heart of the crate.
//!
//! Pages live in an arena (`Vec<Option<PageSlot>>` plus a free list) and are
//! addressed by [`PageId`], per the Rust realization notes in `SPEC_FULL.md`
//! — this avoids the raw-pointer or `Rc<RefCell<_>>` chain edges the C
//! original uses, while keeping the same doubly-linked traversal. The
//! sentinel node of the original is represented by the absence of a
//! `PageId` (`None`) rather than a dummy arena slot.

use tracing::trace;

use crate::allocator::{HeapAllocator, RegionAllocator};
use crate::data_block::DataBlock;
use crate::strategy::Strategy;

/// Address of a page within a [`Buffer`]'s arena. Opaque outside this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageId(usize);

struct PageSlot {
    block: DataBlock,
    /// Start of this page's window into `block`.
    start: usize,
    /// Length of this page's window into `block`. May be 0 for a
    /// reserved-but-unwritten tail fragment (see `extend`).
    len: usize,
    prev: Option<PageId>,
    next: Option<PageId>,
}

impl PageSlot {
    fn window(&self) -> &[u8] {
        &self.block.as_slice()[self.start..self.start + self.len]
    }

    fn capacity_after_window(&self) -> usize {
        self.block.len() - (self.start + self.len)
    }
}

/// A cursor into a buffer's page chain. `None` denotes the end (the
/// sentinel position past the last page).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageCursor(Option<PageId>);

impl PageCursor {
    pub fn is_end(&self) -> bool {
        self.0.is_none()
    }
}

/// A page-chained byte buffer.
pub struct Buffer {
    strategy: Strategy,
    slots: Vec<Option<PageSlot>>,
    free: Vec<usize>,
    /// First page currently visible to readers (may differ from `origin`
    /// after a `seek`).
    head: Option<PageId>,
    tail: Option<PageId>,
    /// The very first page this buffer ever held, kept alive (even past
    /// `seek`) so `rewind` can restore the buffer to its original extent.
    origin: Option<PageId>,
    data_size: u64,
    data_revision: u64,
    allocator: Box<dyn RegionAllocator>,
}

impl Default for Buffer {
    fn default() -> Self {
        Buffer::new()
    }
}

impl Buffer {
    pub fn new() -> Self {
        Buffer::with_strategy(Strategy::trivial())
    }

    pub fn with_strategy(strategy: Strategy) -> Self {
        Buffer::with_strategy_and_allocator(strategy, Box::new(HeapAllocator))
    }

    pub fn with_strategy_and_allocator(
        strategy: Strategy,
        allocator: Box<dyn RegionAllocator>,
    ) -> Self {
        Buffer {
            strategy,
            slots: Vec::new(),
            free: Vec::new(),
            head: None,
            tail: None,
            origin: None,
            data_size: 0,
            data_revision: 0,
            allocator,
        }
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    pub fn data_revision(&self) -> u64 {
        self.data_revision
    }

    pub fn data_size(&self) -> u64 {
        self.data_size
    }

    fn slot(&self, id: PageId) -> &PageSlot {
        self.slots[id.0].as_ref().expect("dangling PageId")
    }

    fn slot_mut(&mut self, id: PageId) -> &mut PageSlot {
        self.slots[id.0].as_mut().expect("dangling PageId")
    }

    fn push_slot(&mut self, slot: PageSlot) -> PageId {
        if let Some(idx) = self.free.pop() {
            self.slots[idx] = Some(slot);
            PageId(idx)
        } else {
            self.slots.push(Some(slot));
            PageId(self.slots.len() - 1)
        }
    }

    fn free_slot(&mut self, id: PageId) {
        self.slots[id.0] = None;
        self.free.push(id.0);
    }

    /// Link a freshly built, unlinked page onto the tail of the chain.
    fn link_tail(&mut self, id: PageId) {
        self.slot_mut(id).prev = self.tail;
        self.slot_mut(id).next = None;
        if let Some(tail) = self.tail {
            self.slot_mut(tail).next = Some(id);
        } else {
            self.head = Some(id);
        }
        self.tail = Some(id);
        if self.origin.is_none() {
            self.origin = Some(id);
        }
    }

    // ---- iteration ----------------------------------------------------

    pub fn iterator_begin(&self) -> PageCursor {
        PageCursor(self.head)
    }

    pub fn iterator_end(&self) -> PageCursor {
        PageCursor(None)
    }

    pub fn iterator_is_end(&self, cursor: PageCursor) -> bool {
        cursor.is_end()
    }

    pub fn iterator_cmp(&self, a: PageCursor, b: PageCursor) -> bool {
        a == b
    }

    pub fn iterator_next(&self, cursor: PageCursor) -> PageCursor {
        match cursor.0 {
            Some(id) => PageCursor(self.slot(id).next),
            None => PageCursor(None),
        }
    }

    pub fn iterator_prev(&self, cursor: PageCursor) -> PageCursor {
        match cursor.0 {
            Some(id) => PageCursor(self.slot(id).prev),
            None => PageCursor(self.tail),
        }
    }

    pub fn page_data(&self, cursor: PageCursor) -> Option<&[u8]> {
        cursor.0.map(|id| self.slot(id).window())
    }

    // ---- mutation -------------------------------------------------------

    /// Append an owned copy of `bytes` to the tail, chunked into pages of
    /// `strategy.page_size`. Reuses tail slack first when
    /// `fragment_as_target` is set.
    pub fn write_data(&mut self, bytes: &[u8]) -> Result<u64, crate::error::AllocError> {
        let was_empty = self.data_size == 0;
        let mut written = 0u64;
        let mut remaining = bytes;

        if self.strategy.fragment_as_target {
            if let Some(tail) = self.tail {
                let slack = self.slot(tail).capacity_after_window();
                if slack > 0 {
                    let take = slack.min(remaining.len());
                    let slot = self.slot_mut(tail);
                    let start = slot.start + slot.len;
                    let block_len = slot.block.len();
                    let mut block = std::mem::replace(
                        &mut slot.block,
                        DataBlock::create_owned(Box::new([])),
                    );
                    let wrote = block.as_mut_slice().is_some_and(|dst| {
                        dst[start..start + take].copy_from_slice(&remaining[..take]);
                        true
                    });
                    debug_assert_eq!(block.len(), block_len);
                    slot.block = block;
                    if wrote {
                        slot.len += take;
                        written += take as u64;
                        remaining = &remaining[take..];
                    }
                }
            }
        }

        while !remaining.is_empty() {
            let chunk_len = remaining.len().min(self.strategy.page_size.max(1));
            let region = self.allocator.alloc(chunk_len)?;
            let mut block = DataBlock::create_owned(region);
            if let Some(dst) = block.as_mut_slice() {
                dst.copy_from_slice(&remaining[..chunk_len]);
            }
            let id = self.push_slot(PageSlot {
                block,
                start: 0,
                len: chunk_len,
                prev: None,
                next: None,
            });
            self.link_tail(id);
            written += chunk_len as u64;
            remaining = &remaining[chunk_len..];
        }

        self.data_size += written;
        if was_empty && self.data_size > 0 {
            self.bump_revision();
        }
        trace!(written, "write_data");
        Ok(written)
    }

    /// Zero-copy append honoring the write-policy matrix:
    ///
    /// - `clone_on_write == false, fragment_as_target == false`: one
    ///   referenced page spanning all of `bytes`.
    /// - `clone_on_write == false, fragment_as_target == true`: referenced
    ///   pages chunked to `strategy.page_size`, rather than a single window.
    /// - `clone_on_write == true` (either `fragment_as_target`): behaves
    ///   exactly like `write_data` — an owned copy is made, so there's
    ///   nothing left to reference.
    ///
    /// The four combinations are deliberately distinct rather than
    /// collapsed into one path; callers pick a strategy precisely to get
    /// one of these behaviors.
    ///
    /// # Safety
    ///
    /// `bytes` must outlive this buffer (and every clone taken from it via
    /// `write_buffer`), unless `strategy.clone_on_write` is set.
    pub unsafe fn write_data_ref(&mut self, bytes: &[u8]) -> Result<u64, crate::error::AllocError> {
        if bytes.is_empty() {
            return Ok(0);
        }
        if self.strategy.clone_on_write {
            return self.write_data(bytes);
        }
        let mut written = 0u64;
        if self.strategy.fragment_as_target {
            for chunk in bytes.chunks(self.strategy.page_size.max(1)) {
                let block = DataBlock::create_referenced(chunk);
                written += self.push_referenced_page(block);
            }
        } else {
            let block = DataBlock::create_referenced(bytes);
            written += self.push_referenced_page(block);
        }
        trace!(written, "write_data_ref");
        Ok(written)
    }

    /// Append a pre-built block as a single new page spanning its full
    /// length. Used by the mmap-backed buffer variant to hand freshly
    /// mapped windows straight to the chain without going through
    /// `write_data`'s allocator path, and by `write_data_ref`'s reference
    /// paths.
    pub(crate) fn push_referenced_page(&mut self, block: DataBlock) -> u64 {
        let len = block.len();
        self.push_windowed_page(block, 0, len)
    }

    /// Append a page whose window into `block` is `[start, start + len)`
    /// rather than the block's full extent. Used where a source page needs
    /// to be re-fragmented into a narrower shared window (`write_buffer`
    /// with `fragment_as_target` and a non-cloning strategy).
    fn push_windowed_page(&mut self, block: DataBlock, start: usize, len: usize) -> u64 {
        if len == 0 {
            return 0;
        }
        let was_empty = self.data_size == 0;
        let id = self.push_slot(PageSlot {
            block,
            start,
            len,
            prev: None,
            next: None,
        });
        self.link_tail(id);
        self.data_size += len as u64;
        if was_empty {
            self.bump_revision();
        }
        len as u64
    }

    /// Append the content of `other` honoring the write-policy matrix:
    ///
    /// - `clone_on_write == false, fragment_as_target == false`: clone
    ///   `other`'s `DataBlock`s, one new page per source page, sharing
    ///   bytes without copying.
    /// - `clone_on_write == false, fragment_as_target == true`: same
    ///   sharing, but each source page's window is re-chunked so no new
    ///   page exceeds this buffer's own `strategy.page_size`.
    /// - `clone_on_write == true, fragment_as_target == false`: allocate an
    ///   owned copy of each source page, one-to-one, preserving `other`'s
    ///   page boundaries exactly.
    /// - `clone_on_write == true, fragment_as_target == true`: allocate
    ///   owned copies repacked to this buffer's `strategy.page_size`,
    ///   ignoring `other`'s original page boundaries (routed through
    ///   `write_data` per source page, which also reuses tail slack).
    pub fn write_buffer(&mut self, other: &Buffer) -> Result<u64, crate::error::AllocError> {
        let mut written = 0u64;
        let mut cursor = other.iterator_begin();
        let page_size = self.strategy.page_size.max(1);
        match (self.strategy.clone_on_write, self.strategy.fragment_as_target) {
            (false, false) => {
                while !cursor.is_end() {
                    let id = cursor.0.unwrap();
                    let src = other.slot(id);
                    written += self.push_windowed_page(src.block.get(), src.start, src.len);
                    cursor = other.iterator_next(cursor);
                }
            }
            (false, true) => {
                while !cursor.is_end() {
                    let id = cursor.0.unwrap();
                    let (start, len) = {
                        let src = other.slot(id);
                        (src.start, src.len)
                    };
                    let mut offset = 0usize;
                    while offset < len {
                        let take = page_size.min(len - offset);
                        let block = other.slot(id).block.get();
                        written += self.push_windowed_page(block, start + offset, take);
                        offset += take;
                    }
                    cursor = other.iterator_next(cursor);
                }
            }
            (true, false) => {
                while !cursor.is_end() {
                    let id = cursor.0.unwrap();
                    let window = other.slot(id).window().to_vec();
                    let region = self.allocator.alloc(window.len())?;
                    let mut block = DataBlock::create_owned(region);
                    if let Some(dst) = block.as_mut_slice() {
                        dst.copy_from_slice(&window);
                    }
                    let len = block.len();
                    written += self.push_windowed_page(block, 0, len);
                    cursor = other.iterator_next(cursor);
                }
            }
            (true, true) => {
                while !cursor.is_end() {
                    let id = cursor.0.unwrap();
                    let window = other.slot(id).window().to_vec();
                    written += self.write_data(&window)?;
                    cursor = other.iterator_next(cursor);
                }
            }
        }
        trace!(written, "write_buffer");
        Ok(written)
    }

    /// Insert an owned copy of `bytes` at `in_page_offset` bytes into the
    /// page `at` points to (`iterator_end()` ignores the offset and always
    /// inserts at the tail). Returns `false` without mutating anything if
    /// `strategy.rejects_insert` is set.
    ///
    /// An `in_page_offset` of `0` inserts before `at`'s page outright. An
    /// offset at or past that page's length is equivalent to inserting
    /// before the *next* page instead — no split happens, since nothing
    /// would actually be divided. Any offset strictly inside the page
    /// splits it in two (the original page keeps its first `in_page_offset`
    /// bytes; a new page, sharing the same block, takes the rest) and the
    /// new bytes are spliced between the halves.
    pub fn insert(
        &mut self,
        at: PageCursor,
        in_page_offset: usize,
        bytes: &[u8],
    ) -> Result<bool, crate::error::AllocError> {
        if self.strategy.rejects_insert {
            return Ok(false);
        }
        if bytes.is_empty() {
            return Ok(true);
        }

        let before = match at.0 {
            None => None,
            Some(id) => {
                let len = self.slot(id).len;
                if in_page_offset == 0 {
                    Some(id)
                } else if in_page_offset >= len {
                    self.slot(id).next
                } else {
                    let (block, start, full_len, next) = {
                        let slot = self.slot(id);
                        (slot.block.get(), slot.start, slot.len, slot.next)
                    };
                    let remainder_id = self.push_slot(PageSlot {
                        block,
                        start: start + in_page_offset,
                        len: full_len - in_page_offset,
                        prev: Some(id),
                        next,
                    });
                    self.slot_mut(id).len = in_page_offset;
                    self.slot_mut(id).next = Some(remainder_id);
                    match next {
                        Some(n) => self.slot_mut(n).prev = Some(remainder_id),
                        None => self.tail = Some(remainder_id),
                    }
                    Some(remainder_id)
                }
            }
        };

        let Some(before) = before else {
            self.write_data(bytes)?;
            return Ok(true);
        };

        let region = self.allocator.alloc(bytes.len())?;
        let mut block = DataBlock::create_owned(region);
        if let Some(dst) = block.as_mut_slice() {
            dst.copy_from_slice(bytes);
        }
        let len = block.len();
        let new_id = self.push_slot(PageSlot {
            block,
            start: 0,
            len,
            prev: None,
            next: None,
        });

        let prev = self.slot(before).prev;
        self.slot_mut(new_id).prev = prev;
        self.slot_mut(new_id).next = Some(before);
        self.slot_mut(before).prev = Some(new_id);
        match prev {
            Some(p) => self.slot_mut(p).next = Some(new_id),
            None => {
                // `before` was the true front of the slot chain (the
                // origin), so the newly spliced-in page takes its place.
                self.head = Some(new_id);
                self.origin = Some(new_id);
            }
        }

        self.data_size += len as u64;
        self.bump_revision();
        trace!(len, "insert");
        Ok(true)
    }

    /// Reserve `n` bytes of writable capacity at the tail without making
    /// it visible data yet; a subsequent `write_data` with
    /// `fragment_as_target` set will fill this slack in place first.
    pub fn extend(&mut self, n: usize) -> Result<u64, crate::error::AllocError> {
        if n == 0 {
            return Ok(0);
        }
        let region = self.allocator.alloc(n)?;
        let block = DataBlock::create_owned(region);
        let id = self.push_slot(PageSlot {
            block,
            start: 0,
            len: 0,
            prev: None,
            next: None,
        });
        self.link_tail(id);
        trace!(n, "extend");
        Ok(n as u64)
    }

    /// Consume up to `n` bytes from the front of the visible data. Pages
    /// fully consumed are kept alive (not freed) so `rewind` can restore
    /// them; `head` moves forward past them.
    pub fn seek(&mut self, n: u64) -> u64 {
        let mut remaining = n.min(self.data_size);
        let mut consumed = 0u64;
        while remaining > 0 {
            let Some(id) = self.head else { break };
            let slot = self.slot_mut(id);
            let avail = slot.len as u64;
            if avail == 0 {
                self.head = slot.next;
                continue;
            }
            let take = avail.min(remaining);
            slot.start += take as usize;
            slot.len -= take as usize;
            remaining -= take;
            consumed += take;
            if slot.len == 0 {
                self.head = slot.next;
            }
        }
        if consumed > 0 {
            self.data_size -= consumed;
            self.bump_revision();
            trace!(consumed, "seek");
        }
        consumed
    }

    /// Restore the buffer to the full extent it has ever held, undoing
    /// every prior `seek`.
    ///
    /// `seek` only ever moves bytes from a page's `len` into its `start`
    /// (the window shrinks from the front but `start + len` — the content
    /// actually written to that page — never changes), so restoring is
    /// just folding `start` back into `len`. A prior `trim`, in contrast,
    /// really did shrink `start + len`, and rewind leaves that alone:
    /// trimmed bytes don't come back.
    pub fn rewind(&mut self) {
        let mut size = 0u64;
        let mut cursor = self.origin;
        while let Some(id) = cursor {
            let written;
            {
                let slot = self.slot_mut(id);
                written = slot.start + slot.len;
                slot.start = 0;
                slot.len = written;
            }
            size += written as u64;
            cursor = self.slot(id).next;
        }
        self.head = self.origin;
        self.data_size = size;
        self.bump_revision();
        trace!("rewind");
    }

    /// Remove up to `n` bytes from the tail, freeing pages that become
    /// fully empty. Returns the number of bytes actually removed.
    pub fn trim(&mut self, n: u64) -> u64 {
        let mut remaining = n.min(self.data_size);
        let mut trimmed = 0u64;
        while remaining > 0 {
            let Some(id) = self.tail else { break };
            let (len, prev) = {
                let slot = self.slot(id);
                (slot.len as u64, slot.prev)
            };
            if len <= remaining {
                remaining -= len;
                trimmed += len;
                self.tail = prev;
                match prev {
                    Some(p) => self.slot_mut(p).next = None,
                    None => self.head = None,
                }
                if self.origin == Some(id) {
                    self.origin = None;
                }
                self.free_slot(id);
            } else {
                self.slot_mut(id).len -= remaining as usize;
                trimmed += remaining;
                remaining = 0;
            }
        }
        if trimmed > 0 {
            self.data_size -= trimmed;
            self.bump_revision();
            trace!(trimmed, "trim");
        }
        trimmed
    }

    /// Overwrite bytes in place starting at the head of the visible data,
    /// without changing any page's length. Stops at the first page backed
    /// by a referenced (non-owned) block, since those are never mutable
    /// through this crate (see `data_block::DataBlock::as_mut_slice`).
    pub fn overwrite_data(&mut self, bytes: &[u8]) -> u64 {
        let mut written = 0u64;
        let mut remaining = bytes;
        let mut cursor = self.head;
        while !remaining.is_empty() {
            let Some(id) = cursor else { break };
            let (start, len) = {
                let slot = self.slot(id);
                (slot.start, slot.len)
            };
            let take = len.min(remaining.len());
            let wrote = {
                let slot = self.slot_mut(id);
                match slot.block.as_mut_slice() {
                    Some(dst) => {
                        dst[start..start + take].copy_from_slice(&remaining[..take]);
                        true
                    }
                    None => false,
                }
            };
            if !wrote {
                break;
            }
            written += take as u64;
            remaining = &remaining[take..];
            cursor = self.slot(id).next;
        }
        if written > 0 {
            self.bump_revision();
            trace!(written, "overwrite_data");
        }
        written
    }

    /// Copy up to `out.len()` bytes starting at `offset` into `out`,
    /// without moving any cursor. Returns the number of bytes copied.
    pub fn read_data(&self, offset: u64, out: &mut [u8]) -> u64 {
        if offset >= self.data_size {
            return 0;
        }
        let mut to_skip = offset;
        let mut copied = 0usize;
        let mut cursor = self.head;
        while copied < out.len() {
            let Some(id) = cursor else { break };
            let window = self.slot(id).window();
            if (to_skip as usize) >= window.len() {
                to_skip -= window.len() as u64;
                cursor = self.slot(id).next;
                continue;
            }
            let start = to_skip as usize;
            let take = (window.len() - start).min(out.len() - copied);
            out[copied..copied + take].copy_from_slice(&window[start..start + take]);
            copied += take;
            to_skip = 0;
            cursor = self.slot(id).next;
        }
        copied as u64
    }

    /// Drop every page, freeing owned regions and releasing references to
    /// shared ones.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
        self.head = None;
        self.tail = None;
        self.origin = None;
        self.data_size = 0;
        self.bump_revision();
        trace!("clear");
    }

    fn bump_revision(&mut self) {
        self.data_revision += 1;
    }
}

impl From<PageId> for PageCursor {
    fn from(id: PageId) -> Self {
        PageCursor(Some(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_back() {
        let mut buf = Buffer::with_strategy(Strategy {
            page_size: 4,
            ..Strategy::trivial()
        });
        buf.write_data(b"hello world").unwrap();
        assert_eq!(buf.data_size(), 11);

        let mut out = vec![0u8; 11];
        let n = buf.read_data(0, &mut out);
        assert_eq!(n, 11);
        assert_eq!(&out, b"hello world");
    }

    #[test]
    fn seek_then_rewind_restores_full_extent() {
        let mut buf = Buffer::with_strategy(Strategy {
            page_size: 4,
            ..Strategy::trivial()
        });
        buf.write_data(b"0123456789").unwrap();
        let consumed = buf.seek(5);
        assert_eq!(consumed, 5);
        assert_eq!(buf.data_size(), 5);

        let mut out = vec![0u8; 5];
        buf.read_data(0, &mut out);
        assert_eq!(&out, b"56789");

        buf.rewind();
        assert_eq!(buf.data_size(), 10);
        let mut out = vec![0u8; 10];
        buf.read_data(0, &mut out);
        assert_eq!(&out, b"0123456789");
    }

    #[test]
    fn trim_removes_from_tail() {
        let mut buf = Buffer::with_strategy(Strategy {
            page_size: 4,
            ..Strategy::trivial()
        });
        buf.write_data(b"0123456789").unwrap();
        let trimmed = buf.trim(3);
        assert_eq!(trimmed, 3);
        assert_eq!(buf.data_size(), 7);
        let mut out = vec![0u8; 7];
        buf.read_data(0, &mut out);
        assert_eq!(&out, b"0123456");
    }

    #[test]
    fn insert_rejected_by_strategy() {
        let mut buf = Buffer::with_strategy(Strategy::mmap_fixed(4096));
        let ok = buf.insert(buf.iterator_end(), 0, b"nope").unwrap();
        assert!(!ok);
        assert_eq!(buf.data_size(), 0);
    }

    #[test]
    fn insert_at_offset_splits_the_target_page() {
        let mut buf = Buffer::with_strategy(Strategy {
            page_size: 64,
            ..Strategy::trivial()
        });
        buf.write_data(b"helloworld").unwrap();
        let at = buf.iterator_begin();
        buf.insert(at, 5, b"-").unwrap();
        let mut out = vec![0u8; 11];
        buf.read_data(0, &mut out);
        assert_eq!(&out, b"hello-world");
    }

    #[test]
    fn insert_at_page_boundary_offset_does_not_split() {
        let mut buf = Buffer::with_strategy(Strategy {
            page_size: 64,
            ..Strategy::trivial()
        });
        buf.write_data(b"hello").unwrap();
        let at = buf.iterator_begin();
        let page_len = buf.page_data(at).unwrap().len();
        buf.insert(at, page_len, b"world").unwrap();
        let mut out = vec![0u8; 10];
        buf.read_data(0, &mut out);
        assert_eq!(&out, b"helloworld");
    }

    #[test]
    fn write_data_ref_shares_memory() {
        let mut buf = Buffer::new();
        let source = b"zero-copy".to_vec();
        let n = unsafe { buf.write_data_ref(&source) }.unwrap();
        assert_eq!(n as usize, source.len());
        let mut out = vec![0u8; source.len()];
        buf.read_data(0, &mut out);
        assert_eq!(out, source);
    }

    #[test]
    fn write_data_ref_fragments_to_page_size_when_targeted() {
        let mut buf = Buffer::with_strategy(Strategy {
            page_size: 4,
            fragment_as_target: true,
            ..Strategy::trivial()
        });
        let source = b"0123456789".to_vec();
        let n = unsafe { buf.write_data_ref(&source) }.unwrap();
        assert_eq!(n as usize, source.len());

        let mut cursor = buf.iterator_begin();
        let mut pages = 0;
        while !cursor.is_end() {
            assert!(buf.page_data(cursor).unwrap().len() <= 4);
            pages += 1;
            cursor = buf.iterator_next(cursor);
        }
        assert!(pages > 1);
    }

    #[test]
    fn write_data_ref_copies_when_clone_on_write() {
        let mut buf = Buffer::with_strategy(Strategy {
            clone_on_write: true,
            ..Strategy::trivial()
        });
        let mut source = b"copy me".to_vec();
        let n = unsafe { buf.write_data_ref(&source) }.unwrap();
        assert_eq!(n as usize, source.len());
        source[0] = b'!';
        let mut out = vec![0u8; 7];
        buf.read_data(0, &mut out);
        assert_eq!(&out, b"copy me");
    }

    #[test]
    fn overwrite_data_stops_at_referenced_page() {
        let mut buf = Buffer::new();
        buf.write_data(b"aaaa").unwrap();
        let source = b"bbbb".to_vec();
        unsafe { buf.write_data_ref(&source) }.unwrap();
        let written = buf.overwrite_data(b"XXXXXXXX");
        assert_eq!(written, 4);
        let mut out = vec![0u8; 8];
        buf.read_data(0, &mut out);
        assert_eq!(&out, b"XXXXbbbb");
    }

    #[test]
    fn data_revision_bumps_on_mutation() {
        let mut buf = Buffer::new();
        let r0 = buf.data_revision();
        buf.write_data(b"x").unwrap();
        assert!(buf.data_revision() > r0);
    }

    #[test]
    fn write_data_does_not_bump_revision_on_a_pure_append() {
        let mut buf = Buffer::new();
        buf.write_data(b"first").unwrap();
        let r1 = buf.data_revision();
        buf.write_data(b"second").unwrap();
        assert_eq!(buf.data_revision(), r1);
    }

    #[test]
    fn overwrite_data_bumps_revision() {
        let mut buf = Buffer::new();
        buf.write_data(b"aaaa").unwrap();
        let r1 = buf.data_revision();
        buf.overwrite_data(b"XXXX");
        assert!(buf.data_revision() > r1);
    }
}
