//! Buffer write policy.
//!
//! Four independent knobs that together decide how `insert`/`write_*`
//! mutate a page chain. See [`Buffer::with_strategy`](crate::buffer::Buffer::with_strategy).

/// Governs how a [`Buffer`](crate::buffer::Buffer) grows and accepts writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Strategy {
    /// Size of a freshly allocated page when a write needs new owned
    /// storage and isn't targeting an existing fragment.
    pub page_size: usize,
    /// For writes that could otherwise reference external memory
    /// (`write_data_ref`) or another buffer's pages (`write_buffer`):
    /// when set, allocate owned storage and copy the bytes in instead of
    /// sharing the source `DataBlock`. Unset keeps the zero-copy reference.
    pub clone_on_write: bool,
    /// For the same reference/cross-buffer writes: when set, new pages are
    /// bounded by *this* buffer's own `page_size` rather than inheriting
    /// the source's existing fragmentation (a wide `write_data_ref` call or
    /// a source page larger than `page_size` gets split to match; sharing
    /// also reuses tail slack, as `write_data` does). Unset keeps the
    /// source's own page boundaries — one destination page per source
    /// fragment, however wide.
    pub fragment_as_target: bool,
    /// Reject `insert` outright (the buffer only ever grows at the tail via
    /// `write_data`/`write_buffer`).
    pub rejects_insert: bool,
}

impl Strategy {
    pub const DEFAULT_PAGE_SIZE: usize = 4096;

    /// The trivial strategy: fixed page size, no fragment reuse, no
    /// clone-on-write, inserts allowed. Matches `pb_trivial` defaults from
    /// the original library.
    pub const fn trivial() -> Self {
        Strategy {
            page_size: Self::DEFAULT_PAGE_SIZE,
            clone_on_write: false,
            fragment_as_target: false,
            rejects_insert: false,
        }
    }

    /// The strategy used by the mmap-backed buffer variant: fixed page
    /// size, clone-on-write, fragment reuse, and no mid-chain inserts since
    /// the backing file is strictly offset-ordered and append-only.
    pub const fn mmap_fixed(page_size: usize) -> Self {
        Strategy {
            page_size,
            clone_on_write: true,
            fragment_as_target: true,
            rejects_insert: true,
        }
    }
}

impl Default for Strategy {
    fn default() -> Self {
        Strategy::trivial()
    }
}
