//! Reference-counted, optionally-owning wrappers around a byte region.
//!
//! `DataBlock`'s atomic use-count is realized directly as `Arc`'s strong
//! count: `get` is `Clone::clone`, `put` is `Drop`, and the block is
//! destroyed — the region freed iff owned — the moment the last clone is
//! dropped. There is no hand-rolled atomic counter here because `Arc`
//! already *is* the atomic counter the design calls for.

use std::sync::Arc;

enum Region {
    Owned(Box<[u8]>),
    /// A window into memory this block does not own. Obtained only through
    /// [`DataBlock::create_referenced`] or
    /// [`DataBlock::create_referenced_with_keep_alive`], whose safety
    /// contracts are the only thing standing between this and a dangling
    /// pointer. The optional keep-alive handle ties the referenced memory's
    /// actual lifetime to this block's use count — when it's present, the
    /// memory stays mapped for as long as any clone of this block exists,
    /// rather than relying solely on the constructor caller's promise.
    Referenced {
        slice: &'static [u8],
        _keep_alive: Option<Arc<dyn std::any::Any + Send + Sync>>,
    },
}

/// A reference-counted descriptor for one contiguous byte region.
///
/// Cloning a `DataBlock` is the `get` operation (increments the use count);
/// dropping the last clone is the `put` that destroys it, freeing the
/// region if and only if the block owns it.
#[derive(Clone)]
pub struct DataBlock(Arc<Region>);

impl DataBlock {
    /// Wrap an already-allocated region that this block will free at
    /// destruction.
    pub fn create_owned(region: Box<[u8]>) -> Self {
        DataBlock(Arc::new(Region::Owned(region)))
    }

    /// Wrap an externally-owned region. The region is never freed by this
    /// block; only the descriptor is.
    ///
    /// # Safety
    ///
    /// `buf` must remain valid for as long as this `DataBlock` (and any
    /// clone of it, and any page built on it) is alive. The caller is
    /// asserting a lifetime the type system cannot check here.
    pub unsafe fn create_referenced(buf: &[u8]) -> Self {
        let unbounded: &'static [u8] = std::slice::from_raw_parts(buf.as_ptr(), buf.len());
        DataBlock(Arc::new(Region::Referenced {
            slice: unbounded,
            _keep_alive: None,
        }))
    }

    /// Like [`DataBlock::create_referenced`], but `keep_alive` is kept
    /// alive for as long as any clone of the returned block exists —
    /// typically an `Arc` over the memory map a window was carved out of.
    /// This is how the mmap-backed buffer variant avoids relying solely on
    /// caller discipline: the window can't be unmapped while a page still
    /// references it.
    ///
    /// # Safety
    ///
    /// `buf` must be valid for as long as `keep_alive` is alive.
    pub unsafe fn create_referenced_with_keep_alive(
        buf: &[u8],
        keep_alive: Arc<dyn std::any::Any + Send + Sync>,
    ) -> Self {
        let unbounded: &'static [u8] = std::slice::from_raw_parts(buf.as_ptr(), buf.len());
        DataBlock(Arc::new(Region::Referenced {
            slice: unbounded,
            _keep_alive: Some(keep_alive),
        }))
    }

    /// The bounds of the region. Immutable after construction.
    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_slice(&self) -> &[u8] {
        match &*self.0 {
            Region::Owned(b) => b,
            Region::Referenced { slice, .. } => slice,
        }
    }

    /// Mutable access to an owned region, available only while this is the
    /// sole handle to it (use count of 1). Referenced regions are never
    /// mutable through this handle — the block doesn't own them, and the
    /// original library's own referenced-data constructor comments that
    /// referenced bytes are never meant to change through it either.
    pub(crate) fn as_mut_slice(&mut self) -> Option<&mut [u8]> {
        match Arc::get_mut(&mut self.0)? {
            Region::Owned(b) => Some(b),
            Region::Referenced { .. } => None,
        }
    }

    pub(crate) fn is_owned(&self) -> bool {
        matches!(&*self.0, Region::Owned(_))
    }

    /// Explicit `get`: a new handle on the same region, incrementing the
    /// use count. Equivalent to `Clone::clone`, named to match the
    /// create/get/put vocabulary callers coming from the C original expect.
    pub fn get(&self) -> Self {
        self.clone()
    }

    /// The current use count: this handle plus every other live clone.
    pub fn use_count(&self) -> usize {
        Arc::strong_count(&self.0)
    }
}
