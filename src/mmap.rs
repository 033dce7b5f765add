//! The mmap-backed buffer variant.
//!
//! Grounded in `storage::StorageInner` (the teacher's own mmap window
//! manager): a backing file, locked exclusively for the lifetime of the
//! handle, whose bytes are mapped in windows and handed to the page chain
//! as referenced (non-owned) blocks — writing means mapping a fresh window
//! and copying into it once, not mutating an existing page afterwards.
//!
//! The window table is a `BTreeMap<u64, Arc<Window>>` keyed by file offset
//! rather than the hash table `spec.md` suggests, because this module also
//! needs range lookups (which window covers offset X), something a hash
//! table can't give for free. See `DESIGN.md`.

use std::collections::BTreeMap;
use std::fs::{File, OpenOptions as FsOpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use fs4::fs_std::FileExt;
use memmap2::{MmapOptions, MmapRaw};
use tracing::{debug, trace};

use crate::buffer::Buffer;
use crate::data_block::DataBlock;
use crate::error::AllocError;
use crate::strategy::Strategy;

/// How the backing file is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenAction {
    /// Open an existing file read-only; the whole file becomes the
    /// buffer's initial content.
    Read,
    /// Open (creating if needed) for appending; existing content is kept
    /// and becomes the buffer's initial content.
    Append,
    /// Open (creating if needed), discarding any existing content.
    Overwrite,
}

/// What happens to the backing file when the buffer is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseAction {
    /// Leave the file on disk.
    Retain,
    /// Delete the file.
    Remove,
}

struct Window {
    map: MmapRaw,
}

// SAFETY: `MmapRaw` is a raw pointer to OS-managed memory with no built-in
// synchronization. Every `MmapBuffer` method takes `&mut self`, so only one
// thread can be driving the buffer (and therefore touching a window) at a
// time; what outlives that is read-only access to already-written bytes,
// which is safe to share.
unsafe impl Send for Window {}
unsafe impl Sync for Window {}

/// A page-chained buffer whose data lives in windows mapped from a file.
pub struct MmapBuffer {
    buffer: Buffer,
    file: Option<File>,
    path: Option<PathBuf>,
    close_action: CloseAction,
    windows: BTreeMap<u64, Arc<Window>>,
}

impl MmapBuffer {
    pub fn open(
        path: impl AsRef<Path>,
        open_action: OpenAction,
        close_action: CloseAction,
    ) -> Result<Self, AllocError> {
        let path = path.as_ref().to_path_buf();
        let mut opts = FsOpenOptions::new();
        match open_action {
            OpenAction::Read => {
                opts.read(true);
            }
            OpenAction::Append => {
                opts.read(true).write(true).create(true);
            }
            OpenAction::Overwrite => {
                opts.read(true).write(true).create(true).truncate(true);
            }
        }
        let file = opts.open(&path).map_err(AllocError::Open)?;

        match open_action {
            OpenAction::Read => FileExt::try_lock_shared(&file).map_err(AllocError::Lock)?,
            OpenAction::Append | OpenAction::Overwrite => {
                FileExt::try_lock_exclusive(&file).map_err(AllocError::Lock)?
            }
        }

        let host_page_size = page_size::get();
        if host_page_size != Strategy::DEFAULT_PAGE_SIZE {
            debug!(
                host_page_size,
                default_window = Strategy::DEFAULT_PAGE_SIZE,
                "host page size differs from the default mmap window size"
            );
        }

        let len = file.metadata().map_err(AllocError::Open)?.len();

        let mut mmap_buffer = MmapBuffer {
            buffer: Buffer::with_strategy(Strategy::mmap_fixed(Strategy::DEFAULT_PAGE_SIZE)),
            file: Some(file),
            path: Some(path),
            close_action,
            windows: BTreeMap::new(),
        };

        if len > 0 {
            mmap_buffer.map_window(0, len as usize)?;
        }

        Ok(mmap_buffer)
    }

    fn map_window(&mut self, offset: u64, len: usize) -> Result<(), AllocError> {
        let file = self
            .file
            .as_ref()
            .ok_or(AllocError::InvalidArgument("mmap buffer has no backing file"))?;
        let map = MmapOptions::new()
            .offset(offset)
            .len(len)
            .map_raw(file)
            .map_err(|e| AllocError::MapFailed {
                offset,
                requested: len,
                source: e,
            })?;
        let window = Arc::new(Window { map });
        // SAFETY: the window's `Arc` is stashed below and kept alive by the
        // `DataBlock`'s keep-alive handle, so this slice never outlives its
        // backing mapping.
        let slice: &[u8] = unsafe { std::slice::from_raw_parts(window.map.as_ptr(), len) };
        let block =
            unsafe { DataBlock::create_referenced_with_keep_alive(slice, window.clone()) };
        self.windows.insert(offset, window);
        self.buffer.push_referenced_page(block);
        trace!(offset, len, "mapped mmap window");
        Ok(())
    }

    /// Append `data` to the backing file, map the new bytes as a window,
    /// and add it as a new page. Mmap pages are never targets for
    /// in-place mutation once mapped, so every append is a new window.
    pub fn write_append(&mut self, data: &[u8]) -> Result<u64, AllocError> {
        if data.is_empty() {
            return Ok(0);
        }
        let file = self
            .file
            .as_ref()
            .ok_or(AllocError::InvalidArgument("mmap buffer has no backing file"))?;
        let offset = file.metadata().map_err(AllocError::Open)?.len();
        let new_len = offset + data.len() as u64;
        file.set_len(new_len)
            .map_err(|e| AllocError::ResizeFailed {
                requested: new_len,
                source: e,
            })?;

        let map = MmapOptions::new()
            .offset(offset)
            .len(data.len())
            .map_raw(file)
            .map_err(|e| AllocError::MapFailed {
                offset,
                requested: data.len(),
                source: e,
            })?;
        // SAFETY: this window was just created and hasn't been shared with
        // the page chain (or anything else) yet, so writing through its
        // raw pointer has no concurrent observer.
        unsafe {
            std::ptr::copy_nonoverlapping(data.as_ptr(), map.as_mut_ptr(), data.len());
        }
        file.sync_all().map_err(AllocError::Sync)?;

        let window = Arc::new(Window { map });
        let slice: &[u8] =
            unsafe { std::slice::from_raw_parts(window.map.as_ptr(), data.len()) };
        let block =
            unsafe { DataBlock::create_referenced_with_keep_alive(slice, window.clone()) };
        self.windows.insert(offset, window);
        self.buffer.push_referenced_page(block);
        trace!(offset, len = data.len(), "appended mmap window");
        Ok(data.len() as u64)
    }

    pub fn read_data(&self, offset: u64, out: &mut [u8]) -> u64 {
        self.buffer.read_data(offset, out)
    }

    pub fn seek(&mut self, n: u64) -> u64 {
        self.buffer.seek(n)
    }

    pub fn rewind(&mut self) {
        self.buffer.rewind();
    }

    /// Not supported: the backing file is strictly offset-ordered and
    /// append-only, so there is no way to drop trailing bytes without
    /// truncating a file other readers may still be mapping. Always
    /// returns 0.
    pub fn trim(&mut self, _n: u64) -> u64 {
        0
    }

    pub fn data_size(&self) -> u64 {
        self.buffer.data_size()
    }

    pub fn data_revision(&self) -> u64 {
        self.buffer.data_revision()
    }

    pub fn buffer(&self) -> &Buffer {
        &self.buffer
    }

    pub fn close_action(&self) -> CloseAction {
        self.close_action
    }

    pub fn set_close_action(&mut self, action: CloseAction) {
        self.close_action = action;
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn close(mut self) -> Result<(), AllocError> {
        self.windows.clear();
        self.buffer.clear();
        self.file.take();
        if self.close_action == CloseAction::Remove {
            if let Some(path) = self.path.take() {
                std::fs::remove_file(path).map_err(AllocError::Open)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn opens_existing_file_as_initial_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.bin");
        std::fs::File::create(&path)
            .unwrap()
            .write_all(b"existing content")
            .unwrap();

        let buf = MmapBuffer::open(&path, OpenAction::Append, CloseAction::Retain).unwrap();
        assert_eq!(buf.data_size(), 16);
        let mut out = vec![0u8; 16];
        buf.read_data(0, &mut out);
        assert_eq!(&out, b"existing content");
    }

    #[test]
    fn append_grows_file_and_chain() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("append.bin");

        let mut buf = MmapBuffer::open(&path, OpenAction::Append, CloseAction::Remove).unwrap();
        assert_eq!(buf.data_size(), 0);
        buf.write_append(b"hello ").unwrap();
        buf.write_append(b"world").unwrap();
        assert_eq!(buf.data_size(), 11);

        let mut out = vec![0u8; 11];
        buf.read_data(0, &mut out);
        assert_eq!(&out, b"hello world");

        buf.close().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn overwrite_action_discards_prior_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("overwrite.bin");
        std::fs::File::create(&path)
            .unwrap()
            .write_all(b"stale")
            .unwrap();

        let buf = MmapBuffer::open(&path, OpenAction::Overwrite, CloseAction::Retain).unwrap();
        assert_eq!(buf.data_size(), 0);
    }

    #[test]
    fn trim_is_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trim.bin");
        let mut buf = MmapBuffer::open(&path, OpenAction::Append, CloseAction::Remove).unwrap();
        buf.write_append(b"abcdef").unwrap();
        assert_eq!(buf.trim(3), 0);
        assert_eq!(buf.data_size(), 6);
    }
}
