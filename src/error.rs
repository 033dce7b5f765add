use thiserror::Error;

/// Errors surfaced by the allocator and by mmap-backed storage.
///
/// Everything else in the crate (buffer, readers) signals failure locally by
/// returning a byte count short of what was requested, or `false` for a
/// rejected insert — see the operations in [`crate::buffer`]. `AllocError`
/// is reserved for the boundary where the OS or an allocator can actually
/// fail.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AllocError {
    /// Couldn't open the backing file.
    #[error("opening the backing file failed")]
    Open(#[source] std::io::Error),
    /// Couldn't lock the backing file for exclusive use.
    #[error("failed to lock the backing file for exclusive use")]
    Lock(#[source] std::io::Error),
    /// Couldn't synchronize to the backing file.
    #[error("synchronizing to the backing file failed")]
    Sync(#[source] std::io::Error),
    /// Couldn't resize the backing file.
    #[error("can't resize the backing file to 0x{requested:x} bytes")]
    ResizeFailed {
        requested: u64,
        #[source]
        source: std::io::Error,
    },
    /// Couldn't map or remap a region.
    #[error("can't map 0x{requested:x} bytes at offset 0x{offset:x}")]
    MapFailed {
        offset: u64,
        requested: usize,
        #[source]
        source: std::io::Error,
    },
    /// An open/close action combination, or some other constructor argument,
    /// was invalid.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
    /// Other, miscellaneous errors.
    #[error("{0}")]
    Other(&'static str),
}
