use std::path::PathBuf;

use crate::{SheetDescriptor, SheetIndex};

type BoxedError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, thiserror::Error)]
pub enum SheetLoadError {
    #[error("sheet source {} is unavailable", .path.display())]
    Unavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("sheet source {} does not describe sheet {expected}", .path.display())]
    HeaderMismatch { path: PathBuf, expected: SheetIndex },
    #[error("sheet {index} payload could not be decoded")]
    Decode {
        index: SheetIndex,
        #[source]
        source: BoxedError,
    },
}

/// Creates and destroys the backing resource of a sheet.
///
/// Both calls run on the cache actor thread only.
pub trait SheetLoader: Send + 'static {
    type Resource: Send + Sync + 'static;

    fn load(&self, sheet: &SheetDescriptor) -> Result<Self::Resource, SheetLoadError>;

    /// Called once when the sheet is evicted or the cache shuts down. Other
    /// threads may still hold the handle; the resource must tolerate use after
    /// release the way the backing API does.
    fn release(&self, sheet: &SheetDescriptor, resource: &Self::Resource) {
        let _ = (sheet, resource);
    }
}

/// A loaded sheet as handed out to callers.
#[derive(Debug)]
pub struct ResidentSheet<R> {
    index: SheetIndex,
    byte_size: u64,
    resource: R,
}

impl<R> ResidentSheet<R> {
    pub(crate) fn new(index: SheetIndex, byte_size: u64, resource: R) -> Self {
        Self {
            index,
            byte_size,
            resource,
        }
    }

    pub fn index(&self) -> SheetIndex {
        self.index
    }

    pub fn byte_size(&self) -> u64 {
        self.byte_size
    }

    pub fn resource(&self) -> &R {
        &self.resource
    }
}

impl<R> std::ops::Deref for ResidentSheet<R> {
    type Target = R;

    fn deref(&self) -> &R {
        &self.resource
    }
}
