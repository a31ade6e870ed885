//! Explicit ownership tracking for in-memory images.
//!
//! Every original and processed image held by a session is registered here
//! and addressed by a [`ResourceId`]. Owners (the active job, history
//! records) take a reference with [`ResourceRegistry::insert`] or
//! [`ResourceRegistry::retain`] and give it back with
//! [`ResourceRegistry::release`]. The entry is freed when the last reference
//! goes. Releasing a freed id is an error, and [`ResourceRegistry::live`]
//! exposes leaks to tests.

use crate::error::ResourceError;
use crate::media::ImageData;
use std::collections::HashMap;
use std::fmt;
use tracing::debug;

/// Handle to a registered image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(u64);

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

struct Entry {
    data: ImageData,
    refs: usize,
}

/// Reference-counted arena of image data keyed by [`ResourceId`].
#[derive(Default)]
pub struct ResourceRegistry {
    entries: HashMap<ResourceId, Entry>,
    next_id: u64,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `data` with one reference held by the caller.
    pub fn insert(&mut self, data: ImageData) -> ResourceId {
        self.next_id += 1;
        let id = ResourceId(self.next_id);
        debug!("Registered image {} ({} bytes)", id, data.len());
        self.entries.insert(id, Entry { data, refs: 1 });
        id
    }

    /// Add a reference for a new owner.
    pub fn retain(&mut self, id: ResourceId) -> Result<(), ResourceError> {
        let entry = self.entries.get_mut(&id).ok_or(ResourceError::Unknown(id))?;
        entry.refs += 1;
        Ok(())
    }

    /// Drop one reference. Returns `true` when the image was freed.
    pub fn release(&mut self, id: ResourceId) -> Result<bool, ResourceError> {
        let entry = self.entries.get_mut(&id).ok_or(ResourceError::Unknown(id))?;
        entry.refs -= 1;
        if entry.refs == 0 {
            self.entries.remove(&id);
            debug!("Freed image {}", id);
            return Ok(true);
        }
        Ok(false)
    }

    pub fn get(&self, id: ResourceId) -> Option<&ImageData> {
        self.entries.get(&id).map(|e| &e.data)
    }

    /// Current reference count, or 0 for freed ids.
    pub fn refs(&self, id: ResourceId) -> usize {
        self.entries.get(&id).map_or(0, |e| e.refs)
    }

    /// Number of images still held by someone.
    pub fn live(&self) -> usize {
        self.entries.len()
    }

    /// Total bytes held, for diagnostics.
    pub fn live_bytes(&self) -> usize {
        self.entries.values().map(|e| e.data.len()).sum()
    }
}

impl fmt::Debug for ResourceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceRegistry")
            .field("live", &self.live())
            .field("live_bytes", &self.live_bytes())
            .finish()
    }
}
