//! Reading SoundFont and MIDI resources into memory.
//!
//! Resources are read once into immutable buffers. The controller keeps them
//! until a playback attempt takes a (cheap) clone.

use crate::error::{PlayerError, Result};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Raw bytes of a loaded file, immutable once read.
#[derive(Clone, PartialEq, Eq)]
pub struct ResourceBuffer {
    name: String,
    bytes: Arc<[u8]>,
}

impl ResourceBuffer {
    /// Wraps bytes that were obtained elsewhere.
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    /// Display name (file name or URL).
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Debug for ResourceBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceBuffer")
            .field("name", &self.name)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Reads a user-selected file. No retry on failure.
pub fn read_resource<P: AsRef<Path>>(path: P) -> Result<ResourceBuffer> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|source| PlayerError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;

    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("?")
        .to_string();
    tracing::debug!(%name, len = bytes.len(), "read resource");

    Ok(ResourceBuffer::new(name, bytes))
}

/// Downloads a resource over HTTP(S).
pub fn fetch_resource(url: &str) -> Result<ResourceBuffer> {
    let fetch_err = |reason: String| PlayerError::Fetch {
        url: url.to_string(),
        reason,
    };

    // Non-2xx statuses already come back as errors from `call`.
    let response = ureq::get(url).call().map_err(|e| fetch_err(e.to_string()))?;

    let mut bytes = Vec::new();
    std::io::copy(&mut response.into_body().into_reader(), &mut bytes)
        .map_err(|e| fetch_err(e.to_string()))?;
    tracing::debug!(%url, len = bytes.len(), "fetched resource");

    Ok(ResourceBuffer::new(url, bytes))
}

/// Where a session obtains its SoundFont from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SoundFontSource {
    /// Fetched when the attempt reaches the loading step.
    Url(String),
    /// Already read from a local file.
    Buffer(ResourceBuffer),
}

impl SoundFontSource {
    /// Human-readable origin, used in status messages.
    pub fn describe(&self) -> &str {
        match self {
            SoundFontSource::Url(url) => url,
            SoundFontSource::Buffer(buffer) => buffer.name(),
        }
    }

    /// Produces the SoundFont bytes, downloading if necessary.
    pub fn resolve(&self) -> Result<ResourceBuffer> {
        match self {
            SoundFontSource::Url(url) => fetch_resource(url),
            SoundFontSource::Buffer(buffer) => Ok(buffer.clone()),
        }
    }
}
