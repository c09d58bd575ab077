//! The product of one successful extract + encode cycle.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Encoded container bytes plus metadata.
///
/// The payload is shared, so cloning a result is cheap.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedResult {
    /// When the encoder delivered the payload.
    pub timestamp: DateTime<Utc>,
    /// Container mime type, e.g. `audio/wav`.
    pub mime_type: String,
    /// Payload length in bytes.
    pub size: usize,
    /// The encoded file.
    pub payload: Arc<[u8]>,
    /// Unique handle identifying this payload.
    pub handle: Uuid,
}

impl EncodedResult {
    pub fn new(mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            timestamp: Utc::now(),
            mime_type: mime_type.into(),
            size: bytes.len(),
            payload: bytes.into(),
            handle: Uuid::new_v4(),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.payload
    }

    /// Suggested file name: `<handle>.<extension>`.
    pub fn file_name(&self) -> String {
        let ext = self
            .mime_type
            .rsplit('/')
            .next()
            .filter(|s| !s.is_empty())
            .unwrap_or("bin");
        format!("{}.{ext}", self.handle)
    }

    /// Write the payload to `path`, creating parent directories as needed.
    pub fn write_to(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, &self.payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_matches_payload() {
        let result = EncodedResult::new("audio/wav", vec![0u8; 64]);
        assert_eq!(result.size, 64);
        assert_eq!(result.bytes().len(), 64);
        assert_eq!(result.mime_type, "audio/wav");
    }

    #[test]
    fn handles_are_unique() {
        let a = EncodedResult::new("audio/wav", vec![1]);
        let b = EncodedResult::new("audio/wav", vec![1]);
        assert_ne!(a.handle, b.handle);
    }

    #[test]
    fn file_name_uses_mime_subtype() {
        let result = EncodedResult::new("audio/wav", vec![1]);
        assert_eq!(result.file_name(), format!("{}.wav", result.handle));
    }

    #[test]
    fn write_to_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("clip.wav");
        let result = EncodedResult::new("audio/wav", vec![7, 8, 9]);

        result.write_to(&path).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), vec![7, 8, 9]);
    }
}
