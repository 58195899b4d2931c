use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum ScratchError {
    #[error("Scratch I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Payload of {size} bytes exceeds the {limit} byte limit")]
    TooLarge { size: usize, limit: usize },
}

/// Request-scoped image files. Each upload gets its own file, removed when
/// the returned handle drops.
#[derive(Debug, Clone)]
pub struct ScratchStore {
    dir: PathBuf,
    max_bytes: usize,
}

impl ScratchStore {
    pub fn new(dir: impl Into<PathBuf>, max_bytes: usize) -> Self {
        Self {
            dir: dir.into(),
            max_bytes,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn extension_for_mime(mime_type: Option<&str>) -> &'static str {
        match mime_type {
            Some("image/jpeg") | Some("image/jpg") => "jpg",
            Some("image/png") => "png",
            Some("image/webp") => "webp",
            Some("image/gif") => "gif",
            _ => "jpg",
        }
    }

    pub fn validate_size(&self, size: usize) -> Result<(), ScratchError> {
        if size > self.max_bytes {
            return Err(ScratchError::TooLarge {
                size,
                limit: self.max_bytes,
            });
        }
        Ok(())
    }

    pub fn persist(
        &self,
        request_id: Uuid,
        data: &[u8],
        extension: &str,
    ) -> Result<NamedTempFile, ScratchError> {
        self.validate_size(data.len())?;
        std::fs::create_dir_all(&self.dir)?;

        let mut file = tempfile::Builder::new()
            .prefix(&format!("{}-", request_id))
            .suffix(&format!(".{}", extension))
            .tempfile_in(&self.dir)?;
        file.write_all(data)?;
        file.flush()?;
        Ok(file)
    }
}
