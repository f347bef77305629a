//! Moving media content between inline and external storage.

use std::fs;
use std::io::{self, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use mediashift_common::size::friendly_size;
use mediashift_common::{BlobId, ConversionDirection, MediaVersion, Principal};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::compare::ContentEqualityChecker;
use super::paths::MediaPaths;
use super::ConversionError;
use crate::repository::{ContentRepository, MediaEdit, MediaFields, MediaItem, MediaStream};

/// Storage a unit used before a successful conversion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PriorStorage {
    /// Virtual path of the external file.
    File(String),
    /// Inline binary value.
    Blob(BlobId),
}

/// A completed conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Converted {
    pub detail: String,
    /// What the conversion left behind; `None` when nothing needs cleaning.
    pub previous: Option<PriorStorage>,
    pub bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageResult {
    Converted(Converted),
    Skipped(String),
}

/// Performs the two storage conversions on a single media unit.
pub struct StorageConverter {
    repository: Arc<dyn ContentRepository>,
    paths: MediaPaths,
    checker: ContentEqualityChecker,
    max_inline_size: u64,
}

impl StorageConverter {
    pub fn new(
        repository: Arc<dyn ContentRepository>,
        paths: MediaPaths,
        checker: ContentEqualityChecker,
        max_inline_size: u64,
    ) -> Self {
        Self {
            repository,
            paths,
            checker,
            max_inline_size,
        }
    }

    pub fn paths(&self) -> &MediaPaths {
        &self.paths
    }

    pub fn convert(
        &self,
        item: &MediaItem,
        version: &MediaVersion,
        direction: ConversionDirection,
        principal: &Principal,
    ) -> Result<StorageResult, ConversionError> {
        match direction {
            ConversionDirection::ToExternal => self.to_external(item, version, principal),
            ConversionDirection::ToInline => self.to_inline(version, principal),
        }
    }

    /// Write the inline content to a file and point the unit at it.
    ///
    /// An existing file with identical content is reused instead of written.
    pub fn to_external(
        &self,
        item: &MediaItem,
        version: &MediaVersion,
        principal: &Principal,
    ) -> Result<StorageResult, ConversionError> {
        let fields = self.repository.media_fields(version)?.unwrap_or_default();
        let mut stream = self
            .repository
            .blob_stream(version)?
            .ok_or_else(|| ConversionError::MissingMedia(version.to_string()))?;

        let (virtual_path, physical, reused) = self.resolve_file(item, &mut stream)?;
        if reused {
            debug!("Reusing {} for {}: content is identical", virtual_path, version);
        } else {
            write_file(&physical, &mut stream)?;
        }

        let edit = MediaEdit::new(version.clone(), principal.clone()).set_file_path(&virtual_path);
        if let Err(e) = self.repository.commit_edit(edit) {
            if !reused {
                if let Err(remove_err) = fs::remove_file(&physical) {
                    warn!(
                        "Failed to remove {} after a failed commit: {}",
                        physical.display(),
                        remove_err
                    );
                }
            }
            return Err(ConversionError::Commit {
                version: version.to_string(),
                source: e,
            });
        }

        Ok(StorageResult::Converted(Converted {
            detail: format!("inline content was moved to '{}'", virtual_path),
            previous: fields.blob_id.map(PriorStorage::Blob),
            bytes: stream.len(),
        }))
    }

    /// Read the unit's content into its binary field and clear the file path.
    pub fn to_inline(
        &self,
        version: &MediaVersion,
        principal: &Principal,
    ) -> Result<StorageResult, ConversionError> {
        let fields = self
            .repository
            .media_fields(version)?
            .ok_or_else(|| ConversionError::MissingMedia(version.to_string()))?;

        let mut stream = match self.repository.media_stream(version)? {
            Some(stream) => stream,
            None => self.open_external(version, &fields)?,
        };

        if stream.len() > self.max_inline_size {
            return Ok(StorageResult::Skipped(format!(
                "content size {} exceeds the inline limit of {}",
                friendly_size(stream.len()),
                friendly_size(self.max_inline_size)
            )));
        }

        let bytes = stream
            .read_all()
            .map_err(|e| ConversionError::io(&fields.file_path, e))?;
        let len = bytes.len() as u64;

        let edit = MediaEdit::new(version.clone(), principal.clone())
            .set_file_path("")
            .set_blob(bytes);
        self.repository
            .commit_edit(edit)
            .map_err(|e| ConversionError::Commit {
                version: version.to_string(),
                source: e,
            })?;

        let previous = (!fields.file_path.is_empty())
            .then(|| PriorStorage::File(fields.file_path.clone()));
        Ok(StorageResult::Converted(Converted {
            detail: format!("content of '{}' was moved inline", fields.file_path),
            previous,
            bytes: len,
        }))
    }

    fn open_external(
        &self,
        version: &MediaVersion,
        fields: &MediaFields,
    ) -> Result<MediaStream, ConversionError> {
        if fields.is_external() {
            let physical = self.paths.to_physical(&fields.file_path)?;
            return MediaStream::open_file(&physical)
                .map_err(|e| ConversionError::io(&fields.file_path, e));
        }

        self.repository
            .blob_stream(version)?
            .ok_or_else(|| ConversionError::MissingMedia(version.to_string()))
    }

    /// Find the first candidate path that is free or already holds this content.
    ///
    /// Returns the virtual path, its physical location, and whether the file
    /// already exists with identical content.
    fn resolve_file(
        &self,
        item: &MediaItem,
        stream: &mut MediaStream,
    ) -> Result<(String, PathBuf, bool), ConversionError> {
        let directory = self.paths.directory_for(item);
        let physical_dir = self.paths.to_physical(&directory)?;
        fs::create_dir_all(&physical_dir).map_err(|e| ConversionError::io(&directory, e))?;

        for attempt in 0..=u32::MAX {
            let candidate = self.paths.candidate(item, attempt);
            let physical = self.paths.to_physical(&candidate)?;

            if !physical.exists() {
                return Ok((candidate, physical, false));
            }

            let matches = self
                .checker
                .file_matches(&physical, stream)
                .map_err(|e| ConversionError::io(&candidate, e))?;
            if matches {
                return Ok((candidate, physical, true));
            }
        }

        Err(ConversionError::InvalidPath(format!(
            "no free file name left in {}",
            directory
        )))
    }
}

/// Write the stream to `path` without ever replacing an existing file.
fn write_file(path: &Path, stream: &mut MediaStream) -> Result<(), ConversionError> {
    let display = path.display().to_string();
    let dir = path
        .parent()
        .ok_or_else(|| ConversionError::InvalidPath(display.clone()))?;

    let mut temp =
        tempfile::NamedTempFile::new_in(dir).map_err(|e| ConversionError::io(&display, e))?;
    stream
        .seek(SeekFrom::Start(0))
        .map_err(|e| ConversionError::io(&display, e))?;
    io::copy(stream, temp.as_file_mut()).map_err(|e| ConversionError::io(&display, e))?;
    temp.as_file()
        .sync_all()
        .map_err(|e| ConversionError::io(&display, e))?;

    temp.persist_noclobber(path)
        .map_err(|e| ConversionError::io(&display, e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::MemoryRepository;
    use assert_matches::assert_matches;
    use mediashift_common::VersionKey;
    use mediashift_db::queries::items::NewItem;
    use tempfile::TempDir;

    struct Fixture {
        repo: Arc<MemoryRepository>,
        converter: StorageConverter,
        dir: TempDir,
    }

    fn fixture(max_inline_size: u64) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let repo = Arc::new(MemoryRepository::new());
        let converter = StorageConverter::new(
            repo.clone(),
            MediaPaths::new(dir.path(), "/media"),
            ContentEqualityChecker::new(4),
            max_inline_size,
        );
        Fixture {
            repo,
            converter,
            dir,
        }
    }

    fn principal() -> Principal {
        Principal::new("admin")
    }

    #[test]
    fn test_to_external_writes_file() {
        let f = fixture(1024);
        let reference = f
            .repo
            .create_item(&NewItem::new("master", "logo").extension("png"))
            .unwrap();
        let unit = MediaVersion::shared(reference);
        f.repo.store_inline(&unit, b"png data").unwrap();
        let blob_id = f.repo.media_fields(&unit).unwrap().unwrap().blob_id.unwrap();
        let item = f.repo.get_item(&unit.reference).unwrap().unwrap();

        let result = f.converter.to_external(&item, &unit, &principal()).unwrap();
        let converted = assert_matches!(result, StorageResult::Converted(c) => c);
        assert_eq!(converted.previous, Some(PriorStorage::Blob(blob_id)));
        assert_eq!(converted.bytes, 8);

        let fields = f.repo.media_fields(&unit).unwrap().unwrap();
        assert_eq!(fields.file_path, f.converter.paths().candidate(&item, 0));
        let physical = f.converter.paths().to_physical(&fields.file_path).unwrap();
        assert!(physical.starts_with(f.dir.path()));
        assert_eq!(fs::read(physical).unwrap(), b"png data");
    }

    #[test]
    fn test_to_external_suffixes_on_different_content() {
        let f = fixture(1024);
        let reference = f
            .repo
            .create_item(&NewItem::new("master", "logo").extension("png"))
            .unwrap();
        let unit = MediaVersion::shared(reference);
        f.repo.store_inline(&unit, b"new content").unwrap();
        let item = f.repo.get_item(&unit.reference).unwrap().unwrap();

        let first = f.converter.paths().candidate(&item, 0);
        let taken = f.converter.paths().to_physical(&first).unwrap();
        fs::create_dir_all(taken.parent().unwrap()).unwrap();
        fs::write(&taken, b"old content").unwrap();

        f.converter.to_external(&item, &unit, &principal()).unwrap();

        let fields = f.repo.media_fields(&unit).unwrap().unwrap();
        assert_eq!(fields.file_path, f.converter.paths().candidate(&item, 1));
        assert_eq!(fs::read(&taken).unwrap(), b"old content");
    }

    #[test]
    fn test_to_external_without_blob_fails() {
        let f = fixture(1024);
        let reference = f.repo.create_item(&NewItem::new("master", "logo")).unwrap();
        let unit = MediaVersion::shared(reference);
        let item = f.repo.get_item(&unit.reference).unwrap().unwrap();

        let result = f.converter.to_external(&item, &unit, &principal());
        assert_matches!(result, Err(ConversionError::MissingMedia(_)));
    }

    #[test]
    fn test_to_inline_reads_file() {
        let f = fixture(1024);
        let reference = f.repo.create_item(&NewItem::new("master", "doc").versioned()).unwrap();
        let unit = f.repo.add_version(&reference, VersionKey::new("en", 1)).unwrap();
        fs::create_dir_all(f.dir.path().join("media")).unwrap();
        fs::write(f.dir.path().join("media/doc.pdf"), b"%PDF").unwrap();
        f.repo.store_external(&unit, "/media/doc.pdf").unwrap();

        let result = f.converter.to_inline(&unit, &principal()).unwrap();
        let converted = assert_matches!(result, StorageResult::Converted(c) => c);
        assert_eq!(
            converted.previous,
            Some(PriorStorage::File("/media/doc.pdf".to_string()))
        );

        let fields = f.repo.media_fields(&unit).unwrap().unwrap();
        assert!(fields.file_path.is_empty());
        let mut stream = f.repo.blob_stream(&unit).unwrap().unwrap();
        assert_eq!(stream.read_all().unwrap(), b"%PDF");
    }

    #[test]
    fn test_to_inline_prefers_media_cache() {
        let f = fixture(1024);
        let reference = f.repo.create_item(&NewItem::new("master", "doc")).unwrap();
        let unit = MediaVersion::shared(reference);
        f.repo.store_external(&unit, "/media/not-on-disk.pdf").unwrap();
        f.repo.cache_media(&unit, b"cached");

        f.converter.to_inline(&unit, &principal()).unwrap();

        let mut stream = f.repo.blob_stream(&unit).unwrap().unwrap();
        assert_eq!(stream.read_all().unwrap(), b"cached");
    }

    #[test]
    fn test_to_inline_skips_oversized_content() {
        let f = fixture(3);
        let reference = f.repo.create_item(&NewItem::new("master", "doc")).unwrap();
        let unit = MediaVersion::shared(reference);
        fs::create_dir_all(f.dir.path().join("media")).unwrap();
        fs::write(f.dir.path().join("media/big.bin"), b"four").unwrap();
        f.repo.store_external(&unit, "/media/big.bin").unwrap();

        let result = f.converter.to_inline(&unit, &principal()).unwrap();
        assert_matches!(result, StorageResult::Skipped(_));
        assert_eq!(
            f.repo.media_fields(&unit).unwrap().unwrap().file_path,
            "/media/big.bin"
        );
    }

    #[test]
    fn test_to_inline_missing_file_fails() {
        let f = fixture(1024);
        let reference = f.repo.create_item(&NewItem::new("master", "doc")).unwrap();
        let unit = MediaVersion::shared(reference);
        f.repo.store_external(&unit, "/media/gone.pdf").unwrap();

        let result = f.converter.to_inline(&unit, &principal());
        assert_matches!(result, Err(ConversionError::Io { .. }));
        assert_eq!(
            f.repo.media_fields(&unit).unwrap().unwrap().file_path,
            "/media/gone.pdf"
        );
    }
}
