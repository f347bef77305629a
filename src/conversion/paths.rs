//! Virtual media paths and their physical locations.
//!
//! External media is recorded as a virtual path rooted at the media folder,
//! e.g. `/App_Data/MediaFiles/3/f/a/3fa85f64-...logo.png`. The physical file is
//! the virtual path joined onto the configured media root.

use std::path::{Component, Path, PathBuf};

use super::ConversionError;
use crate::repository::MediaItem;

/// Characters that cannot appear in a file name on common filesystems.
const INVALID_FILENAME_CHARS: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// Number of leading id characters used as nested directory names.
const FAN_OUT_DEPTH: usize = 3;

#[derive(Debug, Clone)]
pub struct MediaPaths {
    root: PathBuf,
    folder: String,
}

impl MediaPaths {
    pub fn new(root: impl Into<PathBuf>, folder: &str) -> Self {
        let folder = folder.trim_matches('/');
        Self {
            root: root.into(),
            folder: format!("/{}", folder),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The virtual media folder, with a leading slash and no trailing one.
    pub fn folder(&self) -> &str {
        &self.folder
    }

    /// Map a virtual path onto the media root.
    ///
    /// Paths that would escape the root are rejected.
    pub fn to_physical(&self, virtual_path: &str) -> Result<PathBuf, ConversionError> {
        let relative = Path::new(virtual_path.trim_start_matches(['/', '\\']));
        let mut physical = self.root.clone();

        for component in relative.components() {
            match component {
                Component::Normal(part) => physical.push(part),
                Component::CurDir => {}
                _ => return Err(ConversionError::InvalidPath(virtual_path.to_string())),
            }
        }

        if physical == self.root {
            return Err(ConversionError::InvalidPath(virtual_path.to_string()));
        }

        Ok(physical)
    }

    /// Virtual directory holding an item's external media.
    ///
    /// The first characters of the item id form nested directories so no
    /// single directory collects every media file.
    pub fn directory_for(&self, item: &MediaItem) -> String {
        let id = item.reference.item_id.to_string();
        let mut directory = self.folder.clone();
        for c in id.chars().take(FAN_OUT_DEPTH) {
            directory.push('/');
            directory.push(c);
        }
        directory
    }

    /// Candidate virtual file path for an item. `attempt` 0 has no numeric suffix.
    pub fn candidate(&self, item: &MediaItem, attempt: u32) -> String {
        let mut file_name = format!(
            "{}{}",
            item.reference.item_id,
            sanitize_file_name(&item.name)
        );
        if attempt > 0 {
            file_name.push_str(&attempt.to_string());
        }
        let extension = item.extension.trim_start_matches('.');
        if !extension.is_empty() {
            file_name.push('.');
            file_name.push_str(extension);
        }

        format!("{}/{}", self.directory_for(item), file_name)
    }
}

fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if INVALID_FILENAME_CHARS.contains(&c) || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect()
}
