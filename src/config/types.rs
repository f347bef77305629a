use mediashift_common::{AccessRight, ConversionDirection};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub media: MediaConfig,

    #[serde(default)]
    pub conversion: ConversionConfig,

    #[serde(default)]
    pub cleanup: CleanupConfig,

    #[serde(default)]
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// SQLite file holding the content repository
    #[serde(default = "default_database_path")]
    pub path: PathBuf,
}

fn default_database_path() -> PathBuf {
    PathBuf::from("mediashift.db")
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MediaConfig {
    /// Physical directory that virtual media paths are resolved against
    #[serde(default = "default_media_root")]
    pub root: PathBuf,

    /// Virtual folder under which external media files are created
    #[serde(default = "default_media_folder")]
    pub folder: String,

    /// Largest content (in bytes) that will be moved into a binary field
    #[serde(default = "default_max_inline_size")]
    pub max_inline_size: u64,
}

fn default_media_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_media_folder() -> String {
    "/App_Data/MediaFiles".to_string()
}

fn default_max_inline_size() -> u64 {
    500 * 1024 * 1024
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            root: default_media_root(),
            folder: default_media_folder(),
            max_inline_size: default_max_inline_size(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConversionConfig {
    /// Consecutive failures after which a batch stops (default: 20)
    #[serde(default = "default_consecutive_error_limit")]
    pub consecutive_error_limit: u32,

    /// Remove the old file after moving content into the database
    #[serde(default)]
    pub delete_converted_files: bool,

    /// Clear the old binary value after moving content out to a file
    #[serde(default)]
    pub delete_converted_blobs: bool,

    /// Include failure reasons in the failure summary log
    #[serde(default)]
    pub detailed_logging: bool,

    /// Buffer size for content comparison (default: 8192)
    #[serde(default = "default_compare_chunk_size")]
    pub compare_chunk_size: usize,
}

fn default_consecutive_error_limit() -> u32 {
    20
}

fn default_compare_chunk_size() -> usize {
    8192
}

impl ConversionConfig {
    /// Whether the representation left behind by `direction` should be removed.
    pub fn deletes_prior(&self, direction: ConversionDirection) -> bool {
        match direction {
            ConversionDirection::ToExternal => self.delete_converted_blobs,
            ConversionDirection::ToInline => self.delete_converted_files,
        }
    }
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            consecutive_error_limit: default_consecutive_error_limit(),
            delete_converted_files: false,
            delete_converted_blobs: false,
            detailed_logging: false,
            compare_chunk_size: default_compare_chunk_size(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CleanupConfig {
    /// Background workers removing prior storage (default: 2)
    #[serde(default = "default_cleanup_workers")]
    pub workers: usize,

    /// Pending cleanup tasks before new ones are dropped (default: 256)
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

fn default_cleanup_workers() -> usize {
    2
}

fn default_queue_capacity() -> usize {
    256
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            workers: default_cleanup_workers(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SecurityConfig {
    /// Rights of principals not listed in `principals`
    #[serde(default = "default_rights")]
    pub default_rights: Vec<AccessRight>,

    /// Rights per principal name
    #[serde(default)]
    pub principals: HashMap<String, Vec<AccessRight>>,
}

fn default_rights() -> Vec<AccessRight> {
    vec![AccessRight::Read, AccessRight::Write]
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            default_rights: default_rights(),
            principals: HashMap::new(),
        }
    }
}
