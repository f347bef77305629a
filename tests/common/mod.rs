//! Shared test harness for integration tests.
//!
//! Provides [`TestHarness`] which creates an in-memory database behind a
//! [`SqliteRepository`], a temporary media root and a default config.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use mediashift::config::Config;
use mediashift::conversion::MediaConversionManager;
use mediashift::repository::{
    ContentRepository, MediaEdit, MediaFields, MediaItem, MediaStream, SqliteRepository,
};
use mediashift::security::AllowAll;
use mediashift_common::{Error, ItemId, MediaReference, MediaVersion, Result, VersionKey};
use mediashift_db::models::MediaFieldRow;
use mediashift_db::pool::{get_conn, init_memory_pool, DbPool};
use mediashift_db::queries::media_fields::get_media_fields;
use mediashift_db::queries::items::NewItem;
use tempfile::TempDir;

pub const DATABASE: &str = "master";

/// Test harness wrapping a [`SqliteRepository`] backed by an in-memory
/// database and a temporary media root.
pub struct TestHarness {
    pub repo: Arc<SqliteRepository>,
    pub db: DbPool,
    pub config: Config,
    pub media_root: TempDir,
}

impl TestHarness {
    /// Create a new harness with default configuration.
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// Create a new harness with a custom configuration. The media root is
    /// always replaced by a fresh temporary directory.
    pub fn with_config(mut config: Config) -> Self {
        let db = init_memory_pool().expect("failed to create in-memory pool");
        let media_root = tempfile::tempdir().expect("failed to create media root");
        config.media.root = media_root.path().to_path_buf();

        Self {
            repo: Arc::new(SqliteRepository::new(db.clone())),
            db,
            config,
            media_root,
        }
    }

    /// Manager over the harness repository. Must be called inside a runtime.
    pub fn manager(&self) -> MediaConversionManager {
        self.manager_with(self.repo.clone())
    }

    /// Manager over another repository, sharing the harness config.
    pub fn manager_with(&self, repository: Arc<dyn ContentRepository>) -> MediaConversionManager {
        MediaConversionManager::new(
            repository,
            Arc::new(AllowAll),
            self.config.clone(),
            tokio::runtime::Handle::current(),
        )
    }

    /// Create a record without media content.
    pub fn folder(&self, name: &str, parent: Option<&MediaReference>) -> MediaReference {
        let mut new_item = NewItem::new(DATABASE, name);
        if let Some(parent) = parent {
            new_item = new_item.parent(parent.item_id);
        }
        self.repo.create_item(&new_item).expect("failed to create item")
    }

    /// Create a shared-media record holding `data` inline.
    pub fn inline_item(
        &self,
        name: &str,
        parent: Option<&MediaReference>,
        data: &[u8],
    ) -> MediaReference {
        let mut new_item = NewItem::new(DATABASE, name).extension("jpg");
        if let Some(parent) = parent {
            new_item = new_item.parent(parent.item_id);
        }
        let reference = self.repo.create_item(&new_item).expect("failed to create item");
        self.repo
            .store_inline(&MediaVersion::shared(reference.clone()), data)
            .expect("failed to store blob");
        reference
    }

    /// Create a shared-media record whose content lives in an external file.
    pub fn external_item(&self, name: &str, virtual_path: &str, data: &[u8]) -> MediaReference {
        let reference = self
            .repo
            .create_item(&NewItem::new(DATABASE, name).extension("jpg"))
            .expect("failed to create item");
        let physical = self.physical(virtual_path);
        std::fs::create_dir_all(physical.parent().unwrap()).unwrap();
        std::fs::write(&physical, data).unwrap();
        self.repo
            .store_external(&MediaVersion::shared(reference.clone()), virtual_path)
            .expect("failed to store path");
        reference
    }

    pub fn fields(&self, reference: &MediaReference) -> MediaFields {
        self.repo
            .media_fields(&MediaVersion::shared(reference.clone()))
            .unwrap()
            .expect("expected media fields")
    }

    pub fn blob(&self, reference: &MediaReference) -> Option<Vec<u8>> {
        self.repo
            .blob_stream(&MediaVersion::shared(reference.clone()))
            .unwrap()
            .map(|mut stream| stream.read_all().unwrap())
    }

    /// The stored field row of a shared unit, including who last edited it.
    pub fn field_row(&self, reference: &MediaReference) -> MediaFieldRow {
        let conn = get_conn(&self.db).expect("failed to get connection");
        get_media_fields(&conn, reference.item_id, &VersionKey::shared())
            .unwrap()
            .expect("expected a media field row")
    }

    /// Run raw SQL against the repository database.
    pub fn execute_sql(&self, sql: &str) {
        let conn = get_conn(&self.db).expect("failed to get connection");
        conn.execute_batch(sql).expect("failed to execute SQL");
    }

    /// Physical location of a virtual media path.
    pub fn physical(&self, virtual_path: &str) -> PathBuf {
        self.media_root.path().join(virtual_path.trim_start_matches('/'))
    }

    /// Every file under the media root.
    pub fn media_files(&self) -> Vec<PathBuf> {
        fn walk(dir: &std::path::Path, out: &mut Vec<PathBuf>) {
            for entry in std::fs::read_dir(dir).unwrap() {
                let path = entry.unwrap().path();
                if path.is_dir() {
                    walk(&path, out);
                } else {
                    out.push(path);
                }
            }
        }

        let mut files = Vec::new();
        walk(self.media_root.path(), &mut files);
        files.sort();
        files
    }
}

/// Repository whose edits fail for selected records.
pub struct FailingRepository {
    inner: Arc<dyn ContentRepository>,
    failing: Vec<ItemId>,
}

impl FailingRepository {
    pub fn new(inner: Arc<dyn ContentRepository>, failing: Vec<ItemId>) -> Self {
        Self { inner, failing }
    }
}

impl ContentRepository for FailingRepository {
    fn get_item(&self, reference: &MediaReference) -> Result<Option<MediaItem>> {
        self.inner.get_item(reference)
    }

    fn children(&self, reference: &MediaReference) -> Result<Vec<MediaReference>> {
        self.inner.children(reference)
    }

    fn versions(&self, reference: &MediaReference) -> Result<Vec<MediaVersion>> {
        self.inner.versions(reference)
    }

    fn media_fields(&self, version: &MediaVersion) -> Result<Option<MediaFields>> {
        self.inner.media_fields(version)
    }

    fn has_media_content(&self, version: &MediaVersion) -> Result<bool> {
        self.inner.has_media_content(version)
    }

    fn blob_stream(&self, version: &MediaVersion) -> Result<Option<MediaStream>> {
        self.inner.blob_stream(version)
    }

    fn commit_edit(&self, edit: MediaEdit) -> Result<()> {
        if self.failing.contains(&edit.version().item_id()) {
            return Err(Error::database("disk I/O error"));
        }
        self.inner.commit_edit(edit)
    }

    fn file_path_in_use(&self, path: &str) -> Result<bool> {
        self.inner.file_path_in_use(path)
    }
}
