//! In-process content repository.

use std::collections::{BTreeMap, HashMap};

use mediashift_common::{
    BlobId, Error, ItemId, MediaReference, MediaVersion, Result, VersionKey,
};
use mediashift_db::queries::items::NewItem;
use parking_lot::RwLock;

use super::{BlobChange, ContentRepository, MediaEdit, MediaFields, MediaItem, MediaStream};

#[derive(Debug, Clone)]
struct StoredItem {
    database: String,
    parent_id: Option<ItemId>,
    name: String,
    extension: String,
    sort_order: i64,
    is_clone: bool,
    shared_media: bool,
    versions: Vec<VersionKey>,
}

#[derive(Debug, Default)]
struct State {
    items: BTreeMap<ItemId, StoredItem>,
    fields: HashMap<(ItemId, VersionKey), MediaFields>,
    blobs: HashMap<BlobId, Vec<u8>>,
    cache: HashMap<MediaVersion, Vec<u8>>,
    editors: HashMap<MediaVersion, String>,
}

impl State {
    fn item(&self, reference: &MediaReference) -> Option<&StoredItem> {
        self.items
            .get(&reference.item_id)
            .filter(|item| item.database == reference.database)
    }

    fn path(&self, id: ItemId) -> String {
        let mut names = Vec::new();
        let mut current = Some(id);
        while let Some(id) = current {
            let Some(item) = self.items.get(&id) else {
                break;
            };
            names.push(item.name.as_str());
            current = item.parent_id;
        }
        names.reverse();
        format!("/{}", names.join("/"))
    }

    fn release_blob(&mut self, blob_id: BlobId) {
        let referenced = self.fields.values().any(|f| f.blob_id == Some(blob_id));
        if !referenced {
            self.blobs.remove(&blob_id);
        }
    }
}

/// Content repository held entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    state: RwLock<State>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a record and return its reference.
    pub fn create_item(&self, new_item: &NewItem) -> Result<MediaReference> {
        let mut state = self.state.write();
        if let Some(parent) = new_item.parent_id {
            if !state.items.contains_key(&parent) {
                return Err(Error::not_found(format!("item {}", parent)));
            }
        }

        let id = ItemId::new();
        state.items.insert(
            id,
            StoredItem {
                database: new_item.database.clone(),
                parent_id: new_item.parent_id,
                name: new_item.name.clone(),
                extension: new_item.extension.clone(),
                sort_order: new_item.sort_order,
                is_clone: new_item.is_clone,
                shared_media: new_item.shared_media,
                versions: Vec::new(),
            },
        );
        Ok(MediaReference::new(id, new_item.database.clone()))
    }

    /// Add a version to a record.
    pub fn add_version(&self, reference: &MediaReference, key: VersionKey) -> Result<MediaVersion> {
        let mut state = self.state.write();
        let item = state
            .items
            .get_mut(&reference.item_id)
            .ok_or_else(|| Error::not_found(reference.to_string()))?;
        if !item.versions.contains(&key) {
            item.versions.push(key.clone());
            item.versions.sort();
        }
        Ok(MediaVersion::new(reference.clone(), key))
    }

    /// Store content inline, with no external path.
    pub fn store_inline(&self, version: &MediaVersion, data: &[u8]) -> Result<()> {
        let mut state = self.state.write();
        let blob_id = BlobId::new();
        state.blobs.insert(blob_id, data.to_vec());
        state.fields.insert(
            (version.item_id(), version.version.clone()),
            MediaFields {
                file_path: String::new(),
                blob_id: Some(blob_id),
                has_blob_field: true,
            },
        );
        Ok(())
    }

    /// Point a unit at an external file, with an empty binary field.
    pub fn store_external(&self, version: &MediaVersion, path: &str) -> Result<()> {
        self.store_fields(version, path, true)
    }

    /// Point a unit at an external file on a record that has no binary field.
    pub fn store_without_blob_field(&self, version: &MediaVersion, path: &str) -> Result<()> {
        self.store_fields(version, path, false)
    }

    /// Principal of the last committed edit of a unit.
    pub fn last_editor(&self, version: &MediaVersion) -> Option<String> {
        self.state.read().editors.get(version).cloned()
    }

    /// Serve `data` from the media cache for a unit.
    pub fn cache_media(&self, version: &MediaVersion, data: &[u8]) {
        self.state.write().cache.insert(version.clone(), data.to_vec());
    }

    /// Number of stored blobs.
    pub fn blob_count(&self) -> usize {
        self.state.read().blobs.len()
    }

    fn store_fields(&self, version: &MediaVersion, path: &str, has_blob_field: bool) -> Result<()> {
        self.state.write().fields.insert(
            (version.item_id(), version.version.clone()),
            MediaFields {
                file_path: path.to_string(),
                blob_id: None,
                has_blob_field,
            },
        );
        Ok(())
    }
}

impl ContentRepository for MemoryRepository {
    fn get_item(&self, reference: &MediaReference) -> Result<Option<MediaItem>> {
        let state = self.state.read();
        Ok(state.item(reference).map(|item| MediaItem {
            reference: reference.clone(),
            name: item.name.clone(),
            extension: item.extension.clone(),
            path: state.path(reference.item_id),
            is_clone: item.is_clone,
            shared_media: item.shared_media,
        }))
    }

    fn children(&self, reference: &MediaReference) -> Result<Vec<MediaReference>> {
        let state = self.state.read();
        let mut children: Vec<(&ItemId, &StoredItem)> = state
            .items
            .iter()
            .filter(|(_, item)| item.parent_id == Some(reference.item_id))
            .collect();
        children.sort_by(|(_, a), (_, b)| {
            a.sort_order
                .cmp(&b.sort_order)
                .then_with(|| a.name.cmp(&b.name))
        });

        Ok(children
            .into_iter()
            .map(|(id, item)| MediaReference::new(*id, item.database.clone()))
            .collect())
    }

    fn versions(&self, reference: &MediaReference) -> Result<Vec<MediaVersion>> {
        let state = self.state.read();
        let versions = state
            .item(reference)
            .map(|item| item.versions.clone())
            .unwrap_or_default();
        Ok(versions
            .into_iter()
            .map(|key| MediaVersion::new(reference.clone(), key))
            .collect())
    }

    fn media_fields(&self, version: &MediaVersion) -> Result<Option<MediaFields>> {
        let state = self.state.read();
        Ok(state
            .fields
            .get(&(version.item_id(), version.version.clone()))
            .cloned())
    }

    fn has_media_content(&self, version: &MediaVersion) -> Result<bool> {
        Ok(self
            .media_fields(version)?
            .is_some_and(|fields| fields.has_content()))
    }

    fn blob_stream(&self, version: &MediaVersion) -> Result<Option<MediaStream>> {
        let state = self.state.read();
        let data = state
            .fields
            .get(&(version.item_id(), version.version.clone()))
            .and_then(|fields| fields.blob_id)
            .and_then(|blob_id| state.blobs.get(&blob_id))
            .cloned();
        Ok(data.map(MediaStream::from_bytes))
    }

    fn media_stream(&self, version: &MediaVersion) -> Result<Option<MediaStream>> {
        let state = self.state.read();
        Ok(state.cache.get(version).cloned().map(MediaStream::from_bytes))
    }

    fn commit_edit(&self, edit: MediaEdit) -> Result<()> {
        let mut state = self.state.write();
        let version = edit.version();
        if state.item(&version.reference).is_none() {
            return Err(Error::not_found(version.reference.to_string()));
        }

        let key = (version.item_id(), version.version.clone());
        let mut fields = state.fields.get(&key).cloned().unwrap_or(MediaFields {
            has_blob_field: true,
            ..MediaFields::default()
        });

        if let Some(expected) = edit.expected_blob() {
            if fields.blob_id != Some(expected) {
                return Err(Error::conflict(format!(
                    "media field of {} no longer references blob {}",
                    version, expected
                )));
            }
        }

        if let Some(path) = edit.file_path() {
            fields.file_path = path.to_string();
        }

        let previous_blob = fields.blob_id;
        match edit.blob() {
            Some(BlobChange::Set(bytes)) => {
                if !fields.has_blob_field {
                    return Err(Error::invalid_input(format!(
                        "{} has no binary field",
                        version
                    )));
                }
                let blob_id = BlobId::new();
                state.blobs.insert(blob_id, bytes.clone());
                fields.blob_id = Some(blob_id);
            }
            Some(BlobChange::Clear) => fields.blob_id = None,
            None => {}
        }

        let current_blob = fields.blob_id;
        state.fields.insert(key, fields);
        if let Some(old) = previous_blob.filter(|old| Some(*old) != current_blob) {
            state.release_blob(old);
        }
        // The cache holds the content as it was before the edit.
        state.cache.remove(version);
        state
            .editors
            .insert(version.clone(), edit.principal().name().to_string());
        Ok(())
    }

    fn file_path_in_use(&self, path: &str) -> Result<bool> {
        Ok(self
            .state
            .read()
            .fields
            .values()
            .any(|fields| fields.file_path == path))
    }
}
