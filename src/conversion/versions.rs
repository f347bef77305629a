//! Resolution of the media units of a record.

use mediashift_common::{MediaVersion, Result};

use crate::repository::{ContentRepository, MediaItem};

/// The media units of a record that actually hold content.
///
/// A record with shared media has a single unit. Otherwise every version
/// with content is its own unit.
pub fn versions_with_media(
    repository: &dyn ContentRepository,
    item: &MediaItem,
) -> Result<Vec<MediaVersion>> {
    if item.shared_media {
        let unit = MediaVersion::shared(item.reference.clone());
        return Ok(if repository.has_media_content(&unit)? {
            vec![unit]
        } else {
            Vec::new()
        });
    }

    let mut units = Vec::new();
    for version in repository.versions(&item.reference)? {
        if repository.has_media_content(&version)? {
            units.push(version);
        }
    }
    Ok(units)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::MemoryRepository;
    use mediashift_common::VersionKey;
    use mediashift_db::queries::items::NewItem;

    #[test]
    fn test_shared_record_is_one_unit() {
        let repo = MemoryRepository::new();
        let reference = repo.create_item(&NewItem::new("master", "logo")).unwrap();
        repo.add_version(&reference, VersionKey::new("en", 1)).unwrap();
        repo.add_version(&reference, VersionKey::new("da", 1)).unwrap();
        let item = repo.get_item(&reference).unwrap().unwrap();

        assert!(versions_with_media(&repo, &item).unwrap().is_empty());

        repo.store_inline(&MediaVersion::shared(reference.clone()), b"x")
            .unwrap();
        assert_eq!(
            versions_with_media(&repo, &item).unwrap(),
            vec![MediaVersion::shared(reference)]
        );
    }

    #[test]
    fn test_versioned_record_keeps_versions_with_content() {
        let repo = MemoryRepository::new();
        let reference = repo
            .create_item(&NewItem::new("master", "brochure").versioned())
            .unwrap();
        let en1 = repo.add_version(&reference, VersionKey::new("en", 1)).unwrap();
        let en2 = repo.add_version(&reference, VersionKey::new("en", 2)).unwrap();
        let da1 = repo.add_version(&reference, VersionKey::new("da", 1)).unwrap();
        repo.store_inline(&en1, b"v1").unwrap();
        repo.store_external(&da1, "/media/da.pdf").unwrap();
        repo.store_external(&en2, "").unwrap();
        let item = repo.get_item(&reference).unwrap().unwrap();

        assert_eq!(versions_with_media(&repo, &item).unwrap(), vec![da1, en1]);
    }
}
