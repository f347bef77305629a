//! Access checks applied before a record is converted.

use std::collections::{HashMap, HashSet};

use mediashift_common::{AccessRight, Principal};

use crate::config::SecurityConfig;
use crate::repository::MediaItem;

/// Decides whether a principal holds a right on a record.
pub trait Authorizer: Send + Sync {
    fn is_allowed(&self, item: &MediaItem, right: AccessRight, principal: &Principal) -> bool;
}

/// Grants every right to everyone.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl Authorizer for AllowAll {
    fn is_allowed(&self, _item: &MediaItem, _right: AccessRight, _principal: &Principal) -> bool {
        true
    }
}

/// Rights assigned per principal name, with a fallback for everyone else.
#[derive(Debug, Clone, Default)]
pub struct RoleAuthorizer {
    default_rights: HashSet<AccessRight>,
    principals: HashMap<String, HashSet<AccessRight>>,
}

impl RoleAuthorizer {
    pub fn from_config(config: &SecurityConfig) -> Self {
        Self {
            default_rights: config.default_rights.iter().copied().collect(),
            principals: config
                .principals
                .iter()
                .map(|(name, rights)| (name.to_lowercase(), rights.iter().copied().collect()))
                .collect(),
        }
    }

    fn rights_of(&self, principal: &Principal) -> &HashSet<AccessRight> {
        self.principals
            .get(&principal.name().to_lowercase())
            .unwrap_or(&self.default_rights)
    }
}

impl Authorizer for RoleAuthorizer {
    fn is_allowed(&self, _item: &MediaItem, right: AccessRight, principal: &Principal) -> bool {
        self.rights_of(principal).contains(&right)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mediashift_common::{ItemId, MediaReference};

    fn item() -> MediaItem {
        MediaItem {
            reference: MediaReference::new(ItemId::new(), "master"),
            name: "logo".to_string(),
            extension: "png".to_string(),
            path: "/logo".to_string(),
            is_clone: false,
            shared_media: true,
        }
    }

    #[test]
    fn test_role_authorizer() {
        let mut config = SecurityConfig {
            default_rights: vec![AccessRight::Read],
            ..SecurityConfig::default()
        };
        config.principals.insert(
            "Sitecore\\Admin".to_string(),
            vec![AccessRight::Read, AccessRight::Write],
        );
        let authorizer = RoleAuthorizer::from_config(&config);
        let item = item();

        let admin = Principal::new("sitecore\\admin");
        assert!(authorizer.is_allowed(&item, AccessRight::Write, &admin));

        let guest = Principal::new("guest");
        assert!(authorizer.is_allowed(&item, AccessRight::Read, &guest));
        assert!(!authorizer.is_allowed(&item, AccessRight::Write, &guest));
    }

    #[test]
    fn test_allow_all() {
        assert!(AllowAll.is_allowed(&item(), AccessRight::Write, &Principal::new("anyone")));
    }
}
