//! Core type definitions for media references, versions and conversions.
//!
//! Records live in a named storage space (a "database") of the content
//! repository and are addressed by [`MediaReference`]. Media content may be
//! shared by all versions of a record or held separately per version; a
//! [`MediaVersion`] addresses one such unit. Enums serialize in lowercase.

use crate::ids::ItemId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies one repository record: tree-unique id plus storage-space name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MediaReference {
    pub item_id: ItemId,
    pub database: String,
}

impl MediaReference {
    pub fn new(item_id: ItemId, database: impl Into<String>) -> Self {
        Self {
            item_id,
            database: database.into(),
        }
    }
}

impl fmt::Display for MediaReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{{{}}}", self.database, self.item_id)
    }
}

/// Language and version number of one revision of a record.
///
/// The empty language with number 0 denotes the shared media unit of a
/// record whose binary field is shared across all versions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VersionKey {
    pub language: String,
    pub number: u32,
}

impl VersionKey {
    pub fn new(language: impl Into<String>, number: u32) -> Self {
        Self {
            language: language.into(),
            number,
        }
    }

    /// Key of the single media unit of a shared record.
    pub fn shared() -> Self {
        Self {
            language: String::new(),
            number: 0,
        }
    }

    pub fn is_shared(&self) -> bool {
        self.language.is_empty() && self.number == 0
    }
}

impl fmt::Display for VersionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_shared() {
            write!(f, "shared")
        } else {
            write!(f, "{}#{}", self.language, self.number)
        }
    }
}

/// One unit of media content: a record plus the version carrying the media.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MediaVersion {
    pub reference: MediaReference,
    pub version: VersionKey,
}

impl MediaVersion {
    pub fn new(reference: MediaReference, version: VersionKey) -> Self {
        Self { reference, version }
    }

    /// The shared media unit of a record.
    pub fn shared(reference: MediaReference) -> Self {
        Self {
            reference,
            version: VersionKey::shared(),
        }
    }

    pub fn is_shared(&self) -> bool {
        self.version.is_shared()
    }

    pub fn item_id(&self) -> ItemId {
        self.reference.item_id
    }
}

impl fmt::Display for MediaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_shared() {
            write!(f, "{}", self.reference)
        } else {
            write!(
                f,
                "{}?lang={}&ver={}",
                self.reference, self.version.language, self.version.number
            )
        }
    }
}

/// Target representation of a conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversionDirection {
    /// Move inline binary content out to a file on the filesystem.
    #[serde(rename = "external")]
    ToExternal,
    /// Move file content into the record's binary field.
    #[serde(rename = "inline")]
    ToInline,
}

impl fmt::Display for ConversionDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ToExternal => write!(f, "external"),
            Self::ToInline => write!(f, "inline"),
        }
    }
}

impl std::str::FromStr for ConversionDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "external" | "file" | "files" => Ok(Self::ToExternal),
            "inline" | "blob" | "database" => Ok(Self::ToInline),
            _ => Err(format!("Invalid conversion direction: {}", s)),
        }
    }
}

/// Access right checked against a record before converting it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessRight {
    Read,
    Write,
}

impl fmt::Display for AccessRight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read => write!(f, "read"),
            Self::Write => write!(f, "write"),
        }
    }
}

/// The account on whose behalf a conversion (and its cleanup) runs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Principal(String);

impl Principal {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
