//! Vault data model.
//!
//! Folder objects travel to the remote store unencrypted and carry only
//! GUIDs. Names and metadata live exclusively in the [`VaultIndex`], which
//! is stored as a single hybrid-encrypted blob.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use sealbox_crypto::CryptoProvider;

use crate::defaults::GUID_BYTES;
use crate::error::{Error, Result};

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Opaque identifier of a folder or file: 4 random bytes as 8 hex chars.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Guid(String);

impl Guid {
    /// Draw a random GUID.
    pub fn generate(provider: &dyn CryptoProvider) -> Result<Self> {
        let mut bytes = [0u8; GUID_BYTES];
        provider.fill_random(&mut bytes)?;
        Ok(Self(hex::encode(bytes)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Guid {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let valid = s.len() == GUID_BYTES * 2 && s.bytes().all(|b| b.is_ascii_hexdigit());
        if !valid {
            return Err(Error::InvalidInput(format!("Invalid GUID: {:?}", s)));
        }
        Ok(Self(s.to_ascii_lowercase()))
    }
}

impl TryFrom<String> for Guid {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<Guid> for String {
    fn from(guid: Guid) -> Self {
        guid.0
    }
}

// =============================================================================
// CONCURRENCY
// =============================================================================

/// Revision of a remote object. Starts at 1 and increases on every write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Revision(pub u64);

impl Revision {
    pub const INITIAL: Revision = Revision(1);

    pub fn next(self) -> Self {
        Revision(self.0 + 1)
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

/// A value read from the remote store with its revision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Versioned<T> {
    pub value: T,
    pub revision: Revision,
}

impl<T> Versioned<T> {
    pub fn new(value: T, revision: Revision) -> Self {
        Self { value, revision }
    }
}

/// Precondition on a remote write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteCondition {
    /// Overwrite whatever is there.
    Unconditional,
    /// Only create; fail if the object exists.
    IfAbsent,
    /// Only replace the given revision.
    IfRevision(Revision),
}

impl WriteCondition {
    /// Condition matching what was read: `IfRevision` for an existing
    /// object, `IfAbsent` otherwise.
    pub fn from_read(revision: Option<Revision>) -> Self {
        match revision {
            Some(rev) => Self::IfRevision(rev),
            None => Self::IfAbsent,
        }
    }

    /// Whether a write under this condition may replace `current`.
    pub fn permits(&self, current: Option<Revision>) -> bool {
        match self {
            Self::Unconditional => true,
            Self::IfAbsent => current.is_none(),
            Self::IfRevision(expected) => current == Some(*expected),
        }
    }
}

/// How the vault guards read-modify-write cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConcurrencyMode {
    /// Conditional writes; stale writes are re-read, re-applied and retried.
    #[default]
    Optimistic,
    /// Unconditional writes. Concurrent mutations can lose updates.
    LastWriterWins,
}

impl ConcurrencyMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Optimistic => "optimistic",
            Self::LastWriterWins => "last-writer-wins",
        }
    }
}

impl fmt::Display for ConcurrencyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConcurrencyMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "optimistic" => Ok(Self::Optimistic),
            "last-writer-wins" | "lww" => Ok(Self::LastWriterWins),
            _ => Err(Error::Config(format!("Unknown concurrency mode: {}", s))),
        }
    }
}

// =============================================================================
// REMOTE OBJECTS
// =============================================================================

/// Handle returned by the remote store for a namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultRoot {
    pub root_folder: Guid,
}

/// Per-namespace vault record. Immutable after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultManifest {
    pub namespace: String,
    pub root_folder: Guid,
    pub owner_fingerprint: String,
    pub created_at: DateTime<Utc>,
}

/// Folder object tag; always `"folder"` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FolderTag {
    #[default]
    Folder,
}

/// Unencrypted folder object: `{"type":"folder","id":GUID,"children":[GUID...]}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultFolder {
    #[serde(rename = "type", default)]
    pub tag: FolderTag,
    pub id: Guid,
    #[serde(default)]
    pub children: Vec<Guid>,
}

impl VaultFolder {
    pub fn new(id: Guid) -> Self {
        Self {
            tag: FolderTag::Folder,
            id,
            children: Vec::new(),
        }
    }

    pub fn contains(&self, guid: &Guid) -> bool {
        self.children.contains(guid)
    }

    /// Append a child unless already linked. Returns whether it was added.
    pub fn link(&mut self, guid: Guid) -> bool {
        if self.contains(&guid) {
            return false;
        }
        self.children.push(guid);
        true
    }

    /// Remove a child. Returns whether it was present.
    pub fn unlink(&mut self, guid: &Guid) -> bool {
        let before = self.children.len();
        self.children.retain(|c| c != guid);
        self.children.len() != before
    }
}

// =============================================================================
// INDEX
// =============================================================================

/// Kind of an index entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Folder,
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File => f.write_str("file"),
            Self::Folder => f.write_str("folder"),
        }
    }
}

/// Human-readable metadata of one GUID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub name: String,
    pub kind: EntryKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime: Option<String>,
    #[serde(rename = "parentGuid")]
    pub parent_guid: Guid,
}

impl IndexEntry {
    pub fn file(name: impl Into<String>, size: u64, mime: Option<String>, parent: Guid) -> Self {
        Self {
            name: name.into(),
            kind: EntryKind::File,
            size: Some(size),
            mime,
            parent_guid: parent,
        }
    }

    pub fn folder(name: impl Into<String>, parent: Guid) -> Self {
        Self {
            name: name.into(),
            kind: EntryKind::Folder,
            size: None,
            mime: None,
            parent_guid: parent,
        }
    }
}

/// GUID → metadata map. Encrypted and replaced wholesale on every change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VaultIndex {
    entries: BTreeMap<Guid, IndexEntry>,
}

impl VaultIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, guid: &Guid) -> Option<&IndexEntry> {
        self.entries.get(guid)
    }

    pub fn contains(&self, guid: &Guid) -> bool {
        self.entries.contains_key(guid)
    }

    /// Insert or replace an entry.
    pub fn insert(&mut self, guid: Guid, entry: IndexEntry) -> Option<IndexEntry> {
        self.entries.insert(guid, entry)
    }

    pub fn remove(&mut self, guid: &Guid) -> Option<IndexEntry> {
        self.entries.remove(guid)
    }

    /// Change an entry's name. Returns false if the GUID is unknown.
    pub fn rename(&mut self, guid: &Guid, name: &str) -> bool {
        match self.entries.get_mut(guid) {
            Some(entry) => {
                entry.name = name.to_string();
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Guid, &IndexEntry)> {
        self.entries.iter()
    }

    /// Entries whose `parentGuid` is `parent`.
    pub fn children_of<'a>(&'a self, parent: &'a Guid) -> impl Iterator<Item = (&'a Guid, &'a IndexEntry)> {
        self.entries
            .iter()
            .filter(move |(_, entry)| &entry.parent_guid == parent)
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

// =============================================================================
// SERVICE VIEWS
// =============================================================================

/// Lifecycle state of a vault session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VaultState {
    /// No identity key pair yet.
    NoKey,
    /// Identity present, vault not yet opened.
    Locked,
    /// Manifest and index loaded.
    Open,
}

impl fmt::Display for VaultState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoKey => f.write_str("no-key"),
            Self::Locked => f.write_str("locked"),
            Self::Open => f.write_str("open"),
        }
    }
}

/// One resolved child of a folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListedEntry {
    pub guid: Guid,
    #[serde(flatten)]
    pub entry: IndexEntry,
}

/// Result of listing a folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FolderListing {
    pub folder: Guid,
    pub entries: Vec<ListedEntry>,
    /// Linked children with no index entry.
    pub orphans: Vec<Guid>,
}

/// Consistency report between the folder graph and the index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AuditReport {
    /// GUIDs linked from a folder but absent from the index.
    pub unindexed: Vec<Guid>,
    /// Index entries not linked from their parent folder.
    pub unlinked: Vec<Guid>,
    /// Folders reachable from the root.
    pub folders_scanned: usize,
}

impl AuditReport {
    pub fn is_consistent(&self) -> bool {
        self.unindexed.is_empty() && self.unlinked.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sealbox_crypto::SoftwareProvider;

    fn guid(s: &str) -> Guid {
        s.parse().unwrap()
    }

    #[test]
    fn test_guid_generate_format() {
        let provider = SoftwareProvider::new();
        let g = Guid::generate(&provider).unwrap();
        assert_eq!(g.as_str().len(), 8);
        assert!(g.as_str().bytes().all(|b| b.is_ascii_hexdigit()));
        assert_eq!(g.as_str(), g.as_str().to_lowercase());
        assert_eq!(hex::decode(g.as_str()).unwrap().len(), GUID_BYTES);
        assert_eq!(g.as_str().parse::<Guid>().unwrap(), g);
    }

    #[test]
    fn test_guid_parse() {
        assert_eq!(guid("DEADBEEF").as_str(), "deadbeef");
        assert!("deadbee".parse::<Guid>().is_err());
        assert!("deadbeefa".parse::<Guid>().is_err());
        assert!("zzzzzzzz".parse::<Guid>().is_err());
    }

    #[test]
    fn test_guid_serde_validates() {
        assert_eq!(serde_json::to_string(&guid("0a1b2c3d")).unwrap(), "\"0a1b2c3d\"");
        assert!(serde_json::from_str::<Guid>("\"nope\"").is_err());
    }

    #[test]
    fn test_folder_wire_shape() {
        let mut folder = VaultFolder::new(guid("00000001"));
        folder.link(guid("0000000a"));
        assert_eq!(
            serde_json::to_string(&folder).unwrap(),
            r#"{"type":"folder","id":"00000001","children":["0000000a"]}"#
        );
    }

    #[test]
    fn test_folder_link_unlink() {
        let mut folder = VaultFolder::new(guid("00000001"));
        assert!(folder.link(guid("0000000a")));
        assert!(!folder.link(guid("0000000a")));
        assert!(folder.unlink(&guid("0000000a")));
        assert!(!folder.unlink(&guid("0000000a")));
        assert!(folder.children.is_empty());
    }

    #[test]
    fn test_index_entry_wire_shape() {
        let entry = IndexEntry::file("notes.txt", 11, None, guid("00000001"));
        assert_eq!(
            serde_json::to_string(&entry).unwrap(),
            r#"{"name":"notes.txt","kind":"file","size":11,"parentGuid":"00000001"}"#
        );
    }

    #[test]
    fn test_index_json_is_keyed_by_guid() {
        let mut index = VaultIndex::new();
        index.insert(guid("0000000b"), IndexEntry::folder("docs", guid("00000001")));
        let json: serde_json::Value = serde_json::from_slice(&index.to_json().unwrap()).unwrap();
        assert_eq!(json["0000000b"]["kind"], "folder");
        assert_eq!(VaultIndex::from_json(&index.to_json().unwrap()).unwrap(), index);
    }

    #[test]
    fn test_index_children_of() {
        let root = guid("00000001");
        let docs = guid("0000000b");
        let mut index = VaultIndex::new();
        index.insert(docs.clone(), IndexEntry::folder("docs", root.clone()));
        index.insert(guid("0000000c"), IndexEntry::file("a", 1, None, docs.clone()));
        index.insert(guid("0000000d"), IndexEntry::file("b", 1, None, root.clone()));

        assert_eq!(index.children_of(&root).count(), 2);
        assert_eq!(index.children_of(&docs).count(), 1);
    }

    #[test]
    fn test_index_rename() {
        let mut index = VaultIndex::new();
        let g = guid("0000000c");
        index.insert(g.clone(), IndexEntry::file("a", 1, None, guid("00000001")));
        assert!(index.rename(&g, "b"));
        assert_eq!(index.get(&g).unwrap().name, "b");
        assert!(!index.rename(&guid("0000000f"), "x"));
    }

    #[test]
    fn test_write_condition_permits() {
        let r1 = Revision::INITIAL;
        let r2 = r1.next();

        assert!(WriteCondition::Unconditional.permits(None));
        assert!(WriteCondition::Unconditional.permits(Some(r2)));
        assert!(WriteCondition::IfAbsent.permits(None));
        assert!(!WriteCondition::IfAbsent.permits(Some(r1)));
        assert!(WriteCondition::IfRevision(r1).permits(Some(r1)));
        assert!(!WriteCondition::IfRevision(r1).permits(Some(r2)));
        assert!(!WriteCondition::IfRevision(r1).permits(None));
        assert_eq!(WriteCondition::from_read(None), WriteCondition::IfAbsent);
    }

    #[test]
    fn test_concurrency_mode_parse() {
        assert_eq!(
            "optimistic".parse::<ConcurrencyMode>().unwrap(),
            ConcurrencyMode::Optimistic
        );
        assert_eq!(
            "Last-Writer-Wins".parse::<ConcurrencyMode>().unwrap(),
            ConcurrencyMode::LastWriterWins
        );
        assert!("pessimistic".parse::<ConcurrencyMode>().is_err());
        assert_eq!(ConcurrencyMode::default(), ConcurrencyMode::Optimistic);
    }

    #[test]
    fn test_vault_state_display() {
        assert_eq!(VaultState::NoKey.to_string(), "no-key");
        assert_eq!(VaultState::Open.to_string(), "open");
    }
}
