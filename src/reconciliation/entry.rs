use nix::unistd::{Gid, Group, Uid, User};
use std::fmt;
use std::os::unix::fs::MetadataExt;
use std::path::PathBuf;

/// Kind of entry found in a module's file tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Directory,
    Regular,
    Symlink,
    Template,
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryKind::Directory => write!(f, "directory"),
            EntryKind::Regular => write!(f, "file"),
            EntryKind::Symlink => write!(f, "symlink"),
            EntryKind::Template => write!(f, "template"),
        }
    }
}

/// Ownership, permission bits and timestamps of one path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attributes {
    pub uid: u32,
    pub gid: u32,
    /// Permission bits only (`0o7777`)
    pub mode: u32,
    pub mtime: i64,
}

impl Attributes {
    pub fn from_metadata(metadata: &std::fs::Metadata) -> Self {
        Self {
            uid: metadata.uid(),
            gid: metadata.gid(),
            mode: metadata.mode() & 0o7777,
            mtime: metadata.mtime(),
        }
    }
}

/// One entry of a module's file tree and where it lands
#[derive(Debug, Clone)]
pub struct FileTreeEntry {
    /// Path relative to the module's file tree root
    pub relative: PathBuf,
    pub source: PathBuf,
    /// Absolute destination, template marker stripped
    pub destination: PathBuf,
    pub kind: EntryKind,
    pub attributes: Attributes,
}

/// What happened to an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Create,
    Update,
    Skip,
}

#[derive(Debug, Clone)]
pub struct ReconciliationAction {
    pub destination: PathBuf,
    pub kind: EntryKind,
    pub verb: Verb,
    /// Uncoloured unified diff, when one was rendered
    pub diff: Option<String>,
}

/// Outcome of one file tree pass
#[derive(Debug, Clone, Default)]
pub struct FileSummary {
    pub actions: Vec<ReconciliationAction>,
    /// Entries skipped because of a recoverable error
    pub failures: Vec<(PathBuf, String)>,
}

impl FileSummary {
    pub fn count(&self, verb: Verb) -> usize {
        self.actions.iter().filter(|a| a.verb == verb).count()
    }

    /// Number of entries created or updated
    pub fn changes(&self) -> usize {
        self.count(Verb::Create) + self.count(Verb::Update)
    }
}

/// User name for a uid, or the number when it has no passwd entry
pub fn owner_name(uid: u32) -> String {
    match User::from_uid(Uid::from_raw(uid)) {
        Ok(Some(user)) => user.name,
        _ => uid.to_string(),
    }
}

/// Group name for a gid, or the number when it has no group entry
pub fn group_name(gid: u32) -> String {
    match Group::from_gid(Gid::from_raw(gid)) {
        Ok(Some(group)) => group.name,
        _ => gid.to_string(),
    }
}

pub fn mode_string(mode: u32) -> String {
    format!("{:04o}", mode)
}
