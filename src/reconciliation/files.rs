use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tokio::fs;
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

use super::apply::{apply_attributes, copy_entry, create_directory};
use super::entry::{
    group_name, mode_string, owner_name, Attributes, EntryKind, FileSummary, FileTreeEntry,
    ReconciliationAction, Verb,
};
use super::FileError;
use crate::report::{render_diff, Reporter};
use crate::template::{TemplateContext, TemplateEngine, TemplateError};
use crate::utils::{compute_file_hash, destination_path, strip_template_suffix};

/// How a destination directory was found when the walk entered it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DirectoryState {
    Existing,
    Created,
    /// Reached through a symlink; the link target's metadata is left alone
    Linked,
}

/// Directory entered during the walk, finished once its children are done
struct OpenDirectory {
    entry: FileTreeEntry,
    depth: usize,
    state: DirectoryState,
}

/// Converges one module's file tree onto a destination root
pub struct FileReconciler<'a> {
    engine: &'a TemplateEngine,
    context: &'a TemplateContext,
    template_suffix: &'a str,
    reporter: &'a mut Reporter,
    staging_dir: PathBuf,
    summary: FileSummary,
}

impl<'a> FileReconciler<'a> {
    pub fn new(
        engine: &'a TemplateEngine,
        context: &'a TemplateContext,
        template_suffix: &'a str,
        reporter: &'a mut Reporter,
    ) -> Self {
        Self {
            engine,
            context,
            template_suffix,
            reporter,
            staging_dir: std::env::temp_dir(),
            summary: FileSummary::default(),
        }
    }

    /// Directory rendered templates are staged in before being copied
    pub fn with_staging_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.staging_dir = dir.into();
        self
    }

    /// Walk `tree_root` depth first and converge every entry under
    /// `destination_root`.
    ///
    /// Directories are created on the way down and their own attributes are
    /// compared on the way back up, after all of their children. Only an
    /// undefined template variable stops the walk; every other problem skips
    /// the entry and is reported.
    pub async fn converge(
        mut self,
        tree_root: &Path,
        destination_root: &Path,
    ) -> Result<FileSummary, FileError> {
        if !tree_root.is_dir() {
            debug!(root = %tree_root.display(), "No file tree, nothing to converge");
            return Ok(self.summary);
        }

        let mut open: Vec<OpenDirectory> = Vec::new();
        let mut walker = WalkDir::new(tree_root)
            .min_depth(1)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter();

        while let Some(item) = walker.next() {
            let dirent = match item {
                Ok(dirent) => dirent,
                Err(e) => {
                    let path = e.path().map(Path::to_path_buf).unwrap_or_default();
                    self.fail(&path, &e.to_string());
                    continue;
                }
            };

            while open.last().is_some_and(|dir| dir.depth >= dirent.depth()) {
                if let Some(dir) = open.pop() {
                    self.finish_directory(dir).await;
                }
            }

            let Some(entry) = self.classify(&dirent, tree_root, destination_root) else {
                if dirent.file_type().is_dir() {
                    walker.skip_current_dir();
                }
                continue;
            };

            if entry.kind == EntryKind::Directory {
                match self.enter_directory(&entry).await {
                    Some(state) => open.push(OpenDirectory {
                        entry,
                        depth: dirent.depth(),
                        state,
                    }),
                    None => walker.skip_current_dir(),
                }
            } else {
                self.converge_entry(&entry).await?;
            }
        }

        while let Some(dir) = open.pop() {
            self.finish_directory(dir).await;
        }

        Ok(self.summary)
    }

    /// Build the tree entry for a walked path, or report why it is skipped
    fn classify(
        &mut self,
        dirent: &DirEntry,
        tree_root: &Path,
        destination_root: &Path,
    ) -> Option<FileTreeEntry> {
        let source = dirent.path().to_path_buf();
        let metadata = match dirent.metadata() {
            Ok(metadata) => metadata,
            Err(e) => {
                self.fail(&source, &e.to_string());
                return None;
            }
        };

        let file_type = dirent.file_type();
        let name = dirent.file_name().to_string_lossy().to_string();
        let stem = strip_template_suffix(&name, self.template_suffix);
        let mut destination = destination_path(tree_root, &source, destination_root);

        let kind = if file_type.is_symlink() {
            EntryKind::Symlink
        } else if file_type.is_dir() {
            if stem.is_some() {
                let message = format!(
                    "template marker on directory {}, skipped",
                    source.display()
                );
                self.fail(&source, &message);
                return None;
            }
            EntryKind::Directory
        } else if !file_type.is_file() {
            let message = format!("{} is not a regular file, skipped", source.display());
            self.fail(&source, &message);
            return None;
        } else if let Some(stem) = stem {
            destination.set_file_name(stem);
            EntryKind::Template
        } else {
            EntryKind::Regular
        };

        Some(FileTreeEntry {
            relative: source
                .strip_prefix(tree_root)
                .map(Path::to_path_buf)
                .unwrap_or_default(),
            source,
            destination,
            kind,
            attributes: Attributes::from_metadata(&metadata),
        })
    }

    /// Make sure the destination directory exists. None means the subtree
    /// must be skipped.
    async fn enter_directory(&mut self, entry: &FileTreeEntry) -> Option<DirectoryState> {
        match fs::symlink_metadata(&entry.destination).await {
            Ok(metadata) if metadata.is_dir() => Some(DirectoryState::Existing),
            Ok(metadata) => {
                let linked_dir = metadata.file_type().is_symlink()
                    && fs::metadata(&entry.destination)
                        .await
                        .is_ok_and(|target| target.is_dir());
                if linked_dir {
                    debug!(path = %entry.destination.display(), "Directory reached through a symlink");
                    return Some(DirectoryState::Linked);
                }
                let message = format!(
                    "{} exists and is not a directory",
                    entry.destination.display()
                );
                self.fail(&entry.destination, &message);
                None
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                self.reporter
                    .created(&format!("directory {}", entry.destination.display()));
                if let Err(e) = create_directory(&entry.destination, &entry.attributes).await {
                    self.fail(&entry.destination, &e.to_string());
                    return None;
                }
                self.record(entry, Verb::Create, None);
                Some(DirectoryState::Created)
            }
            Err(e) => {
                self.fail(&entry.destination, &e.to_string());
                None
            }
        }
    }

    /// Compare a directory's own attributes once its children are done
    async fn finish_directory(&mut self, dir: OpenDirectory) {
        let entry = dir.entry;
        match dir.state {
            DirectoryState::Created => return,
            DirectoryState::Linked => {
                self.record(&entry, Verb::Skip, None);
                return;
            }
            DirectoryState::Existing => {}
        }

        let current = match fs::symlink_metadata(&entry.destination).await {
            Ok(metadata) => Attributes::from_metadata(&metadata),
            Err(e) => {
                self.fail(&entry.destination, &e.to_string());
                return;
            }
        };

        if !self.attributes_differ(&entry, &current) {
            self.record(&entry, Verb::Skip, None);
            return;
        }

        self.reporter
            .updated(&format!("directory {}", entry.destination.display()));
        self.report_attribute_changes(&entry, &current);

        match apply_attributes(&entry.destination, &entry.attributes).await {
            Ok(()) => self.record(&entry, Verb::Update, None),
            Err(e) => self.fail(&entry.destination, &e.to_string()),
        }
    }

    /// Converge a regular file, symlink or template
    async fn converge_entry(&mut self, entry: &FileTreeEntry) -> Result<(), FileError> {
        // Dropped on every return path, taking the staging file with it
        let staging = match entry.kind {
            EntryKind::Template => match self.render_to_staging(entry).await? {
                Some(staging) => Some(staging),
                None => return Ok(()),
            },
            _ => None,
        };
        let content_source: &Path = match &staging {
            Some(file) => file.path(),
            None => &entry.source,
        };

        let current = match fs::symlink_metadata(&entry.destination).await {
            Ok(metadata) => Some(metadata),
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => {
                self.fail(&entry.destination, &e.to_string());
                return Ok(());
            }
        };

        let (verb, diff) = match current {
            None => {
                self.reporter.created(&format!(
                    "{} {}",
                    entry.kind,
                    entry.destination.display()
                ));
                (Verb::Create, None)
            }
            Some(metadata) => {
                let current_attributes = Attributes::from_metadata(&metadata);
                let content_changed = self
                    .content_differs(entry, content_source, metadata.file_type().is_symlink())
                    .await;

                if !content_changed && !self.attributes_differ(entry, &current_attributes) {
                    self.record(entry, Verb::Skip, None);
                    return Ok(());
                }

                self.reporter.updated(&format!(
                    "{} {}",
                    entry.kind,
                    entry.destination.display()
                ));
                self.report_attribute_changes(entry, &current_attributes);
                let diff = if content_changed {
                    self.report_diff(entry, content_source).await
                } else {
                    None
                };
                (Verb::Update, diff)
            }
        };

        match copy_entry(content_source, &entry.destination, entry.kind, &entry.attributes).await
        {
            Ok(()) => self.record(entry, verb, diff),
            Err(e) => self.fail(&entry.destination, &e.to_string()),
        }
        Ok(())
    }

    /// Render a template into a staging file carrying the source's mode and
    /// ownership. None means the file was skipped after a recoverable error.
    async fn render_to_staging(
        &mut self,
        entry: &FileTreeEntry,
    ) -> Result<Option<NamedTempFile>, FileError> {
        let content = match fs::read_to_string(&entry.source).await {
            Ok(content) => content,
            Err(e) => {
                self.fail(&entry.source, &e.to_string());
                return Ok(None);
            }
        };

        let rendered = match self.engine.render(&content, self.context) {
            Ok(rendered) => rendered,
            Err(e @ TemplateError::UndefinedVariable(_)) => {
                self.reporter.error(&format!("{}: {}", entry.source.display(), e));
                return Err(FileError::UndefinedVariable {
                    path: entry.source.display().to_string(),
                    source: e,
                });
            }
            Err(e) => {
                self.fail(&entry.source, &e.to_string());
                return Ok(None);
            }
        };

        match write_staging(&self.staging_dir, &rendered, &entry.attributes) {
            Ok(staging) => Ok(Some(staging)),
            Err(e) => {
                self.fail(&entry.source, &format!("staging file: {}", e));
                Ok(None)
            }
        }
    }

    async fn content_differs(
        &self,
        entry: &FileTreeEntry,
        content_source: &Path,
        destination_is_symlink: bool,
    ) -> bool {
        if entry.kind == EntryKind::Symlink {
            if !destination_is_symlink {
                return true;
            }
            let wanted = fs::read_link(content_source).await.ok();
            let current = fs::read_link(&entry.destination).await.ok();
            return wanted.is_none() || wanted != current;
        }

        if destination_is_symlink {
            return true;
        }
        match (
            compute_file_hash(content_source).await,
            compute_file_hash(&entry.destination).await,
        ) {
            (Ok(wanted), Ok(current)) => wanted != current,
            _ => true,
        }
    }

    /// Owner, group and mode comparison. Symlinks carry no mode of their own.
    fn attributes_differ(&self, entry: &FileTreeEntry, current: &Attributes) -> bool {
        let wanted = &entry.attributes;
        wanted.uid != current.uid
            || wanted.gid != current.gid
            || (entry.kind != EntryKind::Symlink && wanted.mode != current.mode)
    }

    fn report_attribute_changes(&mut self, entry: &FileTreeEntry, current: &Attributes) {
        let wanted = &entry.attributes;
        if wanted.uid != current.uid {
            self.reporter
                .attribute_change("owner", &owner_name(current.uid), &owner_name(wanted.uid));
        }
        if wanted.gid != current.gid {
            self.reporter
                .attribute_change("group", &group_name(current.gid), &group_name(wanted.gid));
        }
        if entry.kind != EntryKind::Symlink && wanted.mode != current.mode {
            self.reporter
                .attribute_change("mode", &mode_string(current.mode), &mode_string(wanted.mode));
        }
    }

    /// Print the unified diff when both sides are text; silent otherwise
    async fn report_diff(&mut self, entry: &FileTreeEntry, content_source: &Path) -> Option<String> {
        let (old, new) = match entry.kind {
            EntryKind::Symlink => (
                link_text(&entry.destination).await?,
                link_text(content_source).await?,
            ),
            _ => (
                read_text(&entry.destination).await?,
                read_text(content_source).await?,
            ),
        };
        self.reporter.diff(&old, &new);
        Some(render_diff(&old, &new, false).join("\n"))
    }

    fn record(&mut self, entry: &FileTreeEntry, verb: Verb, diff: Option<String>) {
        debug!(path = %entry.destination.display(), kind = %entry.kind, ?verb, "Entry converged");
        self.summary.actions.push(ReconciliationAction {
            destination: entry.destination.clone(),
            kind: entry.kind,
            verb,
            diff,
        });
    }

    fn fail(&mut self, path: &Path, message: &str) {
        warn!(path = %path.display(), "{}", message);
        self.reporter.warning(message);
        self.summary
            .failures
            .push((PathBuf::from(path), message.to_string()));
    }
}

fn write_staging(
    dir: &Path,
    rendered: &str,
    attributes: &Attributes,
) -> io::Result<NamedTempFile> {
    use std::io::Write;

    let mut staging = NamedTempFile::new_in(dir)?;
    staging.write_all(rendered.as_bytes())?;
    staging.flush()?;
    let file = staging.as_file();
    file.set_permissions(std::fs::Permissions::from_mode(attributes.mode))?;
    std::os::unix::fs::fchown(file, Some(attributes.uid), Some(attributes.gid))?;
    Ok(staging)
}

async fn read_text(path: &Path) -> Option<String> {
    let bytes = fs::read(path).await.ok()?;
    String::from_utf8(bytes).ok()
}

async fn link_text(path: &Path) -> Option<String> {
    let target = fs::read_link(path).await.ok()?;
    target.to_str().map(|t| format!("{}\n", t))
}

/// Converge `tree_root` onto `destination_root` with a fresh reconciler
pub async fn converge_files(
    tree_root: &Path,
    destination_root: &Path,
    engine: &TemplateEngine,
    context: &TemplateContext,
    template_suffix: &str,
    reporter: &mut Reporter,
) -> Result<FileSummary, FileError> {
    FileReconciler::new(engine, context, template_suffix, reporter)
        .converge(tree_root, destination_root)
        .await
}
