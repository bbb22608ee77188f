mod hash;

pub use hash::{compute_file_hash, compute_hash};

use std::path::{Path, PathBuf};

/// Default filename suffix marking a file as a template
pub const DEFAULT_TEMPLATE_SUFFIX: &str = ".hbs";

/// Default name of the desired-state document inside a module
pub const DEFAULT_STATE_FILE: &str = "state.yaml";

/// Default name of the file tree inside a module
pub const DEFAULT_FILES_DIR: &str = "files";

/// Map a path inside a module's file tree onto the destination root.
///
/// The mapping is purely structural: the tree root is stripped and the
/// remainder is joined onto `destination_root`.
pub fn destination_path(tree_root: &Path, source: &Path, destination_root: &Path) -> PathBuf {
    match source.strip_prefix(tree_root) {
        Ok(relative) => destination_root.join(relative),
        Err(_) => destination_root.to_path_buf(),
    }
}

/// Strip the template suffix from a file name, if present
pub fn strip_template_suffix<'a>(name: &'a str, suffix: &str) -> Option<&'a str> {
    if suffix.is_empty() {
        return None;
    }
    name.strip_suffix(suffix).filter(|stem| !stem.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_destination_path_mirrors_hierarchy() {
        let dest = destination_path(
            Path::new("/modules/web/files"),
            Path::new("/modules/web/files/etc/nginx/nginx.conf"),
            Path::new("/"),
        );
        assert_eq!(dest, Path::new("/etc/nginx/nginx.conf"));
    }

    #[test]
    fn test_destination_path_root_maps_to_root() {
        let dest = destination_path(
            Path::new("/modules/web/files"),
            Path::new("/modules/web/files"),
            Path::new("/srv/root"),
        );
        assert_eq!(dest, Path::new("/srv/root"));
    }

    #[test]
    fn test_strip_template_suffix() {
        assert_eq!(strip_template_suffix("motd.hbs", ".hbs"), Some("motd"));
        assert_eq!(strip_template_suffix("motd", ".hbs"), None);
        assert_eq!(strip_template_suffix(".hbs", ".hbs"), None);
        assert_eq!(strip_template_suffix("motd.hbs", ""), None);
    }
}
