//! Directory walk deriving symbolic names from a loader's roots.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

use autoload_core::inflector::{is_valid_segment, Inflector};

use super::error::Result;

/// Separator between the segments of a symbolic name.
pub const SEPARATOR: &str = "::";

/// What a symbolic name maps to on disk.
#[derive(Debug, Clone, Default)]
pub(super) struct Entry {
    /// Explicit definition file. Takes precedence over `dirs`.
    pub file: Option<PathBuf>,
    /// Directories contributing to the namespace, in root order.
    pub dirs: Vec<PathBuf>,
    pub eager: bool,
}

/// Symbolic name → entry, ordered so parents come before their children.
pub(super) type Index = BTreeMap<String, Entry>;

/// Inputs of one scan.
pub(super) struct ScanPlan<'a> {
    pub roots: &'a [PathBuf],
    pub ignored: &'a HashSet<PathBuf>,
    pub not_eager: &'a [PathBuf],
    pub extensions: &'a [String],
    pub inflector: &'a Inflector,
}

impl ScanPlan<'_> {
    /// Walk every root and build the name index.
    ///
    /// Hidden entries, ignored paths and nested roots are skipped. A root that
    /// cannot be read fails the scan; unreadable entries below it are logged
    /// and skipped.
    pub fn scan(&self) -> Result<Index> {
        let mut index = Index::new();
        for root in self.roots {
            self.scan_root(root, &mut index)?;
        }
        prune_empty_namespaces(&mut index);
        Ok(index)
    }

    fn scan_root(&self, root: &Path, index: &mut Index) -> Result<()> {
        // Directory path → symbolic name of the namespace it defines.
        let mut namespaces: HashMap<PathBuf, String> = HashMap::new();

        let mut walker = WalkDir::new(root)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter();

        while let Some(next) = walker.next() {
            let entry = match next {
                Ok(entry) => entry,
                Err(e) if e.depth() == 0 => return Err(e.into()),
                Err(e) => {
                    warn!(root = %root.display(), error = %e, "failed to read entry, skipping");
                    continue;
                }
            };

            let path = entry.path();
            let is_dir = entry.file_type().is_dir();

            if self.skip(path, is_dir) {
                if is_dir {
                    walker.skip_current_dir();
                }
                continue;
            }

            let Some(basename) = self.basename(path, is_dir) else {
                continue;
            };

            let segment = self.inflector.camelize(basename, path);
            if !is_valid_segment(&segment) {
                warn!(path = %path.display(), segment = %segment, "path does not map to a valid name, skipping");
                if is_dir {
                    walker.skip_current_dir();
                }
                continue;
            }

            let name = match path.parent().and_then(|p| namespaces.get(p)) {
                Some(parent) => format!("{parent}{SEPARATOR}{segment}"),
                None => segment,
            };
            let eager = self.is_eager(path);
            let slot = index.entry(name.clone()).or_default();
            slot.eager |= eager;

            if is_dir {
                slot.dirs.push(path.to_path_buf());
                namespaces.insert(path.to_path_buf(), name);
            } else if let Some(existing) = &slot.file {
                warn!(
                    name = %name,
                    path = %path.display(),
                    defined_in = %existing.display(),
                    "shadowed file ignored"
                );
            } else {
                slot.file = Some(path.to_path_buf());
            }
        }

        Ok(())
    }

    fn skip(&self, path: &Path, is_dir: bool) -> bool {
        let hidden = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.starts_with('.'))
            .unwrap_or(true);
        if hidden || self.ignored.contains(path) {
            return true;
        }
        // Nested roots are scanned as roots of their own.
        is_dir && self.roots.iter().any(|r| r == path)
    }

    fn basename<'p>(&self, path: &'p Path, is_dir: bool) -> Option<&'p str> {
        if is_dir {
            return path.file_name().and_then(|n| n.to_str());
        }
        let loadable = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| self.extensions.iter().any(|x| x == e))
            .unwrap_or(false);
        if !loadable {
            debug!(path = %path.display(), "not a loadable extension, skipping");
            return None;
        }
        path.file_stem().and_then(|s| s.to_str())
    }

    fn is_eager(&self, path: &Path) -> bool {
        !self.not_eager.iter().any(|lazy| path.starts_with(lazy))
    }
}

/// Drop namespaces with no definition file at any depth.
fn prune_empty_namespaces(index: &mut Index) {
    let mut live: HashSet<String> = HashSet::new();
    for (name, entry) in index.iter() {
        if entry.file.is_none() {
            continue;
        }
        let mut current = name.as_str();
        live.insert(current.to_string());
        while let Some((parent, _)) = current.rsplit_once(SEPARATOR) {
            live.insert(parent.to_string());
            current = parent;
        }
    }
    index.retain(|name, _| live.contains(name));
}

/// Parent of a symbolic name, if it is nested.
pub(super) fn parent_name(name: &str) -> Option<&str> {
    name.rsplit_once(SEPARATOR).map(|(parent, _)| parent)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "value: 1\n").unwrap();
    }

    fn scan(roots: &[PathBuf], not_eager: &[PathBuf], inflector: &Inflector) -> Index {
        let ignored = HashSet::new();
        let extensions = vec!["yml".to_string()];
        ScanPlan {
            roots,
            ignored: &ignored,
            not_eager,
            extensions: &extensions,
            inflector,
        }
        .scan()
        .unwrap()
    }

    #[test]
    fn nested_directories_become_namespaces() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "user.yml");
        touch(tmp.path(), "admin/role_grant.yml");
        touch(tmp.path(), "admin/audit/entry.yml");

        let index = scan(&[tmp.path().to_path_buf()], &[], &Inflector::new());
        let names: Vec<&str> = index.keys().map(String::as_str).collect();
        assert_eq!(
            names,
            vec!["Admin", "Admin::Audit", "Admin::Audit::Entry", "Admin::RoleGrant", "User"]
        );
        assert!(index["Admin"].file.is_none());
        assert_eq!(index["Admin"].dirs, vec![tmp.path().join("admin")]);
    }

    #[test]
    fn file_defines_namespace_when_both_exist() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "admin.yml");
        touch(tmp.path(), "admin/user.yml");

        let index = scan(&[tmp.path().to_path_buf()], &[], &Inflector::new());
        let admin = &index["Admin"];
        assert_eq!(admin.file.as_deref(), Some(tmp.path().join("admin.yml").as_path()));
        assert_eq!(admin.dirs.len(), 1);
        assert!(index.contains_key("Admin::User"));
    }

    #[test]
    fn skips_hidden_foreign_extensions_and_empty_dirs() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), ".secret.yml");
        touch(tmp.path(), ".git/config.yml");
        fs::write(tmp.path().join("notes.txt"), "x").unwrap();
        fs::create_dir_all(tmp.path().join("empty/deeper")).unwrap();
        touch(tmp.path(), "2fa.yml");
        touch(tmp.path(), "user.yml");

        let index = scan(&[tmp.path().to_path_buf()], &[], &Inflector::new());
        let names: Vec<&str> = index.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["User"]);
    }

    #[test]
    fn first_root_wins_and_nested_roots_are_skipped() {
        let tmp = TempDir::new().unwrap();
        let first = tmp.path().join("models");
        let second = tmp.path().join("concerns");
        let nested = first.join("concerns");
        touch(&first, "user.yml");
        touch(&second, "user.yml");
        touch(&nested, "taggable.yml");

        let roots = vec![first.clone(), second, nested.clone()];
        let index = scan(&roots, &[], &Inflector::new());

        assert_eq!(index["User"].file.as_deref(), Some(first.join("user.yml").as_path()));
        // Defined at the top level by the nested root, not as Concerns::Taggable.
        assert!(index.contains_key("Taggable"));
        assert!(!index.contains_key("Concerns"));
    }

    #[test]
    fn overrides_apply_to_segments() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "handlers/html_erb.yml");

        let mut inflector = Inflector::new();
        inflector.inflect([("html_erb", "HTMLERB")]).unwrap();
        let index = scan(&[tmp.path().to_path_buf()], &[], &inflector);
        assert!(index.contains_key("Handlers::HTMLERB"));
        assert!(!index.contains_key("Handlers::HtmlErb"));
    }

    #[test]
    fn not_eager_marks_subtree_lazy() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "user.yml");
        touch(tmp.path(), "reports/daily.yml");

        let lazy = vec![tmp.path().join("reports")];
        let index = scan(&[tmp.path().to_path_buf()], &lazy, &Inflector::new());
        assert!(index["User"].eager);
        assert!(!index["Reports"].eager);
        assert!(!index["Reports::Daily"].eager);
    }

    #[test]
    fn parent_of_nested_name() {
        assert_eq!(parent_name("Admin::Audit::Entry"), Some("Admin::Audit"));
        assert_eq!(parent_name("User"), None);
    }
}
