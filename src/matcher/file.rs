//! File set resolution: which files under the roots a run touches.

use crate::error::{PatchError, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::collections::HashSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

/// Predicates for selecting the files of a run.
#[derive(Debug, Default, Clone)]
pub struct FileMatcher {
    extensions: Vec<String>,
    include_globs: Vec<String>,
    exclude_globs: Vec<String>,
}

impl FileMatcher {
    /// Creates a matcher that accepts every regular file.
    pub fn new() -> Self {
        Self::default()
    }

    /// Matches files with the given extension (a leading dot is ignored).
    pub fn extension(mut self, ext: impl Into<String>) -> Self {
        self.extensions.push(normalize_extension(ext.into()));
        self
    }

    /// Matches files with any of the given extensions.
    pub fn extensions(mut self, exts: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.extensions
            .extend(exts.into_iter().map(|e| normalize_extension(e.into())));
        self
    }

    /// Includes only files whose root-relative path matches the glob.
    pub fn include(mut self, pattern: impl Into<String>) -> Self {
        self.include_globs.push(pattern.into());
        self
    }

    /// Excludes files (and whole directories) matching the glob.
    pub fn exclude(mut self, pattern: impl Into<String>) -> Self {
        self.exclude_globs.push(pattern.into());
        self
    }

    /// Resolves the roots into a lazy, deterministic file sequence.
    ///
    /// Roots that do not exist are recorded in [`FileSet::missing_roots`]
    /// and contribute nothing. A root that exists but cannot be listed is a
    /// configuration error, as is an invalid glob.
    pub fn resolve(&self, roots: &[PathBuf]) -> Result<FileSet> {
        let filter = Arc::new(Filter {
            extensions: self.extensions.clone(),
            include: build_glob_set(&self.include_globs)?,
            exclude: build_glob_set(&self.exclude_globs)?,
        });

        let mut present = Vec::new();
        let mut missing = Vec::new();

        for root in roots {
            let root = std::path::absolute(root).map_err(|e| PatchError::file_io(root, e))?;
            match fs::metadata(&root) {
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    warn!(root = %root.display(), "root does not exist, nothing to process");
                    missing.push(root);
                }
                Err(e) => {
                    return Err(PatchError::Config(format!(
                        "cannot read root {}: {e}",
                        root.display()
                    )));
                }
                Ok(meta) => {
                    if meta.is_dir() {
                        fs::read_dir(&root).map_err(|e| {
                            PatchError::Config(format!(
                                "cannot list root {}: {e}",
                                root.display()
                            ))
                        })?;
                    }
                    present.push(root);
                }
            }
        }

        Ok(FileSet {
            roots: present.into_iter(),
            current: None,
            filter,
            seen: HashSet::new(),
            missing,
        })
    }

    /// Collects every matching file under a single root.
    pub fn collect(&self, root: &Path) -> Result<Vec<PathBuf>> {
        self.resolve(&[root.to_path_buf()])?.collect()
    }
}

fn normalize_extension(ext: String) -> String {
    ext.trim_start_matches('.').to_string()
}

fn build_glob_set(patterns: &[String]) -> Result<Option<GlobSet>> {
    if patterns.is_empty() {
        return Ok(None);
    }
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(Some(builder.build()?))
}

#[derive(Debug)]
struct Filter {
    extensions: Vec<String>,
    include: Option<GlobSet>,
    exclude: Option<GlobSet>,
}

impl Filter {
    fn accepts(&self, base: &Path, path: &Path) -> bool {
        if !self.extensions.is_empty() {
            let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
            if !self.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)) {
                return false;
            }
        }

        let rel_path = path.strip_prefix(base).unwrap_or(path);

        if let Some(include) = &self.include
            && !include.is_match(rel_path)
        {
            return false;
        }

        !self.is_excluded(rel_path)
    }

    fn is_excluded(&self, rel_path: &Path) -> bool {
        self.exclude
            .as_ref()
            .is_some_and(|exclude| exclude.is_match(rel_path))
    }
}

type Walker = Box<dyn Iterator<Item = walkdir::Result<DirEntry>>>;

/// The walk of one root: paths are matched relative to `base`.
struct Walk {
    root: PathBuf,
    base: PathBuf,
    walker: Walker,
}

/// A lazy sequence of absolute file paths, in walk order.
///
/// Each root is walked depth-first with directory entries sorted by file
/// name, so repeated runs see the same order. A path reachable from more
/// than one root is yielded once.
pub struct FileSet {
    roots: std::vec::IntoIter<PathBuf>,
    current: Option<Walk>,
    filter: Arc<Filter>,
    seen: HashSet<PathBuf>,
    missing: Vec<PathBuf>,
}

impl FileSet {
    /// Roots that did not exist when the set was resolved.
    pub fn missing_roots(&self) -> &[PathBuf] {
        &self.missing
    }

    /// The root currently being walked.
    pub fn current_root(&self) -> Option<&Path> {
        self.current.as_ref().map(|walk| walk.root.as_path())
    }

    fn open(&self, root: PathBuf) -> Walk {
        let base = if root.is_dir() {
            root.clone()
        } else {
            root.parent().map(Path::to_path_buf).unwrap_or_default()
        };
        let filter = Arc::clone(&self.filter);
        let prune_base = base.clone();
        let walker = WalkDir::new(&root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(move |entry| {
                if entry.depth() == 0 || !entry.file_type().is_dir() {
                    return true;
                }
                let rel = entry.path().strip_prefix(&prune_base).unwrap_or(entry.path());
                let pruned = filter.is_excluded(rel);
                if pruned {
                    debug!(dir = %entry.path().display(), "skipping excluded directory");
                }
                !pruned
            });
        Walk {
            root,
            base,
            walker: Box::new(walker),
        }
    }
}

impl Iterator for FileSet {
    type Item = Result<PathBuf>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(walk) = &mut self.current {
                match walk.walker.next() {
                    Some(Ok(entry)) => {
                        if !entry.file_type().is_file() {
                            continue;
                        }
                        let path = entry.into_path();
                        if !self.filter.accepts(&walk.base, &path) || !self.seen.insert(path.clone()) {
                            continue;
                        }
                        return Some(Ok(path));
                    }
                    Some(Err(err)) => return Some(Err(err.into())),
                    None => self.current = None,
                }
            } else {
                let root = self.roots.next()?;
                self.current = Some(self.open(root));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::TempDir;

    fn create_test_files(dir: &Path) {
        fs::create_dir_all(dir.join("src/game")).unwrap();
        fs::create_dir_all(dir.join("target/classes")).unwrap();

        File::create(dir.join("src/Main.java"))
            .unwrap()
            .write_all(b"class Main {}")
            .unwrap();

        File::create(dir.join("src/game/Board.java"))
            .unwrap()
            .write_all(b"class Board {}")
            .unwrap();

        File::create(dir.join("src/game/board.css"))
            .unwrap()
            .write_all(b"body {}")
            .unwrap();

        File::create(dir.join("target/classes/Gen.java"))
            .unwrap()
            .write_all(b"class Gen {}")
            .unwrap();

        File::create(dir.join("README.md"))
            .unwrap()
            .write_all(b"# Game")
            .unwrap();
    }

    fn names(files: &[PathBuf], root: &Path) -> Vec<String> {
        files
            .iter()
            .map(|f| {
                f.strip_prefix(root)
                    .unwrap()
                    .to_string_lossy()
                    .replace('\\', "/")
            })
            .collect()
    }

    #[test]
    fn test_filter_by_extension() {
        let dir = TempDir::new().unwrap();
        create_test_files(dir.path());

        let files = FileMatcher::new()
            .extension("java")
            .collect(dir.path())
            .unwrap();

        assert_eq!(files.len(), 3);
        assert!(files.iter().all(|f| f.extension().unwrap() == "java"));
        assert!(files.iter().all(|f| f.is_absolute()));
    }

    #[test]
    fn test_extension_with_leading_dot() {
        let dir = TempDir::new().unwrap();
        create_test_files(dir.path());

        let files = FileMatcher::new()
            .extensions([".java", "md"])
            .collect(dir.path())
            .unwrap();

        assert_eq!(files.len(), 4);
    }

    #[test]
    fn test_order_is_deterministic() {
        let dir = TempDir::new().unwrap();
        create_test_files(dir.path());

        let root = std::path::absolute(dir.path()).unwrap();
        let matcher = FileMatcher::new().extension("java");
        let first = matcher.collect(&root).unwrap();
        let second = matcher.collect(&root).unwrap();

        assert_eq!(first, second);
        assert_eq!(
            names(&first, &root),
            vec![
                "src/Main.java",
                "src/game/Board.java",
                "target/classes/Gen.java"
            ]
        );
    }

    #[test]
    fn test_exclude_prunes_directories() {
        let dir = TempDir::new().unwrap();
        create_test_files(dir.path());

        let files = FileMatcher::new()
            .extension("java")
            .exclude("target")
            .collect(dir.path())
            .unwrap();

        assert_eq!(files.len(), 2);
        assert!(
            files
                .iter()
                .all(|f| !f.to_string_lossy().contains("target"))
        );
    }

    #[test]
    fn test_exclude_file_glob() {
        let dir = TempDir::new().unwrap();
        create_test_files(dir.path());

        let files = FileMatcher::new()
            .extension("java")
            .exclude("**/target/**")
            .collect(dir.path())
            .unwrap();

        assert_eq!(files.len(), 2);
    }

    #[test]
    fn test_include_glob() {
        let dir = TempDir::new().unwrap();
        create_test_files(dir.path());

        let files = FileMatcher::new()
            .include("src/game/**")
            .collect(dir.path())
            .unwrap();

        assert_eq!(files.len(), 2);
        assert!(files.iter().all(|f| f.to_string_lossy().contains("game")));
    }

    #[test]
    fn test_missing_root_is_empty_not_error() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("does-not-exist");

        let mut set = FileMatcher::new().resolve(&[missing.clone()]).unwrap();

        assert_eq!(set.missing_roots().len(), 1);
        assert!(set.missing_roots()[0].ends_with("does-not-exist"));
        assert!(set.next().is_none());
    }

    #[test]
    fn test_overlapping_roots_yield_once() {
        let dir = TempDir::new().unwrap();
        create_test_files(dir.path());

        let roots = vec![dir.path().to_path_buf(), dir.path().join("src")];
        let files: Vec<PathBuf> = FileMatcher::new()
            .extension("java")
            .resolve(&roots)
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();

        assert_eq!(files.len(), 3);
    }

    #[test]
    fn test_current_root_tracks_walk() {
        let dir = TempDir::new().unwrap();
        create_test_files(dir.path());
        let src = std::path::absolute(dir.path().join("src")).unwrap();

        let mut set = FileMatcher::new()
            .extension("java")
            .resolve(&[src.clone()])
            .unwrap();
        assert!(set.current_root().is_none());

        set.next().unwrap().unwrap();
        assert_eq!(set.current_root(), Some(src.as_path()));
    }

    #[test]
    fn test_file_root() {
        let dir = TempDir::new().unwrap();
        create_test_files(dir.path());

        let files = FileMatcher::new()
            .extension("java")
            .collect(&dir.path().join("src/Main.java"))
            .unwrap();

        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("Main.java"));
    }

    #[test]
    fn test_invalid_glob_is_error() {
        let dir = TempDir::new().unwrap();
        let result = FileMatcher::new()
            .exclude("src/[unclosed")
            .resolve(&[dir.path().to_path_buf()]);

        assert!(matches!(result, Err(PatchError::Glob(_))));
    }

    #[test]
    fn test_empty_directory() {
        let dir = TempDir::new().unwrap();

        let files = FileMatcher::new().collect(dir.path()).unwrap();

        assert!(files.is_empty());
    }
}
