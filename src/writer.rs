//! Writing transformed content back to disk.

use crate::error::{PatchError, Result};
use crate::source::{LineEndingPolicy, SourceFile};
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// What the writer did with a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStatus {
    /// The new bytes replaced the file.
    Written,
    /// The encoded bytes equal the original; the file was not touched.
    Unchanged,
}

/// Re-encodes `text` the way `source` was stored.
///
/// Restores the original line endings (unless the policy forces one),
/// byte-order mark and encoding.
pub fn encode(source: &SourceFile, text: &str, policy: LineEndingPolicy) -> Result<Vec<u8>> {
    let text = policy.apply(text, source.line_ending());
    source
        .encoding()
        .encode(&text, source.has_bom())
        .ok_or_else(|| PatchError::Encode {
            path: source.path().to_path_buf(),
            encoding: source.encoding().name(),
        })
}

/// Writes `bytes` over the source file if they differ from what was loaded.
pub fn write_back(source: &SourceFile, bytes: &[u8]) -> Result<WriteStatus> {
    if bytes == source.raw() {
        return Ok(WriteStatus::Unchanged);
    }
    write_atomic(source.path(), bytes)?;
    Ok(WriteStatus::Written)
}

/// Replaces the file at `path` with `bytes`, all or nothing.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    commit_with(path, |file| file.write_all(bytes))
}

/// Fills a temporary file next to `path` and renames it over the target.
///
/// The temporary file lives in the same directory so the rename stays on
/// one filesystem. If `fill` or any later step fails, the temporary file is
/// removed on drop and the target keeps its old content.
pub(crate) fn commit_with<F>(path: &Path, fill: F) -> Result<()>
where
    F: FnOnce(&mut NamedTempFile) -> io::Result<()>,
{
    let wrap = |e: io::Error| PatchError::file_io(path, e);
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let permissions = fs::metadata(path).map(|m| m.permissions()).ok();

    let mut temp = NamedTempFile::new_in(parent).map_err(wrap)?;
    fill(&mut temp).map_err(wrap)?;
    temp.as_file_mut().flush().map_err(wrap)?;
    temp.as_file().sync_all().map_err(wrap)?;
    if let Some(permissions) = permissions {
        temp.as_file().set_permissions(permissions).map_err(wrap)?;
    }

    temp.persist(path).map_err(|e| wrap(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::TextEncoding;
    use tempfile::TempDir;

    fn entries(dir: &Path) -> usize {
        fs::read_dir(dir).unwrap().count()
    }

    #[test]
    fn test_unchanged_bytes_are_not_written() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("A.java");
        fs::write(&path, "class A {}\n").unwrap();
        let before = fs::metadata(&path).unwrap().modified().unwrap();

        let source = SourceFile::load(&path, TextEncoding::UTF_8).unwrap();
        let bytes = encode(&source, source.text(), LineEndingPolicy::Preserve).unwrap();
        let status = write_back(&source, &bytes).unwrap();

        assert_eq!(status, WriteStatus::Unchanged);
        assert_eq!(fs::metadata(&path).unwrap().modified().unwrap(), before);
    }

    #[test]
    fn test_write_restores_crlf_and_bom() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("A.java");
        fs::write(&path, b"\xEF\xBB\xBFclass A {\r\n}\r\n").unwrap();

        let source = SourceFile::load(&path, TextEncoding::UTF_8).unwrap();
        let edited = format!("// header\n{}", source.text());
        let bytes = encode(&source, &edited, LineEndingPolicy::Preserve).unwrap();

        assert_eq!(write_back(&source, &bytes).unwrap(), WriteStatus::Written);
        assert_eq!(
            fs::read(&path).unwrap(),
            b"\xEF\xBB\xBF// header\r\nclass A {\r\n}\r\n".to_vec()
        );
    }

    #[test]
    fn test_unencodable_text_is_encoding_error() {
        let latin1 = TextEncoding::for_label("windows-1252").unwrap();
        let source = SourceFile::from_bytes("A.java", b"class A {}".to_vec(), latin1).unwrap();

        let err = encode(&source, "// \u{2603}\nclass A {}", LineEndingPolicy::Preserve).unwrap_err();

        assert!(matches!(err, PatchError::Encode { .. }));
    }

    #[test]
    fn test_failed_write_leaves_original_intact() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("A.java");
        fs::write(&path, "class A { int x; }\n").unwrap();

        let result = commit_with(&path, |file| {
            file.write_all(b"class A {")?;
            Err(io::Error::other("disk full"))
        });

        assert!(matches!(result, Err(PatchError::FileIo { .. })));
        assert_eq!(fs::read_to_string(&path).unwrap(), "class A { int x; }\n");
        assert_eq!(entries(dir.path()), 1, "temporary file must be cleaned up");
    }

    #[test]
    fn test_write_atomic_replaces_content() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("A.java");
        fs::write(&path, "old").unwrap();

        write_atomic(&path, b"new").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "new");
        assert_eq!(entries(dir.path()), 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_permissions_are_preserved() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("run.sh");
        fs::write(&path, "echo old\n").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();

        write_atomic(&path, b"echo new\n").unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }
}
