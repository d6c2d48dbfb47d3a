//! Filesystem confinement for the file tools.
//!
//! Caller-supplied paths are normalised lexically, joined onto the sandbox
//! root, then resolved through the filesystem (symlinks included) and
//! checked against the canonical root. The verified path is the one that
//! is opened, without following a final symlink and without truncating.
//! The opened handle must then be the same file (device and inode) as the
//! verified path before any byte is read or written.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Component, Path, PathBuf};

use walkdir::WalkDir;

use crate::error::ToolError;

/// A directory that file tools cannot leave.
#[derive(Debug, Clone)]
pub struct Sandbox {
    root: PathBuf,
}

/// Outcome of reading a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    /// File contents, truncated to the requested number of characters.
    Text(String),
    /// No file at that path.
    NotFound,
}

impl Sandbox {
    /// Opens a sandbox at `root`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the directory cannot be created or resolved.
    pub fn new(root: &Path) -> std::io::Result<Self> {
        fs::create_dir_all(root)?;
        Ok(Self {
            root: root.canonicalize()?,
        })
    }

    /// Canonical sandbox root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves `rel` to an absolute path inside the root.
    ///
    /// Leading slashes are ignored. `..` components that would climb above
    /// the root, and symlinks that point outside it, are rejected.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::UnsafePath`] when the path escapes the root.
    pub fn resolve(&self, rel: &str) -> Result<PathBuf, ToolError> {
        let unsafe_path = || ToolError::UnsafePath {
            path: rel.to_string(),
        };

        let mut normalized = PathBuf::new();
        for component in Path::new(rel.trim().trim_start_matches(['/', '\\'])).components() {
            match component {
                Component::Normal(part) => normalized.push(part),
                Component::CurDir => {}
                Component::ParentDir => {
                    if !normalized.pop() {
                        return Err(unsafe_path());
                    }
                }
                Component::RootDir | Component::Prefix(_) => return Err(unsafe_path()),
            }
        }

        let joined = self.root.join(&normalized);
        let resolved = canonicalize_existing_prefix(&joined).map_err(|_| unsafe_path())?;
        if resolved.starts_with(&self.root) {
            Ok(resolved)
        } else {
            Err(unsafe_path())
        }
    }

    /// Path of `abs` relative to the root, with `/` separators.
    #[must_use]
    pub fn relative(&self, abs: &Path) -> String {
        abs.strip_prefix(&self.root)
            .unwrap_or(abs)
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Writes `content` to `rel`, creating parent directories.
    ///
    /// Returns the sandbox-relative path written.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::UnsafePath`] for escaping or empty paths and
    /// [`ToolError::Execution`] for I/O failures.
    pub fn write(&self, rel: &str, content: &str) -> Result<String, ToolError> {
        let path = self.resolve_file(rel)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| io_error("file_write", &e))?;
        }
        // Parent directories now exist; resolve again so a link among them is caught.
        let path = self.resolve_file(rel)?;
        let mut file = no_follow()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| io_error("file_write", &e))?;
        self.verify_handle(rel, &file, &path)?;
        file.set_len(0).map_err(|e| io_error("file_write", &e))?;
        file.write_all(content.as_bytes())
            .map_err(|e| io_error("file_write", &e))?;
        Ok(self.relative(&path))
    }

    /// Reads up to `max_chars` characters from `rel`.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::UnsafePath`] for escaping or empty paths and
    /// [`ToolError::Execution`] for I/O failures other than a missing file.
    pub fn read(&self, rel: &str, max_chars: usize) -> Result<ReadOutcome, ToolError> {
        let path = self.resolve_file(rel)?;
        if !path.is_file() {
            return Ok(ReadOutcome::NotFound);
        }
        let mut file = match no_follow().read(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(ReadOutcome::NotFound),
            Err(e) => return Err(io_error("file_read", &e)),
        };
        self.verify_handle(rel, &file, &path)?;
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)
            .map_err(|e| io_error("file_read", &e))?;
        let text = String::from_utf8_lossy(&bytes);
        Ok(ReadOutcome::Text(text.chars().take(max_chars).collect()))
    }

    /// Lists files under `prefix` (or the whole root), sorted, as relative paths.
    ///
    /// A prefix naming a file lists that file's directory.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::UnsafePath`] when the prefix escapes the root.
    pub fn list(&self, prefix: &str) -> Result<Vec<String>, ToolError> {
        let mut start = if prefix.trim().is_empty() {
            self.root.clone()
        } else {
            self.resolve(prefix)?
        };
        if start.is_file()
            && let Some(parent) = start.parent()
        {
            start = parent.to_path_buf();
        }
        if !start.exists() {
            return Ok(Vec::new());
        }

        let mut files: Vec<String> = WalkDir::new(&start)
            .follow_links(false)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| self.relative(entry.path()))
            .collect();
        files.sort();
        Ok(files)
    }

    /// Resolves a path that must name a file, not the root itself.
    fn resolve_file(&self, rel: &str) -> Result<PathBuf, ToolError> {
        let path = self.resolve(rel)?;
        if path == self.root {
            return Err(ToolError::InvalidArguments {
                name: "file".to_string(),
                message: "path must name a file".to_string(),
            });
        }
        Ok(path)
    }

    /// Checks that `file` is the file at `verified` and that `verified`
    /// still resolves to itself inside the root.
    fn verify_handle(&self, rel: &str, file: &File, verified: &Path) -> Result<(), ToolError> {
        let unsafe_path = || ToolError::UnsafePath {
            path: rel.to_string(),
        };
        let actual = verified.canonicalize().map_err(|_| unsafe_path())?;
        if actual != verified || !actual.starts_with(&self.root) {
            return Err(unsafe_path());
        }
        let opened = file.metadata().map_err(|_| unsafe_path())?;
        let on_disk = fs::metadata(&actual).map_err(|_| unsafe_path())?;
        if opened.is_file() && same_file(&opened, &on_disk) {
            Ok(())
        } else {
            Err(unsafe_path())
        }
    }
}

/// Open options that refuse a symlink in the final path component.
fn no_follow() -> OpenOptions {
    let mut options = OpenOptions::new();
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.custom_flags(libc::O_NOFOLLOW);
    }
    options
}

#[cfg(unix)]
fn same_file(a: &fs::Metadata, b: &fs::Metadata) -> bool {
    use std::os::unix::fs::MetadataExt;
    a.dev() == b.dev() && a.ino() == b.ino()
}

#[cfg(not(unix))]
fn same_file(a: &fs::Metadata, b: &fs::Metadata) -> bool {
    a.is_file() == b.is_file() && a.len() == b.len() && a.modified().ok() == b.modified().ok()
}

/// Canonicalises the longest existing ancestor of `path` and re-appends the rest.
fn canonicalize_existing_prefix(path: &Path) -> std::io::Result<PathBuf> {
    let mut existing = path.to_path_buf();
    let mut tail = Vec::new();
    while !existing.exists() {
        match (existing.file_name(), existing.parent()) {
            (Some(name), Some(parent)) => {
                tail.push(name.to_os_string());
                existing = parent.to_path_buf();
            }
            _ => break,
        }
    }
    let mut resolved = existing.canonicalize()?;
    for name in tail.into_iter().rev() {
        resolved.push(name);
    }
    Ok(resolved)
}

fn io_error(tool: &str, e: &std::io::Error) -> ToolError {
    ToolError::Execution {
        name: tool.to_string(),
        message: e.to_string(),
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sandbox() -> (TempDir, Sandbox) {
        let dir = TempDir::new().unwrap_or_else(|e| panic!("tempdir failed: {e}"));
        let sandbox =
            Sandbox::new(&dir.path().join("files")).unwrap_or_else(|e| panic!("sandbox failed: {e}"));
        (dir, sandbox)
    }

    #[test]
    fn test_parent_escape_rejected() {
        let (_dir, sb) = sandbox();
        assert!(matches!(
            sb.resolve("../../etc/passwd"),
            Err(ToolError::UnsafePath { .. })
        ));
        assert!(matches!(
            sb.read("../../etc/passwd", 10),
            Err(ToolError::UnsafePath { .. })
        ));
        assert!(matches!(
            sb.write("a/../../x.txt", "nope"),
            Err(ToolError::UnsafePath { .. })
        ));
    }

    #[test]
    fn test_absolute_path_is_rooted_in_sandbox() {
        let (_dir, sb) = sandbox();
        let resolved = sb
            .resolve("/notes/today.md")
            .unwrap_or_else(|e| panic!("resolve failed: {e}"));
        assert!(resolved.starts_with(sb.root()));
        assert_eq!(sb.relative(&resolved), "notes/today.md");
    }

    #[test]
    fn test_inner_parent_components_are_allowed() {
        let (_dir, sb) = sandbox();
        let resolved = sb
            .resolve("a/b/../c.txt")
            .unwrap_or_else(|e| panic!("resolve failed: {e}"));
        assert_eq!(sb.relative(&resolved), "a/c.txt");
    }

    #[test]
    fn test_write_read_list() {
        let (_dir, sb) = sandbox();
        let written = sb
            .write("notes/b.txt", "hello world")
            .unwrap_or_else(|e| panic!("write failed: {e}"));
        assert_eq!(written, "notes/b.txt");
        sb.write("a.txt", "first")
            .unwrap_or_else(|e| panic!("write failed: {e}"));

        assert_eq!(
            sb.read("notes/b.txt", 5).ok(),
            Some(ReadOutcome::Text("hello".to_string()))
        );
        assert_eq!(sb.read("missing.txt", 5).ok(), Some(ReadOutcome::NotFound));

        assert_eq!(
            sb.list("").unwrap_or_default(),
            vec!["a.txt".to_string(), "notes/b.txt".to_string()]
        );
        assert_eq!(
            sb.list("notes/b.txt").unwrap_or_default(),
            vec!["notes/b.txt".to_string()]
        );
        assert!(sb.list("nowhere").unwrap_or_default().is_empty());
    }

    #[test]
    fn test_empty_path_is_rejected_for_files() {
        let (_dir, sb) = sandbox();
        assert!(matches!(
            sb.write("", "x"),
            Err(ToolError::InvalidArguments { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_escape_rejected() {
        let (dir, sb) = sandbox();
        let outside = dir.path().join("outside");
        fs::create_dir_all(&outside).unwrap_or_else(|e| panic!("mkdir failed: {e}"));
        fs::write(outside.join("secret.txt"), "secret")
            .unwrap_or_else(|e| panic!("write failed: {e}"));
        std::os::unix::fs::symlink(&outside, sb.root().join("link"))
            .unwrap_or_else(|e| panic!("symlink failed: {e}"));

        assert!(matches!(
            sb.read("link/secret.txt", 100),
            Err(ToolError::UnsafePath { .. })
        ));
        assert!(matches!(
            sb.write("link/new.txt", "x"),
            Err(ToolError::UnsafePath { .. })
        ));
    }

    #[test]
    fn test_overwrite_replaces_longer_content() {
        let (_dir, sb) = sandbox();
        sb.write("n.txt", "a much longer first version")
            .unwrap_or_else(|e| panic!("write failed: {e}"));
        sb.write("n.txt", "short")
            .unwrap_or_else(|e| panic!("write failed: {e}"));
        assert_eq!(
            sb.read("n.txt", 100).ok(),
            Some(ReadOutcome::Text("short".to_string()))
        );
    }

    #[test]
    fn test_handle_for_another_file_is_rejected() {
        let (_dir, sb) = sandbox();
        sb.write("a.txt", "a").unwrap_or_else(|e| panic!("write failed: {e}"));
        sb.write("b.txt", "b").unwrap_or_else(|e| panic!("write failed: {e}"));
        let a = sb.resolve("a.txt").unwrap_or_else(|e| panic!("resolve failed: {e}"));
        let b = sb.resolve("b.txt").unwrap_or_else(|e| panic!("resolve failed: {e}"));

        // A handle that was swapped underneath the verified path.
        let handle = File::open(&a).unwrap_or_else(|e| panic!("open failed: {e}"));
        assert!(matches!(
            sb.verify_handle("b.txt", &handle, &b),
            Err(ToolError::UnsafePath { .. })
        ));
        assert!(sb.verify_handle("a.txt", &handle, &a).is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn test_open_refuses_final_symlink() {
        let (_dir, sb) = sandbox();
        sb.write("real.txt", "x").unwrap_or_else(|e| panic!("write failed: {e}"));
        let link = sb.root().join("alias.txt");
        std::os::unix::fs::symlink(sb.root().join("real.txt"), &link)
            .unwrap_or_else(|e| panic!("symlink failed: {e}"));

        assert!(no_follow().read(true).open(&link).is_err());
        assert!(no_follow().read(true).open(sb.root().join("real.txt")).is_ok());
    }
}
