//! Path Sandbox (spec §4.1). Produces a canonical, provably-contained file
//! path for a (repo, relative-path) pair, or fails with a classified error.
//!
//! Two containment checks are required: one on the raw joined path, one
//! after `canonicalize()` resolves any symlink in the path. A single check
//! is vulnerable to a TOCTOU-style symlink-escape where a path component is
//! itself a symlink planted after the first check.

use std::path::{Path, PathBuf};

use crate::error::CompassError;

const MAX_REPO_NAME_LEN: usize = 200;
const MAX_REL_PATH_LEN: usize = 200;
const TEXT_SNIFF_BYTES: usize = 8 * 1024;

/// Validate a repository name per spec §3 Scope invariants.
pub fn validate_repo_name(name: &str) -> Result<(), CompassError> {
    if name.is_empty() || name.len() > MAX_REPO_NAME_LEN {
        return Err(CompassError::bad_request(format!(
            "repo name must be 1..{MAX_REPO_NAME_LEN} characters"
        )));
    }
    if name.contains('/') || name.contains('\\') || name.contains('\0') {
        return Err(CompassError::bad_request("repo name contains illegal characters"));
    }
    if name.split(['/', '\\']).any(|seg| seg == "..") {
        return Err(CompassError::bad_request("repo name must not contain '..'"));
    }
    Ok(())
}

/// Resolve `<codebaseRoot>/<repo>` to its canonical directory.
pub fn resolve_repo_root(codebase_root: &Path, repo: &str) -> Result<PathBuf, CompassError> {
    validate_repo_name(repo)?;
    let candidate = codebase_root.join(repo);
    if !candidate.exists() {
        return Err(CompassError::not_found(format!("repository '{repo}' not found")));
    }
    if !candidate.is_dir() {
        return Err(CompassError::bad_request(format!("'{repo}' is not a directory")));
    }
    let canonical = candidate
        .canonicalize()
        .map_err(|e| CompassError::Internal(format!("failed to canonicalize repo root: {e}")))?;
    let root_canonical = codebase_root
        .canonicalize()
        .map_err(|e| CompassError::Internal(format!("failed to canonicalize codebase root: {e}")))?;
    if !canonical.starts_with(&root_canonical) {
        return Err(CompassError::forbidden("repository path escapes codebase root"));
    }
    Ok(canonical)
}

/// Normalize a caller-supplied relative path: reject empty, absolute
/// (including Windows drive letters and UNC prefixes), NUL-containing, or
/// `..`-segmented paths after normalizing backslashes to `/`.
pub fn normalize_relative_path(raw: &str) -> Result<String, CompassError> {
    if raw.is_empty() {
        return Err(CompassError::bad_request("path must not be empty"));
    }
    if raw.contains('\0') {
        return Err(CompassError::bad_request("path contains NUL byte"));
    }
    let slashed = raw.replace('\\', "/");
    if slashed.starts_with('/') || slashed.starts_with("//") {
        return Err(CompassError::bad_request("path must be relative"));
    }
    // Windows drive letter, e.g. "C:/..."
    if slashed.len() >= 2 && slashed.as_bytes()[1] == b':' {
        return Err(CompassError::bad_request("path must be relative"));
    }
    if slashed.split('/').any(|seg| seg == "..") {
        return Err(CompassError::forbidden("path must not contain '..' segments"));
    }
    if slashed.len() > MAX_REL_PATH_LEN * 4 {
        // generous ceiling; exact length rules live with the caller (pathPrefix vs path)
        return Err(CompassError::bad_request("path too long"));
    }
    Ok(slashed)
}

/// Join, canonicalize, and re-verify containment for the candidate file.
/// Performs the pre- and post-canonicalization containment checks described
/// in spec §4.1.
pub fn resolve_file_path(
    repo_root_canonical: &Path,
    relative_path: &str,
) -> Result<PathBuf, CompassError> {
    let normalized = normalize_relative_path(relative_path)?;
    let candidate = repo_root_canonical.join(&normalized);

    if !candidate.starts_with(repo_root_canonical) {
        return Err(CompassError::forbidden("path escapes repository root"));
    }
    if !candidate.exists() {
        return Err(CompassError::not_found(format!("file '{relative_path}' not found")));
    }

    let canonical = candidate
        .canonicalize()
        .map_err(|e| CompassError::Internal(format!("failed to canonicalize file path: {e}")))?;
    if !canonical.starts_with(repo_root_canonical) {
        return Err(CompassError::forbidden("resolved path escapes repository root"));
    }

    Ok(canonical)
}

/// Classify the first 8 KiB of a file as text: reject embedded NUL bytes and
/// non-strict-UTF-8 content.
pub fn classify_as_text(path: &Path) -> Result<(), CompassError> {
    use std::io::Read;
    let mut file = std::fs::File::open(path)
        .map_err(|e| CompassError::Internal(format!("failed to open file: {e}")))?;
    let mut buf = vec![0u8; TEXT_SNIFF_BYTES];
    let n = file
        .read(&mut buf)
        .map_err(|e| CompassError::Internal(format!("failed to read file: {e}")))?;
    buf.truncate(n);

    if buf.contains(&0u8) {
        return Err(CompassError::UnsupportedMedia("file contains binary content".to_string()));
    }
    if std::str::from_utf8(&buf).is_err() {
        return Err(CompassError::UnsupportedMedia("file is not valid UTF-8 text".to_string()));
    }
    Ok(())
}

/// End-to-end sandbox resolution: repo name -> repo root -> contained file path -> text check.
pub fn resolve_and_classify(
    codebase_root: &Path,
    repo: &str,
    relative_path: &str,
) -> Result<PathBuf, CompassError> {
    let repo_root = resolve_repo_root(codebase_root, repo)?;
    let file_path = resolve_file_path(&repo_root, relative_path)?;
    classify_as_text(&file_path)?;
    Ok(file_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn setup() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("single-repo")).unwrap();
        fs::write(dir.path().join("single-repo/safe.txt"), "a\nb\nc\nd\n").unwrap();
        dir
    }

    #[test]
    fn resolves_valid_path() {
        let dir = setup();
        let resolved = resolve_and_classify(dir.path(), "single-repo", "safe.txt").unwrap();
        assert!(resolved.ends_with("safe.txt"));
    }

    #[test]
    fn rejects_traversal() {
        let dir = setup();
        let err = resolve_and_classify(dir.path(), "single-repo", "../../etc/passwd").unwrap_err();
        assert_eq!(err.code(), "FORBIDDEN");
    }

    #[test]
    fn rejects_absolute_path() {
        let dir = setup();
        let err = resolve_and_classify(dir.path(), "single-repo", "/etc/passwd").unwrap_err();
        assert_eq!(err.code(), "BAD_REQUEST");
    }

    #[test]
    fn rejects_missing_repo() {
        let dir = setup();
        let err = resolve_and_classify(dir.path(), "nope", "safe.txt").unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");
    }

    #[test]
    fn rejects_bad_repo_name() {
        assert_eq!(validate_repo_name("a/b").unwrap_err().code(), "BAD_REQUEST");
        assert_eq!(validate_repo_name("").unwrap_err().code(), "BAD_REQUEST");
        assert_eq!(validate_repo_name(&"a".repeat(201)).unwrap_err().code(), "BAD_REQUEST");
    }

    #[test]
    fn blocks_symlink_escape() {
        let dir = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        fs::write(outside.path().join("secret.txt"), "top secret").unwrap();
        fs::create_dir_all(dir.path().join("single-repo")).unwrap();

        #[cfg(unix)]
        {
            std::os::unix::fs::symlink(outside.path(), dir.path().join("single-repo/escape"))
                .unwrap();
            let err =
                resolve_and_classify(dir.path(), "single-repo", "escape/secret.txt").unwrap_err();
            assert_eq!(err.code(), "FORBIDDEN");
        }
    }
}
