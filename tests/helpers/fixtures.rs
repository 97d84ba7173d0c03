//! Small scaffolding helpers for building a fixture codebase root in a temp dir.

use std::path::Path;

/// Write `content` to `<root>/<repo>/<relative_path>`, creating parent
/// directories as needed.
pub fn write_file(root: &Path, repo: &str, relative_path: &str, content: &str) {
    let path = root.join(repo).join(relative_path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("failed to create fixture directory");
    }
    std::fs::write(path, content).expect("failed to write fixture file");
}
