//! Shared fixtures for kiln-build integration tests
#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

/// Write `contents` to `root/relative`, creating parent directories
pub fn write_file(root: &Path, relative: &str, contents: &str) -> PathBuf {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, contents).unwrap();
    path
}

/// A stand-in executor that "builds" a description by touching every output
///
/// Each invocation appends the description directory to `invocations.log`
/// next to the script, so tests can tell which descriptions were executed.
#[cfg(unix)]
pub fn fake_ninja(dir: &Path) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let log = dir.join("invocations.log");
    let script = format!(
        r#"#!/bin/sh
set -e
echo "$2 $5 $6" >> "{log}"
cd "$2"
if [ "$5" = "-t" ]; then
    exit 0
fi
for out in $(sed -n 's/^build \([^:]*\): .*/\1/p' "$4" | tr ' ' '\n' | grep -v '^|$'); do
    mkdir -p "$(dirname "$out")"
    touch "$out"
done
"#,
        log = log.display()
    );

    let path = dir.join("fake-ninja");
    fs::write(&path, script).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Lines of the fake executor's invocation log
pub fn invocations(dir: &Path) -> Vec<String> {
    fs::read_to_string(dir.join("invocations.log"))
        .map(|log| log.lines().map(str::to_string).collect())
        .unwrap_or_default()
}

/// Append a marker line; a later rewrite of the file drops it
pub fn mark(path: &Path) {
    let mut text = fs::read_to_string(path).unwrap();
    text.push_str("# marker\n");
    fs::write(path, text).unwrap();
}

pub fn is_marked(path: &Path) -> bool {
    fs::read_to_string(path).unwrap().contains("# marker")
}
