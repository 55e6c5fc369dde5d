//! Capability-scoped filesystem helpers for the snapshot store.

use super::PersistenceError;
use camino::Utf8Path;
use cap_std::ambient_authority;
use cap_std::fs_utf8::Dir;
use std::io;

/// Suffix of partially written snapshot files.
pub(super) const TEMP_SUFFIX: &str = ".tmp";

/// Every extension a serializer may write.
pub(super) const SNAPSHOT_EXTENSIONS: [&str; 2] = [".json", ".json.gz"];

pub(super) fn io_error(
    operation: &'static str,
    path: &Utf8Path,
) -> impl FnOnce(io::Error) -> PersistenceError {
    let owned = path.to_owned();
    move |err| PersistenceError::Io {
        operation,
        path: owned,
        source: err,
    }
}

pub(super) fn is_not_found(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::NotFound
}

/// Opens a directory by absolute or relative ambient path.
pub(super) fn open_ambient(path: &Utf8Path) -> Result<Dir, PersistenceError> {
    Dir::open_ambient_dir(path, ambient_authority()).map_err(io_error("open", path))
}

/// Opens a directory, returning `None` when it does not exist.
pub(super) fn open_ambient_if_exists(path: &Utf8Path) -> Result<Option<Dir>, PersistenceError> {
    match Dir::open_ambient_dir(path, ambient_authority()) {
        Ok(dir) => Ok(Some(dir)),
        Err(err) if is_not_found(&err) => Ok(None),
        Err(err) => Err(io_error("open", path)(err)),
    }
}

/// Creates a directory and its parents, then opens it.
pub(super) fn create_ambient(path: &Utf8Path) -> Result<Dir, PersistenceError> {
    Dir::create_ambient_dir_all(path, ambient_authority()).map_err(io_error("create", path))?;
    open_ambient(path)
}

/// Opens a child directory, returning `None` when it does not exist.
pub(super) fn open_child_if_exists(
    parent: &Dir,
    name: &str,
    path: &Utf8Path,
) -> Result<Option<Dir>, PersistenceError> {
    match parent.open_dir(name) {
        Ok(dir) => Ok(Some(dir)),
        Err(err) if is_not_found(&err) => Ok(None),
        Err(err) => Err(io_error("open", path)(err)),
    }
}

/// Removes a child directory tree if present.
pub(super) fn remove_child(parent: &Dir, name: &str, path: &Utf8Path) -> Result<(), PersistenceError> {
    match parent.remove_dir_all(name) {
        Ok(()) => Ok(()),
        Err(err) if is_not_found(&err) => Ok(()),
        Err(err) => Err(io_error("remove", path)(err)),
    }
}

/// Lists snapshot file names in `dir`, sorted, skipping temporary files,
/// hidden entries and subdirectories.
pub(super) fn snapshot_files(dir: &Dir, path: &Utf8Path) -> Result<Vec<String>, PersistenceError> {
    let mut names = Vec::new();
    for listed in dir.entries().map_err(io_error("list", path))? {
        let entry = listed.map_err(io_error("list", path))?;
        if !entry.file_type().map_err(io_error("stat", path))?.is_file() {
            continue;
        }
        let name = entry.file_name().map_err(io_error("list", path))?;
        if name.ends_with(TEMP_SUFFIX) || name.starts_with('.') {
            continue;
        }
        names.push(name);
    }
    names.sort();
    Ok(names)
}

/// Copies every file and subdirectory of `from` into `to`.
pub(super) fn copy_dir(from: &Dir, to: &Dir, path: &Utf8Path) -> Result<(), PersistenceError> {
    for listed in from.entries().map_err(io_error("list", path))? {
        let entry = listed.map_err(io_error("list", path))?;
        let name = entry.file_name().map_err(io_error("list", path))?;
        let child = path.join(&name);
        if entry.file_type().map_err(io_error("stat", &child))?.is_dir() {
            to.create_dir(&name).map_err(io_error("create", &child))?;
            let source = from.open_dir(&name).map_err(io_error("open", &child))?;
            let target = to.open_dir(&name).map_err(io_error("open", &child))?;
            copy_dir(&source, &target, &child)?;
        } else {
            from.copy(&name, to, &name).map_err(io_error("copy", &child))?;
        }
    }
    Ok(())
}

/// Rejects identifiers that are not safe single-component file stems.
pub(super) fn validate_snapshot_id(id: &str) -> Result<(), PersistenceError> {
    let unsafe_id = id.is_empty()
        || id.starts_with('.')
        || id.contains(['/', '\\', '\0'])
        || id.ends_with(TEMP_SUFFIX);
    if unsafe_id {
        return Err(PersistenceError::InvalidSnapshotId(id.to_owned()));
    }
    Ok(())
}
