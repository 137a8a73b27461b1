use std::fs;
use std::io;
use std::path::Path;

use tracing::debug;
use tracing::warn;

use crate::Result;

/// Removes a database from disk, whether the engine keeps it as a single
/// file (redb) or as a directory (sled). A missing path is not an error.
pub(crate) fn remove_database(path: &Path) -> Result<()> {
    let metadata = match fs::symlink_metadata(path) {
        Ok(m) => m,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!("remove_database: {:?} already absent", path);
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    if metadata.is_dir() {
        fs::remove_dir_all(path)?;
    } else {
        fs::remove_file(path)?;
    }
    debug!("removed database at {:?}", path);
    Ok(())
}

/// Same as [`remove_database`], but failures are only logged. Used on cleanup
/// paths where the original error is the one worth returning.
pub(crate) fn discard_database(path: &Path) {
    if let Err(e) = remove_database(path) {
        warn!(?e, "failed to remove database at {:?}", path);
    }
}

/// Restricts a freshly created database file to `mode`.
#[cfg(unix)]
pub(crate) fn set_file_mode(
    path: &Path,
    mode: u32,
) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, fs::Permissions::from_mode(mode))?;
    Ok(())
}

#[cfg(not(unix))]
pub(crate) fn set_file_mode(
    _path: &Path,
    _mode: u32,
) -> Result<()> {
    Ok(())
}
