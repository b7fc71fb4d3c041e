use std::io::{self, Write};

use camino::Utf8Path;
use tempfile::Builder;

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

/// Replaces `path` with `contents` through a temporary sibling file.
///
/// Readers either see the previous file or the complete new payload.
pub(super) fn atomic_write(path: &Utf8Path, contents: &[u8]) -> io::Result<()> {
    let directory = path.parent().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::NotFound,
            format!("'{path}' has no parent directory"),
        )
    })?;

    let mut builder = Builder::new();
    builder.prefix(path.file_name().unwrap_or("ipfs"));
    builder.suffix(".tmp");
    #[cfg(unix)]
    {
        use std::fs::Permissions;
        builder.permissions(Permissions::from_mode(0o600));
    }

    let mut file = builder.tempfile_in(directory.as_std_path())?;
    file.write_all(contents)?;
    file.as_file().sync_all()?;
    file.persist(path.as_std_path())
        .map_err(|error| error.error)?;
    Ok(())
}
