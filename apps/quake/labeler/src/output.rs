//! Output files are written to a temporary sibling and renamed into place,
//! so a failed run never leaves a partial file behind.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;

use eyre::{Result, WrapErr};
use tempfile::NamedTempFile;

/// Create `path` atomically from whatever `write` puts into the writer.
pub fn write_atomically<T, F>(path: &Path, write: F) -> Result<T>
where
    F: FnOnce(&mut BufWriter<&mut NamedTempFile>) -> Result<T>,
{
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)
        .wrap_err_with(|| format!("Failed to create output directory {}", dir.display()))?;

    let mut tmp = NamedTempFile::new_in(dir)
        .wrap_err_with(|| format!("Failed to create temporary file in {}", dir.display()))?;

    let value = {
        let mut writer = BufWriter::new(&mut tmp);
        let value = write(&mut writer)?;
        writer.flush().wrap_err("Failed to flush output")?;
        value
    };

    tmp.persist(path)
        .wrap_err_with(|| format!("Failed to move output into place at {}", path.display()))?;
    Ok(value)
}
