use std::fs;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

use chrono::DateTime;
use chrono::Utc;
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::CompressionMethod;
use zip::ZipWriter;

use crate::file_io::create_parent_dir_if_not_exist;
use crate::time::year_month;
use crate::Result;
use crate::StorageError;

/// Archives `source` as `<backup_dir>/<YYYY>/<MM>/<stem>.<tag>.zip`.
///
/// The archive holds a single entry named `<file name>.backup.<tag>`.
/// Returns `Ok(None)` when there is no file to back up yet.
pub(crate) fn archive_file(
    source: &Path,
    backup_dir: &Path,
    tag: &str,
    now: DateTime<Utc>,
) -> Result<Option<PathBuf>> {
    if !source.is_file() {
        debug!("nothing to back up at {:?}", source);
        return Ok(None);
    }

    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let file_name = source
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let (year, month) = year_month(now);
    let archive = backup_dir
        .join(year)
        .join(month)
        .join(format!("{stem}.{tag}.zip"));

    let content = fs::read(source).map_err(|e| StorageError::PathError {
        path: source.to_path_buf(),
        source: e,
    })?;

    create_parent_dir_if_not_exist(&archive)?;
    let backup_failed = |reason: String| StorageError::Backup {
        path: archive.clone(),
        reason,
    };
    let file = File::create(&archive).map_err(|e| backup_failed(e.to_string()))?;
    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    zip.start_file(format!("{file_name}.backup.{tag}"), options)
        .map_err(|e| backup_failed(e.to_string()))?;
    zip.write_all(&content)
        .map_err(|e| backup_failed(e.to_string()))?;
    zip.finish().map_err(|e| backup_failed(e.to_string()))?;

    debug!("backed up {:?} into {:?}", source, archive);
    Ok(Some(archive))
}
