use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::models::MessageDetail;

/// Where HTML previews are written before being handed to a browser.
pub fn preview_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("bucketwatch")
        .join("preview")
}

fn file_part(value: &str) -> String {
    value
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Write the HTML body of `detail` to `<dir>/<mailbox>-<id>.html`, replacing
/// any earlier copy. Returns `NotFound` when the message has no HTML part.
pub fn write_html(detail: &MessageDetail, dir: &Path) -> Result<PathBuf> {
    if !detail.has_html() {
        return Err(Error::NotFound(format!(
            "{} has no HTML body",
            detail.summary.id
        )));
    }
    fs::create_dir_all(dir)
        .map_err(|e| Error::Io(format!("create {}: {e}", dir.display())))?;
    let name = format!(
        "{}-{}.html",
        file_part(&detail.summary.mailbox),
        file_part(&detail.summary.id)
    );
    let path = dir.join(name);
    fs::write(&path, &detail.body.html)
        .map_err(|e| Error::Io(format!("write {}: {e}", path.display())))?;
    log::debug!("HTML preview written to {}", path.display());
    Ok(path)
}
