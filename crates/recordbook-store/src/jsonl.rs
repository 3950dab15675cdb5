//! JSONL storage: one tagged row per line.
//!
//! The portable on-disk form of a [`MemoryStore`](crate::MemoryStore). Each
//! line carries a `kind` tag naming its table.

use crate::build_record::BuildRecord;
use crate::strike::UserStrike;
use crate::ticket::GuildTicketChannel;
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// One persisted line.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum StoreRow {
    BuildRecord(BuildRecord),
    UserStrike(UserStrike),
    GuildTicket(GuildTicketChannel),
    Watermark(Watermark),
}

/// Surrogate id high-water mark, persisted so deleted ids are never handed out again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Watermark {
    pub next_build_record_id: u64,
}

/// Read rows from a JSONL reader.
pub fn read_rows(reader: impl BufRead) -> Result<Vec<StoreRow>, JsonlError> {
    let mut rows = Vec::new();
    for (line_no, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| JsonlError::Io(line_no + 1, e.to_string()))?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let row: StoreRow = serde_json::from_str(trimmed)
            .map_err(|e| JsonlError::Parse(line_no + 1, e.to_string()))?;
        rows.push(row);
    }
    Ok(rows)
}

/// Write rows to a JSONL writer.
pub fn write_rows(writer: &mut impl Write, rows: &[StoreRow]) -> Result<(), JsonlError> {
    for row in rows {
        let line = serde_json::to_string(row).map_err(|e| JsonlError::Serialize(e.to_string()))?;
        writeln!(writer, "{line}").map_err(|e| JsonlError::Io(0, e.to_string()))?;
    }
    Ok(())
}

/// Read rows from a JSONL file path.
pub fn read_rows_from_path(path: impl AsRef<Path>) -> Result<Vec<StoreRow>, JsonlError> {
    let path = path.as_ref();
    let bytes =
        fs::read(path).map_err(|e| JsonlError::Io(0, format!("{}: {e}", path.display())))?;
    validate_store_bytes(path, &bytes)?;
    read_rows(BufReader::new(bytes.as_slice()))
}

/// Write rows to a JSONL file path via temp file + rename.
pub fn write_rows_to_path(path: impl AsRef<Path>, rows: &[StoreRow]) -> Result<(), JsonlError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .map_err(|e| JsonlError::Io(0, format!("{}: {e}", parent.display())))?;
    }

    let tmp_path = tmp_write_path(path);
    let write_result = (|| -> Result<(), JsonlError> {
        let io_err = |e: std::io::Error| JsonlError::Io(0, format!("{}: {e}", tmp_path.display()));
        let file = File::create(&tmp_path).map_err(io_err)?;
        let mut writer = BufWriter::new(file);
        write_rows(&mut writer, rows)?;
        writer.flush().map_err(io_err)?;
        let file = writer.into_inner().map_err(|e| io_err(e.into_error()))?;
        file.sync_all().map_err(io_err)?;
        Ok(())
    })();

    if let Err(error) = write_result {
        let _ = fs::remove_file(&tmp_path);
        return Err(error);
    }

    fs::rename(&tmp_path, path).map_err(|e| {
        let _ = fs::remove_file(&tmp_path);
        JsonlError::Io(
            0,
            format!("{} -> {}: {e}", tmp_path.display(), path.display()),
        )
    })?;

    sync_parent_dir(path)
}

/// Flush the directory entry so the rename survives a crash.
fn sync_parent_dir(path: &Path) -> Result<(), JsonlError> {
    let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) else {
        return Ok(());
    };
    File::open(parent)
        .and_then(|dir| dir.sync_all())
        .map_err(|e| JsonlError::Io(0, format!("{}: {e}", parent.display())))
}

fn tmp_write_path(path: &Path) -> PathBuf {
    let unique = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let mut tmp: OsString = path.as_os_str().to_os_string();
    tmp.push(format!(".tmp.{}.{}", std::process::id(), unique));
    PathBuf::from(tmp)
}

fn validate_store_bytes(path: &Path, bytes: &[u8]) -> Result<(), JsonlError> {
    if bytes.contains(&0) {
        return Err(JsonlError::Corrupt(format!(
            "{}: contains NUL byte(s)",
            path.display()
        )));
    }
    if std::str::from_utf8(bytes).is_err() {
        return Err(JsonlError::Corrupt(format!(
            "{}: contains non-UTF-8 byte sequence(s)",
            path.display()
        )));
    }
    Ok(())
}

/// Errors from JSONL operations.
#[derive(Debug, thiserror::Error)]
pub enum JsonlError {
    #[error("line {0}: I/O error: {1}")]
    Io(usize, String),

    #[error("line {0}: parse error: {1}")]
    Parse(usize, String),

    #[error("serialization error: {0}")]
    Serialize(String),

    #[error("corrupted store file: {0}")]
    Corrupt(String),
}
