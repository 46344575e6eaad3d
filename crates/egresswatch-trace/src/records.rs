//! The persisted structured event artifact.
//!
//! One JSON record per line, fields exactly as in
//! [`egresswatch_common::event::ConnectionEvent`], written in event order,
//! UTF-8. Writing then re-reading yields the same event sequence
//! field-for-field; readers skip records they cannot decode rather than
//! failing the whole artifact.

use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use egresswatch_common::error::{EgressWatchError, Result};
use egresswatch_common::event::ConnectionEvent;

/// Writes events to the structured artifact, one record per line.
///
/// Creates parent directories as needed. Returns the number of records
/// written.
///
/// # Errors
///
/// Returns an error if the file cannot be created or written, or if a
/// record fails to serialize.
pub fn write_events(path: &Path, events: &[ConnectionEvent]) -> Result<usize> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| EgressWatchError::Io {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }
    let file = std::fs::File::create(path).map_err(|e| EgressWatchError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    let mut writer = BufWriter::new(file);
    for event in events {
        let record = serde_json::to_string(event)?;
        writeln!(writer, "{record}").map_err(|e| EgressWatchError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
    }
    writer.flush().map_err(|e| EgressWatchError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(events.len())
}

/// Reads events back from the structured artifact.
///
/// A missing file reads as an empty run. Blank lines and records that do
/// not decode are skipped; event order is preserved.
///
/// # Errors
///
/// Returns an error if an existing file cannot be read.
pub fn read_events(path: &Path) -> Result<Vec<ConnectionEvent>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let file = std::fs::File::open(path).map_err(|e| EgressWatchError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;

    let mut events = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line.map_err(|e| EgressWatchError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<ConnectionEvent>(line) {
            Ok(event) => events.push(event),
            Err(error) => {
                tracing::debug!(%error, "skipping undecodable event record");
            }
        }
    }
    Ok(events)
}
