//! Reading and writing pipeline artifacts on disk.
//!
//! Record streams and graphs travel between runs as JSON; DOT output is plain
//! text. Writers create missing parent directories and serialize fully before
//! touching the file, so a failed run leaves nothing behind.

use crate::error::AstraError;
use crate::graph::Graph;
use crate::record::RecordStream;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, AstraError> {
    let text = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

pub fn read_stream(path: &Path) -> Result<RecordStream, AstraError> {
    read_json(path)
}

pub fn read_graph(path: &Path) -> Result<Graph, AstraError> {
    read_json(path)
}

/// Serialize `value`, pretty-printed or compact, and write it to `path`.
pub fn write_json<T: Serialize>(path: &Path, value: &T, pretty: bool) -> Result<(), AstraError> {
    let json = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    write_text(path, &json)
}

pub fn write_text(path: &Path, contents: &str) -> Result<(), AstraError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, contents)?;
    Ok(())
}
