//! File Sink — spec.md §4.4.
//!
//! Writes the converter output only; file sinks never embed envelopes.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tokio::io::AsyncWriteExt;

use crate::error::{SinkError, SinkResult};

#[derive(Debug, Clone)]
pub struct FileSink {
    output_dir: PathBuf,
}

impl FileSink {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// Write `converter_output` to `{output-dir}/{basename-without-ext}.json`,
    /// creating the output directory if needed, pretty-printed for human
    /// inspection.
    pub async fn send(&self, basename: &str, converter_output: &Value) -> SinkResult<PathBuf> {
        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|source| SinkError::OutputDirCreate {
                path: self.output_dir.display().to_string(),
                source,
            })?;

        let stem = Path::new(basename)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(basename);
        let target = self.output_dir.join(format!("{stem}.json"));

        let bytes = serde_json::to_vec_pretty(converter_output)?;

        let mut file = tokio::fs::File::create(&target)
            .await
            .map_err(|source| SinkError::FileWrite {
                path: target.display().to_string(),
                source,
            })?;
        file.write_all(&bytes)
            .await
            .map_err(|source| SinkError::FileWrite {
                path: target.display().to_string(),
                source,
            })?;
        file.flush().await.map_err(|source| SinkError::FileWrite {
            path: target.display().to_string(),
            source,
        })?;

        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn writes_pretty_json_to_output_dir() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileSink::new(dir.path().join("out"));
        let payload = json!([{"id": "1", "name": "Widget"}]);

        let path = sink.send("data.csv", &payload).await.unwrap();
        assert_eq!(path.file_name().unwrap(), "data.json");

        let written = tokio::fs::read_to_string(&path).await.unwrap();
        assert!(written.contains("\n"));
        let parsed: Value = serde_json::from_str(&written).unwrap();
        assert_eq!(parsed, payload);
    }
}
