//! File-readiness check — spec.md §4.8 "File-readiness check (all modes)".
//!
//! A file is ready when two stats separated by a short interval observe
//! identical size and the path is still a regular file. Guards against
//! emitting a file that is still being written.

use std::path::Path;
use std::time::Duration;

pub async fn is_file_ready(path: &Path, interval_ms: u64) -> bool {
    let Ok(first) = tokio::fs::metadata(path).await else {
        return false;
    };
    if !first.is_file() {
        return false;
    }
    let first_len = first.len();

    tokio::time::sleep(Duration::from_millis(interval_ms)).await;

    let Ok(second) = tokio::fs::metadata(path).await else {
        return false;
    };
    second.is_file() && second.len() == first_len
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[tokio::test]
    async fn stable_file_is_ready() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"hello").unwrap();
        assert!(is_file_ready(file.path(), 10).await);
    }

    #[tokio::test]
    async fn missing_file_is_not_ready() {
        assert!(!is_file_ready(Path::new("/nonexistent/path.csv"), 10).await);
    }
}
