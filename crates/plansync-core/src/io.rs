use crate::error::{PlansyncError, Result};
use std::io::ErrorKind;
use std::path::Path;

/// Read an artifact file, mapping I/O failures to distinct human-readable
/// reasons instead of raw OS errors.
pub async fn read_artifact(path: &Path) -> Result<String> {
    match tokio::fs::read_to_string(path).await {
        Ok(text) => Ok(text),
        Err(e) => Err(map_read_error(path, e)),
    }
}

fn map_read_error(path: &Path, e: std::io::Error) -> PlansyncError {
    let display = path.display().to_string();
    match e.kind() {
        ErrorKind::NotFound => PlansyncError::FileNotFound(display),
        ErrorKind::PermissionDenied => PlansyncError::PermissionDenied(display),
        // read_to_string on a directory reports IsADirectory on most
        // platforms, InvalidInput on some.
        ErrorKind::InvalidInput => PlansyncError::NotAFile(display),
        _ if path.is_dir() => PlansyncError::NotAFile(display),
        _ => PlansyncError::Read {
            path: display,
            source: e,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn missing_file_maps_to_not_found() {
        let dir = TempDir::new().unwrap();
        let err = read_artifact(&dir.path().join("nope.md")).await.unwrap_err();
        assert!(matches!(err, PlansyncError::FileNotFound(_)));
        assert!(err.to_string().contains("nope.md"));
    }

    #[tokio::test]
    async fn directory_maps_to_not_a_file() {
        let dir = TempDir::new().unwrap();
        let sub = dir.path().join("stories");
        std::fs::create_dir(&sub).unwrap();
        let err = read_artifact(&sub).await.unwrap_err();
        assert!(matches!(
            err,
            PlansyncError::NotAFile(_) | PlansyncError::Read { .. }
        ));
    }

    #[tokio::test]
    async fn reads_content() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.md");
        std::fs::write(&path, "hello").unwrap();
        assert_eq!(read_artifact(&path).await.unwrap(), "hello");
    }
}
