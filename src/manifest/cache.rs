//! Cache artifact persistence.
//!
//! Every artifact is a pretty-printed JSON object with a `"# Warning"` key
//! and the section data under the section's own key. Writes go to a
//! temporary sibling first and are renamed into place after fsync, so a
//! reader sees either the old file or the new one.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::CacheError;

/// Comment stored in every artifact.
pub const WARNING: &str =
    "Generated from module manifests. Do not edit: changes are lost on the next rebuild.";

/// Key of the comment entry.
pub const WARNING_KEY: &str = "# Warning";

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> CacheError + '_ {
    move |source| CacheError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Writes one artifact atomically.
struct ArtifactWriter {
    temp_path: Option<PathBuf>,
    final_path: PathBuf,
    writer: Option<BufWriter<File>>,
}

impl ArtifactWriter {
    fn new(final_path: &Path) -> Result<Self, CacheError> {
        if let Some(dir) = final_path.parent() {
            fs::create_dir_all(dir).map_err(io_error(dir))?;
        }

        let temp_path = final_path.with_extension(format!("json.tmp.{}", Uuid::new_v4()));
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp_path)
            .map_err(io_error(&temp_path))?;

        Ok(Self {
            temp_path: Some(temp_path),
            final_path: final_path.to_path_buf(),
            writer: Some(BufWriter::new(file)),
        })
    }

    fn write_value(&mut self, value: &Value) -> Result<(), CacheError> {
        let path = self.final_path.clone();
        let writer = self.writer.as_mut().ok_or_else(|| CacheError::Corrupt {
            path: path.clone(),
            reason: "writer already consumed".to_string(),
        })?;
        serde_json::to_writer_pretty(&mut *writer, value).map_err(|e| CacheError::Corrupt {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        writer.write_all(b"\n").map_err(io_error(&path))
    }

    /// Flush, fsync, rename.
    fn finalize(mut self) -> Result<(), CacheError> {
        let (Some(mut writer), Some(temp_path)) = (self.writer.take(), self.temp_path.take()) else {
            return Err(CacheError::Corrupt {
                path: self.final_path.clone(),
                reason: "writer already consumed".to_string(),
            });
        };

        let result = writer
            .flush()
            .and_then(|()| writer.get_ref().sync_all())
            .and_then(|()| fs::rename(&temp_path, &self.final_path));

        if let Err(e) = result {
            let _ = fs::remove_file(&temp_path);
            return Err(io_error(&self.final_path)(e));
        }
        Ok(())
    }
}

impl Drop for ArtifactWriter {
    fn drop(&mut self) {
        self.writer.take();
        if let Some(ref temp_path) = self.temp_path {
            if temp_path.exists() {
                let _ = fs::remove_file(temp_path);
            }
        }
    }
}

/// Serializes `data` under `key` and replaces the artifact at `path`.
pub fn write_artifact<T: Serialize + ?Sized>(path: &Path, key: &str, data: &T) -> Result<(), CacheError> {
    let data = serde_json::to_value(data).map_err(|e| CacheError::Corrupt {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let mut envelope = Map::new();
    envelope.insert(WARNING_KEY.to_string(), Value::String(WARNING.to_string()));
    envelope.insert(key.to_string(), data);

    let mut writer = ArtifactWriter::new(path)?;
    writer.write_value(&Value::Object(envelope))?;
    writer.finalize()
}

/// Reads the data stored under `key`; `None` if the artifact does not exist.
pub fn read_artifact<T: DeserializeOwned>(path: &Path, key: &str) -> Result<Option<T>, CacheError> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(io_error(path)(e)),
    };

    let corrupt = |reason: String| CacheError::Corrupt {
        path: path.to_path_buf(),
        reason,
    };

    let value: Value = serde_json::from_str(&text).map_err(|e| corrupt(e.to_string()))?;
    let Value::Object(mut envelope) = value else {
        return Err(corrupt("expected a JSON object".to_string()));
    };
    let data = envelope
        .remove(key)
        .ok_or_else(|| corrupt(format!("missing {key:?} key")))?;

    serde_json::from_value(data)
        .map(Some)
        .map_err(|e| corrupt(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tempfile::tempdir;

    #[test]
    fn test_write_then_read() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("signatures.cache.json");
        let data: BTreeMap<String, String> = [("/a/module.json".to_string(), "abc".to_string())].into();

        write_artifact(&path, "signatures", &data).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("{\n  \"# Warning\""));

        let back: BTreeMap<String, String> = read_artifact(&path, "signatures").unwrap().unwrap();
        assert_eq!(back, data);
    }

    #[test]
    fn test_missing_artifact_is_none() {
        let dir = tempdir().unwrap();
        let res: Option<Vec<String>> = read_artifact(&dir.path().join("listen.cache.json"), "listen").unwrap();
        assert!(res.is_none());
    }

    #[test]
    fn test_corrupt_artifact() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("listen.cache.json");

        fs::write(&path, "{not json").unwrap();
        let res: Result<Option<Vec<String>>, _> = read_artifact(&path, "listen");
        assert!(matches!(res, Err(CacheError::Corrupt { .. })));

        fs::write(&path, r#"{"emit":[]}"#).unwrap();
        let res: Result<Option<Vec<String>>, _> = read_artifact(&path, "listen");
        assert!(matches!(res, Err(CacheError::Corrupt { ref reason, .. }) if reason.contains("listen")));

        fs::write(&path, "[]").unwrap();
        let res: Result<Option<Vec<String>>, _> = read_artifact(&path, "listen");
        assert!(res.is_err());
    }

    #[test]
    fn test_no_temp_files_left_behind() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.cache.json");
        write_artifact(&path, "config", &Map::new()).unwrap();
        write_artifact(&path, "config", &Map::new()).unwrap();

        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("config.cache.json")]);
    }

    #[test]
    fn test_output_is_deterministic() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.cache.json");
        let mut data = Map::new();
        data.insert("zeta".to_string(), Value::from(1));
        data.insert("alpha".to_string(), Value::from(2));

        write_artifact(&path, "config", &data).unwrap();
        let first = fs::read(&path).unwrap();
        write_artifact(&path, "config", &data).unwrap();
        assert_eq!(first, fs::read(&path).unwrap());
    }
}
