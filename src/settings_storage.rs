// Load/save settings in an Xresources-style file under the hoverpeek config directory.
use std::collections::HashMap;
use std::fs;
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("unable to open settings storage {path}: {source}")]
    Open { path: PathBuf, source: io::Error },
    #[error("unable to read settings storage {path}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("unable to write settings storage {path}: {source}")]
    Write { path: PathBuf, source: io::Error },
    #[error("unable to create settings directory {path}: {source}")]
    CreateDir { path: PathBuf, source: io::Error },
    #[error("{path} line {line}: {reason}")]
    Malformed {
        path: PathBuf,
        line: usize,
        reason: &'static str,
    },
}

#[derive(Clone, Debug)]
pub struct SettingsStorage {
    path: PathBuf,
}

impl SettingsStorage {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn default_path() -> PathBuf {
        let mut path = match std::env::var_os("HOME") {
            Some(home) => PathBuf::from(home),
            None => PathBuf::from("."),
        };
        path.push(".config");
        path.push("hoverpeek");
        path.push("Settings.xresources");
        path
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every `key: value` entry. A missing file is an empty map.
    pub fn load(&self) -> Result<HashMap<String, String>, StorageError> {
        let file = match fs::File::open(&self.path) {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(HashMap::new()),
            Err(source) => {
                return Err(StorageError::Open {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        let mut map = HashMap::new();
        for (index, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|source| StorageError::Read {
                path: self.path.clone(),
                source,
            })?;
            match parse_line(&line) {
                Ok(Some((key, value))) => {
                    map.insert(key.to_string(), value.to_string());
                }
                Ok(None) => {}
                Err(reason) => {
                    return Err(StorageError::Malformed {
                        path: self.path.clone(),
                        line: index + 1,
                        reason,
                    });
                }
            }
        }
        Ok(map)
    }

    /// Write all entries sorted by key, creating the parent directory when needed.
    pub fn save(&self, map: &HashMap<String, String>) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| StorageError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let write_err = |source| StorageError::Write {
            path: self.path.clone(),
            source,
        };
        let mut file = fs::File::create(&self.path).map_err(write_err)?;

        let mut entries: Vec<(&String, &String)> = map.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        for (key, value) in entries {
            writeln!(file, "{key}: {value}").map_err(write_err)?;
        }
        Ok(())
    }
}

fn parse_line(line: &str) -> Result<Option<(&str, &str)>, &'static str> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('!') || trimmed.starts_with('#') {
        return Ok(None);
    }
    let (key, value) = trimmed
        .split_once([':', '='])
        .ok_or("missing ':' or '=' separator")?;
    let key = key.trim();
    if key.is_empty() {
        return Err("empty key");
    }
    Ok(Some((key, value.trim())))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_storage(name: &str) -> (SettingsStorage, PathBuf) {
        let mut dir = std::env::temp_dir();
        dir.push(format!(
            "hoverpeek_storage_test_{}_{}",
            name,
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        let file_path = dir.join("Settings.xresources");
        (SettingsStorage::new(file_path), dir)
    }

    #[test]
    fn load_missing_file_returns_empty_map() {
        let (storage, dir) = temp_storage("missing");

        let map = storage.load().expect("load missing file");
        assert!(map.is_empty());

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn save_creates_directory_and_sorts_by_key() {
        let (storage, dir) = temp_storage("sorted");
        let mut map = HashMap::new();
        map.insert("hoverpeek.zeta".to_string(), "last".to_string());
        map.insert("hoverpeek.alpha".to_string(), "first".to_string());

        storage.save(&map).expect("save settings");
        let contents = fs::read_to_string(storage.path()).expect("read settings storage");
        assert_eq!(contents, "hoverpeek.alpha: first\nhoverpeek.zeta: last\n");

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn load_skips_comments_and_accepts_both_separators() {
        let (storage, dir) = temp_storage("parse");
        fs::create_dir_all(&dir).expect("create temp test dir");
        let data = "\n! comment\n# comment\nkey.one: value\nkey.two=other\nkey.three: a=b\n";
        fs::write(storage.path(), data).expect("write settings storage");

        let map = storage.load().expect("load parsed settings");
        assert_eq!(map.get("key.one").map(String::as_str), Some("value"));
        assert_eq!(map.get("key.two").map(String::as_str), Some("other"));
        assert_eq!(map.get("key.three").map(String::as_str), Some("a=b"));

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn malformed_line_reports_line_number() {
        let (storage, dir) = temp_storage("malformed");
        fs::create_dir_all(&dir).expect("create temp test dir");
        fs::write(storage.path(), "ok: 1\nnot a setting\n").expect("write settings storage");

        let err = storage.load().unwrap_err();
        assert!(matches!(err, StorageError::Malformed { line: 2, .. }));
        assert!(err.to_string().contains("missing ':' or '=' separator"));

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn empty_key_is_rejected() {
        assert_eq!(parse_line(": value"), Err("empty key"));
        assert_eq!(parse_line("   "), Ok(None));
    }
}
