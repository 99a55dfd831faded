//! Reading and writing entity files.
//!
//! Files are YAML, read permissively: every persisted struct carries serde
//! defaults so unknown or missing fields never fail a load. Writes go to a
//! sibling temp file that is then renamed over the target.

use fs2::FileExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::error::{PmfsError, Result};

const LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// Reads a YAML file. `Ok(None)` when the file does not exist.
pub fn read_yaml<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(PmfsError::io("open", path, e)),
    };
    let reader = BufReader::new(file);
    match serde_yaml::from_reader(reader) {
        Ok(value) => Ok(Some(value)),
        Err(source) => Err(PmfsError::Yaml {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Reads a YAML file, synthesizing and writing back `T::default()` when it is missing.
pub fn read_yaml_or_create<T>(path: &Path) -> Result<T>
where
    T: DeserializeOwned + Serialize + Default,
{
    match read_yaml(path)? {
        Some(value) => Ok(value),
        None => {
            let value = T::default();
            write_yaml(path, &value)?;
            Ok(value)
        }
    }
}

/// Serializes `value` as YAML and replaces `path` with it.
pub fn write_yaml<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let yaml = serde_yaml::to_string(value).map_err(|source| PmfsError::Yaml {
        path: path.to_path_buf(),
        source,
    })?;
    atomic_write(path, yaml.as_bytes())
}

/// Reads a JSON file into `T`.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = fs::read_to_string(path).map_err(|e| PmfsError::io("read", path, e))?;
    serde_json::from_str(&content).map_err(|source| PmfsError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Serializes `value` as pretty JSON and replaces `path` with it.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).map_err(|source| PmfsError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    atomic_write(path, json.as_bytes())
}

/// Writes data using temp file + rename so readers never see a torn file.
pub fn atomic_write(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| PmfsError::io("mkdir", parent, e))?;
    }

    let tmp_path = tmp_path_for(path);
    {
        let mut file = File::create(&tmp_path).map_err(|e| PmfsError::io("create", &tmp_path, e))?;
        file.write_all(data)
            .map_err(|e| PmfsError::io("write", &tmp_path, e))?;
        file.sync_all()
            .map_err(|e| PmfsError::io("sync", &tmp_path, e))?;
    }

    fs::rename(&tmp_path, path).map_err(|e| PmfsError::io("rename", path, e))
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Exclusive advisory lock on `<file>.lock`, released on drop.
pub struct WriteLock {
    file: File,
}

impl WriteLock {
    /// Acquires the lock guarding `target`, waiting up to five seconds.
    pub fn acquire(target: &Path) -> Result<Self> {
        let mut name = target
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".lock");
        let lock_path = target.with_file_name(name);

        if let Some(parent) = lock_path.parent() {
            fs::create_dir_all(parent).map_err(|e| PmfsError::io("mkdir", parent, e))?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&lock_path)
            .map_err(|e| PmfsError::io("open lock", &lock_path, e))?;

        let start = Instant::now();
        loop {
            match file.try_lock_exclusive() {
                Ok(()) => break,
                Err(e) if e.kind() == ErrorKind::WouldBlock => {
                    if start.elapsed() > LOCK_TIMEOUT {
                        return Err(PmfsError::Locked(target.to_path_buf()));
                    }
                    std::thread::sleep(Duration::from_millis(50));
                }
                Err(e) => return Err(PmfsError::io("lock", &lock_path, e)),
            }
        }

        // Holder info, for debugging only.
        let _ = writeln!(
            file,
            "Locked by PID {} at {}",
            std::process::id(),
            chrono::Utc::now().to_rfc3339()
        );

        Ok(Self { file })
    }
}

impl Drop for WriteLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}
