//! JSON-backed profile store: `{ "version": 1, "profiles": { name: profile } }`.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::AgentProfile;
use crate::error::{Error, Result};

const FORMAT_VERSION: u32 = 1;

/// On-disk layout of the store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfilesFile {
    #[serde(default)]
    pub profiles: BTreeMap<String, AgentProfile>,
    #[serde(default)]
    pub version: u32,
}

/// Named agent profiles persisted to one JSON file.
#[derive(Debug, Clone)]
pub struct ProfileStore {
    path: PathBuf,
    file: ProfilesFile,
}

impl ProfileStore {
    /// Load the store at `path`. A missing file yields an empty store.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let mut file: ProfilesFile = match fs::read(&path) {
            Ok(data) => serde_json::from_slice(&data).map_err(|source| {
                Error::ProfileFormat {
                    path: path.clone(),
                    source,
                }
                .boxed()
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(target: "snmp_poller::profile", path = %path.display(), "no profile store yet");
                ProfilesFile::default()
            }
            Err(source) => return Err(Error::ProfileIo { path, source }.boxed()),
        };

        for (name, profile) in file.profiles.iter_mut() {
            profile.name.clone_from(name);
        }
        tracing::debug!(target: "snmp_poller::profile", path = %path.display(), count = file.profiles.len(), "loaded profiles");

        Ok(Self { path, file })
    }

    /// Default location under the user's config directory.
    #[cfg(feature = "cli")]
    pub fn default_path() -> PathBuf {
        let base = match std::env::var_os("XDG_CONFIG_HOME") {
            Some(xdg) => PathBuf::from(xdg),
            None => dirs_next::config_dir().unwrap_or_else(|| PathBuf::from(".")),
        };
        base.join("snmp-poller").join("profiles.json")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, name: &str) -> Option<&AgentProfile> {
        self.file.profiles.get(name)
    }

    /// Insert or replace the profile stored under `profile.name`.
    pub fn insert(&mut self, profile: AgentProfile) -> Option<AgentProfile> {
        self.file.profiles.insert(profile.name.clone(), profile)
    }

    pub fn remove(&mut self, name: &str) -> Option<AgentProfile> {
        self.file.profiles.remove(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.file.profiles.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.file.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.file.profiles.is_empty()
    }

    /// Write the store back to its path, creating parent directories.
    pub fn save(&self) -> Result<()> {
        let io_err = |source| {
            Error::ProfileIo {
                path: self.path.clone(),
                source,
            }
            .boxed()
        };
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let file = ProfilesFile {
            profiles: self.file.profiles.clone(),
            version: FORMAT_VERSION,
        };
        let data = serde_json::to_vec_pretty(&file).map_err(|source| {
            Error::ProfileFormat {
                path: self.path.clone(),
                source,
            }
            .boxed()
        })?;
        fs::write(&self.path, data).map_err(io_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::Version;

    #[test]
    fn missing_file_is_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProfileStore::load(dir.path().join("none.json")).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn names_come_from_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profiles.json");
        fs::write(
            &path,
            r#"{ "profiles": { "core-sw": { "address": "192.0.2.10", "version": "v1" } } }"#,
        )
        .unwrap();

        let store = ProfileStore::load(&path).unwrap();
        let profile = store.get("core-sw").unwrap();
        assert_eq!(profile.name, "core-sw");
        assert_eq!(profile.version, Version::V1);
        assert_eq!(store.names().collect::<Vec<_>>(), ["core-sw"]);
    }

    #[test]
    fn garbage_is_a_format_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profiles.json");
        fs::write(&path, "not json").unwrap();

        let err = ProfileStore::load(&path).unwrap_err();
        assert!(matches!(*err, Error::ProfileFormat { .. }));
    }
}
