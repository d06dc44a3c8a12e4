use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::params::{ParameterError, TrackingParameters};

pub const DEFAULT_PROFILE_NAME: &str = "Default";
const PROFILES_FILENAME: &str = "profiles.json";

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("failed to access profile store at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("profile store at {path} is corrupt: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("a profile named {0:?} already exists")]
    DuplicateName(String),
    #[error("no profile with id {0}")]
    NotFound(u64),
    #[error("profile has no id")]
    MissingId,
    #[error("profile {name:?} has invalid parameters: {source}")]
    InvalidParameters {
        name: String,
        #[source]
        source: ParameterError,
    },
}

/// Named parameter set as stored on disk.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    /// Assigned by the store on create.
    #[serde(default)]
    pub id: Option<u64>,
    pub name: String,
    pub camera_index: u32,
    pub sensitivity: f32,
    pub smoothing: f32,
    pub pinch_threshold: f32,
}

impl Profile {
    pub fn new(name: impl Into<String>, camera_index: u32, params: TrackingParameters) -> Self {
        Self {
            id: None,
            name: name.into(),
            camera_index,
            sensitivity: params.sensitivity,
            smoothing: params.smoothing_factor,
            pinch_threshold: params.pinch_threshold,
        }
    }

    pub fn parameters(&self) -> TrackingParameters {
        TrackingParameters {
            smoothing_factor: self.smoothing,
            pinch_threshold: self.pinch_threshold,
            sensitivity: self.sensitivity,
        }
    }

    fn validate(&self) -> Result<(), ProfileError> {
        self.parameters()
            .validate()
            .map_err(|source| ProfileError::InvalidParameters {
                name: self.name.clone(),
                source,
            })
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct StoreFile {
    next_id: u64,
    profiles: Vec<Profile>,
}

/// Profiles persisted as one JSON document, rewritten on every change.
#[derive(Debug)]
pub struct ProfileStore {
    path: PathBuf,
    data: StoreFile,
}

pub fn default_profiles_path() -> PathBuf {
    dirs::config_dir()
        .map(|dir| dir.join("wave-vision"))
        .unwrap_or_else(|| PathBuf::from("."))
        .join(PROFILES_FILENAME)
}

impl ProfileStore {
    pub fn open_default() -> Result<Self, ProfileError> {
        Self::open(default_profiles_path())
    }

    /// Loads the store, creating it with a `Default` profile when missing or empty.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ProfileError> {
        let path = path.into();
        let data = match fs::read_to_string(&path) {
            Ok(content) => {
                serde_json::from_str(&content).map_err(|source| ProfileError::Parse {
                    path: path.clone(),
                    source,
                })?
            }
            Err(err) if err.kind() == ErrorKind::NotFound => StoreFile::default(),
            Err(source) => return Err(ProfileError::Io { path, source }),
        };

        let mut store = Self { path, data };
        if store.data.profiles.is_empty() {
            log::info!("seeding profile store at {}", store.path.display());
            store.create(Profile::new(
                DEFAULT_PROFILE_NAME,
                0,
                TrackingParameters::default(),
            ))?;
        }
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn create(&mut self, mut profile: Profile) -> Result<u64, ProfileError> {
        profile.validate()?;
        if self.get_by_name(&profile.name).is_some() {
            return Err(ProfileError::DuplicateName(profile.name));
        }

        let mut data = self.data.clone();
        let id = data.next_id.max(1);
        data.next_id = id + 1;
        profile.id = Some(id);
        data.profiles.push(profile);
        self.commit(data)?;
        Ok(id)
    }

    pub fn get(&self, id: u64) -> Option<&Profile> {
        self.data.profiles.iter().find(|p| p.id == Some(id))
    }

    pub fn get_by_name(&self, name: &str) -> Option<&Profile> {
        self.data.profiles.iter().find(|p| p.name == name)
    }

    pub fn list(&self) -> &[Profile] {
        &self.data.profiles
    }

    pub fn update(&mut self, profile: Profile) -> Result<(), ProfileError> {
        let id = profile.id.ok_or(ProfileError::MissingId)?;
        profile.validate()?;
        if self
            .data
            .profiles
            .iter()
            .any(|p| p.name == profile.name && p.id != Some(id))
        {
            return Err(ProfileError::DuplicateName(profile.name));
        }

        let mut data = self.data.clone();
        let slot = data
            .profiles
            .iter_mut()
            .find(|p| p.id == Some(id))
            .ok_or(ProfileError::NotFound(id))?;
        *slot = profile;
        self.commit(data)
    }

    pub fn delete(&mut self, id: u64) -> Result<(), ProfileError> {
        let mut data = self.data.clone();
        data.profiles.retain(|p| p.id != Some(id));
        if data.profiles.len() == self.data.profiles.len() {
            return Err(ProfileError::NotFound(id));
        }
        self.commit(data)
    }

    /// Writes `data` to disk and adopts it only once the write succeeded.
    fn commit(&mut self, data: StoreFile) -> Result<(), ProfileError> {
        self.save(&data)?;
        self.data = data;
        Ok(())
    }

    fn save(&self, data: &StoreFile) -> Result<(), ProfileError> {
        let io_err = |source| ProfileError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }

        let content = serde_json::to_string_pretty(data).map_err(|source| {
            ProfileError::Parse {
                path: self.path.clone(),
                source,
            }
        })?;
        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, content).map_err(io_err)?;
        fs::rename(&tmp_path, &self.path).map_err(io_err)?;
        log::debug!("saved {} profiles to {}", data.profiles.len(), self.path.display());
        Ok(())
    }
}
