//! Baseline profile files

use std::fs;
use std::path::{Path, PathBuf};

use calibration::UserBaselineProfile;
use tracing::{debug, info, warn};

use crate::StorageError;

const PROFILE_SUFFIX: &str = "_profile.json";

/// Directory of `<user>_profile.json` files
#[derive(Debug, Clone)]
pub struct ProfileStore {
    dir: PathBuf,
}

impl ProfileStore {
    /// Open (and create if needed) a profile directory
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        info!("Profile store at {}", dir.display());
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File path for a user id; characters outside `[A-Za-z0-9_-]` become `_`
    pub fn path_for(&self, user_id: &str) -> PathBuf {
        let safe: String = user_id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("{}{}", safe, PROFILE_SUFFIX))
    }

    /// Write the profile, replacing any previous one for the same user
    pub fn save(&self, profile: &UserBaselineProfile) -> Result<PathBuf, StorageError> {
        let json = profile
            .to_json()
            .map_err(|e| StorageError::SerializationError(e.to_string()))?;
        let path = self.path_for(&profile.user_id);
        let tmp = path.with_extension("json.tmp");

        fs::write(&tmp, json)?;
        fs::rename(&tmp, &path)?;
        info!(
            "Saved profile '{}' (calibrated={}) to {}",
            profile.user_id,
            profile.is_calibrated,
            path.display()
        );
        Ok(path)
    }

    pub fn load(&self, user_id: &str) -> Result<UserBaselineProfile, StorageError> {
        let path = self.path_for(user_id);
        if !path.exists() {
            return Err(StorageError::NotFound);
        }
        let json = fs::read_to_string(&path)?;
        let profile = UserBaselineProfile::from_json(&json)
            .map_err(|e| StorageError::SerializationError(e.to_string()))?;
        debug!("Loaded profile '{}' from {}", user_id, path.display());
        Ok(profile)
    }

    /// Stored profile, or an uncalibrated one when none exists or it is unreadable
    pub fn load_or_uncalibrated(&self, user_id: &str) -> UserBaselineProfile {
        match self.load(user_id) {
            Ok(profile) => profile,
            Err(StorageError::NotFound) => {
                info!("No stored profile for '{}', starting uncalibrated", user_id);
                UserBaselineProfile::uncalibrated(user_id)
            }
            Err(e) => {
                warn!("Ignoring unreadable profile for '{}': {}", user_id, e);
                UserBaselineProfile::uncalibrated(user_id)
            }
        }
    }

    pub fn exists(&self, user_id: &str) -> bool {
        self.path_for(user_id).exists()
    }

    pub fn delete(&self, user_id: &str) -> Result<(), StorageError> {
        let path = self.path_for(user_id);
        if !path.exists() {
            return Err(StorageError::NotFound);
        }
        fs::remove_file(path)?;
        Ok(())
    }

    /// File stems of every stored profile, sorted
    pub fn list_users(&self) -> Result<Vec<String>, StorageError> {
        let mut users = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let name = entry?.file_name();
            if let Some(user) = name.to_str().and_then(|n| n.strip_suffix(PROFILE_SUFFIX)) {
                users.push(user.to_string());
            }
        }
        users.sort();
        Ok(users)
    }
}
