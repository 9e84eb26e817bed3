use crate::domain::ports::{PreferenceStore, Preferences};
use crate::utils::error::Result;
use std::fs;
use std::path::{Path, PathBuf};

/// Preferences kept in a small JSON file next to the user.
#[derive(Debug, Clone)]
pub struct LocalPreferences {
    path: PathBuf,
}

impl LocalPreferences {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PreferenceStore for LocalPreferences {
    async fn load(&self) -> Result<Option<Preferences>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let data = fs::read(&self.path)?;
        match serde_json::from_slice(&data) {
            Ok(prefs) => Ok(Some(prefs)),
            Err(e) => {
                // 檔案壞掉就當作沒有偏好，下一次保存會覆蓋
                tracing::warn!("Ignoring unreadable preferences {}: {}", self.path.display(), e);
                Ok(None)
            }
        }
    }

    async fn save(&self, prefs: &Preferences) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let data = serde_json::to_vec_pretty(prefs)?;
        fs::write(&self.path, data)?;
        Ok(())
    }
}
