use std::path::PathBuf;

use crate::repositories::{BoxFuture, RepositoryError, RepositoryResult};

use super::model::Settings;

pub trait SettingsRepository: Send + Sync + 'static {
    /// Load settings, or defaults when nothing was saved yet
    fn load(&self) -> BoxFuture<'static, RepositoryResult<Settings>>;

    fn save(&self, settings: Settings) -> BoxFuture<'static, RepositoryResult<()>>;
}

pub struct SettingsJsonRepository {
    file_path: PathBuf,
}

impl SettingsJsonRepository {
    /// Repository at `<config_dir>/prompt-tester/settings.json`
    pub fn new() -> RepositoryResult<Self> {
        let config_dir = dirs::config_dir().ok_or_else(|| RepositoryError::InitializationError {
            message: "Cannot determine config directory".into(),
        })?;

        Ok(Self::with_path(
            config_dir.join("prompt-tester").join("settings.json"),
        ))
    }

    pub fn with_path(file_path: PathBuf) -> Self {
        Self { file_path }
    }

    pub fn path(&self) -> &PathBuf {
        &self.file_path
    }
}

fn join_error(e: tokio::task::JoinError) -> RepositoryError {
    RepositoryError::IoError(std::io::Error::other(e))
}

impl SettingsRepository for SettingsJsonRepository {
    fn load(&self) -> BoxFuture<'static, RepositoryResult<Settings>> {
        let path = self.file_path.clone();

        Box::pin(async move {
            let contents = match tokio::fs::read_to_string(&path).await {
                Ok(contents) => contents,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    return Ok(Settings::default());
                }
                Err(e) => return Err(e.into()),
            };

            Ok(serde_json::from_str(&contents)?)
        })
    }

    fn save(&self, settings: Settings) -> BoxFuture<'static, RepositoryResult<()>> {
        let path = self.file_path.clone();

        Box::pin(async move {
            let json = serde_json::to_string_pretty(&settings)?;

            tokio::task::spawn_blocking(move || {
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)?;
                }

                // Write atomically using temp file + rename
                let temp_path = path.with_extension("json.tmp");
                std::fs::write(&temp_path, &json)?;
                std::fs::rename(&temp_path, &path)?;

                Ok::<(), RepositoryError>(())
            })
            .await
            .map_err(join_error)?
        })
    }
}
