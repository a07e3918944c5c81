use crate::ini::Document;
use std::env;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;

const ACCESS_KEY_ID: &str = "aws_access_key_id";
const SECRET_ACCESS_KEY: &str = "aws_secret_access_key";

#[derive(Debug, Error)]
pub(crate) enum PatchError {
    #[error("unable to detect user home directory")]
    HomeDir,
    #[error("unable to open credentials file {}: {source}", path.display())]
    Open { path: PathBuf, source: io::Error },
    #[error("unable to write backup file {}: {source}", path.display())]
    Backup { path: PathBuf, source: io::Error },
    #[error("credentials file {} is not valid UTF-8", path.display())]
    Parse { path: PathBuf },
    #[error("unable to save updated credentials file {}: {source}", path.display())]
    Save { path: PathBuf, source: io::Error },
    #[error("unable to find access_key_id {access_key_id:?} in credentials file {}", path.display())]
    NotFound { access_key_id: String, path: PathBuf },
}

/// The shared credentials file and the backup written next to it before every update.
#[derive(Clone, Debug)]
pub(crate) struct CredentialsFile {
    path: PathBuf,
    backup: PathBuf,
}

impl CredentialsFile {
    pub(crate) fn locate() -> Result<Self, PatchError> {
        let path = match env::var_os("AWS_SHARED_CREDENTIALS_FILE") {
            Some(path) => PathBuf::from(path),
            None => dirs::home_dir()
                .ok_or(PatchError::HomeDir)?
                .join(".aws")
                .join("credentials"),
        };
        Ok(Self::new(path))
    }

    pub(crate) fn new(path: PathBuf) -> Self {
        let mut backup = path.clone().into_os_string();
        backup.push(".bak");
        Self {
            path,
            backup: backup.into(),
        }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn backup(&self) -> &Path {
        &self.backup
    }

    /// Points the first profile holding `old_access_key_id` at the new key pair.
    ///
    /// The original content is copied to [`Self::backup`] before anything is parsed,
    /// so the backup exists even when no profile matches.
    pub(crate) async fn replace_access_key(
        &self,
        old_access_key_id: &str,
        new_access_key_id: &str,
        new_secret_access_key: &str,
    ) -> Result<(), PatchError> {
        let original = fs::read(&self.path).await.map_err(|source| PatchError::Open {
            path: self.path.clone(),
            source,
        })?;
        tracing::info!(path = %self.path.display(), "found credentials file");

        self.write_backup(&original)
            .await
            .map_err(|source| PatchError::Backup {
                path: self.backup.clone(),
                source,
            })?;
        tracing::debug!(backup = %self.backup.display());

        let text = std::str::from_utf8(&original).map_err(|_| PatchError::Parse {
            path: self.path.clone(),
        })?;
        let mut document = Document::parse(text);
        let section = document
            .sections_mut()
            .find(|section| section.get(ACCESS_KEY_ID) == Some(old_access_key_id))
            .ok_or_else(|| PatchError::NotFound {
                access_key_id: old_access_key_id.to_owned(),
                path: self.path.clone(),
            })?;
        tracing::debug!(profile = section.name().unwrap_or_default());
        section.set(ACCESS_KEY_ID, new_access_key_id);
        section.set(SECRET_ACCESS_KEY, new_secret_access_key);

        fs::write(&self.path, document.to_string())
            .await
            .map_err(|source| PatchError::Save {
                path: self.path.clone(),
                source,
            })
    }

    async fn write_backup(&self, content: &[u8]) -> io::Result<()> {
        fs::write(&self.backup, content).await?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.backup, std::fs::Permissions::from_mode(0o600)).await?;
        }
        Ok(())
    }
}
