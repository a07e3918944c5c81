use crate::credentials::{CredentialsFile, PatchError};
use crate::iam::{KeyService, KeyStatus};
use std::io::Write;

/// Replaces `access_key_id` with a fresh key.
///
/// The old key is only deactivated so the new one can be verified before `--delete`.
/// Remote changes are not rolled back when a later step fails.
pub(super) async fn main(
    service: &impl KeyService,
    user_name: &str,
    access_key_id: &str,
    credentials_file: Result<CredentialsFile, PatchError>,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    service.probe_access_key(access_key_id).await?;

    let new_key = service.create_access_key(user_name).await?;
    tracing::info!(access_key_id = %new_key.access_key_id, "created new access key");

    service
        .update_access_key(user_name, access_key_id, KeyStatus::Inactive)
        .await?;
    tracing::info!(access_key_id = access_key_id, "marked access key as inactive");

    writeln!(out)?;
    writeln!(out, "New credentials")?;
    writeln!(out, "---------------")?;
    writeln!(out, "Access Key ID: {}", new_key.access_key_id)?;
    writeln!(out, "Secret Access Key: {}", new_key.secret_access_key)?;
    writeln!(out, "Creation Date: {}", new_key.created)?;
    writeln!(out, "Status: {}", new_key.status)?;
    writeln!(out)?;

    let patched = match credentials_file {
        Ok(credentials_file) => credentials_file
            .replace_access_key(
                access_key_id,
                &new_key.access_key_id,
                &new_key.secret_access_key,
            )
            .await
            .map(|()| credentials_file),
        Err(e) => Err(e),
    };
    match patched {
        Ok(credentials_file) => writeln!(
            out,
            "Automatically updated credentials file {} (backup at {}).",
            credentials_file.path().display(),
            credentials_file.backup().display(),
        )?,
        Err(e) => {
            tracing::warn!(error = %e, "credentials file not updated");
            writeln!(
                out,
                "Unable to automatically update credentials file. Error: {e}"
            )?;
        }
    }

    writeln!(out)?;
    writeln!(
        out,
        "After confirming the new credentials work, use --delete {access_key_id} to delete the previous access key"
    )?;
    Ok(())
}
