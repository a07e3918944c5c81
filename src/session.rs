use crate::ini::Document;
use crate::mfa::TokenSource;
use aws_config::profile::ProfileFileCredentialsProvider;
use aws_config::retry::RetryConfig;
use aws_credential_types::Credentials;
use aws_types::SdkConfig;
use clap::Parser;
use std::env;
use std::path::PathBuf;
use std::time::{Duration, UNIX_EPOCH};
use tokio::fs;

const SESSION_NAME: &str = "aws-key-rotator";

#[derive(Debug, Parser)]
pub(super) struct Opts {
    /// Retries applied by the SDK to each remote call (one more than the SDK's `AWS_MAX_ATTEMPTS`)
    #[clap(long, env = "AWS_MAX_RETRIES", default_value_t = 5)]
    max_retries: u32,
    /// Compute the MFA token code from this YubiKey OATH credential instead of prompting
    #[clap(long, env = "AWS_MFA_YKOATH", value_name = "NAME")]
    mfa_ykoath: Option<String>,
}

impl Opts {
    fn retry_config(&self) -> RetryConfig {
        RetryConfig::standard().with_max_attempts(self.max_retries.saturating_add(1))
    }

    fn token_source(&self) -> TokenSource {
        match &self.mfa_ykoath {
            Some(name) => TokenSource::Ykoath { name: name.clone() },
            None => TokenSource::Prompt,
        }
    }
}

/// Role settings of a shared-config profile that requires an MFA token.
#[derive(Debug, PartialEq, Eq)]
struct MfaRole {
    role_arn: String,
    mfa_serial: String,
    source_profile: Option<String>,
}

impl MfaRole {
    fn from_config(document: &Document, profile: &str) -> Option<Self> {
        let section = if profile == "default" {
            document
                .section("default")
                .or_else(|| document.section("profile default"))
        } else {
            document.section(&format!("profile {profile}"))
        }?;
        Some(Self {
            role_arn: section.get("role_arn")?.to_owned(),
            mfa_serial: section.get("mfa_serial")?.to_owned(),
            source_profile: section.get("source_profile").map(str::to_owned),
        })
    }
}

pub(super) async fn load(opts: &Opts) -> anyhow::Result<SdkConfig> {
    let retry_config = opts.retry_config();
    let profile = env::var("AWS_PROFILE").unwrap_or_else(|_| "default".to_owned());

    let role = match config_path() {
        Some(path) => match fs::read_to_string(&path).await {
            Ok(text) => MfaRole::from_config(&Document::parse(&text), &profile),
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "no shared config");
                None
            }
        },
        None => None,
    };
    let Some(role) = role else {
        return Ok(aws_config::from_env().retry_config(retry_config).load().await);
    };
    tracing::info!(
        profile = %profile,
        role_arn = %role.role_arn,
        mfa_serial = %role.mfa_serial,
        "assuming role"
    );

    let mut source = ProfileFileCredentialsProvider::builder();
    if let Some(source_profile) = &role.source_profile {
        source = source.profile_name(source_profile);
    }
    let source_config = aws_config::from_env()
        .credentials_provider(source.build())
        .retry_config(retry_config.clone())
        .load()
        .await;
    let sts_client = aws_sdk_sts::Client::new(&source_config);

    let token_code = opts.token_source().token_code(&role.mfa_serial).await?;
    let output = sts_client
        .assume_role()
        .role_arn(&role.role_arn)
        .role_session_name(SESSION_NAME)
        .serial_number(&role.mfa_serial)
        .token_code(token_code)
        .send()
        .await?;
    let credentials = output
        .credentials()
        .ok_or_else(|| anyhow::format_err!("missing credentials"))?;
    let credentials = Credentials::new(
        credentials
            .access_key_id()
            .ok_or_else(|| anyhow::format_err!("missing access_key_id"))?,
        credentials
            .secret_access_key()
            .ok_or_else(|| anyhow::format_err!("missing secret_access_key"))?,
        credentials.session_token().map(str::to_owned),
        credentials.expiration().and_then(|expiration| {
            let secs = u64::try_from(expiration.secs()).ok()?;
            Some(UNIX_EPOCH + Duration::new(secs, expiration.subsec_nanos()))
        }),
        "AssumeRoleWithMfa",
    );
    tracing::debug!(expiration = ?credentials.expiry());

    Ok(aws_config::from_env()
        .credentials_provider(credentials)
        .retry_config(retry_config)
        .load()
        .await)
}

fn config_path() -> Option<PathBuf> {
    match env::var_os("AWS_CONFIG_FILE") {
        Some(path) => Some(PathBuf::from(path)),
        None => Some(dirs::home_dir()?.join(".aws").join("config")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = "[default]\n\
        region = us-east-1\n\
        \n\
        [profile admin]\n\
        role_arn = arn:aws:iam::123456789012:role/admin\n\
        mfa_serial = arn:aws:iam::123456789012:mfa/alice\n\
        source_profile = default\n\
        \n\
        [profile readonly]\n\
        role_arn = arn:aws:iam::123456789012:role/readonly\n\
        source_profile = default\n";

    #[test]
    fn test_mfa_role() {
        let document = Document::parse(CONFIG);
        assert_eq!(
            MfaRole::from_config(&document, "admin"),
            Some(MfaRole {
                role_arn: "arn:aws:iam::123456789012:role/admin".to_owned(),
                mfa_serial: "arn:aws:iam::123456789012:mfa/alice".to_owned(),
                source_profile: Some("default".to_owned()),
            }),
        );
        assert_eq!(MfaRole::from_config(&document, "readonly"), None);
        assert_eq!(MfaRole::from_config(&document, "default"), None);
        assert_eq!(MfaRole::from_config(&document, "missing"), None);
    }

    #[test]
    fn test_default_profile_with_prefix() {
        let document = Document::parse(
            "[profile default]\nrole_arn = arn:aws:iam::1:role/r\nmfa_serial = arn:aws:iam::1:mfa/m\n",
        );
        let role = MfaRole::from_config(&document, "default").unwrap();
        assert_eq!(role.source_profile, None);
        assert_eq!(role.mfa_serial, "arn:aws:iam::1:mfa/m");
    }

    #[test]
    fn test_commented_profile_header() {
        let document = Document::parse(
            "[profile admin] # break-glass\nrole_arn = arn:aws:iam::1:role/r\nmfa_serial = arn:aws:iam::1:mfa/m\n",
        );
        let role = MfaRole::from_config(&document, "admin").unwrap();
        assert_eq!(role.role_arn, "arn:aws:iam::1:role/r");
    }

    #[test]
    fn test_retry_config() {
        let opts = Opts {
            max_retries: 5,
            mfa_ykoath: None,
        };
        assert_eq!(opts.retry_config().max_attempts(), 6);

        let opts = Opts {
            max_retries: u32::MAX,
            mfa_ykoath: None,
        };
        assert_eq!(opts.retry_config().max_attempts(), u32::MAX);
    }

    #[test]
    fn test_token_source() {
        let opts = Opts {
            max_retries: 5,
            mfa_ykoath: None,
        };
        assert_eq!(opts.token_source(), TokenSource::Prompt);

        let opts = Opts::try_parse_from([
            "session",
            "--max-retries",
            "2",
            "--mfa-ykoath",
            "aws:alice",
        ])
        .unwrap();
        assert_eq!(opts.max_retries, 2);
        assert_eq!(
            opts.token_source(),
            TokenSource::Ykoath {
                name: "aws:alice".to_owned()
            },
        );
    }
}
