use crate::error::Error;
use aws_sdk_iam::model::StatusType;
use aws_smithy_types::error::display::DisplayErrorContext;
use aws_smithy_types::retry::ProvideErrorKind;
use chrono::offset::Utc;
use chrono::{DateTime, TimeZone};
use serde::Serialize;
use std::fmt;

const NO_SUCH_ENTITY: &str = "NoSuchEntity";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub(crate) enum KeyStatus {
    Active,
    Inactive,
}

impl KeyStatus {
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "Active",
            Self::Inactive => "Inactive",
        }
    }
}

impl fmt::Display for KeyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&StatusType> for KeyStatus {
    type Error = anyhow::Error;
    fn try_from(value: &StatusType) -> Result<Self, Self::Error> {
        match value {
            StatusType::Active => Ok(Self::Active),
            StatusType::Inactive => Ok(Self::Inactive),
            _ => Err(anyhow::format_err!("unknown status {}", value.as_str())),
        }
    }
}

impl From<KeyStatus> for StatusType {
    fn from(value: KeyStatus) -> Self {
        match value {
            KeyStatus::Active => Self::Active,
            KeyStatus::Inactive => Self::Inactive,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub(crate) struct AccessKey {
    pub(crate) access_key_id: String,
    pub(crate) user_name: String,
    pub(crate) status: KeyStatus,
    pub(crate) created: DateTime<Utc>,
}

impl TryFrom<&aws_sdk_iam::model::AccessKeyMetadata> for AccessKey {
    type Error = anyhow::Error;
    fn try_from(value: &aws_sdk_iam::model::AccessKeyMetadata) -> Result<Self, Self::Error> {
        Ok(Self {
            access_key_id: value
                .access_key_id()
                .map(str::to_owned)
                .ok_or_else(|| anyhow::format_err!("missing access_key_id"))?,
            user_name: value
                .user_name()
                .map(str::to_owned)
                .ok_or_else(|| anyhow::format_err!("missing user_name"))?,
            status: value
                .status()
                .ok_or_else(|| anyhow::format_err!("missing status"))?
                .try_into()?,
            created: value
                .create_date()
                .map(timestamp)
                .ok_or_else(|| anyhow::format_err!("missing create_date"))??,
        })
    }
}

/// A key as returned by `CreateAccessKey`, the only response that ever carries the secret.
#[derive(Clone)]
pub(crate) struct NewAccessKey {
    pub(crate) access_key_id: String,
    pub(crate) secret_access_key: String,
    pub(crate) status: KeyStatus,
    pub(crate) created: DateTime<Utc>,
}

impl fmt::Debug for NewAccessKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewAccessKey")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"***")
            .field("status", &self.status)
            .field("created", &self.created)
            .finish()
    }
}

impl TryFrom<&aws_sdk_iam::model::AccessKey> for NewAccessKey {
    type Error = anyhow::Error;
    fn try_from(value: &aws_sdk_iam::model::AccessKey) -> Result<Self, Self::Error> {
        Ok(Self {
            access_key_id: value
                .access_key_id()
                .map(str::to_owned)
                .ok_or_else(|| anyhow::format_err!("missing access_key_id"))?,
            secret_access_key: value
                .secret_access_key()
                .map(str::to_owned)
                .ok_or_else(|| anyhow::format_err!("missing secret_access_key"))?,
            status: value
                .status()
                .ok_or_else(|| anyhow::format_err!("missing status"))?
                .try_into()?,
            created: value
                .create_date()
                .map(timestamp)
                .ok_or_else(|| anyhow::format_err!("missing create_date"))??,
        })
    }
}

fn timestamp(value: &aws_smithy_types::DateTime) -> anyhow::Result<DateTime<Utc>> {
    Utc.timestamp_opt(value.secs(), value.subsec_nanos())
        .single()
        .ok_or_else(|| anyhow::format_err!("invalid timestamp {}", value.secs()))
}

/// Calls against the IAM API made on behalf of the calling user.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub(crate) trait KeyService: Send + Sync {
    async fn user_name(&self) -> Result<String, Error>;
    async fn list_access_keys(&self, user_name: &str) -> Result<Vec<AccessKey>, Error>;
    /// Succeeds when `access_key_id` names an existing key.
    async fn probe_access_key(&self, access_key_id: &str) -> Result<(), Error>;
    async fn create_access_key(&self, user_name: &str) -> Result<NewAccessKey, Error>;
    async fn update_access_key(
        &self,
        user_name: &str,
        access_key_id: &str,
        status: KeyStatus,
    ) -> Result<(), Error>;
    async fn delete_access_key(&self, user_name: &str, access_key_id: &str) -> Result<(), Error>;
}

pub(crate) struct IamKeyService {
    client: aws_sdk_iam::Client,
}

impl IamKeyService {
    pub(crate) fn new(config: &aws_types::SdkConfig) -> Self {
        Self {
            client: aws_sdk_iam::Client::new(config),
        }
    }
}

#[async_trait::async_trait]
impl KeyService for IamKeyService {
    async fn user_name(&self) -> Result<String, Error> {
        let output = self
            .client
            .get_user()
            .send()
            .await
            .map_err(|e| Error::Identity(DisplayErrorContext(e).to_string()))?;
        let user = output
            .user()
            .ok_or_else(|| Error::Identity("missing user".to_owned()))?;
        tracing::debug!(arn = user.arn());
        user.user_name()
            .map(str::to_owned)
            .ok_or_else(|| Error::Identity("missing user_name".to_owned()))
    }

    async fn list_access_keys(&self, user_name: &str) -> Result<Vec<AccessKey>, Error> {
        let output = self
            .client
            .list_access_keys()
            .user_name(user_name)
            .send()
            .await
            .map_err(|e| Error::remote("list access keys", DisplayErrorContext(e)))?;
        output
            .access_key_metadata()
            .into_iter()
            .flatten()
            .map(|metadata| {
                AccessKey::try_from(metadata).map_err(|e| Error::remote("list access keys", e))
            })
            .collect()
    }

    async fn probe_access_key(&self, access_key_id: &str) -> Result<(), Error> {
        match self
            .client
            .get_access_key_last_used()
            .access_key_id(access_key_id)
            .send()
            .await
        {
            Ok(_) => Ok(()),
            Err(e) => {
                let message = DisplayErrorContext(&e).to_string();
                if e.into_service_error().code() == Some(NO_SUCH_ENTITY) {
                    Err(Error::KeyNotFound(access_key_id.to_owned()))
                } else {
                    Err(Error::Probe {
                        id: access_key_id.to_owned(),
                        message,
                    })
                }
            }
        }
    }

    async fn create_access_key(&self, user_name: &str) -> Result<NewAccessKey, Error> {
        let output = self
            .client
            .create_access_key()
            .user_name(user_name)
            .send()
            .await
            .map_err(|e| Error::remote("create access key", DisplayErrorContext(e)))?;
        let access_key = output
            .access_key()
            .ok_or_else(|| Error::remote("create access key", "missing access_key"))?;
        NewAccessKey::try_from(access_key).map_err(|e| Error::remote("create access key", e))
    }

    async fn update_access_key(
        &self,
        user_name: &str,
        access_key_id: &str,
        status: KeyStatus,
    ) -> Result<(), Error> {
        self.client
            .update_access_key()
            .user_name(user_name)
            .access_key_id(access_key_id)
            .status(status.into())
            .send()
            .await
            .map_err(|e| Error::remote("update access key", DisplayErrorContext(e)))?;
        Ok(())
    }

    async fn delete_access_key(&self, user_name: &str, access_key_id: &str) -> Result<(), Error> {
        self.client
            .delete_access_key()
            .user_name(user_name)
            .access_key_id(access_key_id)
            .send()
            .await
            .map_err(|e| Error::remote("delete access key", DisplayErrorContext(e)))?;
        Ok(())
    }
}
