mod credentials;
mod delete;
mod error;
mod iam;
mod ini;
mod list;
mod mfa;
mod rotate;
mod session;

use clap::{ArgGroup, Parser};
use credentials::CredentialsFile;
use error::Error;
use iam::{IamKeyService, KeyService};
use std::io::{self, Write};
use tracing_subscriber::EnvFilter;

/// Rotate the IAM access keys of the calling user
#[derive(Debug, Parser)]
#[clap(
    version,
    group(ArgGroup::new("action").required(true).args(&["list", "rotate", "delete"])),
)]
struct Opts {
    /// List access keys
    #[clap(long)]
    list: bool,
    /// Create a new access key and deactivate this one
    #[clap(long, value_name = "ACCESS_KEY_ID")]
    rotate: Option<String>,
    /// Delete an access key
    #[clap(long, value_name = "ACCESS_KEY_ID")]
    delete: Option<String>,
    /// Print the access key list as JSON
    #[clap(long, requires = "list")]
    json: bool,
    #[clap(flatten)]
    session: session::Opts,
}

#[derive(Debug, PartialEq, Eq)]
enum Action {
    List,
    Rotate(String),
    Delete(String),
}

impl TryFrom<&Opts> for Action {
    type Error = Error;
    fn try_from(opts: &Opts) -> Result<Self, Self::Error> {
        match (opts.list, opts.rotate.as_deref(), opts.delete.as_deref()) {
            (true, None, None) => Ok(Self::List),
            (false, Some(""), None) | (false, None, Some("")) => {
                Err(Error::Usage("access key id must not be empty"))
            }
            (false, Some(id), None) => Ok(Self::Rotate(id.to_owned())),
            (false, None, Some(id)) => Ok(Self::Delete(id.to_owned())),
            (false, None, None) => Err(Error::Usage(
                "must specify one of --list, --rotate, or --delete",
            )),
            _ => Err(Error::Usage(
                "must only specify one of --list, --rotate, --delete",
            )),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let opts = Opts::parse();
    tracing::debug!(opts = ?opts);
    let action = Action::try_from(&opts)?;

    let config = session::load(&opts.session).await?;
    let service = IamKeyService::new(&config);
    run(&service, action, opts.json, &mut io::stdout()).await
}

async fn run(
    service: &impl KeyService,
    action: Action,
    json: bool,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    let user_name = service.user_name().await?;
    tracing::info!(user_name = %user_name, "resolved calling identity");

    match action {
        Action::List => list::main(service, &user_name, json, out).await,
        Action::Rotate(access_key_id) => {
            rotate::main(
                service,
                &user_name,
                &access_key_id,
                CredentialsFile::locate(),
                out,
            )
            .await
        }
        Action::Delete(access_key_id) => delete::main(service, &user_name, &access_key_id).await,
    }
}
