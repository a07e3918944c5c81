use crate::iam::{AccessKey, KeyService};
use chrono::offset::Utc;
use std::io::Write;
use std::time::Duration;

pub(super) async fn main(
    service: &impl KeyService,
    user_name: &str,
    json: bool,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    let access_keys = service.list_access_keys(user_name).await?;
    tracing::debug!(user_name = user_name, count = access_keys.len());

    if json {
        serde_json::to_writer_pretty(&mut *out, &access_keys)?;
        writeln!(out)?;
    } else {
        for access_key in &access_keys {
            print(access_key, out)?;
        }
    }
    Ok(())
}

fn print(access_key: &AccessKey, out: &mut impl Write) -> anyhow::Result<()> {
    let age = (Utc::now() - access_key.created)
        .to_std()
        .map(|age| Duration::from_secs(age.as_secs()))
        .unwrap_or_default();
    writeln!(out, "Access Key ID: {}", access_key.access_key_id)?;
    writeln!(
        out,
        "Creation Date: {} ({} ago)",
        access_key.created,
        humantime::format_duration(age),
    )?;
    writeln!(out, "Status: {}", access_key.status)?;
    writeln!(out)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::iam::{KeyStatus, MockKeyService};
    use chrono::TimeZone;
    use mockall::predicate::eq;

    fn access_keys() -> Vec<AccessKey> {
        vec![
            AccessKey {
                access_key_id: "AKIAONE".to_owned(),
                user_name: "alice".to_owned(),
                status: KeyStatus::Active,
                created: Utc.with_ymd_and_hms(2023, 1, 2, 3, 4, 5).unwrap(),
            },
            AccessKey {
                access_key_id: "AKIATWO".to_owned(),
                user_name: "alice".to_owned(),
                status: KeyStatus::Inactive,
                created: Utc.with_ymd_and_hms(2022, 6, 7, 8, 9, 10).unwrap(),
            },
        ]
    }

    #[tokio::test]
    async fn test_list() {
        let mut service = MockKeyService::new();
        service
            .expect_list_access_keys()
            .with(eq("alice"))
            .times(1)
            .returning(|_| Ok(access_keys()));

        let mut out = Vec::new();
        main(&service, "alice", false, &mut out).await.unwrap();
        let out = String::from_utf8(out).unwrap();
        let lines = out.lines().collect::<Vec<_>>();
        assert_eq!(lines.len(), 8);
        assert_eq!(lines[0], "Access Key ID: AKIAONE");
        assert!(lines[1].starts_with("Creation Date: 2023-01-02 03:04:05 UTC ("));
        assert_eq!(lines[2], "Status: Active");
        assert_eq!(lines[3], "");
        assert_eq!(lines[4], "Access Key ID: AKIATWO");
        assert_eq!(lines[6], "Status: Inactive");
    }

    #[tokio::test]
    async fn test_list_json() {
        let mut service = MockKeyService::new();
        service
            .expect_list_access_keys()
            .returning(|_| Ok(access_keys()));

        let mut out = Vec::new();
        main(&service, "alice", true, &mut out).await.unwrap();
        let value = serde_json::from_slice::<serde_json::Value>(&out).unwrap();
        assert_eq!(value[0]["access-key-id"], "AKIAONE");
        assert_eq!(value[0]["user-name"], "alice");
        assert_eq!(value[0]["status"], "Active");
        assert_eq!(value[1]["created"], "2022-06-07T08:09:10Z");
    }

    #[tokio::test]
    async fn test_list_failure() {
        let mut service = MockKeyService::new();
        service
            .expect_list_access_keys()
            .returning(|_| Err(Error::remote("list access keys", "AccessDenied")));

        let err = main(&service, "alice", false, &mut Vec::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::Remote { .. })
        ));
    }
}
