use crate::iam::KeyService;

pub(super) async fn main(
    service: &impl KeyService,
    user_name: &str,
    access_key_id: &str,
) -> anyhow::Result<()> {
    service.delete_access_key(user_name, access_key_id).await?;
    tracing::info!(access_key_id = access_key_id, "successfully deleted access key");
    Ok(())
}
