use shelf_client_sdk::ProductApi;
use shelf_protocol::UserProfile;
use tracing::{info, warn};

/// Fetches the service-account profile behind `STATIC_ACCESS_TOKEN` once at
/// startup. Per-user requests never use this token; they always carry the
/// session's own bearer token.
pub async fn probe_service_account(
    api: &dyn ProductApi,
    token: Option<&str>,
) -> Option<UserProfile> {
    let Some(token) = token else {
        info!("No STATIC_ACCESS_TOKEN configured; skipping upstream profile probe");
        return None;
    };

    match api.profile(token).await {
        Ok(profile) => {
            info!(
                "Upstream reachable. Service account {} ({}) role={}",
                profile.email, profile.name, profile.role
            );
            Some(profile)
        }
        Err(e) => {
            warn!("Upstream profile probe failed: {}", e);
            None
        }
    }
}
