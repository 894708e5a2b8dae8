//! Capabilities API Handler

use axum::{Json, extract::State};
use refract_core::dto::capabilities::Capabilities;

use crate::state::AppState;

/// GET /capabilities
/// Supported media formats and the workflows this server has pipelines for
pub async fn get_capabilities(State(state): State<AppState>) -> Json<Capabilities> {
    let mut capabilities = Capabilities::default();
    capabilities.workflows = state.pipeline.executor.catalog().kinds();
    Json(capabilities)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::tests::test_state;
    use refract_core::domain::workflow::WorkflowKind;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_capabilities_list_registered_workflows() {
        let dir = TempDir::new().unwrap();
        let Json(capabilities) = get_capabilities(State(test_state(&dir))).await;

        assert_eq!(capabilities.workflows, vec![WorkflowKind::ImageToImage]);
        assert!(capabilities.formats.image.contains(&"png".to_string()));
        assert!(capabilities.formats.audio.contains(&"wav".to_string()));
    }
}
