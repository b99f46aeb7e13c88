//! Startup pre-load.

use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use gpt4all_local::ModelManager;

/// Try to load the model in the background.
///
/// A failure is logged and otherwise ignored; the first `/chat` request
/// retries the load.
pub fn spawn_preload(manager: Arc<ModelManager>) -> JoinHandle<()> {
    tokio::spawn(async move {
        match manager.load().await {
            Ok(_) => info!("Model pre-loaded successfully!"),
            Err(e) => {
                warn!("Could not pre-load model: {}", e);
                info!("Model will be loaded on first request.");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use gpt4all_local::testing::{Calls, FakeBackend};

    #[tokio::test]
    async fn test_preload_success() {
        let calls = Calls::new();
        let manager = Arc::new(ModelManager::with_backend(
            "m.gguf",
            "/models",
            FakeBackend::new(Arc::clone(&calls)),
        ));

        spawn_preload(Arc::clone(&manager)).await.unwrap();
        assert!(manager.is_loaded());

        // Later loads reuse the pre-loaded model.
        manager.load().await.unwrap();
        assert_eq!(calls.loads(), 1);
    }

    #[tokio::test]
    async fn test_preload_failure_is_not_fatal() {
        let calls = Calls::new();
        let backend = FakeBackend::new(Arc::clone(&calls)).failing_load();
        let manager = Arc::new(ModelManager::with_backend("m.gguf", "/models", backend));

        spawn_preload(Arc::clone(&manager)).await.unwrap();
        assert!(!manager.is_loaded());
        assert_eq!(calls.loads(), 1);
    }
}
