use std::sync::Arc;

use fingertrust_engine::{
    EnginePolicy, HttpClassifier, RedisAccountStore, TrustDecisionEngine,
};

use crate::config::Config;

pub struct AppState {
    pub config: Config,
    pub engine: TrustDecisionEngine,
}

impl AppState {
    pub async fn new(config: Config) -> Result<Self, Box<dyn std::error::Error>> {
        let store = RedisAccountStore::connect(&config.redis_url).await?;
        let classifier = HttpClassifier::new(config.classifier_url.clone());
        let engine = TrustDecisionEngine::new(
            Arc::new(store),
            Arc::new(classifier),
            EnginePolicy {
                manual_fail_mode: config.fail_mode,
            },
        );

        Ok(AppState { config, engine })
    }
}
