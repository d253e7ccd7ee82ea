use futures::future::BoxFuture;
use parking_lot::RwLock;
use reqwest::Client;

use crate::{
    config::ClassifierConfig,
    domain::{InterestSet, Item, PipelineError, Verdict},
};

use super::{
    inference::{build_request, extract_reply},
    parser::parse_verdicts,
};

/// Result of classifying one batch. `verdicts` always holds one entry per
/// input item; `error` carries whatever degraded the answer.
#[derive(Debug)]
pub struct Classification {
    pub verdicts: Vec<Verdict>,
    pub error: Option<PipelineError>,
}

impl Classification {
    pub fn fail_open(batch: &[Item], error: PipelineError) -> Self {
        Self {
            verdicts: batch.iter().map(Verdict::relevant).collect(),
            error: Some(error),
        }
    }
}

/// Remote relevance classification. Implementations must not fail: every
/// fault is folded into a fail-open [`Classification`].
pub trait Classifier: Send + Sync {
    fn classify<'a>(
        &'a self,
        batch: &'a [Item],
        interests: &'a InterestSet,
    ) -> BoxFuture<'a, Classification>;

    fn check_configuration(&self) -> Result<(), PipelineError> {
        Ok(())
    }
}

pub struct ClassifierClient {
    http: Client,
    config: RwLock<ClassifierConfig>,
}

impl ClassifierClient {
    pub fn new(http: Client, config: ClassifierConfig) -> Self {
        Self {
            http,
            config: RwLock::new(config),
        }
    }

    pub fn set_credentials(&self, api_url: Option<String>, api_key: Option<String>) {
        let mut config = self.config.write();
        config.api_url = api_url;
        config.api_key = api_key;
        tracing::info!(
            target: "classifier",
            configured = config.is_configured(),
            "classifier credentials updated"
        );
    }

    pub async fn classify_batch(&self, batch: &[Item], interests: &InterestSet) -> Classification {
        if batch.is_empty() {
            return Classification {
                verdicts: Vec::new(),
                error: None,
            };
        }
        if interests.is_empty() {
            return Classification::fail_open(
                batch,
                PipelineError::Configuration("no interests configured".into()),
            );
        }
        if let Err(err) = self.check_configuration() {
            return Classification::fail_open(batch, err);
        }

        let reply = match self.request_reply(batch, interests).await {
            Ok(reply) => reply,
            Err(err) => {
                tracing::warn!(
                    target: "classifier",
                    error = %err,
                    batch = batch.len(),
                    "classification failed; treating batch as relevant"
                );
                return Classification::fail_open(batch, err);
            }
        };

        let parsed = parse_verdicts(&reply, batch);
        tracing::debug!(
            target: "classifier",
            reply = %reply,
            defaulted = parsed.defaulted.len(),
            "classification reply parsed"
        );
        let error = (!parsed.is_complete()).then(|| {
            PipelineError::Parse(format!(
                "{} of {} items missing or malformed in reply",
                parsed.defaulted.len(),
                batch.len()
            ))
        });
        Classification {
            verdicts: parsed.verdicts,
            error,
        }
    }

    async fn request_reply(
        &self,
        batch: &[Item],
        interests: &InterestSet,
    ) -> Result<String, PipelineError> {
        let (api_url, api_key, request, timeout) = {
            let config = self.config.read();
            let (Some(api_url), Some(api_key)) = (config.api_url.clone(), config.api_key.clone())
            else {
                return Err(missing_credentials());
            };
            let request = build_request(config.model.clone(), config.temperature, batch, interests);
            (api_url, api_key, request, config.request_timeout)
        };

        let response = self
            .http
            .post(&api_url)
            .bearer_auth(api_key)
            .timeout(timeout)
            .json(&request)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|err| PipelineError::Transport(err.to_string()))?;

        let body = response
            .text()
            .await
            .map_err(|err| PipelineError::Transport(err.to_string()))?;
        extract_reply(&body)
    }
}

impl Classifier for ClassifierClient {
    fn classify<'a>(
        &'a self,
        batch: &'a [Item],
        interests: &'a InterestSet,
    ) -> BoxFuture<'a, Classification> {
        Box::pin(self.classify_batch(batch, interests))
    }

    fn check_configuration(&self) -> Result<(), PipelineError> {
        if self.config.read().is_configured() {
            Ok(())
        } else {
            Err(missing_credentials())
        }
    }
}

fn missing_credentials() -> PipelineError {
    PipelineError::Configuration("classifier endpoint and API key must both be configured".into())
}
