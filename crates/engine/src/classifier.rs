//! Gateway to the external fingerprint classifier.
//!
//! The classifier labels an incoming fingerprint relative to an account's
//! known fingerprints. This module is pure transport: it never interprets
//! the label, and a network or malformed-response failure surfaces as
//! [`EngineError::Classifier`] rather than being coerced into a verdict.
//! The [`Classifier`] trait exists so the trust-decision policies are
//! unit-testable against [`StaticClassifier`] without network access.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::{EngineError, Result};
use crate::fingerprint::Fingerprint;

/// Wire label the classifier emits for a benign device update.
pub const LEGITIMATE_CHANGE_LABEL: &str = "Legitimate Change";
/// Wire label the classifier emits for a suspected impersonation.
pub const SESSION_STEALER_LABEL: &str = "SessionStealer";

/// Classifier label for a fingerprint change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Classification {
    /// Same device, legitimately drifted features
    LegitimateChange,
    /// Suspected session-stealing impersonation
    SessionStealer,
    /// Any other label the service may emit; kept verbatim so callers can
    /// inspect it
    Other(String),
}

impl From<String> for Classification {
    fn from(label: String) -> Self {
        match label.as_str() {
            LEGITIMATE_CHANGE_LABEL => Classification::LegitimateChange,
            SESSION_STEALER_LABEL => Classification::SessionStealer,
            _ => Classification::Other(label),
        }
    }
}

impl From<Classification> for String {
    fn from(classification: Classification) -> Self {
        match classification {
            Classification::LegitimateChange => LEGITIMATE_CHANGE_LABEL.to_string(),
            Classification::SessionStealer => SESSION_STEALER_LABEL.to_string(),
            Classification::Other(label) => label,
        }
    }
}

/// Classification result for one incoming fingerprint.
///
/// `best_match_index`, when present, indexes the **normalized** list the
/// classifier was shown, never the raw stored collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Verdict {
    pub classification: Classification,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub best_match_index: Option<usize>,
}

impl Verdict {
    pub fn new(classification: Classification, best_match_index: Option<usize>) -> Self {
        Self {
            classification,
            best_match_index,
        }
    }
}

/// External classifier seam. One real implementation ([`HttpClassifier`])
/// and one deterministic implementation for tests ([`StaticClassifier`]).
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Label `incoming` relative to the account's normalized known list.
    async fn classify(&self, incoming: &Fingerprint, known: &[Fingerprint]) -> Result<Verdict>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ClassifyRequest<'a> {
    fingerprint: &'a Fingerprint,
    known_fingerprints: &'a [Fingerprint],
}

/// Raw response shape, decoded leniently so absence and malformation are
/// distinguishable from a valid classification.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClassifyResponse {
    classification: Option<String>,
    best_match_index: Option<i64>,
}

/// HTTP implementation over the external classifier service.
pub struct HttpClassifier {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpClassifier {
    pub fn new(endpoint: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
        }
    }

    fn verdict_from_response(response: ClassifyResponse) -> Result<Verdict> {
        let label = response.classification.ok_or_else(|| {
            EngineError::Classifier("response carried no classification".to_string())
        })?;
        // A negative index means "no match"; only non-negative values index
        // the normalized list.
        let best_match_index = response
            .best_match_index
            .and_then(|idx| usize::try_from(idx).ok());
        Ok(Verdict::new(Classification::from(label), best_match_index))
    }
}

#[async_trait]
impl Classifier for HttpClassifier {
    async fn classify(&self, incoming: &Fingerprint, known: &[Fingerprint]) -> Result<Verdict> {
        let request = ClassifyRequest {
            fingerprint: incoming,
            known_fingerprints: known,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| EngineError::Classifier(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(EngineError::Classifier(format!(
                "service returned status {status}"
            )));
        }

        let decoded: ClassifyResponse = response
            .json()
            .await
            .map_err(|e| EngineError::Classifier(format!("malformed response: {e}")))?;

        let verdict = Self::verdict_from_response(decoded)?;
        tracing::debug!(?verdict, "classifier verdict received");
        Ok(verdict)
    }
}

/// Deterministic classifier returning a preset outcome and counting
/// invocations. Lets tests assert both what the engine decided and whether
/// the classifier was consulted at all.
pub struct StaticClassifier {
    outcome: std::result::Result<Verdict, String>,
    calls: AtomicUsize,
}

impl StaticClassifier {
    /// Always return the given verdict.
    pub fn returning(verdict: Verdict) -> Self {
        Self {
            outcome: Ok(verdict),
            calls: AtomicUsize::new(0),
        }
    }

    /// Always fail, simulating an unreachable or broken service.
    pub fn failing(message: &str) -> Self {
        Self {
            outcome: Err(message.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of times `classify` has been invoked.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Classifier for StaticClassifier {
    async fn classify(&self, _incoming: &Fingerprint, _known: &[Fingerprint]) -> Result<Verdict> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.outcome {
            Ok(verdict) => Ok(verdict.clone()),
            Err(message) => Err(EngineError::Classifier(message.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_classification_from_wire_labels() {
        assert_eq!(
            Classification::from("Legitimate Change".to_string()),
            Classification::LegitimateChange
        );
        assert_eq!(
            Classification::from("SessionStealer".to_string()),
            Classification::SessionStealer
        );
        assert_eq!(
            Classification::from("Inconclusive".to_string()),
            Classification::Other("Inconclusive".to_string())
        );
    }

    #[test]
    fn test_verdict_decodes_wire_response() {
        let verdict: Verdict = serde_json::from_value(json!({
            "classification": "Legitimate Change",
            "bestMatchIndex": 2
        }))
        .unwrap();

        assert_eq!(verdict.classification, Classification::LegitimateChange);
        assert_eq!(verdict.best_match_index, Some(2));
    }

    #[test]
    fn test_verdict_serializes_camel_case() {
        let verdict = Verdict::new(Classification::SessionStealer, Some(0));
        let value = serde_json::to_value(&verdict).unwrap();

        assert_eq!(
            value,
            json!({"classification": "SessionStealer", "bestMatchIndex": 0})
        );

        let without_index = Verdict::new(Classification::SessionStealer, None);
        let value = serde_json::to_value(&without_index).unwrap();
        assert_eq!(value, json!({"classification": "SessionStealer"}));
    }

    #[test]
    fn test_missing_classification_is_an_error() {
        let response = ClassifyResponse {
            classification: None,
            best_match_index: Some(1),
        };

        let result = HttpClassifier::verdict_from_response(response);
        assert!(matches!(result, Err(EngineError::Classifier(_))));
    }

    #[test]
    fn test_negative_best_match_index_means_absent() {
        let response = ClassifyResponse {
            classification: Some("Legitimate Change".to_string()),
            best_match_index: Some(-1),
        };

        let verdict = HttpClassifier::verdict_from_response(response).unwrap();
        assert_eq!(verdict.best_match_index, None);
    }

    #[tokio::test]
    async fn test_static_classifier_counts_calls() {
        let classifier =
            StaticClassifier::returning(Verdict::new(Classification::LegitimateChange, Some(0)));
        let fp = Fingerprint(vec![1.0]);

        assert_eq!(classifier.calls(), 0);
        classifier.classify(&fp, &[]).await.unwrap();
        classifier.classify(&fp, &[]).await.unwrap();
        assert_eq!(classifier.calls(), 2);

        let failing = StaticClassifier::failing("unreachable");
        let result = failing.classify(&fp, &[]).await;
        assert!(matches!(result, Err(EngineError::Classifier(_))));
        assert_eq!(failing.calls(), 1);
    }
}
