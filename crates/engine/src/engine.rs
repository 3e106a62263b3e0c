//! Trust decision engine.
//!
//! Orchestrates normalization, exact matching, classification, and
//! write-back per call-site policy. Each request runs
//! `Received → Normalizing → (ExactCheck) → (Classifying) → Decided`;
//! an accepting decision triggers write-back and session renewal, a deny
//! carries a reason. Both are terminal, there are no retries.
//!
//! The policies differ deliberately in how they treat an ambiguous or
//! unavailable classifier:
//!
//! - **Auto-auth** is fail-closed: a session cookie alone proves nothing,
//!   so anything short of `LegitimateChange` denies.
//! - **Manual login** defaults to fail-open: a correct password already
//!   proved a credential factor, so an ambiguous change is appended as a
//!   new device and the login accepted. [`FailMode::Closed`] tightens this
//!   for deployments that want friction over risk.
//! - **Signup** bypasses the engine: the collection starts as exactly the
//!   one incoming fingerprint.
//! - **Mid-session verification** denies on `SessionStealer` without
//!   touching storage and accepts anything else, surfacing the verdict.

use std::sync::Arc;
use uuid::Uuid;

use crate::classifier::{Classification, Classifier, Verdict};
use crate::error::{EngineError, Result};
use crate::fingerprint::{normalize, Fingerprint};
use crate::matcher::exact_match;
use crate::session;
use crate::store::{Account, AccountStore, NewAccount};
use crate::writeback;

/// Policy for ambiguous classifier outcomes (unknown label or classifier
/// failure) during manual login. Auto-auth is always fail-closed and is
/// not affected by this knob.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailMode {
    /// Append the fingerprint as a new device and accept the login
    #[default]
    Open,
    /// Deny the login
    Closed,
}

/// Engine policy configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnginePolicy {
    pub manual_fail_mode: FailMode,
}

/// Why an accepting decision was reached; drives the response message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcceptKind {
    /// Byte-for-byte match against a stored vector, classifier bypassed
    ExactMatch,
    /// Classifier recognized a legitimate device update; matched slot
    /// replaced
    LegitimateChange,
    /// Classifier flagged a stealer during manual login; appended as a new
    /// device under the fail-open policy
    NewDeviceAppended,
    /// Ambiguous or failed classification under fail-open; appended
    FallbackAppend,
}

/// Why a request was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// The account has no usable stored fingerprints to compare against
    NoStoredFingerprints,
    /// The classifier did not label the change as legitimate
    ClassifierRejected,
    /// The classifier could not be reached or answered malformed, under a
    /// fail-closed policy
    ClassifierUnavailable,
}

impl DenyReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DenyReason::NoStoredFingerprints => "No stored fingerprints",
            DenyReason::ClassifierRejected => "Fingerprint rejected",
            DenyReason::ClassifierUnavailable => "Classifier unavailable",
        }
    }
}

/// Terminal outcome of an authentication attempt.
#[derive(Debug, Clone)]
pub enum Decision {
    Accept {
        /// Token to re-issue in the session cookie
        session_token: String,
        kind: AcceptKind,
        verdict: Option<Verdict>,
    },
    Deny {
        reason: DenyReason,
        verdict: Option<Verdict>,
    },
}

impl Decision {
    pub fn is_accept(&self) -> bool {
        matches!(self, Decision::Accept { .. })
    }
}

/// Outcome of a mid-session verification heartbeat.
#[derive(Debug, Clone)]
pub struct VerifyOutcome {
    pub authenticated: bool,
    /// Present so the caller can renew the cookie on acceptance
    pub session_token: String,
    pub verdict: Verdict,
}

/// The fingerprint-matching and trust-decision engine shared by login,
/// signup, and mid-session verification.
pub struct TrustDecisionEngine {
    store: Arc<dyn AccountStore>,
    classifier: Arc<dyn Classifier>,
    policy: EnginePolicy,
}

impl TrustDecisionEngine {
    pub fn new(
        store: Arc<dyn AccountStore>,
        classifier: Arc<dyn Classifier>,
        policy: EnginePolicy,
    ) -> Self {
        Self {
            store,
            classifier,
            policy,
        }
    }

    /// Create an account with the incoming fingerprint as its single
    /// stored entry. The decision engine itself is bypassed at signup.
    pub async fn signup(&self, new: NewAccount, incoming: Fingerprint) -> Result<Account> {
        if incoming.is_empty() {
            return Err(EngineError::Validation(
                "fingerprint must be a non-empty array".to_string(),
            ));
        }

        let account = Account {
            id: Uuid::new_v4().to_string(),
            email: new.email,
            username: new.username,
            password_hash: new.password_hash,
            session_token: session::generate_token(),
            fingerprints: vec![crate::fingerprint::RawEntry::Vector(incoming)],
        };

        self.store.insert(account.clone()).await?;
        tracing::info!(account_id = %account.id, "signup complete");
        Ok(account)
    }

    /// Cookie-only authentication. Fail-closed: accepts only on an
    /// unambiguous `LegitimateChange`.
    pub async fn auto_login(&self, session_token: &str, incoming: &Fingerprint) -> Result<Decision> {
        let account = self
            .store
            .find_by_session(session_token)
            .await?
            .ok_or(EngineError::InvalidSession)?;

        let view = normalize(&account.fingerprints);
        if view.is_empty() {
            tracing::debug!(account_id = %account.id, "auto-login denied, nothing stored to compare");
            return Ok(Decision::Deny {
                reason: DenyReason::NoStoredFingerprints,
                verdict: None,
            });
        }

        let verdict = match self.classifier.classify(incoming, &view.normalized).await {
            Ok(verdict) => verdict,
            Err(e) => {
                tracing::warn!(account_id = %account.id, error = %e, "classifier failed, auto-login denied");
                return Ok(Decision::Deny {
                    reason: DenyReason::ClassifierUnavailable,
                    verdict: None,
                });
            }
        };

        if verdict.classification != Classification::LegitimateChange {
            return Ok(Decision::Deny {
                reason: DenyReason::ClassifierRejected,
                verdict: Some(verdict),
            });
        }

        let target = verdict.best_match_index.and_then(|i| view.raw_index(i));
        writeback::persist(
            self.store.as_ref(),
            &account.id,
            &account.fingerprints,
            target,
            incoming,
        )
        .await?;

        tracing::info!(account_id = %account.id, "auto-login accepted");
        Ok(Decision::Accept {
            session_token: account.session_token,
            kind: AcceptKind::LegitimateChange,
            verdict: Some(verdict),
        })
    }

    /// Credentialed login. Exact match short-circuits the classifier;
    /// ambiguous outcomes follow the configured [`FailMode`].
    pub async fn manual_login(
        &self,
        email: &str,
        password_hash: &str,
        incoming: &Fingerprint,
    ) -> Result<Decision> {
        let account = self
            .store
            .find_by_email(email)
            .await?
            .ok_or(EngineError::Credentials)?;
        if account.password_hash != password_hash {
            return Err(EngineError::Credentials);
        }

        if let Some(raw_idx) = exact_match(&account.fingerprints, incoming) {
            writeback::persist(
                self.store.as_ref(),
                &account.id,
                &account.fingerprints,
                Some(raw_idx),
                incoming,
            )
            .await?;
            tracing::info!(account_id = %account.id, raw_idx, "login accepted on exact match");
            return Ok(Decision::Accept {
                session_token: account.session_token,
                kind: AcceptKind::ExactMatch,
                verdict: None,
            });
        }

        let view = normalize(&account.fingerprints);
        let verdict = match self.classifier.classify(incoming, &view.normalized).await {
            Ok(verdict) => verdict,
            Err(e) => {
                return match self.policy.manual_fail_mode {
                    FailMode::Open => {
                        tracing::warn!(account_id = %account.id, error = %e, "classifier failed, fail-open append");
                        self.accept_with_append(&account, incoming, AcceptKind::FallbackAppend, None)
                            .await
                    }
                    FailMode::Closed => {
                        tracing::warn!(account_id = %account.id, error = %e, "classifier failed, fail-closed deny");
                        Ok(Decision::Deny {
                            reason: DenyReason::ClassifierUnavailable,
                            verdict: None,
                        })
                    }
                };
            }
        };

        match verdict.classification {
            Classification::LegitimateChange => {
                let target = verdict.best_match_index.and_then(|i| view.raw_index(i));
                writeback::persist(
                    self.store.as_ref(),
                    &account.id,
                    &account.fingerprints,
                    target,
                    incoming,
                )
                .await?;
                tracing::info!(account_id = %account.id, "login accepted, legitimate change");
                Ok(Decision::Accept {
                    session_token: account.session_token,
                    kind: AcceptKind::LegitimateChange,
                    verdict: Some(verdict),
                })
            }
            Classification::SessionStealer => {
                // The password already proved a factor; treat the flagged
                // fingerprint as a new device rather than locking out.
                tracing::warn!(account_id = %account.id, "stealer verdict on manual login, appending as new device");
                self.accept_with_append(
                    &account,
                    incoming,
                    AcceptKind::NewDeviceAppended,
                    Some(verdict),
                )
                .await
            }
            Classification::Other(_) => match self.policy.manual_fail_mode {
                FailMode::Open => {
                    self.accept_with_append(
                        &account,
                        incoming,
                        AcceptKind::FallbackAppend,
                        Some(verdict),
                    )
                    .await
                }
                FailMode::Closed => Ok(Decision::Deny {
                    reason: DenyReason::ClassifierRejected,
                    verdict: Some(verdict),
                }),
            },
        }
    }

    /// Periodic heartbeat while a session is active. Denies on a stealer
    /// verdict without mutating storage; classifier failure propagates.
    pub async fn verify_session(
        &self,
        session_token: &str,
        incoming: &Fingerprint,
    ) -> Result<VerifyOutcome> {
        let account = self
            .store
            .find_by_session(session_token)
            .await?
            .ok_or(EngineError::InvalidSession)?;

        let view = normalize(&account.fingerprints);
        let verdict = self.classifier.classify(incoming, &view.normalized).await?;

        match verdict.classification {
            Classification::SessionStealer => {
                tracing::warn!(account_id = %account.id, "session heartbeat flagged as stealer");
                Ok(VerifyOutcome {
                    authenticated: false,
                    session_token: account.session_token,
                    verdict,
                })
            }
            Classification::LegitimateChange => {
                // Remap the classifier's normalized-list index into raw
                // coordinates; with no mapping there is nothing to refresh.
                if let Some(raw_idx) = verdict.best_match_index.and_then(|i| view.raw_index(i)) {
                    writeback::persist(
                        self.store.as_ref(),
                        &account.id,
                        &account.fingerprints,
                        Some(raw_idx),
                        incoming,
                    )
                    .await?;
                }
                Ok(VerifyOutcome {
                    authenticated: true,
                    session_token: account.session_token,
                    verdict,
                })
            }
            // Optimistic acceptance; the verdict is surfaced for the
            // caller to inspect.
            Classification::Other(_) => Ok(VerifyOutcome {
                authenticated: true,
                session_token: account.session_token,
                verdict,
            }),
        }
    }

    async fn accept_with_append(
        &self,
        account: &Account,
        incoming: &Fingerprint,
        kind: AcceptKind,
        verdict: Option<Verdict>,
    ) -> Result<Decision> {
        writeback::persist(
            self.store.as_ref(),
            &account.id,
            &account.fingerprints,
            None,
            incoming,
        )
        .await?;
        Ok(Decision::Accept {
            session_token: account.session_token.clone(),
            kind,
            verdict,
        })
    }
}
