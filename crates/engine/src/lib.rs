//! Fingerprint-matching and trust-decision engine.
//!
//! This crate is the core shared by the login, signup, and mid-session
//! verification flows: normalization of heterogeneously-stored fingerprint
//! records, exact-match short-circuiting, classifier delegation,
//! index-mapping between cleaned and raw storage coordinates, and the
//! accept/deny/replace/append write-back policy. The account store and the
//! classifier are capabilities behind traits, each with one real
//! implementation and one deterministic in-process implementation.

pub mod classifier;
pub mod engine;
pub mod error;
pub mod fingerprint;
pub mod logging;
pub mod matcher;
pub mod session;
pub mod store;
pub mod writeback;

pub use classifier::{Classification, Classifier, HttpClassifier, StaticClassifier, Verdict};
pub use engine::{
    AcceptKind, Decision, DenyReason, EnginePolicy, FailMode, TrustDecisionEngine, VerifyOutcome,
};
pub use error::{EngineError, Result};
pub use fingerprint::{normalize, Fingerprint, NormalizedView, RawEntry};
pub use matcher::exact_match;
pub use store::{Account, AccountStore, MemoryAccountStore, NewAccount, RedisAccountStore};
