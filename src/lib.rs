//! Locally evaluated feature flags.
//!
//! # Overview
//!
//! The crate revolves around a [`Client`] that decides whether a feature flag is enabled for a
//! subject (a user or a group) without a round trip to the server whenever possible. A background
//! [`PollerThread`] keeps an in-memory [`FlagSnapshot`] of flag definitions current; evaluation
//! walks the flag's rule groups against the caller's [`Properties`], buckets subjects with a
//! deterministic hash for percentage rollouts and multivariate flags, and only asks the server
//! when a flag cannot be decided locally.
//!
//! Bucketing is bit-for-bit compatible with the other SDKs: the same subject gets the same value
//! for the same flag no matter which language evaluates it.
//!
//! # Error Handling
//!
//! Flag evaluation never fails: when a flag cannot be evaluated, the caller-supplied default is
//! returned and the cause is logged. Background fetch errors and remote decision errors are
//! reported to an [`ErrorSink`] and never stop the poller.
//!
//! # Logging
//!
//! The package uses the [`log`](https://docs.rs/log/latest/log/) crate with target
//! `featureflags`. Consider integrating a `log`-compatible logger implementation for better
//! visibility into flag evaluation.

#![warn(rustdoc::missing_crate_level_docs)]

mod client;
mod config;
mod decide;
mod error;
mod error_sink;
mod eval;
mod fetcher;
mod flag_store;
mod flags;
mod hasher;
mod poller;
mod properties;
mod rules;
mod variants;

pub use client::Client;
pub use config::ClientConfig;
pub use decide::{DecisionSource, Groups, HttpDecideClient};
pub use error::{Error, EvaluationError, Result};
pub use error_sink::ErrorSink;
pub use fetcher::{FlagSource, HttpFlagFetcher};
pub use flag_store::{FlagSnapshot, FlagStore};
pub use flags::{
    FlagDefinition, FlagListResponse, FlagValue, Filters, MultivariateSpec, PropertyCondition,
    PropertyType, RuleGroup, VariantDefinition,
};
pub use hasher::{check_rollout, Hasher, Sha1Hasher, LONG_SCALE};
pub use poller::{PollerConfig, PollerState, PollerThread};
pub use properties::{Properties, PropertyValue};
pub use rules::Operator;
pub use variants::{resolve_variant, variant_lookup_table, VariantRange};
