//! Shared data model for the hearth observability core.
//!
//! Every other crate in the workspace speaks in terms of the types defined
//! here: raw [`types::MetricSample`]s flow in from collectors and
//! instrumentation, [`types::MetricsSnapshot`]s are evaluated by the rule
//! engine, and [`types::Alert`]s flow out to channels and storage.

pub mod health;
pub mod id;
pub mod types;
