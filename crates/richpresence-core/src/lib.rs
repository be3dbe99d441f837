//! Core types: presence activity model, validation, tracing setup

pub mod activity;
pub mod tracing;

pub use activity::{
    Activity, ActivityBuilder, ActivityType, Assets, Button, Party, Secrets, Timestamps,
    ValidationError, ValidationResult,
};
pub use tracing::{TracingConfig, TracingError, TracingOutputFormat, init_tracing};
