//! Runtime configuration
//!
//! Environment variables:
//!
//! - `STRATA_BACKEND_POLICY` - `default`, `openblas`, `blas` or `cuda`
//! - `STRATA_CUDA_FALLBACK` - `error` (default) or `cpu`
//! - `STRATA_PROFILE` - start with profiling enabled (`1`/`true`/`on`)
//! - `STRATA_PROFILE_SPANS` - retain raw spans for Chrome tracing
//! - `STRATA_PROFILE_SPAN_CAPACITY` - maximum number of retained spans

use crate::error::Result;
use std::env;
use strata_backends::{BackendPolicy, CudaFallback, DispatchError, SelectorConfig};
use strata_profiler::ProfilerConfig;

pub const ENV_BACKEND_POLICY: &str = "STRATA_BACKEND_POLICY";
pub const ENV_CUDA_FALLBACK: &str = "STRATA_CUDA_FALLBACK";
pub const ENV_PROFILE: &str = "STRATA_PROFILE";
pub const ENV_PROFILE_SPANS: &str = "STRATA_PROFILE_SPANS";
pub const ENV_PROFILE_SPAN_CAPACITY: &str = "STRATA_PROFILE_SPAN_CAPACITY";

/// Everything a [`crate::Runtime`] is built from
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RuntimeConfig {
    pub policy: BackendPolicy,
    pub cuda_fallback: CudaFallback,
    pub profiling_enabled: bool,
    pub selector: SelectorConfig,
    pub profiler: ProfilerConfig,
}

impl RuntimeConfig {
    /// Defaults overridden by `STRATA_*` environment variables
    ///
    /// Unset variables keep their default. Malformed values are
    /// `Configuration` errors.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`RuntimeConfig::from_env`] with a custom variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(value) = non_empty(lookup(ENV_BACKEND_POLICY)) {
            config.policy = value.parse()?;
        }
        if let Some(value) = non_empty(lookup(ENV_CUDA_FALLBACK)) {
            config.cuda_fallback = value.parse()?;
        }
        if let Some(value) = non_empty(lookup(ENV_PROFILE)) {
            config.profiling_enabled = parse_flag(ENV_PROFILE, &value)?;
        }
        if let Some(value) = non_empty(lookup(ENV_PROFILE_SPANS)) {
            config.profiler.retain_spans = parse_flag(ENV_PROFILE_SPANS, &value)?;
        }
        if let Some(value) = non_empty(lookup(ENV_PROFILE_SPAN_CAPACITY)) {
            config.profiler.span_capacity = value.trim().parse::<usize>().map_err(|_| {
                DispatchError::configuration(format!("{ENV_PROFILE_SPAN_CAPACITY} must be a count, got '{value}'"))
            })?;
        }

        Ok(config)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse_flag(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(DispatchError::configuration(format!("{key} must be a boolean, got '{other}'")).into()),
    }
}
