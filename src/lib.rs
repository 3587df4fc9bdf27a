//! # strata
//!
//! Backend dispatch and operation profiling for tensor runtimes.
//!
//! This crate re-exports [`strata_core`]; the workspace is split into:
//!
//! - `strata-backends` - device detection, backend policy and selection
//! - `strata-profiler` - aggregate statistics, reports, exports and analysis
//! - `strata-core` - the [`Runtime`] context, tensors and the public API
//! - `strata-tracing` - shared `tracing` subscriber setup
//!
//! ```rust
//! use strata::{ops, BackendPolicy, Tensor};
//!
//! strata::set_backend_policy(BackendPolicy::Default);
//! let t = Tensor::from_vec(vec![1.0, -1.0]);
//! ops::relu(&t)?;
//! assert!(strata::explain_last_dispatch().starts_with("relu → CPU"));
//! # Ok::<(), strata::Error>(())
//! ```

pub use strata_core::*;
