//! Procedural macros for testing slipstream crates.
//!
//! The macros are implemented in `slipstream-macros-impl` and re-exported here alongside the
//! crates their expansions refer to, so callers only depend on this crate.

pub use slipstream_macros_impl::test_traced;

// Hidden from docs because these are needed for the proc macros to use 3rd
// party crates.
#[doc(hidden)]
pub use ::tracing;
#[doc(hidden)]
pub use ::tracing_subscriber;
