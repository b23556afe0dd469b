//! Unit tests for fixture configuration.
//!
//! - [`types_tests`] - Defaults, serialisation and validation
//! - [`loader_tests`] - Layer precedence and environment parsing
