//! Common test utilities for docgraph-core
//!
//! Shared fixture language (parser + scanner) and analyzer builders for the
//! integration tests.

#![allow(dead_code)]

mod builders;
mod fixtures;

pub use builders::*;
pub use fixtures::*;
