//! Mock infrastructure for upstream providers
//!
//! All mocks are reusable across test files and cover success, rejection
//! and slow-upstream scenarios.

#![allow(dead_code)]


pub use upstream::*;
