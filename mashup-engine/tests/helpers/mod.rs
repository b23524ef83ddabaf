//! Test Helper Utilities
//!
//! Shared fakes and fixtures for mashup-engine integration tests

#![allow(dead_code)]

pub mod fakes;
pub mod fixtures;

pub use fakes::{FakeFetcher, FakeResolver, MemoryStore};
pub use fixtures::{create_test_store, golden_tracks, ids, section, uniform_sections};
