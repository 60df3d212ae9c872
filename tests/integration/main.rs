//! Integration test suite
//!
//! These tests run the importer against wiremock servers standing in for
//! the Place Details API, with SQLite databases on disk.

mod api_tests;
mod import_tests;
