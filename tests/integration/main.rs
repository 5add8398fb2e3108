//! Integration tests for httpeat
//!
//! These tests use wiremock to create mock HTTP servers (and stand-in
//! proxies and mirror hosts) and run full harvest sessions end-to-end in
//! temporary session directories.

mod support;

mod download_tests;
mod lane_tests;
mod resume_tests;
mod skip_tests;
