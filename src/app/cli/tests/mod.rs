//! CLI test suites

mod config_tests;
