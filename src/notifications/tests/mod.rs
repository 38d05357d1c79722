//! Notification system test suites
