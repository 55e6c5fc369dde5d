//! Unit tests for the task module.

mod store_tests;

pub(super) use crate::test_support::ManualClock;
