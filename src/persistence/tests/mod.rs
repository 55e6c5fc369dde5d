//! Unit tests for snapshot encoding and the persistence store.

mod serializer_tests;
mod store_tests;
