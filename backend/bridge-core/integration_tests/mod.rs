//! Integration tests for the bridge's public surface.

mod ipc_tests;
