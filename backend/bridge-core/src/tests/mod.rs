// Unit tests for bridge-core internals.
// Integration tests for the IPC surface are in integration_tests/.

mod actors;
mod ipc;
mod sync;
