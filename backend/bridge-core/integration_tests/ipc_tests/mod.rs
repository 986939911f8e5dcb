mod helpers;
mod ipc;
