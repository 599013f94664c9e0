//! Lifecycle of the external assistant process
//!
//! One process at a time, one terminal event per process. The log file the
//! process writes is read elsewhere; here only spawn, kill and exit matter.

pub mod controller;

pub use controller::{
    Invocation, KillError, ProcessController, ProcessEvent, ProcessHandle, SpawnError,
};
