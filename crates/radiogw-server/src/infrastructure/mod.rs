//! Infrastructure layer for the gateway.
//!
//! Contains OS-facing adapters: sound-card audio, the serial PTT line, and
//! config file storage.  Each device family sits behind a trait with a mock
//! implementation for tests.

pub mod audio;
pub mod serial;
pub mod storage;
