//! Domain module: pure gateway rules with no I/O of their own.
//!
//! - **`ptt`** – the push-to-talk state machine and the [`ptt::ControlLine`]
//!   abstraction over the physical key line.
//! - **`debounce`** – rate limiting for remote PTT toggles.
//! - **`dtmf`** – best-effort decoding of DTMF payloads.

pub mod debounce;
pub mod dtmf;
pub mod ptt;
