//! Application layer use cases for the gateway.
//!
//! # What is the "application" layer? (for beginners)
//!
//! In Clean Architecture the *application* layer sits between the domain
//! (pure rules in `radiogw_core`) and the infrastructure (sound card, serial
//! port, config file).  Use cases here orchestrate domain objects and reach
//! devices only through traits, so every use case runs against in-memory
//! mocks in tests.
//!
//! # Sub-modules
//!
//! - **`session`**  – Runs one client connection: the receive loop that
//!   dispatches protocol messages, the transmit loop that forwards captured
//!   audio, and the teardown that always leaves PTT off.
//!
//! - **`listener`** – Binds the TCP socket and serves clients strictly one
//!   at a time.

pub mod listener;
pub mod session;
