//! myteacher-lib — Voice translator engine.
//!
//! Screen navigation with the ad-gate countdown, translation client, speech
//! recognition and synthesis backends, practice-page controllers, and the
//! HTTP API. Depends on myteacher-core for pure types and text processing.

pub mod capture;
pub mod config;
pub mod navigator;
pub mod page;
pub mod server;
pub mod session;
pub mod speech;
pub mod stt;
pub mod translate;
pub mod tts;
pub mod word;

#[cfg(test)]
pub(crate) mod testing;

// Re-export myteacher-core for convenience
pub use myteacher_core;
