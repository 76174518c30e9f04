//! myteacher-core — Pure types, screen routing, and text processing.
//!
//! No async runtime, no I/O, no platform dependencies.

pub mod router;
pub mod text_prep;
pub mod types;
pub mod wav;
