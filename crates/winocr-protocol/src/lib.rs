//! Protocol types for winocr helper communication.
//!
//! This crate defines the request and response types exchanged between the
//! Rust session and the helper routine running inside the PowerShell
//! interpreter. Every message is a single line of JSON.

mod request;
mod response;

pub use request::*;
pub use response::*;
