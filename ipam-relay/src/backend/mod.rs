//! IPAM backend access.
//!
//! The backend is an Infoblox WAPI endpoint treated as a black-box REST
//! service: every call is a basic-auth JSON request whose JSON answer is
//! handed back untouched.

pub mod client;
pub mod error;

pub use client::BackendClient;
pub use error::BackendError;
