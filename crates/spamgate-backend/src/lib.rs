//! spamgate-backend — the sole network boundary to the model-serving
//! backend.
//!
//! Every network failure is translated into a typed result at this
//! boundary; no raw transport error crosses into the gateway.

pub mod client;
pub mod error;

pub use client::{BackendClient, InvocationResult, Label};
pub use error::BackendError;
