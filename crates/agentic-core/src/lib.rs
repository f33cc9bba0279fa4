//! Core library for the `agentic` plan/build driver.
//!
//! A run starts with the plan phase, which asks an assistant CLI to write a
//! plan document, and continues with the build phase, which asks it to
//! implement that plan. The two phases share a [`state::WorkflowState`]
//! persisted under `agentic/runs/<run_id>/` and optionally piped from one
//! process to the next.

pub mod error;
pub mod extract;
pub mod harness;
pub mod id;
pub mod invoker;
pub mod layout;
pub mod phase;
pub mod state;
pub mod template;
pub mod transcript;

pub use error::WorkflowError;
pub use id::RunId;
pub use invoker::{Assistant, Invoker, RetryPolicy};
pub use layout::{Component, Layout};
pub use state::{Phase, StatePatch, TaskType, WorkflowState};
