//! Core domain models for workflows
//!
//! This module defines the fundamental data structures that represent
//! values, steps, pipelines and their state.

pub mod config;
pub mod error;
pub mod field;
pub mod pipeline;
pub mod state;
pub mod step;
pub mod value;

pub use error::{Result, WorkflowError};
pub use field::{FieldRef, FieldSchema};
pub use pipeline::*;
pub use state::*;
pub use step::*;
pub use value::*;
