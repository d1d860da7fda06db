// src/lib.rs

//! stepflow: an async, type-safe step pipeline engine.
//!
//! A flow is a `Pipeline<TData, Err>`: an ordered list of named steps, each with
//! `before`/`on`/`after` handlers operating on a shared `ContextData<TData>`.
//! Steps are one of three kinds:
//!  - `Required`: must have handlers, failures abort the run.
//!  - `Optional`: may have no handlers, failures still abort the run.
//!  - `BestEffort`: may have no handlers, failures are logged and swallowed.
//!
//! Handlers signal `PipelineControl::Continue` or `PipelineControl::Stop`.
//! A `Flows<E>` registry keys pipelines by their context data type so a web
//! layer can run "the pipeline for `SettlementCtxData`" without holding it directly.

pub mod core;
pub mod error;
pub mod pipeline;
pub mod registry;

pub use crate::core::context_data::ContextData;
pub use crate::core::control::{PipelineControl, PipelineResult};
pub use crate::core::handler::Handler;
pub use crate::core::step::{SkipCondition, StepDef, StepKind};

pub use crate::pipeline::definition::Pipeline;

pub use crate::error::{FlowError, FlowResult};

pub use crate::registry::Flows;
