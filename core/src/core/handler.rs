// stepflow/src/core/handler.rs

use crate::core::context_data::ContextData;
use crate::core::control::PipelineControl;
use std::future::Future;
use std::pin::Pin;

/// A pipeline step handler.
///
/// Receives a clone of the flow's `ContextData<TData>` and resolves to a
/// `PipelineControl` or the pipeline's error type.
///
/// Handlers must drop any lock guard taken on the context before their first
/// `.await`; the guards are blocking `parking_lot` guards.
pub type Handler<TData, Err> = Box<
  dyn Fn(ContextData<TData>) -> Pin<Box<dyn Future<Output = Result<PipelineControl, Err>> + Send>>
    + Send
    + Sync,
>;
