// stepflow/src/pipeline/definition.rs

//! The `Pipeline<TData, Err>` struct and its structural operations.

use crate::core::handler::Handler;
use crate::core::step::{SkipCondition, StepDef, StepKind};
use crate::error::FlowError;
use std::collections::HashMap;

/// An ordered list of named steps over a root data type `TData`, whose handlers
/// return `Result<_, Err>`.
///
/// `Err` must be constructible from `FlowError` so that engine-level failures
/// (a required step without handlers, for instance) surface in the caller's own
/// error type.
pub struct Pipeline<TData, Err>
where
  TData: 'static + Send + Sync,
  Err: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  pub(crate) steps: Vec<StepDef<TData>>,

  pub(crate) before: HashMap<String, Vec<Handler<TData, Err>>>,
  pub(crate) on: HashMap<String, Vec<Handler<TData, Err>>>,
  pub(crate) after: HashMap<String, Vec<Handler<TData, Err>>>,
}

impl<TData, Err> Pipeline<TData, Err>
where
  TData: 'static + Send + Sync,
  Err: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  /// Creates a pipeline from `(name, kind, skip_if)` triples, in execution order.
  ///
  /// Panics on a duplicated step name; that is a setup mistake, not a runtime error.
  pub fn new(step_defs: &[(&str, StepKind, Option<SkipCondition<TData>>)]) -> Self {
    let mut pipeline = Self {
      steps: Vec::with_capacity(step_defs.len()),
      before: HashMap::new(),
      on: HashMap::new(),
      after: HashMap::new(),
    };
    for (name, kind, skip_if) in step_defs {
      pipeline.ensure_step_not_exists(name);
      pipeline.steps.push(StepDef {
        name: (*name).to_string(),
        kind: *kind,
        skip_if: skip_if.clone(),
      });
    }
    pipeline
  }

  /// Panics if `step_name` is not part of the pipeline.
  pub(crate) fn ensure_step_exists(&self, step_name: &str) {
    if !self.has_step(step_name) {
      panic!("stepflow setup error: {}", FlowError::StepNotFound {
        step_name: step_name.to_string()
      });
    }
  }

  fn ensure_step_not_exists(&self, step_name: &str) {
    if self.has_step(step_name) {
      panic!("stepflow setup error: {}", FlowError::DuplicateStep {
        step_name: step_name.to_string()
      });
    }
  }

  pub fn has_step(&self, step_name: &str) -> bool {
    self.steps.iter().any(|s| s.name == step_name)
  }

  /// Step names in execution order.
  pub fn step_names(&self) -> Vec<&str> {
    self.steps.iter().map(|s| s.name.as_str()).collect()
  }

  pub fn insert_after<S: Into<String>>(
    &mut self,
    existing_step_name: &str,
    new_step_name: S,
    kind: StepKind,
    skip_if: Option<SkipCondition<TData>>,
  ) {
    self.ensure_step_exists(existing_step_name);
    let name: String = new_step_name.into();
    self.ensure_step_not_exists(&name);
    let idx = self
      .steps
      .iter()
      .position(|s| s.name == existing_step_name)
      .map_or(self.steps.len(), |i| i + 1);
    self.steps.insert(idx, StepDef { name, kind, skip_if });
  }

  /// Removes a step and all handlers registered for it. Unknown names are a no-op.
  pub fn remove_step(&mut self, step_name: &str) {
    if let Some(idx) = self.steps.iter().position(|s| s.name == step_name) {
      self.steps.remove(idx);
      self.before.remove(step_name);
      self.on.remove(step_name);
      self.after.remove(step_name);
    }
  }
}
