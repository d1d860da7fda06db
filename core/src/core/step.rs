// stepflow/src/core/step.rs

//! Step definitions.

use super::ContextData;

/// Predicate evaluated before a step runs. Returning `true` skips the step.
pub type SkipCondition<TData> = std::sync::Arc<dyn Fn(ContextData<TData>) -> bool + Send + Sync + 'static>;

/// How a step's absence of handlers and its handler failures are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
  /// Must have at least one handler. A handler error aborts the run.
  Required,
  /// May have no handlers. A handler error still aborts the run.
  Optional,
  /// May have no handlers. A handler error is logged and the run continues.
  BestEffort,
}

impl StepKind {
  pub fn may_be_empty(self) -> bool {
    !matches!(self, StepKind::Required)
  }
}

#[derive(Clone)]
pub struct StepDef<T: 'static + Send + Sync> {
  pub name: String,
  pub kind: StepKind,
  pub skip_if: Option<SkipCondition<T>>,
}

impl<T: 'static + Send + Sync> std::fmt::Debug for StepDef<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("StepDef")
      .field("name", &self.name)
      .field("kind", &self.kind)
      .field("skip_if_present", &self.skip_if.is_some())
      .finish()
  }
}
