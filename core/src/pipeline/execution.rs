// stepflow/src/pipeline/execution.rs

//! `Pipeline::run()`: executes steps in order against a shared context.

use crate::core::context_data::ContextData;
use crate::core::control::{PipelineControl, PipelineResult};
use crate::core::handler::Handler;
use crate::core::step::StepKind;
use crate::error::FlowError;
use crate::pipeline::definition::Pipeline;
use tracing::{event, info_span, Instrument, Level};

enum PhaseOutcome {
  Continue,
  Stop,
  /// A best-effort step failed; the rest of that step is abandoned.
  Abandoned,
}

impl<TData, Err> Pipeline<TData, Err>
where
  TData: 'static + Send + Sync,
  Err: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  /// Runs every step against `ctx_data`.
  ///
  /// Returns `Completed` when the last step finished, `Stopped` when a handler
  /// returned `PipelineControl::Stop`, or the first error raised by a handler of a
  /// `Required` or `Optional` step. Errors from `BestEffort` steps are logged and
  /// swallowed.
  pub async fn run(&self, ctx_data: ContextData<TData>) -> Result<PipelineResult, Err> {
    event!(
      Level::DEBUG,
      context_type = %std::any::type_name::<TData>(),
      num_steps = self.steps.len(),
      "Pipeline execution starting."
    );

    for (step_idx, step_def) in self.steps.iter().enumerate() {
      let step_name = step_def.name.as_str();

      if let Some(skip_cond) = &step_def.skip_if {
        if skip_cond(ctx_data.clone()) {
          event!(Level::DEBUG, step_name, "Step skipped by its skip condition.");
          continue;
        }
      }

      let phases = [self.before.get(step_name), self.on.get(step_name), self.after.get(step_name)];
      let has_handlers = phases.iter().any(|p| p.is_some_and(|v| !v.is_empty()));
      if !has_handlers {
        if step_def.kind.may_be_empty() {
          event!(Level::DEBUG, step_name, "Step has no handlers, skipping.");
          continue;
        }
        event!(Level::ERROR, step_name, "Required step has no handlers.");
        return Err(Err::from(FlowError::HandlerMissing {
          step_name: step_def.name.clone(),
        }));
      }

      let span = info_span!("pipeline_step", step_name, step_index = step_idx, kind = ?step_def.kind);
      let outcome = self.run_step(step_def.kind, step_name, &phases, &ctx_data).instrument(span).await?;
      match outcome {
        PhaseOutcome::Stop => return Ok(PipelineResult::Stopped),
        PhaseOutcome::Continue | PhaseOutcome::Abandoned => {}
      }
    }

    event!(Level::DEBUG, "Pipeline execution completed.");
    Ok(PipelineResult::Completed)
  }

  async fn run_step(
    &self,
    kind: StepKind,
    step_name: &str,
    phases: &[Option<&Vec<Handler<TData, Err>>>; 3],
    ctx_data: &ContextData<TData>,
  ) -> Result<PhaseOutcome, Err> {
    for handlers in phases.iter().flatten() {
      for handler_fn in handlers.iter() {
        match handler_fn(ctx_data.clone()).await {
          Ok(PipelineControl::Continue) => {}
          Ok(PipelineControl::Stop) => {
            event!(Level::INFO, step_name, "Pipeline stopped by handler.");
            return Ok(PhaseOutcome::Stop);
          }
          Err(e) if kind == StepKind::BestEffort => {
            event!(Level::WARN, step_name, error = %e, "Best-effort step failed; continuing.");
            return Ok(PhaseOutcome::Abandoned);
          }
          Err(e) => {
            event!(Level::ERROR, step_name, error = %e, "Handler failed.");
            return Err(e);
          }
        }
      }
    }
    Ok(PhaseOutcome::Continue)
  }
}
