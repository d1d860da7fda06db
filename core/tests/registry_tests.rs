// tests/registry_tests.rs
mod common;

use common::*;
use stepflow::{ContextData, FlowError, Flows, Pipeline, PipelineControl, PipelineResult, StepKind};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
struct AlphaCtx {
  val: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
struct BetaCtx {
  num: i32,
}

#[tokio::test]
async fn test_registry_runs_pipeline_for_context_type() {
  setup_tracing();
  let flows = Flows::<TestError>::new();

  let mut alpha = Pipeline::<AlphaCtx, TestError>::new(&[("alpha_task", StepKind::Required, None)]);
  alpha.on("alpha_task", |ctx: ContextData<AlphaCtx>| async move {
    ctx.write().val = "alpha_processed".to_string();
    Ok::<_, FlowError>(PipelineControl::Continue)
  });
  flows.register(alpha);

  let mut beta = Pipeline::<BetaCtx, TestError>::new(&[("beta_task", StepKind::Required, None)]);
  beta.on("beta_task", |ctx: ContextData<BetaCtx>| async move {
    ctx.write().num = 100;
    Ok::<_, FlowError>(PipelineControl::Stop)
  });
  flows.register(beta);

  assert!(flows.is_registered::<AlphaCtx>());

  let ctx_alpha = ContextData::new(AlphaCtx::default());
  assert_eq!(flows.run(ctx_alpha.clone()).await.unwrap(), PipelineResult::Completed);
  assert_eq!(ctx_alpha.read().val, "alpha_processed");

  let ctx_beta = ContextData::new(BetaCtx::default());
  assert_eq!(flows.run(ctx_beta.clone()).await.unwrap(), PipelineResult::Stopped);
  assert_eq!(ctx_beta.read().num, 100);
}

#[tokio::test]
async fn test_registry_pipeline_not_registered() {
  setup_tracing();
  let flows = Flows::<TestError>::new();
  let result = flows.run(ContextData::new(AlphaCtx::default())).await;
  match result {
    Err(TestError::Flow(s)) => {
      assert!(s.contains("NotRegistered"));
      assert!(s.contains("AlphaCtx"));
    }
    other => panic!("Expected NotRegistered, got {:?}", other),
  }
}

#[tokio::test]
async fn test_registry_handler_errors_convert_into_app_error() {
  setup_tracing();
  let flows = Flows::<TestError>::new();
  let mut alpha = Pipeline::<AlphaCtx, TestError>::new(&[("explode", StepKind::Required, None)]);
  alpha.on("explode", |_ctx: ContextData<AlphaCtx>| async move {
    Err::<PipelineControl, _>(TestError::Handler("nope".to_string()))
  });
  flows.register(alpha);

  let result = flows.run(ContextData::new(AlphaCtx::default())).await;
  assert_eq!(result, Err(TestError::Handler("nope".to_string())));
}
