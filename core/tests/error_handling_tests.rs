// tests/error_handling_tests.rs
mod common;

use common::*;
use serial_test::serial;
use stepflow::{ContextData, FlowError, Pipeline, PipelineControl, PipelineResult, StepKind};

#[tokio::test]
#[serial]
async fn test_required_step_without_handlers_fails() {
  setup_tracing();
  let pipeline = Pipeline::<TestContext, TestError>::new(&[("missing", StepKind::Required, None)]);
  let result = pipeline.run(ContextData::new(TestContext::default())).await;
  match result {
    Err(TestError::Flow(s)) => {
      assert!(s.contains("HandlerMissing"));
      assert!(s.contains("missing"));
    }
    other => panic!("Expected TestError::Flow(HandlerMissing), got {:?}", other),
  }
}

#[tokio::test]
#[serial]
async fn test_optional_and_best_effort_steps_without_handlers_succeed() {
  setup_tracing();
  let pipeline = Pipeline::<TestContext, TestError>::new(&[
    ("optional_step", StepKind::Optional, None),
    ("best_effort_step", StepKind::BestEffort, None),
  ]);
  let result = pipeline.run(ContextData::new(TestContext::default())).await;
  assert_eq!(result.unwrap(), PipelineResult::Completed);
}

#[tokio::test]
#[serial]
async fn test_pipeline_with_flow_error_type() {
  setup_tracing();
  let mut pipeline = Pipeline::<TestContext, FlowError>::new(&[("task", StepKind::Required, None)]);
  pipeline.on("task", |ctx: ContextData<TestContext>| async move {
    ctx.write().counter = 1;
    Ok::<_, FlowError>(PipelineControl::Continue)
  });
  let ctx = ContextData::new(TestContext::default());
  assert!(pipeline.run(ctx.clone()).await.is_ok());
  assert_eq!(ctx.read().counter, 1);

  let mut failing = Pipeline::<TestContext, FlowError>::new(&[("fail_task", StepKind::Required, None)]);
  failing.on("fail_task", |_ctx: ContextData<TestContext>| async move {
    Err::<PipelineControl, _>(anyhow::anyhow!("downstream exploded"))
  });
  match failing.run(ContextData::new(TestContext::default())).await {
    Err(FlowError::Handler { source }) => assert_eq!(source.to_string(), "downstream exploded"),
    other => panic!("Expected FlowError::Handler, got {:?}", other),
  }
}

#[tokio::test]
#[serial]
async fn test_best_effort_errors_are_counted_but_not_returned() {
  setup_tracing();
  reset_counters();
  let mut pipeline = Pipeline::<TestContext, TestError>::new(&[("fanout", StepKind::BestEffort, None)]);
  for _ in 0..3 {
    pipeline.before("fanout", |_ctx: ContextData<TestContext>| async move {
      HANDLER_EXEC_COUNTER.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
      Err::<PipelineControl, _>(TestError::Handler("unreachable recipient".to_string()))
    });
  }
  let result = pipeline.run(ContextData::new(TestContext::default())).await;
  assert_eq!(result.unwrap(), PipelineResult::Completed);
  assert_eq!(HANDLER_EXEC_COUNTER.load(std::sync::atomic::Ordering::SeqCst), 1);
}
