// tests/context_management_tests.rs
mod common;

use common::*;
use serial_test::serial;
use stepflow::{ContextData, FlowError, Pipeline, PipelineControl, StepKind};

#[tokio::test]
#[serial]
async fn test_context_data_is_shared_between_steps() {
  setup_tracing();
  let mut pipeline = Pipeline::<TestContext, TestError>::new(&[
    ("step1_modify", StepKind::Required, None),
    ("step2_read_modify", StepKind::Required, None),
  ]);

  pipeline.on("step1_modify", |ctx: ContextData<TestContext>| async move {
    ctx.update(|data| {
      data.counter = 10;
      data.message = "SetByStep1".to_string();
    });
    Ok::<_, FlowError>(PipelineControl::Continue)
  });

  pipeline.on("step2_read_modify", |ctx: ContextData<TestContext>| async move {
    let seen = ctx.view(|data| (data.counter, data.message.clone()));
    assert_eq!(seen, (10, "SetByStep1".to_string()));
    tokio::time::sleep(std::time::Duration::from_millis(1)).await;
    ctx.update(|data| {
      data.counter += 5;
      data.message.push_str("_ThenStep2");
    });
    Ok::<_, FlowError>(PipelineControl::Continue)
  });

  let ctx = ContextData::new(TestContext::default());
  pipeline.run(ctx.clone()).await.unwrap();

  let final_state = ctx.snapshot();
  assert_eq!(final_state.counter, 15);
  assert_eq!(final_state.message, "SetByStep1_ThenStep2");
}

#[tokio::test]
#[serial]
async fn test_context_data_clone_shares_data() {
  setup_tracing();
  let original_ctx = ContextData::new(TestContext {
    counter: 1,
    ..Default::default()
  });
  let cloned_ctx = original_ctx.clone();

  original_ctx.write().counter = 5;
  assert_eq!(cloned_ctx.read().counter, 5);

  cloned_ctx.update(|d| d.counter = 10);
  assert_eq!(original_ctx.view(|d| d.counter), 10);
}

#[tokio::test]
#[serial]
async fn test_try_write_fails_while_read_guard_is_held() {
  setup_tracing();
  let ctx = ContextData::new(TestContext::default());
  let guard = ctx.read();
  assert!(ctx.try_write().is_none());
  assert!(ctx.try_read().is_some());
  drop(guard);
  assert!(ctx.try_write().is_some());
}
