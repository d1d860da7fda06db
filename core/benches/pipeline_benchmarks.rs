use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use stepflow::{ContextData, FlowError, Flows, Pipeline, PipelineControl, StepKind};
use tokio::runtime::Runtime;

#[derive(Clone, Debug, Default)]
struct BenchContext {
  counter: u64,
}

fn build_pipeline(num_steps: usize, best_effort_tail: bool) -> Pipeline<BenchContext, FlowError> {
  let names: Vec<String> = (0..num_steps).map(|i| format!("step_{}", i)).collect();
  let defs: Vec<(&str, StepKind, Option<stepflow::SkipCondition<BenchContext>>)> = names
    .iter()
    .enumerate()
    .map(|(i, n)| {
      let kind = if best_effort_tail && i + 1 == num_steps {
        StepKind::BestEffort
      } else {
        StepKind::Required
      };
      (n.as_str(), kind, None)
    })
    .collect();
  let mut pipeline = Pipeline::new(&defs);
  for name in &names {
    pipeline.on(name, |ctx: ContextData<BenchContext>| async move {
      ctx.update(|d| d.counter = d.counter.wrapping_add(1));
      Ok::<_, FlowError>(PipelineControl::Continue)
    });
  }
  pipeline
}

fn bench_direct_run(c: &mut Criterion) {
  let mut group = c.benchmark_group("DirectRun");
  let rt = Runtime::new().expect("tokio runtime");
  for num_steps in [1usize, 5, 10] {
    let pipeline = build_pipeline(num_steps, false);
    group.bench_with_input(BenchmarkId::from_parameter(num_steps), &num_steps, |b, _| {
      b.to_async(&rt).iter(|| async {
        let ctx = ContextData::new(BenchContext::default());
        pipeline.run(ctx).await.expect("pipeline run");
      });
    });
  }
  group.finish();
}

fn bench_registry_dispatch(c: &mut Criterion) {
  let rt = Runtime::new().expect("tokio runtime");
  let flows = Flows::<FlowError>::new();
  flows.register(build_pipeline(8, true));
  c.bench_function("RegistryDispatch/8_steps", |b| {
    b.to_async(&rt).iter(|| async {
      let ctx = ContextData::new(BenchContext::default());
      flows.run(ctx).await.expect("registry run");
    });
  });
}

criterion_group!(benches, bench_direct_run, bench_registry_dispatch);
criterion_main!(benches);
