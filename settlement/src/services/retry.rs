// settlement/src/services/retry.rs

//! Exponential backoff with jitter for operations that failed transiently.

use std::future::Future;
use std::time::Duration;
use tracing::{info, warn};

use crate::errors::AppError;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
  pub max_retries: u32,
  pub initial_delay: Duration,
  pub max_delay: Duration,
  pub backoff_multiplier: f64,
  pub jitter_factor: f64,
}

impl Default for RetryPolicy {
  fn default() -> Self {
    Self {
      max_retries: 2,
      initial_delay: Duration::from_millis(200),
      max_delay: Duration::from_secs(5),
      backoff_multiplier: 2.0,
      jitter_factor: 0.1,
    }
  }
}

impl RetryPolicy {
  pub fn new(max_retries: u32, initial_delay: Duration) -> Self {
    Self {
      max_retries,
      initial_delay,
      ..Self::default()
    }
  }

  /// Delay before retry number `attempt + 1`.
  pub fn delay_for(&self, attempt: u32) -> Duration {
    let base = self.initial_delay.as_millis() as f64 * self.backoff_multiplier.powi(attempt as i32);
    let capped = base.min(self.max_delay.as_millis() as f64);
    let jitter_range = capped * self.jitter_factor;
    let jitter = (rand::random::<f64>() - 0.5) * jitter_range * 2.0;
    Duration::from_millis((capped + jitter).max(0.0) as u64)
  }

  /// Runs `operation` until it succeeds, fails with a non-retryable error, or
  /// retries run out. Only `AppError::is_retryable` errors are retried.
  pub async fn run<F, Fut, T>(&self, operation_name: &str, operation: F) -> Result<T, AppError>
  where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, AppError>>,
  {
    let mut attempt = 0;
    loop {
      match operation().await {
        Ok(value) => {
          if attempt > 0 {
            info!(operation = operation_name, attempt, "Operation succeeded after retry.");
          }
          return Ok(value);
        }
        Err(e) if e.is_retryable() && attempt < self.max_retries => {
          let delay = self.delay_for(attempt);
          attempt += 1;
          warn!(
            operation = operation_name,
            attempt,
            max_retries = self.max_retries,
            ?delay,
            error = %e,
            "Transient failure, retrying."
          );
          tokio::time::sleep(delay).await;
        }
        Err(e) => return Err(e),
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::services::gateway::GatewayError;
  use std::sync::atomic::{AtomicU32, Ordering};

  fn quick_policy(max_retries: u32) -> RetryPolicy {
    RetryPolicy {
      initial_delay: Duration::from_millis(1),
      max_delay: Duration::from_millis(2),
      ..RetryPolicy::new(max_retries, Duration::from_millis(1))
    }
  }

  #[tokio::test]
  async fn transient_errors_are_retried_until_success() {
    let calls = &AtomicU32::new(0);
    let result = quick_policy(3)
      .run("flaky", move || async move {
        if calls.fetch_add(1, Ordering::SeqCst) < 2 {
          Err(AppError::Gateway(GatewayError::Transport("reset".into())))
        } else {
          Ok(7)
        }
      })
      .await;
    assert_eq!(result.unwrap(), 7);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
  }

  #[tokio::test]
  async fn permanent_errors_are_not_retried() {
    let calls = &AtomicU32::new(0);
    let result: Result<(), AppError> = quick_policy(3)
      .run("lookup", move || async move {
        calls.fetch_add(1, Ordering::SeqCst);
        Err(AppError::OrderNotFound { reference: "PAY-x".into() })
      })
      .await;
    assert!(matches!(result, Err(AppError::OrderNotFound { .. })));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[test]
  fn delays_grow_and_stay_capped() {
    let policy = RetryPolicy {
      jitter_factor: 0.0,
      ..RetryPolicy::new(5, Duration::from_millis(100))
    };
    assert_eq!(policy.delay_for(0), Duration::from_millis(100));
    assert_eq!(policy.delay_for(1), Duration::from_millis(200));
    assert_eq!(policy.delay_for(10), Duration::from_secs(5));
  }
}
