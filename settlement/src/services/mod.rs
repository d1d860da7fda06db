// settlement/src/services/mod.rs

pub mod gateway;
pub mod gateway_mock;
pub mod notifier;
pub mod retry;
pub mod signature;
