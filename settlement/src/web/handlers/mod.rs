// settlement/src/web/handlers/mod.rs

pub mod checkout_handlers;
pub mod payment_handlers;
pub mod wallet_handlers;
pub mod webhook_handlers;
