// settlement/src/models/mod.rs

//! Persisted entities of the settlement core and the money helpers they share.

pub mod cart;
pub mod money;
pub mod notification;
pub mod order;
pub mod order_item;
pub mod wallet;

pub use cart::{Cart, CartLine, CartStatus};
pub use notification::{Notification, NotificationKind};
pub use order::{Order, OrderStatus, PaymentStatus};
pub use order_item::OrderLineItem;
pub use wallet::{ledger_reference, EntryStatus, EntryType, LedgerEntry, NewLedgerEntry};
