//! Domain types for the referral ledger.
//!
//! This module provides:
//! - Lossless money/rate handling via the Amount wrapper
//! - Primitives: TimeMs, SalesCode, OrderNo
//! - The canonical duration normalizer
//! - The order status machine (explicit transition table)
//! - Order and SalesAccount records

pub mod account;
pub mod duration;
pub mod numeric;
pub mod order;
pub mod primitives;
pub mod status;

pub use account::{AccountKind, ExclusionEntry, SalesAccount};
pub use duration::DurationCode;
pub use numeric::Amount;
pub use order::Order;
pub use primitives::{OrderNo, SalesCode, TimeMs};
pub use status::OrderStatus;
