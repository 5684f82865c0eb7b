pub mod api;
pub mod config;
pub mod db;
pub mod domain;
pub mod engine;
pub mod error;
pub mod orchestration;
pub mod stats;

pub use config::Config;
pub use db::{init_db, Repository};
pub use domain::{
    AccountKind, Amount, DurationCode, ExclusionEntry, Order, OrderNo, OrderStatus, SalesAccount,
    SalesCode, TimeMs,
};
pub use error::{AppError, DomainError};
pub use orchestration::{OrderService, SettlementService};
pub use stats::{Aggregator, Period, Scope, StatsSnapshot};
