//! Use-case services orchestrating validation, engine math and persistence.

pub mod orders;
pub mod settlement;

pub use orders::{CreateOrderInput, OrderService, OrderServiceError};
pub use settlement::{
    AccountSettlement, RegisterAccountInput, SettlementError, SettlementService,
};
