//! Pure computation engines: hierarchy resolution and commission math.

pub mod commission;
pub mod hierarchy;

pub use commission::{
    plan_commission_update, AccountCommission, CommissionCalculator, CommissionRecord,
    CommissionUpdate,
};
pub use hierarchy::{HierarchyIndex, Resolved, ResolvedKind};
