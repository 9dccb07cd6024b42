//! Data models for the inventaris server

pub mod activity_log;
pub mod enums;
pub mod item;
pub mod loan;
pub mod user;

// Re-export commonly used types
pub use activity_log::{ActivityLog, NewActivityLog};
pub use enums::{ApprovalStatus, BorrowerKind, Condition, Department, ItemKind, RentalStatus, UnitStatus};
pub use item::{Item, ItemShort, ItemSummary, Unit};
pub use loan::{Loan, LoanDetails};
pub use user::UserClaims;
