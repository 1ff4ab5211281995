//! # rw-actions
//!
//! Response actions for Response Warden.
//!
//! This crate provides the closed set of response action kinds, the
//! [`ActionInvoker`] seam through which real integrations (firewall, IAM,
//! ticketing) are plugged in, and the [`ResponseActionExecutor`] that runs
//! actions and keeps the append-only action ledger.

pub mod action_type;
pub mod executor;
pub mod invoker;

pub use action_type::{AutomationLevel, ResponseActionType};
pub use executor::{
    ActionError, ResponseAction, ResponseActionExecutor, AUTOMATED_EXECUTOR, MANUAL_EXECUTOR,
};
pub use invoker::{ActionInvoker, ActionOutput, ActionRequest, SimulatedActionInvoker};
