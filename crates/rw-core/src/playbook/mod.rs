//! Playbook model, matching and execution.

pub mod catalog;
pub mod conditions;
pub mod execution;
pub mod executor;
pub mod model;
pub mod store;
pub mod validation;

pub use catalog::builtin_playbooks;
pub use conditions::{
    all_conditions_hold, trigger_conditions_hold, ContextConditionEvaluator,
    ProbabilisticConditionEvaluator, StepConditionEvaluator, TriggerCondition,
};
pub use execution::{
    ExecutionMetrics, ExecutionPath, ExecutionResults, ExecutionStatus, PlaybookExecution,
    StepExecution, StepStatus, TriggerRef,
};
pub use executor::{
    ExecutionPolicy, ManualTaskHandler, PlaybookError, PlaybookManager, SimulatedManualHandler,
    StepError,
};
pub use model::{Playbook, PlaybookCategory, PlaybookStep, Priority, StepType, Trigger};
pub use validation::PlaybookValidationError;
