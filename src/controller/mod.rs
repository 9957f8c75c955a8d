//! Health-check / debounce / restart decision loop
//!
//! - `workload`: Kubernetes access for the watched Deployment
//! - `readiness`: pod readiness sampling
//! - `guard`: at most one check cycle at a time
//! - `decider`: the per-cycle restart decision
//! - `scheduler`: periodic ticks driving cycles

pub mod decider;
pub mod guard;
pub mod readiness;
pub mod scheduler;
pub mod workload;

#[cfg(test)]
pub(crate) mod mock;

pub use decider::{CycleOutcome, RestartDecider};
pub use guard::{CycleGuard, CyclePermit, CycleState};
pub use readiness::{HealthEvaluator, ReadinessSample};
pub use scheduler::Scheduler;
pub use workload::{lookup_workload, KubeDeployment, WorkloadController, WorkloadError};
