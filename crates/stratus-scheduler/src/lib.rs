//! Stratus Scheduler - placement and consolidation engine
//!
//! A library-shaped scheduler for a simulated virtualized compute cluster.
//! The driving simulator invokes the entry points on [`Scheduler`] for each
//! event (task arrival/completion, migration and power-transition
//! completions, SLA and memory warnings, periodic ticks); the scheduler
//! decides task placement, VM creation and migration, and machine power
//! states, with the joint goal of meeting per-task SLAs while keeping the
//! powered-on machine count low.
//!
//! All callbacks are single-threaded and synchronous. The logically
//! asynchronous operations - power transitions and migrations - are tracked
//! as pending records updated on request and on completion; the scheduler
//! never waits.

pub mod accounting;
pub mod consolidation;
pub mod drain;
pub mod inventory;
pub mod janitor;
pub mod migration;
pub mod placement;
pub mod policy;
pub mod scheduler;
pub mod transition;
pub mod warnings;

pub use migration::PendingMigration;
pub use policy::{FirstFitPolicy, GreedyPolicy, HostCandidate, PlacementPolicy, VmCandidate};
pub use scheduler::{FinalReport, Scheduler};
