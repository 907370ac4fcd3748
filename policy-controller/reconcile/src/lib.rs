//! Reconciles NetworkPolicies into port groups, address sets and ACLs.
//!
//! Policy events from the index are filtered by the [`Notifier`] and enqueued on one of two
//! [`WorkQueue`]s: one for policies that exist and one for policies that were deleted. Workers
//! drain each queue through the [`Reconciler`], which programs a [`Backend`] and requeues keys
//! with exponential backoff when a pass fails.
//!
//! [`Backend`]: netpol_controller_core::Backend

#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

mod address;
mod controller;
mod error;
pub mod events;
pub mod metrics;
mod notify;
pub mod queue;
mod reconcile;


pub use self::{
    address::{resolve_addresses, Addresses},
    controller::Controller,
    error::Error,
    events::{EventRecorder, NoopRecorder},
    metrics::ControllerMetrics,
    notify::Notifier,
    queue::{Backoff, WorkQueue},
    reconcile::{Cleanup, Reconciler, CREATE_ACL_FAILED},
};
