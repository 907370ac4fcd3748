#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub use netpol_controller_core as core;
pub use netpol_controller_k8s_api as k8s;
pub use netpol_controller_k8s_index as index;
pub use netpol_controller_reconcile as reconcile;

mod args;
mod backend;
mod events;
mod lease;

pub use self::{args::Args, backend::LogBackend, events::KubeEventRecorder};
