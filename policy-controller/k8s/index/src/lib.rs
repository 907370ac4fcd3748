//! NetworkPolicy read-model
//!
//! The index holds the cluster state that NetworkPolicy translation depends on. It watches the
//! following resources:
//!
//! - Each `NetworkPolicy` selects target pods in its own namespace and describes ingress and egress
//!   rules whose peers are CIDR blocks or pod/namespace selector pairs.
//! - Each `Pod` contributes its labels, its address and whether it uses the host network.
//! - Each `Namespace` contributes its labels, which namespace selectors match against.
//!
//! ```text
//! [ NetworkPolicy ] -> [ Pod ] (targets, peers)
//!                   -> [ Namespace ] (peers)
//! ```
//!
//! Each watched object is converted once into a typed value as it is indexed. Policy changes are
//! published as [`PolicyEvent`]s. Pod and namespace changes are published as resyncs of the
//! policies they are relevant to, as determined by the reverse lookups in [`Index`].

#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

mod index;
mod lookup;
pub mod matches;
pub mod metrics;
pub mod namespace;
pub mod pod;
pub mod policy;


pub use self::{
    index::{Index, PolicyEvent, SharedIndex, Store, StoreError},
    namespace::ClusterNamespace,
    pod::Workload,
    policy::{NetworkPolicy, Peer, Rule},
};
