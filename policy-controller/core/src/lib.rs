#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod backend;
mod key;
pub mod names;
pub mod port;

pub use self::{
    backend::{Backend, BackendError, Direction},
    key::{InvalidKey, PolicyKey},
    names::BackendNames,
    port::{AclPort, InvalidPort, PortRef, Protocol},
};

pub const CONTROLLER_NAME: &str = "netpol-controller";
