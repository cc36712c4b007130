//! Domain Layer
//!
//! ## Structure
//!
//! - `entities/` - Application, Node, Service, Scenario, DeploymentState
//! - `value_objects/` - Node and pod names, application kinds, hashes
//! - `services/` - Topology resolver, overlay writer, config patcher
//! - `ports/` - Interface definitions for infrastructure
//!
//! The layer never touches the cluster directly; all I/O goes through
//! trait-defined ports.

pub mod entities;
pub mod ports;
pub mod services;
pub mod value_objects;
