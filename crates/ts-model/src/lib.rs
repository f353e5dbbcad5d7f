//! Shared types for thingstack: resources, references, policies and stack configuration.

pub mod arns;
pub mod config;
pub mod credential;
pub mod policy;
pub mod resource;

pub use arns::*;
pub use config::*;
pub use credential::*;
pub use policy::*;
pub use resource::*;
