//! Core composition engine
//!
//! Leaf modules (errors, tokens, validation) come first, then the
//! container and IAM layers, then the resources and the backend facade
//! built on top of them.

pub mod backend;
pub mod config;
pub mod construct;
pub mod container;
pub mod context;
pub mod declaration;
pub mod error;
pub mod guard;
pub mod handlers;
pub mod iam;
pub mod resources;
pub mod token;
pub mod validation;
