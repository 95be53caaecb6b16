//! # Kubernetes module
//!
//! This module provide helpers to name, own and compare kubernetes resources

pub mod name;
pub mod resource;
