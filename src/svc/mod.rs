//! # Services module
//!
//! This module provide services to turn rabbitmq sources into the kubernetes
//! resources running their receive adapter, and helpers to do so.
pub mod adapter;
pub mod cfg;
pub mod crd;
pub mod k8s;
pub mod period;
