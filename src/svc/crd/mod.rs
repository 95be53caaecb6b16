//! # Custom resource definition module
//!
//! This module provide custom resource definitions read by the operator and
//! their structures, defaults and validation.

pub mod rabbitmq_source;
