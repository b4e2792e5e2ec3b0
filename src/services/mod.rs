//! Business logic services
//!
//! This module contains all the business logic of the application.
//! Services orchestrate domain operations and coordinate with infrastructure.

pub mod appointment_service;
pub mod availability_service;
pub mod payment_service;
pub mod pricing;
