//! Infrastructure layer
//!
//! This module contains all external dependencies and infrastructure concerns:
//! the persistence seams, the payment-gateway contract and its vendor
//! implementation, and the shared HTTP client.

pub mod gateway;
pub mod http_client;
pub mod memory;
pub mod razorpay;
pub mod store;
