//! Test Helper Utilities
//!
//! Shared utilities for testing mxc-checkin

#![allow(dead_code)]

pub mod fake_crm;
pub mod log_capture;
pub mod test_server;

pub use fake_crm::FakeCrm;
pub use log_capture::capture_logs;
pub use test_server::{
    add_user, body_json, request, spawn_receiver, test_state, Received, ADMIN_EMAIL,
};
