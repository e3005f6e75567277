//! Database access for mxc-checkin
//!
//! The schema itself lives in `mxc_common::db`; these modules hold the
//! queries the service runs against it.

pub mod appointments;
pub mod checkins;
pub mod kanban;
pub mod mappings;
pub mod panels;
pub mod settings;
pub mod users;
