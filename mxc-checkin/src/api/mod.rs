//! HTTP API handlers for mxc-checkin

pub mod admin;
pub mod appointments;
pub mod auth;
pub mod checkin;
pub mod health;
pub mod kanban;
pub mod mappings;
pub mod panels;
pub mod photos;
pub mod screensaver;

pub use admin::admin_routes;
pub use appointments::appointment_routes;
pub use checkin::checkin_routes;
pub use health::health_routes;
pub use kanban::kanban_routes;
pub use mappings::mapping_routes;
pub use panels::panel_routes;
pub use photos::photo_routes;
pub use screensaver::screensaver_routes;
