//! Service layer: orchestration on top of the database and CRM modules

pub mod checkin;
pub mod kanban;
pub mod webhook;

pub use webhook::WebhookSender;
