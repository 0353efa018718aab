pub mod conditions;
pub mod details;
pub mod health;
pub mod poller;
