pub mod alerts;
pub mod display;
pub mod poller;
pub mod raw;
pub mod severity;
pub mod snapshot;
pub mod status;
pub mod upstream;
