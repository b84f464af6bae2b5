pub mod cache;
pub mod loader;
pub mod poller;
pub mod submitter;
pub mod transport;
