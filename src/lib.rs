pub mod classifier;
pub mod config;
pub mod notify;
pub mod shared;
pub mod tickets;
