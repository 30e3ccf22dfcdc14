//! Reply Relay — intercepts messaging notifications and answers them inline.

pub mod client;
pub mod config;
pub mod error;
pub mod injector;
pub mod pipeline;
pub mod source;
