pub mod aggregate;
pub mod cache;
pub mod config;
pub mod counter;
pub mod format;
pub mod logging;
pub mod model;
pub mod registry;
pub mod remote;
pub mod scatter;
pub mod timectx;
pub mod upload;
pub mod view;
