pub mod adb;
pub mod cancel;
pub mod commands;
pub mod config;
pub mod device;
pub mod enterprise;
pub mod error;
pub mod logging;
pub mod models;
pub mod probes;
pub mod scheduler;
pub mod state;
pub mod wifi;
