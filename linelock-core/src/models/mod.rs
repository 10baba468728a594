pub mod config;
pub mod device;
pub mod error;
pub mod outcome;
pub mod scenario;
pub mod state;
