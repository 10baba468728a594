pub mod acknowledge;
pub mod catalog;
pub mod console;
pub mod context;
pub mod sequencer;
