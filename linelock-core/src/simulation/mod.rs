pub mod simulated_platform;
