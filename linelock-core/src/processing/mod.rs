pub mod device_resolver;
pub mod line_reservation;
