pub mod email;
pub mod invite;
pub mod log;
pub mod schedule;
pub mod transport;
