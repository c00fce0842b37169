//! Transports implementing [crate::channel::Connection]

pub mod isotp;
pub mod queue;
pub mod simulation;

#[cfg(all(target_os = "linux", feature = "socketcan"))]
pub mod socketcan;
