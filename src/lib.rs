//! Point-in-time `.tar.gz` backups of Docker volumes, optionally stopping
//! the containers that use them while the archive is taken.

pub mod app;
pub mod cli;
pub mod core;
pub mod utils;
