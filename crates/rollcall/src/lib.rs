//! `rollcall` - QR-code attendance tracking
//!
//! Students are registered with a roll prefix and receive a generated
//! identifier encoded as a QR image. Scanning the image marks attendance once
//! per identifier. Records live in CSV tables or an embedded `SQLite` database.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod cli;
pub mod config;
pub mod error;
pub mod http;
pub mod identifier;
pub mod logging;
pub mod model;
pub mod qr;
pub mod registry;
pub mod server;
pub mod storage;

pub use config::Config;
pub use error::{Error, Result};
pub use logging::init_logging;
pub use model::{AttendanceRecord, Student};
pub use registry::{MarkOutcome, MarkStatus, Registry};
pub use storage::RecordStore;
