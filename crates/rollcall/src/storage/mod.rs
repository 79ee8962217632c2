//! Storage layer for rollcall.
//!
//! Students and attendance live in two append-only tables behind the
//! [`RecordStore`] trait. Lookups are linear scans over the full table, and
//! no backend enforces uniqueness; duplicate detection is the registry's job.

pub mod csv_store;
pub mod migrations;
pub mod schema;
pub mod sqlite;

use tracing::info;

use crate::config::{Config, StorageBackend};
use crate::error::{Error, Result};
use crate::model::{AttendanceRecord, Student, ATTENDANCE_HEADERS};

pub use csv_store::CsvStore;
pub use sqlite::SqliteStore;

/// Append-only storage for the students and attendance tables.
pub trait RecordStore: std::fmt::Debug + Send {
    /// Short backend name for logs and status output.
    fn backend(&self) -> StorageBackend;

    /// All students, in registration order.
    ///
    /// # Errors
    ///
    /// Returns an error if the table cannot be read.
    fn list_students(&self) -> Result<Vec<Student>>;

    /// Append a student.
    ///
    /// # Errors
    ///
    /// Returns an error if the table cannot be written.
    fn append_student(&mut self, student: &Student) -> Result<()>;

    /// All attendance records, in marking order.
    ///
    /// # Errors
    ///
    /// Returns an error if the table cannot be read.
    fn list_attendance(&self) -> Result<Vec<AttendanceRecord>>;

    /// Append an attendance record.
    ///
    /// # Errors
    ///
    /// Returns an error if the table cannot be written.
    fn append_attendance(&mut self, record: &AttendanceRecord) -> Result<()>;

    /// Truncate both tables back to their empty state.
    ///
    /// # Errors
    ///
    /// Returns an error if either table cannot be rewritten.
    fn reset(&mut self) -> Result<()>;

    /// The student whose identifier equals `roll_no` exactly.
    ///
    /// # Errors
    ///
    /// Returns an error if the table cannot be read.
    fn find_student(&self, roll_no: &str) -> Result<Option<Student>> {
        Ok(self
            .list_students()?
            .into_iter()
            .find(|s| s.roll_no == roll_no))
    }

    /// The first attendance record whose identifier equals `roll_no` exactly.
    ///
    /// # Errors
    ///
    /// Returns an error if the table cannot be read.
    fn find_attendance(&self, roll_no: &str) -> Result<Option<AttendanceRecord>> {
        Ok(self
            .list_attendance()?
            .into_iter()
            .find(|r| r.roll_no == roll_no))
    }

    /// The attendance table as CSV bytes, header row included.
    ///
    /// # Errors
    ///
    /// Returns an error if the table cannot be read or rendered.
    fn export_attendance_csv(&self) -> Result<Vec<u8>> {
        render_attendance_csv(&self.list_attendance()?)
    }
}

/// Open the store selected by `config`.
///
/// # Errors
///
/// Returns an error if the backing files or database cannot be opened.
pub fn open_store(config: &Config) -> Result<Box<dyn RecordStore>> {
    let store: Box<dyn RecordStore> = match config.storage.backend {
        StorageBackend::Csv => Box::new(CsvStore::open(
            config.students_path(),
            config.attendance_path(),
        )?),
        StorageBackend::Sqlite => Box::new(SqliteStore::open(config.database_path())?),
    };
    info!("Using {} record store", store.backend());
    Ok(store)
}

/// Render attendance records as CSV with the standard header row.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn render_attendance_csv(records: &[AttendanceRecord]) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    writer.write_record(ATTENDANCE_HEADERS)?;
    for record in records {
        writer.serialize(record)?;
    }
    writer
        .into_inner()
        .map_err(|e| Error::Io(e.into_error()))
}
