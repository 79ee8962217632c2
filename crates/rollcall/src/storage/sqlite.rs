//! Embedded `SQLite` record store.

use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

use super::{migrations, RecordStore};
use crate::config::StorageBackend;
use crate::error::{Error, Result};
use crate::model::{AttendanceRecord, Student};

/// Record store backed by a single `SQLite` database.
#[derive(Debug)]
pub struct SqliteStore {
    /// Path to the database file.
    path: PathBuf,
    /// Database connection.
    conn: Connection,
}

impl SqliteStore {
    /// Open or create a database at the given path.
    ///
    /// Creates parent directories as needed and brings the schema up to date.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening database at {}", path.display());
        let mut conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        migrations::initialize_schema(&mut conn)?;

        info!("Database opened successfully at {}", path.display());
        Ok(Self { path, conn })
    }

    /// Create an in-memory store for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(":memory:"),
            source,
        })?;

        migrations::initialize_schema(&mut conn)?;

        Ok(Self {
            path: PathBuf::from(":memory:"),
            conn,
        })
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn row_to_student(row: &rusqlite::Row) -> rusqlite::Result<Student> {
        Ok(Student {
            roll_no: row.get(0)?,
            name: row.get(1)?,
            dept: row.get(2)?,
            year: row.get(3)?,
            section: row.get(4)?,
        })
    }

    fn row_to_attendance(row: &rusqlite::Row) -> rusqlite::Result<AttendanceRecord> {
        Ok(AttendanceRecord {
            roll_no: row.get(0)?,
            name: row.get(1)?,
            dept: row.get(2)?,
            year: row.get(3)?,
            section: row.get(4)?,
            timestamp: row.get(5)?,
        })
    }
}

impl RecordStore for SqliteStore {
    fn backend(&self) -> StorageBackend {
        StorageBackend::Sqlite
    }

    fn list_students(&self) -> Result<Vec<Student>> {
        let mut stmt = self
            .conn
            .prepare("SELECT roll_no, name, dept, year, section FROM students ORDER BY seq")?;
        let students = stmt
            .query_map([], Self::row_to_student)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(students)
    }

    fn append_student(&mut self, student: &Student) -> Result<()> {
        self.conn.execute(
            "INSERT INTO students (roll_no, name, dept, year, section) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                student.roll_no,
                student.name,
                student.dept,
                student.year,
                student.section,
            ],
        )?;
        debug!("Inserted student {}", student.roll_no);
        Ok(())
    }

    fn list_attendance(&self) -> Result<Vec<AttendanceRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT roll_no, name, dept, year, section, timestamp FROM attendance ORDER BY seq",
        )?;
        let records = stmt
            .query_map([], Self::row_to_attendance)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(records)
    }

    fn append_attendance(&mut self, record: &AttendanceRecord) -> Result<()> {
        self.conn.execute(
            r"
            INSERT INTO attendance (roll_no, name, dept, year, section, timestamp)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ",
            params![
                record.roll_no,
                record.name,
                record.dept,
                record.year,
                record.section,
                record.timestamp,
            ],
        )?;
        debug!("Inserted attendance for {}", record.roll_no);
        Ok(())
    }

    fn reset(&mut self) -> Result<()> {
        let tx = self.conn.transaction()?;
        let students = tx.execute("DELETE FROM students", [])?;
        let attendance = tx.execute("DELETE FROM attendance", [])?;
        tx.commit()?;
        info!(
            "Deleted {} students and {} attendance records",
            students, attendance
        );
        Ok(())
    }

    fn find_attendance(&self, roll_no: &str) -> Result<Option<AttendanceRecord>> {
        let record = self
            .conn
            .query_row(
                r"
                SELECT roll_no, name, dept, year, section, timestamp
                FROM attendance WHERE roll_no = ?1 ORDER BY seq LIMIT 1
                ",
                [roll_no],
                Self::row_to_attendance,
            )
            .optional()?;
        Ok(record)
    }
}
