//! Flat-file record store.
//!
//! Each table is a CSV file with a fixed header row. Every query reads the
//! whole file; every append reopens it in append mode.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, info};

use super::RecordStore;
use crate::config::StorageBackend;
use crate::error::{Error, Result};
use crate::model::{AttendanceRecord, Student, ATTENDANCE_HEADERS, STUDENT_HEADERS};

/// Record store backed by two CSV files.
#[derive(Debug)]
pub struct CsvStore {
    students_path: PathBuf,
    attendance_path: PathBuf,
}

impl CsvStore {
    /// Open the two tables, creating any missing file with its header row.
    ///
    /// # Errors
    ///
    /// Returns an error if a parent directory or table cannot be created.
    pub fn open(
        students_path: impl Into<PathBuf>,
        attendance_path: impl Into<PathBuf>,
    ) -> Result<Self> {
        let store = Self {
            students_path: students_path.into(),
            attendance_path: attendance_path.into(),
        };

        ensure_table(&store.students_path, &STUDENT_HEADERS)?;
        ensure_table(&store.attendance_path, &ATTENDANCE_HEADERS)?;

        info!(
            "CSV tables ready at {} and {}",
            store.students_path.display(),
            store.attendance_path.display()
        );
        Ok(store)
    }

    /// Path to the students table.
    #[must_use]
    pub fn students_path(&self) -> &Path {
        &self.students_path
    }

    /// Path to the attendance table.
    #[must_use]
    pub fn attendance_path(&self) -> &Path {
        &self.attendance_path
    }
}

impl RecordStore for CsvStore {
    fn backend(&self) -> StorageBackend {
        StorageBackend::Csv
    }

    fn list_students(&self) -> Result<Vec<Student>> {
        read_table(&self.students_path, &STUDENT_HEADERS)
    }

    fn append_student(&mut self, student: &Student) -> Result<()> {
        append_row(&self.students_path, &STUDENT_HEADERS, student)
    }

    fn list_attendance(&self) -> Result<Vec<AttendanceRecord>> {
        read_table(&self.attendance_path, &ATTENDANCE_HEADERS)
    }

    fn append_attendance(&mut self, record: &AttendanceRecord) -> Result<()> {
        append_row(&self.attendance_path, &ATTENDANCE_HEADERS, record)
    }

    fn reset(&mut self) -> Result<()> {
        write_header_only(&self.students_path, &STUDENT_HEADERS)?;
        write_header_only(&self.attendance_path, &ATTENDANCE_HEADERS)?;
        info!("CSV tables truncated to header rows");
        Ok(())
    }

    fn export_attendance_csv(&self) -> Result<Vec<u8>> {
        if !self.attendance_path.exists() {
            return super::render_attendance_csv(&[]);
        }
        Ok(fs::read(&self.attendance_path)?)
    }
}

fn ensure_table(path: &Path, headers: &[&str]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                path: parent.to_path_buf(),
                source,
            })?;
        }
    }

    if !path.exists() {
        debug!("Creating table {}", path.display());
        write_header_only(path, headers)?;
    }
    Ok(())
}

fn write_header_only(path: &Path, headers: &[&str]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(headers)?;
    writer.flush()?;
    Ok(())
}

fn read_table<T: DeserializeOwned>(path: &Path, headers: &[&str]) -> Result<Vec<T>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)?;

    let found = reader.headers()?.clone();
    if found.is_empty() {
        return Ok(Vec::new());
    }
    if let Some(missing) = headers.iter().copied().find(|h| !found.iter().any(|f| f == *h)) {
        return Err(Error::StoreCorrupt {
            path: path.to_path_buf(),
            message: format!("missing column '{missing}'"),
        });
    }

    let rows = reader
        .deserialize()
        .collect::<std::result::Result<Vec<T>, _>>()?;
    debug!("Read {} rows from {}", rows.len(), path.display());
    Ok(rows)
}

fn append_row<T: Serialize>(path: &Path, headers: &[&str], row: &T) -> Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    let empty = file.metadata()?.len() == 0;

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(&mut file);
    if empty {
        writer.write_record(headers)?;
    }
    writer.serialize(row)?;
    writer.flush()?;
    drop(writer);

    file.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::{tempdir, TempDir};

    fn create_test_store() -> (TempDir, CsvStore) {
        let dir = tempdir().unwrap();
        let store = CsvStore::open(
            dir.path().join("students.csv"),
            dir.path().join("attendance.csv"),
        )
        .unwrap();
        (dir, store)
    }

    fn student(roll_no: &str, name: &str) -> Student {
        Student {
            roll_no: roll_no.to_string(),
            name: name.to_string(),
            dept: "CS".to_string(),
            year: "2".to_string(),
            section: "A".to_string(),
        }
    }

    fn record(roll_no: &str, name: &str) -> AttendanceRecord {
        AttendanceRecord {
            roll_no: roll_no.to_string(),
            name: name.to_string(),
            dept: "CS".to_string(),
            year: "2".to_string(),
            section: "A".to_string(),
            timestamp: "2024-03-05 09:04:07".to_string(),
        }
    }

    #[test]
    fn test_open_creates_header_rows() {
        let (_dir, store) = create_test_store();

        let students = fs::read_to_string(store.students_path()).unwrap();
        let attendance = fs::read_to_string(store.attendance_path()).unwrap();
        assert_eq!(students, "Roll No,Name,Dept,Year,Section\n");
        assert_eq!(attendance, "Roll No,Name,Dept,Year,Section,Timestamp\n");
    }

    #[test]
    fn test_open_creates_parent_directory() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        CsvStore::open(nested.join("s.csv"), nested.join("t.csv")).unwrap();
        assert!(nested.join("s.csv").exists());
    }

    #[test]
    fn test_open_keeps_existing_rows() {
        let (dir, mut store) = create_test_store();
        store.append_student(&student("R1_aaaaa", "Alice")).unwrap();

        let reopened = CsvStore::open(
            dir.path().join("students.csv"),
            dir.path().join("attendance.csv"),
        )
        .unwrap();
        assert_eq!(reopened.list_students().unwrap().len(), 1);
    }

    #[test]
    fn test_append_and_list_students_in_order() {
        let (_dir, mut store) = create_test_store();
        store.append_student(&student("R1_aaaaa", "Alice")).unwrap();
        store.append_student(&student("R2_bbbbb", "Bob")).unwrap();

        let students = store.list_students().unwrap();
        assert_eq!(students.len(), 2);
        assert_eq!(students[0].name, "Alice");
        assert_eq!(students[1].roll_no, "R2_bbbbb");
    }

    #[test]
    fn test_find_student_is_exact() {
        let (_dir, mut store) = create_test_store();
        store.append_student(&student("R10_aaaaa", "Alice")).unwrap();

        assert!(store.find_student("R10_aaaaa").unwrap().is_some());
        assert!(store.find_student("R10_aaaa").unwrap().is_none());
        assert!(store.find_student("R1").unwrap().is_none());
    }

    #[test]
    fn test_append_and_find_attendance() {
        let (_dir, mut store) = create_test_store();
        assert!(store.find_attendance("R1_aaaaa").unwrap().is_none());

        store.append_attendance(&record("R1_aaaaa", "Alice")).unwrap();

        let found = store.find_attendance("R1_aaaaa").unwrap().unwrap();
        assert_eq!(found.name, "Alice");
        assert_eq!(found.timestamp, "2024-03-05 09:04:07");
    }

    #[test]
    fn test_fields_with_commas_and_quotes_survive() {
        let (_dir, mut store) = create_test_store();
        store
            .append_student(&student("R1_aaaaa", "O'Neil, \"Sam\""))
            .unwrap();

        let students = store.list_students().unwrap();
        assert_eq!(students[0].name, "O'Neil, \"Sam\"");
    }

    #[test]
    fn test_append_writes_header_into_empty_file() {
        let (_dir, mut store) = create_test_store();
        fs::write(store.attendance_path(), "").unwrap();

        store.append_attendance(&record("R1_aaaaa", "Alice")).unwrap();

        let text = fs::read_to_string(store.attendance_path()).unwrap();
        assert!(text.starts_with("Roll No,Name,Dept,Year,Section,Timestamp\n"));
        assert_eq!(store.list_attendance().unwrap().len(), 1);
    }

    #[test]
    fn test_empty_file_reads_as_empty_table() {
        let (_dir, store) = create_test_store();
        fs::write(store.students_path(), "").unwrap();
        assert!(store.list_students().unwrap().is_empty());
    }

    #[test]
    fn test_reads_crlf_tables() {
        let (_dir, store) = create_test_store();
        fs::write(
            store.students_path(),
            "Roll No,Name,Dept,Year,Section\r\nR1_aaaaa,Alice,CS,2,A\r\n",
        )
        .unwrap();

        let students = store.list_students().unwrap();
        assert_eq!(students, vec![student("R1_aaaaa", "Alice")]);
    }

    #[test]
    fn test_missing_column_is_corrupt() {
        let (_dir, store) = create_test_store();
        fs::write(store.students_path(), "Roll No,Name\nR1_aaaaa,Alice\n").unwrap();

        let result = store.list_students();
        assert!(matches!(result, Err(Error::StoreCorrupt { .. })));
    }

    #[test]
    fn test_reset_truncates_to_headers() {
        let (_dir, mut store) = create_test_store();
        store.append_student(&student("R1_aaaaa", "Alice")).unwrap();
        store.append_attendance(&record("R1_aaaaa", "Alice")).unwrap();

        store.reset().unwrap();

        assert!(store.list_students().unwrap().is_empty());
        assert!(store.list_attendance().unwrap().is_empty());
        assert_eq!(
            fs::read_to_string(store.students_path()).unwrap(),
            "Roll No,Name,Dept,Year,Section\n"
        );
    }

    #[test]
    fn test_export_returns_file_bytes() {
        let (_dir, mut store) = create_test_store();
        store.append_attendance(&record("R1_aaaaa", "Alice")).unwrap();

        let exported = store.export_attendance_csv().unwrap();
        assert_eq!(exported, fs::read(store.attendance_path()).unwrap());
    }
}
