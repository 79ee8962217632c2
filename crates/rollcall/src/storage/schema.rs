//! `SQLite` schema definitions for rollcall.
//!
//! Neither table carries a uniqueness constraint on `roll_no`; the tables
//! mirror the append-only CSV files and `seq` preserves insertion order.

/// SQL statement to create the students table.
pub const CREATE_STUDENTS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS students (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    roll_no TEXT NOT NULL,
    name TEXT NOT NULL,
    dept TEXT NOT NULL,
    year TEXT NOT NULL,
    section TEXT NOT NULL
)
";

/// SQL statement to create the attendance table.
pub const CREATE_ATTENDANCE_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS attendance (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    roll_no TEXT NOT NULL,
    name TEXT NOT NULL,
    dept TEXT NOT NULL,
    year TEXT NOT NULL,
    section TEXT NOT NULL,
    timestamp TEXT NOT NULL
)
";

/// SQL statement to create the metadata table for storing key-value pairs.
pub const CREATE_METADATA_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
";

/// Index backing the attendance lookup by identifier.
pub const CREATE_ATTENDANCE_ROLL_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_attendance_roll_no ON attendance(roll_no)
";

/// All schema creation statements in order.
pub const SCHEMA_STATEMENTS: &[&str] = &[
    CREATE_STUDENTS_TABLE,
    CREATE_ATTENDANCE_TABLE,
    CREATE_ATTENDANCE_ROLL_INDEX,
    CREATE_METADATA_TABLE,
];
