//! Schema versioning for the `SQLite` store.
//!
//! The version lives under `schema_version` in the `metadata` table. A fresh
//! database is created at [`CURRENT_VERSION`] directly; older databases are
//! stepped forward through [`upgrade_steps`] one version at a time.

use rusqlite::{Connection, OptionalExtension, Transaction};
use tracing::info;

use crate::error::{Error, Result};

use super::schema::SCHEMA_STATEMENTS;

/// Schema version written by this build.
pub const CURRENT_VERSION: u32 = 1;

const VERSION_KEY: &str = "schema_version";

/// One upgrade from `version - 1` to `version`.
type UpgradeStep = fn(&Transaction<'_>) -> Result<()>;

/// Upgrades indexed by target version. Empty until the first schema change.
fn upgrade_steps() -> &'static [(u32, UpgradeStep)] {
    &[]
}

/// Create missing tables and bring the schema up to [`CURRENT_VERSION`].
///
/// # Errors
///
/// Returns an error if the stored version is unreadable or newer than this
/// build, or if any statement fails.
pub fn initialize_schema(conn: &mut Connection) -> Result<()> {
    let tx = conn.transaction()?;
    for statement in SCHEMA_STATEMENTS {
        tx.execute(statement, [])?;
    }

    match stored_version(&tx)? {
        None => write_version(&tx, CURRENT_VERSION)?,
        Some(v) if v > CURRENT_VERSION => {
            return Err(Error::DatabaseMigration {
                message: format!(
                    "database schema v{v} is newer than supported v{CURRENT_VERSION}"
                ),
            });
        }
        Some(v) => {
            for (target, step) in upgrade_steps().iter().filter(|(t, _)| *t > v) {
                step(&tx)?;
                write_version(&tx, *target)?;
                info!("Upgraded schema to v{target}");
            }
        }
    }

    tx.commit()?;
    Ok(())
}

fn stored_version(conn: &Connection) -> Result<Option<u32>> {
    let value: Option<String> = conn
        .query_row(
            "SELECT value FROM metadata WHERE key = ?1",
            [VERSION_KEY],
            |row| row.get(0),
        )
        .optional()?;

    value
        .map(|v| {
            v.parse().map_err(|_| Error::DatabaseMigration {
                message: format!("unreadable schema version '{v}'"),
            })
        })
        .transpose()
}

fn write_version(conn: &Connection, version: u32) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO metadata (key, value) VALUES (?1, ?2)",
        (VERSION_KEY, version.to_string()),
    )?;
    Ok(())
}
