//! CSV export of whole tables.
//!
//! Headers are the table's column names and every value is written as
//! SQLite text (NULL becomes an empty field). An empty table produces no
//! file.

use std::path::Path;

use rusqlite::types::ValueRef;
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::store::Store;

/// Default file name for [`Store::export_readings_to_csv`].
pub const DEFAULT_READINGS_CSV: &str = "weather_readings.csv";

/// Default file name for [`Store::export_locations_to_csv`].
pub const DEFAULT_LOCATIONS_CSV: &str = "weather_data.csv";

fn value_to_field(value: ValueRef<'_>) -> String {
    match value {
        ValueRef::Null => String::new(),
        ValueRef::Integer(i) => i.to_string(),
        ValueRef::Real(f) => f.to_string(),
        ValueRef::Text(t) => String::from_utf8_lossy(t).into_owned(),
        ValueRef::Blob(b) => b.iter().map(|byte| format!("{:02x}", byte)).collect(),
    }
}

impl Store {
    /// Write every reading, newest first, to `path`.
    ///
    /// Returns `Ok(false)` without touching the file system when there are
    /// no readings.
    pub fn export_readings_to_csv<P: AsRef<Path>>(&self, path: P) -> Result<bool> {
        self.export_table(
            "SELECT * FROM readings ORDER BY timestamp DESC, id DESC",
            path.as_ref(),
        )
    }

    /// Write every location to `path`.
    ///
    /// Returns `Ok(false)` when no location is stored.
    pub fn export_locations_to_csv<P: AsRef<Path>>(&self, path: P) -> Result<bool> {
        self.export_table("SELECT * FROM locations ORDER BY id", path.as_ref())
    }

    fn export_table(&self, sql: &str, path: &Path) -> Result<bool> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(sql)?;
        let headers: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let column_count = headers.len();

        let mut records = Vec::new();
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let mut record = Vec::with_capacity(column_count);
            for idx in 0..column_count {
                record.push(value_to_field(row.get_ref(idx)?));
            }
            records.push(record);
        }

        if records.is_empty() {
            warn!("Nothing to export to {}", path.display());
            return Ok(false);
        }

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| Error::CreateDirectory {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let mut writer = csv::Writer::from_path(path)?;
        writer.write_record(&headers)?;
        for record in &records {
            writer.write_record(record)?;
        }
        writer.flush()?;

        info!("Exported {} rows to {}", records.len(), path.display());
        Ok(true)
    }
}
