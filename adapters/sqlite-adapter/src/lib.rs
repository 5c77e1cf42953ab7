//! sqlite-adapter — SQLite implementation of the PatientRepository port for local/dev.
//!
//! Purpose
//! - Provide a lightweight, file-based store to run the service locally
//!   without a MongoDB deployment.
//! - Implements the `PatientRepository` trait from the `domain` crate.
//!
//! Notes
//! - Uses `rusqlite` with the `bundled` feature for portability.
//! - Ids are the table's rowid, rendered as decimal strings.
//! - The numeric columns carry no declared type, so SQLite keeps the INTEGER
//!   and REAL storage classes apart and `15` reads back as `15`, not `15.0`.

use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use domain::{CoreError, InsertReceipt, NewPatient, Patient, PatientId, PatientRepository};
use rusqlite::types::Value;
use rusqlite::{params, Connection};
use serde_json::Number;

/// SQLite-backed repository for local development.
pub struct SqliteRepo {
    conn: Mutex<Connection>,
}

impl SqliteRepo {
    /// Open (or create) a SQLite database at the given path and ensure schema.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, CoreError> {
        let conn = Connection::open(path).map_err(map_sqerr)?;
        init_schema(&conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// Open the database at `path`, creating its parent directory first.
    pub fn open_creating_dirs<P: AsRef<Path>>(path: P) -> Result<Self, CoreError> {
        if let Some(dir) = path.as_ref().parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir).map_err(map_sqerr)?;
            }
        }
        Self::new(path)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, CoreError> {
        self.conn
            .lock()
            .map_err(|_| CoreError::StoreUnavailable("mutex poisoned".into()))
    }
}

fn init_schema(conn: &Connection) -> Result<(), CoreError> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS patients (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            code TEXT NOT NULL,
            severity NOT NULL,
            wait_time NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_patients_name ON patients(name);
        "#,
    )
    .map_err(map_sqerr)
}

fn map_sqerr<E: std::fmt::Display>(e: E) -> CoreError {
    CoreError::StoreUnavailable(format!("sqlite error: {e}"))
}

fn number_to_sql(n: &Number) -> Value {
    match n.as_i64() {
        Some(i) => Value::Integer(i),
        None => Value::Real(n.as_f64().unwrap_or_default()),
    }
}

fn sql_to_number(field: &str, v: Value) -> Result<Number, CoreError> {
    match v {
        Value::Integer(i) => Ok(Number::from(i)),
        Value::Real(f) => Number::from_f64(f)
            .ok_or_else(|| CoreError::StoreUnavailable(format!("{field} is not finite"))),
        _ => Err(CoreError::StoreUnavailable(format!("{field} is not numeric"))),
    }
}

const SELECT_PATIENTS: &str = "SELECT id, name, code, severity, wait_time FROM patients";

fn row_to_patient(row: &rusqlite::Row) -> Result<Patient, CoreError> {
    let id: i64 = row.get(0).map_err(map_sqerr)?;
    let name: String = row.get(1).map_err(map_sqerr)?;
    let code: String = row.get(2).map_err(map_sqerr)?;
    let severity: Value = row.get(3).map_err(map_sqerr)?;
    let wait_time: Value = row.get(4).map_err(map_sqerr)?;
    Ok(Patient {
        id: PatientId::new(id.to_string()),
        name,
        code,
        severity: sql_to_number("severity", severity)?,
        wait_time: sql_to_number("wait_time", wait_time)?,
    })
}

#[async_trait]
impl PatientRepository for SqliteRepo {
    async fn insert(&self, patient: NewPatient) -> Result<InsertReceipt, CoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO patients(name, code, severity, wait_time) VALUES (?1, ?2, ?3, ?4)",
            params![
                patient.name,
                patient.code,
                number_to_sql(&patient.severity),
                number_to_sql(&patient.wait_time),
            ],
        )
        .map_err(map_sqerr)?;
        Ok(InsertReceipt {
            acknowledged: true,
            id: PatientId::new(conn.last_insert_rowid().to_string()),
        })
    }

    async fn find_all(&self) -> Result<Vec<Patient>, CoreError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(&format!("{SELECT_PATIENTS} ORDER BY id"))
            .map_err(map_sqerr)?;
        let mut rows = stmt.query([]).map_err(map_sqerr)?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().map_err(map_sqerr)? {
            out.push(row_to_patient(row)?);
        }
        Ok(out)
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Patient>, CoreError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(&format!("{SELECT_PATIENTS} WHERE name = ?1 ORDER BY id LIMIT 1"))
            .map_err(map_sqerr)?;
        let mut rows = stmt.query(params![name]).map_err(map_sqerr)?;
        if let Some(row) = rows.next().map_err(map_sqerr)? {
            Ok(Some(row_to_patient(row)?))
        } else {
            Ok(None)
        }
    }
}
