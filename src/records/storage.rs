//! Patient and metering record storage using SQLite.
//!
//! Manages persistent storage of patients and their captured metering
//! sessions. The sample data of a metering is stored as JSON text; the
//! database never interprets it.

use anyhow::Result;
use chrono::{DateTime, Local};
use rusqlite::OptionalExtension;
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Clinical status tag of a metering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tag {
    /// Finding requiring attention.
    Red,
    /// Normal finding.
    Green,
    /// Unclassified.
    #[default]
    Blue,
}

impl Tag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tag::Red => "red",
            Tag::Green => "green",
            Tag::Blue => "blue",
        }
    }

    pub fn all() -> [Tag; 3] {
        [Tag::Red, Tag::Green, Tag::Blue]
    }
}

impl FromStr for Tag {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "red" => Ok(Tag::Red),
            "green" => Ok(Tag::Green),
            "blue" => Ok(Tag::Blue),
            other => Err(anyhow::anyhow!("unknown tag '{other}'")),
        }
    }
}

impl std::fmt::Display for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A patient record.
#[derive(Debug, Clone)]
pub struct Patient {
    pub id: i64,
    pub name: String,
    pub age: i64,
    pub marital_status: Option<String>,
    pub address: Option<String>,
    pub observations: Option<String>,
}

/// One persisted metering session with its clinical metadata.
#[derive(Debug, Clone)]
pub struct Metering {
    pub id: i64,
    pub patient_id: i64,
    /// When this session was captured.
    pub date: DateTime<Local>,
    /// Full-resolution raw samples of the session.
    pub data: Vec<i16>,
    pub tag: Tag,
    pub observations: Option<String>,
    /// Path of the WAV artifact, if one was finalized.
    pub audio_uri: Option<String>,
}

/// Fields of a metering about to be created.
#[derive(Debug, Clone)]
pub struct NewMetering {
    pub patient_id: i64,
    /// ISO-8601 timestamp.
    pub date: String,
    pub data: Vec<i16>,
    pub tag: Tag,
    pub observations: String,
    pub audio_uri: Option<String>,
}

/// Manages the patient/metering database.
pub struct RecordStore {
    /// Path to the SQLite database file.
    database_path: PathBuf,
    /// Connection to the database (lazy-loaded).
    connection: Option<Connection>,
}

impl RecordStore {
    /// Creates a record store for the given data directory.
    ///
    /// # Errors
    /// - If the data directory cannot be accessed
    pub fn new(data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir)?;
        let database_path = data_dir.join("auscult.db");

        Ok(Self {
            database_path,
            connection: None,
        })
    }

    /// Creates a store backed by an in-memory database (for tests).
    pub fn open_in_memory() -> Result<Self> {
        let connection = Connection::open_in_memory()?;
        Self::initialize(&connection)?;
        Ok(Self {
            database_path: PathBuf::from(":memory:"),
            connection: Some(connection),
        })
    }

    /// Initializes database connection and creates tables if necessary.
    ///
    /// # Errors
    /// - If the database file cannot be opened
    /// - If table creation fails
    fn get_connection(&mut self) -> Result<&Connection> {
        if self.connection.is_none() {
            let connection = Connection::open(&self.database_path)?;
            Self::initialize(&connection)?;
            self.connection = Some(connection);
        }

        Ok(self.connection.as_ref().unwrap())
    }

    fn initialize(connection: &Connection) -> Result<()> {
        connection.execute("PRAGMA foreign_keys = ON", [])?;

        connection.execute(
            "CREATE TABLE IF NOT EXISTS patient (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                age INTEGER NOT NULL,
                marital_status TEXT,
                address TEXT,
                observations TEXT
            )",
            [],
        )?;

        connection.execute(
            "CREATE TABLE IF NOT EXISTS metering (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                patient_id INTEGER NOT NULL,
                date TEXT NOT NULL,
                data TEXT NOT NULL,
                tag TEXT NOT NULL,
                observations TEXT,
                audio_uri TEXT,
                FOREIGN KEY (patient_id) REFERENCES patient(id) ON DELETE CASCADE
            )",
            [],
        )?;

        Ok(())
    }

    /// Creates a new patient record, returning its id.
    pub fn create_patient(
        &mut self,
        name: &str,
        age: i64,
        marital_status: Option<&str>,
        address: Option<&str>,
        observations: Option<&str>,
    ) -> Result<i64> {
        let connection = self.get_connection()?;
        connection.execute(
            "INSERT INTO patient (name, age, marital_status, address, observations)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![name, age, marital_status, address, observations],
        )?;
        let id = connection.last_insert_rowid();
        tracing::debug!("Patient created: id={id}");
        Ok(id)
    }

    /// Retrieves all patients ordered by name.
    pub fn get_all_patients(&mut self) -> Result<Vec<Patient>> {
        let connection = self.get_connection()?;

        let mut statement = connection.prepare(
            "SELECT id, name, age, marital_status, address, observations
             FROM patient ORDER BY name",
        )?;

        let patients = statement
            .query_map([], |row| {
                Ok(Patient {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    age: row.get(2)?,
                    marital_status: row.get(3)?,
                    address: row.get(4)?,
                    observations: row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(patients)
    }

    /// Retrieves a single patient by id.
    pub fn get_patient(&mut self, id: i64) -> Result<Option<Patient>> {
        let connection = self.get_connection()?;

        let patient = connection
            .prepare(
                "SELECT id, name, age, marital_status, address, observations
                 FROM patient WHERE id = ?1",
            )?
            .query_row(params![id], |row| {
                Ok(Patient {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    age: row.get(2)?,
                    marital_status: row.get(3)?,
                    address: row.get(4)?,
                    observations: row.get(5)?,
                })
            })
            .optional()?;

        Ok(patient)
    }

    /// Saves a new metering, serializing the sample data as JSON text.
    ///
    /// # Errors
    /// - If the patient does not exist (foreign key)
    /// - If database connection or insertion fails
    pub fn create_metering(&mut self, metering: &NewMetering) -> Result<i64> {
        let data_json = serde_json::to_string(&metering.data)?;
        let connection = self.get_connection()?;

        connection.execute(
            "INSERT INTO metering (patient_id, date, data, tag, observations, audio_uri)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                metering.patient_id,
                metering.date,
                data_json,
                metering.tag.as_str(),
                metering.observations,
                metering.audio_uri,
            ],
        )?;

        let id = connection.last_insert_rowid();
        tracing::debug!("Metering saved: id={id}, patient={}", metering.patient_id);
        Ok(id)
    }

    /// Updates the clinical fields of an existing metering.
    pub fn update_metering(
        &mut self,
        id: i64,
        tag: Tag,
        observations: &str,
    ) -> Result<()> {
        let connection = self.get_connection()?;
        let changed = connection.execute(
            "UPDATE metering SET tag = ?1, observations = ?2 WHERE id = ?3",
            params![tag.as_str(), observations, id],
        )?;
        if changed == 0 {
            return Err(anyhow::anyhow!("no metering with id {id}"));
        }
        Ok(())
    }

    /// Retrieves a single metering by id.
    pub fn get_metering(&mut self, id: i64) -> Result<Option<Metering>> {
        let connection = self.get_connection()?;

        let metering = connection
            .prepare(
                "SELECT id, patient_id, date, data, tag, observations, audio_uri
                 FROM metering WHERE id = ?1",
            )?
            .query_row(params![id], Self::row_to_metering)
            .optional()?;

        Ok(metering)
    }

    /// Retrieves all meterings for a patient, most recent first.
    pub fn get_meterings_by_patient(&mut self, patient_id: i64) -> Result<Vec<Metering>> {
        let connection = self.get_connection()?;

        let mut statement = connection.prepare(
            "SELECT id, patient_id, date, data, tag, observations, audio_uri
             FROM metering WHERE patient_id = ?1 ORDER BY date DESC",
        )?;

        let meterings = statement
            .query_map(params![patient_id], Self::row_to_metering)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(meterings)
    }

    fn row_to_metering(row: &rusqlite::Row<'_>) -> rusqlite::Result<Metering> {
        let date_str = row.get::<_, String>(2)?;
        let date = DateTime::parse_from_rfc3339(&date_str)
            .map(|dt| dt.with_timezone(&Local))
            .map_err(|_| {
                rusqlite::Error::InvalidParameterName("Invalid timestamp format".to_string())
            })?;

        let data_json = row.get::<_, String>(3)?;
        let data: Vec<i16> = serde_json::from_str(&data_json).map_err(|_| {
            rusqlite::Error::InvalidParameterName("Invalid sample data".to_string())
        })?;

        let tag_str = row.get::<_, String>(4)?;
        let tag = tag_str.parse::<Tag>().map_err(|_| {
            rusqlite::Error::InvalidParameterName(format!("Invalid tag '{tag_str}'"))
        })?;

        Ok(Metering {
            id: row.get(0)?,
            patient_id: row.get(1)?,
            date,
            data,
            tag,
            observations: row.get(5)?,
            audio_uri: row.get(6)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_patient() -> (RecordStore, i64) {
        let mut store = RecordStore::open_in_memory().unwrap();
        let id = store
            .create_patient("Ada Souza", 63, Some("married"), None, Some("hypertensive"))
            .unwrap();
        (store, id)
    }

    #[test]
    fn test_patient_roundtrip() {
        let (mut store, id) = store_with_patient();
        let patient = store.get_patient(id).unwrap().unwrap();
        assert_eq!(patient.name, "Ada Souza");
        assert_eq!(patient.age, 63);
        assert_eq!(patient.marital_status.as_deref(), Some("married"));
        assert_eq!(patient.address, None);
    }

    #[test]
    fn test_metering_roundtrip_preserves_samples_and_tag() {
        let (mut store, patient_id) = store_with_patient();
        let id = store
            .create_metering(&NewMetering {
                patient_id,
                date: Local::now().to_rfc3339(),
                data: vec![100, -100, 32767, 0],
                tag: Tag::Green,
                observations: "clear S1/S2".into(),
                audio_uri: Some("/tmp/a.wav".into()),
            })
            .unwrap();

        let metering = store.get_metering(id).unwrap().unwrap();
        assert_eq!(metering.patient_id, patient_id);
        assert_eq!(metering.data, vec![100, -100, 32767, 0]);
        assert_eq!(metering.tag, Tag::Green);
        assert_eq!(metering.observations.as_deref(), Some("clear S1/S2"));
        assert_eq!(metering.audio_uri.as_deref(), Some("/tmp/a.wav"));
    }

    #[test]
    fn test_metering_requires_existing_patient() {
        let mut store = RecordStore::open_in_memory().unwrap();
        let result = store.create_metering(&NewMetering {
            patient_id: 42,
            date: Local::now().to_rfc3339(),
            data: vec![1],
            tag: Tag::Blue,
            observations: String::new(),
            audio_uri: None,
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_meterings_by_patient_most_recent_first() {
        let (mut store, patient_id) = store_with_patient();
        for (i, date) in [
            "2026-01-01T10:00:00+00:00",
            "2026-03-01T10:00:00+00:00",
            "2026-02-01T10:00:00+00:00",
        ]
        .iter()
        .enumerate()
        {
            store
                .create_metering(&NewMetering {
                    patient_id,
                    date: date.to_string(),
                    data: vec![i as i16],
                    tag: Tag::Blue,
                    observations: String::new(),
                    audio_uri: None,
                })
                .unwrap();
        }

        let meterings = store.get_meterings_by_patient(patient_id).unwrap();
        assert_eq!(meterings.len(), 3);
        assert_eq!(meterings[0].data, vec![1]); // March
        assert_eq!(meterings[1].data, vec![2]); // February
        assert_eq!(meterings[2].data, vec![0]); // January
    }

    #[test]
    fn test_update_metering_clinical_fields() {
        let (mut store, patient_id) = store_with_patient();
        let id = store
            .create_metering(&NewMetering {
                patient_id,
                date: Local::now().to_rfc3339(),
                data: vec![5],
                tag: Tag::Blue,
                observations: String::new(),
                audio_uri: None,
            })
            .unwrap();

        store.update_metering(id, Tag::Red, "murmur suspected").unwrap();
        let metering = store.get_metering(id).unwrap().unwrap();
        assert_eq!(metering.tag, Tag::Red);
        assert_eq!(metering.observations.as_deref(), Some("murmur suspected"));

        assert!(store.update_metering(9999, Tag::Red, "").is_err());
    }

    #[test]
    fn test_tag_parse_and_display() {
        for tag in Tag::all() {
            assert_eq!(tag.as_str().parse::<Tag>().unwrap(), tag);
        }
        assert!("purple".parse::<Tag>().is_err());
        assert_eq!(Tag::default(), Tag::Blue);
    }
}
