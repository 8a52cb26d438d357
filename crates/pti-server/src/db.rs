//! Database module for image records.
//!
//! Uses SQLite to map public hexcodes to the files stored on disk, along
//! with who uploaded them and when.

use std::net::IpAddr;
use std::path::Path;

use jiff::Timestamp;
use pti::Hexcode;
use rusqlite::{Connection, ErrorCode, OptionalExtension, Row, params};
use thiserror::Error;

/// Database error type.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Hexcode already in use: {0}")]
    DuplicateHexcode(Hexcode),

    #[error("Invalid value in column {column}: {value}")]
    InvalidRow { column: &'static str, value: String },
}

/// A stored image, as recorded at upload time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRecord {
    pub id: i64,
    pub original_name: String,
    pub stored_name: String,
    pub upload_time: Timestamp,
    pub upload_ip: IpAddr,
    pub hexcode: Hexcode,
}

/// Fields of a record about to be inserted; the store assigns the ID.
#[derive(Debug, Clone)]
pub struct NewImage<'a> {
    pub original_name: &'a str,
    pub stored_name: &'a str,
    pub upload_time: Timestamp,
    pub upload_ip: IpAddr,
    pub hexcode: Hexcode,
}

/// Database handle for image records.
pub struct ImageDb {
    conn: Connection,
}

impl ImageDb {
    /// Open or create the image database.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init_schema()?;
        Ok(db)
    }

    /// Open an in-memory database (for testing).
    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init_schema()?;
        Ok(db)
    }

    /// Initialize the database schema. Safe to run against an existing table.
    fn init_schema(&self) -> Result<(), DbError> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS images (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                original_name TEXT NOT NULL,
                stored_name TEXT NOT NULL,
                upload_time TEXT NOT NULL,
                upload_ip TEXT NOT NULL,
                hexcode TEXT NOT NULL UNIQUE CHECK (length(hexcode) = 8)
            );
            "#,
        )?;
        Ok(())
    }

    /// Insert a new record and return it with its assigned ID.
    ///
    /// A hexcode that is already taken fails with
    /// [`DbError::DuplicateHexcode`] so callers can pick another one.
    pub fn insert_image(&self, image: &NewImage<'_>) -> Result<ImageRecord, DbError> {
        self.conn
            .execute(
                "INSERT INTO images (original_name, stored_name, upload_time, upload_ip, hexcode)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    image.original_name,
                    image.stored_name,
                    image.upload_time.to_string(),
                    image.upload_ip.to_string(),
                    image.hexcode.as_str(),
                ],
            )
            .map_err(|e| {
                let duplicate = matches!(
                    e.sqlite_error(),
                    Some(err) if err.code == ErrorCode::ConstraintViolation
                        && err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                );
                if duplicate {
                    DbError::DuplicateHexcode(image.hexcode.clone())
                } else {
                    DbError::Sqlite(e)
                }
            })?;

        Ok(ImageRecord {
            id: self.conn.last_insert_rowid(),
            original_name: image.original_name.to_string(),
            stored_name: image.stored_name.to_string(),
            upload_time: image.upload_time,
            upload_ip: image.upload_ip,
            hexcode: image.hexcode.clone(),
        })
    }

    /// Look up a record by its hexcode. Matching is exact.
    pub fn find_by_hexcode(&self, hexcode: &str) -> Result<Option<ImageRecord>, DbError> {
        let raw = self
            .conn
            .query_row(
                "SELECT id, original_name, stored_name, upload_time, upload_ip, hexcode
                 FROM images WHERE hexcode = ?1",
                params![hexcode],
                RawRecord::from_row,
            )
            .optional()?;

        raw.map(RawRecord::parse).transpose()
    }

    /// All records, oldest first.
    pub fn list_images(&self) -> Result<Vec<ImageRecord>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, original_name, stored_name, upload_time, upload_ip, hexcode
             FROM images ORDER BY id",
        )?;

        let rows = stmt.query_map([], RawRecord::from_row)?;

        let mut images = Vec::new();
        for row in rows {
            images.push(row?.parse()?);
        }
        Ok(images)
    }
}

/// A row as SQLite hands it back, before the text columns are parsed.
struct RawRecord {
    id: i64,
    original_name: String,
    stored_name: String,
    upload_time: String,
    upload_ip: String,
    hexcode: String,
}

impl RawRecord {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            original_name: row.get(1)?,
            stored_name: row.get(2)?,
            upload_time: row.get(3)?,
            upload_ip: row.get(4)?,
            hexcode: row.get(5)?,
        })
    }

    fn parse(self) -> Result<ImageRecord, DbError> {
        let upload_time = self.upload_time.parse().map_err(|_| DbError::InvalidRow {
            column: "upload_time",
            value: self.upload_time.clone(),
        })?;
        let upload_ip = self.upload_ip.parse().map_err(|_| DbError::InvalidRow {
            column: "upload_ip",
            value: self.upload_ip.clone(),
        })?;
        let hexcode = self.hexcode.parse().map_err(|_| DbError::InvalidRow {
            column: "hexcode",
            value: self.hexcode.clone(),
        })?;

        Ok(ImageRecord {
            id: self.id,
            original_name: self.original_name,
            stored_name: self.stored_name,
            upload_time,
            upload_ip,
            hexcode,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use super::*;

    fn new_image<'a>(hexcode: &Hexcode, stored_name: &'a str) -> NewImage<'a> {
        NewImage {
            original_name: "cat.png",
            stored_name,
            upload_time: Timestamp::now(),
            upload_ip: IpAddr::V4(Ipv4Addr::LOCALHOST),
            hexcode: hexcode.clone(),
        }
    }

    #[test]
    fn test_insert_and_find() {
        let db = ImageDb::open_in_memory().unwrap();
        let hexcode: Hexcode = "0badf00d".parse().unwrap();

        let inserted = db.insert_image(&new_image(&hexcode, "cat.png")).unwrap();
        let found = db.find_by_hexcode("0badf00d").unwrap().unwrap();

        assert_eq!(found, inserted);
        assert_eq!(found.original_name, "cat.png");
        assert_eq!(found.stored_name, "cat.png");
        assert_eq!(found.upload_ip, IpAddr::V4(Ipv4Addr::LOCALHOST));
    }

    #[test]
    fn test_find_missing() {
        let db = ImageDb::open_in_memory().unwrap();
        assert!(db.find_by_hexcode("00000000").unwrap().is_none());
    }

    #[test]
    fn test_find_is_case_sensitive() {
        let db = ImageDb::open_in_memory().unwrap();
        let hexcode: Hexcode = "abcdef01".parse().unwrap();
        db.insert_image(&new_image(&hexcode, "a.png")).unwrap();

        assert!(db.find_by_hexcode("ABCDEF01").unwrap().is_none());
    }

    #[test]
    fn test_ids_increase() {
        let db = ImageDb::open_in_memory().unwrap();
        let a: Hexcode = "00000001".parse().unwrap();
        let b: Hexcode = "00000002".parse().unwrap();

        let first = db.insert_image(&new_image(&a, "a.png")).unwrap();
        let second = db.insert_image(&new_image(&b, "b.png")).unwrap();
        assert!(second.id > first.id);
    }

    #[test]
    fn test_duplicate_hexcode_rejected() {
        let db = ImageDb::open_in_memory().unwrap();
        let hexcode: Hexcode = "deadbeef".parse().unwrap();

        db.insert_image(&new_image(&hexcode, "a.png")).unwrap();
        let err = db.insert_image(&new_image(&hexcode, "b.png")).unwrap_err();

        assert!(
            matches!(err, DbError::DuplicateHexcode(ref code) if *code == hexcode),
            "unexpected error: {err:?}"
        );
        assert_eq!(db.list_images().unwrap().len(), 1);
    }

    #[test]
    fn test_schema_enforces_hexcode_length() {
        let db = ImageDb::open_in_memory().unwrap();
        let result = db.conn.execute(
            "INSERT INTO images (original_name, stored_name, upload_time, upload_ip, hexcode)
             VALUES ('a', 'a', '2024-01-01T00:00:00Z', '127.0.0.1', 'abc')",
            [],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_reopen_keeps_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pti.db");
        let hexcode: Hexcode = "feedface".parse().unwrap();

        {
            let db = ImageDb::open(&path).unwrap();
            db.insert_image(&new_image(&hexcode, "a.png")).unwrap();
        }

        let db = ImageDb::open(&path).unwrap();
        assert!(db.find_by_hexcode("feedface").unwrap().is_some());
    }

    #[test]
    fn test_list_images_in_insert_order() {
        let db = ImageDb::open_in_memory().unwrap();
        let codes: Vec<Hexcode> = ["00000003", "00000001", "00000002"]
            .iter()
            .map(|c| c.parse().unwrap())
            .collect();
        for code in &codes {
            db.insert_image(&new_image(code, code.as_str())).unwrap();
        }

        let listed: Vec<_> = db
            .list_images()
            .unwrap()
            .into_iter()
            .map(|r| r.hexcode)
            .collect();
        assert_eq!(listed, codes);
    }
}
