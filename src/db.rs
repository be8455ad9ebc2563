use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rusqlite::{params, Connection};

use crate::error::Result;
use crate::model::Software;

pub fn connect(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            // Missing directory surfaces as SQLITE_CANTOPEN below.
            let _ = std::fs::create_dir_all(parent);
        }
    }
    let conn = Connection::open(path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS software (
            team        TEXT,
            description TEXT,
            year        INTEGER
        );
        CREATE UNIQUE INDEX IF NOT EXISTS team_and_year ON software (team, year);
        ",
    )?;
    Ok(())
}

/// Shared handle to the `software` table.
///
/// Cloning is cheap; every clone talks to the same connection. Each call
/// takes the connection lock for its own duration only, so an upsert from a
/// crawl worker and a listing from the caller never interleave mid-statement.
#[derive(Clone)]
pub struct SoftwareStore {
    conn: Arc<Mutex<Connection>>,
}

impl SoftwareStore {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = connect(path)?;
        init_schema(&conn)?;
        Ok(Self::from_connection(conn))
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        init_schema(&conn)?;
        Ok(Self::from_connection(conn))
    }

    fn from_connection(conn: Connection) -> Self {
        SoftwareStore {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn exists(&self, year: i64) -> Result<bool> {
        let conn = self.lock();
        let found: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM software WHERE year = ?1)",
            params![year],
            |r| r.get(0),
        )?;
        Ok(found)
    }

    /// Insert, or replace the whole row holding the same `(team, year)`.
    pub fn upsert(&self, software: &Software) -> Result<()> {
        let conn = self.lock();
        conn.execute(
            "REPLACE INTO software (team, description, year) VALUES (?1, ?2, ?3)",
            params![software.team, software.description, software.year],
        )?;
        Ok(())
    }

    pub fn all(&self) -> Result<Vec<Software>> {
        self.query(
            "SELECT team, description, year FROM software ORDER BY year, team",
            None,
        )
    }

    pub fn by_year(&self, year: i64) -> Result<Vec<Software>> {
        self.query(
            "SELECT team, description, year FROM software WHERE year = ?1 ORDER BY year, team",
            Some(year),
        )
    }

    /// Drop every row and recreate the table.
    pub fn reset(&self) -> Result<()> {
        let conn = self.lock();
        conn.execute_batch("DROP TABLE IF EXISTS software;")?;
        init_schema(&conn)?;
        Ok(())
    }

    fn query(&self, sql: &str, year: Option<i64>) -> Result<Vec<Software>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(sql)?;
        let map = |row: &rusqlite::Row<'_>| -> rusqlite::Result<Software> {
            Ok(Software {
                team: row.get(0)?,
                description: row.get(1)?,
                year: row.get(2)?,
            })
        };
        let rows = match year {
            Some(y) => stmt.query_map(params![y], map)?.collect::<rusqlite::Result<Vec<_>>>()?,
            None => stmt.query_map([], map)?.collect::<rusqlite::Result<Vec<_>>>()?,
        };
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> SoftwareStore {
        SoftwareStore::open_in_memory().unwrap()
    }

    fn keys(rows: &[Software]) -> Vec<(&str, i64)> {
        rows.iter().map(|s| (s.team.as_str(), s.year)).collect()
    }

    #[test]
    fn upsert_twice_keeps_one_row() {
        let s = store();
        let sw = Software::new("Aachen", "A tool...", 2021);
        s.upsert(&sw).unwrap();
        s.upsert(&sw).unwrap();
        assert_eq!(s.all().unwrap(), vec![sw]);
    }

    #[test]
    fn upsert_replaces_description() {
        let s = store();
        s.upsert(&Software::new("Aachen", "old...", 2021)).unwrap();
        s.upsert(&Software::new("Aachen", "new...", 2021)).unwrap();
        let rows = s.by_year(2021).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].description, "new...");
    }

    #[test]
    fn same_team_different_year_is_a_new_row() {
        let s = store();
        s.upsert(&Software::new("Aachen", "x...", 2020)).unwrap();
        s.upsert(&Software::new("Aachen", "y...", 2021)).unwrap();
        assert_eq!(s.all().unwrap().len(), 2);
    }

    #[test]
    fn all_sorted_by_year_then_team() {
        let s = store();
        s.upsert(&Software::new("A", "...", 2020)).unwrap();
        s.upsert(&Software::new("B", "...", 2019)).unwrap();
        s.upsert(&Software::new("C", "...", 2020)).unwrap();
        assert_eq!(
            keys(&s.all().unwrap()),
            vec![("B", 2019), ("A", 2020), ("C", 2020)]
        );
    }

    #[test]
    fn by_year_filters_and_sorts() {
        let s = store();
        s.upsert(&Software::new("Zurich", "...", 2020)).unwrap();
        s.upsert(&Software::new("B", "...", 2019)).unwrap();
        s.upsert(&Software::new("Aalto", "...", 2020)).unwrap();
        assert_eq!(
            keys(&s.by_year(2020).unwrap()),
            vec![("Aalto", 2020), ("Zurich", 2020)]
        );
        assert!(s.by_year(1999).unwrap().is_empty());
    }

    #[test]
    fn exists_tracks_years() {
        let s = store();
        assert!(!s.exists(2021).unwrap());
        s.upsert(&Software::new("Aachen", "...", 2021)).unwrap();
        assert!(s.exists(2021).unwrap());
        assert!(!s.exists(2020).unwrap());
    }

    #[test]
    fn reset_empties_table() {
        let s = store();
        s.upsert(&Software::new("Aachen", "...", 2021)).unwrap();
        s.reset().unwrap();
        assert!(s.all().unwrap().is_empty());
        s.upsert(&Software::new("Aachen", "...", 2021)).unwrap();
        s.upsert(&Software::new("Aachen", "...", 2021)).unwrap();
        assert_eq!(s.all().unwrap().len(), 1);
    }

    #[test]
    fn file_backed_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("software.sqlite");
        {
            let s = SoftwareStore::open(&path).unwrap();
            s.upsert(&Software::new("Aachen", "kept...", 2021)).unwrap();
        }
        let s = SoftwareStore::open(&path).unwrap();
        assert_eq!(s.by_year(2021).unwrap()[0].description, "kept...");
    }

    #[test]
    fn clones_share_rows_across_threads() {
        let s = store();
        let writer = s.clone();
        let handle = std::thread::spawn(move || {
            for i in 0..20 {
                writer
                    .upsert(&Software::new(format!("T{i:02}"), "...", 2022))
                    .unwrap();
            }
        });
        for _ in 0..20 {
            s.by_year(2022).unwrap();
        }
        handle.join().unwrap();
        assert_eq!(s.by_year(2022).unwrap().len(), 20);
    }
}
