use std::path::Path;

use rusqlite::{params, params_from_iter, Connection, OptionalExtension};

use crate::catalog::{new_handle, InstanceDirectory, InstanceFilter, InstanceRecord, SCHEMA_VERSION};
use crate::errors::RiverbedError;

const SCHEMA: &str = "
    create table if not exists schema_version (
        version text not null
    );

    create table if not exists timeseries (
        id integer primary key autoincrement,
        primary_id text unique not null
    );

    create table if not exists measurand (
        id integer primary key autoincrement,
        short_id text unique not null,
        long_id text,
        description text
    );

    create table if not exists source (
        id integer primary key autoincrement,
        short_id text unique not null,
        description text
    );

    create table if not exists attribute (
        id integer primary key autoincrement,
        short_id text unique not null,
        description text
    );

    create table if not exists attribute_value (
        id integer primary key autoincrement,
        attribute_id integer not null references attribute (id),
        attribute_value text not null,
        unique (attribute_id, attribute_value)
    );

    create table if not exists timeseries_instance (
        ts_id integer not null references timeseries (id),
        freq text not null,
        measurand_id integer not null references measurand (id),
        source_id integer not null references source (id),
        initial_metadata text,
        uuid text not null,
        primary key (ts_id, freq, measurand_id, source_id)
    );
";

/// The production catalog: an embedded sqlite database (`tsdb.sqlite` in the
/// database root) holding registrations and the instance-to-handle mapping.
pub struct SqliteCatalog {
    conn: Connection,
}

impl SqliteCatalog {
    /// Creates a fresh catalog file with the schema and version row.
    pub fn create(path: &Path) -> Result<SqliteCatalog, RiverbedError> {
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        conn.execute(
            "insert into schema_version (version) values (?1)",
            params![SCHEMA_VERSION],
        )?;
        Ok(SqliteCatalog { conn })
    }

    /// Opens an existing catalog file.
    pub fn open(path: &Path) -> Result<SqliteCatalog, RiverbedError> {
        let conn = Connection::open(path)?;
        Ok(SqliteCatalog { conn })
    }

    fn timeseries_id(&self, primary_id: &str) -> Result<i64, RiverbedError> {
        self.conn
            .query_row(
                "select id from timeseries where primary_id = ?1",
                params![primary_id],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| {
                RiverbedError::NotFound(format!(
                    "Could not find metadata record for: {}",
                    primary_id
                ))
            })
    }

    fn measurand_id(&self, short_id: &str) -> Result<i64, RiverbedError> {
        self.conn
            .query_row(
                "select id from measurand where short_id = ?1",
                params![short_id],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| {
                RiverbedError::MissingAttribute(format!(
                    "Could not find measurand ({}) in the database.",
                    short_id
                ))
            })
    }

    fn source_id(&self, short_id: &str) -> Result<i64, RiverbedError> {
        self.conn
            .query_row(
                "select id from source where short_id = ?1",
                params![short_id],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| {
                RiverbedError::MissingAttribute(format!(
                    "Could not find source ({}) in the database.",
                    short_id
                ))
            })
    }

    fn exists(&self, sql: &str, key: &str) -> Result<bool, RiverbedError> {
        let found: Option<i64> = self
            .conn
            .query_row(sql, params![key], |row| row.get(0))
            .optional()?;
        Ok(found.is_some())
    }

    /// Instances joined out to their readable ids, with optional frequency
    /// and attribute constraints.
    fn select_instances(
        &self,
        ts_id: Option<&str>,
        freq: Option<&str>,
        filter: &InstanceFilter,
    ) -> Result<Vec<InstanceRecord>, RiverbedError> {
        let mut sql = String::from(
            "select t.primary_id, i.freq, m.short_id, s.short_id,
                    coalesce(i.initial_metadata, ''), i.uuid
             from timeseries_instance i
             join timeseries t on t.id = i.ts_id
             join measurand m on m.id = i.measurand_id
             join source s on s.id = i.source_id
             where 1 = 1",
        );
        let mut args: Vec<&str> = Vec::new();

        if let Some(ts_id) = ts_id {
            args.push(ts_id);
            sql.push_str(&format!(" and t.primary_id = ?{}", args.len()));
        }
        if let Some(freq) = freq {
            args.push(freq);
            sql.push_str(&format!(" and i.freq = ?{}", args.len()));
        }
        if let Some(measurand) = filter.measurand {
            args.push(measurand);
            sql.push_str(&format!(" and m.short_id = ?{}", args.len()));
        }
        if let Some(source) = filter.source {
            args.push(source);
            sql.push_str(&format!(" and s.short_id = ?{}", args.len()));
        }
        sql.push_str(" order by t.primary_id, i.freq, m.short_id, s.short_id");

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(args), |row| {
            Ok(InstanceRecord {
                ts_id: row.get(0)?,
                freq: row.get(1)?,
                measurand: row.get(2)?,
                source: row.get(3)?,
                initial_metadata: row.get(4)?,
                handle: row.get(5)?,
            })
        })?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    fn list_column(&self, sql: &str) -> Result<Vec<String>, RiverbedError> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        let mut values = Vec::new();
        for row in rows {
            values.push(row?);
        }
        Ok(values)
    }
}

impl InstanceDirectory for SqliteCatalog {
    fn version(&self) -> Result<String, RiverbedError> {
        let version: Option<String> = self
            .conn
            .query_row("select version from schema_version", [], |row| row.get(0))
            .optional()?;
        version.ok_or_else(|| {
            RiverbedError::CatalogError("catalog has no schema version".to_string())
        })
    }

    fn add_timeseries(&mut self, primary_id: &str) -> Result<(), RiverbedError> {
        let the_id = primary_id.trim();
        if self.exists("select id from timeseries where primary_id = ?1", the_id)? {
            return Err(RiverbedError::Duplicate(the_id.to_string()));
        }
        self.conn.execute(
            "insert into timeseries (primary_id) values (?1)",
            params![the_id],
        )?;
        Ok(())
    }

    fn add_measurand(
        &mut self,
        short_id: &str,
        long_id: &str,
        description: &str,
    ) -> Result<(), RiverbedError> {
        let short_id = short_id.trim();
        let long_id = long_id.trim();
        if self.exists("select id from measurand where short_id = ?1", short_id)? {
            return Err(RiverbedError::Duplicate(short_id.to_string()));
        }
        self.conn.execute(
            "insert into measurand (short_id, long_id, description) values (?1, ?2, ?3)",
            params![short_id, long_id, description],
        )?;
        Ok(())
    }

    fn add_source(&mut self, short_id: &str, description: &str) -> Result<(), RiverbedError> {
        let short_id = short_id.trim();
        if self.exists("select id from source where short_id = ?1", short_id)? {
            return Err(RiverbedError::Duplicate(short_id.to_string()));
        }
        self.conn.execute(
            "insert into source (short_id, description) values (?1, ?2)",
            params![short_id, description],
        )?;
        Ok(())
    }

    fn add_attribute(&mut self, short_id: &str, description: &str) -> Result<(), RiverbedError> {
        let short_id = short_id.trim().to_uppercase();
        if self.exists("select id from attribute where short_id = ?1", &short_id)? {
            return Err(RiverbedError::Duplicate(short_id));
        }
        self.conn.execute(
            "insert into attribute (short_id, description) values (?1, ?2)",
            params![short_id, description],
        )?;
        Ok(())
    }

    fn add_attribute_value(
        &mut self,
        attribute_id: &str,
        value: &str,
    ) -> Result<(), RiverbedError> {
        let short_id = attribute_id.trim().to_uppercase();
        let id: Option<i64> = self
            .conn
            .query_row(
                "select id from attribute where short_id = ?1",
                params![short_id],
                |row| row.get(0),
            )
            .optional()?;
        let id = id.ok_or_else(|| {
            RiverbedError::MissingAttribute(format!(
                "Could not find {} ({}) in the database.",
                attribute_id, value
            ))
        })?;

        self.conn.execute(
            "insert or ignore into attribute_value (attribute_id, attribute_value) values (?1, ?2)",
            params![id, value],
        )?;
        Ok(())
    }

    fn add_instance(
        &mut self,
        ts_id: &str,
        freq: &str,
        initial_metadata: &str,
        measurand: &str,
        source: &str,
    ) -> Result<String, RiverbedError> {
        let timeseries_id = self.timeseries_id(ts_id)?;
        let measurand_id = self.measurand_id(measurand)?;
        let source_id = self.source_id(source)?;

        let existing: Option<i64> = self
            .conn
            .query_row(
                "select ts_id from timeseries_instance
                 where ts_id = ?1 and freq = ?2 and measurand_id = ?3 and source_id = ?4",
                params![timeseries_id, freq, measurand_id, source_id],
                |row| row.get(0),
            )
            .optional()?;
        if existing.is_some() {
            return Err(RiverbedError::Duplicate(format!(
                "timeseries instance already exists: '{}', '{}'",
                ts_id, freq
            )));
        }

        let handle = new_handle();
        self.conn.execute(
            "insert into timeseries_instance
                 (ts_id, freq, measurand_id, source_id, initial_metadata, uuid)
             values (?1, ?2, ?3, ?4, ?5, ?6)",
            params![timeseries_id, freq, measurand_id, source_id, initial_metadata, handle],
        )?;
        Ok(handle)
    }

    fn get_instance(
        &self,
        ts_id: &str,
        freq: &str,
        filter: &InstanceFilter,
    ) -> Result<InstanceRecord, RiverbedError> {
        let mut records = self.select_instances(Some(ts_id), Some(freq), filter)?;
        match records.len() {
            0 => Err(RiverbedError::NotFound(format!(
                "Could not find timeseries instance for ({}, {}).",
                ts_id, freq
            ))),
            1 => Ok(records.remove(0)),
            _ => Err(RiverbedError::Duplicate(format!(
                "({}, {}) matches multiple instances",
                ts_id, freq
            ))),
        }
    }

    fn list_timeseries(&self, filter: &InstanceFilter) -> Result<Vec<String>, RiverbedError> {
        let records = self.select_instances(None, None, filter)?;
        let mut ids: Vec<String> = records.into_iter().map(|r| r.ts_id).collect();
        ids.dedup();
        Ok(ids)
    }

    fn list_ids(&self) -> Result<Vec<String>, RiverbedError> {
        self.list_column("select primary_id from timeseries order by primary_id")
    }

    fn list_measurands(&self) -> Result<Vec<String>, RiverbedError> {
        self.list_column("select short_id from measurand order by short_id")
    }

    fn list_sources(&self) -> Result<Vec<String>, RiverbedError> {
        self.list_column("select short_id from source order by short_id")
    }

    fn list_instances(
        &self,
        freq: Option<&str>,
        filter: &InstanceFilter,
    ) -> Result<Vec<InstanceRecord>, RiverbedError> {
        self.select_instances(None, freq, filter)
    }
}
