use std::fs;
use std::path::{Path, PathBuf};

use log::debug;

use crate::calendar::Frequency;
use crate::catalog::sqlite_catalog::SqliteCatalog;
use crate::catalog::{InstanceDirectory, InstanceFilter, InstanceRecord, SCHEMA_VERSION};
use crate::changeset::ChangeSet;
use crate::engine::StorageEngine;
use crate::errors::RiverbedError;
use crate::timeseries::Series;

/// Filename of the catalog inside the database directory.
pub const METADATA_DB: &str = "tsdb.sqlite";

/// Name of the subdirectory holding the per-instance data and log files.
const DATA_DIR: &str = "data";

/// Creates a new database directory: the root, the data directory and the
/// catalog. The target must not exist or must be an empty directory.
pub fn create<P: AsRef<Path>>(path: P) -> Result<(), RiverbedError> {
    let path = path.as_ref();

    if !path.exists() {
        fs::create_dir_all(path)?;
        fs::create_dir(path.join(DATA_DIR))?;
    } else if path.is_dir() && path.read_dir()?.next().is_none() {
        fs::create_dir(path.join(DATA_DIR))?;
    } else {
        return Err(RiverbedError::AlreadyExists(format!(
            "database already exists at: {}",
            path.display()
        )));
    }

    SqliteCatalog::create(&path.join(METADATA_DB))?;
    Ok(())
}

/// A database context. All access flows through an explicit Db value; there
/// is no process-global state.
pub struct Db {
    path: PathBuf,
    catalog: Box<dyn InstanceDirectory>,
    engine: StorageEngine,
}

impl std::fmt::Debug for Db {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Db").field("path", &self.path).finish()
    }
}

impl Db {
    /// Opens an existing database directory.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Db, RiverbedError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(RiverbedError::NotFound(format!(
                "database doesn't exist ({})",
                path.display()
            )));
        }
        let metadata_db = path.join(METADATA_DB);
        if !metadata_db.is_file() {
            return Err(RiverbedError::NotFound(format!(
                "database doesn't contain meta-database ({})",
                metadata_db.display()
            )));
        }

        let catalog = SqliteCatalog::open(&metadata_db)?;
        let version = catalog.version()?;
        if version != SCHEMA_VERSION {
            return Err(RiverbedError::DataError(format!(
                "catalog schema version {} does not match expected {}",
                version, SCHEMA_VERSION
            )));
        }

        debug!("opened database at {}", path.display());
        Ok(Db {
            path: path.to_path_buf(),
            catalog: Box::new(catalog),
            engine: StorageEngine::new(path.join(DATA_DIR)),
        })
    }

    /// Builds a database context over any InstanceDirectory implementation.
    /// The data directory is created if absent.
    pub fn with_directory<P: AsRef<Path>>(
        path: P,
        catalog: Box<dyn InstanceDirectory>,
    ) -> Result<Db, RiverbedError> {
        let path = path.as_ref();
        let data_dir = path.join(DATA_DIR);
        fs::create_dir_all(&data_dir)?;
        Ok(Db {
            path: path.to_path_buf(),
            catalog,
            engine: StorageEngine::new(data_dir),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Schema version of the catalog.
    pub fn version(&self) -> Result<String, RiverbedError> {
        self.catalog.version()
    }

    /// Creates a timeseries entry to be identified by the supplied ID.
    pub fn add_timeseries(&mut self, identifier: &str) -> Result<(), RiverbedError> {
        self.catalog.add_timeseries(identifier)
    }

    /// Creates a measurand entry. A measurand is a measurable timeseries
    /// type, e.g. streamflow, temperature, rainfall.
    pub fn add_measurand(
        &mut self,
        short_id: &str,
        long_id: &str,
        description: &str,
    ) -> Result<(), RiverbedError> {
        self.catalog.add_measurand(short_id, long_id, description)
    }

    /// Defines a source: the origin of the data.
    pub fn add_source(&mut self, short_id: &str, description: &str) -> Result<(), RiverbedError> {
        self.catalog.add_source(short_id, description)
    }

    /// Defines an attribute.
    pub fn add_attribute(
        &mut self,
        attribute_id: &str,
        description: &str,
    ) -> Result<(), RiverbedError> {
        self.catalog.add_attribute(attribute_id, description)
    }

    /// Stores an attribute value.
    pub fn add_attribute_value(
        &mut self,
        attribute_id: &str,
        value: &str,
    ) -> Result<(), RiverbedError> {
        self.catalog.add_attribute_value(attribute_id, value)
    }

    /// Defines an instance of a timeseries: the combination of a timeseries
    /// id, frequency, measurand and source. Returns the handle allocated for
    /// the instance; the data file itself is created lazily on first write.
    pub fn add_timeseries_instance(
        &mut self,
        identifier: &str,
        freq: Frequency,
        initial_metadata: &str,
        measurand: &str,
        source: &str,
    ) -> Result<String, RiverbedError> {
        self.catalog
            .add_instance(identifier, &freq.label(), initial_metadata, measurand, source)
    }

    /// Write/update timeseries data for an existing timeseries instance.
    /// Returns the change set of created records and prior values.
    pub fn write(
        &mut self,
        identifier: &str,
        freq: Frequency,
        points: &[(i64, f64)],
        filter: &InstanceFilter,
    ) -> Result<ChangeSet, RiverbedError> {
        let instance = self.catalog.get_instance(identifier, &freq.label(), filter)?;
        self.engine.write(&instance.handle, freq, points)
    }

    /// Reads the entire current record for the requested instance.
    pub fn read(
        &self,
        identifier: &str,
        freq: Frequency,
        filter: &InstanceFilter,
    ) -> Result<Series, RiverbedError> {
        let instance = self.catalog.get_instance(identifier, &freq.label(), filter)?;
        self.engine.read(&instance.handle)
    }

    /// Reads the series as it was at `as_at`, reconstructed from the
    /// instance log.
    pub fn read_as_of(
        &self,
        identifier: &str,
        freq: Frequency,
        as_at: i64,
        filter: &InstanceFilter,
    ) -> Result<Series, RiverbedError> {
        let instance = self.catalog.get_instance(identifier, &freq.label(), filter)?;
        self.engine.read_as_of(&instance.handle, as_at)
    }

    /// The metadata recorded when the instance was created.
    pub fn read_metadata(
        &self,
        identifier: &str,
        freq: Frequency,
        filter: &InstanceFilter,
    ) -> Result<String, RiverbedError> {
        let instance = self.catalog.get_instance(identifier, &freq.label(), filter)?;
        Ok(instance.initial_metadata)
    }

    /// Reads every timeseries with a matching instance at the given
    /// frequency. Returns (timeseries id, series) pairs sorted by id.
    pub fn read_all(
        &self,
        freq: Frequency,
        filter: &InstanceFilter,
    ) -> Result<Vec<(String, Series)>, RiverbedError> {
        let mut result = Vec::new();
        for identifier in self.catalog.list_timeseries(filter)? {
            let series = self.read(&identifier, freq, filter)?;
            result.push((identifier, series));
        }
        Ok(result)
    }

    /// Sorted ids of timeseries with at least one instance matching the
    /// filter.
    pub fn list_timeseries(&self, filter: &InstanceFilter) -> Result<Vec<String>, RiverbedError> {
        self.catalog.list_timeseries(filter)
    }

    /// Sorted ids of every registered timeseries.
    pub fn list_ids(&self) -> Result<Vec<String>, RiverbedError> {
        self.catalog.list_ids()
    }

    pub fn list_measurands(&self) -> Result<Vec<String>, RiverbedError> {
        self.catalog.list_measurands()
    }

    pub fn list_sources(&self) -> Result<Vec<String>, RiverbedError> {
        self.catalog.list_sources()
    }

    pub fn list_instances(
        &self,
        freq: Option<Frequency>,
        filter: &InstanceFilter,
    ) -> Result<Vec<InstanceRecord>, RiverbedError> {
        let label = freq.map(|f| f.label());
        self.catalog.list_instances(label.as_deref(), filter)
    }
}

impl std::fmt::Display for Db {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.path.display())
    }
}
