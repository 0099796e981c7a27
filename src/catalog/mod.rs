pub mod memory_catalog;
pub mod sqlite_catalog;

use serde_derive::Serialize;

use crate::errors::RiverbedError;

/// Version of the catalog schema. Checked on open.
pub const SCHEMA_VERSION: &str = "1";

/// One timeseries instance as recorded in the catalog. The handle is the
/// 32-character lowercase hex stem used to name the instance's data and log
/// files.
#[derive(Debug)]
#[derive(Clone)]
#[derive(Serialize)]
pub struct InstanceRecord {
    pub ts_id: String,
    pub freq: String,
    pub measurand: String,
    pub source: String,
    pub initial_metadata: String,
    pub handle: String,
}

/// Optional attribute constraints used when resolving or listing instances.
#[derive(Debug)]
#[derive(Clone, Copy)]
#[derive(Default)]
pub struct InstanceFilter<'a> {
    pub measurand: Option<&'a str>,
    pub source: Option<&'a str>,
}

impl<'a> InstanceFilter<'a> {
    pub fn new() -> InstanceFilter<'a> {
        InstanceFilter::default()
    }

    pub fn measurand(measurand: &'a str) -> InstanceFilter<'a> {
        InstanceFilter {
            measurand: Some(measurand),
            source: None,
        }
    }

    pub fn matches(&self, record: &InstanceRecord) -> bool {
        if let Some(m) = self.measurand {
            if record.measurand != m {
                return false;
            }
        }
        if let Some(s) = self.source {
            if record.source != s {
                return false;
            }
        }
        true
    }
}

/// The catalog seam between user-facing keys and opaque storage handles.
/// The storage engine itself only ever sees handles; everything registered
/// here (timeseries ids, measurands, sources, free attributes) exists so
/// that (ts_id, freq, attributes) resolves to exactly one handle.
pub trait InstanceDirectory {
    /// Schema version of the backing store.
    fn version(&self) -> Result<String, RiverbedError>;

    /// Registers a timeseries identifier. Duplicate ids are rejected.
    fn add_timeseries(&mut self, primary_id: &str) -> Result<(), RiverbedError>;

    /// Registers a measurand (a measurable quantity kind, e.g. streamflow).
    fn add_measurand(
        &mut self,
        short_id: &str,
        long_id: &str,
        description: &str,
    ) -> Result<(), RiverbedError>;

    /// Registers a data source (the origin/provider of the data).
    fn add_source(&mut self, short_id: &str, description: &str) -> Result<(), RiverbedError>;

    /// Registers a free-form attribute kind.
    fn add_attribute(&mut self, short_id: &str, description: &str) -> Result<(), RiverbedError>;

    /// Stores a value for a registered attribute.
    fn add_attribute_value(&mut self, attribute_id: &str, value: &str)
        -> Result<(), RiverbedError>;

    /// Creates a timeseries instance and allocates its handle. The
    /// timeseries id must already be registered (NotFound otherwise) and the
    /// measurand and source must exist (MissingAttribute otherwise).
    fn add_instance(
        &mut self,
        ts_id: &str,
        freq: &str,
        initial_metadata: &str,
        measurand: &str,
        source: &str,
    ) -> Result<String, RiverbedError>;

    /// Resolves (ts_id, freq, filter) to exactly one instance. NotFound when
    /// nothing matches, Duplicate when the filter is ambiguous.
    fn get_instance(
        &self,
        ts_id: &str,
        freq: &str,
        filter: &InstanceFilter,
    ) -> Result<InstanceRecord, RiverbedError>;

    /// Sorted ids of timeseries that have at least one matching instance.
    fn list_timeseries(&self, filter: &InstanceFilter) -> Result<Vec<String>, RiverbedError>;

    /// Sorted ids of every registered timeseries, instances or not.
    fn list_ids(&self) -> Result<Vec<String>, RiverbedError>;

    fn list_measurands(&self) -> Result<Vec<String>, RiverbedError>;

    fn list_sources(&self) -> Result<Vec<String>, RiverbedError>;

    /// Instances matching the optional frequency and attribute constraints,
    /// ordered by timeseries id then frequency.
    fn list_instances(
        &self,
        freq: Option<&str>,
        filter: &InstanceFilter,
    ) -> Result<Vec<InstanceRecord>, RiverbedError>;
}

pub(crate) fn new_handle() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}
