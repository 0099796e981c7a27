use std::collections::{BTreeMap, BTreeSet};

use crate::catalog::{new_handle, InstanceDirectory, InstanceFilter, InstanceRecord, SCHEMA_VERSION};
use crate::errors::RiverbedError;

/// In-memory catalog with the same semantics as the sqlite one. Useful for
/// exercising the storage engine without a database directory on disk.
#[derive(Debug)]
#[derive(Default)]
pub struct MemoryCatalog {
    timeseries: BTreeSet<String>,
    measurands: BTreeMap<String, (String, String)>,       //short_id -> (long_id, description)
    sources: BTreeMap<String, String>,                    //short_id -> description
    attributes: BTreeMap<String, String>,                 //short_id -> description
    attribute_values: BTreeMap<String, BTreeSet<String>>, //short_id -> values
    instances: Vec<InstanceRecord>,
}

impl MemoryCatalog {
    pub fn new() -> MemoryCatalog {
        MemoryCatalog::default()
    }
}

impl InstanceDirectory for MemoryCatalog {
    fn version(&self) -> Result<String, RiverbedError> {
        Ok(SCHEMA_VERSION.to_string())
    }

    fn add_timeseries(&mut self, primary_id: &str) -> Result<(), RiverbedError> {
        let the_id = primary_id.trim().to_string();
        if !self.timeseries.insert(the_id.clone()) {
            return Err(RiverbedError::Duplicate(the_id));
        }
        Ok(())
    }

    fn add_measurand(
        &mut self,
        short_id: &str,
        long_id: &str,
        description: &str,
    ) -> Result<(), RiverbedError> {
        let short_id = short_id.trim().to_string();
        if self.measurands.contains_key(&short_id) {
            return Err(RiverbedError::Duplicate(short_id));
        }
        self.measurands
            .insert(short_id, (long_id.trim().to_string(), description.to_string()));
        Ok(())
    }

    fn add_source(&mut self, short_id: &str, description: &str) -> Result<(), RiverbedError> {
        let short_id = short_id.trim().to_string();
        if self.sources.contains_key(&short_id) {
            return Err(RiverbedError::Duplicate(short_id));
        }
        self.sources.insert(short_id, description.to_string());
        Ok(())
    }

    fn add_attribute(&mut self, short_id: &str, description: &str) -> Result<(), RiverbedError> {
        let short_id = short_id.trim().to_uppercase();
        if self.attributes.contains_key(&short_id) {
            return Err(RiverbedError::Duplicate(short_id));
        }
        self.attributes.insert(short_id, description.to_string());
        Ok(())
    }

    fn add_attribute_value(
        &mut self,
        attribute_id: &str,
        value: &str,
    ) -> Result<(), RiverbedError> {
        let short_id = attribute_id.trim().to_uppercase();
        if !self.attributes.contains_key(&short_id) {
            return Err(RiverbedError::MissingAttribute(format!(
                "Could not find {} ({}) in the database.",
                attribute_id, value
            )));
        }
        self.attribute_values
            .entry(short_id)
            .or_insert_with(BTreeSet::new)
            .insert(value.to_string());
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
        if !self.timeseries.contains(ts_id) {
            return Err(RiverbedError::NotFound(format!(
                "Could not find metadata record for: {}",
                ts_id
            )));
        }
        if !self.measurands.contains_key(measurand) {
            return Err(RiverbedError::MissingAttribute(format!(
                "Could not find measurand ({}) in the database.",
                measurand
            )));
        }
        if !self.sources.contains_key(source) {
            return Err(RiverbedError::MissingAttribute(format!(
                "Could not find source ({}) in the database.",
                source
            )));
        }
        if self.instances.iter().any(|i| {
            i.ts_id == ts_id && i.freq == freq && i.measurand == measurand && i.source == source
        }) {
            return Err(RiverbedError::Duplicate(format!(
                "timeseries instance already exists: '{}', '{}'",
                ts_id, freq
            )));
        }

        let handle = new_handle();
        self.instances.push(InstanceRecord {
            ts_id: ts_id.to_string(),
            freq: freq.to_string(),
            measurand: measurand.to_string(),
            source: source.to_string(),
            initial_metadata: initial_metadata.to_string(),
            handle: handle.clone(),
        });
        Ok(handle)
    }

    fn get_instance(
        &self,
        ts_id: &str,
        freq: &str,
        filter: &InstanceFilter,
    ) -> Result<InstanceRecord, RiverbedError> {
        let mut matches = self
            .instances
            .iter()
            .filter(|i| i.ts_id == ts_id && i.freq == freq && filter.matches(i));
        let first = matches.next();
        if matches.next().is_some() {
            return Err(RiverbedError::Duplicate(format!(
                "({}, {}) matches multiple instances",
                ts_id, freq
            )));
        }
        match first {
            Some(record) => Ok(record.clone()),
            None => Err(RiverbedError::NotFound(format!(
                "Could not find timeseries instance for ({}, {}).",
                ts_id, freq
            ))),
        }
    }

    fn list_timeseries(&self, filter: &InstanceFilter) -> Result<Vec<String>, RiverbedError> {
        let ids: BTreeSet<String> = self
            .instances
            .iter()
            .filter(|i| filter.matches(i))
            .map(|i| i.ts_id.clone())
            .collect();
        Ok(ids.into_iter().collect())
    }

    fn list_ids(&self) -> Result<Vec<String>, RiverbedError> {
        Ok(self.timeseries.iter().cloned().collect())
    }

    fn list_measurands(&self) -> Result<Vec<String>, RiverbedError> {
        Ok(self.measurands.keys().cloned().collect())
    }

    fn list_sources(&self) -> Result<Vec<String>, RiverbedError> {
        Ok(self.sources.keys().cloned().collect())
    }

    fn list_instances(
        &self,
        freq: Option<&str>,
        filter: &InstanceFilter,
    ) -> Result<Vec<InstanceRecord>, RiverbedError> {
        let mut records: Vec<InstanceRecord> = self
            .instances
            .iter()
            .filter(|i| filter.matches(i))
            .filter(|i| freq.map_or(true, |f| i.freq == f))
            .cloned()
            .collect();
        records.sort_by(|a, b| (&a.ts_id, &a.freq).cmp(&(&b.ts_id, &b.freq)));
        Ok(records)
    }
}
