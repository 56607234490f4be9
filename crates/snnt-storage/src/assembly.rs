//! Assembly record: the persisted description of every population of a
//! converted network.
//!
//! The record is a label-keyed map of [`PopulationRecord`]s plus the ordered
//! list of labels. Label order is creation order; loading relies on it to pair
//! adjacent populations with their connection files.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, StorageError};
use crate::{Structure, INPUT_LABEL};

/// Population attributes stored for every entry of the assembly
pub const ASSEMBLY_VARIABLES: [&str; 3] = ["size", "structure", "label"];

/// Persisted descriptor of a single population
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopulationRecord {
    /// Number of neurons
    pub size: usize,
    /// Spatial structure
    pub structure: Structure,
    /// Population label (unique within the assembly)
    pub label: String,
    /// Cell type name, e.g. `IF_cond_exp`
    pub celltype: String,
    /// Per-neuron offset currents; absent for the input population
    pub i_offset: Option<Vec<f64>>,
}

/// Persisted description of all populations of a network
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssemblyRecord {
    /// Descriptors keyed by label
    pub populations: BTreeMap<String, PopulationRecord>,
    /// Labels in creation order
    pub labels: Vec<String>,
    /// Names of the stored population attributes
    pub variables: Vec<String>,
    /// Number of populations
    pub size: usize,
}

impl AssemblyRecord {
    /// Create an empty record
    pub fn new() -> Self {
        Self {
            populations: BTreeMap::new(),
            labels: Vec::new(),
            variables: ASSEMBLY_VARIABLES.iter().map(|v| v.to_string()).collect(),
            size: 0,
        }
    }

    /// Append a population, keeping creation order
    pub fn push(&mut self, record: PopulationRecord) -> Result<()> {
        if self.populations.contains_key(&record.label) {
            return Err(StorageError::DuplicateLabel {
                label: record.label,
            });
        }
        self.labels.push(record.label.clone());
        self.populations.insert(record.label.clone(), record);
        self.size = self.labels.len();
        Ok(())
    }

    /// Look up a population by label
    pub fn get(&self, label: &str) -> Option<&PopulationRecord> {
        self.populations.get(label)
    }

    /// Iterate over populations in creation order
    pub fn iter(&self) -> impl Iterator<Item = &PopulationRecord> {
        self.labels.iter().filter_map(move |label| self.populations.get(label))
    }

    /// Number of populations
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Whether the record holds no populations
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Check internal consistency of a decoded record
    pub fn validate(&self) -> Result<()> {
        if self.size != self.labels.len() {
            return Err(StorageError::invalid_format(format!(
                "assembly declares {} populations but lists {} labels",
                self.size,
                self.labels.len()
            )));
        }
        if self.populations.len() != self.labels.len() {
            return Err(StorageError::invalid_format(format!(
                "assembly lists {} labels but stores {} descriptors",
                self.labels.len(),
                self.populations.len()
            )));
        }
        for label in &self.labels {
            let record = self.populations.get(label).ok_or_else(|| {
                StorageError::invalid_format(format!("no descriptor for label '{}'", label))
            })?;
            if record.label != *label {
                return Err(StorageError::invalid_format(format!(
                    "descriptor stored under '{}' is labelled '{}'",
                    label, record.label
                )));
            }
            if label != INPUT_LABEL {
                match &record.i_offset {
                    Some(offsets) if offsets.len() == record.size => {}
                    Some(offsets) => {
                        return Err(StorageError::invalid_format(format!(
                            "population '{}' has {} neurons but {} offsets",
                            label,
                            record.size,
                            offsets.len()
                        )))
                    }
                    None => {
                        return Err(StorageError::invalid_format(format!(
                            "population '{}' is missing offset currents",
                            label
                        )))
                    }
                }
            }
        }
        Ok(())
    }

    /// Encode the record
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| StorageError::serialization(e.to_string()))
    }

    /// Decode and validate a record
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let record: Self =
            bincode::deserialize(bytes).map_err(|e| StorageError::serialization(e.to_string()))?;
        record.validate()?;
        Ok(record)
    }

    /// Write the record to `path`, replacing any existing file
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, self.to_bytes()?)?;
        log::debug!("Wrote assembly with {} populations to {}", self.size, path.display());
        Ok(())
    }

    /// Read a record from `path`
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(StorageError::not_found(path));
        }
        let bytes = std::fs::read(path)?;
        Self::from_bytes(&bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> AssemblyRecord {
        let mut record = AssemblyRecord::new();
        record
            .push(PopulationRecord {
                size: 4,
                structure: Structure::Grid2D { aspect_ratio: 1.0 },
                label: INPUT_LABEL.to_string(),
                celltype: "SpikeSourcePoisson".to_string(),
                i_offset: None,
            })
            .unwrap();
        record
            .push(PopulationRecord {
                size: 2,
                structure: Structure::Line,
                label: "dense_1".to_string(),
                celltype: "IF_cond_exp".to_string(),
                i_offset: Some(vec![0.01, -0.02]),
            })
            .unwrap();
        record
    }

    #[test]
    fn test_push_keeps_creation_order() {
        let record = sample_record();
        assert_eq!(record.labels, vec![INPUT_LABEL, "dense_1"]);
        assert_eq!(record.size, 2);
        assert_eq!(record.variables, vec!["size", "structure", "label"]);
        let sizes: Vec<usize> = record.iter().map(|p| p.size).collect();
        assert_eq!(sizes, vec![4, 2]);
    }

    #[test]
    fn test_duplicate_label_rejected() {
        let mut record = sample_record();
        let dup = record.get("dense_1").unwrap().clone();
        assert!(matches!(record.push(dup), Err(StorageError::DuplicateLabel { .. })));
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snn_model.bin");
        let record = sample_record();
        record.save(&path).unwrap();

        let loaded = AssemblyRecord::load(&path).unwrap();
        assert_eq!(loaded, record);
        assert_eq!(loaded.get(INPUT_LABEL).unwrap().i_offset, None);
        assert_eq!(loaded.get("dense_1").unwrap().i_offset, Some(vec![0.01, -0.02]));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = AssemblyRecord::load(&dir.path().join("absent.bin")).unwrap_err();
        assert!(matches!(err, StorageError::NotFound { .. }));
    }

    #[test]
    fn test_load_garbage_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.bin");
        std::fs::write(&path, b"\x01\x02").unwrap();
        assert!(AssemblyRecord::load(&path).is_err());
    }

    #[test]
    fn test_validate_detects_missing_offsets() {
        let mut record = sample_record();
        record.populations.get_mut("dense_1").unwrap().i_offset = None;
        assert!(matches!(record.validate(), Err(StorageError::InvalidFormat { .. })));
    }

    #[test]
    fn test_validate_detects_size_mismatch() {
        let mut record = sample_record();
        record.size = 3;
        assert!(record.validate().is_err());
    }
}
