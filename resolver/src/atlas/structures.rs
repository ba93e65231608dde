//! Atlas ontology: region ids, acronyms and the hierarchy between them

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::warn;

use super::types::AtlasError;

/// One entry of an atlas's `structures.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Structure {
    pub id: u32,
    pub acronym: String,
    pub name: String,
    /// Ids from the root down to this structure (inclusive)
    #[serde(default)]
    pub structure_id_path: Vec<u32>,
    #[serde(default)]
    pub rgb_triplet: [u8; 3],
}

/// Structures indexed by id
#[derive(Debug, Clone, Default)]
pub struct StructureTree {
    structures: Vec<Structure>,
    by_id: HashMap<u32, usize>,
}

impl StructureTree {
    pub fn new(structures: Vec<Structure>) -> Self {
        let mut by_id = HashMap::with_capacity(structures.len());
        for (index, structure) in structures.iter().enumerate() {
            if by_id.insert(structure.id, index).is_some() {
                warn!(
                    "Duplicate structure id {} ({}), keeping the last entry",
                    structure.id, structure.acronym
                );
            }
        }
        Self { structures, by_id }
    }

    /// Parse the contents of a `structures.json` file
    pub fn from_json(bytes: &[u8]) -> Result<Self, AtlasError> {
        let structures: Vec<Structure> = serde_json::from_slice(bytes)?;
        Ok(Self::new(structures))
    }

    pub fn get(&self, id: u32) -> Option<&Structure> {
        self.by_id.get(&id).map(|&index| &self.structures[index])
    }

    pub fn acronym(&self, id: u32) -> Option<&str> {
        self.get(id).map(|s| s.acronym.as_str())
    }

    /// Id of the ancestor of `id` at depth `level` (0 = root).
    ///
    /// Falls back to `id` itself when the structure is unknown or its path is
    /// not that deep.
    pub fn ancestor_at_level(&self, id: u32, level: usize) -> u32 {
        self.get(id)
            .and_then(|s| s.structure_id_path.get(level).copied())
            .unwrap_or(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Structure> {
        self.structures.iter()
    }

    pub fn len(&self) -> usize {
        self.structures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.structures.is_empty()
    }
}
