//! Admission blocks.
//!
//! A [`ClusterBlock`] vetoes operations at one or more [`ClusterBlockLevel`]s.
//! Blocks are either global (every dataset) or scoped to a single dataset.
//! Actions use [`ClusterBlocks`] to answer their two admission checks; a
//! non-empty answer is returned as a [`ClusterBlockError`] and aborts the
//! broadcast before any node is contacted.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// The kind of operation a block applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusterBlockLevel {
    Read,
    Write,
    MetadataRead,
    MetadataWrite,
}

impl ClusterBlockLevel {
    pub const ALL: [ClusterBlockLevel; 4] = [
        ClusterBlockLevel::Read,
        ClusterBlockLevel::Write,
        ClusterBlockLevel::MetadataRead,
        ClusterBlockLevel::MetadataWrite,
    ];
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterBlock {
    pub id: u32,
    pub description: String,
    pub levels: Vec<ClusterBlockLevel>,
}

impl ClusterBlock {
    pub fn new(id: u32, description: impl Into<String>, level: ClusterBlockLevel) -> Self {
        Self {
            id,
            description: description.into(),
            levels: vec![level],
        }
    }

    /// A block that applies at every level.
    pub fn all_levels(id: u32, description: impl Into<String>) -> Self {
        Self {
            id,
            description: description.into(),
            levels: ClusterBlockLevel::ALL.to_vec(),
        }
    }

    pub fn with_level(mut self, level: ClusterBlockLevel) -> Self {
        if !self.levels.contains(&level) {
            self.levels.push(level);
        }
        self
    }

    pub fn contains(&self, level: ClusterBlockLevel) -> bool {
        self.levels.contains(&level)
    }
}

impl fmt::Display for ClusterBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.id, self.description)
    }
}

/// The failure surfaced when an admission check vetoes a broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterBlockError {
    pub blocks: Vec<ClusterBlock>,
}

impl ClusterBlockError {
    pub fn new(blocks: Vec<ClusterBlock>) -> Self {
        Self { blocks }
    }
}

impl fmt::Display for ClusterBlockError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "blocked by: ")?;
        for block in &self.blocks {
            write!(f, "[{}];", block)?;
        }
        Ok(())
    }
}

impl std::error::Error for ClusterBlockError {}

/// Global and per-dataset blocks.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClusterBlocks {
    global: Vec<ClusterBlock>,
    datasets: HashMap<String, Vec<ClusterBlock>>,
}

impl ClusterBlocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_global_block(&mut self, block: ClusterBlock) -> &mut Self {
        self.global.push(block);
        self
    }

    pub fn add_dataset_block(&mut self, dataset: impl Into<String>, block: ClusterBlock) -> &mut Self {
        self.datasets.entry(dataset.into()).or_default().push(block);
        self
    }

    pub fn remove_dataset_blocks(&mut self, dataset: &str) {
        self.datasets.remove(dataset);
    }

    pub fn clear_global_blocks(&mut self) {
        self.global.clear();
    }

    /// Returns an error listing every global block at `level`, if any.
    pub fn global_blocked(&self, level: ClusterBlockLevel) -> Option<ClusterBlockError> {
        let blocks: Vec<ClusterBlock> = self
            .global
            .iter()
            .filter(|b| b.contains(level))
            .cloned()
            .collect();
        if blocks.is_empty() {
            None
        } else {
            Some(ClusterBlockError::new(blocks))
        }
    }

    /// Returns an error listing every global block and every block on one of
    /// `datasets` at `level`, if any.
    pub fn datasets_blocked(&self, level: ClusterBlockLevel, datasets: &[String]) -> Option<ClusterBlockError> {
        let mut blocks: Vec<ClusterBlock> = self
            .global
            .iter()
            .filter(|b| b.contains(level))
            .cloned()
            .collect();
        for dataset in datasets {
            if let Some(scoped) = self.datasets.get(dataset) {
                blocks.extend(scoped.iter().filter(|b| b.contains(level)).cloned());
            }
        }
        if blocks.is_empty() {
            None
        } else {
            Some(ClusterBlockError::new(blocks))
        }
    }
}
