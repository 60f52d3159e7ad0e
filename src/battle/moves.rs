//! Move records and the read-only move lookup
//!
//! The lookup is injected into the pipeline at construction time and may be
//! shared across concurrent pipelines; nothing here mutates after loading.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::core::error::{BattleAiError, Result};
use crate::core::types::PokemonType;

/// Power given to a move the lookup doesn't know about
pub const SYNTHESIZED_MOVE_POWER: u32 = 50;

/// Name of the zero-power move used when nothing else is available
pub const PLACEHOLDER_MOVE_NAME: &str = "struggle";

/// Damage category of a move
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoveCategory {
    Physical,
    Special,
    Status,
}

impl Default for MoveCategory {
    fn default() -> Self {
        Self::Physical
    }
}

/// Full attributes of a move as owned by the lookup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveRecord {
    pub name: String,
    #[serde(default, rename = "type")]
    pub move_type: PokemonType,
    #[serde(default)]
    pub category: MoveCategory,
    #[serde(default)]
    pub power: u32,
    /// Hit chance in percent
    #[serde(default = "default_accuracy")]
    pub accuracy: u32,
    #[serde(default)]
    pub priority: i8,
}

fn default_accuracy() -> u32 {
    100
}

impl MoveRecord {
    /// Minimal record carrying only a name and a power
    pub fn named(name: impl Into<String>, power: u32) -> Self {
        Self {
            name: name.into(),
            move_type: PokemonType::Normal,
            category: MoveCategory::Physical,
            power,
            accuracy: 100,
            priority: 0,
        }
    }

    /// Zero-power record used when the active combatant has nothing to use
    pub fn placeholder() -> Self {
        Self::named(PLACEHOLDER_MOVE_NAME, 0)
    }

    pub fn is_placeholder(&self) -> bool {
        self.power == 0 && self.name.eq_ignore_ascii_case(PLACEHOLDER_MOVE_NAME)
    }

    pub fn is_damaging(&self) -> bool {
        self.category != MoveCategory::Status && self.power > 0
    }
}

/// Read-only name -> move resolution
pub trait MoveLookup: Send + Sync {
    /// Exact, case-insensitive match on the move name
    fn find_move(&self, name: &str) -> Option<MoveRecord>;
}

/// In-memory move table keyed by lowercased name
#[derive(Debug, Clone, Default)]
pub struct MoveTable {
    moves: AHashMap<String, MoveRecord>,
}

impl MoveTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a move
    pub fn insert(&mut self, record: MoveRecord) {
        self.moves.insert(record.name.trim().to_lowercase(), record);
    }

    pub fn with(mut self, record: MoveRecord) -> Self {
        self.insert(record);
        self
    }

    pub fn len(&self) -> usize {
        self.moves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }

    /// Load moves from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse_toml(&content)
    }

    /// Parse moves from a TOML string of `[[moves]]` entries
    pub fn parse_toml(content: &str) -> Result<Self> {
        let data: TomlMoves =
            toml::from_str(content).map_err(|e| BattleAiError::DataLoad(e.to_string()))?;

        let mut table = Self::new();
        for record in data.moves {
            if record.name.trim().is_empty() {
                return Err(BattleAiError::DataLoad("move with empty name".into()));
            }
            table.insert(record);
        }
        Ok(table)
    }
}

impl MoveLookup for MoveTable {
    fn find_move(&self, name: &str) -> Option<MoveRecord> {
        self.moves.get(&name.trim().to_lowercase()).cloned()
    }
}

/// TOML representation of a move file
#[derive(Debug, Deserialize)]
struct TomlMoves {
    #[serde(default)]
    moves: Vec<MoveRecord>,
}
