//! Read-only snapshots of the battle handed to the decision pipeline
//!
//! These are owned by the turn engine. The pipeline only borrows them.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::types::PokemonType;

/// Handle to the ongoing battle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BattleSnapshot {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    /// Current turn number (1-based)
    #[serde(default)]
    pub turn: u32,
}

impl BattleSnapshot {
    pub fn new(turn: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            turn,
        }
    }
}

/// Base stats of a combatant
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub attack: u32,
    pub defense: u32,
    pub special_attack: u32,
    pub special_defense: u32,
    pub speed: u32,
}

/// One team member
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Combatant {
    pub name: String,
    #[serde(default)]
    pub types: Vec<PokemonType>,
    #[serde(default = "default_level")]
    pub level: u32,
    pub current_hp: u32,
    pub max_hp: u32,
    #[serde(default)]
    pub stats: Stats,
    /// Known move names, in slot order
    #[serde(default)]
    pub moves: Vec<String>,
}

fn default_level() -> u32 {
    50
}

impl Combatant {
    pub fn new(name: impl Into<String>, types: Vec<PokemonType>, max_hp: u32) -> Self {
        Self {
            name: name.into(),
            types,
            level: default_level(),
            current_hp: max_hp,
            max_hp,
            stats: Stats::default(),
            moves: Vec::new(),
        }
    }

    pub fn with_moves<I, S>(mut self, moves: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.moves = moves.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_hp(mut self, current_hp: u32) -> Self {
        self.current_hp = current_hp.min(self.max_hp);
        self
    }

    pub fn with_stats(mut self, stats: Stats) -> Self {
        self.stats = stats;
        self
    }

    pub fn is_fainted(&self) -> bool {
        self.current_hp == 0
    }

    /// Remaining HP as a fraction of max (0.0 when max is zero)
    pub fn hp_fraction(&self) -> f32 {
        if self.max_hp == 0 {
            return 0.0;
        }
        self.current_hp as f32 / self.max_hp as f32
    }

    /// Slash-joined type names, e.g. "fire/flying"
    pub fn type_label(&self) -> String {
        if self.types.is_empty() {
            return "unknown".into();
        }
        self.types
            .iter()
            .map(|t| t.name())
            .collect::<Vec<_>>()
            .join("/")
    }
}

/// One side of the battle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub name: String,
    #[serde(default)]
    pub team: Vec<Combatant>,
    /// Index into `team` of the combatant currently in play
    #[serde(default)]
    pub active_index: Option<usize>,
}

impl Player {
    pub fn new(name: impl Into<String>, team: Vec<Combatant>) -> Self {
        let active_index = if team.is_empty() { None } else { Some(0) };
        Self {
            name: name.into(),
            team,
            active_index,
        }
    }

    pub fn active(&self) -> Option<&Combatant> {
        self.active_index.and_then(|i| self.team.get(i))
    }

    pub fn is_active(&self, team_index: usize) -> bool {
        self.active_index == Some(team_index)
    }

    /// Case-insensitive exact name match against the team
    pub fn find_member(&self, name: &str) -> Option<(usize, &Combatant)> {
        let wanted = name.trim().to_lowercase();
        self.team
            .iter()
            .enumerate()
            .find(|(_, c)| c.name.to_lowercase() == wanted)
    }

    /// Team members that are neither fainted nor already in play
    pub fn switch_candidates(&self) -> impl Iterator<Item = (usize, &Combatant)> {
        self.team
            .iter()
            .enumerate()
            .filter(move |(i, c)| !c.is_fainted() && !self.is_active(*i))
    }
}

/// Outcome of one past turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnRecord {
    pub turn: u32,
    pub ai_action: String,
    pub opponent_action: String,
    #[serde(default)]
    pub outcome: String,
}

impl TurnRecord {
    pub fn new(
        turn: u32,
        ai_action: impl Into<String>,
        opponent_action: impl Into<String>,
        outcome: impl Into<String>,
    ) -> Self {
        Self {
            turn,
            ai_action: ai_action.into(),
            opponent_action: opponent_action.into(),
            outcome: outcome.into(),
        }
    }
}

/// Everything the caller hands over for one AI turn, as stored on disk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BattleFile {
    pub battle: BattleSnapshot,
    pub ai: Player,
    pub opponent: Player,
    /// Oldest first
    #[serde(default)]
    pub history: Vec<TurnRecord>,
}
