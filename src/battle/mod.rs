//! Battle-side collaborators consumed by the decision pipeline
//!
//! Snapshots of the ongoing battle, move records with their lookup, and an
//! advisory type chart.

pub mod moves;
pub mod snapshot;
pub mod type_chart;

pub use moves::{MoveCategory, MoveLookup, MoveRecord, MoveTable};
pub use snapshot::{BattleFile, BattleSnapshot, Combatant, Player, Stats, TurnRecord};
