//! Battle AI - difficulty-tunable decision pipeline for turn-based battles

pub mod ai;
pub mod battle;
pub mod core;
pub mod llm;
