//! Battle AI - Decision Runner
//!
//! Reads a battle snapshot from JSON, runs the decision pipeline once and
//! prints the decision as JSON.

use battle_ai::ai::{DecisionContext, DecisionPipeline, DifficultyLevel, DifficultyProfile};
use battle_ai::battle::{BattleFile, MoveTable};
use battle_ai::core::config::AiConfig;
use battle_ai::core::error::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

/// Pick the computer side's next action for a battle snapshot
#[derive(Parser, Debug)]
#[command(name = "battle-ai")]
#[command(about = "Run the battle decision pipeline on a battle snapshot")]
struct Args {
    /// Battle file: {"battle", "ai", "opponent", "history"}
    #[arg(long)]
    battle: PathBuf,

    /// Move table ([[moves]] entries)
    #[arg(long)]
    moves: Option<PathBuf>,

    /// Configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// easy, medium or hard (overrides the config file)
    #[arg(long)]
    difficulty: Option<String>,

    /// Ask for a switch instead of a move
    #[arg(long)]
    switch: bool,

    /// Random seed for deterministic runs
    #[arg(long)]
    seed: Option<u64>,

    /// Don't contact the model; every decision comes from the heuristic
    #[arg(long)]
    offline: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("battle_ai=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => AiConfig::load(path)?,
        None => AiConfig::default(),
    }
    .with_env_overrides()?;
    if let Some(difficulty) = &args.difficulty {
        config.pipeline.difficulty = difficulty.clone();
    }
    if args.seed.is_some() {
        config.pipeline.seed = args.seed;
    }
    config.validate()?;

    let table = match &args.moves {
        Some(path) => MoveTable::load(path)?,
        None => MoveTable::new(),
    };
    tracing::info!(moves = table.len(), "Move table ready");
    let lookup = Arc::new(table);

    let mut pipeline = if args.offline {
        let level = DifficultyLevel::from_name(Some(&config.pipeline.difficulty));
        let pipeline = DecisionPipeline::new(lookup, None).with_level(level);
        match config.pipeline.seed {
            Some(seed) => pipeline.with_seed(seed),
            None => pipeline,
        }
    } else {
        DecisionPipeline::from_config(&config, lookup)
    };

    let content = std::fs::read_to_string(&args.battle)?;
    let file: BattleFile = serde_json::from_str(&content)?;

    let context = DecisionContext::new(
        &file.battle,
        &file.ai,
        &file.opponent,
        file.history.clone(),
        DifficultyProfile::for_difficulty(pipeline.level()),
    );
    let mut context = if args.switch {
        context.for_switch()
    } else {
        context
    };

    let decision = pipeline.run(&mut context)?;
    println!("{}", serde_json::to_string_pretty(&decision)?);

    if let Some(error) = context.error() {
        tracing::warn!(error, "Model was not used for this decision");
    }

    Ok(())
}
