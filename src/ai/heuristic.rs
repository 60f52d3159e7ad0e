//! Rule-based fallback policy
//!
//! Used whenever the model is skipped, fails, or says something we can't
//! parse. It has no network dependency and always returns a decision;
//! missing inputs turn into floor-confidence placeholders instead of errors.

use rand::Rng;
use std::cmp::Reverse;
use std::sync::Arc;

use crate::ai::analysis::{self, FINISHING_HP_THRESHOLD};
use crate::ai::context::DecisionContext;
use crate::ai::decision::Decision;
use crate::ai::difficulty::DifficultyLevel;
use crate::battle::moves::{MoveLookup, MoveRecord};

/// Confidence for degenerate cases (no moves, nobody to switch to)
pub const FLOOR_CONFIDENCE: f32 = 0.1;
pub const EASY_CONFIDENCE: f32 = 0.3;
pub const MEDIUM_CONFIDENCE: f32 = 0.6;
pub const HARD_CONFIDENCE: f32 = 0.8;
pub const SWITCH_CONFIDENCE: f32 = 0.6;

/// A move slot picked by the type-relevance pass
struct Pick {
    index: usize,
    record: MoveRecord,
    reason: String,
}

/// Deterministic (or seeded-random) decisions without the model
#[derive(Clone)]
pub struct HeuristicDecisionMaker {
    lookup: Arc<dyn MoveLookup>,
}

impl HeuristicDecisionMaker {
    pub fn new(lookup: Arc<dyn MoveLookup>) -> Self {
        Self { lookup }
    }

    /// Switch path when requested, otherwise the move path for the
    /// context's difficulty
    pub fn make_decision<R: Rng + ?Sized>(
        &self,
        context: &DecisionContext,
        is_switch: bool,
        rng: &mut R,
    ) -> Decision {
        if is_switch {
            return self.switch_decision(context);
        }
        match context.difficulty().level() {
            DifficultyLevel::Easy => self.easy_move(context, rng),
            DifficultyLevel::Medium => self.medium_move(context),
            DifficultyLevel::Hard => self.hard_move(context),
        }
    }

    /// Uniform random pick among known moves
    pub fn easy_move<R: Rng + ?Sized>(&self, context: &DecisionContext, rng: &mut R) -> Decision {
        let moves = context.available_moves();
        if moves.is_empty() {
            return no_moves_decision();
        }
        let index = rng.gen_range(0..moves.len());
        let record = analysis::resolve_move(self.lookup.as_ref(), &moves[index]);
        let reasoning = format!("Heuristic: picked {} at random", record.name);
        Decision::use_move(Some(index), record, reasoning, EASY_CONFIDENCE)
    }

    /// First candidate after the type-relevance pass
    pub fn medium_move(&self, context: &DecisionContext) -> Decision {
        match self.type_relevant_pick(context) {
            Some(pick) => Decision::use_move(
                Some(pick.index),
                pick.record,
                format!("Heuristic: {}", pick.reason),
                MEDIUM_CONFIDENCE,
            ),
            None => no_moves_decision(),
        }
    }

    /// Same base pick as medium, but goes for the strongest hit when the
    /// opponent is nearly down
    pub fn hard_move(&self, context: &DecisionContext) -> Decision {
        let Some(base) = self.type_relevant_pick(context) else {
            return no_moves_decision();
        };

        if let Some(opponent) = context.opponent_active() {
            if opponent.current_hp < FINISHING_HP_THRESHOLD {
                if let Some((index, record)) = self.finishing_move(context) {
                    let reasoning = format!(
                        "Heuristic: {} has only {} HP left, so {} should finish the opponent",
                        opponent.name, opponent.current_hp, record.name
                    );
                    return Decision::use_move(Some(index), record, reasoning, HARD_CONFIDENCE);
                }
                let reasoning = format!(
                    "Heuristic: {} has only {} HP left but no damaging move can finish it; {}",
                    opponent.name, opponent.current_hp, base.reason
                );
                return Decision::use_move(Some(base.index), base.record, reasoning, HARD_CONFIDENCE);
            }
        }

        Decision::use_move(
            Some(base.index),
            base.record,
            format!("Heuristic: {}", base.reason),
            HARD_CONFIDENCE,
        )
    }

    /// First team member that is neither fainted nor active
    pub fn switch_decision(&self, context: &DecisionContext) -> Decision {
        let player = context.ai_player();
        if player.team.is_empty() {
            return Decision::cannot_switch(
                "Heuristic: cannot switch, the team is empty",
                FLOOR_CONFIDENCE,
            );
        }
        match player.switch_candidates().next() {
            Some((team_index, member)) => Decision::switch_to(
                team_index,
                member.name.clone(),
                format!("Heuristic: switching to {}, the first healthy benched Pokemon", member.name),
                SWITCH_CONFIDENCE,
            ),
            None => Decision::cannot_switch(
                "Heuristic: cannot switch, every other team member has fainted",
                FLOOR_CONFIDENCE,
            ),
        }
    }

    fn type_relevant_pick(&self, context: &DecisionContext) -> Option<Pick> {
        let moves = context.available_moves();
        if moves.is_empty() {
            return None;
        }
        let opponent = context.opponent_active();
        let resolved: Vec<(usize, MoveRecord, f32)> = moves
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let record = analysis::resolve_move(self.lookup.as_ref(), name);
                let effectiveness = analysis::move_effectiveness(&record, opponent);
                (i, record, effectiveness)
            })
            .collect();
        let target = opponent.map(|o| o.name.as_str()).unwrap_or("the opponent");

        let (reason, found) = if let Some(hit) = resolved.iter().find(|(_, _, e)| *e > 1.0) {
            (format!("{} is super effective against {}", hit.1.name, target), hit)
        } else if let Some(hit) = resolved.iter().find(|(_, _, e)| *e >= 1.0) {
            (format!("{} is not resisted by {}", hit.1.name, target), hit)
        } else if let Some(hit) = resolved.iter().find(|(_, _, e)| *e > 0.0) {
            (format!("{} at least affects {}", hit.1.name, target), hit)
        } else {
            (format!("defaulting to the first move, {}", resolved[0].1.name), &resolved[0])
        };

        Some(Pick {
            index: found.0,
            record: found.1.clone(),
            reason,
        })
    }

    /// Strongest damaging move that the opponent isn't immune to
    fn finishing_move(&self, context: &DecisionContext) -> Option<(usize, MoveRecord)> {
        let opponent = context.opponent_active();
        context
            .available_moves()
            .iter()
            .enumerate()
            .map(|(i, name)| (i, analysis::resolve_move(self.lookup.as_ref(), name)))
            .filter(|(_, record)| {
                record.is_damaging() && analysis::move_effectiveness(record, opponent) > 0.0
            })
            .min_by_key(|(_, record)| Reverse(record.power))
    }
}

fn no_moves_decision() -> Decision {
    Decision::use_move(
        None,
        MoveRecord::placeholder(),
        "Heuristic: no moves available, using the placeholder move",
        FLOOR_CONFIDENCE,
    )
}
