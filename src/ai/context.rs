//! Per-request decision context
//!
//! Built by the caller right before running the pipeline and threaded
//! through every stage. Early stages write typed annotations, later stages
//! read them. The battle and players are borrowed, never owned: a snapshot
//! shares them with the original and only copies the pipeline's own
//! bookkeeping (history and annotations).

use derive_more::Display;
use std::fmt::Write as _;

use crate::ai::decision::{Decision, DecisionKind};
use crate::ai::difficulty::DifficultyProfile;
use crate::battle::moves::MoveRecord;
use crate::battle::snapshot::{BattleSnapshot, Combatant, Player, TurnRecord};
use crate::battle::type_chart;
use crate::core::types::{PokemonType, RequestId};

/// Type matchup between the two active combatants
#[derive(Debug, Clone, PartialEq)]
pub struct TypeMatchupSummary {
    pub ai_types: Vec<PokemonType>,
    pub opponent_types: Vec<PokemonType>,
    /// Best multiplier of our types against the opponent
    pub offensive: f32,
    /// Best multiplier of the opponent's types against us
    pub defensive: f32,
}

impl TypeMatchupSummary {
    pub fn is_favorable(&self) -> bool {
        self.offensive > self.defensive
    }

    pub fn describe(&self) -> String {
        format!(
            "your types are {} (x{:.1}); opponent's types are {} against you (x{:.1})",
            type_chart::describe(self.offensive),
            self.offensive,
            type_chart::describe(self.defensive),
            self.defensive
        )
    }
}

/// One of the active combatant's moves after power analysis
#[derive(Debug, Clone, PartialEq)]
pub struct MoveAssessment {
    pub index: usize,
    pub record: MoveRecord,
    pub effectiveness: f32,
    /// Same-type attack bonus applies
    pub stab: bool,
    /// power x accuracy x effectiveness x stab
    pub expected_power: f32,
}

/// Multi-turn view of the fight
#[derive(Debug, Clone, PartialEq)]
pub struct StrategicOutlook {
    pub ai_hp_fraction: f32,
    pub opponent_hp_fraction: f32,
    pub opponent_in_finishing_range: bool,
    pub ai_outspeeds: bool,
    /// Our active is losing the matchup badly and someone on the bench isn't
    pub consider_switch: bool,
}

/// Bench member ranked for switching in
#[derive(Debug, Clone, PartialEq)]
pub struct SwitchCandidate {
    pub team_index: usize,
    pub name: String,
    pub hp_fraction: f32,
    /// Opponent's best multiplier against this candidate
    pub defensive: f32,
    pub score: f32,
}

/// Which path produced the decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum DecisionPath {
    #[display(fmt = "model")]
    Model,
    #[display(fmt = "model-unparsable")]
    ModelUnparsable,
    #[display(fmt = "model-error")]
    ModelError,
    #[display(fmt = "difficulty-fallback")]
    DifficultyFallback,
    #[display(fmt = "validation-replaced")]
    ValidationReplaced,
}

/// Typed scratch data passed between stages
#[derive(Debug, Clone, Default)]
pub struct Annotations {
    pub matchup: Option<TypeMatchupSummary>,
    pub move_assessments: Vec<MoveAssessment>,
    pub strategy: Option<StrategicOutlook>,
    /// Move slots, best first
    pub ranked_moves: Vec<usize>,
    /// Bench members, best first
    pub switch_ranking: Vec<SwitchCandidate>,
    pub path: Option<DecisionPath>,
    /// Last decision produced by ConsultModel
    pub last_decision: Option<Decision>,
}

/// State of one AI decision request
#[derive(Debug, Clone)]
pub struct DecisionContext<'a> {
    request_id: RequestId,
    battle: &'a BattleSnapshot,
    ai_player: &'a Player,
    opponent: &'a Player,
    history: Vec<TurnRecord>,
    difficulty: DifficultyProfile,
    request: DecisionKind,
    pub annotations: Annotations,
    decision: Option<Decision>,
    use_fallback: bool,
    error: Option<String>,
}

impl<'a> DecisionContext<'a> {
    /// Context for a move-selection request. `history` is oldest first.
    pub fn new(
        battle: &'a BattleSnapshot,
        ai_player: &'a Player,
        opponent: &'a Player,
        history: Vec<TurnRecord>,
        difficulty: DifficultyProfile,
    ) -> Self {
        Self {
            request_id: RequestId::new(),
            battle,
            ai_player,
            opponent,
            history,
            difficulty,
            request: DecisionKind::Move,
            annotations: Annotations::default(),
            decision: None,
            use_fallback: false,
            error: None,
        }
    }

    /// Turn this into a switch-selection request
    pub fn for_switch(mut self) -> Self {
        self.request = DecisionKind::Switch;
        self
    }

    /// Copy the bookkeeping, share the battle and players
    pub fn snapshot(&self) -> Self {
        self.clone()
    }

    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    pub fn battle(&self) -> &'a BattleSnapshot {
        self.battle
    }

    pub fn ai_player(&self) -> &'a Player {
        self.ai_player
    }

    pub fn opponent(&self) -> &'a Player {
        self.opponent
    }

    pub fn history(&self) -> &[TurnRecord] {
        &self.history
    }

    pub fn push_turn(&mut self, record: TurnRecord) {
        self.history.push(record);
    }

    pub fn difficulty(&self) -> &DifficultyProfile {
        &self.difficulty
    }

    pub fn request(&self) -> DecisionKind {
        self.request
    }

    pub fn is_switch_request(&self) -> bool {
        self.request == DecisionKind::Switch
    }

    pub fn ai_active(&self) -> Option<&'a Combatant> {
        self.ai_player.active()
    }

    pub fn opponent_active(&self) -> Option<&'a Combatant> {
        self.opponent.active()
    }

    /// Move names of the AI's active combatant (empty if none is active)
    pub fn available_moves(&self) -> &'a [String] {
        self.ai_active().map(|c| c.moves.as_slice()).unwrap_or(&[])
    }

    pub fn decision(&self) -> Option<&Decision> {
        self.decision.as_ref()
    }

    pub fn set_decision(&mut self, decision: Decision) {
        self.decision = Some(decision);
    }

    pub fn take_decision(&mut self) -> Option<Decision> {
        self.decision.take()
    }

    pub fn use_fallback(&self) -> bool {
        self.use_fallback
    }

    pub fn set_use_fallback(&mut self, use_fallback: bool) {
        self.use_fallback = use_fallback;
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn set_error(&mut self, error: impl Into<String>) {
        self.error = Some(error.into());
    }

    /// Text description of the battle embedded in prompts
    ///
    /// Sections, in order: header, our active, opponent active, our moves,
    /// our team, analysis (only when earlier stages produced some), recent
    /// turns (only when the difficulty allows history).
    pub fn summary(&self) -> String {
        let mut s = String::new();

        let _ = writeln!(s, "Battle turn: {}", self.battle.turn);
        let _ = writeln!(
            s,
            "Request: {}",
            match self.request {
                DecisionKind::Move => "choose a move",
                DecisionKind::Switch => "choose a Pokemon to switch in",
            }
        );

        s.push_str("\n== Your active Pokemon ==\n");
        push_combatant(&mut s, self.ai_active());

        s.push_str("\n== Opponent active Pokemon ==\n");
        push_combatant(&mut s, self.opponent_active());

        s.push_str("\n== Your moves ==\n");
        let moves = self.available_moves();
        if moves.is_empty() {
            s.push_str("(no moves available)\n");
        }
        for (i, name) in moves.iter().enumerate() {
            match self.annotations.move_assessments.iter().find(|a| a.index == i) {
                Some(a) if !self.difficulty.analyzes_power() => {
                    let _ = writeln!(
                        s,
                        "{}. {} [{}, {}]",
                        i + 1,
                        name,
                        a.record.move_type,
                        type_chart::describe(a.effectiveness)
                    );
                }
                Some(a) => {
                    let _ = writeln!(
                        s,
                        "{}. {} [{}, power {}, accuracy {}%, {}]",
                        i + 1,
                        name,
                        a.record.move_type,
                        a.record.power,
                        a.record.accuracy,
                        type_chart::describe(a.effectiveness)
                    );
                }
                None => {
                    let _ = writeln!(s, "{}. {}", i + 1, name);
                }
            }
        }

        s.push_str("\n== Your team ==\n");
        if self.ai_player.team.is_empty() {
            s.push_str("(empty)\n");
        }
        for (i, member) in self.ai_player.team.iter().enumerate() {
            let mut flags = Vec::new();
            if self.ai_player.is_active(i) {
                flags.push("active");
            }
            if member.is_fainted() {
                flags.push("fainted");
            }
            let _ = write!(
                s,
                "- {} ({}) HP {}/{}",
                member.name,
                member.type_label(),
                member.current_hp,
                member.max_hp
            );
            if !flags.is_empty() {
                let _ = write!(s, " [{}]", flags.join(", "));
            }
            s.push('\n');
        }

        let analysis = self.analysis_lines();
        if !analysis.is_empty() {
            s.push_str("\n== Analysis ==\n");
            for line in analysis {
                let _ = writeln!(s, "- {}", line);
            }
        }

        if self.difficulty.turn_history_limit().is_enabled() {
            let window = self.difficulty.history_window(&self.history);
            if !window.is_empty() {
                s.push_str("\n== Recent turns ==\n");
                for turn in window {
                    let _ = write!(
                        s,
                        "- Turn {}: you used {}; opponent used {}",
                        turn.turn, turn.ai_action, turn.opponent_action
                    );
                    if !turn.outcome.is_empty() {
                        let _ = write!(s, " -> {}", turn.outcome);
                    }
                    s.push('\n');
                }
            }
        }

        s
    }

    fn analysis_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        if let Some(matchup) = &self.annotations.matchup {
            lines.push(format!("Type matchup: {}", matchup.describe()));
        }
        if !self.annotations.ranked_moves.is_empty() && !self.annotations.move_assessments.is_empty()
        {
            let order: Vec<String> = self
                .annotations
                .ranked_moves
                .iter()
                .map(|i| (i + 1).to_string())
                .collect();
            lines.push(format!("Suggested move order: {}", order.join(", ")));
        }
        if let Some(strategy) = &self.annotations.strategy {
            lines.push(format!(
                "HP: yours {:.0}%, opponent {:.0}%; you {} first",
                strategy.ai_hp_fraction * 100.0,
                strategy.opponent_hp_fraction * 100.0,
                if strategy.ai_outspeeds { "likely move" } else { "likely do not move" }
            ));
            if strategy.opponent_in_finishing_range {
                lines.push("Opponent is low enough to finish this turn".into());
            }
            if strategy.consider_switch {
                lines.push("Your active Pokemon is at a type disadvantage; a switch may help".into());
            }
        }
        if !self.annotations.switch_ranking.is_empty() {
            let names: Vec<&str> = self
                .annotations
                .switch_ranking
                .iter()
                .map(|c| c.name.as_str())
                .collect();
            lines.push(format!("Best switch-ins: {}", names.join(", ")));
        }
        lines
    }
}

fn push_combatant(s: &mut String, combatant: Option<&Combatant>) {
    let Some(c) = combatant else {
        s.push_str("(none)\n");
        return;
    };
    let _ = writeln!(
        s,
        "{} ({}) Lv{} HP {}/{} ({:.0}%)",
        c.name,
        c.type_label(),
        c.level,
        c.current_hp,
        c.max_hp,
        c.hp_fraction() * 100.0
    );
    let _ = writeln!(
        s,
        "Stats: Atk {} / Def {} / SpA {} / SpD {} / Spe {}",
        c.stats.attack, c.stats.defense, c.stats.special_attack, c.stats.special_defense, c.stats.speed
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn players() -> (BattleSnapshot, Player, Player) {
        let ai = Player::new(
            "Gary",
            vec![
                Combatant::new("Charizard", vec![PokemonType::Fire, PokemonType::Flying], 150)
                    .with_moves(["ember", "flamethrower"]),
                Combatant::new("Blastoise", vec![PokemonType::Water], 160).with_hp(0),
            ],
        );
        let opponent = Player::new(
            "Red",
            vec![Combatant::new("Venusaur", vec![PokemonType::Grass], 155)],
        );
        (BattleSnapshot::new(7), ai, opponent)
    }

    fn history(n: u32) -> Vec<TurnRecord> {
        (1..=n)
            .map(|t| TurnRecord::new(t, format!("ai-move-{}", t), "vine whip", ""))
            .collect()
    }

    #[test]
    fn test_context_accessors() {
        let (battle, ai, opponent) = players();
        let ctx = DecisionContext::new(&battle, &ai, &opponent, vec![], DifficultyProfile::easy());
        assert_eq!(ctx.ai_active().unwrap().name, "Charizard");
        assert_eq!(ctx.opponent_active().unwrap().name, "Venusaur");
        assert_eq!(ctx.available_moves().len(), 2);
        assert_eq!(ctx.request(), DecisionKind::Move);
        assert!(ctx.decision().is_none());
        assert!(!ctx.use_fallback());
        assert!(ctx.error().is_none());
        assert!(ctx.for_switch().is_switch_request());
    }

    #[test]
    fn test_snapshot_isolates_bookkeeping_but_shares_players() {
        let (battle, ai, opponent) = players();
        let mut ctx =
            DecisionContext::new(&battle, &ai, &opponent, history(2), DifficultyProfile::hard());
        ctx.annotations.ranked_moves = vec![1, 0];

        let mut copy = ctx.snapshot();
        copy.push_turn(TurnRecord::new(3, "ember", "tackle", ""));
        copy.annotations.ranked_moves.clear();
        copy.set_error("boom");

        assert_eq!(ctx.history().len(), 2);
        assert_eq!(copy.history().len(), 3);
        assert_eq!(ctx.annotations.ranked_moves, vec![1, 0]);
        assert!(ctx.error().is_none());
        assert!(std::ptr::eq(ctx.ai_player(), copy.ai_player()));
        assert!(std::ptr::eq(ctx.opponent(), copy.opponent()));
        assert!(std::ptr::eq(ctx.battle(), copy.battle()));
        assert_eq!(ctx.request_id(), copy.request_id());
    }

    #[test]
    fn test_summary_sections() {
        let (battle, ai, opponent) = players();
        let ctx = DecisionContext::new(&battle, &ai, &opponent, history(5), DifficultyProfile::medium());
        let summary = ctx.summary();

        assert!(summary.contains("Battle turn: 7"));
        assert!(summary.contains("Charizard (fire/flying)"));
        assert!(summary.contains("Venusaur (grass)"));
        assert!(summary.contains("1. ember\n2. flamethrower\n"));
        assert!(summary.contains("- Blastoise (water) HP 0/160 [fainted]"));
        assert!(summary.contains("- Charizard (fire/flying) HP 150/150 [active]"));
        assert!(!summary.contains("== Analysis =="));

        // medium shows the 3 most recent turns, oldest first
        assert!(!summary.contains("Turn 2:"));
        let t3 = summary.find("Turn 3:").unwrap();
        let t5 = summary.find("Turn 5:").unwrap();
        assert!(t3 < t5);
    }

    #[test]
    fn test_summary_hides_history_on_easy() {
        let (battle, ai, opponent) = players();
        let ctx = DecisionContext::new(&battle, &ai, &opponent, history(5), DifficultyProfile::easy());
        assert!(!ctx.summary().contains("Recent turns"));
    }

    #[test]
    fn test_summary_without_active() {
        let battle = BattleSnapshot::new(1);
        let ai = Player::new("Empty", vec![]);
        let opponent = Player::new("Also empty", vec![]);
        let ctx = DecisionContext::new(&battle, &ai, &opponent, vec![], DifficultyProfile::hard());
        let summary = ctx.summary();
        assert!(summary.contains("(none)"));
        assert!(summary.contains("(no moves available)"));
        assert!(summary.contains("(empty)"));
    }

    #[test]
    fn test_summary_includes_analysis() {
        let (battle, ai, opponent) = players();
        let mut ctx = DecisionContext::new(&battle, &ai, &opponent, vec![], DifficultyProfile::hard());
        ctx.annotations.matchup = Some(TypeMatchupSummary {
            ai_types: vec![PokemonType::Fire],
            opponent_types: vec![PokemonType::Grass],
            offensive: 2.0,
            defensive: 0.5,
        });
        let summary = ctx.summary();
        assert!(summary.contains("== Analysis =="));
        assert!(summary.contains("super effective (x2.0)"));
    }
}
