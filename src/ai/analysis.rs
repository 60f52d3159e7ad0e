//! Pure analysis helpers behind the Analyze and Evaluate stages

use ordered_float::OrderedFloat;

use crate::ai::context::{MoveAssessment, StrategicOutlook, SwitchCandidate, TypeMatchupSummary};
use crate::battle::moves::{MoveLookup, MoveRecord, SYNTHESIZED_MOVE_POWER};
use crate::battle::snapshot::{Combatant, Player};
use crate::battle::type_chart;

/// Opponent HP (absolute) below which a finishing move is worth going for
pub const FINISHING_HP_THRESHOLD: u32 = 30;

/// Resolve a move name, synthesizing a minimal record when unknown
pub fn resolve_move(lookup: &dyn MoveLookup, name: &str) -> MoveRecord {
    lookup
        .find_move(name)
        .unwrap_or_else(|| MoveRecord::named(name.trim(), SYNTHESIZED_MOVE_POWER))
}

pub fn type_matchup(ai: &Combatant, opponent: &Combatant) -> TypeMatchupSummary {
    TypeMatchupSummary {
        ai_types: ai.types.clone(),
        opponent_types: opponent.types.clone(),
        offensive: type_chart::best_effectiveness(&ai.types, &opponent.types),
        defensive: type_chart::best_effectiveness(&opponent.types, &ai.types),
    }
}

/// Effectiveness of a move against the opponent; neutral without a target
/// or for status moves
pub fn move_effectiveness(record: &MoveRecord, opponent: Option<&Combatant>) -> f32 {
    match opponent {
        Some(target) if record.is_damaging() => {
            type_chart::effectiveness(record.move_type, &target.types)
        }
        _ => 1.0,
    }
}

pub fn assess_moves(
    active: &Combatant,
    opponent: Option<&Combatant>,
    lookup: &dyn MoveLookup,
) -> Vec<MoveAssessment> {
    active
        .moves
        .iter()
        .enumerate()
        .map(|(index, name)| {
            let record = resolve_move(lookup, name);
            let effectiveness = move_effectiveness(&record, opponent);
            let stab = active.types.contains(&record.move_type);
            let expected_power = if record.is_damaging() {
                let stab_multiplier = if stab { 1.5 } else { 1.0 };
                record.power as f32
                    * (record.accuracy.min(100) as f32 / 100.0)
                    * effectiveness
                    * stab_multiplier
            } else {
                0.0
            };
            MoveAssessment {
                index,
                record,
                effectiveness,
                stab,
                expected_power,
            }
        })
        .collect()
}

/// Order move slots best first
///
/// With power analysis the key is expected power; otherwise only type
/// effectiveness counts. Ties keep slot order.
pub fn rank_moves(assessments: &[MoveAssessment], use_power: bool) -> Vec<usize> {
    let mut ranked: Vec<&MoveAssessment> = assessments.iter().collect();
    ranked.sort_by_key(|a| {
        let key = if use_power {
            a.expected_power
        } else {
            a.effectiveness
        };
        std::cmp::Reverse(OrderedFloat(key))
    });
    ranked.into_iter().map(|a| a.index).collect()
}

pub fn strategic_outlook(
    ai: &Combatant,
    opponent: &Combatant,
    matchup: Option<&TypeMatchupSummary>,
    bench_available: bool,
) -> StrategicOutlook {
    let losing_matchup = matchup
        .map(|m| m.defensive >= 2.0 && m.offensive <= 1.0)
        .unwrap_or(false);
    StrategicOutlook {
        ai_hp_fraction: ai.hp_fraction(),
        opponent_hp_fraction: opponent.hp_fraction(),
        opponent_in_finishing_range: opponent.current_hp < FINISHING_HP_THRESHOLD,
        ai_outspeeds: ai.stats.speed > opponent.stats.speed,
        consider_switch: losing_matchup && bench_available,
    }
}

/// Rank bench members that can switch in, best first
///
/// Healthier members that take less from the opponent's types score higher.
pub fn rank_switches(
    player: &Player,
    opponent: Option<&Combatant>,
    type_aware: bool,
) -> Vec<SwitchCandidate> {
    let mut candidates: Vec<SwitchCandidate> = player
        .switch_candidates()
        .map(|(team_index, member)| {
            let defensive = match opponent {
                Some(opp) if type_aware => {
                    type_chart::best_effectiveness(&opp.types, &member.types)
                }
                _ => 1.0,
            };
            let hp_fraction = member.hp_fraction();
            SwitchCandidate {
                team_index,
                name: member.name.clone(),
                hp_fraction,
                defensive,
                score: hp_fraction / defensive.max(0.25),
            }
        })
        .collect();
    candidates.sort_by_key(|c| std::cmp::Reverse(OrderedFloat(c.score)));
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battle::moves::{MoveCategory, MoveTable};
    use crate::core::types::PokemonType;

    fn record(name: &str, move_type: PokemonType, power: u32) -> MoveRecord {
        MoveRecord {
            name: name.into(),
            move_type,
            category: MoveCategory::Special,
            power,
            accuracy: 100,
            priority: 0,
        }
    }

    fn table() -> MoveTable {
        MoveTable::new()
            .with(record("ember", PokemonType::Fire, 40))
            .with(record("water gun", PokemonType::Water, 40))
            .with(record("hydro pump", PokemonType::Water, 110))
            .with(MoveRecord {
                accuracy: 80,
                ..record("thunder", PokemonType::Electric, 110)
            })
    }

    #[test]
    fn test_resolve_unknown_move_synthesizes() {
        let resolved = resolve_move(&table(), "mystery beam");
        assert_eq!(resolved.name, "mystery beam");
        assert_eq!(resolved.power, SYNTHESIZED_MOVE_POWER);
        assert_eq!(resolve_move(&table(), "EMBER").move_type, PokemonType::Fire);
    }

    #[test]
    fn test_type_matchup() {
        let charizard = Combatant::new("Charizard", vec![PokemonType::Fire, PokemonType::Flying], 150);
        let blastoise = Combatant::new("Blastoise", vec![PokemonType::Water], 160);
        let matchup = type_matchup(&charizard, &blastoise);
        assert_eq!(matchup.offensive, 1.0);
        assert_eq!(matchup.defensive, 2.0);
        assert!(!matchup.is_favorable());
    }

    #[test]
    fn test_assess_and_rank_moves() {
        let blastoise = Combatant::new("Blastoise", vec![PokemonType::Water], 160)
            .with_moves(["ember", "water gun", "hydro pump", "thunder"]);
        let charizard = Combatant::new("Charizard", vec![PokemonType::Fire, PokemonType::Flying], 150);

        let assessments = assess_moves(&blastoise, Some(&charizard), &table());
        assert_eq!(assessments.len(), 4);
        // water vs fire/flying: 2x, with STAB
        assert_eq!(assessments[2].effectiveness, 2.0);
        assert!(assessments[2].stab);
        // thunder vs flying: 2x, 80% accuracy, no STAB
        assert!((assessments[3].expected_power - 176.0).abs() < 0.01);

        assert_eq!(rank_moves(&assessments, true), vec![2, 3, 1, 0]);
        // effectiveness only: ties keep slot order
        assert_eq!(rank_moves(&assessments, false), vec![1, 2, 3, 0]);
    }

    #[test]
    fn test_strategic_outlook() {
        let charizard = Combatant::new("Charizard", vec![PokemonType::Fire], 150);
        let blastoise = Combatant::new("Blastoise", vec![PokemonType::Water], 160).with_hp(25);
        let matchup = type_matchup(&charizard, &blastoise);
        let outlook = strategic_outlook(&charizard, &blastoise, Some(&matchup), true);
        assert!(outlook.opponent_in_finishing_range);
        assert!(outlook.consider_switch);
        assert!(!outlook.ai_outspeeds);

        let no_bench = strategic_outlook(&charizard, &blastoise, Some(&matchup), false);
        assert!(!no_bench.consider_switch);
    }

    #[test]
    fn test_rank_switches_prefers_resistant_members() {
        let player = Player::new(
            "Gary",
            vec![
                Combatant::new("Charizard", vec![PokemonType::Fire], 150),
                Combatant::new("Arcanine", vec![PokemonType::Fire], 150),
                Combatant::new("Venusaur", vec![PokemonType::Grass], 150),
                Combatant::new("Golem", vec![PokemonType::Rock], 150).with_hp(0),
            ],
        );
        let opponent = Combatant::new("Blastoise", vec![PokemonType::Water], 160);

        let ranked = rank_switches(&player, Some(&opponent), true);
        let names: Vec<_> = ranked.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Venusaur", "Arcanine"]);

        let unaware = rank_switches(&player, Some(&opponent), false);
        assert_eq!(unaware[0].name, "Arcanine");
    }
}
