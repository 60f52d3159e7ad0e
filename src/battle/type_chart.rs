//! Compact type chart
//!
//! Advisory only: the pipeline uses it to rank candidates and to annotate
//! prompts. Damage resolution lives in the turn engine, not here.

use crate::core::types::PokemonType;

/// Attack relations for one attacking type: (super effective, resisted, immune)
fn relations(
    attack: PokemonType,
) -> (
    &'static [PokemonType],
    &'static [PokemonType],
    &'static [PokemonType],
) {
    use PokemonType::*;
    match attack {
        Normal => (&[], &[Rock, Steel], &[Ghost]),
        Fire => (&[Grass, Ice, Bug, Steel], &[Fire, Water, Rock, Dragon], &[]),
        Water => (&[Fire, Ground, Rock], &[Water, Grass, Dragon], &[]),
        Electric => (&[Water, Flying], &[Electric, Grass, Dragon], &[Ground]),
        Grass => (
            &[Water, Ground, Rock],
            &[Fire, Grass, Poison, Flying, Bug, Dragon, Steel],
            &[],
        ),
        Ice => (
            &[Grass, Ground, Flying, Dragon],
            &[Fire, Water, Ice, Steel],
            &[],
        ),
        Fighting => (
            &[Normal, Ice, Rock, Dark, Steel],
            &[Poison, Flying, Psychic, Bug, Fairy],
            &[Ghost],
        ),
        Poison => (&[Grass, Fairy], &[Poison, Ground, Rock, Ghost], &[Steel]),
        Ground => (
            &[Fire, Electric, Poison, Rock, Steel],
            &[Grass, Bug],
            &[Flying],
        ),
        Flying => (&[Grass, Fighting, Bug], &[Electric, Rock, Steel], &[]),
        Psychic => (&[Fighting, Poison], &[Psychic, Steel], &[Dark]),
        Bug => (
            &[Grass, Psychic, Dark],
            &[Fire, Fighting, Poison, Flying, Ghost, Steel, Fairy],
            &[],
        ),
        Rock => (&[Fire, Ice, Flying, Bug], &[Fighting, Ground, Steel], &[]),
        Ghost => (&[Psychic, Ghost], &[Dark], &[Normal]),
        Dragon => (&[Dragon], &[Steel], &[Fairy]),
        Dark => (&[Psychic, Ghost], &[Fighting, Dark, Fairy], &[]),
        Steel => (&[Ice, Rock, Fairy], &[Fire, Water, Electric, Steel], &[]),
        Fairy => (&[Fighting, Dragon, Dark], &[Fire, Poison, Steel], &[]),
    }
}

/// Multiplier of one attacking type against one defending type
pub fn single_multiplier(attack: PokemonType, defend: PokemonType) -> f32 {
    let (strong, weak, immune) = relations(attack);
    if immune.contains(&defend) {
        0.0
    } else if strong.contains(&defend) {
        2.0
    } else if weak.contains(&defend) {
        0.5
    } else {
        1.0
    }
}

/// Combined multiplier against every type of the defender
///
/// An empty defender type list counts as neutral.
pub fn effectiveness(attack: PokemonType, defenders: &[PokemonType]) -> f32 {
    defenders
        .iter()
        .map(|&d| single_multiplier(attack, d))
        .product()
}

/// Best multiplier any of the attacker's own types achieves against the defender
///
/// Neutral when the attacker has no types at all.
pub fn best_effectiveness(attackers: &[PokemonType], defenders: &[PokemonType]) -> f32 {
    attackers
        .iter()
        .map(|&a| effectiveness(a, defenders))
        .reduce(f32::max)
        .unwrap_or(1.0)
}

/// Human-readable label for a multiplier
pub fn describe(multiplier: f32) -> &'static str {
    if multiplier == 0.0 {
        "no effect"
    } else if multiplier >= 2.0 {
        "super effective"
    } else if multiplier < 1.0 {
        "not very effective"
    } else {
        "neutral"
    }
}
