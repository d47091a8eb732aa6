//! Dice scoring and turn rotation.
//!
//! Pure functions over the game value types. [`Room`](crate::Room) does
//! the validation and history bookkeeping, then calls in here for the
//! arithmetic.

use bankdice_protocol::{DiceRoll, GameState, Player};
use rand::Rng;

/// Dice actions in a round before banking opens and sevens become deadly.
pub const OPENING_ROLLS: u32 = 3;

/// What a seven is worth during the opening rolls.
pub const OPENING_SEVEN_BONUS: u64 = 70;

/// What a roll did to the shared round score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RollEffect {
    /// The score grew by this many points.
    Added(u64),
    /// Doubles after the opening: the score doubled.
    Doubled,
    /// A seven after the opening: the score is gone and the round is over.
    RoundDeath,
}

/// Returns `true` while the round is still in its opening rolls.
pub fn in_opening_phase(roll_count: u32) -> bool {
    roll_count < OPENING_ROLLS
}

/// Scores `roll` against the state of the round, without mutating it.
///
/// Totals of 2 and 12 score their face value like any other
/// non-special total.
pub fn score_roll(roll_count: u32, roll: DiceRoll) -> RollEffect {
    if in_opening_phase(roll_count) {
        let points = if roll.total == 7 {
            OPENING_SEVEN_BONUS
        } else {
            u64::from(roll.total)
        };
        return RollEffect::Added(points);
    }
    if roll.total == 7 {
        RollEffect::RoundDeath
    } else if roll.is_doubles {
        RollEffect::Doubled
    } else {
        RollEffect::Added(u64::from(roll.total))
    }
}

/// Applies a roll to the game: updates the shared score, ends the round
/// on a deadly seven, records the roll, and counts it.
pub fn resolve_roll(game: &mut GameState, roll: DiceRoll) -> RollEffect {
    let effect = score_roll(game.roll_count, roll);
    match effect {
        RollEffect::Added(points) => {
            game.shared_round_score = game.shared_round_score.saturating_add(points);
        }
        RollEffect::Doubled => {
            game.shared_round_score = game.shared_round_score.saturating_mul(2);
        }
        RollEffect::RoundDeath => {
            game.shared_round_score = 0;
            game.round_active = false;
        }
    }
    game.roll_count += 1;
    game.last_roll = Some(roll);
    effect
}

/// Rolls two fair dice.
pub fn roll_dice<R: Rng>(rng: &mut R) -> DiceRoll {
    let mut face = || rng.random_range(DiceRoll::MIN_FACE..=DiceRoll::MAX_FACE);
    let (die1, die2) = (face(), face());
    DiceRoll {
        die1: Some(die1),
        die2: Some(die2),
        total: die1 + die2,
        is_doubles: die1 == die2,
    }
}

/// The next seat after `from`, going around the table, whose player has
/// not banked this round. `from` itself is checked last.
///
/// `None` when everyone has banked (or there is nobody at the table).
pub fn next_unbanked(players: &[Player], from: usize) -> Option<usize> {
    let n = players.len();
    (1..=n)
        .map(|step| (from + step) % n)
        .find(|&idx| !players[idx].banked_this_round)
}

/// Returns `true` if every player has banked this round.
pub fn all_banked(players: &[Player]) -> bool {
    players.iter().all(|p| p.banked_this_round)
}
