//! Dice rolling for player checks.
//!
//! Supports the `<count>d<sides>[+/-modifier]` notation players type into
//! the chat (e.g. "2d6+3"). This is flavor RNG for narrative checks, not
//! simulation-grade randomness; unparseable input falls back to a single
//! d20 rather than erroring.

use crate::party::DiceRollMeta;
use rand::Rng;
use std::fmt;

/// A parsed dice formula.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiceFormula {
    pub count: u32,
    pub sides: u32,
    pub modifier: i32,
    pub original: String,
}

/// Largest accepted dice count and die size. Formula strings come from
/// players and from the AI's `requiredRoll`, so both are untrusted.
const MAX_COUNT: u32 = 100;
const MAX_SIDES: u32 = 1000;

impl DiceFormula {
    /// Parse notation like "1d20", "2d6+3", "1d8-1".
    ///
    /// Returns None for anything that doesn't fit, including counts
    /// above [`MAX_COUNT`] and sides above [`MAX_SIDES`]; callers fall
    /// back to a plain d20.
    pub fn parse(notation: &str) -> Option<Self> {
        let trimmed = notation.trim().to_lowercase();
        let d_pos = trimmed.find('d')?;

        let count: u32 = trimmed[..d_pos].parse().ok()?;
        let rest = &trimmed[d_pos + 1..];

        let (sides_str, modifier) = match rest.find(['+', '-']) {
            Some(sign_pos) => {
                let modifier: i32 = rest[sign_pos..].parse().ok()?;
                (&rest[..sign_pos], modifier)
            }
            None => (rest, 0),
        };

        let sides: u32 = sides_str.parse().ok()?;
        if count == 0 || sides == 0 || count > MAX_COUNT || sides > MAX_SIDES {
            return None;
        }

        Some(Self {
            count,
            sides,
            modifier,
            original: trimmed,
        })
    }
}

impl fmt::Display for DiceFormula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.original)
    }
}

/// The outcome of a roll: the total and a human-readable breakdown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollOutcome {
    pub total: i32,
    pub detail: String,
}

impl RollOutcome {
    /// Metadata form for embedding in a chat message.
    pub fn into_meta(self, formula: &str) -> DiceRollMeta {
        DiceRollMeta {
            formula: formula.to_string(),
            result: self.total,
            detail: self.detail,
        }
    }
}

impl fmt::Display for RollOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {}", self.detail, self.total)
    }
}

/// Roll a dice formula, falling back to a single d20 when it doesn't parse.
pub fn roll(notation: &str) -> RollOutcome {
    roll_with_rng(notation, &mut rand::thread_rng())
}

/// Roll with a specific RNG (useful for testing).
pub fn roll_with_rng<R: Rng>(notation: &str, rng: &mut R) -> RollOutcome {
    let Some(formula) = DiceFormula::parse(notation) else {
        let value = rng.gen_range(1..=20);
        return RollOutcome {
            total: value,
            detail: format!("d20 ({value})"),
        };
    };

    let rolls: Vec<i32> = (0..formula.count)
        .map(|_| rng.gen_range(1..=formula.sides as i32))
        .collect();
    let total: i32 = rolls.iter().sum::<i32>() + formula.modifier;

    let dice_str = rolls
        .iter()
        .map(|r| r.to_string())
        .collect::<Vec<_>>()
        .join("+");
    let modifier_str = match formula.modifier {
        0 => String::new(),
        m if m > 0 => format!("+{m}"),
        m => m.to_string(),
    };

    RollOutcome {
        total,
        detail: format!("{} -> [{dice_str}]{modifier_str}", formula.original),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple() {
        let formula = DiceFormula::parse("1d20").unwrap();
        assert_eq!(formula.count, 1);
        assert_eq!(formula.sides, 20);
        assert_eq!(formula.modifier, 0);
    }

    #[test]
    fn test_parse_with_modifier() {
        let formula = DiceFormula::parse("2d6+3").unwrap();
        assert_eq!(formula.count, 2);
        assert_eq!(formula.sides, 6);
        assert_eq!(formula.modifier, 3);

        let formula = DiceFormula::parse("1d8-1").unwrap();
        assert_eq!(formula.modifier, -1);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(DiceFormula::parse("garbage").is_none());
        assert!(DiceFormula::parse("").is_none());
        assert!(DiceFormula::parse("0d6").is_none());
        assert!(DiceFormula::parse("2d0").is_none());
        assert!(DiceFormula::parse("d20").is_none());
    }

    #[test]
    fn test_roll_range() {
        for _ in 0..100 {
            let outcome = roll("2d6+3");
            assert!(
                (5..=15).contains(&outcome.total),
                "2d6+3 out of range: {}",
                outcome.total
            );
        }
    }

    #[test]
    fn test_roll_negative_modifier_range() {
        for _ in 0..100 {
            let outcome = roll("1d4-2");
            assert!((-1..=2).contains(&outcome.total));
        }
    }

    #[test]
    fn test_oversized_formula_falls_back_to_d20() {
        assert!(DiceFormula::parse("1d3000000000").is_none());
        assert!(DiceFormula::parse("4294967295d6").is_none());
        assert!(DiceFormula::parse("101d6").is_none());
        assert!(DiceFormula::parse("2d1001").is_none());
        // Still a valid roll, just on the fallback path.
        for _ in 0..20 {
            let outcome = roll("1d3000000000");
            assert!((1..=20).contains(&outcome.total));
            assert!(outcome.detail.starts_with("d20"));
        }
    }

    #[test]
    fn test_bounds_are_inclusive() {
        assert!(DiceFormula::parse("100d1000").is_some());
    }

    #[test]
    fn test_garbage_falls_back_to_d20() {
        for _ in 0..100 {
            let outcome = roll("garbage");
            assert!((1..=20).contains(&outcome.total));
            assert!(outcome.detail.starts_with("d20"));
        }
    }

    #[test]
    fn test_detail_rendering() {
        let outcome = roll("2d6+3");
        assert!(outcome.detail.starts_with("2d6+3 -> ["));
        assert!(outcome.detail.ends_with("]+3"));
    }

    #[test]
    fn test_into_meta() {
        let meta = roll("1d20").into_meta("1d20");
        assert_eq!(meta.formula, "1d20");
        assert!((1..=20).contains(&meta.result));
    }
}
