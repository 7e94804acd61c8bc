use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

const STRENGTH_MIN: f64 = 1.0;
const STRENGTH_MAX: f64 = 100.0;

/// Frozen 5-way market for one fixture. Decimal odds, two decimal places.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatchOdds {
    pub home: f64,
    pub draw: f64,
    pub away: f64,
    pub gg: f64,
    pub nogg: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct OddsConfig {
    /// House margin distributed evenly across home/draw/away.
    pub margin: f64,
    pub min_odd: f64,
    pub max_odd: f64,
    /// Both-teams-score market is a flat constant pair, not derived from the
    /// probability model. One pair everywhere; the legacy 1.9/1.9 call site
    /// was a bug.
    pub gg: f64,
    pub nogg: f64,
}

impl Default for OddsConfig {
    fn default() -> Self {
        Self {
            margin: 0.10,
            min_odd: 1.15,
            max_odd: 45.0,
            gg: 1.75,
            nogg: 1.90,
        }
    }
}

pub fn compute_odds(home_strength: f64, away_strength: f64) -> Result<MatchOdds> {
    compute_odds_with(home_strength, away_strength, OddsConfig::default())
}

/// Pure odds model. The three base probabilities intentionally do not sum to
/// 1 for nonzero strength diff; normalizing would change every published
/// price, so the raw formula is kept as-is.
pub fn compute_odds_with(
    home_strength: f64,
    away_strength: f64,
    cfg: OddsConfig,
) -> Result<MatchOdds> {
    validate_strength("home", home_strength)?;
    validate_strength("away", away_strength)?;

    let diff = home_strength - away_strength;
    let home_p = 0.33 + diff / 160.0;
    let away_p = 0.33 - diff / 160.0;
    let draw_p = 0.34;

    let third = cfg.margin / 3.0;
    Ok(MatchOdds {
        home: price(home_p + third, &cfg),
        draw: price(draw_p + third, &cfg),
        away: price(away_p + third, &cfg),
        gg: cfg.gg,
        nogg: cfg.nogg,
    })
}

pub fn validate_strength(label: &str, strength: f64) -> Result<()> {
    if !strength.is_finite() {
        bail!("{label} strength is not a finite number: {strength}");
    }
    if !(STRENGTH_MIN..=STRENGTH_MAX).contains(&strength) {
        bail!("{label} strength {strength} outside [{STRENGTH_MIN}, {STRENGTH_MAX}]");
    }
    Ok(())
}

fn price(prob: f64, cfg: &OddsConfig) -> f64 {
    let raw = 1.0 / prob;
    let rounded = (raw * 100.0).round() / 100.0;
    rounded.clamp(cfg.min_odd, cfg.max_odd)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_strengths_are_symmetric() {
        let odds = compute_odds(70.0, 70.0).unwrap();
        assert_eq!(odds.home, odds.away);
        // p = 0.33 + 0.10/3, odd = 1/0.36333.. -> 2.75
        assert_eq!(odds.home, 2.75);
    }

    #[test]
    fn favorite_has_shorter_odds() {
        let odds = compute_odds(90.0, 60.0).unwrap();
        assert!(odds.home < odds.away);
    }

    #[test]
    fn all_odds_stay_in_band_across_strength_grid() {
        for h in 1..=100 {
            for a in (1..=100).step_by(7) {
                let odds = compute_odds(h as f64, a as f64).unwrap();
                for odd in [odds.home, odds.draw, odds.away] {
                    assert!(
                        (1.15..=45.0).contains(&odd),
                        "odd {odd} out of band for {h} vs {a}"
                    );
                }
            }
        }
    }

    #[test]
    fn gg_market_is_the_configured_pair() {
        let odds = compute_odds(82.0, 67.0).unwrap();
        assert_eq!(odds.gg, 1.75);
        assert_eq!(odds.nogg, 1.90);
    }

    #[test]
    fn extreme_gap_is_clamped_not_divergent() {
        // At 100 vs 1 the away probability goes negative, so the raw price
        // is garbage; the clamp pins both ends into the payable band.
        let odds = compute_odds(100.0, 1.0).unwrap();
        assert!(odds.home >= 1.15);
        assert!((1.15..=45.0).contains(&odds.away));
    }

    #[test]
    fn invalid_strengths_fail_fast() {
        assert!(compute_odds(f64::NAN, 70.0).is_err());
        assert!(compute_odds(70.0, f64::INFINITY).is_err());
        assert!(compute_odds(0.0, 70.0).is_err());
        assert!(compute_odds(70.0, 150.0).is_err());
    }
}
