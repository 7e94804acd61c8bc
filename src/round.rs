use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::odds::MatchOdds;
use crate::result_gen::MatchResult;

/// Coarse round cycle. Advanced one way only, then wraps to a fresh round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoundPhase {
    Betting,
    Live,
    Result,
}

impl RoundPhase {
    pub fn label(self) -> &'static str {
        match self {
            RoundPhase::Betting => "BETTING",
            RoundPhase::Live => "LIVE",
            RoundPhase::Result => "RESULT",
        }
    }
}

/// Linear match lifecycle, no back-transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchStatus {
    Scheduled,
    Live,
    Finished,
    /// Result generation failed; excluded from settlement.
    Void,
}

/// One fixture inside a round. Odds are computed once at creation and never
/// move; `block_hash` and `result` only appear at the go-live transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fixture {
    pub match_id: String,
    pub round_no: u64,
    pub home_team_id: u32,
    pub away_team_id: u32,
    pub home_strength: f64,
    pub away_strength: f64,
    pub odds: MatchOdds,
    pub status: MatchStatus,
    /// Client seed, shared across the round, public from creation.
    pub round_hash: String,
    /// sha256 of the server seed, public from creation; the server seed
    /// itself stays engine-side until the match is decided.
    pub commit_hash: String,
    pub block_hash: Option<String>,
    pub result: Option<MatchResult>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Round {
    pub round_no: u64,
    pub phase: RoundPhase,
    pub round_hash: String,
    pub fixtures: Vec<Fixture>,
}

/// Phase countdowns. Defaults 240/120/240 s, overridable through the
/// environment for demos and tests.
#[derive(Debug, Clone, Copy)]
pub struct PhaseDurations {
    pub betting: Duration,
    pub live: Duration,
    pub result: Duration,
}

impl Default for PhaseDurations {
    fn default() -> Self {
        Self {
            betting: Duration::from_secs(240),
            live: Duration::from_secs(120),
            result: Duration::from_secs(240),
        }
    }
}

impl PhaseDurations {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            betting: secs_env("VFL_BET_SECS", default.betting),
            live: secs_env("VFL_LIVE_SECS", default.live),
            result: secs_env("VFL_RESULT_SECS", default.result),
        }
    }

    pub fn for_phase(&self, phase: RoundPhase) -> Duration {
        match phase {
            RoundPhase::Betting => self.betting,
            RoundPhase::Live => self.live,
            RoundPhase::Result => self.result,
        }
    }
}

fn secs_env(key: &str, default: Duration) -> Duration {
    Duration::from_secs(
        env::var(key)
            .ok()
            .and_then(|val| val.parse::<u64>().ok())
            .unwrap_or(default.as_secs())
            .max(5),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_durations_have_sane_defaults() {
        let d = PhaseDurations::default();
        assert_eq!(d.betting.as_secs(), 240);
        assert_eq!(d.live.as_secs(), 120);
        assert_eq!(d.result.as_secs(), 240);
        assert_eq!(d.for_phase(RoundPhase::Live), d.live);
    }
}
