use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::odds::validate_strength;
use crate::seed::{unit_draw, validate_seed};

const GOAL_P: f64 = 0.042;
const INJURY_OVER: f64 = 0.987;
const CARD_OVER: f64 = 0.970;
const CHANCE_OVER: f64 = 0.945;
const RED_CARD_OVER: f64 = 0.85;
/// Comeback bias applied to the trailing side's strength.
const MOMENTUM: f64 = 1.15;

pub const FULL_TIME_MINUTE: u8 = 90;

/// Immutable description of a fixture as the generator sees it. The
/// generator never writes back into this; it only returns a new result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchSpec {
    pub match_id: String,
    pub home_team_id: u32,
    pub away_team_id: u32,
    pub home_strength: f64,
    pub away_strength: f64,
    /// Client seed, shared by every match in the round.
    pub round_hash: String,
    /// Extra entropy assigned at the go-live transition.
    pub block_hash: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    Whistle,
    Goal,
    YellowCard,
    RedCard,
    Injury,
    Chance,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchEvent {
    pub minute: u8,
    pub kind: EventKind,
    /// Set for team-scoped events (goals, cards, chances).
    pub team_id: Option<u32>,
    pub description: String,
}

/// Immutable once generated. `server_seed` rides along so it can be revealed
/// after the match is decided and the whole script re-derived by anyone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResult {
    pub home_score: u8,
    pub away_score: u8,
    pub events: Vec<MatchEvent>,
    pub summary: String,
    pub server_seed: String,
}

/// Materialize the full 90-minute script for one match. Deterministic over
/// (round_hash, block_hash, server_seed, strengths): the same tuple always
/// reproduces the identical score and event sequence, which is what lets a
/// revealed seed be audited after the fact.
pub fn generate_result(spec: &MatchSpec, server_seed: &str) -> Result<MatchResult> {
    validate_strength("home", spec.home_strength)?;
    validate_strength("away", spec.away_strength)?;
    validate_seed("round", &spec.round_hash)?;
    validate_seed("block", &spec.block_hash)?;
    validate_seed("server", server_seed)?;

    let mut home_score: u8 = 0;
    let mut away_score: u8 = 0;
    let mut events = Vec::with_capacity(16);

    events.push(MatchEvent {
        minute: 1,
        kind: EventKind::Whistle,
        team_id: None,
        description: "Kick-off".to_string(),
    });

    for minute in 1..=FULL_TIME_MINUTE {
        let payload = format!("{}:{}:{}", spec.round_hash, spec.block_hash, minute);
        let rand = unit_draw(server_seed, &payload);

        // Trailing side gets the momentum multiplier for this minute only.
        let home_momentum = if home_score < away_score { MOMENTUM } else { 1.0 };
        let away_momentum = if away_score < home_score { MOMENTUM } else { 1.0 };
        let home_weight = spec.home_strength * home_momentum;
        let away_weight = spec.away_strength * away_momentum;
        let home_share = home_weight / (home_weight + away_weight);

        // Bands are checked highest threshold first and are mutually
        // exclusive: at most one outcome per minute.
        if rand < GOAL_P {
            let scorer = unit_draw(server_seed, &format!("{payload}:scorer"));
            let (team_id, side) = if scorer < home_share {
                home_score += 1;
                (spec.home_team_id, "home")
            } else {
                away_score += 1;
                (spec.away_team_id, "away")
            };
            events.push(MatchEvent {
                minute,
                kind: EventKind::Goal,
                team_id: Some(team_id),
                description: format!("Goal ({side}) {home_score}-{away_score}"),
            });
        } else if rand > INJURY_OVER {
            events.push(MatchEvent {
                minute,
                kind: EventKind::Injury,
                team_id: None,
                description: "Injury break".to_string(),
            });
        } else if rand > CARD_OVER {
            let card = unit_draw(server_seed, &format!("{payload}:card"));
            let kind = if card > RED_CARD_OVER {
                EventKind::RedCard
            } else {
                EventKind::YellowCard
            };
            let team_id = if card > 0.5 {
                spec.home_team_id
            } else {
                spec.away_team_id
            };
            let label = match kind {
                EventKind::RedCard => "Red card",
                _ => "Yellow card",
            };
            events.push(MatchEvent {
                minute,
                kind,
                team_id: Some(team_id),
                description: label.to_string(),
            });
        } else if rand > CHANCE_OVER {
            let side = unit_draw(server_seed, &format!("{payload}:chance"));
            let team_id = if side < home_share {
                spec.home_team_id
            } else {
                spec.away_team_id
            };
            events.push(MatchEvent {
                minute,
                kind: EventKind::Chance,
                team_id: Some(team_id),
                description: "Big chance goes begging".to_string(),
            });
        }
    }

    events.push(MatchEvent {
        minute: FULL_TIME_MINUTE,
        kind: EventKind::Whistle,
        team_id: None,
        description: "Full-time".to_string(),
    });

    Ok(MatchResult {
        home_score,
        away_score,
        summary: format!("FT: {home_score}-{away_score}"),
        events,
        server_seed: server_seed.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> MatchSpec {
        MatchSpec {
            match_id: "m1".to_string(),
            home_team_id: 10,
            away_team_id: 20,
            home_strength: 75.0,
            away_strength: 75.0,
            round_hash: format!("0x{}", "a".repeat(64)),
            block_hash: format!("0x{}", "b".repeat(64)),
        }
    }

    fn server_seed() -> String {
        format!("0x{}", "c".repeat(64))
    }

    #[test]
    fn identical_inputs_reproduce_identical_scripts() {
        let spec = spec();
        let seed = server_seed();
        let a = generate_result(&spec, &seed).unwrap();
        let b = generate_result(&spec, &seed).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn different_server_seed_changes_the_script() {
        let spec = spec();
        let a = generate_result(&spec, &server_seed()).unwrap();
        let b = generate_result(&spec, &format!("0x{}", "d".repeat(64))).unwrap();
        assert_ne!(a.events, b.events);
    }

    #[test]
    fn events_open_with_kickoff_and_close_with_full_time() {
        let result = generate_result(&spec(), &server_seed()).unwrap();
        let first = result.events.first().unwrap();
        let last = result.events.last().unwrap();
        assert_eq!(first.minute, 1);
        assert_eq!(first.kind, EventKind::Whistle);
        assert_eq!(last.minute, 90);
        assert_eq!(last.kind, EventKind::Whistle);
    }

    #[test]
    fn minutes_are_non_decreasing() {
        let result = generate_result(&spec(), &server_seed()).unwrap();
        for pair in result.events.windows(2) {
            assert!(pair[0].minute <= pair[1].minute);
        }
    }

    #[test]
    fn score_matches_goal_events_per_side() {
        let spec = spec();
        let result = generate_result(&spec, &server_seed()).unwrap();
        let home_goals = result
            .events
            .iter()
            .filter(|e| e.kind == EventKind::Goal && e.team_id == Some(spec.home_team_id))
            .count() as u8;
        let away_goals = result
            .events
            .iter()
            .filter(|e| e.kind == EventKind::Goal && e.team_id == Some(spec.away_team_id))
            .count() as u8;
        assert_eq!(result.home_score, home_goals);
        assert_eq!(result.away_score, away_goals);
        assert_eq!(
            result.summary,
            format!("FT: {}-{}", result.home_score, result.away_score)
        );
    }

    #[test]
    fn malformed_input_fails_without_partial_result() {
        let mut bad = spec();
        bad.home_strength = f64::NAN;
        assert!(generate_result(&bad, &server_seed()).is_err());

        let mut bad = spec();
        bad.round_hash = String::new();
        assert!(generate_result(&bad, &server_seed()).is_err());

        assert!(generate_result(&spec(), "not-a-seed").is_err());
    }
}
