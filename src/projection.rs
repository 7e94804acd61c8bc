use serde::{Deserialize, Serialize};

use crate::result_gen::{EventKind, FULL_TIME_MINUTE, MatchResult};

/// What the UI shows at a point inside the live window. Recomputed from the
/// pre-generated script on every tick; never a source of new randomness.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveSnapshot {
    pub minute: u8,
    pub home_score: u8,
    pub away_score: u8,
    /// How many events from the script are visible so far.
    pub visible_events: usize,
}

/// Sample a pre-computed script at elapsed-time fraction `p` in [0,1].
/// Displayed minute is floor(p * 90); the score counts goals up to and
/// including that minute.
pub fn project(result: &MatchResult, home_team_id: u32, fraction: f64) -> LiveSnapshot {
    let p = fraction.clamp(0.0, 1.0);
    let minute = (p * FULL_TIME_MINUTE as f64).floor() as u8;

    let mut home_score = 0u8;
    let mut away_score = 0u8;
    let mut visible_events = 0usize;
    for event in &result.events {
        if event.minute > minute {
            break;
        }
        visible_events += 1;
        if event.kind == EventKind::Goal {
            if event.team_id == Some(home_team_id) {
                home_score += 1;
            } else {
                away_score += 1;
            }
        }
    }

    LiveSnapshot {
        minute,
        home_score,
        away_score,
        visible_events,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result_gen::{MatchEvent, MatchResult};

    fn scripted() -> MatchResult {
        let ev = |minute, kind, team_id| MatchEvent {
            minute,
            kind,
            team_id,
            description: String::new(),
        };
        MatchResult {
            home_score: 2,
            away_score: 1,
            summary: "FT: 2-1".to_string(),
            server_seed: format!("0x{}", "c".repeat(64)),
            events: vec![
                ev(1, EventKind::Whistle, None),
                ev(12, EventKind::Goal, Some(1)),
                ev(40, EventKind::Goal, Some(2)),
                ev(41, EventKind::YellowCard, Some(2)),
                ev(88, EventKind::Goal, Some(1)),
                ev(90, EventKind::Whistle, None),
            ],
        }
    }

    #[test]
    fn scores_reveal_incrementally() {
        let result = scripted();
        let at = |p| project(&result, 1, p);

        assert_eq!(at(0.0).minute, 0);
        assert_eq!((at(0.0).home_score, at(0.0).away_score), (0, 0));

        // 0.5 * 90 = minute 45: both opening goals visible, late one not.
        let mid = at(0.5);
        assert_eq!(mid.minute, 45);
        assert_eq!((mid.home_score, mid.away_score), (1, 1));
        assert_eq!(mid.visible_events, 4);

        let full = at(1.0);
        assert_eq!(full.minute, 90);
        assert_eq!((full.home_score, full.away_score), (2, 1));
        assert_eq!(full.visible_events, result.events.len());
    }

    #[test]
    fn projection_is_idempotent() {
        let result = scripted();
        let a = project(&result, 1, 0.37);
        let b = project(&result, 1, 0.37);
        assert_eq!(a, b);
    }

    #[test]
    fn fraction_is_clamped() {
        let result = scripted();
        assert_eq!(project(&result, 1, -0.5).minute, 0);
        assert_eq!(project(&result, 1, 7.0).minute, 90);
    }

    #[test]
    fn full_window_matches_final_score() {
        let result = scripted();
        let snap = project(&result, 1, 1.0);
        assert_eq!(snap.home_score, result.home_score);
        assert_eq!(snap.away_score, result.away_score);
    }
}
