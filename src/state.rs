use std::collections::{HashMap, VecDeque};

use serde::{Deserialize, Serialize};

use crate::ledger::{BetMarket, BetRow};
use crate::odds::MatchOdds;
use crate::result_gen::MatchEvent;
use crate::round::{MatchStatus, RoundPhase};

const MAX_LOGS: usize = 200;
const MIN_STAKE: i64 = 10;
const MAX_STAKE: i64 = 1_000;
const STAKE_STEP: i64 = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Screen {
    Pulse,
    Terminal { match_id: Option<String> },
}

/// Round header as the UI sees it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundView {
    pub round_no: u64,
    pub phase: RoundPhase,
    pub remaining_secs: u64,
    pub round_hash: String,
}

/// One fixture row. During LIVE the score/minute fields carry the projected
/// (partially revealed) state, not the final result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchRow {
    pub match_id: String,
    pub home_id: u32,
    pub away_id: u32,
    pub home_abbr: String,
    pub away_abbr: String,
    pub odds: MatchOdds,
    pub status: MatchStatus,
    pub minute: u8,
    pub home_score: u8,
    pub away_score: u8,
    pub commit_hash: String,
    pub block_hash: Option<String>,
    /// Server seed, disclosed only once the match is decided.
    pub revealed_seed: Option<String>,
    pub summary: Option<String>,
}

#[derive(Debug, Clone)]
pub enum Delta {
    SetRound(RoundView),
    SetMatches(Vec<MatchRow>),
    UpsertMatch(MatchRow),
    AddEvent { id: String, event: MatchEvent },
    SetBets(Vec<BetRow>),
    SetBalance { coins: i64, tokens: i64 },
    Log(String),
}

/// Requests from the UI thread to the engine thread.
#[derive(Debug, Clone)]
pub enum EngineCommand {
    PlaceBet {
        match_id: String,
        market: BetMarket,
        stake: i64,
    },
    ConvertCoins,
}

pub struct AppState {
    pub screen: Screen,
    pub round: Option<RoundView>,
    pub matches: Vec<MatchRow>,
    pub events: HashMap<String, Vec<MatchEvent>>,
    pub bets: Vec<BetRow>,
    pub coins: i64,
    pub tokens: i64,
    pub selected: usize,
    pub stake: i64,
    pub help_overlay: bool,
    pub logs: VecDeque<String>,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            screen: Screen::Pulse,
            round: None,
            matches: Vec::new(),
            events: HashMap::new(),
            bets: Vec::new(),
            coins: 0,
            tokens: 0,
            selected: 0,
            stake: 50,
            help_overlay: false,
            logs: VecDeque::new(),
        }
    }

    pub fn push_log(&mut self, msg: impl Into<String>) {
        self.logs.push_back(msg.into());
        while self.logs.len() > MAX_LOGS {
            self.logs.pop_front();
        }
    }

    pub fn selected_match(&self) -> Option<&MatchRow> {
        self.matches.get(self.selected)
    }

    pub fn selected_match_id(&self) -> Option<String> {
        self.selected_match().map(|m| m.match_id.clone())
    }

    /// Match shown on the terminal screen: the one pinned when the screen was
    /// opened, so card updates that reshuffle the list or the selection do
    /// not switch the tape. Falls back to the list selection when the pinned
    /// match is gone.
    pub fn focused_match(&self) -> Option<&MatchRow> {
        if let Screen::Terminal { match_id: Some(id) } = &self.screen {
            if let Some(m) = self.matches.iter().find(|m| m.match_id == *id) {
                return Some(m);
            }
        }
        self.selected_match()
    }

    pub fn select_next(&mut self) {
        if self.matches.is_empty() {
            return;
        }
        self.selected = (self.selected + 1).min(self.matches.len() - 1);
    }

    pub fn select_prev(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    pub fn clamp_selection(&mut self) {
        if self.matches.is_empty() {
            self.selected = 0;
        } else if self.selected >= self.matches.len() {
            self.selected = self.matches.len() - 1;
        }
    }

    pub fn raise_stake(&mut self) {
        self.stake = (self.stake + STAKE_STEP).min(MAX_STAKE);
    }

    pub fn lower_stake(&mut self) {
        self.stake = (self.stake - STAKE_STEP).max(MIN_STAKE);
    }

    pub fn betting_open(&self) -> bool {
        matches!(
            self.round,
            Some(RoundView {
                phase: RoundPhase::Betting,
                ..
            })
        )
    }

    pub fn events_for(&self, match_id: &str) -> &[MatchEvent] {
        self.events
            .get(match_id)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

pub fn apply_delta(state: &mut AppState, delta: Delta) {
    match delta {
        Delta::SetRound(round) => {
            state.round = Some(round);
        }
        Delta::SetMatches(matches) => {
            // A new card means the old event tapes are stale.
            state
                .events
                .retain(|id, _| matches.iter().any(|m| m.match_id == *id));
            state.matches = matches;
            state.clamp_selection();
        }
        Delta::UpsertMatch(row) => {
            if let Some(existing) = state
                .matches
                .iter_mut()
                .find(|m| m.match_id == row.match_id)
            {
                *existing = row;
            } else {
                state.matches.push(row);
            }
        }
        Delta::AddEvent { id, event } => {
            state.events.entry(id).or_default().push(event);
        }
        Delta::SetBets(bets) => {
            state.bets = bets;
        }
        Delta::SetBalance { coins, tokens } => {
            state.coins = coins;
            state.tokens = tokens;
        }
        Delta::Log(line) => {
            state.push_log(line);
        }
    }
}
