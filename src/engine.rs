use std::collections::HashMap;
use std::env;
use std::sync::mpsc::{Receiver, Sender};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use rand::Rng;
use rusqlite::Connection;

use crate::ledger::{self, BetMarket};
use crate::odds::{MatchOdds, compute_odds};
use crate::projection::project;
use crate::result_gen::{MatchSpec, generate_result};
use crate::round::{Fixture, MatchStatus, PhaseDurations, Round, RoundPhase};
use crate::seed::{commit_digest, new_seed};
use crate::state::{Delta, EngineCommand, MatchRow, RoundView};
use crate::teams::{fixtures_for_round, team_abbr};

/// Build a fresh round: one shared client seed, per-match server seeds held
/// in the returned map (never ambient state), commitments published up
/// front, odds computed once and frozen.
pub fn build_round(
    round_no: u64,
    rng: &mut impl Rng,
) -> Result<(Round, HashMap<String, String>)> {
    let round_hash = new_seed(rng);
    let mut fixtures = Vec::new();
    let mut server_seeds = HashMap::new();

    for (home, away) in fixtures_for_round(round_no) {
        let match_id = format!("r{round_no}-{}v{}", home.abbr, away.abbr);
        let odds = compute_odds(home.strength, away.strength)
            .with_context(|| format!("odds for {match_id}"))?;
        let server_seed = new_seed(rng);
        let commit_hash = commit_digest(&server_seed);
        server_seeds.insert(match_id.clone(), server_seed);

        fixtures.push(Fixture {
            match_id,
            round_no,
            home_team_id: home.id,
            away_team_id: away.id,
            home_strength: home.strength,
            away_strength: away.strength,
            odds,
            status: MatchStatus::Scheduled,
            round_hash: round_hash.clone(),
            commit_hash,
            block_hash: None,
            result: None,
        });
    }

    Ok((
        Round {
            round_no,
            phase: RoundPhase::Betting,
            round_hash,
            fixtures,
        },
        server_seeds,
    ))
}

/// BETTING -> LIVE transition: assign block hashes and materialize every
/// match script exactly once. A fixture whose generation fails goes Void and
/// is skipped by settlement; the rest of the round proceeds.
pub fn go_live(
    round: &mut Round,
    server_seeds: &HashMap<String, String>,
    rng: &mut impl Rng,
) -> Vec<String> {
    round.phase = RoundPhase::Live;
    let mut voided = Vec::new();

    for fixture in &mut round.fixtures {
        let block_hash = new_seed(rng);
        fixture.block_hash = Some(block_hash.clone());

        let Some(server_seed) = server_seeds.get(&fixture.match_id) else {
            fixture.status = MatchStatus::Void;
            voided.push(fixture.match_id.clone());
            continue;
        };

        let spec = MatchSpec {
            match_id: fixture.match_id.clone(),
            home_team_id: fixture.home_team_id,
            away_team_id: fixture.away_team_id,
            home_strength: fixture.home_strength,
            away_strength: fixture.away_strength,
            round_hash: fixture.round_hash.clone(),
            block_hash,
        };
        match generate_result(&spec, server_seed) {
            Ok(result) => {
                fixture.result = Some(result);
                fixture.status = MatchStatus::Live;
            }
            Err(_) => {
                // Pure function: retrying the same inputs changes nothing.
                fixture.status = MatchStatus::Void;
                voided.push(fixture.match_id.clone());
            }
        }
    }

    voided
}

pub fn market_odds(odds: &MatchOdds, market: BetMarket) -> f64 {
    match market {
        BetMarket::Home => odds.home,
        BetMarket::Draw => odds.draw,
        BetMarket::Away => odds.away,
        BetMarket::Gg => odds.gg,
        BetMarket::Nogg => odds.nogg,
    }
}

pub fn match_row(fixture: &Fixture, minute: u8, home: u8, away: u8) -> MatchRow {
    MatchRow {
        match_id: fixture.match_id.clone(),
        home_id: fixture.home_team_id,
        away_id: fixture.away_team_id,
        home_abbr: team_abbr(fixture.home_team_id).to_string(),
        away_abbr: team_abbr(fixture.away_team_id).to_string(),
        odds: fixture.odds,
        status: fixture.status,
        minute,
        home_score: home,
        away_score: away,
        commit_hash: fixture.commit_hash.clone(),
        block_hash: fixture.block_hash.clone(),
        revealed_seed: None,
        summary: None,
    }
}

pub fn spawn_engine(tx: Sender<Delta>, cmd_rx: Receiver<EngineCommand>) {
    thread::spawn(move || {
        let mut conn = match open_ledger() {
            Ok(conn) => conn,
            Err(err) => {
                let _ = tx.send(Delta::Log(format!("[WARN] Ledger unavailable: {err}")));
                return;
            }
        };

        let durations = PhaseDurations::from_env();
        let tick = Duration::from_millis(
            env::var("VFL_TICK_MS")
                .ok()
                .and_then(|val| val.parse::<u64>().ok())
                .unwrap_or(1_000)
                .max(100),
        );

        let mut rng = rand::thread_rng();
        let mut round_no: u64 = 0;
        let (mut round, mut server_seeds) = match build_round(round_no, &mut rng) {
            Ok(pair) => pair,
            Err(err) => {
                let _ = tx.send(Delta::Log(format!("[WARN] Round build failed: {err}")));
                return;
            }
        };
        announce_round(&tx, &round, durations.betting);
        push_ledger_views(&tx, &conn);

        let mut phase_started = Instant::now();
        // Per match, how many script events the UI has been shown.
        let mut revealed: HashMap<String, usize> = HashMap::new();

        loop {
            thread::sleep(tick);

            while let Ok(cmd) = cmd_rx.try_recv() {
                handle_command(cmd, &round, &mut conn, &tx);
            }

            let phase_len = durations.for_phase(round.phase);
            let elapsed = phase_started.elapsed();
            let remaining = phase_len.saturating_sub(elapsed);
            let _ = tx.send(Delta::SetRound(RoundView {
                round_no: round.round_no,
                phase: round.phase,
                remaining_secs: remaining.as_secs(),
                round_hash: round.round_hash.clone(),
            }));

            if round.phase == RoundPhase::Live {
                let fraction =
                    elapsed.as_secs_f64() / durations.live.as_secs_f64();
                stream_live(&tx, &round, fraction, &mut revealed);
            }

            if elapsed < phase_len {
                continue;
            }

            // Phase countdown expired: advance the machine.
            match round.phase {
                RoundPhase::Betting => {
                    let voided = go_live(&mut round, &server_seeds, &mut rng);
                    for match_id in &voided {
                        match ledger::void_match(&mut conn, match_id) {
                            Ok(n) => {
                                let _ = tx.send(Delta::Log(format!(
                                    "[WARN] {match_id} void, {n} bets refunded"
                                )));
                            }
                            Err(err) => {
                                let _ = tx.send(Delta::Log(format!(
                                    "[WARN] Void refund failed for {match_id}: {err}"
                                )));
                            }
                        }
                    }
                    for fixture in &round.fixtures {
                        let _ = tx.send(Delta::UpsertMatch(match_row(fixture, 0, 0, 0)));
                    }
                    let _ = tx.send(Delta::Log(format!(
                        "[INFO] Round {} live, scripts locked in",
                        round.round_no
                    )));
                    if !voided.is_empty() {
                        push_ledger_views(&tx, &conn);
                    }
                }
                RoundPhase::Live => {
                    round.phase = RoundPhase::Result;
                    finish_round(&tx, &mut round, &server_seeds, &mut conn);
                }
                RoundPhase::Result => {
                    round_no += 1;
                    match build_round(round_no, &mut rng) {
                        Ok((next, seeds)) => {
                            round = next;
                            server_seeds = seeds;
                            revealed.clear();
                            announce_round(&tx, &round, durations.betting);
                        }
                        Err(err) => {
                            let _ = tx.send(Delta::Log(format!(
                                "[WARN] Round build failed: {err}"
                            )));
                        }
                    }
                }
            }
            phase_started = Instant::now();
        }
    });
}

fn open_ledger() -> Result<Connection> {
    let Some(path) = ledger::default_db_path() else {
        bail!("no writable ledger path (set VFL_DB_PATH)");
    };
    let conn = ledger::open_db(&path)?;
    let start_coins = env::var("VFL_START_COINS")
        .ok()
        .and_then(|val| val.parse::<i64>().ok())
        .unwrap_or(ledger::DEFAULT_START_COINS)
        .max(0);
    ledger::ensure_balance(&conn, start_coins)?;
    Ok(conn)
}

fn announce_round(tx: &Sender<Delta>, round: &Round, betting: Duration) {
    let _ = tx.send(Delta::SetRound(RoundView {
        round_no: round.round_no,
        phase: round.phase,
        remaining_secs: betting.as_secs(),
        round_hash: round.round_hash.clone(),
    }));
    let rows = round
        .fixtures
        .iter()
        .map(|f| match_row(f, 0, 0, 0))
        .collect();
    let _ = tx.send(Delta::SetMatches(rows));
    let _ = tx.send(Delta::Log(format!(
        "[INFO] Round {} open for bets, client seed {}",
        round.round_no,
        short_hash(&round.round_hash)
    )));
}

/// Sample every live script at the current elapsed fraction and stream the
/// not-yet-shown prefix of each event tape.
fn stream_live(
    tx: &Sender<Delta>,
    round: &Round,
    fraction: f64,
    revealed: &mut HashMap<String, usize>,
) {
    for fixture in &round.fixtures {
        let Some(result) = &fixture.result else {
            continue;
        };
        let snap = project(result, fixture.home_team_id, fraction);

        let shown = revealed.entry(fixture.match_id.clone()).or_insert(0);
        if snap.visible_events > *shown {
            for event in &result.events[*shown..snap.visible_events] {
                let _ = tx.send(Delta::AddEvent {
                    id: fixture.match_id.clone(),
                    event: event.clone(),
                });
            }
            *shown = snap.visible_events;
        }

        let _ = tx.send(Delta::UpsertMatch(match_row(
            fixture,
            snap.minute,
            snap.home_score,
            snap.away_score,
        )));
    }
}

/// LIVE -> RESULT: reveal server seeds and settle each decided match once.
/// Settlement is idempotent per match id, so a duplicate pass cannot pay
/// twice.
fn finish_round(
    tx: &Sender<Delta>,
    round: &mut Round,
    server_seeds: &HashMap<String, String>,
    conn: &mut Connection,
) {
    for fixture in &mut round.fixtures {
        let Some(result) = fixture.result.clone() else {
            continue;
        };
        fixture.status = MatchStatus::Finished;

        let mut row = match_row(fixture, 90, result.home_score, result.away_score);
        row.revealed_seed = server_seeds.get(&fixture.match_id).cloned();
        row.summary = Some(result.summary.clone());
        let _ = tx.send(Delta::UpsertMatch(row));

        match ledger::settle_match(conn, &fixture.match_id, &result) {
            Ok(outcome) if !outcome.already_settled => {
                let _ = tx.send(Delta::Log(format!(
                    "[ALERT] {} {} | {} bets, {} coins paid",
                    fixture.match_id, result.summary, outcome.bets_settled, outcome.payout_total
                )));
            }
            Ok(_) => {}
            Err(err) => {
                let _ = tx.send(Delta::Log(format!(
                    "[WARN] Settlement failed for {}: {err}",
                    fixture.match_id
                )));
            }
        }
    }
    push_ledger_views(tx, conn);
}

fn handle_command(
    cmd: EngineCommand,
    round: &Round,
    conn: &mut Connection,
    tx: &Sender<Delta>,
) {
    match cmd {
        EngineCommand::PlaceBet {
            match_id,
            market,
            stake,
        } => {
            if round.phase != RoundPhase::Betting {
                let _ = tx.send(Delta::Log(
                    "[WARN] Bets only accepted during the betting window".to_string(),
                ));
                return;
            }
            let Some(fixture) = round.fixtures.iter().find(|f| f.match_id == match_id) else {
                let _ = tx.send(Delta::Log(format!(
                    "[WARN] Unknown match {match_id} for bet"
                )));
                return;
            };
            let odds = market_odds(&fixture.odds, market);
            match ledger::place_bet(conn, &match_id, market, stake, odds) {
                Ok(_) => {
                    let _ = tx.send(Delta::Log(format!(
                        "[INFO] Bet {stake} on {} @ {odds:.2} ({match_id})",
                        market.as_str()
                    )));
                }
                Err(err) => {
                    let _ = tx.send(Delta::Log(format!("[WARN] Bet rejected: {err}")));
                }
            }
            push_ledger_views(tx, conn);
        }
        EngineCommand::ConvertCoins => {
            match ledger::convert_coins(conn) {
                Ok((tokens, spent)) if tokens > 0 => {
                    let _ = tx.send(Delta::Log(format!(
                        "[INFO] Converted {spent} coins into {tokens} tokens"
                    )));
                }
                Ok(_) => {
                    let _ = tx.send(Delta::Log(format!(
                        "[INFO] Not enough coins to convert (unit {})",
                        ledger::COINS_PER_TOKEN
                    )));
                }
                Err(err) => {
                    let _ = tx.send(Delta::Log(format!("[WARN] Conversion failed: {err}")));
                }
            }
            push_ledger_views(tx, conn);
        }
    }
}

fn push_ledger_views(tx: &Sender<Delta>, conn: &Connection) {
    if let Ok((coins, tokens)) = ledger::balances(conn) {
        let _ = tx.send(Delta::SetBalance { coins, tokens });
    }
    if let Ok(bets) = ledger::recent_bets(conn, 20) {
        let _ = tx.send(Delta::SetBets(bets));
    }
}

fn short_hash(hash: &str) -> String {
    if hash.len() > 12 {
        format!("{}..", &hash[..12])
    } else {
        hash.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn build_round_freezes_odds_and_commits() {
        let mut rng = StdRng::seed_from_u64(7);
        let (round, seeds) = build_round(0, &mut rng).unwrap();

        assert_eq!(round.phase, RoundPhase::Betting);
        assert_eq!(round.fixtures.len(), seeds.len());
        for fixture in &round.fixtures {
            assert_eq!(fixture.status, MatchStatus::Scheduled);
            assert_eq!(fixture.round_hash, round.round_hash);
            assert!(fixture.block_hash.is_none());
            assert!(fixture.result.is_none());
            // Commitment binds the hidden seed.
            let server_seed = &seeds[&fixture.match_id];
            assert_eq!(fixture.commit_hash, commit_digest(server_seed));
            assert_ne!(&fixture.commit_hash, server_seed);
        }
    }

    #[test]
    fn go_live_generates_every_script_once() {
        let mut rng = StdRng::seed_from_u64(7);
        let (mut round, seeds) = build_round(3, &mut rng).unwrap();
        let voided = go_live(&mut round, &seeds, &mut rng);

        assert!(voided.is_empty());
        assert_eq!(round.phase, RoundPhase::Live);
        for fixture in &round.fixtures {
            assert_eq!(fixture.status, MatchStatus::Live);
            let result = fixture.result.as_ref().unwrap();
            assert_eq!(result.server_seed, seeds[&fixture.match_id]);
            // The attached script is re-derivable from public data + seed.
            let spec = MatchSpec {
                match_id: fixture.match_id.clone(),
                home_team_id: fixture.home_team_id,
                away_team_id: fixture.away_team_id,
                home_strength: fixture.home_strength,
                away_strength: fixture.away_strength,
                round_hash: fixture.round_hash.clone(),
                block_hash: fixture.block_hash.clone().unwrap(),
            };
            let audit = generate_result(&spec, &result.server_seed).unwrap();
            assert_eq!(&audit, result);
        }
    }

    #[test]
    fn missing_server_seed_voids_the_fixture() {
        let mut rng = StdRng::seed_from_u64(7);
        let (mut round, _) = build_round(0, &mut rng).unwrap();
        let voided = go_live(&mut round, &HashMap::new(), &mut rng);
        assert_eq!(voided.len(), round.fixtures.len());
        assert!(
            round
                .fixtures
                .iter()
                .all(|f| f.status == MatchStatus::Void)
        );
    }

    #[test]
    fn market_odds_picks_the_right_leg() {
        let odds = MatchOdds {
            home: 1.80,
            draw: 3.20,
            away: 4.10,
            gg: 1.75,
            nogg: 1.90,
        };
        assert_eq!(market_odds(&odds, BetMarket::Home), 1.80);
        assert_eq!(market_odds(&odds, BetMarket::Draw), 3.20);
        assert_eq!(market_odds(&odds, BetMarket::Away), 4.10);
        assert_eq!(market_odds(&odds, BetMarket::Gg), 1.75);
        assert_eq!(market_odds(&odds, BetMarket::Nogg), 1.90);
    }
}
