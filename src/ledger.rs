use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};

use crate::result_gen::MatchResult;

/// Coins per token for the exchange. Anything below one full unit converts
/// to nothing and stays in the coin balance.
pub const COINS_PER_TOKEN: i64 = 100;

pub const DEFAULT_START_COINS: i64 = 1_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BetMarket {
    Home,
    Draw,
    Away,
    Gg,
    Nogg,
}

impl BetMarket {
    pub fn as_str(self) -> &'static str {
        match self {
            BetMarket::Home => "home",
            BetMarket::Draw => "draw",
            BetMarket::Away => "away",
            BetMarket::Gg => "gg",
            BetMarket::Nogg => "nogg",
        }
    }

    pub fn parse(raw: &str) -> Result<Self> {
        Ok(match raw {
            "home" => BetMarket::Home,
            "draw" => BetMarket::Draw,
            "away" => BetMarket::Away,
            "gg" => BetMarket::Gg,
            "nogg" => BetMarket::Nogg,
            other => bail!("unknown bet market {other:?}"),
        })
    }

    /// Settle this market against a final score.
    pub fn wins(self, home_score: u8, away_score: u8) -> bool {
        match self {
            BetMarket::Home => home_score > away_score,
            BetMarket::Draw => home_score == away_score,
            BetMarket::Away => home_score < away_score,
            BetMarket::Gg => home_score > 0 && away_score > 0,
            BetMarket::Nogg => home_score == 0 || away_score == 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BetRow {
    pub bet_id: i64,
    pub match_id: String,
    pub market: BetMarket,
    pub stake: i64,
    pub odds: f64,
    pub status: String,
    pub payout: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettleOutcome {
    pub already_settled: bool,
    pub bets_settled: usize,
    pub payout_total: i64,
}

pub fn default_db_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("VFL_DB_PATH") {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }
    if let Ok(base) = std::env::var("XDG_CACHE_HOME") {
        if !base.trim().is_empty() {
            return Some(
                PathBuf::from(base)
                    .join("vfl_terminal")
                    .join("ledger.sqlite"),
            );
        }
    }
    let home = std::env::var("HOME").ok()?;
    if home.trim().is_empty() {
        return None;
    }
    Some(
        PathBuf::from(home)
            .join(".cache")
            .join("vfl_terminal")
            .join("ledger.sqlite"),
    )
}

pub fn open_db(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    let conn =
        Connection::open(path).with_context(|| format!("open sqlite db {}", path.display()))?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory().context("open in-memory sqlite db")?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA journal_mode = WAL;
        CREATE TABLE IF NOT EXISTS balance (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            coins INTEGER NOT NULL,
            tokens INTEGER NOT NULL
        );
        CREATE TABLE IF NOT EXISTS bets (
            bet_id INTEGER PRIMARY KEY AUTOINCREMENT,
            match_id TEXT NOT NULL,
            market TEXT NOT NULL,
            stake INTEGER NOT NULL,
            odds REAL NOT NULL,
            status TEXT NOT NULL,
            payout INTEGER NOT NULL DEFAULT 0,
            placed_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_bets_match ON bets(match_id);
        CREATE INDEX IF NOT EXISTS idx_bets_status ON bets(status);
        CREATE TABLE IF NOT EXISTS settlements (
            match_id TEXT PRIMARY KEY,
            home_goals INTEGER NULL,
            away_goals INTEGER NULL,
            events_json TEXT NULL,
            voided INTEGER NOT NULL DEFAULT 0,
            settled_at TEXT NOT NULL
        );
        "#,
    )
    .context("create ledger schema")?;
    Ok(())
}

pub fn ensure_balance(conn: &Connection, start_coins: i64) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO balance (id, coins, tokens) VALUES (1, ?1, 0)",
        params![start_coins],
    )
    .context("seed balance row")?;
    Ok(())
}

pub fn balances(conn: &Connection) -> Result<(i64, i64)> {
    conn.query_row("SELECT coins, tokens FROM balance WHERE id = 1", [], |row| {
        Ok((row.get(0)?, row.get(1)?))
    })
    .context("read balance")
}

/// Record a bet against frozen odds and debit the stake, atomically. Only
/// callable while the fixture's betting window is open; the engine enforces
/// the phase.
pub fn place_bet(
    conn: &mut Connection,
    match_id: &str,
    market: BetMarket,
    stake: i64,
    odds: f64,
) -> Result<i64> {
    if stake <= 0 {
        bail!("stake must be positive, got {stake}");
    }
    let tx = conn.transaction().context("begin bet tx")?;
    let coins: i64 = tx
        .query_row("SELECT coins FROM balance WHERE id = 1", [], |row| {
            row.get(0)
        })
        .context("read coins")?;
    if coins < stake {
        bail!("insufficient coins: have {coins}, need {stake}");
    }

    tx.execute(
        "UPDATE balance SET coins = coins - ?1 WHERE id = 1",
        params![stake],
    )
    .context("debit stake")?;
    tx.execute(
        "INSERT INTO bets (match_id, market, stake, odds, status, placed_at)
         VALUES (?1, ?2, ?3, ?4, 'open', ?5)",
        params![
            match_id,
            market.as_str(),
            stake,
            odds,
            Utc::now().to_rfc3339()
        ],
    )
    .context("insert bet")?;
    let bet_id = tx.last_insert_rowid();
    tx.commit().context("commit bet")?;
    Ok(bet_id)
}

/// Settle every open bet on a decided match. Idempotent per match id: the
/// settlements row is the guard, so duplicate timer fires or retries are
/// safe no-ops and can never double-pay.
pub fn settle_match(
    conn: &mut Connection,
    match_id: &str,
    result: &MatchResult,
) -> Result<SettleOutcome> {
    let tx = conn.transaction().context("begin settlement tx")?;

    // The full event tape rides along for post-hoc audits of revealed seeds.
    let events_json = serde_json::to_string(&result.events).context("serialize event tape")?;
    let inserted = tx
        .execute(
            "INSERT OR IGNORE INTO settlements
                 (match_id, home_goals, away_goals, events_json, settled_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                match_id,
                result.home_score,
                result.away_score,
                events_json,
                Utc::now().to_rfc3339()
            ],
        )
        .context("insert settlement")?;
    if inserted == 0 {
        tx.commit().context("commit settlement")?;
        return Ok(SettleOutcome {
            already_settled: true,
            bets_settled: 0,
            payout_total: 0,
        });
    }

    let open: Vec<(i64, BetMarket, i64, f64)> = {
        let mut stmt = tx
            .prepare(
                "SELECT bet_id, market, stake, odds FROM bets
                 WHERE match_id = ?1 AND status = 'open'",
            )
            .context("prepare open bets")?;
        let rows = stmt
            .query_map(params![match_id], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, f64>(3)?,
                ))
            })
            .context("query open bets")?;
        let mut out = Vec::new();
        for row in rows {
            let (bet_id, market, stake, odds) = row.context("read bet row")?;
            out.push((bet_id, BetMarket::parse(&market)?, stake, odds));
        }
        out
    };

    let mut bets_settled = 0usize;
    let mut payout_total = 0i64;
    for (bet_id, market, stake, odds) in open {
        let won = market.wins(result.home_score, result.away_score);
        let payout = if won {
            (stake as f64 * odds).round() as i64
        } else {
            0
        };
        tx.execute(
            "UPDATE bets SET status = ?1, payout = ?2 WHERE bet_id = ?3",
            params![if won { "won" } else { "lost" }, payout, bet_id],
        )
        .context("mark bet settled")?;
        if payout > 0 {
            tx.execute(
                "UPDATE balance SET coins = coins + ?1 WHERE id = 1",
                params![payout],
            )
            .context("credit payout")?;
        }
        bets_settled += 1;
        payout_total += payout;
    }

    tx.commit().context("commit settlement")?;
    Ok(SettleOutcome {
        already_settled: false,
        bets_settled,
        payout_total,
    })
}

/// Refund all open bets on a match whose result could not be generated.
/// Idempotent through the same settlements guard, recorded as voided.
pub fn void_match(conn: &mut Connection, match_id: &str) -> Result<usize> {
    let tx = conn.transaction().context("begin void tx")?;
    let inserted = tx
        .execute(
            "INSERT OR IGNORE INTO settlements (match_id, voided, settled_at)
             VALUES (?1, 1, ?2)",
            params![match_id, Utc::now().to_rfc3339()],
        )
        .context("insert void settlement")?;
    if inserted == 0 {
        tx.commit().context("commit void")?;
        return Ok(0);
    }

    let refunded: i64 = tx
        .query_row(
            "SELECT COALESCE(SUM(stake), 0) FROM bets WHERE match_id = ?1 AND status = 'open'",
            params![match_id],
            |row| row.get(0),
        )
        .context("sum open stakes")?;
    let count = tx
        .execute(
            "UPDATE bets SET status = 'void', payout = stake
             WHERE match_id = ?1 AND status = 'open'",
            params![match_id],
        )
        .context("void open bets")?;
    if refunded > 0 {
        tx.execute(
            "UPDATE balance SET coins = coins + ?1 WHERE id = 1",
            params![refunded],
        )
        .context("refund stakes")?;
    }
    tx.commit().context("commit void")?;
    Ok(count)
}

/// Convert coins to tokens at the fixed unit. Fewer coins than one unit
/// yields zero tokens and leaves the coin balance untouched.
pub fn convert_coins(conn: &mut Connection) -> Result<(i64, i64)> {
    let tx = conn.transaction().context("begin convert tx")?;
    let coins: i64 = tx
        .query_row("SELECT coins FROM balance WHERE id = 1", [], |row| {
            row.get(0)
        })
        .context("read coins")?;

    let tokens = coins / COINS_PER_TOKEN;
    let spent = tokens * COINS_PER_TOKEN;
    if tokens > 0 {
        tx.execute(
            "UPDATE balance SET coins = coins - ?1, tokens = tokens + ?2 WHERE id = 1",
            params![spent, tokens],
        )
        .context("apply conversion")?;
    }
    tx.commit().context("commit convert")?;
    Ok((tokens, spent))
}

pub fn recent_bets(conn: &Connection, limit: usize) -> Result<Vec<BetRow>> {
    let mut stmt = conn
        .prepare(
            "SELECT bet_id, match_id, market, stake, odds, status, payout
             FROM bets ORDER BY bet_id DESC LIMIT ?1",
        )
        .context("prepare recent bets")?;
    let rows = stmt
        .query_map(params![limit as i64], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, i64>(3)?,
                row.get::<_, f64>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, i64>(6)?,
            ))
        })
        .context("query recent bets")?;

    let mut out = Vec::new();
    for row in rows {
        let (bet_id, match_id, market, stake, odds, status, payout) =
            row.context("read bet row")?;
        out.push(BetRow {
            bet_id,
            match_id,
            market: BetMarket::parse(&market)?,
            stake,
            odds,
            status,
            payout,
        });
    }
    Ok(out)
}

pub fn is_settled(conn: &Connection, match_id: &str) -> Result<bool> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM settlements WHERE match_id = ?1",
            params![match_id],
            |row| row.get(0),
        )
        .optional()
        .context("check settlement")?;
    Ok(found.is_some())
}
