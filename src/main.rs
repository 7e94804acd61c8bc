use std::io;
use std::sync::mpsc;
use std::time::{Duration, Instant};

use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::prelude::*;
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Block, Borders, Clear, Paragraph};

use vfl_terminal::engine;
use vfl_terminal::ledger::BetMarket;
use vfl_terminal::result_gen::EventKind;
use vfl_terminal::round::MatchStatus;
use vfl_terminal::state::{AppState, Delta, EngineCommand, Screen, apply_delta};
use vfl_terminal::teams::team_abbr;

struct App {
    state: AppState,
    should_quit: bool,
    cmd_tx: Option<mpsc::Sender<EngineCommand>>,
}

impl App {
    fn new(cmd_tx: Option<mpsc::Sender<EngineCommand>>) -> Self {
        Self {
            state: AppState::new(),
            should_quit: false,
            cmd_tx,
        }
    }

    fn on_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Char('1') => self.state.screen = Screen::Pulse,
            KeyCode::Char('d') | KeyCode::Enter => {
                let match_id = self.state.selected_match_id();
                self.state.screen = Screen::Terminal { match_id };
            }
            KeyCode::Char('b') | KeyCode::Esc => self.state.screen = Screen::Pulse,
            KeyCode::Char('j') | KeyCode::Down => {
                self.state.select_next();
                self.repin_terminal();
            }
            KeyCode::Char('k') | KeyCode::Up => {
                self.state.select_prev();
                self.repin_terminal();
            }
            KeyCode::Char('+') | KeyCode::Char('=') => self.state.raise_stake(),
            KeyCode::Char('-') => self.state.lower_stake(),
            KeyCode::Char('H') => self.place_bet(BetMarket::Home),
            KeyCode::Char('D') => self.place_bet(BetMarket::Draw),
            KeyCode::Char('A') => self.place_bet(BetMarket::Away),
            KeyCode::Char('G') => self.place_bet(BetMarket::Gg),
            KeyCode::Char('N') => self.place_bet(BetMarket::Nogg),
            KeyCode::Char('c') => self.send(EngineCommand::ConvertCoins),
            KeyCode::Char('?') => self.state.help_overlay = !self.state.help_overlay,
            _ => {}
        }
    }

    /// Moving through the list while the terminal is open follows the move.
    fn repin_terminal(&mut self) {
        if matches!(self.state.screen, Screen::Terminal { .. }) {
            self.state.screen = Screen::Terminal {
                match_id: self.state.selected_match_id(),
            };
        }
    }

    fn place_bet(&mut self, market: BetMarket) {
        let Some(match_id) = self.state.focused_match().map(|m| m.match_id.clone()) else {
            self.state.push_log("[INFO] No match selected for bet");
            return;
        };
        if !self.state.betting_open() {
            self.state.push_log("[INFO] Betting window is closed");
            return;
        }
        let stake = self.state.stake;
        self.send(EngineCommand::PlaceBet {
            match_id,
            market,
            stake,
        });
    }

    fn send(&mut self, cmd: EngineCommand) {
        let Some(tx) = &self.cmd_tx else {
            self.state.push_log("[WARN] Engine unavailable");
            return;
        };
        if tx.send(cmd).is_err() {
            self.state.push_log("[WARN] Engine command failed");
        }
    }
}

fn main() -> io::Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = ratatui::backend::CrosstermBackend::new(stdout);
    let mut terminal = ratatui::Terminal::new(backend)?;

    let (tx, rx) = mpsc::channel();
    let (cmd_tx, cmd_rx) = mpsc::channel();
    engine::spawn_engine(tx, cmd_rx);

    let mut app = App::new(Some(cmd_tx));
    let res = run_app(&mut terminal, &mut app, rx);

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        eprintln!("error: {err}");
    }
    Ok(())
}

fn run_app<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    rx: mpsc::Receiver<Delta>,
) -> io::Result<()> {
    let tick_rate = Duration::from_millis(250);
    let mut last_tick = Instant::now();

    loop {
        while let Ok(delta) = rx.try_recv() {
            apply_delta(&mut app.state, delta);
        }

        terminal.draw(|f| ui(f, app))?;

        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or(Duration::ZERO);
        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    app.on_key(key);
                }
            }
        }

        if last_tick.elapsed() >= tick_rate {
            last_tick = Instant::now();
        }

        if app.should_quit {
            return Ok(());
        }
    }
}

fn ui(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2),
            Constraint::Min(1),
            Constraint::Length(4),
            Constraint::Length(1),
        ])
        .split(frame.size());

    let header =
        Paragraph::new(header_text(&app.state)).block(Block::default().borders(Borders::BOTTOM));
    frame.render_widget(header, chunks[0]);

    match app.state.screen {
        Screen::Pulse => render_pulse(frame, chunks[1], &app.state),
        Screen::Terminal { .. } => render_terminal(frame, chunks[1], &app.state),
    }

    let console = Paragraph::new(console_text(&app.state))
        .block(Block::default().title("Console").borders(Borders::ALL));
    frame.render_widget(console, chunks[2]);

    let footer =
        Paragraph::new(footer_text(&app.state)).style(Style::default().fg(Color::DarkGray));
    frame.render_widget(footer, chunks[3]);

    if app.state.help_overlay {
        render_help_overlay(frame, frame.size());
    }
}

fn header_text(state: &AppState) -> String {
    let round = match &state.round {
        Some(r) => format!(
            "Round {} | {} | {} left",
            r.round_no,
            r.phase.label(),
            format_countdown(r.remaining_secs)
        ),
        None => "Waiting for engine".to_string(),
    };
    format!(
        "VFL TERMINAL | {round} | Coins {} | Tokens {} | Stake {}",
        state.coins, state.tokens, state.stake
    )
}

fn footer_text(state: &AppState) -> String {
    match state.screen {
        Screen::Pulse => {
            "1 Pulse | Enter/d Match | j/k Move | +/- Stake | H/D/A/G/N Bet | c Convert | ? Help | q Quit"
                .to_string()
        }
        Screen::Terminal { .. } => {
            "b/Esc Back | j/k Move | +/- Stake | H/D/A/G/N Bet | ? Help | q Quit".to_string()
        }
    }
}

fn format_countdown(secs: u64) -> String {
    format!("{}:{:02}", secs / 60, secs % 60)
}

fn render_pulse(frame: &mut Frame, area: Rect, state: &AppState) {
    let sections = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Min(1)])
        .split(area);

    let widths = pulse_columns();
    render_pulse_header(frame, sections[0], &widths);

    let list_area = sections[1];
    if state.matches.is_empty() {
        let empty =
            Paragraph::new("No fixtures yet").style(Style::default().fg(Color::DarkGray));
        frame.render_widget(empty, list_area);
        return;
    }

    if list_area.height == 0 {
        return;
    }
    let visible = list_area.height as usize;
    let (start, end) = visible_range(state.selected, state.matches.len(), visible);

    for (i, idx) in (start..end).enumerate() {
        let row_area = Rect {
            x: list_area.x,
            y: list_area.y + i as u16,
            width: list_area.width,
            height: 1,
        };

        let selected = idx == state.selected;
        let row_style = if selected {
            Style::default().fg(Color::White).bg(Color::DarkGray)
        } else {
            Style::default()
        };
        if selected {
            frame.render_widget(Block::default().style(row_style), row_area);
        }

        let cols = Layout::default()
            .direction(Direction::Horizontal)
            .constraints(widths)
            .split(row_area);

        let m = &state.matches[idx];
        let name = format!("{}-{}", m.home_abbr, m.away_abbr);
        let (time, score) = match m.status {
            MatchStatus::Scheduled => ("--".to_string(), "vs".to_string()),
            MatchStatus::Live => (
                format!("{}'", m.minute),
                format!("{}-{}", m.home_score, m.away_score),
            ),
            MatchStatus::Finished => (
                "FT".to_string(),
                format!("{}-{}", m.home_score, m.away_score),
            ),
            MatchStatus::Void => ("VOID".to_string(), "-".to_string()),
        };
        let hda = format!(
            "{:.2} {:.2} {:.2}",
            m.odds.home, m.odds.draw, m.odds.away
        );
        let both = format!("{:.2} {:.2}", m.odds.gg, m.odds.nogg);
        let commit = short_hash(&m.commit_hash);

        render_cell_text(frame, cols[0], &time, row_style);
        render_cell_text(frame, cols[1], &name, row_style);
        render_cell_text(frame, cols[2], &score, row_style);
        render_cell_text(frame, cols[3], &hda, row_style);
        render_cell_text(frame, cols[4], &both, row_style);
        render_cell_text(frame, cols[5], &commit, row_style);
    }
}

fn pulse_columns() -> [Constraint; 6] {
    [
        Constraint::Length(6),
        Constraint::Length(10),
        Constraint::Length(6),
        Constraint::Length(17),
        Constraint::Length(11),
        Constraint::Min(10),
    ]
}

fn render_pulse_header(frame: &mut Frame, area: Rect, widths: &[Constraint]) {
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints(widths)
        .split(area);
    let style = Style::default().add_modifier(Modifier::BOLD);

    render_cell_text(frame, cols[0], "Time", style);
    render_cell_text(frame, cols[1], "Match", style);
    render_cell_text(frame, cols[2], "Score", style);
    render_cell_text(frame, cols[3], "H / D / A", style);
    render_cell_text(frame, cols[4], "GG / NG", style);
    render_cell_text(frame, cols[5], "Commit", style);
}

fn render_cell_text(frame: &mut Frame, area: Rect, text: &str, style: Style) {
    let paragraph = Paragraph::new(text).style(style);
    frame.render_widget(paragraph, area);
}

fn visible_range(selected: usize, total: usize, visible: usize) -> (usize, usize) {
    if total == 0 {
        return (0, 0);
    }
    if total <= visible {
        return (0, total);
    }
    let mut start = selected.saturating_sub(visible / 2);
    if start + visible > total {
        start = total - visible;
    }
    (start, start + visible)
}

fn render_terminal(frame: &mut Frame, area: Rect, state: &AppState) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Length(20),
            Constraint::Min(32),
            Constraint::Length(34),
        ])
        .split(area);

    let match_list = Paragraph::new(match_list_text(state))
        .block(Block::default().title("Fixtures").borders(Borders::ALL));
    frame.render_widget(match_list, columns[0]);

    let tape = Paragraph::new(event_tape_text(state))
        .block(Block::default().title("Event Tape").borders(Borders::ALL));
    frame.render_widget(tape, columns[1]);

    let right = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(8),
            Constraint::Length(7),
            Constraint::Min(1),
        ])
        .split(columns[2]);

    let fair = Paragraph::new(fairness_text(state))
        .block(Block::default().title("Provably Fair").borders(Borders::ALL));
    frame.render_widget(fair, right[0]);

    let market = Paragraph::new(market_text(state))
        .block(Block::default().title("Market").borders(Borders::ALL));
    frame.render_widget(market, right[1]);

    let bets = Paragraph::new(bets_text(state))
        .block(Block::default().title("My Bets").borders(Borders::ALL));
    frame.render_widget(bets, right[2]);
}

fn match_list_text(state: &AppState) -> String {
    if state.matches.is_empty() {
        return "No fixtures yet".to_string();
    }
    let mut lines = Vec::new();
    for (idx, m) in state.matches.iter().enumerate() {
        let prefix = if idx == state.selected { "> " } else { "  " };
        lines.push(format!(
            "{prefix}{}-{} {}-{}",
            m.home_abbr, m.away_abbr, m.home_score, m.away_score
        ));
    }
    lines.join("\n")
}

fn event_tape_text(state: &AppState) -> String {
    let Some(m) = state.focused_match() else {
        return "No match selected".to_string();
    };
    let events = state.events_for(&m.match_id);
    if events.is_empty() {
        return "No events yet".to_string();
    }
    let start = events.len().saturating_sub(14);
    events[start..]
        .iter()
        .map(|event| {
            let team = event
                .team_id
                .map(team_abbr)
                .unwrap_or("---");
            format!(
                "{:>2}' {:<8} {} {}",
                event.minute,
                event_kind_label(event.kind),
                team,
                event.description
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn fairness_text(state: &AppState) -> String {
    let Some(m) = state.focused_match() else {
        return "No match selected".to_string();
    };
    let mut lines = vec![format!("Commit: {}", short_hash(&m.commit_hash))];
    match &m.block_hash {
        Some(block) => lines.push(format!("Block:  {}", short_hash(block))),
        None => lines.push("Block:  pending".to_string()),
    }
    match &m.revealed_seed {
        Some(seed) => {
            lines.push(format!("Seed:   {}", short_hash(seed)));
            lines.push("Seed revealed: recompute to audit".to_string());
        }
        None => lines.push("Seed:   hidden until FT".to_string()),
    }
    if let Some(summary) = &m.summary {
        lines.push(summary.clone());
    }
    lines.join("\n")
}

fn market_text(state: &AppState) -> String {
    match state.focused_match() {
        Some(m) => format!(
            "H {:.2}  D {:.2}  A {:.2}\nGG {:.2}  NG {:.2}\nStake: {}",
            m.odds.home, m.odds.draw, m.odds.away, m.odds.gg, m.odds.nogg, state.stake
        ),
        None => "No market".to_string(),
    }
}

fn bets_text(state: &AppState) -> String {
    if state.bets.is_empty() {
        return "No bets yet".to_string();
    }
    state
        .bets
        .iter()
        .take(10)
        .map(|bet| {
            format!(
                "{} {} {} @ {:.2} [{}]",
                bet.match_id,
                bet.market.as_str(),
                bet.stake,
                bet.odds,
                bet.status
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn console_text(state: &AppState) -> String {
    if state.logs.is_empty() {
        return "No alerts yet".to_string();
    }
    state
        .logs
        .iter()
        .rev()
        .take(2)
        .cloned()
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect::<Vec<_>>()
        .join("\n")
}

fn event_kind_label(kind: EventKind) -> &'static str {
    match kind {
        EventKind::Whistle => "WHISTLE",
        EventKind::Goal => "GOAL",
        EventKind::YellowCard => "YELLOW",
        EventKind::RedCard => "RED",
        EventKind::Injury => "INJURY",
        EventKind::Chance => "CHANCE",
    }
}

fn short_hash(hash: &str) -> String {
    if hash.len() > 14 {
        format!("{}..", &hash[..14])
    } else {
        hash.to_string()
    }
}

fn render_help_overlay(frame: &mut Frame, area: Rect) {
    let popup_area = centered_rect(60, 60, area);
    frame.render_widget(Clear, popup_area);

    let text = [
        "VFL Terminal - Help",
        "",
        "Global:",
        "  1            Pulse",
        "  Enter / d    Match terminal",
        "  b / Esc      Back",
        "  j/k or ↑/↓   Move",
        "  ?            Toggle help",
        "  q            Quit",
        "",
        "Betting (during the betting window):",
        "  + / -        Adjust stake",
        "  H / D / A    Bet home / draw / away",
        "  G / N        Bet both-score / not-both-score",
        "  c            Convert coins to tokens",
    ]
    .join("\n");

    let help = Paragraph::new(text)
        .block(Block::default().title("Help").borders(Borders::ALL))
        .style(Style::default());
    frame.render_widget(help, popup_area);
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1]);

    horizontal[1]
}
