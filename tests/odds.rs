use vfl_terminal::odds::{OddsConfig, compute_odds, compute_odds_with};
use vfl_terminal::teams::TEAM_POOL;

#[test]
fn symmetric_fixture_prices_both_sides_alike() {
    let odds = compute_odds(70.0, 70.0).unwrap();
    assert_eq!(odds.home, 2.75);
    assert_eq!(odds.away, 2.75);
    assert!(odds.draw < odds.home);
}

#[test]
fn stronger_home_side_shortens_and_lengthens_the_right_legs() {
    let even = compute_odds(75.0, 75.0).unwrap();
    let tilted = compute_odds(85.0, 65.0).unwrap();
    assert!(tilted.home < even.home);
    assert!(tilted.away > even.away);
    // Draw leg ignores the strength diff entirely.
    assert_eq!(tilted.draw, even.draw);
}

#[test]
fn every_pool_pairing_prices_inside_the_payable_band() {
    for home in TEAM_POOL.iter() {
        for away in TEAM_POOL.iter() {
            if home.id == away.id {
                continue;
            }
            let odds = compute_odds(home.strength, away.strength).unwrap();
            for odd in [odds.home, odds.draw, odds.away, odds.gg, odds.nogg] {
                assert!(
                    (1.15..=45.0).contains(&odd),
                    "{} vs {} produced {odd}",
                    home.abbr,
                    away.abbr
                );
            }
        }
    }
}

#[test]
fn custom_config_moves_the_clamp_band() {
    let cfg = OddsConfig {
        margin: 0.10,
        min_odd: 2.0,
        max_odd: 3.0,
        gg: 1.75,
        nogg: 1.90,
    };
    let odds = compute_odds_with(100.0, 1.0, cfg).unwrap();
    assert!(odds.home >= 2.0);
    assert!(odds.away <= 3.0);
}

#[test]
fn out_of_range_strengths_are_rejected() {
    assert!(compute_odds(0.5, 50.0).is_err());
    assert!(compute_odds(50.0, 100.1).is_err());
    assert!(compute_odds(f64::NAN, 50.0).is_err());
}
