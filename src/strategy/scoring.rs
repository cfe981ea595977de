//! Per-cycle scoring of the symbol universe.

use crate::broker::{BarSet, Timestep};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use tracing::{info, warn};

/// One price/return snapshot per symbol per cycle.
#[derive(Debug, Clone)]
pub struct PriceObservation {
    pub symbol: String,
    pub last_price: Decimal,
    /// Fractional price change over the lookback window, not annualized.
    pub period_return: Decimal,
}

/// A symbol ranked by its period return.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredAsset {
    pub symbol: String,
    pub price: Decimal,
    pub score: Decimal,
}

/// How `select_best` interprets the score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionMode {
    /// Highest recent return wins.
    Momentum,
    /// Most negative recent return wins (expected to revert upward).
    MeanReversion,
}

/// Build observations from fetched bar windows, iterating the universe in
/// configured order so that downstream tie-breaking is deterministic.
///
/// Fails soft per symbol: missing data or a too-short window drops the symbol
/// from this cycle with a warning. The result may be empty.
pub fn observe(
    bars: &HashMap<String, BarSet>,
    symbols: &[String],
    lookback: usize,
    timestep: Timestep,
) -> Vec<PriceObservation> {
    // Daily bars end the window at yesterday's close; intraday uses the
    // current bar.
    let (start_offset, end_offset) = match timestep {
        Timestep::Day => (lookback + 1, 1),
        Timestep::Minute => (lookback, 0),
    };

    let mut observations = Vec::with_capacity(symbols.len());
    for symbol in symbols {
        let Some(bar_set) = bars.get(symbol) else {
            warn!(%symbol, "No bar data this cycle; excluding from scoring");
            continue;
        };
        let (Some(period_return), Some(last_price)) = (
            bar_set.return_over(start_offset, end_offset),
            bar_set.last_price(),
        ) else {
            warn!(
                %symbol,
                bars = bar_set.bars.len(),
                "Bar window too short; excluding from scoring"
            );
            continue;
        };

        info!(
            %symbol,
            return_pct = %(period_return * dec!(100)).round_dp(2),
            lookback,
            "Scored symbol"
        );
        observations.push(PriceObservation {
            symbol: symbol.clone(),
            last_price,
            period_return,
        });
    }
    observations
}

/// Derive the two ranked lists from one set of observations. Both legs score
/// by raw period return; only the selection direction differs.
pub fn compute_scores(observations: &[PriceObservation]) -> (Vec<ScoredAsset>, Vec<ScoredAsset>) {
    let scored: Vec<ScoredAsset> = observations
        .iter()
        .map(|obs| ScoredAsset {
            symbol: obs.symbol.clone(),
            price: obs.last_price,
            score: obs.period_return,
        })
        .collect();
    (scored.clone(), scored)
}

/// Pick the best entry for a leg. Ties go to the first-seen entry.
pub fn select_best(list: &[ScoredAsset], mode: SelectionMode) -> Option<&ScoredAsset> {
    list.iter().fold(None, |best: Option<&ScoredAsset>, asset| {
        match best {
            None => Some(asset),
            // Strict comparison keeps the earlier entry on equal scores.
            Some(current) => {
                let better = match mode {
                    SelectionMode::Momentum => asset.score > current.score,
                    SelectionMode::MeanReversion => asset.score < current.score,
                };
                if better {
                    Some(asset)
                } else {
                    Some(current)
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::{Bar, BarSet};
    use chrono::Utc;

    fn scored(symbol: &str, score: Decimal) -> ScoredAsset {
        ScoredAsset {
            symbol: symbol.to_string(),
            price: dec!(100),
            score,
        }
    }

    fn barset(symbol: &str, closes: &[Decimal]) -> BarSet {
        let bars = closes
            .iter()
            .map(|&close| Bar {
                timestamp: Utc::now(),
                open: close,
                high: close,
                low: close,
                close,
                volume: dec!(1),
            })
            .collect();
        BarSet::new(symbol, bars)
    }

    #[test]
    fn test_momentum_picks_max_mean_reversion_picks_min() {
        // A:+5%, B:+2%, C:-6% over one lookback window.
        let list = vec![
            scored("A", dec!(0.05)),
            scored("B", dec!(0.02)),
            scored("C", dec!(-0.06)),
        ];

        let momentum = select_best(&list, SelectionMode::Momentum).unwrap();
        assert_eq!(momentum.symbol, "A");

        let reversion = select_best(&list, SelectionMode::MeanReversion).unwrap();
        assert_eq!(reversion.symbol, "C");
    }

    #[test]
    fn test_ties_resolve_to_first_seen() {
        let list = vec![
            scored("X", dec!(0.03)),
            scored("Y", dec!(0.03)),
            scored("Z", dec!(0.03)),
        ];
        assert_eq!(select_best(&list, SelectionMode::Momentum).unwrap().symbol, "X");
        assert_eq!(
            select_best(&list, SelectionMode::MeanReversion).unwrap().symbol,
            "X"
        );
    }

    #[test]
    fn test_empty_list_selects_nothing() {
        assert!(select_best(&[], SelectionMode::Momentum).is_none());
    }

    #[test]
    fn test_observe_skips_missing_and_short_symbols() {
        let mut bars = HashMap::new();
        bars.insert(
            "AAPL".to_string(),
            barset("AAPL", &[dec!(100), dec!(102), dec!(104), dec!(105)]),
        );
        bars.insert("MSFT".to_string(), barset("MSFT", &[dec!(200)]));

        let symbols = vec![
            "AAPL".to_string(),
            "MSFT".to_string(),
            "GOOGL".to_string(),
        ];
        let observations = observe(&bars, &symbols, 2, Timestep::Day);

        assert_eq!(observations.len(), 1);
        assert_eq!(observations[0].symbol, "AAPL");
        assert_eq!(observations[0].period_return, dec!(0.04));
        assert_eq!(observations[0].last_price, dec!(105));
    }

    #[test]
    fn test_observe_intraday_uses_latest_bar() {
        let mut bars = HashMap::new();
        bars.insert(
            "AAPL".to_string(),
            barset("AAPL", &[dec!(100), dec!(101), dec!(103)]),
        );

        let observations = observe(
            &bars,
            &["AAPL".to_string()],
            2,
            Timestep::Minute,
        );
        assert_eq!(observations[0].period_return, dec!(0.03));
    }

    #[test]
    fn test_compute_scores_mirrors_returns_into_both_lists() {
        let observations = vec![PriceObservation {
            symbol: "A".to_string(),
            last_price: dec!(50),
            period_return: dec!(0.01),
        }];
        let (momentum, mean_reversion) = compute_scores(&observations);
        assert_eq!(momentum.len(), 1);
        assert_eq!(momentum[0].score, dec!(0.01));
        assert_eq!(momentum[0].price, dec!(50));
        assert_eq!(momentum, mean_reversion);
    }
}
