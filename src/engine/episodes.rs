//! Drawdown episodes: contiguous stretches below a reference peak.

use super::drawdown::{EquityCurve, EquityPoint};
use super::MergedEventKind;
use crate::domain::TimeMs;

#[derive(Debug, Clone, PartialEq)]
pub struct DrawdownEpisode {
    pub start_ms: TimeMs,
    pub trough_ms: TimeMs,
    /// `None` while the episode is still open.
    pub end_ms: Option<TimeMs>,
    /// Peak equity when the episode opened, less any withdrawals taken during it.
    pub reference: f64,
    /// Deepest trade-step drawdown inside the episode, as a fraction.
    pub depth: f64,
    pub trade_count: u64,
    /// Sum of losing trade PnL (non-positive).
    pub loss_sum: f64,
}

impl DrawdownEpisode {
    fn open(point: &EquityPoint) -> Self {
        let mut episode = Self {
            start_ms: point.time_ms,
            trough_ms: point.time_ms,
            end_ms: None,
            reference: point.peak,
            depth: point.drawdown,
            trade_count: 0,
            loss_sum: 0.0,
        };
        episode.record_trade(point);
        episode
    }

    fn record_trade(&mut self, point: &EquityPoint) {
        if let MergedEventKind::Trade { pnl } = point.kind {
            self.trade_count += 1;
            if pnl < 0.0 {
                self.loss_sum += pnl;
            }
            if point.drawdown > self.depth {
                self.depth = point.drawdown;
                self.trough_ms = point.time_ms;
            }
        }
    }

    pub fn is_open(&self) -> bool {
        self.end_ms.is_none()
    }

    /// Days from start to trough.
    pub fn duration_days(&self) -> f64 {
        self.start_ms.days_until(self.trough_ms).max(0.0)
    }

    /// Days from trough to recovery; `None` while open.
    pub fn recovery_days(&self) -> Option<f64> {
        self.end_ms
            .map(|end| self.trough_ms.days_until(end).max(0.0))
    }
}

/// Episode statistics; depths are fractions.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EpisodeSummary {
    pub episodes: Vec<DrawdownEpisode>,
    pub largest_depth: f64,
    pub average_depth: f64,
    /// Mean over closed episodes only.
    pub avg_recovery_days: f64,
    pub current_in_drawdown: bool,
    pub current_drawdown: f64,
}

impl EpisodeSummary {
    pub fn count(&self) -> u64 {
        self.episodes.len() as u64
    }
}

/// Split the curve into episodes.
///
/// A trade step whose drawdown exceeds `threshold` opens an episode; any step whose
/// equity reaches the reference closes it.
pub fn analyze_episodes(curve: &EquityCurve, threshold: f64) -> EpisodeSummary {
    let mut episodes = Vec::new();
    let mut current: Option<DrawdownEpisode> = None;

    for point in &curve.points {
        match current.as_mut() {
            Some(episode) => {
                match point.kind {
                    MergedEventKind::CashFlow { amount } if amount < 0.0 => {
                        episode.reference += amount;
                    }
                    MergedEventKind::Trade { .. } => episode.record_trade(point),
                    MergedEventKind::CashFlow { .. } => {}
                }
                if point.equity >= episode.reference {
                    episode.end_ms = Some(point.time_ms);
                    episodes.extend(current.take());
                }
            }
            None => {
                if point.is_trade() && point.drawdown > threshold {
                    current = Some(DrawdownEpisode::open(point));
                }
            }
        }
    }

    let current_in_drawdown = current.is_some();
    let current_drawdown = if current_in_drawdown {
        curve.points.last().map(|p| p.drawdown).unwrap_or(0.0)
    } else {
        0.0
    };
    episodes.extend(current);

    let largest_depth = episodes.iter().map(|e| e.depth).fold(0.0, f64::max);
    let average_depth = if episodes.is_empty() {
        0.0
    } else {
        episodes.iter().map(|e| e.depth).sum::<f64>() / episodes.len() as f64
    };
    let recoveries: Vec<f64> = episodes.iter().filter_map(|e| e.recovery_days()).collect();
    let avg_recovery_days = if recoveries.is_empty() {
        0.0
    } else {
        recoveries.iter().sum::<f64>() / recoveries.len() as f64
    };

    EpisodeSummary {
        episodes,
        largest_depth,
        average_depth,
        avg_recovery_days,
        current_in_drawdown,
        current_drawdown,
    }
}
