use chrono::NaiveDate;
use serde::Serialize;

use crate::stats;

/// Backtest results with all metrics
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BacktestResults {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub days: usize,
    pub final_equity: f64,

    // Overall Performance
    pub total_return: f64,
    pub cagr: f64,

    // Risk Metrics
    pub annualized_vol: f64,
    pub sharpe: f64,
    /// Most negative `(equity - peak) / peak`, so <= 0
    pub max_drawdown: f64,
    pub calmar: f64,

    // Activity
    pub trades: u64,
    pub total_costs: f64,
    /// Fraction of days holding the position
    pub exposure: f64,

    pub equity_curve: Vec<EquityPoint>,
}

impl BacktestResults {
    fn empty(days: usize) -> Self {
        Self {
            start_date: None,
            end_date: None,
            days,
            final_equity: 1.0,
            total_return: 0.0,
            cagr: 0.0,
            annualized_vol: 0.0,
            sharpe: 0.0,
            max_drawdown: 0.0,
            calmar: 0.0,
            trades: 0,
            total_costs: 0.0,
            exposure: 0.0,
            equity_curve: Vec::new(),
        }
    }

    /// Pretty print results to console
    pub fn print_summary(&self) {
        println!("\n{}", "=".repeat(60));
        println!("                    BACKTEST RESULTS");
        println!("{}", "=".repeat(60));
        match (self.start_date, self.end_date) {
            (Some(start), Some(end)) => {
                println!("Period:             {} to {} ({} days)", start, end, self.days)
            }
            _ => println!("Period:             {} days", self.days),
        }
        println!("Final Equity:       {:.4}", self.final_equity);
        println!("{}", "-".repeat(60));
        println!("PERFORMANCE");
        println!("  Total Return:       {:.2}%", self.total_return * 100.0);
        println!("  CAGR:               {:.2}%", self.cagr * 100.0);
        println!("  Annualized Vol:     {:.2}%", self.annualized_vol * 100.0);
        println!("  Sharpe Ratio:       {:.2}", self.sharpe);
        println!("  Max Drawdown:       {:.2}%", self.max_drawdown * 100.0);
        println!("  Calmar Ratio:       {:.2}", self.calmar);
        println!("{}", "-".repeat(60));
        println!("ACTIVITY");
        println!("  Position Changes:   {}", self.trades);
        println!("  Total Costs:        {:.4}%", self.total_costs * 100.0);
        println!("  Exposure:           {:.1}%", self.exposure * 100.0);
        println!("{}", "=".repeat(60));
    }
}

/// Point on the equity curve
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EquityPoint {
    pub date: NaiveDate,
    pub equity: f64,
    pub drawdown: f64,
}

/// One simulated day: net strategy return plus what produced it
#[derive(Debug, Clone, Copy)]
pub struct DailyOutcome {
    pub date: NaiveDate,
    pub position: f64,
    pub cost: f64,
    pub net_return: f64,
}

/// Calculator for backtest metrics
pub struct MetricsCalculator;

impl MetricsCalculator {
    /// Compound daily net returns from an initial equity of 1.0 and derive
    /// the summary metrics. Fewer than two days yields all zeros.
    pub fn calculate(days: &[DailyOutcome], trading_days_per_year: f64) -> BacktestResults {
        if days.len() < 2 {
            return BacktestResults::empty(days.len());
        }

        let returns: Vec<f64> = days.iter().map(|d| d.net_return).collect();
        let equity_curve = Self::equity_curve(days);
        let final_equity = equity_curve.last().map_or(1.0, |p| p.equity);
        let total_return = final_equity - 1.0;

        let n = returns.len() as f64;
        let years = n / trading_days_per_year;
        let cagr = if final_equity > 0.0 {
            final_equity.powf(1.0 / years) - 1.0
        } else {
            -1.0
        };

        let annualized_vol = stats::population_std(&returns) * trading_days_per_year.sqrt();
        let sharpe = if annualized_vol > 0.0 {
            stats::mean(&returns).unwrap_or(0.0) * trading_days_per_year / annualized_vol
        } else {
            0.0
        };

        let max_drawdown = equity_curve
            .iter()
            .map(|p| p.drawdown)
            .fold(0.0, f64::min);
        let calmar = if max_drawdown < 0.0 {
            cagr / max_drawdown.abs()
        } else {
            0.0
        };

        let mut previous = 0.0;
        let mut trades = 0;
        for day in days {
            if day.position != previous {
                trades += 1;
            }
            previous = day.position;
        }

        BacktestResults {
            start_date: days.first().map(|d| d.date),
            end_date: days.last().map(|d| d.date),
            days: days.len(),
            final_equity,
            total_return,
            cagr,
            annualized_vol,
            sharpe,
            max_drawdown,
            calmar,
            trades,
            total_costs: days.iter().map(|d| d.cost).sum(),
            exposure: days.iter().map(|d| d.position).sum::<f64>() / n,
            equity_curve,
        }
    }

    /// Running peak starts at the initial 1.0
    fn equity_curve(days: &[DailyOutcome]) -> Vec<EquityPoint> {
        let mut equity = 1.0;
        let mut peak = 1.0_f64;
        days.iter()
            .map(|day| {
                equity *= 1.0 + day.net_return;
                peak = peak.max(equity);
                EquityPoint {
                    date: day.date,
                    equity,
                    drawdown: (equity - peak) / peak,
                }
            })
            .collect()
    }
}
