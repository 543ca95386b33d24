use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{ExperimentError, ExperimentResult};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub price: f64,
}

/// Daily price series, strictly increasing by date
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSeries {
    points: Vec<PricePoint>,
}

impl PriceSeries {
    /// Sorts by date and rejects duplicate dates or non-finite prices
    pub fn new(mut points: Vec<PricePoint>) -> ExperimentResult<Self> {
        points.sort_by_key(|p| p.date);

        if let Some(w) = points.windows(2).find(|w| w[0].date == w[1].date) {
            return Err(ExperimentError::MalformedInput(format!(
                "duplicate date {} in series",
                w[0].date
            )));
        }
        if let Some(p) = points.iter().find(|p| !p.price.is_finite()) {
            return Err(ExperimentError::MalformedInput(format!(
                "non-finite price on {}",
                p.date
            )));
        }

        Ok(Self { points })
    }

    /// Build from cumulative percent returns (base 100)
    pub fn from_cumulative_returns(
        observations: impl IntoIterator<Item = (NaiveDate, f64)>,
    ) -> ExperimentResult<Self> {
        let points = observations
            .into_iter()
            .map(|(date, cumret)| PricePoint {
                date,
                price: cumret_to_price(cumret),
            })
            .collect();
        Self::new(points)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn prices(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.price).collect()
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.points.iter().map(|p| p.date).collect()
    }

    pub fn first(&self) -> Option<&PricePoint> {
        self.points.first()
    }

    pub fn last(&self) -> Option<&PricePoint> {
        self.points.last()
    }
}

pub fn cumret_to_price(cumret_pct: f64) -> f64 {
    100.0 * (1.0 + cumret_pct / 100.0)
}
