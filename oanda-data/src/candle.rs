use crate::error::DataError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Open, high, low and close prices of one side of the book over a candle.
#[derive(Copy, Clone, PartialEq, PartialOrd, Debug, Deserialize, Serialize)]
pub struct Ohlc {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

/// Side of the book a price was quoted on.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceSide {
    Bid,
    Ask,
}

/// Normalised bid/ask candle, indexed by its candle-open instant.
#[derive(Copy, Clone, PartialEq, PartialOrd, Debug, Deserialize, Serialize)]
pub struct CandleRow {
    pub time: DateTime<Utc>,
    pub bid: Ohlc,
    pub ask: Ohlc,
}

impl CandleRow {
    pub fn side(&self, side: PriceSide) -> Ohlc {
        match side {
            PriceSide::Bid => self.bid,
            PriceSide::Ask => self.ask,
        }
    }

    /// Single-sided [`Bar`] view of this candle.
    pub fn bar(&self, side: PriceSide) -> Bar {
        let Ohlc {
            open,
            high,
            low,
            close,
        } = self.side(side);

        Bar {
            time: self.time,
            open,
            high,
            low,
            close,
        }
    }
}

/// Single-sided OHLC bar, the shape backtesting consumers expect (`Open`, `High`, `Low`,
/// `Close` columns indexed by time).
#[derive(Copy, Clone, PartialEq, PartialOrd, Debug, Deserialize, Serialize)]
pub struct Bar {
    pub time: DateTime<Utc>,
    #[serde(rename = "Open")]
    pub open: f64,
    #[serde(rename = "High")]
    pub high: f64,
    #[serde(rename = "Low")]
    pub low: f64,
    #[serde(rename = "Close")]
    pub close: f64,
}

/// Time-indexed table of [`CandleRow`]s.
///
/// Rows are strictly ascending by `time`, so the table never holds two candles for the same
/// instant.
#[derive(Clone, PartialEq, Debug, Default, Serialize)]
pub struct CandleTable {
    rows: Vec<CandleRow>,
}

impl CandleTable {
    /// Construct a [`CandleTable`], validating that `rows` are strictly ascending by time.
    pub fn from_rows(rows: Vec<CandleRow>) -> Result<Self, DataError> {
        if let Some(window) = rows.windows(2).find(|pair| pair[0].time >= pair[1].time) {
            return Err(DataError::MalformedResponse(format!(
                "candles out of order or duplicated: {} followed by {}",
                window[0].time, window[1].time
            )));
        }

        Ok(Self { rows })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[CandleRow] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<CandleRow> {
        self.rows
    }

    pub fn first(&self) -> Option<&CandleRow> {
        self.rows.first()
    }

    pub fn last(&self) -> Option<&CandleRow> {
        self.rows.last()
    }

    /// Candle opening at exactly `time`.
    pub fn get(&self, time: DateTime<Utc>) -> Option<&CandleRow> {
        self.rows
            .binary_search_by(|row| row.time.cmp(&time))
            .ok()
            .map(|index| &self.rows[index])
    }

    pub fn times(&self) -> impl Iterator<Item = DateTime<Utc>> + '_ {
        self.rows.iter().map(|row| row.time)
    }

    /// Project every row onto one side of the book.
    pub fn bars(&self, side: PriceSide) -> Vec<Bar> {
        self.rows.iter().map(|row| row.bar(side)).collect()
    }
}

impl<'a> IntoIterator for &'a CandleTable {
    type Item = &'a CandleRow;
    type IntoIter = std::slice::Iter<'a, CandleRow>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}
