use crate::{
    candle::{CandleRow, Ohlc},
    granularity::Granularity,
    instrument::InstrumentName,
    rest::chunk::RequestChunk,
};
use barter_integration::protocol::http::rest::RestRequest;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// Price components requested from the candles endpoint: bid and ask.
pub const PRICE_COMPONENTS: &str = "BA";

/// REST request to fetch bid/ask candles for one instrument over one [`RequestChunk`].
///
/// `GET /v3/accounts/{account}/instruments/{instrument}/candles`
#[derive(Debug, Clone)]
pub struct GetCandles {
    /// Endpoint path, with the account and instrument already substituted.
    pub path: String,
    pub params: GetCandlesParams,
}

impl GetCandles {
    pub fn new(
        account_number: &str,
        instrument: &InstrumentName,
        granularity: Granularity,
        chunk: RequestChunk,
    ) -> Self {
        Self {
            path: format!("/v3/accounts/{account_number}/instruments/{instrument}/candles"),
            params: GetCandlesParams {
                from: chunk.start.timestamp().to_string(),
                to: chunk.end.timestamp().to_string(),
                granularity: granularity.as_str().to_string(),
                price: PRICE_COMPONENTS,
            },
        }
    }
}

/// Query parameters for an OANDA candles REST request.
///
/// `from` and `to` are UNIX seconds.
#[derive(Debug, Clone, Serialize)]
pub struct GetCandlesParams {
    pub from: String,
    pub to: String,
    pub granularity: String,
    pub price: &'static str,
}

impl RestRequest for GetCandles {
    type Response = OandaCandlesResponse;
    type QueryParams = GetCandlesParams;
    type Body = ();

    fn path(&self) -> Cow<'static, str> {
        Cow::Owned(self.path.clone())
    }

    fn method() -> reqwest::Method {
        reqwest::Method::GET
    }

    fn query_params(&self) -> Option<&Self::QueryParams> {
        Some(&self.params)
    }
}

/// Raw candles response returned by the OANDA REST API.
///
/// ```json
/// {
///   "instrument": "EUR_USD",
///   "granularity": "H1",
///   "candles": [
///     {
///       "complete": true,
///       "volume": 1362,
///       "time": "2021-01-01T00:00:00.000000000Z",
///       "bid": { "o": "1.22134", "h": "1.22200", "l": "1.22101", "c": "1.22150" },
///       "ask": { "o": "1.22154", "h": "1.22218", "l": "1.22119", "c": "1.22168" }
///     }
///   ]
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct OandaCandlesResponse {
    #[serde(default)]
    pub instrument: Option<String>,
    #[serde(default)]
    pub granularity: Option<String>,
    pub candles: Vec<OandaCandleRaw>,
}

/// Raw OANDA candlestick. `complete` and `volume` are not retained.
#[derive(Debug, Clone, Deserialize)]
pub struct OandaCandleRaw {
    pub time: String,
    #[serde(default)]
    pub bid: Option<OandaOhlcRaw>,
    #[serde(default)]
    pub ask: Option<OandaOhlcRaw>,
}

/// Raw OANDA candlestick price data, with prices as decimal strings.
#[derive(Debug, Clone, Deserialize)]
pub struct OandaOhlcRaw {
    pub o: String,
    pub h: String,
    pub l: String,
    pub c: String,
}

fn parse_price(field: &str, raw: &str) -> Result<f64, String> {
    raw.parse::<f64>()
        .map_err(|error| format!("failed to parse {field} '{raw}': {error}"))
}

impl TryFrom<OandaOhlcRaw> for Ohlc {
    type Error = String;

    fn try_from(raw: OandaOhlcRaw) -> Result<Self, Self::Error> {
        Ok(Ohlc {
            open: parse_price("o", &raw.o)?,
            high: parse_price("h", &raw.h)?,
            low: parse_price("l", &raw.l)?,
            close: parse_price("c", &raw.c)?,
        })
    }
}

impl TryFrom<OandaCandleRaw> for CandleRow {
    type Error = String;

    fn try_from(raw: OandaCandleRaw) -> Result<Self, Self::Error> {
        let time = DateTime::parse_from_rfc3339(&raw.time)
            .map(|time| time.with_timezone(&Utc))
            .map_err(|error| format!("invalid candle time '{}': {}", raw.time, error))?;

        let bid = raw
            .bid
            .ok_or_else(|| format!("candle at {} is missing bid prices", raw.time))?;

        let ask = raw
            .ask
            .ok_or_else(|| format!("candle at {} is missing ask prices", raw.time))?;

        Ok(CandleRow {
            time,
            bid: Ohlc::try_from(bid)?,
            ask: Ohlc::try_from(ask)?,
        })
    }
}
