//! # Oanda-Data
//! Historical FX candle retrieval from the OANDA v20 REST API.
//!
//! The candles endpoint caps how many candles a single request may return, so a long
//! [`TimeRange`](range::TimeRange) is split into a grid of candle-open instants, partitioned into
//! bounded [`RequestChunk`](rest::chunk::RequestChunk)s, and fetched strictly sequentially with a
//! fixed pause between requests. The batches are concatenated, in request order, into a single
//! ascending [`CandleTable`](candle::CandleTable).
//!
//! ## Example
//! ```rust,no_run
//! use oanda_data::{
//!     config::OandaConfig,
//!     granularity::Granularity,
//!     oanda::OandaRestClient,
//!     range::TimeRange,
//!     rest::CandleRequest,
//! };
//!
//! # async fn run() -> Result<(), oanda_data::error::DataError> {
//! let config = OandaConfig::from_env()?;
//! let client = OandaRestClient::new(&config);
//!
//! let request = CandleRequest::new(
//!     "EUR_USD",
//!     Granularity::H8,
//!     TimeRange::from_iso("2019-12-10T00:00:00", "2021-03-01T00:00:00")?,
//! )?;
//!
//! let table = client.fetch(request).await?;
//! println!("fetched {} candles", table.len());
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]

/// Normalised bid/ask [`CandleRow`](candle::CandleRow) and the ordered
/// [`CandleTable`](candle::CandleTable) produced by a fetch.
pub mod candle;

/// Client configuration, including account credentials and pagination settings.
pub mod config;

/// All [`Error`](std::error::Error)s generated in Oanda-Data.
pub mod error;

/// Provider [`Granularity`](granularity::Granularity) codes and their
/// [`CandleStep`](granularity::CandleStep) durations.
pub mod granularity;

/// Instrument identifiers understood by the candles endpoint.
pub mod instrument;

/// OANDA v20 REST client, request definitions and raw response DTOs.
pub mod oanda;

/// Inclusive [`TimeRange`](range::TimeRange) of instants.
pub mod range;

/// Provider-agnostic pagination: [`CandleFetcher`](rest::CandleFetcher) seam, chunk planning and
/// the sequential, paced fetch driver.
pub mod rest;
