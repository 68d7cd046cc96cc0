use crate::{
    candle::{CandleRow, CandleTable},
    config::OandaConfig,
    error::DataError,
    granularity::Granularity,
    instrument::InstrumentName,
    rest::{
        CandleFetcher, CandleRequest, Pagination, chunk::RequestChunk, fetch_candles,
        stream_candles,
    },
};
use barter_integration::{
    error::SocketError,
    protocol::http::{
        BuildStrategy, HttpParser,
        rest::{RestRequest, client::RestClient},
    },
};
use futures::Stream;
use reqwest::StatusCode;
use serde::{Deserialize, de::DeserializeOwned};
use std::{fmt, sync::Arc};
use tracing::{Instrument, debug, warn};

/// OANDA v20 candles request, raw DTOs, and conversion to [`CandleRow`].
pub mod candles;

/// OANDA REST API error payload.
///
/// Returned by the v20 API when a request fails, e.g.:
/// ```json
/// { "errorMessage": "Invalid value specified for 'granularity'", "errorCode": "..." }
/// ```
#[derive(Debug, Deserialize)]
pub struct OandaApiError {
    #[serde(rename = "errorMessage")]
    pub error_message: String,
    #[serde(rename = "errorCode", default)]
    pub error_code: Option<String>,
}

/// HTTP response parser for OANDA REST API responses.
///
/// Non-2xx statuses become [`DataError::Transport`] carrying the status and the API's error
/// message (or the canonical reason phrase when the body is not an OANDA error payload). 2xx
/// bodies that fail to decode become [`DataError::MalformedResponse`].
#[derive(Debug)]
pub struct OandaHttpParser;

impl HttpParser for OandaHttpParser {
    type ApiError = OandaApiError;
    type OutputError = DataError;

    fn parse<Response>(
        &self,
        status: StatusCode,
        payload: &[u8],
    ) -> Result<Response, Self::OutputError>
    where
        Response: DeserializeOwned,
    {
        if !status.is_success() {
            if let Ok(error) = serde_json::from_slice::<Self::ApiError>(payload) {
                return Err(self.parse_api_error(status, error));
            }

            let reason = status
                .canonical_reason()
                .unwrap_or("unknown status")
                .to_string();
            warn!(%status, reason = %reason, "OANDA request failed");
            return Err(DataError::Transport {
                status: Some(status),
                reason,
            });
        }

        serde_json::from_slice::<Response>(payload).map_err(|error| {
            let payload = String::from_utf8_lossy(payload);
            warn!(%error, %payload, "failed to decode OANDA response");
            DataError::MalformedResponse(format!("{error}: {payload}"))
        })
    }

    fn parse_api_error(&self, status: StatusCode, error: Self::ApiError) -> Self::OutputError {
        warn!(
            %status,
            reason = %error.error_message,
            code = ?error.error_code,
            "OANDA API error"
        );
        DataError::Transport {
            status: Some(status),
            reason: error.error_message,
        }
    }
}

/// [`BuildStrategy`] that attaches `Authorization: Bearer <token>` to every request.
#[derive(Clone)]
pub struct BearerAuth {
    token: String,
}

impl BearerAuth {
    pub fn new<T>(token: T) -> Self
    where
        T: Into<String>,
    {
        Self {
            token: token.into(),
        }
    }
}

impl fmt::Debug for BearerAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BearerAuth")
            .field("token", &"<redacted>")
            .finish()
    }
}

impl BuildStrategy for BearerAuth {
    fn build<Request>(
        &self,
        _: Request,
        builder: reqwest::RequestBuilder,
    ) -> Result<reqwest::Request, SocketError>
    where
        Request: RestRequest,
    {
        builder
            .bearer_auth(&self.token)
            .build()
            .map_err(SocketError::from)
    }
}

/// REST client for the OANDA v20 candles endpoint.
///
/// Holds the account credential and [`Pagination`] settings; every fetch issues its chunk
/// requests sequentially through the same underlying HTTP client.
#[derive(Clone)]
pub struct OandaRestClient {
    pub client: Arc<RestClient<'static, BearerAuth, OandaHttpParser>>,
    pub account_number: Arc<str>,
    pub pagination: Pagination,
}

impl fmt::Debug for OandaRestClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OandaRestClient")
            .field("client", &self.client)
            .field("account_number", &self.account_number)
            .field("pagination", &self.pagination)
            .finish()
    }
}

impl OandaRestClient {
    /// Construct a new [`OandaRestClient`] from an [`OandaConfig`].
    pub fn new(config: &OandaConfig) -> Self {
        let client = RestClient::new(
            config.host.clone(),
            BearerAuth::new(config.account.api_token()),
            OandaHttpParser,
        );

        Self {
            client: Arc::new(client),
            account_number: Arc::from(config.account.account_number.as_str()),
            pagination: config.pagination,
        }
    }

    /// Fetch every candle of `request` into a single ascending [`CandleTable`].
    ///
    /// All-or-nothing: any failing chunk aborts the fetch.
    pub async fn fetch(&self, request: CandleRequest) -> Result<CandleTable, DataError> {
        fetch_candles(self.clone(), request, self.pagination).await
    }

    /// Stream the candles of `request` one chunk batch at a time.
    ///
    /// See [`stream_candles`] for ordering, pacing and termination semantics.
    pub fn stream(
        &self,
        request: CandleRequest,
    ) -> impl Stream<Item = Result<Vec<CandleRow>, DataError>> + Send {
        stream_candles(self.clone(), request, self.pagination)
    }
}

impl CandleFetcher for OandaRestClient {
    /// Fetch the candles of a single [`RequestChunk`] from the OANDA REST API.
    ///
    /// Builds a [`GetCandles`](candles::GetCandles) request for the chunk window, executes it
    /// once (no retry), and converts the raw DTOs into [`CandleRow`]s.
    fn fetch_chunk(
        &self,
        instrument: &InstrumentName,
        granularity: Granularity,
        chunk: RequestChunk,
    ) -> impl std::future::Future<Output = Result<Vec<CandleRow>, DataError>> + Send {
        let this = self.clone();
        let instrument = instrument.clone();
        let span = tracing::debug_span!(
            "fetch_chunk",
            instrument = %instrument,
            granularity = %granularity,
            from = chunk.start.timestamp(),
            to = chunk.end.timestamp(),
        );

        async move {
            let request = candles::GetCandles::new(
                &this.account_number,
                &instrument,
                granularity,
                chunk,
            );

            let response = match this.client.execute(request).await {
                Ok((response, _metric)) => response,
                Err(error) => {
                    warn!(?error, "candles request failed");
                    return Err(error);
                }
            };

            let rows = response
                .candles
                .into_iter()
                .map(CandleRow::try_from)
                .collect::<Result<Vec<_>, _>>()
                .map_err(DataError::MalformedResponse)?;

            debug!(count = rows.len(), "fetched candle chunk");

            Ok(rows)
        }
        .instrument(span)
    }
}
