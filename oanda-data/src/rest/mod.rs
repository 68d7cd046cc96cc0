use crate::{
    candle::{CandleRow, CandleTable},
    error::DataError,
    granularity::Granularity,
    instrument::InstrumentName,
    range::TimeRange,
};
use futures::{
    TryStreamExt,
    stream::{self, Stream},
};
use std::{future::Future, num::NonZeroUsize, time::Duration};
use tokio::time::{Instant, sleep, timeout_at};
use tracing::{Instrument, Span, debug, info, warn};

/// Timestamp grid construction and partitioning into bounded [`RequestChunk`](chunk::RequestChunk)s.
pub mod chunk;

use chunk::{MAX_REQUEST_SIZE, RequestChunk, plan_chunks};

/// Default pause between consecutive chunk requests.
pub const REQUEST_SLEEP: Duration = Duration::from_secs(1);

/// Request parameters for fetching historical candles over a time range.
#[derive(Clone, Debug)]
pub struct CandleRequest {
    pub instrument: InstrumentName,
    pub granularity: Granularity,
    /// Inclusive range of candle-open instants.
    pub range: TimeRange,
    /// Optional deadline, checked between chunk requests. The pause between requests never
    /// outlasts it.
    pub deadline: Option<Instant>,
}

impl CandleRequest {
    pub fn new<S>(
        instrument: S,
        granularity: Granularity,
        range: TimeRange,
    ) -> Result<Self, DataError>
    where
        S: AsRef<str>,
    {
        Ok(Self {
            instrument: InstrumentName::new(instrument)?,
            granularity,
            range,
            deadline: None,
        })
    }

    pub fn with_deadline(self, deadline: Instant) -> Self {
        Self {
            deadline: Some(deadline),
            ..self
        }
    }
}

/// Pagination settings shared by every fetch of a client.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct Pagination {
    /// Maximum number of grid points covered by one request.
    pub max_request_size: NonZeroUsize,
    /// Fixed pause between consecutive requests.
    pub request_sleep: Duration,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            max_request_size: NonZeroUsize::new(MAX_REQUEST_SIZE).unwrap_or(NonZeroUsize::MIN),
            request_sleep: REQUEST_SLEEP,
        }
    }
}

/// Trait for fetching the candles of a single [`RequestChunk`] from a provider.
pub trait CandleFetcher {
    /// Fetch the candles opening within `chunk`, in ascending time order.
    fn fetch_chunk(
        &self,
        instrument: &InstrumentName,
        granularity: Granularity,
        chunk: RequestChunk,
    ) -> impl Future<Output = Result<Vec<CandleRow>, DataError>> + Send;
}

/// Internal pagination state used by [`stream_candles`] to walk the planned chunks.
struct PaginationState<Fetcher> {
    fetcher: Fetcher,
    instrument: InstrumentName,
    granularity: Granularity,
    chunks: std::vec::IntoIter<RequestChunk>,
    total: usize,
    completed: usize,
    request_sleep: Duration,
    deadline: Option<Instant>,
    done: bool,
    span: Span,
}

impl<Fetcher> PaginationState<Fetcher> {
    fn deadline_exceeded(&mut self) -> Option<DataError> {
        let deadline = self.deadline?;
        if Instant::now() < deadline {
            return None;
        }

        self.done = true;
        Some(DataError::DeadlineExceeded {
            completed: self.completed,
            total: self.total,
        })
    }
}

/// Stream the candles of `request` one chunk batch at a time.
///
/// Chunks are requested strictly sequentially in ascending time order, pausing
/// `pagination.request_sleep` between consecutive requests. Rows outside a chunk's window are
/// dropped, so an instant shared by two adjacent chunks is yielded once. The stream terminates
/// after the last chunk, or on the first error (which is yielded before stopping). Dropping the
/// stream cancels the fetch between requests.
pub fn stream_candles<Fetcher>(
    fetcher: Fetcher,
    request: CandleRequest,
    pagination: Pagination,
) -> impl Stream<Item = Result<Vec<CandleRow>, DataError>> + Send
where
    Fetcher: CandleFetcher + Send + Sync + 'static,
{
    let chunks = plan_chunks(
        &request.range,
        request.granularity,
        pagination.max_request_size,
    );

    let span = tracing::info_span!(
        "stream_candles",
        instrument = %request.instrument,
        granularity = %request.granularity,
    );

    span.in_scope(|| {
        info!(
            start = %request.range.start(),
            end = %request.range.end(),
            chunks = chunks.len(),
            "starting candle pagination"
        )
    });

    let state = PaginationState {
        fetcher,
        instrument: request.instrument,
        granularity: request.granularity,
        total: chunks.len(),
        chunks: chunks.into_iter(),
        completed: 0,
        request_sleep: pagination.request_sleep,
        deadline: request.deadline,
        done: false,
        span,
    };

    stream::unfold(state, |mut state| {
        let span = state.span.clone();
        async move {
            if state.done {
                return None;
            }

            let chunk = state.chunks.next()?;

            if state.completed > 0 {
                if let Some(error) = state.deadline_exceeded() {
                    warn!(?error, "candle pagination aborted");
                    return Some((Err(error), state));
                }
                match state.deadline {
                    Some(deadline) => {
                        let _ = timeout_at(deadline, sleep(state.request_sleep)).await;
                    }
                    None => sleep(state.request_sleep).await,
                }
            }

            if let Some(error) = state.deadline_exceeded() {
                warn!(?error, "candle pagination aborted");
                return Some((Err(error), state));
            }

            debug!(
                index = state.completed,
                total = state.total,
                start = %chunk.start,
                end = %chunk.end,
                "requesting candle chunk"
            );

            let rows = match state
                .fetcher
                .fetch_chunk(&state.instrument, state.granularity, chunk)
                .await
            {
                Ok(rows) => rows,
                Err(error) => {
                    warn!(?error, index = state.completed, "candle chunk fetch failed");
                    state.done = true;
                    return Some((Err(error), state));
                }
            };

            let received = rows.len();
            let rows = rows
                .into_iter()
                .filter(|row| chunk.contains(row.time))
                .collect::<Vec<_>>();

            if rows.len() != received {
                debug!(
                    dropped = received - rows.len(),
                    "dropped candles outside chunk window"
                );
            }

            state.completed += 1;
            if state.completed == state.total {
                debug!("candle pagination complete");
            }

            Some((Ok(rows), state))
        }
        .instrument(span)
    })
}

/// Fetch every candle of `request` into a single [`CandleTable`].
///
/// All-or-nothing: the first failing chunk aborts the fetch and no partial table is returned.
pub async fn fetch_candles<Fetcher>(
    fetcher: Fetcher,
    request: CandleRequest,
    pagination: Pagination,
) -> Result<CandleTable, DataError>
where
    Fetcher: CandleFetcher + Send + Sync + 'static,
{
    let rows = stream_candles(fetcher, request, pagination)
        .try_fold(Vec::new(), |mut rows, batch| async move {
            rows.extend(batch);
            Ok(rows)
        })
        .await?;

    let table = CandleTable::from_rows(rows)?;
    debug!(count = table.len(), "fetched candle table");

    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candle::Ohlc;
    use chrono::{DateTime, TimeDelta, TimeZone, Utc};
    use futures::StreamExt;
    use reqwest::StatusCode;
    use std::sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    };

    fn hour(n: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap() + TimeDelta::hours(n)
    }

    fn row(time: DateTime<Utc>) -> CandleRow {
        let ohlc = Ohlc {
            open: 1.0,
            high: 1.0,
            low: 1.0,
            close: 1.0,
        };
        CandleRow {
            time,
            bid: ohlc,
            ask: ohlc,
        }
    }

    fn pagination(max: usize, request_sleep: Duration) -> Pagination {
        Pagination {
            max_request_size: NonZeroUsize::new(max).unwrap(),
            request_sleep,
        }
    }

    fn five_hour_request() -> CandleRequest {
        CandleRequest::new(
            "EUR_USD",
            Granularity::H1,
            TimeRange::new(hour(0), hour(5)).unwrap(),
        )
        .unwrap()
    }

    /// In-memory provider serving an hourly candle for every instant in `[start, end]`
    /// (boundaries inclusive, like a provider that ignores exclusive ends).
    #[derive(Clone, Default)]
    struct InclusiveFetcher {
        calls: Arc<Mutex<Vec<RequestChunk>>>,
        fail_on_call: Option<usize>,
    }

    impl CandleFetcher for InclusiveFetcher {
        fn fetch_chunk(
            &self,
            _: &InstrumentName,
            _: Granularity,
            chunk: RequestChunk,
        ) -> impl Future<Output = Result<Vec<CandleRow>, DataError>> + Send {
            let this = self.clone();
            async move {
                let call = {
                    let mut calls = this.calls.lock().unwrap();
                    calls.push(chunk);
                    calls.len()
                };

                if this.fail_on_call == Some(call) {
                    return Err(DataError::Transport {
                        status: Some(StatusCode::SERVICE_UNAVAILABLE),
                        reason: "Service Unavailable".to_string(),
                    });
                }

                let mut rows = Vec::new();
                let mut time = chunk.start;
                while time <= chunk.end {
                    rows.push(row(time));
                    time += TimeDelta::hours(1);
                }
                Ok(rows)
            }
        }
    }

    #[tokio::test]
    async fn test_fetch_candles_deduplicates_chunk_boundaries() {
        let fetcher = InclusiveFetcher::default();

        let table = fetch_candles(
            fetcher.clone(),
            five_hour_request(),
            pagination(2, Duration::ZERO),
        )
        .await
        .unwrap();

        assert_eq!(
            table.times().collect::<Vec<_>>(),
            (0..=5).map(hour).collect::<Vec<_>>()
        );
        assert_eq!(fetcher.calls.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_stream_candles_issues_chunks_in_ascending_order() {
        let fetcher = InclusiveFetcher::default();

        let batches = stream_candles(
            fetcher.clone(),
            five_hour_request(),
            pagination(2, Duration::ZERO),
        )
        .collect::<Vec<_>>()
        .await;

        let starts = fetcher
            .calls
            .lock()
            .unwrap()
            .iter()
            .map(|chunk| chunk.start)
            .collect::<Vec<_>>();
        assert_eq!(starts, vec![hour(0), hour(2), hour(4)]);

        let batches = batches.into_iter().collect::<Result<Vec<_>, _>>().unwrap();
        assert_eq!(batches.len(), 3);
        for pair in batches.windows(2) {
            let previous_last = pair[0].last().unwrap().time;
            assert!(pair[1].iter().all(|row| row.time > previous_last));
        }
    }

    #[tokio::test]
    async fn test_fetch_candles_failure_returns_no_partial_table() {
        let fetcher = InclusiveFetcher {
            fail_on_call: Some(2),
            ..Default::default()
        };

        let result = fetch_candles(
            fetcher.clone(),
            five_hour_request(),
            pagination(2, Duration::ZERO),
        )
        .await;

        match result {
            Err(DataError::Transport { status, .. }) => {
                assert_eq!(status, Some(StatusCode::SERVICE_UNAVAILABLE))
            }
            other => panic!("expected Transport error, got {other:?}"),
        }

        // The third chunk is never requested
        assert_eq!(fetcher.calls.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_stream_candles_stops_after_first_error() {
        let fetcher = InclusiveFetcher {
            fail_on_call: Some(1),
            ..Default::default()
        };

        let items = stream_candles(fetcher, five_hour_request(), pagination(2, Duration::ZERO))
            .collect::<Vec<_>>()
            .await;

        assert_eq!(items.len(), 1);
        assert!(items[0].is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stream_candles_sleeps_between_requests() {
        let started = Instant::now();

        let table = fetch_candles(
            InclusiveFetcher::default(),
            five_hour_request(),
            pagination(2, Duration::from_secs(1)),
        )
        .await
        .unwrap();

        assert_eq!(table.len(), 6);
        // 3 chunks, 2 pauses
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(2), "elapsed {elapsed:?}");
        assert!(elapsed < Duration::from_secs(3), "elapsed {elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_candles_aborts_on_deadline() {
        let fetcher = InclusiveFetcher::default();
        let request =
            five_hour_request().with_deadline(Instant::now() + Duration::from_millis(1500));

        let result = fetch_candles(
            fetcher.clone(),
            request,
            pagination(2, Duration::from_secs(1)),
        )
        .await;

        match result {
            Err(DataError::DeadlineExceeded { completed, total }) => {
                assert_eq!(completed, 2);
                assert_eq!(total, 3);
            }
            other => panic!("expected DeadlineExceeded, got {other:?}"),
        }
        assert_eq!(fetcher.calls.lock().unwrap().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_candles_deadline_cuts_request_sleep_short() {
        let fetcher = InclusiveFetcher::default();
        let started = Instant::now();
        let deadline = started + Duration::from_millis(1500);

        let result = fetch_candles(
            fetcher.clone(),
            five_hour_request().with_deadline(deadline),
            pagination(2, Duration::from_secs(10)),
        )
        .await;

        match result {
            Err(DataError::DeadlineExceeded { completed, total }) => {
                assert_eq!(completed, 1);
                assert_eq!(total, 3);
            }
            other => panic!("expected DeadlineExceeded, got {other:?}"),
        }
        assert!(Instant::now() <= deadline + Duration::from_millis(1));
        assert_eq!(fetcher.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_fetch_candles_rejects_out_of_order_provider() {
        #[derive(Clone)]
        struct ReversedFetcher;

        impl CandleFetcher for ReversedFetcher {
            fn fetch_chunk(
                &self,
                _: &InstrumentName,
                _: Granularity,
                chunk: RequestChunk,
            ) -> impl Future<Output = Result<Vec<CandleRow>, DataError>> + Send {
                async move {
                    Ok(vec![
                        row(chunk.start + TimeDelta::hours(1)),
                        row(chunk.start),
                    ])
                }
            }
        }

        let result = fetch_candles(
            ReversedFetcher,
            five_hour_request(),
            pagination(10, Duration::ZERO),
        )
        .await;
        assert!(matches!(result, Err(DataError::MalformedResponse(_))));
    }

    #[tokio::test]
    async fn test_fetch_candles_single_instant_range() {
        let calls = Arc::new(AtomicUsize::new(0));

        #[derive(Clone)]
        struct CountingFetcher(Arc<AtomicUsize>);

        impl CandleFetcher for CountingFetcher {
            fn fetch_chunk(
                &self,
                _: &InstrumentName,
                _: Granularity,
                chunk: RequestChunk,
            ) -> impl Future<Output = Result<Vec<CandleRow>, DataError>> + Send {
                self.0.fetch_add(1, Ordering::SeqCst);
                async move { Ok(vec![row(chunk.start)]) }
            }
        }

        let request = CandleRequest::new(
            "EUR_USD",
            Granularity::D,
            TimeRange::new(hour(0), hour(0)).unwrap(),
        )
        .unwrap();

        let table = fetch_candles(
            CountingFetcher(Arc::clone(&calls)),
            request,
            Pagination::default(),
        )
        .await
        .unwrap();

        assert_eq!(table.len(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
