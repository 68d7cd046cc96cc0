use crate::{
    granularity::{CandleStep, Granularity},
    range::TimeRange,
};
use chrono::{DateTime, Utc};
use std::num::NonZeroUsize;

/// Default cap on the number of grid points covered by a single candles request.
pub const MAX_REQUEST_SIZE: usize = 2500;

/// Most candles the v20 candles endpoint serves for a single request.
pub const MAX_CANDLES_PER_REQUEST: usize = 5000;

/// Contiguous sub-range of a timestamp grid fetched with a single request.
///
/// `start` is inclusive. `end` is exclusive, except for the final chunk of a plan whose end is the
/// (inclusive) end of the requested [`TimeRange`]. Consecutive chunks share a boundary instant,
/// which therefore belongs to exactly one of them.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct RequestChunk {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub end_inclusive: bool,
}

impl RequestChunk {
    /// Whether a candle opening at `instant` belongs to this chunk.
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        if instant < self.start {
            return false;
        }

        if self.end_inclusive {
            instant <= self.end
        } else {
            instant < self.end
        }
    }
}

/// Ascending candle-open instants `start, start + Δ, ...` not exceeding `range.end()`.
///
/// `range.end()` is appended when the range is not an exact multiple of the step, so the grid
/// always starts at `range.start()` and ends at `range.end()`.
pub fn timestamp_grid(range: &TimeRange, step: CandleStep) -> Vec<DateTime<Utc>> {
    let mut grid: Vec<DateTime<Utc>> = Vec::new();

    for k in 0_u32.. {
        let Some(instant) = step.nth_after(range.start(), k) else {
            break;
        };

        // Guards against non-advancing steps, eg/ a zero length CandleStep::Fixed
        if instant > range.end() || grid.last().is_some_and(|last| *last >= instant) {
            break;
        }

        grid.push(instant);
    }

    if grid.last() != Some(&range.end()) {
        grid.push(range.end());
    }

    grid
}

/// Partition a timestamp grid into [`RequestChunk`]s.
///
/// Anchors are taken at every `max_request_size`-th grid point. Consecutive anchors bound an
/// end-exclusive chunk, and the last anchor opens the final chunk, which runs inclusively to the
/// last grid point. Every chunk therefore covers at most `max_request_size` grid points. A grid
/// holding a single instant yields one degenerate chunk `[t, t]`.
pub fn request_chunks(
    grid: &[DateTime<Utc>],
    max_request_size: NonZeroUsize,
) -> Vec<RequestChunk> {
    let Some(last) = grid.last().copied() else {
        return Vec::new();
    };

    let anchors = grid
        .iter()
        .step_by(max_request_size.get())
        .copied()
        .collect::<Vec<_>>();

    let mut chunks = anchors
        .windows(2)
        .map(|pair| RequestChunk {
            start: pair[0],
            end: pair[1],
            end_inclusive: false,
        })
        .collect::<Vec<_>>();

    if let Some(start) = anchors.last().copied() {
        chunks.push(RequestChunk {
            start,
            end: last,
            end_inclusive: true,
        });
    }

    chunks
}

/// Plan the [`RequestChunk`]s needed to cover `range` at `granularity`.
pub fn plan_chunks(
    range: &TimeRange,
    granularity: Granularity,
    max_request_size: NonZeroUsize,
) -> Vec<RequestChunk> {
    request_chunks(&timestamp_grid(range, granularity.step()), max_request_size)
}
