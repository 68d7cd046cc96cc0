use crate::error::DataError;
use chrono::{DateTime, Days, Months, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// OANDA candlestick granularity.
///
/// Variant names are the provider codes, eg/ `H4` is a 4-hour candle and the bare `M` is a
/// calendar month (not to be confused with `M1`, a one minute candle).
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Deserialize, Serialize)]
pub enum Granularity {
    S5,
    S10,
    S15,
    S30,
    M1,
    M2,
    M4,
    M5,
    M10,
    M15,
    M30,
    H1,
    H2,
    H3,
    H4,
    H6,
    H8,
    H12,
    D,
    W,
    M,
}

impl Granularity {
    /// Every supported [`Granularity`], finest first.
    pub const ALL: [Granularity; 21] = [
        Granularity::S5,
        Granularity::S10,
        Granularity::S15,
        Granularity::S30,
        Granularity::M1,
        Granularity::M2,
        Granularity::M4,
        Granularity::M5,
        Granularity::M10,
        Granularity::M15,
        Granularity::M30,
        Granularity::H1,
        Granularity::H2,
        Granularity::H3,
        Granularity::H4,
        Granularity::H6,
        Granularity::H8,
        Granularity::H12,
        Granularity::D,
        Granularity::W,
        Granularity::M,
    ];

    /// Provider code sent in the `granularity` query parameter.
    pub fn as_str(&self) -> &'static str {
        match self {
            Granularity::S5 => "S5",
            Granularity::S10 => "S10",
            Granularity::S15 => "S15",
            Granularity::S30 => "S30",
            Granularity::M1 => "M1",
            Granularity::M2 => "M2",
            Granularity::M4 => "M4",
            Granularity::M5 => "M5",
            Granularity::M10 => "M10",
            Granularity::M15 => "M15",
            Granularity::M30 => "M30",
            Granularity::H1 => "H1",
            Granularity::H2 => "H2",
            Granularity::H3 => "H3",
            Granularity::H4 => "H4",
            Granularity::H6 => "H6",
            Granularity::H8 => "H8",
            Granularity::H12 => "H12",
            Granularity::D => "D",
            Granularity::W => "W",
            Granularity::M => "M",
        }
    }

    /// Spacing between consecutive candle-open instants of this [`Granularity`].
    pub fn step(&self) -> CandleStep {
        match self {
            Granularity::S5 => CandleStep::Fixed(TimeDelta::seconds(5)),
            Granularity::S10 => CandleStep::Fixed(TimeDelta::seconds(10)),
            Granularity::S15 => CandleStep::Fixed(TimeDelta::seconds(15)),
            Granularity::S30 => CandleStep::Fixed(TimeDelta::seconds(30)),
            Granularity::M1 => CandleStep::Fixed(TimeDelta::minutes(1)),
            Granularity::M2 => CandleStep::Fixed(TimeDelta::minutes(2)),
            Granularity::M4 => CandleStep::Fixed(TimeDelta::minutes(4)),
            Granularity::M5 => CandleStep::Fixed(TimeDelta::minutes(5)),
            Granularity::M10 => CandleStep::Fixed(TimeDelta::minutes(10)),
            Granularity::M15 => CandleStep::Fixed(TimeDelta::minutes(15)),
            Granularity::M30 => CandleStep::Fixed(TimeDelta::minutes(30)),
            Granularity::H1 => CandleStep::Fixed(TimeDelta::hours(1)),
            Granularity::H2 => CandleStep::Fixed(TimeDelta::hours(2)),
            Granularity::H3 => CandleStep::Fixed(TimeDelta::hours(3)),
            Granularity::H4 => CandleStep::Fixed(TimeDelta::hours(4)),
            Granularity::H6 => CandleStep::Fixed(TimeDelta::hours(6)),
            Granularity::H8 => CandleStep::Fixed(TimeDelta::hours(8)),
            Granularity::H12 => CandleStep::Fixed(TimeDelta::hours(12)),
            Granularity::D => CandleStep::Days(1),
            Granularity::W => CandleStep::Days(7),
            Granularity::M => CandleStep::Months(1),
        }
    }
}

impl std::fmt::Display for Granularity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Granularity {
    type Err = DataError;

    fn from_str(code: &str) -> Result<Self, Self::Err> {
        Granularity::ALL
            .into_iter()
            .find(|granularity| granularity.as_str() == code)
            .ok_or_else(|| DataError::UnsupportedGranularity(code.to_owned()))
    }
}

/// Duration between consecutive candles.
///
/// Day, week and month candles are calendar-relative: the `k`-th instant is derived with calendar
/// arithmetic from the origin rather than by repeatedly adding a fixed span, so month lengths
/// never accumulate drift.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum CandleStep {
    Fixed(TimeDelta),
    Days(u64),
    Months(u32),
}

impl CandleStep {
    /// The instant `k` steps after `origin`, or `None` if it is not representable.
    pub fn nth_after(&self, origin: DateTime<Utc>, k: u32) -> Option<DateTime<Utc>> {
        match *self {
            CandleStep::Fixed(delta) => delta
                .checked_mul(i32::try_from(k).ok()?)
                .and_then(|offset| origin.checked_add_signed(offset)),
            CandleStep::Days(days) => {
                origin.checked_add_days(Days::new(days.checked_mul(u64::from(k))?))
            }
            CandleStep::Months(months) => {
                origin.checked_add_months(Months::new(months.checked_mul(k)?))
            }
        }
    }
}

/// Map a provider granularity code to its [`CandleStep`].
///
/// Unrecognised codes fail with [`DataError::UnsupportedGranularity`]; there is no fallback.
pub fn duration_of(code: &str) -> Result<CandleStep, DataError> {
    code.parse::<Granularity>().map(|granularity| granularity.step())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_granularity_codes_round_trip_through_from_str() {
        for granularity in Granularity::ALL {
            assert_eq!(granularity.as_str().parse::<Granularity>().unwrap(), granularity);
            assert_eq!(granularity.to_string(), granularity.as_str());
        }
    }

    #[test]
    fn test_duration_of_fixed_codes() {
        assert_eq!(duration_of("S5").unwrap(), CandleStep::Fixed(TimeDelta::seconds(5)));
        assert_eq!(duration_of("S30").unwrap(), CandleStep::Fixed(TimeDelta::seconds(30)));
        assert_eq!(duration_of("M1").unwrap(), CandleStep::Fixed(TimeDelta::minutes(1)));
        assert_eq!(duration_of("M30").unwrap(), CandleStep::Fixed(TimeDelta::minutes(30)));
        assert_eq!(duration_of("H4").unwrap(), CandleStep::Fixed(TimeDelta::hours(4)));
        assert_eq!(duration_of("H12").unwrap(), CandleStep::Fixed(TimeDelta::hours(12)));
    }

    #[test]
    fn test_duration_of_calendar_codes() {
        assert_eq!(duration_of("D").unwrap(), CandleStep::Days(1));
        assert_eq!(duration_of("W").unwrap(), CandleStep::Days(7));
        assert_eq!(duration_of("M").unwrap(), CandleStep::Months(1));
    }

    #[test]
    fn test_duration_of_is_deterministic() {
        for code in ["H1", "D", "M", "X7"] {
            let first = duration_of(code).map_err(|error| error.to_string());
            let second = duration_of(code).map_err(|error| error.to_string());
            assert_eq!(first, second, "code {code}");
        }
    }

    #[test]
    fn test_duration_of_unsupported_code() {
        for code in ["X7", "", "h1", "M3", "H5", "D1", "MONTH"] {
            match duration_of(code) {
                Err(DataError::UnsupportedGranularity(rejected)) => assert_eq!(rejected, code),
                other => panic!("expected UnsupportedGranularity for {code:?}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_nth_after_month_does_not_drift() {
        let origin = Utc.with_ymd_and_hms(2021, 1, 31, 0, 0, 0).unwrap();
        let step = CandleStep::Months(1);

        assert_eq!(
            step.nth_after(origin, 1).unwrap(),
            Utc.with_ymd_and_hms(2021, 2, 28, 0, 0, 0).unwrap()
        );
        assert_eq!(
            step.nth_after(origin, 2).unwrap(),
            Utc.with_ymd_and_hms(2021, 3, 31, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_nth_after_week_crosses_month_boundary() {
        let origin = Utc.with_ymd_and_hms(2021, 2, 22, 0, 0, 0).unwrap();
        assert_eq!(
            CandleStep::Days(7).nth_after(origin, 1).unwrap(),
            Utc.with_ymd_and_hms(2021, 3, 1, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_nth_after_fixed() {
        let origin = Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(
            CandleStep::Fixed(TimeDelta::hours(4)).nth_after(origin, 3).unwrap(),
            Utc.with_ymd_and_hms(2021, 1, 1, 12, 0, 0).unwrap()
        );
        assert_eq!(CandleStep::Fixed(TimeDelta::hours(4)).nth_after(origin, 0), Some(origin));
    }
}
