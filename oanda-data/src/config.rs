use crate::{
    error::DataError,
    instrument::is_path_segment,
    rest::{Pagination, chunk::MAX_CANDLES_PER_REQUEST},
};
use std::{fmt, num::NonZeroUsize, str::FromStr, time::Duration};

/// OANDA live trading REST host.
pub const OANDA_LIVE_HOST: &str = "https://api-fxtrade.oanda.com";

/// OANDA practice (demo) REST host.
pub const OANDA_PRACTICE_HOST: &str = "https://api-fxpractice.oanda.com";

pub const ENV_ACCOUNT_NUMBER: &str = "OANDA_ACCOUNT_NUMBER";
pub const ENV_API_TOKEN: &str = "OANDA_API_TOKEN";
pub const ENV_ENVIRONMENT: &str = "OANDA_ENVIRONMENT";
pub const ENV_HOST: &str = "OANDA_HOST";
pub const ENV_MAX_REQUEST_SIZE: &str = "OANDA_MAX_REQUEST_SIZE";
pub const ENV_REQUEST_SLEEP_MS: &str = "OANDA_REQUEST_SLEEP_MS";

/// OANDA server environment.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
pub enum OandaEnvironment {
    #[default]
    Live,
    Practice,
}

impl OandaEnvironment {
    pub fn host(&self) -> &'static str {
        match self {
            OandaEnvironment::Live => OANDA_LIVE_HOST,
            OandaEnvironment::Practice => OANDA_PRACTICE_HOST,
        }
    }
}

impl FromStr for OandaEnvironment {
    type Err = DataError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.trim().to_lowercase().as_str() {
            "live" | "fxtrade" => Ok(OandaEnvironment::Live),
            "practice" | "demo" | "fxpractice" => Ok(OandaEnvironment::Practice),
            other => Err(DataError::InvalidConfig {
                name: ENV_ENVIRONMENT,
                reason: format!("expected 'live' or 'practice', got '{other}'"),
            }),
        }
    }
}

/// OANDA account credentials, shared read-only by every request of a client.
#[derive(Clone, PartialEq, Eq)]
pub struct OandaAccount {
    pub account_number: String,
    api_token: String,
}

impl OandaAccount {
    /// Construct an [`OandaAccount`], failing fast if either credential is blank.
    pub fn new<A, T>(account_number: A, api_token: T) -> Result<Self, DataError>
    where
        A: Into<String>,
        T: Into<String>,
    {
        let account_number = account_number.into().trim().to_owned();
        let api_token = api_token.into().trim().to_owned();

        if account_number.is_empty() {
            return Err(DataError::MissingConfig(ENV_ACCOUNT_NUMBER));
        }
        if api_token.is_empty() {
            return Err(DataError::MissingConfig(ENV_API_TOKEN));
        }
        if !is_path_segment(&account_number) {
            return Err(DataError::InvalidConfig {
                name: ENV_ACCOUNT_NUMBER,
                reason: format!("'{account_number}' is not a valid account number"),
            });
        }

        Ok(Self {
            account_number,
            api_token,
        })
    }

    pub fn api_token(&self) -> &str {
        &self.api_token
    }
}

impl fmt::Debug for OandaAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OandaAccount")
            .field("account_number", &self.account_number)
            .field("api_token", &"<redacted>")
            .finish()
    }
}

/// Configuration consumed by [`OandaRestClient`](crate::oanda::OandaRestClient).
#[derive(Clone, Debug)]
pub struct OandaConfig {
    /// REST base URL, eg/ [`OANDA_LIVE_HOST`].
    pub host: String,
    pub account: OandaAccount,
    pub pagination: Pagination,
}

impl OandaConfig {
    pub fn new<H>(host: H, account: OandaAccount) -> Self
    where
        H: Into<String>,
    {
        Self {
            host: host.into(),
            account,
            pagination: Pagination::default(),
        }
    }

    pub fn with_pagination(self, pagination: Pagination) -> Self {
        Self { pagination, ..self }
    }

    /// Load configuration from process environment variables.
    ///
    /// `OANDA_ACCOUNT_NUMBER` and `OANDA_API_TOKEN` are required. The host is `OANDA_HOST` if
    /// set, otherwise derived from `OANDA_ENVIRONMENT` (`live` by default). Pagination can be
    /// tuned with `OANDA_MAX_REQUEST_SIZE` and `OANDA_REQUEST_SLEEP_MS`.
    pub fn from_env() -> Result<Self, DataError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<Lookup>(lookup: Lookup) -> Result<Self, DataError>
    where
        Lookup: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let account = OandaAccount::new(
            var(ENV_ACCOUNT_NUMBER).ok_or(DataError::MissingConfig(ENV_ACCOUNT_NUMBER))?,
            var(ENV_API_TOKEN).ok_or(DataError::MissingConfig(ENV_API_TOKEN))?,
        )?;

        let host = match var(ENV_HOST) {
            Some(host) => host.trim_end_matches('/').to_string(),
            None => var(ENV_ENVIRONMENT)
                .map(|environment| environment.parse::<OandaEnvironment>())
                .transpose()?
                .unwrap_or_default()
                .host()
                .to_string(),
        };

        let mut pagination = Pagination::default();

        if let Some(value) = var(ENV_MAX_REQUEST_SIZE) {
            let max_request_size = value
                .parse::<NonZeroUsize>()
                .map_err(|error| DataError::InvalidConfig {
                    name: ENV_MAX_REQUEST_SIZE,
                    reason: format!("'{value}': {error}"),
                })?;

            if max_request_size.get() > MAX_CANDLES_PER_REQUEST {
                return Err(DataError::InvalidConfig {
                    name: ENV_MAX_REQUEST_SIZE,
                    reason: format!(
                        "{max_request_size} exceeds the per-request limit of {MAX_CANDLES_PER_REQUEST}"
                    ),
                });
            }

            pagination.max_request_size = max_request_size;
        }

        if let Some(value) = var(ENV_REQUEST_SLEEP_MS) {
            pagination.request_sleep = value
                .parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|error| DataError::InvalidConfig {
                    name: ENV_REQUEST_SLEEP_MS,
                    reason: format!("'{value}': {error}"),
                })?;
        }

        Ok(Self {
            host,
            account,
            pagination,
        })
    }
}
