use futures::StreamExt;
use oanda_data::{
    candle::PriceSide,
    config::OandaConfig,
    granularity::Granularity,
    oanda::OandaRestClient,
    range::TimeRange,
    rest::CandleRequest,
};
use tracing::{info, warn};
use tracing_subscriber::filter::{EnvFilter, LevelFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialise INFO Tracing log subscriber
    init_logging();

    // Load OANDA_ACCOUNT_NUMBER & OANDA_API_TOKEN from .env if present
    if let Err(error) = dotenv::dotenv() {
        warn!(%error, "no .env file loaded, using process environment");
    }

    let config = OandaConfig::from_env()?;
    let client = OandaRestClient::new(&config);

    let range = TimeRange::from_iso("2019-12-10T00:00:00", "2021-03-01T00:00:00")?;

    // Fetch the full range into a single table
    let table = client
        .fetch(CandleRequest::new("EUR_USD", Granularity::H8, range)?)
        .await?;

    let asks = table.bars(PriceSide::Ask);
    info!(
        candles = table.len(),
        first = ?asks.first(),
        last = ?asks.last(),
        "fetched EUR_USD H8 ask bars"
    );

    // Stream a shorter range chunk by chunk
    let range = TimeRange::from_iso("2021-01-04T00:00:00", "2021-01-08T00:00:00")?;
    let mut batches = std::pin::pin!(client.stream(CandleRequest::new(
        "GBP_USD",
        Granularity::M5,
        range,
    )?));

    while let Some(batch) = batches.next().await {
        match batch {
            Ok(rows) => info!(
                count = rows.len(),
                first = ?rows.first().map(|row| row.time),
                "received GBP_USD M5 batch"
            ),
            Err(error) => {
                warn!(%error, "GBP_USD M5 stream failed");
                break;
            }
        }
    }

    Ok(())
}

fn init_logging() {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .json()
        .init()
}
