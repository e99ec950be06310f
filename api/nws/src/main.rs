extern crate pretty_env_logger;
#[macro_use] extern crate log;

use nws::{AlertKind, NwsAlertsAPI};
use std::env;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    pretty_env_logger::init();

    // Optional area filter, e.g. `nws OK`
    let args: Vec<String> = env::args().collect();
    let api = match args.get(1) {
        Some(area) => NwsAlertsAPI::new(
            &format!("{}?area={}", nws::DEFAULT_ALERTS_URL, area),
            nws::DEFAULT_USER_AGENT,
        )?,
        None => NwsAlertsAPI::national()?,
    };

    info!("🌩️  Fetching active alerts from {}", api.source_url());
    let snapshot = api.fetch_active_alerts().await?;

    println!("{} active alerts at {}", snapshot.len(), snapshot.fetched_at());

    for kind in AlertKind::KNOWN.iter() {
        let count = snapshot.records().iter().filter(|record| &record.kind == kind).count();
        if count > 0 {
            println!("  {:<28} {:>4}", kind.label(), count);
        }
    }

    let other = snapshot.records().iter().filter(|record| record.kind.priority().is_none()).count();
    println!("  {:<28} {:>4}", "(other events)", other);
    println!("  {:<28} {:>4}", "(text only)", snapshot.without_geometry().count());

    Ok(())
}
