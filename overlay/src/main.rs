extern crate pretty_env_logger;
#[macro_use] extern crate log;

use alert_overlay::{round_trip, spawn_alert_poller, AlertConfig, MemorySurface, OverlayRegistry, ThreadQueue};
use anyhow::anyhow;
use nws::{AlertKind, NwsAlertsAPI};
use std::collections::BTreeMap;
use std::time::Duration;

type Registry = OverlayRegistry<MemorySurface>;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    pretty_env_logger::init();

    let config = AlertConfig::load()?;
    let source = NwsAlertsAPI::new(&config.source_url, &config.user_agent)?;

    info!("🗺️  Tracking alerts from {} every {}s", config.source_url, config.fetch_interval_seconds);

    let (queue, render_thread) = ThreadQueue::spawn("render", || Registry::new(MemorySurface::new()))?;
    let poller = spawn_alert_poller(&config, source, queue.clone())?;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut check = tokio::time::interval(Duration::from_millis(500));

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                info!("🛑 Interrupted, stopping the poller");
                poller.shutdown();
                break;
            }
            _ = check.tick() => {
                if poller.is_finished() {
                    break;
                }
            }
        }
    }

    let summary = tokio::task::spawn_blocking(move || poller.join())
        .await?
        .map_err(|_| anyhow!("alert poller panicked"))?;

    println!(
        "Stopped ({:?}) after {} cycles, {} applied, {} failed fetches",
        summary.stop, summary.cycles, summary.applied, summary.failed_fetches
    );

    let (by_kind, text_only) = round_trip(&queue, |registry: &mut Registry| {
        let mut by_kind: BTreeMap<String, usize> = BTreeMap::new();
        for record in registry.alerts() {
            *by_kind.entry(record.kind.label().to_string()).or_default() += 1;
        }
        (by_kind, registry.text_only_len())
    })
    .await?;

    for kind in AlertKind::KNOWN.iter() {
        if let Some(count) = by_kind.get(kind.label()) {
            println!("  {:<28} {:>4}", kind.label(), count);
        }
    }
    println!("  {:<28} {:>4}", "(text only)", text_only);

    drop(queue);
    if render_thread.join().is_err() {
        error!("Render thread panicked");
    }

    Ok(())
}
