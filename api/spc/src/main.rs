extern crate pretty_env_logger;
#[macro_use] extern crate log;

use spc::{find_product, products_in, OutlookCategory, SpcOutlookAPI};
use std::env;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    pretty_env_logger::init();

    let label = env::args().nth(1).unwrap_or_else(|| "Day 1: Categorical".to_string());

    let Some(product) = find_product(OutlookCategory::Convective, &label)
        .or_else(|| find_product(OutlookCategory::FireWeather, &label))
    else {
        println!("Unknown outlook {:?}. Available:", label);
        for category in [OutlookCategory::Convective, OutlookCategory::FireWeather] {
            println!("{}", category.label());
            for product in products_in(category) {
                println!("  {}", product.label);
            }
        }
        return Ok(());
    };

    let api = SpcOutlookAPI::new()?;
    info!("📡 Fetching {}", product.label);

    let polygons = api.fetch_outlook(product).await?;
    for polygon in &polygons {
        println!(
            "{:<6} {:<24} {:>4} vertices  valid {:?} to {:?}",
            polygon.label,
            polygon.name.as_deref().unwrap_or("-"),
            polygon.vertices.len(),
            polygon.valid,
            polygon.expire
        );
    }

    Ok(())
}
