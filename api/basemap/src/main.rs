extern crate pretty_env_logger;
#[macro_use] extern crate log;

use basemap::{BasemapAPI, CONUS_BBOX, DEFAULT_ZOOM};
use std::path::Path;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    pretty_env_logger::init();

    info!("🗺️  CONUS basemap downloader");

    let api = BasemapAPI::new()?;
    let output_path = Path::new("conus.png");

    match api.load_or_download(CONUS_BBOX, DEFAULT_ZOOM, output_path).await {
        Ok((image, view)) => {
            println!("Basemap {}x{} at zoom {}", image.width(), image.height(), view.zoom);
            let (x, y) = view.project(35.4676, -97.5164);
            println!("Oklahoma City is at pixel ({:.1}, {:.1})", x, y);
        }
        Err(e) => {
            error!("Error downloading basemap: {}", e);
        }
    }

    Ok(())
}
