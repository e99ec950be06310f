use std::path::Path;
use std::thread;

use basemap::{BasemapAPI, MapView, CONUS_BBOX, DEFAULT_ZOOM};
use slint::ComponentHandle;

use crate::app::utils::decode_png_to_slint_image;
use crate::MainWindow;

/// Basemap cache, relative to the working directory
pub const MAP_CACHE: &str = "ui/images/conus.png";

/// Pixel space every polygon is drawn in
pub fn map_view() -> MapView {
    MapView::for_bbox(CONUS_BBOX, DEFAULT_ZOOM)
}

async fn fetch_map_image(path: &Path) -> Result<Vec<u8>, anyhow::Error> {
    let api = BasemapAPI::new()?;
    let (_, view) = api.load_or_download(CONUS_BBOX, DEFAULT_ZOOM, path).await?;
    debug!("Basemap is {}x{} at zoom {}", view.width, view.height, view.zoom);
    Ok(std::fs::read(path)?)
}

/// Load the basemap on a background thread and show it when ready
pub fn load_map_in_background(main_window: &MainWindow) {
    let view = map_view();
    main_window.set_map_width(view.width as f32);
    main_window.set_map_height(view.height as f32);

    let main_window_weak = main_window.as_weak();
    let spawned = thread::Builder::new().name("basemap".to_string()).spawn(move || {
        let result = tokio::runtime::Runtime::new()
            .map_err(anyhow::Error::from)
            .and_then(|rt| rt.block_on(fetch_map_image(Path::new(MAP_CACHE))));

        let posted = slint::invoke_from_event_loop(move || {
            let Some(window) = main_window_weak.upgrade() else {
                return;
            };
            match result {
                Ok(image_data) => set_map_image(&window, image_data),
                Err(e) => {
                    error!("Failed to load basemap: {}", e);
                    window.set_error_message(format!("Failed to load map image: {}", e).into());
                }
            }
        });
        if posted.is_err() {
            debug!("Window closed before the basemap loaded");
        }
    });

    if let Err(e) = spawned {
        error!("Failed to start basemap loader: {}", e);
    }
}

pub fn set_map_image(main_window: &MainWindow, image_data: Vec<u8>) {
    match decode_png_to_slint_image(&image_data) {
        Ok(image) => {
            info!("Basemap ready");
            main_window.set_map_image(image);
        }
        Err(e) => error!("Failed to decode map image: {}", e),
    }
}
