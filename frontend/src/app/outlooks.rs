use std::thread;

use alert_overlay::RenderQueue;
use slint::{ComponentHandle, ModelRc, SharedString, VecModel};
use spc::{OutlookProduct, SpcOutlookAPI, CATALOG};

use crate::app::status::refresh_status;
use crate::app::surface::{with_registry, Registry, SlintQueue};
use crate::MainWindow;

/// Picker entries, one per catalog product and in catalog order
pub fn outlook_menu_items() -> Vec<SharedString> {
    CATALOG
        .iter()
        .map(|product| format!("{}: {}", product.category.label(), product.label).into())
        .collect()
}

pub fn setup_outlook_callbacks(main_window: &MainWindow, queue: SlintQueue) {
    main_window.set_outlook_products(ModelRc::new(VecModel::from(outlook_menu_items())));

    main_window.on_load_outlook(move |index| {
        match usize::try_from(index).ok().and_then(|i| CATALOG.get(i)) {
            Some(product) => load_outlook(*product, queue),
            None => warn!("No outlook product at index {}", index),
        }
    });

    let main_window_weak = main_window.as_weak();
    main_window.on_clear_outlooks(move || {
        with_registry(|registry| {
            let removed = registry.clear_outlooks();
            info!("Cleared {} outlook polygons", removed);
            if let Some(window) = main_window_weak.upgrade() {
                refresh_status(&window, registry);
            }
        });
    });
}

/// Fetch an outlook off the UI thread, then swap it in on the event loop
fn load_outlook(product: OutlookProduct, queue: SlintQueue) {
    info!("Loading {} {}", product.category.label(), product.label);

    let spawned = thread::Builder::new().name("outlook-fetch".to_string()).spawn(move || {
        let rt = match tokio::runtime::Runtime::new() {
            Ok(rt) => rt,
            Err(e) => {
                error!("Failed to start runtime for outlook fetch: {}", e);
                return;
            }
        };

        let result = rt.block_on(async {
            let api = SpcOutlookAPI::new()?;
            api.fetch_outlook(&product).await
        });

        match result {
            Ok(polygons) => {
                info!("Fetched {} polygons for {}", polygons.len(), product.label);
                let replaced = queue.post(Box::new(move |registry: &mut Registry| {
                    registry.replace_outlooks(polygons);
                }));
                if replaced.is_err() {
                    warn!("Window closed before the {} outlook arrived", product.label);
                }
            }
            Err(e) => error!("Failed to load outlook {}: {}", product.label, e),
        }
    });

    if let Err(e) = spawned {
        error!("Failed to start outlook fetch: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_menu_matches_catalog() {
        let items = outlook_menu_items();
        assert_eq!(items.len(), CATALOG.len());
        assert_eq!(items[0].as_str(), "(SPC) Convective Outlook: Day 1: Categorical");
    }
}
