mod app;

slint::include_modules!();

#[macro_use] extern crate log;

use alert_overlay::{logging, spawn_alert_poller, AlertConfig};
use log::LevelFilter;
use nws::NwsAlertsAPI;
use slint::ComponentHandle;

use app::surface::{Registry, SlintQueue, SlintSurface};

fn main() -> Result<(), anyhow::Error> {
    let debug_log = logging::init_with_debug_log(LevelFilter::Info)?;

    info!("Starting WarningNav...");

    let config = AlertConfig::load()?;
    let source = NwsAlertsAPI::new(&config.source_url, &config.user_agent)?;

    let main_window = MainWindow::new()?;

    // The registry lives on this thread for the lifetime of the event loop
    let mut registry = Registry::new(SlintSurface::new(app::map::map_view()));
    main_window.set_polygons(registry.surface().model());
    registry.set_on_select(app::alerts::popup_hook(&main_window));
    app::surface::install_registry(registry, &main_window);

    app::map::load_map_in_background(&main_window);
    app::alerts::setup_alert_callbacks(&main_window);

    let queue = SlintQueue;
    app::outlooks::setup_outlook_callbacks(&main_window, queue);

    let _debug_log_viewer = app::debug_log::setup_debug_log(&main_window, debug_log)?;
    let _clock = app::status::start_clock(&main_window);

    // Closing the map ends the app even while the debug log is open
    main_window.window().on_close_requested(|| {
        if let Err(e) = slint::quit_event_loop() {
            error!("Failed to stop the event loop: {}", e);
        }
        slint::CloseRequestResponse::HideWindow
    });

    let poller = spawn_alert_poller(&config, source, queue)?;

    info!("WarningNav started, polling {} every {}s", config.source_url, config.fetch_interval_seconds);

    // Run the main window - this blocks until the window is closed
    let result = main_window.run();

    info!("Main window closed, stopping the alert poller...");
    poller.shutdown();
    match poller.join() {
        Ok(summary) => info!(
            "Alert poller stopped ({:?}) after {} cycles, {} failed fetches",
            summary.stop, summary.cycles, summary.failed_fetches
        ),
        Err(_) => error!("Alert poller panicked"),
    }
    app::surface::remove_registry();

    Ok(result?)
}
