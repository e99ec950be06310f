use std::time::Duration;

use chrono::Local;
use slint::{ComponentHandle, Timer, TimerMode};

use crate::app::surface::Registry;
use crate::MainWindow;

pub fn refresh_status(main_window: &MainWindow, registry: &Registry) {
    let status = format!(
        "{} alert polygons, {} alerts without polygons, {} outlook polygons | updated {}",
        registry.len(),
        registry.text_only_len(),
        registry.outlook_len(),
        Local::now().format("%H:%M:%S")
    );
    main_window.set_status_text(status.into());
}

/// Tick the clock once a second; the timer stops when dropped
pub fn start_clock(main_window: &MainWindow) -> Timer {
    let main_window_weak = main_window.as_weak();
    let timer = Timer::default();
    timer.start(TimerMode::Repeated, Duration::from_secs(1), move || {
        if let Some(window) = main_window_weak.upgrade() {
            window.set_clock_text(Local::now().format("%a %b %d  %I:%M:%S %p").to_string().into());
        }
    });
    timer
}
