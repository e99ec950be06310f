use chrono::{DateTime, FixedOffset, Local};
use nws::AlertRecord;
use slint::ComponentHandle;

use crate::app::status::refresh_status;
use crate::app::surface::with_registry;
use crate::MainWindow;

/// Select hook for the registry: opens the alert popup
pub fn popup_hook(main_window: &MainWindow) -> impl FnMut(&AlertRecord) + 'static {
    let main_window_weak = main_window.as_weak();
    move |record: &AlertRecord| {
        if let Some(window) = main_window_weak.upgrade() {
            show_alert_popup(&window, record);
        }
    }
}

fn show_alert_popup(main_window: &MainWindow, record: &AlertRecord) {
    info!("Showing {} ({})", record.kind, record.id);
    main_window.set_popup_title(record.kind.label().into());
    main_window.set_popup_headline(record.headline.as_str().into());
    main_window.set_popup_sender(record.sender.as_str().into());
    main_window.set_popup_times(format_times(record).into());
    main_window.set_popup_description(record.description.as_str().into());
    main_window.set_show_popup(true);
}

fn format_times(record: &AlertRecord) -> String {
    let times: [(&str, Option<DateTime<FixedOffset>>); 4] = [
        ("Sent", record.time_sent),
        ("Effective", record.time_effective),
        ("Onset", record.time_onset),
        ("Expires", record.time_expires),
    ];

    times
        .iter()
        .filter_map(|(name, time)| {
            time.map(|time| format!("{}: {}", name, time.with_timezone(&Local).format("%b %d %I:%M %p")))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn setup_alert_callbacks(main_window: &MainWindow) {
    main_window.on_map_clicked(move |fx, fy| {
        with_registry(|registry| {
            let view = registry.surface().view();
            let x = fx as f64 * view.width as f64;
            let y = fy as f64 * view.height as f64;

            match registry.surface().hit_test(x, y) {
                Some(key) => {
                    debug!("Map click at ({:.0}, {:.0}) hit {}", x, y, key);
                    registry.handle_click(&key);
                }
                None => debug!("Map click at ({:.0}, {:.0}) hit nothing", x, y),
            }
        });
    });

    let main_window_weak = main_window.as_weak();
    main_window.on_clear_alerts(move || {
        with_registry(|registry| {
            registry.clear_alerts();
            if let Some(window) = main_window_weak.upgrade() {
                refresh_status(&window, registry);
            }
        });
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_format_times_skips_missing() {
        let record = AlertRecord::from_feature(json!({
            "id": "urn:oid:test",
            "geometry": null,
            "properties": {
                "event": "Flood Watch",
                "sent": "2025-05-06T18:41:00-05:00",
                "expires": "2025-05-07T06:00:00-05:00"
            }
        }))
        .unwrap();

        let text = format_times(&record);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("Sent: "));
        assert!(lines[1].starts_with("Expires: "));
    }
}
