use std::path::Path;
use std::rc::Rc;
use std::time::Duration;

use alert_overlay::logging::DebugLog;
use slint::{ComponentHandle, Model, ModelRc, SharedString, Timer, TimerMode, VecModel};

use crate::{DebugWindow, MainWindow};

/// Where saved logs go, relative to the working directory
pub const LOG_DIR: &str = "logs";

/// Lines the window keeps; the full history stays in `DebugLog`
const MAX_VIEW_LINES: usize = 2000;

const REFRESH_INTERVAL: Duration = Duration::from_millis(250);

/// The debug log window and the timer feeding it
pub struct DebugLogViewer {
    _window: DebugWindow,
    _timer: Timer,
}

pub fn setup_debug_log(main_window: &MainWindow, log: DebugLog) -> Result<DebugLogViewer, slint::PlatformError> {
    let window = DebugWindow::new()?;
    let lines: Rc<VecModel<SharedString>> = Rc::new(VecModel::default());
    window.set_lines(ModelRc::from(lines.clone()));

    let window_weak = window.as_weak();
    main_window.on_show_debug_log(move || {
        if let Some(window) = window_weak.upgrade() {
            if let Err(e) = window.show() {
                error!("Failed to open debug log: {}", e);
            }
        }
    });

    let clear_log = log.clone();
    let clear_lines = lines.clone();
    window.on_clear_log(move || {
        clear_log.clear();
        clear_lines.set_vec(Vec::new());
    });

    let save_log = log.clone();
    let window_weak = window.as_weak();
    window.on_save_log(move || {
        let status = match save_log.save(Path::new(LOG_DIR)) {
            Ok(path) => {
                info!("Saved debug log to {:?}", path);
                format!("Saved to {}", path.display())
            }
            Err(e) => {
                error!("Failed to save debug log: {}", e);
                format!("Save failed: {}", e)
            }
        };
        if let Some(window) = window_weak.upgrade() {
            window.set_save_status(status.into());
        }
    });

    let timer = Timer::default();
    timer.start(TimerMode::Repeated, REFRESH_INTERVAL, move || {
        for line in log.drain_new() {
            lines.push(line.to_string().into());
        }
        let excess = lines.row_count().saturating_sub(MAX_VIEW_LINES);
        for _ in 0..excess {
            lines.remove(0);
        }
    });

    Ok(DebugLogViewer {
        _window: window,
        _timer: timer,
    })
}
