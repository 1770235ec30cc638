use std::time::Duration;

use opensaw_monitor_core::MonitorConfig;

pub fn run(config: MonitorConfig) {
    let rt = super::runtime();
    let client = super::http_client();

    let mut app = crate::tui::app::App::start(config, client, rt.handle());
    if let Err(e) = app.run() {
        eprintln!("TUI error: {e}");
        std::process::exit(1);
    }

    // A fetch may still be waiting on a silent server.
    rt.shutdown_timeout(Duration::from_millis(500));
}
