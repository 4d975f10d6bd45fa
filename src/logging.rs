//! Logging initialization

use std::sync::Once;

static INIT: Once = Once::new();

/// Initialize env_logger once for the process. Safe to call from multiple
/// entry points; later calls are no-ops.
pub fn init_logging() {
    INIT.call_once(|| {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
            .format_timestamp_secs()
            .init();
        log::info!("sonascreen logging initialized");
    });
}
