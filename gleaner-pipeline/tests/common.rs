use std::sync::OnceLock;

use gleaner_common::observability::{init_logging, LogConfig};

static INIT_PATH: OnceLock<std::path::PathBuf> = OnceLock::new();

/// Route pipeline events to a scratch log directory for the whole test binary.
pub fn init_test_tracing() {
    let _ = INIT_PATH.get_or_init(|| {
        let config = LogConfig {
            app_name: "gleaner-pipeline-tests",
            log_dir: Some(std::env::temp_dir().join("gleaner-tests")),
            default_filter: "pipeline=debug".to_string(),
            ..LogConfig::default()
        };
        init_logging(config).unwrap_or_default()
    });
}
