use once_cell::sync::OnceCell;
use tracing_subscriber::EnvFilter;

static INIT: OnceCell<()> = OnceCell::new();

/// Installs the global fmt subscriber once; later calls are no-ops.
pub fn init_tracing() {
    INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .compact()
            .init();
    });
}
