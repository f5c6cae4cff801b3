use tracing_subscriber::EnvFilter;

/// Console logging; `RUST_LOG` overrides the default `rental_scout=info`
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("rental_scout=info,tower_http=info"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}
