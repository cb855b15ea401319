//! Logging setup.

use tracing_subscriber::EnvFilter;

/// The filter used when `RUST_LOG` isn’t set.
///
/// Every message sent and received is logged at info level.
const DEFAULT_FILTER: &str = "info";

/// Setup logging of events reported by the resolver and the requester.
///
/// Use the RUST_LOG environment variable to override the default.
///
/// E.g. To enable debug level logging:
///   RUST_LOG=DEBUG
///
/// Or to log only what the resolver's responder decides:
///   RUST_LOG=dnsexchange::net::server::service=DEBUG
///
/// Or to see every datagram but nothing of the session bookkeeping:
///   RUST_LOG=TRACE,dnsexchange::net::server::session=OFF
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_ids(true)
        .without_time()
        .try_init()
        .ok();
}
