//! Serves the records of a record file to requesters over UDP.
//!
//! Usage:
//!
//!   resolver [SETTINGS] [RECORDS]
//!
//! SETTINGS defaults to `Setting.json` and RECORDS to `DNSrecords.json`,
//! both in the current directory. The resolver binds to the server address
//! of the settings and runs until interrupted with Ctrl-C.

use std::env;
use std::future::Future;
use std::io;
use std::process::exit;
use std::sync::Arc;

use dnsexchange::config::Settings;
use dnsexchange::logging::init_logging;
use dnsexchange::net::server::UdpServer;
use dnsexchange::store::RecordStore;
use tokio::net::UdpSocket;
use tracing::{error, info};

#[tokio::main()]
async fn main() {
    // Override the log level with env var RUST_LOG, e.g. RUST_LOG=debug.
    init_logging();

    let mut args = env::args().skip(1);
    let settings_path = args.next().unwrap_or_else(|| "Setting.json".into());
    let records_path =
        args.next().unwrap_or_else(|| "DNSrecords.json".into());

    let addr = Settings::from_path(&settings_path)
        .and_then(|settings| settings.resolver_addr())
        .unwrap_or_else(|err| {
            eprintln!("Error in settings file '{settings_path}': {err}");
            exit(1);
        });
    let store = RecordStore::from_path(&records_path).unwrap_or_else(|err| {
        eprintln!("Error in record file '{records_path}': {err}");
        exit(1);
    });
    info!("Loaded {} records from {records_path}", store.len());

    let sock = UdpSocket::bind(addr).await.unwrap_or_else(|err| {
        eprintln!("Cannot bind to {addr}: {err}");
        exit(1);
    });
    let srv = Arc::new(UdpServer::new(sock, Arc::new(store)));

    if let Err(err) = serve(srv.clone(), tokio::signal::ctrl_c()).await {
        error!("{err}");
        exit(1);
    }

    let metrics = srv.metrics();
    info!(
        "Received {} messages ({} malformed), sent {} replies ({} failed)",
        metrics.num_received_requests(),
        metrics.num_malformed_requests(),
        metrics.num_sent_responses(),
        metrics.num_failed_responses(),
    );
}

/// Runs the server until `signal` fires.
///
/// The server is stopped either way. If waiting for the signal fails, so
/// does this function.
async fn serve(
    srv: Arc<UdpServer>,
    signal: impl Future<Output = io::Result<()>>,
) -> Result<(), String> {
    let spawned_srv = srv.clone();
    let handle = tokio::spawn(async move { spawned_srv.run().await });

    let res = signal
        .await
        .map_err(|err| format!("Cannot wait for Ctrl-C: {err}"));
    srv.shutdown()
        .map_err(|err| format!("Cannot stop server: {err}"))?;
    handle
        .await
        .map_err(|err| format!("Server task failed: {err}"))?;
    res
}

//============ Testing =======================================================

#[cfg(test)]
mod test {
    use super::*;

    async fn server() -> Arc<UdpServer> {
        let sock = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        Arc::new(UdpServer::new(sock, Arc::new(RecordStore::default())))
    }

    #[tokio::test]
    async fn stops_on_signal() {
        let signal = async { Ok::<_, io::Error>(()) };
        assert!(serve(server().await, signal).await.is_ok());
    }

    #[tokio::test]
    async fn failed_signal_is_an_error() {
        let signal = async {
            Err::<(), _>(io::Error::new(io::ErrorKind::Unsupported, "no"))
        };
        let err = serve(server().await, signal).await.unwrap_err();
        assert!(err.starts_with("Cannot wait for Ctrl-C"));
    }
}
