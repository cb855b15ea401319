//! Performs a fixed set of lookups against a resolver.
//!
//! Usage:
//!
//!   requester [SETTINGS]
//!
//! SETTINGS defaults to `Setting.json` in the current directory. The
//! requester binds to the client address of the settings, sends its
//! lookups to the server address and prints the answers.

use std::env;
use std::process::exit;

use dnsexchange::base::Record;
use dnsexchange::config::Settings;
use dnsexchange::logging::init_logging;
use dnsexchange::net::client::{LogObserver, Outcome, Requester};
use tokio::net::UdpSocket;

/// The lookups performed, as `(type, name)`.
const LOOKUPS: &[(&str, &str)] = &[
    ("A", "www.outlook.com"),
    ("A", "mail.example.com"),
    ("A", "www.example.com"),
    ("A", "unknown.domain"),
];

#[tokio::main()]
async fn main() {
    // Override the log level with env var RUST_LOG, e.g. RUST_LOG=debug.
    init_logging();

    let settings_path =
        env::args().nth(1).unwrap_or_else(|| "Setting.json".into());
    let settings = Settings::from_path(&settings_path).unwrap_or_else(|err| {
        eprintln!("Error in settings file '{settings_path}': {err}");
        exit(1);
    });
    let (local, resolver) = settings
        .requester_addr()
        .and_then(|local| Ok((local, settings.resolver_addr()?)))
        .unwrap_or_else(|err| {
            eprintln!("Error in settings file '{settings_path}': {err}");
            exit(1);
        });

    let sock = UdpSocket::bind(local).await.unwrap_or_else(|err| {
        eprintln!("Cannot bind to {local}: {err}");
        exit(1);
    });

    let lookups: Vec<_> = LOOKUPS
        .iter()
        .map(|(rtype, name)| Record::query(*rtype, *name))
        .collect();

    let mut requester = Requester::new(sock, resolver);
    let exchange = requester
        .run(&lookups, LogObserver)
        .await
        .unwrap_or_else(|err| {
            eprintln!("Exchange with {resolver} failed: {err}");
            exit(1);
        });

    for answer in exchange.answers() {
        match &answer.outcome {
            Outcome::Found(record) => println!("{record}"),
            Outcome::Failed(text) => println!("{text}"),
        }
    }
    if !exchange.is_ended() {
        eprintln!("Resolver did not end the exchange properly");
        exit(1);
    }
}
