//! The datagram server running a resolver.
//!
//! [`DgramServer`] receives one datagram at a time, hands it to its
//! [`Responder`] and sends back whatever reply the responder produces.
//! Nothing a single requester does can stop the server: garbage is logged
//! and dropped, replies that cannot be sent are logged and forgotten. Only
//! [`DgramServer::shutdown`] ends the receive loop.
//!
//! [`Responder`]: super::service::Responder
use core::time::Duration;

use std::net::SocketAddr;
use std::ops::Deref;
use std::string::{String, ToString};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::net::UdpSocket;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::base::{Message, ParseError};
use crate::net::server::error::Error;
use crate::net::server::metrics::ServerMetrics;
use crate::net::server::service::Responder;
use crate::net::server::ServerCommand;
use crate::net::sock::AsyncDgramSock;
use crate::net::transport::Transport;
use crate::store::RecordStore;
use crate::utils::config::DefMinMax;

/// A resolver serving over a [`tokio::net::UdpSocket`].
pub type UdpServer = DgramServer<UdpSocket>;

/// Limit on the number of acknowledgments after which a session ends.
///
/// The value has to be between 1 and 1,000. The default value is 4.
const ACK_THRESHOLD: DefMinMax<usize> = DefMinMax::new(4, 1, 1000);

/// Limit on how long a session may be idle before it is forgotten.
///
/// The value has to be between 1 second and 1 hour. The default value is
/// 60 seconds.
const SESSION_TIMEOUT: DefMinMax<Duration> = DefMinMax::new(
    Duration::from_secs(60),
    Duration::from_secs(1),
    Duration::from_secs(3600),
);

/// Limit the time to wait for a reply to be written to the socket.
///
/// The value has to be between 1ms and 60 seconds. The default value is 5
/// seconds.
const WRITE_TIMEOUT: DefMinMax<Duration> = DefMinMax::new(
    Duration::from_secs(5),
    Duration::from_millis(1),
    Duration::from_secs(60),
);

//----------- Config ---------------------------------------------------------

/// Configuration for a resolver.
#[derive(Clone, Debug)]
pub struct Config {
    /// Acknowledgments after which the resolver ends a session.
    ack_threshold: usize,

    /// Idle time after which a session is forgotten.
    session_timeout: Duration,

    /// Limit the time to wait for a reply to be written to the requester.
    write_timeout: Duration,
}

impl Config {
    /// Creates a new, default config.
    pub fn new() -> Self {
        Default::default()
    }

    /// Returns the number of acknowledgments that end a session.
    pub fn ack_threshold(&self) -> usize {
        self.ack_threshold
    }

    /// Sets the number of acknowledgments that end a session.
    ///
    /// Requesters are expected to perform this many lookups per exchange.
    /// The value has to be between 1 and 1,000. The default value is 4.
    pub fn set_ack_threshold(&mut self, value: usize) {
        self.ack_threshold = ACK_THRESHOLD.limit(value);
    }

    /// Returns the idle time after which a session is forgotten.
    pub fn session_timeout(&self) -> Duration {
        self.session_timeout
    }

    /// Sets the idle time after which a session is forgotten.
    ///
    /// A requester whose session was forgotten starts counting
    /// acknowledgments from zero. The value has to be between 1 second and
    /// 1 hour. The default value is 60 seconds.
    pub fn set_session_timeout(&mut self, value: Duration) {
        self.session_timeout = SESSION_TIMEOUT.limit(value);
    }

    /// Returns the time to wait for a reply to be written.
    pub fn write_timeout(&self) -> Duration {
        self.write_timeout
    }

    /// Sets the time to wait for a reply to be written to the requester.
    ///
    /// The value has to be between 1ms and 60 seconds. The default value is
    /// 5 seconds.
    pub fn set_write_timeout(&mut self, value: Duration) {
        self.write_timeout = WRITE_TIMEOUT.limit(value);
    }
}

//--- Default

impl Default for Config {
    fn default() -> Self {
        Self {
            ack_threshold: ACK_THRESHOLD.default(),
            session_timeout: SESSION_TIMEOUT.default(),
            write_timeout: WRITE_TIMEOUT.default(),
        }
    }
}

//------------ DgramServer ---------------------------------------------------

/// A thread safe sender of [`ServerCommand`]s.
type CommandSender = Arc<Mutex<watch::Sender<ServerCommand>>>;

/// A thread safe receiver of [`ServerCommand`]s.
type CommandReceiver = watch::Receiver<ServerCommand>;

/// A resolver answering requesters over a datagram socket.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
///
/// use tokio::net::UdpSocket;
///
/// use dnsexchange::net::server::dgram::DgramServer;
/// use dnsexchange::store::RecordStore;
///
/// #[tokio::main]
/// async fn main() {
///     let store = RecordStore::from_path("DNSrecords.json").unwrap();
///     let sock = UdpSocket::bind("127.0.0.1:11000").await.unwrap();
///     let srv = Arc::new(DgramServer::new(sock, Arc::new(store)));
///
///     let spawned_srv = srv.clone();
///     let handle = tokio::spawn(async move { spawned_srv.run().await });
///
///     // ... do something ...
///
///     srv.shutdown().unwrap();
///     handle.await.unwrap();
/// }
/// ```
pub struct DgramServer<Sock> {
    /// The configuration of the server.
    config: Config,

    /// A receiver for receiving [`ServerCommand`]s.
    command_rx: CommandReceiver,

    /// A sender for sending [`ServerCommand`]s.
    command_tx: CommandSender,

    /// The transport over which requests are received and replies sent.
    transport: Transport<Sock>,

    /// The protocol state machine.
    ///
    /// Only the receive loop uses it. The lock is never held across an
    /// await point.
    responder: Mutex<Responder>,

    /// [`ServerMetrics`] describing the status of the server.
    metrics: Arc<ServerMetrics>,
}

/// Creation
///
impl<Sock> DgramServer<Sock> {
    /// Constructs a new [`DgramServer`] with default configuration.
    ///
    /// See [`Self::with_config`].
    #[must_use]
    pub fn new(sock: Sock, store: Arc<RecordStore>) -> Self {
        Self::with_config(sock, store, Config::default())
    }

    /// Constructs a new [`DgramServer`] with a given configuration.
    ///
    /// Takes a socket to receive requests and send replies on, the record
    /// store to answer lookups from, and a [`Config`].
    ///
    /// Invoke [`run`] to receive and process incoming messages.
    ///
    /// [`run`]: Self::run()
    #[must_use]
    pub fn with_config(
        sock: Sock,
        store: Arc<RecordStore>,
        config: Config,
    ) -> Self {
        let (command_tx, command_rx) = watch::channel(ServerCommand::Init);
        let command_tx = Arc::new(Mutex::new(command_tx));
        let responder = Mutex::new(Responder::new(store, config.clone()));

        DgramServer {
            config,
            command_tx,
            command_rx,
            transport: Transport::new(sock),
            responder,
            metrics: Arc::new(ServerMetrics::new()),
        }
    }
}

/// Access
///
impl<Sock> DgramServer<Sock> {
    /// Get a reference to the network source being used to receive messages.
    #[must_use]
    pub fn source(&self) -> Arc<Sock> {
        self.transport.sock().clone()
    }

    /// Get a reference to the metrics for this server.
    #[must_use]
    pub fn metrics(&self) -> Arc<ServerMetrics> {
        self.metrics.clone()
    }

    /// Returns the number of requesters with an active session.
    pub fn num_sessions(&self) -> usize {
        self.responder().sessions().len()
    }

    /// Locks the responder.
    fn responder(&self) -> MutexGuard<'_, Responder> {
        // The responder never panics half way through an update, so its
        // state is usable even if some other holder of the lock did.
        self.responder.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Control
///
impl<Sock: AsyncDgramSock> DgramServer<Sock> {
    /// Start the server.
    ///
    /// Returns once the server has been shut down.
    pub async fn run(&self) {
        if let Err(err) = self.run_until_error().await {
            info!("Server stopped: {err}");
        }
    }

    /// Stop the server.
    ///
    /// The server stops receiving new messages. A reply currently being
    /// sent is not interrupted.
    pub fn shutdown(&self) -> Result<(), Error> {
        self.command_tx
            .lock()
            .map_err(|_| Error::CommandCouldNotBeSent)?
            .send(ServerCommand::Shutdown)
            .map_err(|_| Error::CommandCouldNotBeSent)
    }
}

//--- Internal details

impl<Sock: AsyncDgramSock> DgramServer<Sock> {
    /// Receive incoming messages until shutdown or fatal error.
    async fn run_until_error(&self) -> Result<(), String> {
        let mut command_rx = self.command_rx.clone();

        if let Ok(addr) = self.transport.sock().local_addr() {
            info!("Server started on {addr}. Waiting for requesters...");
        }

        loop {
            tokio::select! {
                // Poll futures in match arm order, not randomly.
                biased;

                // First, prefer obeying `ServerCommand`s over everything
                // else.
                res = command_rx.changed() => {
                    self.process_server_command(res, &mut command_rx)?;
                }

                res = self.transport.recv_from() => {
                    match res {
                        Ok((addr, msg)) => {
                            self.process_datagram(addr, msg).await
                        }
                        Err(err) => {
                            // Typically an ICMP error caused by an earlier
                            // reply. The socket itself remains usable.
                            warn!("Error while receiving message: {err}");
                        }
                    }
                }
            }
        }
    }

    /// Decide what to do with a received [`ServerCommand`].
    fn process_server_command(
        &self,
        res: Result<(), watch::error::RecvError>,
        command_rx: &mut CommandReceiver,
    ) -> Result<(), String> {
        // If the sender is gone, nobody can stop us anymore. Stop now
        // rather than run unsupervised.
        res.map_err(|err| {
            format!("Error while receiving command: {err}")
        })?;

        let lock = command_rx.borrow_and_update();
        match lock.deref() {
            ServerCommand::Init => {
                // Init is the initial value of the channel and is never
                // reported as a change.
                Ok(())
            }

            ServerCommand::Shutdown => {
                Err("Shutdown command received".to_string())
            }
        }
    }

    /// Handles a single received datagram.
    async fn process_datagram(
        &self,
        addr: SocketAddr,
        msg: Result<Message, ParseError>,
    ) {
        self.metrics.inc_num_received_requests();
        match &msg {
            Ok(msg) => info!(%addr, "Received {msg}"),
            Err(err) if err.is_malformed() => {
                self.metrics.inc_num_malformed_requests();
            }
            Err(_) => {}
        }

        let reply = self.responder().respond(msg, addr, Instant::now());

        if let Some(reply) = reply {
            self.send_reply(addr, reply).await;
        }
    }

    /// Sends a reply, logging failure.
    async fn send_reply(&self, addr: SocketAddr, reply: Message) {
        match self
            .transport
            .send_to(&reply, &addr, self.config.write_timeout)
            .await
        {
            Ok(()) => {
                self.metrics.inc_num_sent_responses();
                info!(%addr, "Sent {reply}");
            }
            Err(err) => {
                self.metrics.inc_num_failed_responses();
                error!(%addr, "Error sending {reply}: {err}");
            }
        }
    }
}

//--- Drop

impl<Sock> Drop for DgramServer<Sock> {
    fn drop(&mut self) {
        // Nobody may be listening anymore, so ignore failure.
        if let Ok(tx) = self.command_tx.lock() {
            let _ = tx.send(ServerCommand::Shutdown);
        }
        debug!("Server dropped");
    }
}

//============ Testing =======================================================

#[cfg(test)]
mod test {
    use super::*;
    use crate::base::{MessageType, Payload, Record, MAX_DGRAM_SIZE};
    use core::future::Future;
    use core::pin::Pin;
    use core::task::{Context, Poll};
    use std::boxed::Box;
    use std::io;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::io::ReadBuf;

    async fn server() -> (Arc<UdpServer>, SocketAddr) {
        let store = RecordStore::from_records(vec![Record::new(
            "A",
            "www.test.com",
            "192.168.1.20",
        )
        .with_ttl(3600)]);
        let sock = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = sock.local_addr().unwrap();
        (Arc::new(DgramServer::new(sock, Arc::new(store))), addr)
    }

    async fn roundtrip(
        client: &UdpSocket,
        dest: SocketAddr,
        data: &[u8],
    ) -> Message {
        client.send_to(data, dest).await.unwrap();
        let mut buf = vec![0; MAX_DGRAM_SIZE];
        let len = client.recv(&mut buf).await.unwrap();
        Message::from_slice(&buf[..len]).unwrap()
    }

    #[tokio::test]
    async fn serves_until_shutdown() {
        let (srv, addr) = server().await;
        let handle = {
            let srv = srv.clone();
            tokio::spawn(async move { srv.run().await })
        };

        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();

        // Garbage first, the server must keep going.
        client.send_to(b"\x00\x01garbage", addr).await.unwrap();

        let hello = Message::hello("hi").to_vec().unwrap();
        let welcome = roundtrip(&client, addr, &hello).await;
        assert_eq!(welcome.msg_type(), MessageType::Welcome);
        assert_eq!(srv.num_sessions(), 1);

        let query = Record::query("A", "www.test.com");
        let lookup = Message::new(5, Payload::Lookup(query)).to_vec().unwrap();
        let reply = roundtrip(&client, addr, &lookup).await;
        assert_eq!(reply.id(), 5);
        assert_eq!(reply.msg_type(), MessageType::LookupReply);

        srv.shutdown().unwrap();
        handle.await.unwrap();

        let metrics = srv.metrics();
        assert_eq!(metrics.num_received_requests(), 3);
        assert_eq!(metrics.num_malformed_requests(), 1);
        assert_eq!(metrics.num_sent_responses(), 2);
        assert_eq!(metrics.num_failed_responses(), 0);
    }

    /// A socket whose first send fails.
    struct FailFirstSend {
        sock: UdpSocket,
        failed: AtomicBool,
    }

    impl AsyncDgramSock for FailFirstSend {
        fn poll_send_to(
            &self,
            cx: &mut Context,
            data: &[u8],
            dest: &SocketAddr,
        ) -> Poll<io::Result<usize>> {
            if !self.failed.swap(true, Ordering::SeqCst) {
                return Poll::Ready(Err(io::Error::new(
                    io::ErrorKind::PermissionDenied,
                    "send refused",
                )));
            }
            AsyncDgramSock::poll_send_to(&self.sock, cx, data, dest)
        }

        fn readable(
            &self,
        ) -> Pin<Box<dyn Future<Output = io::Result<()>> + '_ + Send>> {
            AsyncDgramSock::readable(&self.sock)
        }

        fn try_recv_buf_from(
            &self,
            buf: &mut ReadBuf<'_>,
        ) -> io::Result<(usize, SocketAddr)> {
            AsyncDgramSock::try_recv_buf_from(&self.sock, buf)
        }

        fn local_addr(&self) -> io::Result<SocketAddr> {
            AsyncDgramSock::local_addr(&self.sock)
        }
    }

    #[tokio::test]
    async fn failed_send_does_not_stop_server() {
        let sock = FailFirstSend {
            sock: UdpSocket::bind("127.0.0.1:0").await.unwrap(),
            failed: AtomicBool::new(false),
        };
        let addr = AsyncDgramSock::local_addr(&sock).unwrap();
        let srv = Arc::new(DgramServer::new(
            sock,
            Arc::new(RecordStore::default()),
        ));
        let handle = {
            let srv = srv.clone();
            tokio::spawn(async move { srv.run().await })
        };

        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let first = Message::hello("first").to_vec().unwrap();
        client.send_to(&first, addr).await.unwrap();
        let second = Message::hello("second");
        let welcome =
            roundtrip(&client, addr, &second.to_vec().unwrap()).await;
        assert_eq!(welcome.msg_type(), MessageType::Welcome);

        srv.shutdown().unwrap();
        handle.await.unwrap();

        let metrics = srv.metrics();
        assert_eq!(metrics.num_received_requests(), 2);
        assert_eq!(metrics.num_failed_responses(), 1);
        assert_eq!(metrics.num_sent_responses(), 1);
    }

    #[test]
    fn config_limits() {
        let mut config = Config::new();
        assert_eq!(config.ack_threshold(), 4);
        config.set_ack_threshold(0);
        assert_eq!(config.ack_threshold(), 1);
        config.set_session_timeout(Duration::from_secs(86400));
        assert_eq!(config.session_timeout(), Duration::from_secs(3600));
        config.set_write_timeout(Duration::ZERO);
        assert_eq!(config.write_timeout(), Duration::from_millis(1));
    }
}
