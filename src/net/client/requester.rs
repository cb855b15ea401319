//! The requester state machine.

#![warn(missing_docs)]

use core::time::Duration;

use std::net::SocketAddr;
use std::sync::Arc;
use std::vec::Vec;

use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, warn};

use crate::base::{Message, MessageType, Payload, Record};
use crate::net::client::error::Error;
use crate::net::sock::AsyncDgramSock;
use crate::net::transport::Transport;
use crate::utils::config::DefMinMax;

//------------ Configuration Constants ---------------------------------------

/// Configuration limits for the read timeout.
const READ_TIMEOUT: DefMinMax<Duration> = DefMinMax::new(
    Duration::from_secs(5),
    Duration::from_millis(1),
    Duration::from_secs(60),
);

/// Configuration limits for the write timeout.
const WRITE_TIMEOUT: DefMinMax<Duration> = DefMinMax::new(
    Duration::from_secs(5),
    Duration::from_millis(1),
    Duration::from_secs(60),
);

/// The text sent with the hello message.
const HELLO_TEXT: &str = "Hello from client";

//------------ Config --------------------------------------------------------

/// Configuration for a requester.
#[derive(Clone, Debug)]
pub struct Config {
    /// How long to wait for each reply. `None` waits forever.
    read_timeout: Option<Duration>,

    /// How long to wait for the socket to accept a datagram.
    write_timeout: Duration,
}

impl Config {
    /// Creates a new config with default values.
    pub fn new() -> Self {
        Default::default()
    }

    /// Returns the read timeout.
    ///
    /// The read timeout is the maximum amount of time to wait for a reply
    /// after a message was sent. If it is `None`, the requester waits
    /// forever.
    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout
    }

    /// Sets the read timeout.
    ///
    /// If this value is too small or too large, it will be caped.
    pub fn set_read_timeout(&mut self, value: Option<Duration>) {
        self.read_timeout = READ_TIMEOUT.limit_opt(value)
    }

    /// Returns the write timeout.
    pub fn write_timeout(&self) -> Duration {
        self.write_timeout
    }

    /// Sets the write timeout.
    ///
    /// If this value is too small or too large, it will be caped.
    pub fn set_write_timeout(&mut self, value: Duration) {
        self.write_timeout = WRITE_TIMEOUT.limit(value)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            read_timeout: Some(READ_TIMEOUT.default()),
            write_timeout: WRITE_TIMEOUT.default(),
        }
    }
}

//------------ State ---------------------------------------------------------

/// The state of a requester.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum State {
    /// Nothing has been sent yet.
    Init,

    /// The hello was sent, waiting for the welcome.
    AwaitWelcome,

    /// Performing the lookup with the given index.
    Lookup(usize),

    /// All lookups are done, waiting for the end.
    AwaitEnd,

    /// The exchange is complete.
    Done,

    /// The exchange was aborted.
    Failed,
}

//------------ Observer ------------------------------------------------------

/// Watches the messages of an exchange.
///
/// The requester hands every message it sends or receives to its observer.
/// Observers cannot fail and cannot influence the exchange.
pub trait Observer {
    /// A message was sent to `dest`.
    fn sent(&self, msg: &Message, dest: &SocketAddr) {
        let _ = (msg, dest);
    }

    /// A message was received from `source`.
    fn received(&self, msg: &Message, source: &SocketAddr) {
        let _ = (msg, source);
    }
}

impl Observer for () {}

impl<O: Observer + ?Sized> Observer for &O {
    fn sent(&self, msg: &Message, dest: &SocketAddr) {
        O::sent(self, msg, dest)
    }

    fn received(&self, msg: &Message, source: &SocketAddr) {
        O::received(self, msg, source)
    }
}

/// An observer that logs every message at info level.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogObserver;

impl Observer for LogObserver {
    fn sent(&self, msg: &Message, dest: &SocketAddr) {
        info!(%dest, "Sent {msg}");
    }

    fn received(&self, msg: &Message, source: &SocketAddr) {
        match msg.payload() {
            Payload::LookupReply(record) => {
                info!(%source, "Received {msg}: record found: {record}")
            }
            Payload::Error(text) => {
                info!(%source, "Received {msg}: error: {text}")
            }
            _ => info!(%source, "Received {msg}"),
        }
    }
}

//------------ Exchange ------------------------------------------------------

/// The result of a complete exchange.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Exchange {
    /// One answer per lookup, in order.
    answers: Vec<Answer>,

    /// How the exchange was closed by the resolver.
    closure: Closure,
}

impl Exchange {
    /// Returns the answers in the order the lookups were given.
    pub fn answers(&self) -> &[Answer] {
        &self.answers
    }

    /// Returns how the resolver closed the exchange.
    pub fn closure(&self) -> Closure {
        self.closure
    }

    /// Returns whether the resolver properly ended the exchange.
    pub fn is_ended(&self) -> bool {
        matches!(self.closure, Closure::End)
    }
}

/// The answer to a single lookup.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Answer {
    /// The query that was sent.
    pub query: Record,

    /// What the resolver replied.
    pub outcome: Outcome,
}

/// What a resolver replied to a lookup.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Outcome {
    /// The record was found.
    Found(Record),

    /// The resolver sent an error with the given text.
    Failed(String),
}

/// How the resolver closed the exchange.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Closure {
    /// The resolver sent an end message.
    End,

    /// The resolver sent some other message instead.
    Unexpected(MessageType),

    /// The resolver didn’t send anything within the read timeout.
    Timeout,
}

//------------ Requester -----------------------------------------------------

/// The requesting side of an exchange.
#[derive(Debug)]
pub struct Requester<Sock> {
    /// The transport to send and receive messages over.
    transport: Transport<Sock>,

    /// The address of the resolver.
    resolver: SocketAddr,

    /// User configuration variables.
    config: Config,

    /// Where in the exchange we are.
    state: State,
}

impl<Sock> Requester<Sock> {
    /// Creates a new requester with default configuration.
    pub fn new(sock: Sock, resolver: SocketAddr) -> Self {
        Self::with_config(sock, resolver, Config::default())
    }

    /// Creates a new requester with the given configuration.
    pub fn with_config(
        sock: Sock,
        resolver: SocketAddr,
        config: Config,
    ) -> Self {
        Requester {
            transport: Transport::new(sock),
            resolver,
            config,
            state: State::Init,
        }
    }

    /// Returns the current state.
    pub fn state(&self) -> State {
        self.state
    }

    /// Returns the address of the resolver.
    pub fn resolver(&self) -> SocketAddr {
        self.resolver
    }

    /// Returns a reference to the socket.
    pub fn sock(&self) -> &Arc<Sock> {
        self.transport.sock()
    }
}

impl<Sock: AsyncDgramSock> Requester<Sock> {
    /// Runs a complete exchange performing the given lookups in order.
    ///
    /// Every message sent and received is passed to `observer`.
    ///
    /// On success the requester ends up in [`State::Done`], also if the
    /// resolver closed the exchange with something other than an end
    /// message or not at all. That case is reported via
    /// [`Exchange::closure`]. Any error
    /// aborts the exchange and leaves the requester in [`State::Failed`].
    pub async fn run(
        &mut self,
        lookups: &[Record],
        observer: impl Observer,
    ) -> Result<Exchange, Error> {
        self.state = State::Init;
        match self.exchange(lookups, &observer).await {
            Ok(exchange) => {
                self.state = State::Done;
                Ok(exchange)
            }
            Err(err) => {
                warn!(resolver = %self.resolver, "Exchange failed: {err}");
                self.state = State::Failed;
                Err(err)
            }
        }
    }

    /// Drives the state machine through the exchange.
    async fn exchange(
        &mut self,
        lookups: &[Record],
        observer: &impl Observer,
    ) -> Result<Exchange, Error> {
        self.send(&Message::hello(HELLO_TEXT), observer).await?;
        self.state = State::AwaitWelcome;

        let welcome = self.recv(observer, |_| true).await?;
        expect_type(&welcome, MessageType::Welcome)?;

        let mut answers = Vec::with_capacity(lookups.len());
        for (index, query) in lookups.iter().enumerate() {
            self.state = State::Lookup(index);

            let lookup = Message::lookup(query.clone());
            self.send(&lookup, observer).await?;

            let reply = self
                .recv(observer, |msg| {
                    !is_lookup_answer(msg) || msg.id() == lookup.id()
                })
                .await?;
            let outcome = match reply.payload() {
                Payload::LookupReply(record) => {
                    Outcome::Found(record.clone())
                }
                Payload::Error(text) => Outcome::Failed(text.clone()),
                _ => {
                    return Err(Error::UnexpectedMessage {
                        expected: MessageType::LookupReply,
                        received: reply.msg_type(),
                    })
                }
            };
            answers.push(Answer {
                query: query.clone(),
                outcome,
            });

            self.send(&Message::ack(&reply), observer).await?;
        }

        self.state = State::AwaitEnd;
        let closure = match self.recv(observer, |_| true).await {
            Ok(last) if last.msg_type() == MessageType::End => {
                debug!("Resolver ended the exchange");
                Closure::End
            }
            Ok(last) => {
                warn!("Expected End message, received {last}");
                Closure::Unexpected(last.msg_type())
            }
            Err(Error::Timeout) => {
                // All answers are in, only the goodbye is missing.
                warn!("Timeout waiting for End message");
                Closure::Timeout
            }
            Err(err) => return Err(err),
        };

        Ok(Exchange { answers, closure })
    }

    /// Sends a message to the resolver.
    async fn send(
        &self,
        msg: &Message,
        observer: &impl Observer,
    ) -> Result<(), Error> {
        self.transport
            .send_to(msg, &self.resolver, self.config.write_timeout)
            .await?;
        observer.sent(msg, &self.resolver);
        Ok(())
    }

    /// Waits for the next message accepted by `accept`.
    ///
    /// Datagrams from other sources than the resolver and messages not
    /// accepted are skipped. The read timeout covers the whole wait.
    async fn recv(
        &self,
        observer: &impl Observer,
        accept: impl Fn(&Message) -> bool,
    ) -> Result<Message, Error> {
        let deadline =
            self.config.read_timeout.map(|limit| Instant::now() + limit);

        loop {
            let (addr, msg) = match deadline {
                Some(deadline) => {
                    timeout_at(deadline, self.transport.recv_from())
                        .await
                        .map_err(|_| Error::Timeout)??
                }
                None => self.transport.recv_from().await?,
            };

            if !self.is_resolver(&addr) {
                warn!(%addr, "Ignoring datagram from unexpected source");
                continue;
            }

            let msg = msg?;
            observer.received(&msg, &addr);

            if !accept(&msg) {
                // Late replies to earlier lookups.
                warn!("Ignoring stale {msg}");
                continue;
            }
            return Ok(msg);
        }
    }

    /// Returns whether a datagram from `addr` came from the resolver.
    fn is_resolver(&self, addr: &SocketAddr) -> bool {
        if self.resolver.ip().is_unspecified() {
            addr.port() == self.resolver.port()
        } else {
            *addr == self.resolver
        }
    }
}

//------------ Helper Functions ----------------------------------------------

/// Checks that `msg` has the expected type.
fn expect_type(msg: &Message, expected: MessageType) -> Result<(), Error> {
    if msg.msg_type() == expected {
        Ok(())
    } else {
        Err(Error::UnexpectedMessage {
            expected,
            received: msg.msg_type(),
        })
    }
}

/// Returns whether `msg` is an answer to some lookup.
fn is_lookup_answer(msg: &Message) -> bool {
    matches!(msg.msg_type(), MessageType::LookupReply | MessageType::Error)
}

//============ Testing =======================================================

#[cfg(test)]
mod test {
    use super::*;
    use crate::base::MAX_DGRAM_SIZE;
    use std::sync::Mutex;
    use tokio::net::UdpSocket;

    /// A resolver stand-in that replies from a script.
    struct Peer {
        sock: UdpSocket,
    }

    impl Peer {
        async fn bind() -> Self {
            Peer {
                sock: UdpSocket::bind("127.0.0.1:0").await.unwrap(),
            }
        }

        fn addr(&self) -> SocketAddr {
            self.sock.local_addr().unwrap()
        }

        async fn recv(&self) -> (Message, SocketAddr) {
            let mut buf = vec![0; MAX_DGRAM_SIZE];
            let (len, addr) = self.sock.recv_from(&mut buf).await.unwrap();
            (Message::from_slice(&buf[..len]).unwrap(), addr)
        }

        async fn send(&self, msg: &Message, dest: SocketAddr) {
            self.send_raw(&msg.to_vec().unwrap(), dest).await
        }

        async fn send_raw(&self, data: &[u8], dest: SocketAddr) {
            self.sock.send_to(data, dest).await.unwrap();
        }
    }

    async fn requester(peer: &Peer) -> Requester<UdpSocket> {
        let mut config = Config::new();
        config.set_read_timeout(Some(Duration::from_secs(2)));
        Requester::with_config(
            UdpSocket::bind("127.0.0.1:0").await.unwrap(),
            peer.addr(),
            config,
        )
    }

    #[derive(Default)]
    struct Recorder(Mutex<Vec<(bool, MessageType)>>);

    impl Observer for Recorder {
        fn sent(&self, msg: &Message, _: &SocketAddr) {
            self.0.lock().unwrap().push((true, msg.msg_type()));
        }

        fn received(&self, msg: &Message, _: &SocketAddr) {
            self.0.lock().unwrap().push((false, msg.msg_type()));
        }
    }

    #[tokio::test]
    async fn full_exchange() {
        let peer = Peer::bind().await;
        let mut requester = requester(&peer).await;
        let record =
            Record::new("A", "www.test.com", "192.168.1.20").with_ttl(3600);

        let script = {
            let record = record.clone();
            tokio::spawn(async move {
                let (hello, from) = peer.recv().await;
                assert_eq!(hello.msg_type(), MessageType::Hello);
                peer.send(&Message::welcome(hello.id(), "hi"), from).await;

                let (lookup, _) = peer.recv().await;
                assert_eq!(
                    lookup.payload().record(),
                    Some(&Record::query("A", "www.test.com"))
                );
                peer.send(&Message::lookup_reply(lookup.id(), record), from)
                    .await;
                let (ack, _) = peer.recv().await;
                assert_eq!(ack.payload().acked_id(), Some(lookup.id()));
                assert_ne!(ack.id(), lookup.id());

                let (lookup, _) = peer.recv().await;
                peer.send(&Message::error(lookup.id(), "not found"), from)
                    .await;
                let (ack, _) = peer.recv().await;
                peer.send(&Message::end(ack.id(), "bye"), from).await;
            })
        };

        let recorder = Recorder::default();
        let exchange = requester
            .run(
                &[
                    Record::query("A", "www.test.com"),
                    Record::query("A", "unknown.domain"),
                ],
                &recorder,
            )
            .await
            .unwrap();
        script.await.unwrap();

        assert_eq!(requester.state(), State::Done);
        assert!(exchange.is_ended());
        assert_eq!(exchange.answers().len(), 2);
        assert_eq!(exchange.answers()[0].outcome, Outcome::Found(record));
        assert_eq!(
            exchange.answers()[1].outcome,
            Outcome::Failed("not found".into())
        );

        use MessageType::*;
        assert_eq!(
            *recorder.0.lock().unwrap(),
            [
                (true, Hello),
                (false, Welcome),
                (true, Lookup),
                (false, LookupReply),
                (true, Ack),
                (true, Lookup),
                (false, Error),
                (true, Ack),
                (false, End),
            ]
        );
    }

    #[tokio::test]
    async fn missing_welcome_fails() {
        let peer = Peer::bind().await;
        let mut requester = requester(&peer).await;

        let script = tokio::spawn(async move {
            let (hello, from) = peer.recv().await;
            peer.send(&Message::end(hello.id(), "go away"), from).await;
        });

        let err = requester.run(&[], ()).await.unwrap_err();
        script.await.unwrap();
        assert!(matches!(
            err,
            Error::UnexpectedMessage {
                expected: MessageType::Welcome,
                received: MessageType::End,
            }
        ));
        assert_eq!(requester.state(), State::Failed);
    }

    #[tokio::test]
    async fn malformed_reply_fails() {
        let peer = Peer::bind().await;
        let mut requester = requester(&peer).await;

        let script = tokio::spawn(async move {
            let (_, from) = peer.recv().await;
            peer.send_raw(b"{\"MsgId\": 1", from).await;
        });

        let err = requester.run(&[], ()).await.unwrap_err();
        script.await.unwrap();
        assert!(matches!(err, Error::MalformedEnvelope(ref err)
            if err.is_malformed()));
        assert_eq!(requester.state(), State::Failed);
    }

    #[tokio::test]
    async fn wrong_reply_to_lookup_fails() {
        let peer = Peer::bind().await;
        let mut requester = requester(&peer).await;

        let script = tokio::spawn(async move {
            let (hello, from) = peer.recv().await;
            peer.send(&Message::welcome(hello.id(), ""), from).await;
            let (lookup, _) = peer.recv().await;
            peer.send(&Message::welcome(lookup.id(), ""), from).await;
        });

        let err = requester
            .run(&[Record::query("A", "www.test.com")], ())
            .await
            .unwrap_err();
        script.await.unwrap();
        assert!(matches!(
            err,
            Error::UnexpectedMessage {
                received: MessageType::Welcome,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn stale_replies_are_skipped() {
        let peer = Peer::bind().await;
        let mut requester = requester(&peer).await;

        let script = tokio::spawn(async move {
            let (hello, from) = peer.recv().await;
            peer.send(&Message::welcome(hello.id(), ""), from).await;
            let (lookup, _) = peer.recv().await;
            let stale = if lookup.id() == 1 { 2 } else { 1 };
            peer.send(&Message::error(stale, "old"), from).await;
            peer.send(
                &Message::lookup_reply(
                    lookup.id(),
                    Record::new("A", "www.test.com", "192.168.1.20"),
                ),
                from,
            )
            .await;
            let (ack, _) = peer.recv().await;
            assert_eq!(ack.payload().acked_id(), Some(lookup.id()));
            peer.send(&Message::welcome(ack.id(), "not an end"), from)
                .await;
        });

        let exchange = requester
            .run(&[Record::query("A", "www.test.com")], ())
            .await
            .unwrap();
        script.await.unwrap();
        assert!(matches!(
            exchange.answers()[0].outcome,
            Outcome::Found(_)
        ));
        assert_eq!(
            exchange.closure(),
            Closure::Unexpected(MessageType::Welcome)
        );
        assert_eq!(requester.state(), State::Done);
    }

    #[tokio::test]
    async fn silent_resolver_times_out() {
        let peer = Peer::bind().await;
        let mut config = Config::new();
        config.set_read_timeout(Some(Duration::from_millis(50)));
        let mut requester = Requester::with_config(
            UdpSocket::bind("127.0.0.1:0").await.unwrap(),
            peer.addr(),
            config,
        );

        let err = requester.run(&[], ()).await.unwrap_err();
        assert!(matches!(err, Error::Timeout));
        assert_eq!(requester.state(), State::Failed);
        drop(peer);
    }

    #[tokio::test]
    async fn missing_end_keeps_answers() {
        let peer = Peer::bind().await;
        let mut config = Config::new();
        config.set_read_timeout(Some(Duration::from_millis(300)));
        let mut requester = Requester::with_config(
            UdpSocket::bind("127.0.0.1:0").await.unwrap(),
            peer.addr(),
            config,
        );
        let record = Record::new("A", "www.test.com", "1.2.3.4");

        let script = {
            let record = record.clone();
            tokio::spawn(async move {
                let (hello, from) = peer.recv().await;
                peer.send(&Message::welcome(hello.id(), ""), from).await;
                let (lookup, _) = peer.recv().await;
                peer.send(&Message::lookup_reply(lookup.id(), record), from)
                    .await;
                let (ack, _) = peer.recv().await;
                assert_eq!(ack.msg_type(), MessageType::Ack);
                // Keep the socket open but never send the end.
                peer
            })
        };

        let exchange = requester
            .run(&[Record::query("A", "www.test.com")], ())
            .await
            .unwrap();
        let peer = script.await.unwrap();

        assert_eq!(exchange.closure(), Closure::Timeout);
        assert!(!exchange.is_ended());
        assert_eq!(exchange.answers()[0].outcome, Outcome::Found(record));
        assert_eq!(requester.state(), State::Done);
        drop(peer);
    }

    #[test]
    fn config_limits() {
        let mut config = Config::new();
        assert_eq!(config.read_timeout(), Some(Duration::from_secs(5)));
        config.set_read_timeout(Some(Duration::from_secs(3600)));
        assert_eq!(config.read_timeout(), Some(Duration::from_secs(60)));
        config.set_read_timeout(None);
        assert_eq!(config.read_timeout(), None);
    }
}
