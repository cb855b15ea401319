//! Sending and receiving messages as datagrams.
//!
//! A [`Transport`] wraps an [`AsyncDgramSock`] and moves exactly one
//! [`Message`] per datagram. It neither chunks nor reassembles: a message
//! whose encoding exceeds [`MAX_DGRAM_SIZE`] is refused before anything is
//! sent, and a received datagram longer than that is reported as
//! malformed.

use core::fmt;
use core::future::poll_fn;
use core::time::Duration;

use std::error;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::vec::Vec;

use tokio::io::ReadBuf;
use tokio::time::timeout;
use tracing::trace;

use crate::base::{ComposeError, Message, ParseError, MAX_DGRAM_SIZE};
use crate::net::sock::AsyncDgramSock;

//------------ Transport -----------------------------------------------------

/// A datagram transport for messages.
#[derive(Debug)]
pub struct Transport<Sock> {
    /// The socket used for both sending and receiving.
    sock: Arc<Sock>,
}

impl<Sock> Transport<Sock> {
    /// Creates a new transport using the given socket.
    pub fn new(sock: Sock) -> Self {
        Self::from_arc(Arc::new(sock))
    }

    /// Creates a new transport using a shared socket.
    pub fn from_arc(sock: Arc<Sock>) -> Self {
        Transport { sock }
    }

    /// Returns a reference to the underlying socket.
    pub fn sock(&self) -> &Arc<Sock> {
        &self.sock
    }
}

impl<Sock: AsyncDgramSock> Transport<Sock> {
    /// Sends a message to the given destination.
    ///
    /// Gives up with [`Error::SendTimeout`] if the socket doesn’t accept
    /// the datagram within `limit`.
    pub async fn send_to(
        &self,
        msg: &Message,
        dest: &SocketAddr,
        limit: Duration,
    ) -> Result<(), Error> {
        let data = msg.to_vec().map_err(Error::Compose)?;
        trace!(%dest, len = data.len(), "Sending {msg}");

        let sent = timeout(
            limit,
            poll_fn(|ctx| self.sock.poll_send_to(ctx, &data, dest)),
        )
        .await
        .map_err(|_| Error::SendTimeout)?
        .map_err(|err| Error::Send(Arc::new(err)))?;

        if sent != data.len() {
            Err(Error::ShortSend)
        } else {
            Ok(())
        }
    }

    /// Receives the next datagram and parses it.
    ///
    /// The outer result reports failure of the socket itself. The inner
    /// result is the outcome of parsing the datagram, so that a caller can
    /// decide for itself how to deal with garbage.
    pub async fn recv_from(
        &self,
    ) -> Result<(SocketAddr, Result<Message, ParseError>), Error> {
        loop {
            self.sock
                .readable()
                .await
                .map_err(|err| Error::Receive(Arc::new(err)))?;

            // One octet more than allowed so that overlong datagrams are
            // noticed instead of silently truncated.
            let mut buf: Vec<u8> = vec![0; MAX_DGRAM_SIZE + 1];
            let mut read_buf = ReadBuf::new(&mut buf);
            let (len, addr) = match self.sock.try_recv_buf_from(&mut read_buf)
            {
                Ok(res) => res,
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
                    continue
                }
                Err(err) => return Err(Error::Receive(Arc::new(err))),
            };
            buf.truncate(len);
            trace!(%addr, len, "Received datagram");
            return Ok((addr, Message::from_slice(&buf)));
        }
    }
}

//------------ Error ---------------------------------------------------------

/// A message could not be sent or received.
#[derive(Clone, Debug)]
pub enum Error {
    /// The message could not be encoded.
    Compose(ComposeError),

    /// Sending over the socket failed.
    Send(Arc<io::Error>),

    /// The socket only sent part of the datagram.
    ShortSend,

    /// The socket did not accept the datagram in time.
    SendTimeout,

    /// Receiving from the socket failed.
    Receive(Arc<io::Error>),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Compose(err) => write!(f, "cannot compose message: {err}"),
            Error::Send(err) => write!(f, "error sending datagram: {err}"),
            Error::ShortSend => write!(f, "partial datagram sent"),
            Error::SendTimeout => write!(f, "timeout sending datagram"),
            Error::Receive(err) => {
                write!(f, "error receiving datagram: {err}")
            }
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::Compose(err) => Some(err),
            Error::Send(err) => Some(err),
            Error::ShortSend => None,
            Error::SendTimeout => None,
            Error::Receive(err) => Some(err),
        }
    }
}

//============ Testing =======================================================

#[cfg(test)]
mod test {
    use super::*;
    use crate::base::{MessageType, Record};
    use tokio::net::UdpSocket;

    const LIMIT: Duration = Duration::from_secs(5);

    async fn pair() -> (Transport<UdpSocket>, UdpSocket) {
        let transport =
            Transport::new(UdpSocket::bind("127.0.0.1:0").await.unwrap());
        let peer = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        (transport, peer)
    }

    #[tokio::test]
    async fn send_and_receive() {
        let (transport, peer) = pair().await;
        let peer_addr = peer.local_addr().unwrap();
        let msg = Message::lookup(Record::query("A", "www.test.com"));
        transport.send_to(&msg, &peer_addr, LIMIT).await.unwrap();

        let mut buf = vec![0; MAX_DGRAM_SIZE];
        let (len, from) = peer.recv_from(&mut buf).await.unwrap();
        assert_eq!(from, transport.sock().local_addr().unwrap());
        assert_eq!(Message::from_slice(&buf[..len]).unwrap(), msg);

        peer.send_to(&buf[..len], from).await.unwrap();
        let (addr, received) = transport.recv_from().await.unwrap();
        assert_eq!(addr, peer_addr);
        assert_eq!(received.unwrap().msg_type(), MessageType::Lookup);
    }

    #[tokio::test]
    async fn oversized_message_is_not_sent() {
        let (transport, peer) = pair().await;
        let msg = Message::error(1, "x".repeat(MAX_DGRAM_SIZE));
        let res = transport
            .send_to(&msg, &peer.local_addr().unwrap(), LIMIT)
            .await;
        assert!(matches!(
            res,
            Err(Error::Compose(ComposeError::TooLarge(_)))
        ));
    }

    #[tokio::test]
    async fn garbage_is_reported_as_parse_error() {
        let (transport, peer) = pair().await;
        let dest = transport.sock().local_addr().unwrap();

        peer.send_to(b"not a message", dest).await.unwrap();
        let (_, received) = transport.recv_from().await.unwrap();
        assert!(received.unwrap_err().is_malformed());

        peer.send_to(&vec![b' '; MAX_DGRAM_SIZE + 100], dest)
            .await
            .unwrap();
        let (_, received) = transport.recv_from().await.unwrap();
        assert!(matches!(received, Err(ParseError::TooLarge(_))));
    }
}
