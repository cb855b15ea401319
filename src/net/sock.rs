//! Network socket abstractions.
use std::boxed::Box;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::io::ReadBuf;
use tokio::net::UdpSocket;

//------------ AsyncDgramSock ------------------------------------------------

/// Asynchronous datagram sending & receiving.
///
/// Both ends of an exchange talk to the network through this trait, which
/// allows tests to substitute the socket. When reading, the
/// [`Transport`] waits until [`Self::readable`] succeeds and then calls
/// [`Self::try_recv_buf_from`].
///
/// # Design notes
///
/// With the `readable()` then `try_recv_buf_from()` pattern the socket can
/// be shared via an [`Arc`] between a receive loop and whoever sends
/// replies without locking it for exclusive access.
///
/// [`Transport`]: super::transport::Transport
pub trait AsyncDgramSock {
    /// Attempts to send data on the socket to a given address.
    fn poll_send_to(
        &self,
        cx: &mut Context,
        data: &[u8],
        dest: &SocketAddr,
    ) -> Poll<io::Result<usize>>;

    /// Waits for the socket to become readable.
    ///
    /// The function may complete without the socket being readable. This is a
    /// false-positive and attempting a try_recv() will return with
    /// io::ErrorKind::WouldBlock.
    fn readable(
        &self,
    ) -> Pin<Box<dyn Future<Output = io::Result<()>> + '_ + Send>>;

    /// Tries to receive a single datagram message on the socket. On success,
    /// returns the number of bytes read and the origin.
    ///
    /// When there is no pending data, Err(io::ErrorKind::WouldBlock) is
    /// returned.
    fn try_recv_buf_from(
        &self,
        buf: &mut ReadBuf<'_>,
    ) -> io::Result<(usize, SocketAddr)>;

    /// Returns the local address the socket is bound to.
    fn local_addr(&self) -> io::Result<SocketAddr>;
}

impl AsyncDgramSock for UdpSocket {
    fn poll_send_to(
        &self,
        cx: &mut Context,
        data: &[u8],
        dest: &SocketAddr,
    ) -> Poll<io::Result<usize>> {
        UdpSocket::poll_send_to(self, cx, data, *dest)
    }

    fn readable(
        &self,
    ) -> Pin<Box<dyn Future<Output = io::Result<()>> + '_ + Send>> {
        Box::pin(UdpSocket::readable(self))
    }

    fn try_recv_buf_from(
        &self,
        buf: &mut ReadBuf<'_>,
    ) -> io::Result<(usize, SocketAddr)> {
        UdpSocket::try_recv_buf_from(self, buf)
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        UdpSocket::local_addr(self)
    }
}

impl<Sock: AsyncDgramSock + ?Sized> AsyncDgramSock for Arc<Sock> {
    fn poll_send_to(
        &self,
        cx: &mut Context,
        data: &[u8],
        dest: &SocketAddr,
    ) -> Poll<io::Result<usize>> {
        Sock::poll_send_to(self, cx, data, dest)
    }

    fn readable(
        &self,
    ) -> Pin<Box<dyn Future<Output = io::Result<()>> + '_ + Send>> {
        Sock::readable(self)
    }

    fn try_recv_buf_from(
        &self,
        buf: &mut ReadBuf<'_>,
    ) -> io::Result<(usize, SocketAddr)> {
        Sock::try_recv_buf_from(self, buf)
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        Sock::local_addr(self)
    }
}
