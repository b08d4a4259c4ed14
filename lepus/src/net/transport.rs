use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

#[cfg(feature = "tls")]
use std::sync::{Arc, Mutex};

#[cfg(feature = "tls")]
use crate::api::tls::TlsAdaptor;

use super::Error;

/// How long a blocking read waits before releasing control, so the reader
/// loop can observe shutdown and heartbeat deadlines.
pub(crate) const READ_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// A connected byte stream, plain TCP or TLS.
///
/// The transport splits into independently owned halves so one thread can
/// block reading while others write. TCP halves are separate socket
/// handles; TLS halves share the session behind a mutex, which stays fair
/// because reads hold it for at most [`READ_POLL_INTERVAL`].
pub struct Transport {
    stream: Stream,
}

enum Stream {
    Tcp(TcpStream),
    #[cfg(feature = "tls")]
    Tls(Arc<Mutex<native_tls::TlsStream<TcpStream>>>),
}

impl Transport {
    /// Open a TCP connection, trying each resolved address until one
    /// accepts within `connect_timeout`.
    pub fn connect(host: &str, port: u16, connect_timeout: Duration) -> Result<Self, Error> {
        let stream = Self::connect_tcp(host, port, connect_timeout)?;
        Ok(Self {
            stream: Stream::Tcp(stream),
        })
    }

    /// Open a TCP connection and negotiate TLS over it.
    #[cfg(feature = "tls")]
    pub fn connect_tls(
        host: &str,
        port: u16,
        connect_timeout: Duration,
        adaptor: &TlsAdaptor,
    ) -> Result<Self, Error> {
        let stream = Self::connect_tcp(host, port, connect_timeout)?;
        let tls = adaptor
            .connector()
            .connect(adaptor.domain(), stream)
            .map_err(|err| Error::Tls(err.to_string()))?;
        Ok(Self {
            stream: Stream::Tls(Arc::new(Mutex::new(tls))),
        })
    }

    fn connect_tcp(host: &str, port: u16, connect_timeout: Duration) -> Result<TcpStream, Error> {
        let addrs: Vec<SocketAddr> = (host, port).to_socket_addrs()?.collect();
        let mut last_err = None;
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, connect_timeout) {
                Ok(stream) => {
                    stream.set_nodelay(true)?;
                    return Ok(stream);
                }
                Err(err) => last_err = Some(err),
            }
        }
        Err(last_err
            .unwrap_or_else(|| io::Error::new(io::ErrorKind::NotFound, "address did not resolve"))
            .into())
    }

    /// Split into a read half and a write half.
    pub fn into_split(self) -> Result<(ReadHalf, WriteHalf), Error> {
        match self.stream {
            Stream::Tcp(stream) => {
                stream.set_read_timeout(Some(READ_POLL_INTERVAL))?;
                let write = stream.try_clone()?;
                Ok((
                    ReadHalf {
                        stream: Stream::Tcp(stream),
                    },
                    WriteHalf {
                        stream: Stream::Tcp(write),
                    },
                ))
            }
            #[cfg(feature = "tls")]
            Stream::Tls(shared) => {
                shared
                    .lock()
                    .expect("tls stream lock")
                    .get_ref()
                    .set_read_timeout(Some(READ_POLL_INTERVAL))?;
                Ok((
                    ReadHalf {
                        stream: Stream::Tls(shared.clone()),
                    },
                    WriteHalf {
                        stream: Stream::Tls(shared),
                    },
                ))
            }
        }
    }
}

pub struct ReadHalf {
    stream: Stream,
}

impl ReadHalf {
    /// Read whatever is available, blocking for at most
    /// [`READ_POLL_INTERVAL`]. Returns `Ok(None)` when the wait elapsed
    /// without data, `Ok(Some(0))` on clean end of stream.
    pub fn read_some(&mut self, buf: &mut [u8]) -> Result<Option<usize>, Error> {
        let res = match &mut self.stream {
            Stream::Tcp(stream) => stream.read(buf),
            #[cfg(feature = "tls")]
            Stream::Tls(shared) => shared.lock().expect("tls stream lock").read(buf),
        };
        match res {
            Ok(n) => Ok(Some(n)),
            Err(err)
                if err.kind() == io::ErrorKind::WouldBlock
                    || err.kind() == io::ErrorKind::TimedOut =>
            {
                Ok(None)
            }
            Err(err) => Err(err.into()),
        }
    }
}

pub struct WriteHalf {
    stream: Stream,
}

impl WriteHalf {
    pub fn write_all(&mut self, buf: &[u8]) -> Result<(), Error> {
        match &mut self.stream {
            Stream::Tcp(stream) => stream.write_all(buf)?,
            #[cfg(feature = "tls")]
            Stream::Tls(shared) => shared.lock().expect("tls stream lock").write_all(buf)?,
        }
        Ok(())
    }

    pub fn set_write_timeout(&self, timeout: Option<Duration>) -> Result<(), Error> {
        match &self.stream {
            Stream::Tcp(stream) => stream.set_write_timeout(timeout)?,
            #[cfg(feature = "tls")]
            Stream::Tls(shared) => shared
                .lock()
                .expect("tls stream lock")
                .get_ref()
                .set_write_timeout(timeout)?,
        }
        Ok(())
    }

    /// Shut the connection down in both directions. Idempotent: repeat
    /// calls on an already-closed socket are no-ops.
    pub fn close(&self) {
        match &self.stream {
            Stream::Tcp(stream) => {
                let _ = stream.shutdown(Shutdown::Both);
            }
            #[cfg(feature = "tls")]
            Stream::Tls(shared) => {
                if let Ok(mut stream) = shared.lock() {
                    let _ = stream.shutdown();
                }
            }
        }
    }
}
