//! Blocking TCP networking between the three parties.
//!
//! Every pair of parties shares one TCP stream: the party with the higher
//! id connects, the party with the lower id accepts. Messages are framed
//! with a little-endian `u64` length prefix.

use super::*;
use crate::config::Aby3Config;
use crate::error::Error;
use crate::party::NUM_PARTIES;
use byteorder::{ByteOrder, LittleEndian};
use parking_lot::Mutex;
use std::convert::TryFrom;
use std::io::{ErrorKind, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::thread::sleep;
use std::time::{Duration, Instant};

const CONNECT_RETRY_INTERVAL: Duration = Duration::from_millis(100);
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(10);
/// Largest frame a peer may announce.
const MAX_FRAME_BYTES: u64 = 1 << 32;

struct Peer {
    reader: Mutex<TcpStream>,
    writer: Mutex<TcpStream>,
}

pub struct TcpNetworking {
    own: PartyId,
    peers: [Option<Peer>; NUM_PARTIES],
}

impl TcpNetworking {
    /// Binds to this party's address and connects to the other two.
    ///
    /// `addresses` is indexed by party id.
    pub fn connect(config: &Aby3Config, addresses: &[String; NUM_PARTIES]) -> Result<TcpNetworking> {
        let own_address = &addresses[config.party.index()];
        let listener = TcpListener::bind(own_address).map_err(|e| {
            Error::Networking(format!("could not bind to address: {}: {}", own_address, e))
        })?;
        tracing::debug!("{} listening on {}", config.party, own_address);
        Self::from_listener(config, listener, addresses)
    }

    /// Like [`TcpNetworking::connect`] but with an already bound listener.
    pub fn from_listener(
        config: &Aby3Config,
        listener: TcpListener,
        addresses: &[String; NUM_PARTIES],
    ) -> Result<TcpNetworking> {
        let own = config.party;
        let timeout = config.receive_timeout();
        let mut peers: [Option<Peer>; NUM_PARTIES] = [None, None, None];

        for peer in PartyId::all().iter().filter(|p| **p < own) {
            let stream = connect_with_retry(&addresses[peer.index()], timeout)?;
            let mut hello = [0u8; 8];
            LittleEndian::write_u64(&mut hello, own.index() as u64);
            write_all(&stream, &hello)?;
            tracing::debug!("{} connected to {}", own, peer);
            peers[peer.index()] = Some(Peer::new(stream, timeout)?);
        }

        let expected = PartyId::all().iter().filter(|p| **p > own).count();
        let deadline = Instant::now() + timeout;
        listener
            .set_nonblocking(expected > 0)
            .map_err(|e| Error::Networking(format!("failed to configure listener: {}", e)))?;
        for _ in 0..expected {
            let (stream, addr) = accept_until(&listener, deadline)?;
            stream
                .set_nonblocking(false)
                .and_then(|_| stream.set_read_timeout(Some(timeout)))
                .map_err(|e| Error::Networking(e.to_string()))?;
            let mut hello = [0u8; 8];
            read_exact(&stream, &mut hello)?;
            let peer = PartyId::new(LittleEndian::read_u64(&hello) as usize)
                .map_err(|e| Error::Networking(format!("bad hello from {}: {}", addr, e)))?;
            if peer <= own || peers[peer.index()].is_some() {
                return Err(Error::Networking(format!(
                    "unexpected connection from {} claiming to be {}",
                    addr, peer
                )));
            }
            tracing::debug!("{} accepted {} from {}", own, peer, addr);
            peers[peer.index()] = Some(Peer::new(stream, timeout)?);
        }

        Ok(TcpNetworking { own, peers })
    }

    fn peer(&self, party: PartyId) -> Result<&Peer> {
        self.peers[party.index()]
            .as_ref()
            .ok_or_else(|| Error::Networking(format!("{} has no channel to {}", self.own, party)))
    }
}

impl Peer {
    fn new(stream: TcpStream, timeout: Duration) -> Result<Peer> {
        stream
            .set_nodelay(true)
            .and_then(|_| stream.set_read_timeout(Some(timeout)))
            .map_err(|e| Error::Networking(format!("failed to configure TCP stream: {}", e)))?;
        let writer = stream
            .try_clone()
            .map_err(|e| Error::Networking(format!("failed to clone TCP stream: {}", e)))?;
        Ok(Peer {
            reader: Mutex::new(stream),
            writer: Mutex::new(writer),
        })
    }
}

fn connect_with_retry(address: &str, timeout: Duration) -> Result<TcpStream> {
    let deadline = Instant::now() + timeout;
    loop {
        match TcpStream::connect(address) {
            Ok(stream) => return Ok(stream),
            Err(e) if Instant::now() >= deadline => {
                return Err(Error::Networking(format!(
                    "could not connect to {}: {}",
                    address, e
                )))
            }
            Err(_) => sleep(CONNECT_RETRY_INTERVAL),
        }
    }
}

fn accept_until(listener: &TcpListener, deadline: Instant) -> Result<(TcpStream, SocketAddr)> {
    loop {
        match listener.accept() {
            Ok(accepted) => return Ok(accepted),
            Err(e) if e.kind() == ErrorKind::WouldBlock => {
                if Instant::now() >= deadline {
                    return Err(Error::Networking(format!(
                        "no connection on {:?} before the deadline",
                        listener.local_addr().ok()
                    )));
                }
                sleep(ACCEPT_POLL_INTERVAL)
            }
            Err(e) => {
                return Err(Error::Networking(format!(
                    "failed to accept connection: {}",
                    e
                )))
            }
        }
    }
}

fn write_all(mut stream: &TcpStream, bytes: &[u8]) -> Result<()> {
    stream
        .write_all(bytes)
        .and_then(|_| stream.flush())
        .map_err(|e| Error::Networking(format!("could not write data over TCP stream: {}", e)))
}

fn read_exact(mut stream: &TcpStream, buf: &mut [u8]) -> Result<()> {
    stream
        .read_exact(buf)
        .map_err(|e| Error::Networking(format!("failed to read data from TCP stream: {}", e)))
}

fn read_frame(stream: &TcpStream) -> Result<Vec<u8>> {
    let mut size = [0u8; 8];
    read_exact(stream, &mut size)?;
    let len = LittleEndian::read_u64(&size);
    if len > MAX_FRAME_BYTES {
        return Err(Error::Networking(format!(
            "peer announced a frame of {} bytes, limit is {}",
            len, MAX_FRAME_BYTES
        )));
    }
    let len = usize::try_from(len)
        .map_err(|_| Error::Networking(format!("frame of {} bytes does not fit in memory", len)))?;
    let mut bytes = vec![0u8; len];
    read_exact(stream, &mut bytes)?;
    Ok(bytes)
}

impl SyncNetworking for TcpNetworking {
    fn own_party(&self) -> PartyId {
        self.own
    }

    fn send(&self, receiver: PartyId, bytes: &[u8]) -> Result<()> {
        let peer = self.peer(receiver)?;
        let mut frame = vec![0u8; 8 + bytes.len()];
        LittleEndian::write_u64(&mut frame[..8], bytes.len() as u64);
        frame[8..].copy_from_slice(bytes);
        let stream = peer.writer.lock();
        tracing::trace!("tcp send {} -> {}: {} bytes", self.own, receiver, bytes.len());
        write_all(&stream, &frame)
    }

    fn receive(&self, sender: PartyId) -> Result<Vec<u8>> {
        let peer = self.peer(sender)?;
        let stream = peer.reader.lock();
        let bytes = read_frame(&stream)?;
        tracing::trace!("tcp receive {} <- {}: {} bytes", self.own, sender, bytes.len());
        Ok(bytes)
    }
}
