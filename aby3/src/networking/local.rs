//! Networking implementation for local (debugging) execution.

use super::*;
use crate::error::Error;
use parking_lot::{Condvar, Mutex};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Default)]
struct Mailboxes {
    queues: HashMap<(PartyId, PartyId), VecDeque<Vec<u8>>>,
    disconnected: HashSet<PartyId>,
}

/// In-memory message hub connecting three parties that run as threads of
/// the same process.
///
/// This implementation is intended for local development/testing purposes
/// only. Every party talks to the hub through its own [`LocalEndpoint`].
pub struct LocalSyncNetworking {
    mailboxes: Mutex<Mailboxes>,
    delivered: Condvar,
    receive_timeout: Duration,
}

impl LocalSyncNetworking {
    pub fn new(receive_timeout: Duration) -> Arc<LocalSyncNetworking> {
        Arc::new(LocalSyncNetworking {
            mailboxes: Mutex::new(Mailboxes::default()),
            delivered: Condvar::new(),
            receive_timeout,
        })
    }

    pub fn endpoint(self: &Arc<Self>, party: PartyId) -> LocalEndpoint {
        LocalEndpoint {
            own: party,
            hub: Arc::clone(self),
        }
    }

    /// Simulates the loss of a party; pending and future exchanges with it fail.
    pub fn disconnect(&self, party: PartyId) {
        tracing::debug!("disconnecting {}", party);
        let mut mailboxes = self.mailboxes.lock();
        mailboxes.disconnected.insert(party);
        self.delivered.notify_all();
    }

    fn push(&self, sender: PartyId, receiver: PartyId, bytes: &[u8]) -> Result<()> {
        let mut mailboxes = self.mailboxes.lock();
        if mailboxes.disconnected.contains(&sender) || mailboxes.disconnected.contains(&receiver) {
            return Err(Error::Networking(format!(
                "{} cannot reach {}: disconnected",
                sender, receiver
            )));
        }
        mailboxes
            .queues
            .entry((sender, receiver))
            .or_default()
            .push_back(bytes.to_vec());
        self.delivered.notify_all();
        Ok(())
    }

    fn pop(&self, sender: PartyId, receiver: PartyId) -> Result<Vec<u8>> {
        let deadline = Instant::now() + self.receive_timeout;
        let mut mailboxes = self.mailboxes.lock();
        loop {
            if let Some(bytes) = mailboxes
                .queues
                .get_mut(&(sender, receiver))
                .and_then(|queue| queue.pop_front())
            {
                return Ok(bytes);
            }
            if mailboxes.disconnected.contains(&sender) || mailboxes.disconnected.contains(&receiver)
            {
                return Err(Error::Networking(format!(
                    "{} cannot hear from {}: disconnected",
                    receiver, sender
                )));
            }
            if self
                .delivered
                .wait_until(&mut mailboxes, deadline)
                .timed_out()
            {
                tracing::warn!("{} timed out waiting for {}", receiver, sender);
                return Err(Error::Networking(format!(
                    "{} timed out waiting for {}",
                    receiver, sender
                )));
            }
        }
    }
}

/// View of a [`LocalSyncNetworking`] hub from one party.
#[derive(Clone)]
pub struct LocalEndpoint {
    own: PartyId,
    hub: Arc<LocalSyncNetworking>,
}

impl SyncNetworking for LocalEndpoint {
    fn own_party(&self) -> PartyId {
        self.own
    }

    fn send(&self, receiver: PartyId, bytes: &[u8]) -> Result<()> {
        tracing::trace!("local send {} -> {}: {} bytes", self.own, receiver, bytes.len());
        self.hub.push(self.own, receiver, bytes)
    }

    fn receive(&self, sender: PartyId) -> Result<Vec<u8>> {
        tracing::trace!("local receive {} <- {}", self.own, sender);
        self.hub.pop(sender, self.own)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifo_per_direction() {
        let net = LocalSyncNetworking::new(Duration::from_secs(1));
        let alice = net.endpoint(PartyId::P0);
        let bob = net.endpoint(PartyId::P1);

        alice.send(PartyId::P1, b"first").unwrap();
        alice.send(PartyId::P1, b"second").unwrap();
        bob.send(PartyId::P0, b"reply").unwrap();

        assert_eq!(bob.receive(PartyId::P0).unwrap(), b"first".to_vec());
        assert_eq!(bob.receive(PartyId::P0).unwrap(), b"second".to_vec());
        assert_eq!(alice.receive(PartyId::P1).unwrap(), b"reply".to_vec());
    }

    #[test]
    fn blocking_receive() {
        let net = LocalSyncNetworking::new(Duration::from_secs(5));
        let carole = net.endpoint(PartyId::P2);
        let alice = net.endpoint(PartyId::P0);

        let receiver = std::thread::spawn(move || carole.receive(PartyId::P0));
        std::thread::sleep(Duration::from_millis(20));
        alice.send(PartyId::P2, &[1, 2, 3]).unwrap();

        assert_eq!(receiver.join().unwrap().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn receive_times_out() {
        let net = LocalSyncNetworking::new(Duration::from_millis(10));
        let bob = net.endpoint(PartyId::P1);
        assert!(matches!(bob.receive(PartyId::P2), Err(Error::Networking(_))));
    }

    #[test]
    fn disconnected_party() {
        let net = LocalSyncNetworking::new(Duration::from_secs(5));
        let alice = net.endpoint(PartyId::P0);
        let bob = net.endpoint(PartyId::P1);

        let receiver = std::thread::spawn(move || bob.receive(PartyId::P2));
        std::thread::sleep(Duration::from_millis(20));
        net.disconnect(PartyId::P2);

        assert!(matches!(receiver.join().unwrap(), Err(Error::Networking(_))));
        assert!(matches!(
            alice.send(PartyId::P2, &[0]),
            Err(Error::Networking(_))
        ));
    }
}
