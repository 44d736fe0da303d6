//! Networking traits and implementations.

use crate::error::Result;
use crate::party::PartyId;

pub mod local;
pub mod tcp;

pub use local::{LocalEndpoint, LocalSyncNetworking};
pub use tcp::TcpNetworking;

/// Requirements for the point-to-point channel between parties.
///
/// Both operations block. Messages sent from one party to another must be
/// received in the order they were sent; failures are reported as errors
/// and never as empty messages.
pub trait SyncNetworking: Send + Sync {
    /// Identity of the party this endpoint belongs to.
    fn own_party(&self) -> PartyId;

    fn send(&self, receiver: PartyId, bytes: &[u8]) -> Result<()>;

    fn receive(&self, sender: PartyId) -> Result<Vec<u8>>;
}
