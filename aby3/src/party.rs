//! Party identities on the three-party ring.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::convert::TryFrom;
use std::fmt;

/// Number of parties taking part in the protocol.
pub const NUM_PARTIES: usize = 3;

/// Identity of one of the three parties.
///
/// Parties form a ring `0 -> 1 -> 2 -> 0`; every party shares one PRNG
/// stream with each of its two neighbours.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(try_from = "usize", into = "usize")]
pub struct PartyId(u8);

impl PartyId {
    pub const P0: PartyId = PartyId(0);
    pub const P1: PartyId = PartyId(1);
    pub const P2: PartyId = PartyId(2);

    pub fn new(id: usize) -> Result<PartyId> {
        PartyId::try_from(id)
    }

    pub fn index(&self) -> usize {
        self.0 as usize
    }

    pub fn next(&self) -> PartyId {
        PartyId((self.0 + 1) % NUM_PARTIES as u8)
    }

    pub fn prev(&self) -> PartyId {
        PartyId((self.0 + 2) % NUM_PARTIES as u8)
    }

    pub fn all() -> [PartyId; NUM_PARTIES] {
        [PartyId::P0, PartyId::P1, PartyId::P2]
    }
}

impl TryFrom<usize> for PartyId {
    type Error = Error;

    fn try_from(id: usize) -> Result<PartyId> {
        if id < NUM_PARTIES {
            Ok(PartyId(id as u8))
        } else {
            Err(Error::InvalidParty(id))
        }
    }
}

impl From<PartyId> for usize {
    fn from(party: PartyId) -> usize {
        party.index()
    }
}

impl fmt::Display for PartyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "party{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_neighbours() {
        assert_eq!(PartyId::P0.next(), PartyId::P1);
        assert_eq!(PartyId::P1.next(), PartyId::P2);
        assert_eq!(PartyId::P2.next(), PartyId::P0);

        assert_eq!(PartyId::P0.prev(), PartyId::P2);
        assert_eq!(PartyId::P1.prev(), PartyId::P0);
        assert_eq!(PartyId::P2.prev(), PartyId::P1);

        for party in PartyId::all() {
            assert_eq!(party.next().prev(), party);
        }
    }

    #[test]
    fn out_of_range() {
        assert_eq!(PartyId::new(3), Err(Error::InvalidParty(3)));
        assert_eq!(PartyId::new(2), Ok(PartyId::P2));
    }
}
