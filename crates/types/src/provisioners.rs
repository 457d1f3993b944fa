//! The provisioner set.
//!
//! Provisioners are stakers eligible for committee sortition. Members are
//! kept ordered by BLS public key so that the canonical walk of the set is
//! identical on every node.

use crate::bls::BlsPublicKey;
use std::collections::BTreeMap;

/// A single stake entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stake {
    pub value: u64,
    pub start_height: u64,
    pub end_height: u64,
}

impl Stake {
    /// A stake counts at height `h` iff `start_height <= h < end_height`.
    pub fn is_active(&self, height: u64) -> bool {
        self.start_height <= height && height < self.end_height
    }

    pub fn is_expired(&self, height: u64) -> bool {
        height >= self.end_height
    }
}

/// A provisioner and its stakes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub public_key: BlsPublicKey,
    pub stakes: Vec<Stake>,
}

impl Member {
    /// Sum of stakes active at `height`.
    pub fn active_stake(&self, height: u64) -> u64 {
        self.stakes
            .iter()
            .filter(|s| s.is_active(height))
            .map(|s| s.value)
            .sum()
    }
}

/// The ordered set of provisioners.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Provisioners {
    members: BTreeMap<BlsPublicKey, Member>,
}

impl Provisioners {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a stake for a member, creating the member if needed.
    ///
    /// Idempotent per (member, start_height): a stake whose start height
    /// matches an existing entry of the same member is ignored.
    pub fn add_stake(&mut self, public_key: BlsPublicKey, stake: Stake) {
        let member = self.members.entry(public_key).or_insert_with(|| Member {
            public_key,
            stakes: Vec::new(),
        });
        if member
            .stakes
            .iter()
            .any(|s| s.start_height == stake.start_height)
        {
            return;
        }
        member.stakes.push(stake);
    }

    /// Drop stakes that expired at `height`; members left without stakes
    /// are removed. Runs during block acceptance.
    pub fn remove_expired(&mut self, height: u64) {
        for member in self.members.values_mut() {
            member.stakes.retain(|s| !s.is_expired(height));
        }
        self.members.retain(|_, m| !m.stakes.is_empty());
    }

    /// Sum of all active stake at `height`.
    pub fn total_active_stake(&self, height: u64) -> u64 {
        self.members.values().map(|m| m.active_stake(height)).sum()
    }

    /// Members in canonical (public key) order.
    pub fn members(&self) -> impl Iterator<Item = &Member> {
        self.members.values()
    }

    pub fn member(&self, public_key: &BlsPublicKey) -> Option<&Member> {
        self.members.get(public_key)
    }

    pub fn contains(&self, public_key: &BlsPublicKey) -> bool {
        self.members.contains_key(public_key)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}
