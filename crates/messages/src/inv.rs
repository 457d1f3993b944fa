//! Inventory messages.
//!
//! `Inv` advertises objects to peers by hash; `GetBlocks` asks peers for
//! the blocks following a locator; `GetData` requests the advertised
//! objects themselves.

use sable_types::encoding::{self, Reader, WireError};
use sable_types::Hash;

/// Bound on the number of items in one inventory message.
pub const MAX_INV_ITEMS: u64 = 1 << 16;

const KIND_BLOCK: u8 = 0;
const KIND_TX: u8 = 1;

/// What an inventory item points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvKind {
    Block,
    Tx,
}

/// One advertised object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvItem {
    pub kind: InvKind,
    pub hash: Hash,
}

/// An inventory advertisement (also the payload of `GetData`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Inv {
    pub items: Vec<InvItem>,
}

impl Inv {
    /// Advertise a single block hash.
    pub fn block(hash: Hash) -> Self {
        Inv {
            items: vec![InvItem {
                kind: InvKind::Block,
                hash,
            }],
        }
    }

    pub fn marshal(&self, buf: &mut Vec<u8>) {
        encoding::write_varint(buf, self.items.len() as u64);
        for item in &self.items {
            let kind = match item.kind {
                InvKind::Block => KIND_BLOCK,
                InvKind::Tx => KIND_TX,
            };
            encoding::write_u8(buf, kind);
            encoding::write_bytes(buf, item.hash.as_bytes());
        }
    }

    pub fn unmarshal(r: &mut Reader<'_>) -> Result<Self, WireError> {
        let n = r.read_varint()?;
        if n > MAX_INV_ITEMS {
            return Err(WireError::TooLarge {
                len: n,
                max: MAX_INV_ITEMS,
            });
        }
        let mut items = Vec::with_capacity(n as usize);
        for _ in 0..n {
            let kind = match r.read_u8()? {
                KIND_BLOCK => InvKind::Block,
                KIND_TX => InvKind::Tx,
                tag => return Err(WireError::UnknownTag(tag)),
            };
            items.push(InvItem {
                kind,
                hash: Hash::from_bytes(r.read_array::<32>()?),
            });
        }
        Ok(Inv { items })
    }
}

/// Request for the blocks following `locator` (our current tip hash).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GetBlocks {
    pub locator: Hash,
}

impl GetBlocks {
    pub fn marshal(&self, buf: &mut Vec<u8>) {
        encoding::write_bytes(buf, self.locator.as_bytes());
    }

    pub fn unmarshal(r: &mut Reader<'_>) -> Result<Self, WireError> {
        Ok(GetBlocks {
            locator: Hash::from_bytes(r.read_array::<32>()?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inv_roundtrip() {
        let inv = Inv {
            items: vec![
                InvItem {
                    kind: InvKind::Block,
                    hash: Hash::digest(b"b"),
                },
                InvItem {
                    kind: InvKind::Tx,
                    hash: Hash::digest(b"t"),
                },
            ],
        };
        let mut buf = Vec::new();
        inv.marshal(&mut buf);
        assert_eq!(Inv::unmarshal(&mut Reader::new(&buf)).unwrap(), inv);
    }

    #[test]
    fn test_block_helper() {
        let inv = Inv::block(Hash::digest(b"tip"));
        assert_eq!(inv.items.len(), 1);
        assert_eq!(inv.items[0].kind, InvKind::Block);
    }

    #[test]
    fn test_get_blocks_roundtrip() {
        let msg = GetBlocks {
            locator: Hash::digest(b"tip"),
        };
        let mut buf = Vec::new();
        msg.marshal(&mut buf);
        assert_eq!(GetBlocks::unmarshal(&mut Reader::new(&buf)).unwrap(), msg);
    }
}
