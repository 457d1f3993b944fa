//! Block and certificate verification.

use crate::error::{CertificateError, SanityError};
use sable_messages::signing_message;
use sable_sortition::create_committee;
use sable_types::{aggregate_verify, tx_root, Block, BlsSignature, Provisioners, BLOCK_VERSION};

/// Stateless and stateful header checks against the parent block.
pub fn sanity_check(prev: &Block, block: &Block) -> Result<(), SanityError> {
    let header = &block.header;
    if header.version != BLOCK_VERSION {
        return Err(SanityError::UnsupportedVersion(header.version));
    }
    if header.prev_block_hash != prev.hash() {
        return Err(SanityError::PrevHashMismatch);
    }
    let expected = prev.header.height + 1;
    if header.height != expected {
        return Err(SanityError::HeightMismatch {
            expected,
            actual: header.height,
        });
    }
    if header.timestamp <= prev.header.timestamp {
        return Err(SanityError::TimestampNotMonotonic {
            parent: prev.header.timestamp,
            actual: header.timestamp,
        });
    }
    if header.tx_root != tx_root(&block.txs) {
        return Err(SanityError::TxRootMismatch);
    }
    if header.hash != header.compute_hash() {
        return Err(SanityError::HashMismatch);
    }
    Ok(())
}

/// Verify a block's certificate against the sortition committees.
///
/// Both step committees are rebuilt from the provisioner set and the
/// parent's seed; each phase's bitmap must carry quorum weight and its
/// batched signature must verify over the block hash under the members
/// the bitmap selects.
pub fn check_certificate(
    provisioners: &Provisioners,
    committee_size: usize,
    round_seed: &BlsSignature,
    block: &Block,
) -> Result<(), CertificateError> {
    let cert = &block.header.certificate;
    if cert.is_empty() {
        return Err(CertificateError::Empty);
    }
    if cert.step < 2 {
        return Err(CertificateError::StepOutOfRange(cert.step));
    }

    let round = block.header.height;
    let hash = block.hash();

    for (phase, step, bitmap, signature) in [
        (1u8, cert.step - 1, cert.step_one_committee, cert.step_one_sig),
        (2u8, cert.step, cert.step_two_committee, cert.step_two_sig),
    ] {
        let committee = create_committee(round, step, committee_size, provisioners, round_seed);
        let weight = committee.weight_by_bitmap(bitmap);
        let quorum = committee.quorum();
        if weight < quorum {
            return Err(CertificateError::UnderQuorum {
                phase,
                weight,
                quorum,
            });
        }
        let signers = committee.members_by_bitmap(bitmap);
        let message = signing_message(round, step, &hash);
        if !aggregate_verify(&message, &signature, &signers) {
            return Err(CertificateError::BadAggregate { phase });
        }
    }
    Ok(())
}
