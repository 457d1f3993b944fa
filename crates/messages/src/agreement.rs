//! Agreement events.

use crate::header::ConsensusHeader;
use sable_types::encoding::{self, Reader, WireError};
use sable_types::{BlsSignature, Certificate, SIGNATURE_SIZE};

/// The batched outcome of one reduction phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepVotes {
    /// Aggregate of the voters' signatures over (round, step, hash).
    pub aggregate: BlsSignature,
    /// Which committee members contributed, by committee index.
    pub bitmap: u64,
}

impl StepVotes {
    pub fn marshal(&self, buf: &mut Vec<u8>) {
        encoding::write_bytes(buf, self.aggregate.as_bytes());
        encoding::write_u64(buf, self.bitmap);
    }

    pub fn unmarshal(r: &mut Reader<'_>) -> Result<Self, WireError> {
        Ok(StepVotes {
            aggregate: BlsSignature::from_bytes(r.read_array::<SIGNATURE_SIZE>()?),
            bitmap: r.read_u64()?,
        })
    }
}

/// A member's claim that reduction succeeded at (round, step).
///
/// Carries both phases' batched votes. `header.step` is the step at which
/// the second reduction phase completed; the first phase ran at step - 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgreementMessage {
    pub header: ConsensusHeader,
    pub first_step: StepVotes,
    pub second_step: StepVotes,
}

impl AgreementMessage {
    /// Assemble the certificate this agreement testifies to.
    pub fn certificate(&self) -> Certificate {
        Certificate {
            step_one_sig: self.first_step.aggregate,
            step_two_sig: self.second_step.aggregate,
            step: self.header.step,
            step_one_committee: self.first_step.bitmap,
            step_two_committee: self.second_step.bitmap,
        }
    }

    pub fn marshal(&self, buf: &mut Vec<u8>) {
        self.header.marshal(buf);
        self.first_step.marshal(buf);
        self.second_step.marshal(buf);
    }

    pub fn unmarshal(r: &mut Reader<'_>) -> Result<Self, WireError> {
        Ok(AgreementMessage {
            header: ConsensusHeader::unmarshal(r)?,
            first_step: StepVotes::unmarshal(r)?,
            second_step: StepVotes::unmarshal(r)?,
        })
    }
}

/// The agreement component's verdict for a round: the hash that reached
/// quorum, its assembled certificate, and the BLS keys of the committee
/// that finalized it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WinningBlock {
    pub round: u64,
    pub hash: sable_types::Hash,
    pub certificate: Certificate,
    pub committee: Vec<sable_types::BlsPublicKey>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use sable_types::test_utils::keypairs;
    use sable_types::Hash;

    fn sample() -> AgreementMessage {
        let keys = &keypairs(1)[0];
        AgreementMessage {
            header: ConsensusHeader::sign(keys, 4, 3, Hash::digest(b"winner")),
            first_step: StepVotes {
                aggregate: keys.sign(b"one"),
                bitmap: 0b1101,
            },
            second_step: StepVotes {
                aggregate: keys.sign(b"two"),
                bitmap: 0b1011,
            },
        }
    }

    #[test]
    fn test_marshal_roundtrip() {
        let msg = sample();
        let mut buf = Vec::new();
        msg.marshal(&mut buf);
        let decoded = AgreementMessage::unmarshal(&mut Reader::new(&buf)).unwrap();
        assert_eq!(msg, decoded);
    }

    #[test]
    fn test_certificate_assembly() {
        let msg = sample();
        let cert = msg.certificate();
        assert_eq!(cert.step, msg.header.step);
        assert_eq!(cert.step_one_committee, 0b1101);
        assert_eq!(cert.step_two_committee, 0b1011);
        assert_eq!(cert.step_one_sig, msg.first_step.aggregate);
        assert_eq!(cert.step_two_sig, msg.second_step.aggregate);
    }
}
