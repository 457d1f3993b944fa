//! Consensus phases for the sable node.
//!
//! One round of consensus runs: score generation and dissemination,
//! best-score selection, two reduction phases that collapse candidate
//! hashes to one, and an agreement phase that assembles the round's
//! certificate. The [`Coordinator`] owns the per-round lifecycle of
//! these components; the chain crate consumes the winning block it
//! announces.

pub mod agreement;
pub mod candidates;
pub mod config;
pub mod coordinator;
pub mod generator;
pub mod queue;
pub mod reduction;
pub mod score;
pub mod selection;

pub use agreement::AgreementAccumulator;
pub use config::ConsensusConfig;
pub use coordinator::Coordinator;
pub use generator::{BlockGenerator, GeneratorError};
pub use queue::EventQueue;
pub use reduction::{reduction_succeeded, AggregatedVotes, PhaseResult, ReductionPhase};
pub use score::{LocalProver, LocalVerifier, ScoreProof, ScoreProver, ScoreVerifier};
pub use selection::{Selector, SelectorState};
