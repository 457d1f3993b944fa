//! Acceptance pipeline scenarios.

use sable_bus::{
    EventBus, RequestBus, RequestParams, RequestResponse, RequestTopic, Topic,
};
use sable_chain::{
    genesis_block, Chain, ChainCommand, ChainConfig, MemoryLoader, StaticExecutor, SyncCounter,
    TipProvider,
};
use sable_messages::{signing_message, GossipKind, Inv, Payload};
use sable_sortition::create_committee;
use sable_types::test_utils::{child_block, keypairs, provisioners};
use sable_types::{Block, BlsKeyPair, BlsSignature, Certificate, Hash, Provisioners, Reader};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

const COMMITTEE_SIZE: usize = 15;
const CERT_STEP: u8 = 3;

struct Harness {
    bus: EventBus,
    rb: RequestBus,
    keys: Vec<BlsKeyPair>,
    provisioners: Provisioners,
    tip: Arc<TipProvider>,
    counter: Arc<SyncCounter>,
    highest: mpsc::Sender<u64>,
    commands: mpsc::Sender<ChainCommand>,
    cancel: CancellationToken,
}

fn config() -> ChainConfig {
    ChainConfig {
        committee_size: COMMITTEE_SIZE,
        get_candidate_timeout: Duration::from_millis(500),
        ..Default::default()
    }
}

fn start_chain() -> Harness {
    let bus = EventBus::new();
    let rb = RequestBus::new();
    let keys = keypairs(5);
    let p = provisioners(&keys, 500);
    let chain = Chain::new(
        bus.clone(),
        rb.clone(),
        Arc::new(MemoryLoader::new()),
        Arc::new(StaticExecutor::new(p.clone())),
        config(),
        Default::default(),
    )
    .unwrap();

    let tip = chain.tip();
    let counter = chain.counter();
    let highest = chain.highest_seen_sender();
    let commands = chain.commands();
    let cancel = CancellationToken::new();
    let _chain = chain.spawn(cancel.clone());

    Harness {
        bus,
        rb,
        keys,
        provisioners: p,
        tip,
        counter,
        highest,
        commands,
        cancel,
    }
}

/// Sign a full-committee certificate over `block`.
fn certify(h: &Harness, parent: &Block, block: &mut Block) {
    let round = block.header.height;
    let hash = block.hash();
    let phase = |step: u8| {
        let committee = create_committee(
            round,
            step,
            COMMITTEE_SIZE,
            &h.provisioners,
            &parent.header.seed,
        );
        let mut sigs = Vec::new();
        let mut signers = Vec::new();
        for key in &h.keys {
            if committee.contains(&key.public_key()) {
                let msg = signing_message(round, step, &hash);
                sigs.push(key.sign(&msg));
                signers.push(key.public_key());
            }
        }
        (
            BlsSignature::aggregate(&sigs).unwrap(),
            committee.bitmap_of(signers.iter()),
        )
    };
    let (one_sig, one_bitmap) = phase(CERT_STEP - 1);
    let (two_sig, two_bitmap) = phase(CERT_STEP);
    block.header.certificate = Certificate {
        step_one_sig: one_sig,
        step_two_sig: two_sig,
        step: CERT_STEP,
        step_one_committee: one_bitmap,
        step_two_committee: two_bitmap,
    };
}

/// A certified child of `parent`.
fn certified_child(h: &Harness, parent: &Block) -> Block {
    let mut block = child_block(parent, &h.keys[0], vec![]);
    certify(h, parent, &mut block);
    block
}

async fn recv_payload(
    rx: &mut mpsc::Receiver<sable_bus::BusMessage>,
    what: &str,
) -> Payload {
    tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {what}"))
        .expect("bus alive")
        .payload
}

/// Genesis boot: the chain starts at height 0 with an empty certificate
/// and emits the round-1 update on initialization.
#[tokio::test]
async fn test_genesis_boot() {
    let h = start_chain();
    assert_eq!(h.tip.height(), 0);
    assert_eq!(h.tip.get().hash(), genesis_block().hash());

    let (_sub, mut ru_rx) = h.bus.subscribe(Topic::RoundUpdate);
    h.bus.publish(Topic::Initialization, Payload::Empty);

    match recv_payload(&mut ru_rx, "round update").await {
        Payload::RoundUpdate(ru) => {
            assert_eq!(ru.round, 1);
            assert_eq!(ru.hash, genesis_block().hash());
        }
        other => panic!("unexpected payload {}", other.kind()),
    }

    let resp = h
        .rb
        .call(
            RequestTopic::GetLastCertificate,
            RequestParams::None,
            Duration::from_secs(1),
        )
        .await
        .unwrap();
    match resp {
        RequestResponse::Certificate(cert) => assert!(cert.is_empty()),
        other => panic!("unexpected response {other:?}"),
    }

    h.cancel.cancel();
}

/// Happy path: a well-formed certified block advances the tip, is
/// announced internally, advertised to peers and restarts consensus.
#[tokio::test]
async fn test_happy_path_acceptance() {
    let h = start_chain();
    let genesis = genesis_block();
    let block = certified_child(&h, &genesis);

    let (_a, mut accepted_rx) = h.bus.subscribe(Topic::AcceptedBlock);
    let (_g, mut gossip_rx) = h.bus.subscribe(Topic::Gossip);
    let (_r, mut ru_rx) = h.bus.subscribe(Topic::RoundUpdate);

    h.bus
        .publish(Topic::Block, Payload::Block(Box::new(block.clone())));

    match recv_payload(&mut accepted_rx, "accepted block").await {
        Payload::AcceptedBlock(accepted) => assert_eq!(accepted.hash(), block.hash()),
        other => panic!("unexpected payload {}", other.kind()),
    }
    assert_eq!(h.tip.height(), 1);
    assert_eq!(h.tip.get().hash(), block.hash());
    assert_eq!(h.counter.remaining(), 0);

    // The inventory advertisement carries the new hash.
    match recv_payload(&mut gossip_rx, "inv advertisement").await {
        Payload::Gossip(frame) => {
            assert_eq!(frame.kind, GossipKind::Inv);
            let inv = Inv::unmarshal(&mut Reader::new(&frame.bytes)).unwrap();
            assert_eq!(inv.items[0].hash, block.hash());
        }
        other => panic!("unexpected payload {}", other.kind()),
    }

    // Consensus restarts for the next round.
    match recv_payload(&mut ru_rx, "round update").await {
        Payload::RoundUpdate(ru) => assert_eq!(ru.round, 2),
        other => panic!("unexpected payload {}", other.kind()),
    }

    h.cancel.cancel();
}

/// A timestamp equal to the parent's is a validation failure: the tip
/// stays put and nothing is published.
#[tokio::test]
async fn test_timestamp_regression_rejected() {
    let h = start_chain();
    let genesis = genesis_block();
    let mut block = child_block(&genesis, &h.keys[0], vec![]);
    block.header.timestamp = genesis.header.timestamp;
    block.header.hash = block.header.compute_hash();
    certify(&h, &genesis, &mut block);

    let (_a, mut accepted_rx) = h.bus.subscribe(Topic::AcceptedBlock);
    h.bus.publish(Topic::Block, Payload::Block(Box::new(block)));

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(h.tip.height(), 0);
    assert!(accepted_rx.try_recv().is_err(), "no publications expected");

    h.cancel.cancel();
}

/// A certificate whose bitmap falls below quorum is rejected.
#[tokio::test]
async fn test_certificate_under_quorum_rejected() {
    let h = start_chain();
    let genesis = genesis_block();
    let mut block = certified_child(&h, &genesis);
    // Thin the second phase down to one contributor.
    let bitmap = block.header.certificate.step_two_committee;
    block.header.certificate.step_two_committee = bitmap & bitmap.wrapping_neg();

    let (_a, mut accepted_rx) = h.bus.subscribe(Topic::AcceptedBlock);
    h.bus.publish(Topic::Block, Payload::Block(Box::new(block)));

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(h.tip.height(), 0);
    assert!(accepted_rx.try_recv().is_err());

    h.cancel.cancel();
}

/// A height gap halts consensus and opens a sync; the gap then drains
/// strictly in order and only the final block restarts consensus.
#[tokio::test]
async fn test_sync_gap_walk() {
    let h = start_chain();
    let genesis = genesis_block();

    // Pre-build the chain 1..=5.
    let mut blocks = Vec::new();
    let mut parent = genesis.clone();
    for _ in 0..5 {
        let block = certified_child(&h, &parent);
        parent = block.clone();
        blocks.push(block);
    }

    let (_s, mut stop_rx) = h.bus.subscribe(Topic::StopConsensus);
    let (_g, mut gossip_rx) = h.bus.subscribe(Topic::Gossip);
    let (_r, mut ru_rx) = h.bus.subscribe(Topic::RoundUpdate);
    let (_a, mut accepted_rx) = h.bus.subscribe(Topic::AcceptedBlock);

    // Height 5 lands on a tip at height 0.
    h.bus
        .publish(Topic::Block, Payload::Block(Box::new(blocks[4].clone())));

    match recv_payload(&mut stop_rx, "stop consensus").await {
        Payload::Empty => {}
        other => panic!("unexpected payload {}", other.kind()),
    }
    match recv_payload(&mut gossip_rx, "get blocks request").await {
        Payload::Gossip(frame) => assert_eq!(frame.kind, GossipKind::GetBlocks),
        other => panic!("unexpected payload {}", other.kind()),
    }
    assert_eq!(h.tip.height(), 0, "gapped block must not be accepted");
    assert_eq!(h.counter.remaining(), 4);

    // Drain the gap in order; consensus stays down until the end.
    for (i, block) in blocks.iter().enumerate() {
        h.bus
            .publish(Topic::Block, Payload::Block(Box::new(block.clone())));
        match recv_payload(&mut accepted_rx, "accepted block").await {
            Payload::AcceptedBlock(accepted) => assert_eq!(accepted.hash(), block.hash()),
            other => panic!("unexpected payload {}", other.kind()),
        }
        if i < 4 {
            assert!(
                ru_rx.try_recv().is_err(),
                "no round update while the gap drains"
            );
        }
    }

    assert_eq!(h.tip.height(), 5);
    assert_eq!(h.counter.remaining(), 0);
    match recv_payload(&mut ru_rx, "round update").await {
        Payload::RoundUpdate(ru) => assert_eq!(ru.round, 6),
        other => panic!("unexpected payload {}", other.kind()),
    }

    h.cancel.cancel();
}

/// Out-of-order accepts are refused even mid-sync.
#[tokio::test]
async fn test_blocks_accepted_only_in_order() {
    let h = start_chain();
    let genesis = genesis_block();
    let b1 = certified_child(&h, &genesis);
    let b2 = certified_child(&h, &b1);

    let (_a, mut accepted_rx) = h.bus.subscribe(Topic::AcceptedBlock);

    // Height 2 first: opens a sync, not an acceptance.
    h.bus
        .publish(Topic::Block, Payload::Block(Box::new(b2.clone())));
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(h.tip.height(), 0);

    // Then in order.
    h.bus
        .publish(Topic::Block, Payload::Block(Box::new(b1.clone())));
    recv_payload(&mut accepted_rx, "block 1").await;
    h.bus.publish(Topic::Block, Payload::Block(Box::new(b2)));
    recv_payload(&mut accepted_rx, "block 2").await;
    assert_eq!(h.tip.height(), 2);

    h.cancel.cancel();
}

/// While syncing, a locally won agreement is discarded.
#[tokio::test]
async fn test_local_agreement_discarded_while_syncing() {
    let h = start_chain();
    let genesis = genesis_block();

    // Open a gap so the chain is syncing.
    let mut far = certified_child(&h, &genesis);
    far.header.height = 10;
    far.header.hash = far.header.compute_hash();
    h.bus.publish(Topic::Block, Payload::Block(Box::new(far)));
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(h.counter.is_syncing());

    // A candidate request would be the next step of the winning-block
    // path; it must never arrive.
    let mut candidate_reqs = h.rb.register(RequestTopic::GetCandidate).unwrap();
    h.bus.publish(
        Topic::Agreement,
        Payload::WinningBlock(Box::new(sable_messages::WinningBlock {
            round: 1,
            hash: Hash::digest(b"local win"),
            certificate: Certificate::empty(),
            committee: vec![],
        })),
    );
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(candidate_reqs.try_recv().is_err());

    h.cancel.cancel();
}

/// The highest seen height feeds sync progress, clamped at both ends.
#[tokio::test]
async fn test_sync_progress_reporting() {
    let h = start_chain();
    h.highest.send(4).await.unwrap();

    let genesis = genesis_block();
    let b1 = certified_child(&h, &genesis);
    let (_a, mut accepted_rx) = h.bus.subscribe(Topic::AcceptedBlock);
    h.bus.publish(Topic::Block, Payload::Block(Box::new(b1)));
    recv_payload(&mut accepted_rx, "block 1").await;

    let (tx, rx) = tokio::sync::oneshot::channel();
    h.commands
        .send(ChainCommand::SyncProgress { response: tx })
        .await
        .unwrap();
    let progress = rx.await.unwrap();
    assert_eq!(progress, 25.0);

    h.cancel.cancel();
}

/// Rebuilding wipes storage, resets the tip to genesis and clears the
/// wallet database over the request bus.
#[tokio::test]
async fn test_rebuild_resets_to_genesis() {
    let h = start_chain();

    // A no-op wallet for the rebuild's database clear.
    let mut wallet_rx = h.rb.register(RequestTopic::ClearWalletDatabase).unwrap();
    tokio::spawn(async move {
        while let Some(req) = wallet_rx.recv().await {
            let _ = req.response.send(Ok(RequestResponse::Empty));
        }
    });

    let genesis = genesis_block();
    let b1 = certified_child(&h, &genesis);
    let (_a, mut accepted_rx) = h.bus.subscribe(Topic::AcceptedBlock);
    h.bus.publish(Topic::Block, Payload::Block(Box::new(b1)));
    recv_payload(&mut accepted_rx, "block 1").await;
    assert_eq!(h.tip.height(), 1);

    let (_s, mut stop_rx) = h.bus.subscribe(Topic::StopConsensus);
    let (tx, rx) = tokio::sync::oneshot::channel();
    h.commands
        .send(ChainCommand::Rebuild { response: tx })
        .await
        .unwrap();
    rx.await.unwrap().expect("rebuild should succeed");

    match recv_payload(&mut stop_rx, "stop consensus").await {
        Payload::Empty => {}
        other => panic!("unexpected payload {}", other.kind()),
    }
    assert_eq!(h.tip.height(), 0);
    assert_eq!(h.tip.get().hash(), genesis.hash());

    h.cancel.cancel();
}
