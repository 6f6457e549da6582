//! End-to-end chain scenarios: linear growth, fork swaps, deep reorgs and orphan recovery.

use assert_matches::assert_matches;
use ironfish_chain::testing::TestHarness;
use ironfish_chain::{AddBlockResult, ChainEvent, ChainProcessor, SpendReason, ValidationError};
use ironfish_protocol::hash::{BlockHash, Nullifier};

#[test]
fn linear_chain_grows_to_tip() {
    let mut node = TestHarness::new();

    let mut blocks = Vec::new();
    for _ in 0..9 {
        blocks.push(node.mine_next(Vec::new()));
    }

    assert_eq!(node.chain.head_sequence(), 10);
    assert_eq!(node.chain.head_hash(), Some(blocks.last().unwrap().hash()));

    // Every block is on the main chain and indexed by sequence.
    for (i, block) in blocks.iter().enumerate() {
        assert!(node.chain.is_head_chain(block.header()).unwrap());
        assert_eq!(
            node.chain.get_main_hash_at(i as u32 + 2).unwrap(),
            Some(block.hash())
        );
    }

    // Iteration walks the same chain in both directions.
    let genesis = node.chain.genesis_hash().unwrap().unwrap();
    let forward = node.chain.iterate_to_head(&genesis).unwrap();
    assert_eq!(forward.len(), 9);
    assert_eq!(forward.last().unwrap().hash(), node.chain.head_hash().unwrap());
    let backward = node.chain.iterate_to_genesis(&node.chain.head_hash().unwrap()).unwrap();
    assert_eq!(backward.len(), 10);
    assert_eq!(backward.last().unwrap().hash(), genesis);
}

#[test]
fn tampered_transaction_lists_are_rejected() {
    let mut node = TestHarness::new();
    let block = node.build_next(Vec::new());

    // Slip an extra fee-paying transaction in without rebuilding the header.
    let extra = node.paying_tx(50);
    let mut transactions = block.transactions().to_vec();
    transactions.push(extra);
    let tampered = ironfish_protocol::block::Block::new(block.header().clone(), transactions);

    assert_matches!(
        node.chain.add_block(&tampered).unwrap(),
        AddBlockResult::Invalid(ValidationError::InvalidMinersFee { .. })
    );
}

#[test]
fn blocks_replay_into_an_empty_node() {
    let mut source = TestHarness::with_node_id(1);
    let mut blocks = Vec::new();
    for _ in 0..9 {
        blocks.push(source.mine_next(Vec::new()));
    }

    // An empty node ingests the same blocks in order with no orphans or forks.
    let mut sink = TestHarness::with_node_id(2);
    for block in &blocks {
        assert_matches!(sink.chain.add_block(block).unwrap(), AddBlockResult::Added);
    }
    assert_eq!(sink.chain.head_hash(), source.chain.head_hash());
}

#[test]
fn duplicate_blocks_are_idempotent() {
    let mut node = TestHarness::new();
    let block = node.mine_next(Vec::new());
    assert_matches!(node.chain.add_block(&block).unwrap(), AddBlockResult::AlreadyAdded);
    assert_eq!(node.chain.head_hash(), Some(block.hash()));
}

#[test]
fn heavier_fork_swaps_the_head() {
    // Node A mines one block; node B mines two on the shared genesis. B's chain carries
    // strictly more work at its tip, so after ingesting both blocks A's head must be B2.
    // Whether B1 already wins its same-work tie against A1 depends on hash order, but the
    // emitted event stream is identical either way.
    let mut a = TestHarness::with_node_id(1);
    let mut events = a.chain.subscribe();
    let a1 = a.mine_next(Vec::new());

    let mut b = TestHarness::with_node_id(2);
    let b1 = b.mine_next(Vec::new());
    let b2 = b.mine_next(Vec::new());

    a.chain.add_block(&b1).unwrap();
    assert_matches!(a.chain.add_block(&b2).unwrap(), AddBlockResult::Added);

    assert_eq!(a.chain.head_hash(), Some(b2.hash()));
    assert!(!a.chain.is_head_chain(a1.header()).unwrap());
    assert!(a.chain.is_head_chain(b1.header()).unwrap());

    // A1's transactions fell out of the index; B1's are in.
    for tx in a1.transactions() {
        assert!(a.chain.get_transaction(&tx.hash()).unwrap().is_none());
    }
    for tx in b1.transactions() {
        assert!(a.chain.get_transaction(&tx.hash()).unwrap().is_some());
    }

    // Events: connect A1, then the reorg emits disconnect A1, connect B1, connect B2.
    let collected: Vec<String> = std::iter::from_fn(|| events.try_recv().ok())
        .map(|event| match event {
            ChainEvent::Connected(block) => format!("connect {}", block.header().sequence()),
            ChainEvent::Disconnected(block) => format!("disconnect {}", block.header().sequence()),
        })
        .collect();
    assert_eq!(
        collected,
        vec!["connect 2", "disconnect 2", "connect 2", "connect 3"]
    );
}

#[test]
fn deep_reorg_rebuilds_state_from_the_fork_point() {
    let mut a = TestHarness::with_node_id(1);
    for _ in 0..3 {
        a.mine_next(Vec::new());
    }

    let mut b = TestHarness::with_node_id(2);
    let mut b_blocks = Vec::new();
    for _ in 0..4 {
        b_blocks.push(b.mine_next(Vec::new()));
    }

    for block in &b_blocks {
        a.chain.add_block(block).unwrap();
    }

    // Node A's state now equals node B's, computed independently from genesis.
    assert_eq!(a.chain.head_hash(), b.chain.head_hash());
    let a_note = a.chain.note_commitment().unwrap();
    let b_note = b.chain.note_commitment().unwrap();
    assert_eq!(a_note.root, b_note.root);
    assert_eq!(a_note.size, b_note.size);
}

#[test]
fn equal_work_ties_break_toward_the_lower_hash() {
    let mut a = TestHarness::with_node_id(1);
    let mut b = TestHarness::with_node_id(2);

    let block_a = a.mine_next(Vec::new());
    let block_b = b.mine_next(Vec::new());

    // Both blocks have the same work; the lower hash must win on either node.
    let winner =
        if block_a.hash() < block_b.hash() { block_a.hash() } else { block_b.hash() };

    a.chain.add_block(&block_b).unwrap();
    b.chain.add_block(&block_a).unwrap();
    assert_eq!(a.chain.head_hash(), Some(winner));
    assert_eq!(b.chain.head_hash(), Some(winner));
}

#[test]
fn orphans_connect_when_their_parent_arrives() {
    let mut source = TestHarness::with_node_id(1);
    let b1 = source.mine_next(Vec::new());
    let b2 = source.mine_next(Vec::new());
    let b3 = source.mine_next(Vec::new());

    let mut sink = TestHarness::with_node_id(2);
    assert_matches!(
        sink.chain.add_block(&b3).unwrap(),
        AddBlockResult::Orphan { missing_parent } if missing_parent == b2.hash()
    );
    assert_matches!(
        sink.chain.add_block(&b2).unwrap(),
        AddBlockResult::Orphan { missing_parent } if missing_parent == b1.hash()
    );

    // b1 links the whole orphan chain; the pool drains recursively.
    assert_matches!(sink.chain.add_block(&b1).unwrap(), AddBlockResult::Added);
    assert_eq!(sink.chain.head_hash(), Some(b3.hash()));
}

#[test]
fn double_spend_across_blocks_is_rejected() {
    let mut node = TestHarness::new();
    node.mine_next(Vec::new());

    let nullifier = Nullifier::new([9; 32]);
    let spend = node.spending_tx_with_nullifier(nullifier, 3);
    node.mine_next(vec![spend]);
    assert!(node.chain.contains_nullifier(&nullifier).unwrap());

    // A second spend of the same nullifier builds an otherwise-valid block.
    let double = node.spending_tx_with_nullifier(nullifier, 4);
    let block = node.build_next(vec![double]);
    assert_matches!(
        node.chain.add_block(&block).unwrap(),
        AddBlockResult::Invalid(ValidationError::InvalidSpend(SpendReason::NullifierSeen(n)))
            if n == nullifier
    );
}

#[test]
fn disconnecting_a_spend_restores_its_nullifier() {
    let mut a = TestHarness::with_node_id(1);
    let nullifier = Nullifier::new([9; 32]);
    let spend = a.spending_tx_with_nullifier(nullifier, 3);
    a.mine_next(vec![spend]);
    assert!(a.chain.contains_nullifier(&nullifier).unwrap());

    // A heavier foreign fork without the spend reorgs it away.
    let mut b = TestHarness::with_node_id(2);
    for _ in 0..2 {
        let block = b.mine_next(Vec::new());
        a.chain.add_block(&block).unwrap();
    }
    assert_eq!(a.chain.head_hash(), b.chain.head_hash());
    assert!(!a.chain.contains_nullifier(&nullifier).unwrap());
}

#[test]
fn minted_assets_register_and_track_supply() {
    use ironfish_protocol::asset::{AssetMetadata, AssetName, PublicAddress};
    use ironfish_protocol::testing::transaction_with_mints;
    use ironfish_protocol::transaction::{BurnDescription, MintDescription, ZkProof};

    let mut node = TestHarness::new();

    let creator = PublicAddress([5; 32]);
    let mint = MintDescription {
        creator,
        name: AssetName::from_str_lossy("testcoin"),
        metadata: AssetMetadata::EMPTY,
        nonce: 0,
        owner: creator,
        value: 1_000,
        transfer_ownership_to: None,
        proof: ZkProof::new([0; 192]),
    };
    let asset_id = mint.asset_id();

    node.mine_next(vec![transaction_with_mints(vec![mint.clone()], 2)]);
    let asset = node.chain.get_asset(&asset_id).unwrap().unwrap();
    assert_eq!(asset.supply, 1_000);
    assert_eq!(asset.creator, creator);
    assert!(asset.first_block_hash.is_some());

    // Burn part of the supply in a later block.
    let burn_tx = ironfish_protocol::transaction::Transaction::new(
        1,
        Vec::new(),
        vec![ironfish_protocol::testing::output_with_seed(777)],
        Vec::new(),
        vec![BurnDescription { asset_id, value: 300 }],
        2,
        0,
        [1u8; 32],
        [0u8; 64],
    );
    node.mine_next(vec![burn_tx]);
    let asset = node.chain.get_asset(&asset_id).unwrap().unwrap();
    assert_eq!(asset.supply, 700);
}

#[test]
fn reorg_reverts_asset_registration() {
    use ironfish_protocol::asset::{AssetMetadata, AssetName, PublicAddress};
    use ironfish_protocol::testing::transaction_with_mints;
    use ironfish_protocol::transaction::{MintDescription, ZkProof};

    let mut a = TestHarness::with_node_id(1);
    let creator = PublicAddress([5; 32]);
    let mint = MintDescription {
        creator,
        name: AssetName::from_str_lossy("forked"),
        metadata: AssetMetadata::EMPTY,
        nonce: 0,
        owner: creator,
        value: 50,
        transfer_ownership_to: None,
        proof: ZkProof::new([0; 192]),
    };
    let asset_id = mint.asset_id();
    a.mine_next(vec![transaction_with_mints(vec![mint], 2)]);
    assert!(a.chain.get_asset(&asset_id).unwrap().is_some());

    // A heavier foreign chain without the mint wins; the registration must vanish.
    let mut b = TestHarness::with_node_id(2);
    for _ in 0..2 {
        let block = b.mine_next(Vec::new());
        a.chain.add_block(&block).unwrap();
    }
    assert_eq!(a.chain.head_hash(), b.chain.head_hash());
    assert!(a.chain.get_asset(&asset_id).unwrap().is_none());
}

#[test]
fn chain_processor_replays_connects_and_disconnects() {
    let mut a = TestHarness::with_node_id(1);
    let a1 = a.mine_next(Vec::new());

    let mut processor = ChainProcessor::new(None);
    let mut seen: Vec<(bool, BlockHash)> = Vec::new();
    processor
        .update(&a.chain, |event| match event {
            ChainEvent::Connected(block) => seen.push((true, block.hash())),
            ChainEvent::Disconnected(block) => seen.push((false, block.hash())),
        })
        .unwrap();
    assert_eq!(processor.head(), a.chain.head_hash());
    assert_eq!(seen.len(), 2); // genesis + a1

    // Reorg to a foreign fork; the processor walks back through a1 and forward again.
    let mut b = TestHarness::with_node_id(2);
    let b1 = b.mine_next(Vec::new());
    let b2 = b.mine_next(Vec::new());
    a.chain.add_block(&b1).unwrap();
    a.chain.add_block(&b2).unwrap();

    seen.clear();
    processor
        .update(&a.chain, |event| match event {
            ChainEvent::Connected(block) => seen.push((true, block.hash())),
            ChainEvent::Disconnected(block) => seen.push((false, block.hash())),
        })
        .unwrap();

    assert_eq!(
        seen,
        vec![(false, a1.hash()), (true, b1.hash()), (true, b2.hash())]
    );
    assert_eq!(processor.head(), Some(b2.hash()));

    // Replaying from the same head emits nothing further.
    let emitted = processor.update(&a.chain, |_| {}).unwrap();
    assert_eq!(emitted, 0);
}

#[test]
fn processor_resumes_idempotently_from_a_past_head() {
    let mut node = TestHarness::new();
    let b1 = node.mine_next(Vec::new());
    node.mine_next(Vec::new());
    node.mine_next(Vec::new());

    // A subscriber that crashed after b1 replays only the missing tail.
    let mut processor = ChainProcessor::new(Some(b1.hash()));
    let mut connects = 0;
    processor
        .update(&node.chain, |event| {
            assert_matches!(event, ChainEvent::Connected(_));
            connects += 1;
        })
        .unwrap();
    assert_eq!(connects, 2);
    assert_eq!(processor.head(), node.chain.head_hash());
}
