//! Signet block authorization: signing, verification, height gating and
//! signer key recovery

use alpha_core::chainparams::{create_chain_params, ChainArgs, ChainOptions, ChainParams, ChainType, ConsensusParams};
use alpha_core::consensus::{
    check_block_authorization, check_signet_block_solution, check_signet_block_solution_at_height,
    extract_pubkeys_from_challenge, sign_block, Block, BlockHeader,
};
use alpha_core::crypto::{CompressedPubKey, Hash, PrivateKey};
use alpha_core::script::opcodes::{OP_CHECKSIG, OP_TRUE};
use alpha_core::script::{MultisigEvaluator, Script};
use alpha_core::validation::Transaction;

fn candidate(height: u32) -> Block {
    let header = BlockHeader::new(0x2000_0000, Hash::zero(), Hash::zero(), 1_700_000_000, 0x207fffff, 0);
    let mut block = Block::new(header, vec![Transaction::coinbase(height, 0, Script::new())]);
    block.header.merkle_root = block.compute_merkle_root();
    block
}

fn keys(n: usize) -> Vec<PrivateKey> {
    (0..n).map(|_| PrivateKey::generate()).collect()
}

fn pubkeys(keys: &[PrivateKey]) -> Vec<CompressedPubKey> {
    keys.iter().map(PrivateKey::public_key).collect()
}

/// Alpha regtest forked at `height` to a 1-of-N challenge over `signers`
fn forked_params(height: u32, signers: &[PrivateKey]) -> ConsensusParams {
    let args = ChainArgs {
        signet_fork_height: Some(height.to_string()),
        signet_fork_pubkeys: Some(
            pubkeys(signers).iter().map(CompressedPubKey::to_hex).collect::<Vec<_>>().join(","),
        ),
        ..Default::default()
    };
    create_chain_params(&args, ChainType::AlphaRegtest).unwrap().consensus
}

#[test]
fn test_sign_and_verify_single_key() {
    let key = PrivateKey::generate();
    let mut params = ChainParams::create(ChainType::Signet, &ChainOptions::default()).consensus;
    params.signet_challenge = Script::builder()
        .push_slice(key.public_key().as_bytes())
        .push_opcode(OP_CHECKSIG)
        .into_script();

    let mut block = candidate(1);
    assert!(!check_signet_block_solution(&block, &params, &MultisigEvaluator));

    sign_block(&mut block, &params.signet_challenge, &[key]).unwrap();
    assert_eq!(block.header.merkle_root, block.compute_merkle_root());
    assert!(check_signet_block_solution(&block, &params, &MultisigEvaluator));
}

#[test]
fn test_two_of_three_multisig() {
    let signers = keys(3);
    let mut params = ChainParams::create(ChainType::Signet, &ChainOptions::default()).consensus;
    params.signet_challenge = Script::new_multisig(2, &pubkeys(&signers));

    let mut block = candidate(1);
    let result = sign_block(&mut block, &params.signet_challenge, &signers[..1]);
    assert!(result.is_err());

    sign_block(&mut block, &params.signet_challenge, &[signers[2].clone(), signers[0].clone()]).unwrap();
    assert!(check_signet_block_solution(&block, &params, &MultisigEvaluator));
}

#[test]
fn test_solution_survives_nonce_search_but_not_header_changes() {
    let signers = keys(1);
    let params = forked_params(5, &signers);

    let mut block = candidate(7);
    sign_block(&mut block, &params.signet_challenge_alpha, &signers).unwrap();
    assert!(check_signet_block_solution_at_height(&block, &params, 7, &MultisigEvaluator));

    let mut mined = block.clone();
    mined.header.nonce = 123_456;
    mined.header.bits = 0x1d00ffff;
    assert!(check_signet_block_solution_at_height(&mined, &params, 7, &MultisigEvaluator));

    let mut retimed = block.clone();
    retimed.header.time += 1;
    assert!(!check_signet_block_solution_at_height(&retimed, &params, 7, &MultisigEvaluator));

    let mut reparented = block;
    reparented.header.prev_hash = alpha_core::crypto::hash_bytes(b"elsewhere");
    assert!(!check_signet_block_solution_at_height(&reparented, &params, 7, &MultisigEvaluator));
}

#[test]
fn test_resigning_replaces_previous_solution() {
    let signers = keys(2);
    let params = forked_params(1, &signers);

    let mut block = candidate(3);
    sign_block(&mut block, &params.signet_challenge_alpha, &signers[..1]).unwrap();
    block.header.time += 10;
    sign_block(&mut block, &params.signet_challenge_alpha, &signers[1..]).unwrap();
    assert!(check_signet_block_solution_at_height(&block, &params, 3, &MultisigEvaluator));
}

#[test]
fn test_height_gating() {
    let signers = keys(2);
    let params = forked_params(10, &signers);
    let unsigned = candidate(9);

    // empty primary challenge: anything goes before the fork
    assert!(check_signet_block_solution_at_height(&unsigned, &params, 9, &MultisigEvaluator));
    assert!(check_block_authorization(&unsigned, &params, 9, &MultisigEvaluator));

    // from the fork height on a signature is required
    assert!(!check_signet_block_solution_at_height(&unsigned, &params, 10, &MultisigEvaluator));
    assert!(!check_block_authorization(&unsigned, &params, 10, &MultisigEvaluator));

    let mut signed = candidate(10);
    sign_block(&mut signed, &params.signet_challenge_alpha, &signers[1..]).unwrap();
    assert!(check_block_authorization(&signed, &params, 10, &MultisigEvaluator));
}

#[test]
fn test_empty_primary_challenge_asymmetry() {
    let mut params = ChainParams::create(ChainType::AlphaRegtest, &ChainOptions::default()).consensus;
    params.signet_activation_height = 10;
    params.signet_challenge_alpha = Script::new();

    // empty primary passes, empty alternate fails
    assert!(check_signet_block_solution_at_height(&candidate(9), &params, 9, &MultisigEvaluator));
    assert!(!check_signet_block_solution_at_height(&candidate(10), &params, 10, &MultisigEvaluator));
}

#[test]
fn test_signet_chain_uses_primary_challenge_at_every_height() {
    let signers = keys(1);
    let mut params = ChainParams::create(ChainType::Signet, &ChainOptions::default()).consensus;
    params.signet_challenge = Script::new_multisig(1, &pubkeys(&signers));

    let mut block = candidate(500);
    sign_block(&mut block, &params.signet_challenge, &signers).unwrap();
    for height in [1, 500, 1_000_000] {
        assert!(check_block_authorization(&block, &params, height, &MultisigEvaluator));
    }
}

#[test]
fn test_genesis_is_always_authorized() {
    let params = ChainParams::create(ChainType::Signet, &ChainOptions::default());
    assert!(check_signet_block_solution(&params.genesis, &params.consensus, &MultisigEvaluator));
}

#[test]
fn test_chains_without_signet_need_no_signature() {
    let params = ChainParams::create(ChainType::Main, &ChainOptions::default()).consensus;
    assert!(check_block_authorization(&candidate(1), &params, 1, &MultisigEvaluator));
}

#[test]
fn test_pubkey_extraction_cases() {
    let signers = pubkeys(&keys(3));

    let one_of_one = Script::new_multisig(1, &signers[..1]);
    assert_eq!(extract_pubkeys_from_challenge(&one_of_one), signers[..1].to_vec());

    let one_of_three = Script::new_multisig(1, &signers);
    assert_eq!(extract_pubkeys_from_challenge(&one_of_three), signers);

    assert!(extract_pubkeys_from_challenge(&Script::new()).is_empty());

    let op_true = Script::builder().push_opcode(OP_TRUE).into_script();
    assert!(extract_pubkeys_from_challenge(&op_true).is_empty());

    let bare = Script::builder().push_slice(signers[0].as_bytes()).into_script();
    assert_eq!(extract_pubkeys_from_challenge(&bare), signers[..1].to_vec());
}

#[test]
fn test_pubkey_extraction_skips_non_keys_and_stops_at_garbage() {
    let signers = pubkeys(&keys(2));

    let mixed = Script::builder()
        .push_slice(&[7u8; 20])
        .push_slice(signers[0].as_bytes())
        .push_slice(&[2u8; 33])
        .into_script();
    let extracted = extract_pubkeys_from_challenge(&mixed);
    assert_eq!(extracted.first(), Some(&signers[0]));

    // a push running past the end halts the scan
    let mut bytes = Script::builder().push_slice(signers[1].as_bytes()).into_script().into_bytes();
    bytes.extend_from_slice(&[0x21, 0x02]);
    assert_eq!(extract_pubkeys_from_challenge(&Script::from_bytes(bytes)), signers[1..].to_vec());
}

#[test]
fn test_fork_config_builds_one_of_n_challenge() {
    let signers = keys(3);
    let params = forked_params(42, &signers);
    assert_eq!(params.signet_activation_height, 42);
    assert_eq!(extract_pubkeys_from_challenge(&params.signet_challenge_alpha), pubkeys(&signers));
}
