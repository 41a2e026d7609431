// Copyright © chain-executor contributors
// SPDX-License-Identifier: Apache-2.0

//! End-to-end scenarios (§8 S1-S6) run against the real facade, a real
//! overlay chain, and `chain-mock-vm` standing in for a VM.

use chain_block_context::BlockHeader;
use chain_executor::{Executor, ExecutorConfig, ExecutorError};
use chain_executor_types::{
    CreateKind, ExecutionMessage, Hash, MessageType, PoolError, Transaction, TransactionPool,
};
use chain_mock_vm::{encode_script, MockOp, MockVm};
use chain_state_store::InMemoryBackend;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// A fixed in-memory pool a test can seed by hash, standing in for the
/// real mempool the facade is agnostic to (§6.2).
#[derive(Default)]
struct FakePool {
    transactions: Mutex<HashMap<Hash, Transaction>>,
}

impl FakePool {
    fn insert(&self, tx: Transaction) {
        self.transactions.lock().unwrap().insert(tx.hash, tx);
    }
}

impl TransactionPool for FakePool {
    fn fill_block(&self, hashes: &[Hash]) -> Result<Vec<Transaction>, PoolError> {
        let pool = self.transactions.lock().unwrap();
        hashes
            .iter()
            .map(|h| pool.get(h).cloned().ok_or_else(|| PoolError::NotFound(hex::encode(h))))
            .collect()
    }
}

fn header(number: u64) -> BlockHeader {
    BlockHeader {
        number,
        hash: [number as u8; 32],
        timestamp: 1_700_000_000 + number,
        schedule_version: 1,
        gas_limit: 30_000_000,
        wasm_enabled: true,
    }
}

fn executor(pool: Arc<FakePool>) -> Executor {
    let backend = Arc::new(InMemoryBackend::new());
    Executor::new(ExecutorConfig::default(), backend, Arc::new(MockVm), pool).unwrap()
}

fn deploy_message(from: &str, script: &[MockOp]) -> ExecutionMessage {
    let mut msg = ExecutionMessage::txhash(0, 0, [0u8; 32]);
    msg.message_type = MessageType::Message;
    msg.from = from.to_string();
    msg.to = String::new();
    msg.create = true;
    msg.create_kind = Some(CreateKind::Create);
    msg.gas_available = 1_000_000;
    msg.data = encode_script(script);
    msg
}

#[test]
fn opening_the_same_block_twice_is_rejected() {
    let executor = executor(Arc::new(FakePool::default()));
    executor.next_block_header(header(1)).unwrap();
    assert!(matches!(
        executor.next_block_header(header(1)),
        Err(ExecutorError::BlockContextExists(1))
    ));
}

#[test]
fn executing_against_an_unopened_block_is_rejected() {
    let executor = executor(Arc::new(FakePool::default()));
    let msg = deploy_message(&"aa".repeat(20), &[MockOp::ReturnInput]);
    assert!(matches!(
        executor.execute_transaction(1, msg),
        Err(ExecutorError::NoBlockContext(1))
    ));
}

/// S1-style scenario: deploy, call, commit, then read the committed
/// value back from a fresh block built on top.
#[test]
fn deploy_store_and_commit_persists_across_blocks() {
    let executor = executor(Arc::new(FakePool::default()));
    executor.next_block_header(header(1)).unwrap();

    let deploy = deploy_message(
        &"11".repeat(20),
        &[MockOp::Deploy(encode_script(&[MockOp::Load { key: "k".into() }]))],
    );
    let deployed = executor.execute_transaction(1, deploy).unwrap();
    assert_eq!(deployed.message_type, MessageType::Finished);
    let address = deployed.new_evm_contract_address.unwrap();

    let mut set_msg = ExecutionMessage::txhash(0, 0, [0u8; 32]);
    set_msg.message_type = MessageType::Message;
    set_msg.from = "11".repeat(20);
    set_msg.to = address.clone();
    set_msg.gas_available = 100_000;
    set_msg.data = encode_script(&[MockOp::Store {
        key: "k".into(),
        value: b"persisted".to_vec(),
    }]);
    let set_result = executor.execute_transaction(1, set_msg).unwrap();
    assert_eq!(set_result.message_type, MessageType::Finished);

    executor.prepare(1).unwrap();
    executor.commit(1).unwrap();
    assert!(matches!(
        executor.execute_transaction(1, deploy_message(&"11".repeat(20), &[MockOp::ReturnInput])),
        Err(ExecutorError::NoBlockContext(1))
    ));

    executor.next_block_header(header(2)).unwrap();
    let mut get_msg = ExecutionMessage::txhash(0, 0, [0u8; 32]);
    get_msg.message_type = MessageType::Message;
    get_msg.from = "11".repeat(20);
    get_msg.to = address;
    get_msg.gas_available = 100_000;
    get_msg.data = encode_script(&[MockOp::Load { key: "k".into() }]);
    let get_result = executor.execute_transaction(2, get_msg).unwrap();
    assert_eq!(get_result.message_type, MessageType::Finished);
    assert_eq!(get_result.data, b"persisted".to_vec());
}

/// S3-style scenario: a prepared-then-rolled-back block never reaches
/// the backend.
#[test]
fn rollback_after_prepare_leaves_the_backend_untouched() {
    let executor = executor(Arc::new(FakePool::default()));
    executor.next_block_header(header(1)).unwrap();
    let deploy = deploy_message(&"22".repeat(20), &[MockOp::ReturnInput]);
    let deployed = executor.execute_transaction(1, deploy).unwrap();
    let address = deployed.new_evm_contract_address.unwrap();

    executor.prepare(1).unwrap();
    executor.rollback(1).unwrap();

    executor.next_block_header(header(1)).unwrap();
    assert_eq!(executor.code_at(1, &chain_executor_types::parse_contract_address(&address)).unwrap(), Vec::<u8>::new());
}

#[test]
fn call_never_persists_state_even_on_success() {
    let executor = executor(Arc::new(FakePool::default()));
    executor.next_block_header(header(1)).unwrap();
    let deploy = deploy_message(
        &"33".repeat(20),
        &[MockOp::Deploy(encode_script(&[MockOp::Load { key: "k".into() }]))],
    );
    let deployed = executor.execute_transaction(1, deploy).unwrap();
    let address = deployed.new_evm_contract_address.unwrap();

    let mut set_msg = ExecutionMessage::txhash(0, 0, [0u8; 32]);
    set_msg.message_type = MessageType::Message;
    set_msg.from = "33".repeat(20);
    set_msg.to = address.clone();
    set_msg.gas_available = 100_000;
    set_msg.data = encode_script(&[MockOp::Store {
        key: "k".into(),
        value: b"should-not-persist".to_vec(),
    }]);
    executor.call(set_msg).unwrap();

    let mut get_msg = ExecutionMessage::txhash(0, 0, [0u8; 32]);
    get_msg.message_type = MessageType::Message;
    get_msg.from = "33".repeat(20);
    get_msg.to = address;
    get_msg.gas_available = 100_000;
    get_msg.data = encode_script(&[MockOp::Load { key: "k".into() }]);
    let get_result = executor.execute_transaction(1, get_msg).unwrap();
    assert_eq!(get_result.data, Vec::<u8>::new());
}

#[test]
fn txhash_message_is_materialized_through_the_pool() {
    let pool = Arc::new(FakePool::default());
    let executor = executor(pool.clone());
    executor.next_block_header(header(1)).unwrap();

    let hash = [7u8; 32];
    pool.insert(Transaction {
        hash,
        sender: "44".repeat(20),
        to: String::new(),
        origin: "44".repeat(20),
        input: encode_script(&[MockOp::Deploy(encode_script(&[MockOp::ReturnInput]))]),
        gas: 500_000,
        static_call: false,
        create: true,
        create_kind: Some(CreateKind::Create),
        create_salt: None,
    });

    let result = executor
        .execute_transaction(1, ExecutionMessage::txhash(0, 0, hash))
        .unwrap();
    assert_eq!(result.message_type, MessageType::Finished);
}

/// §4.G step 2c: `create` transactions have no ABI to decode, so a DAG
/// batch made entirely of deployments sends every task back for serial
/// retry rather than running any of them.
#[test]
fn dag_batch_sends_back_create_transactions() {
    let pool = Arc::new(FakePool::default());
    let executor = executor(pool.clone());
    executor.next_block_header(header(1)).unwrap();

    let mut hashes = Vec::new();
    for i in 0..3u8 {
        let hash = [i + 1; 32];
        pool.insert(Transaction {
            hash,
            sender: format!("{:02x}", i).repeat(20),
            to: String::new(),
            origin: format!("{:02x}", i).repeat(20),
            input: encode_script(&[MockOp::Deploy(encode_script(&[MockOp::ReturnInput]))]),
            gas: 500_000,
            static_call: false,
            create: true,
            create_kind: Some(CreateKind::Create),
            create_salt: None,
        });
        hashes.push(hash);
    }

    let results = executor.dag_execute_transactions(1, &hashes).unwrap();
    assert_eq!(results.len(), 3);
    for result in results {
        assert_eq!(result.message_type, MessageType::SendBack);
    }
}

#[test]
fn revert_from_executive_never_surfaces_message_or_wait_key() {
    let executor = executor(Arc::new(FakePool::default()));
    executor.next_block_header(header(1)).unwrap();
    let deploy = deploy_message(&"55".repeat(20), &[MockOp::Revert(b"nope".to_vec())]);
    let result = executor.execute_transaction(1, deploy).unwrap();
    assert_eq!(result.message_type, MessageType::Revert);
    assert_eq!(result.data, b"nope".to_vec());
}
