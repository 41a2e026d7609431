// Copyright © chain-executor contributors
// SPDX-License-Identifier: Apache-2.0

//! The DAG Scheduler (§4.G): decode conflict fields in parallel, build
//! a static dependency graph from the decoded fields, then run ready
//! tasks in topological waves via `rayon`, each task dispatched
//! through `Executive::execute` (no external calls in DAG mode).

use crate::abi_cache::AbiCache;
use crate::conflict_key::{conflict_keys, ConflictKey};
use chain_executive::{Executive, FrameDeps};
use chain_executor_types::{CallParameters, PoolError, Transaction, TransactionPool};
use parking_lot::Mutex;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use rayon::prelude::*;
use std::collections::HashMap;

/// One slot of `dagExecuteTransactions`'s ordered result vector
/// (§4.G step 5). `Executed` covers both `finished` and `revert` —
/// the batch continues past a revert (step 4), the `CallParameters`
/// itself carries the status.
#[derive(Debug)]
pub enum DagItem {
    Executed(CallParameters),
    /// Excluded from the DAG: no ABI/method match, or a `Var` field
    /// that could not be located in the calldata (§4.G step 2c/2d).
    /// The caller is responsible for serial retry.
    SendBack(String),
}

pub struct DagScheduler {
    abi_cache: AbiCache,
}

impl DagScheduler {
    pub fn new(abi_cache_capacity: usize) -> Self {
        Self {
            abi_cache: AbiCache::new(abi_cache_capacity),
        }
    }

    /// Runs one DAG batch (§4.G steps 1-5). `base_context_id` is the
    /// first of `hashes.len()` consecutive context ids this batch may
    /// use — the facade reserves the range up front since every DAG
    /// task is its own top-level transaction context and none of them
    /// nest into one another.
    pub fn execute_batch(
        &self,
        hashes: &[chain_executor_types::Hash],
        pool: &dyn TransactionPool,
        deps: &FrameDeps,
        block_timestamp: u64,
        base_context_id: u64,
    ) -> Result<Vec<DagItem>, PoolError> {
        let transactions = pool.fill_block(hashes)?;
        let n = transactions.len();

        // Step 2: decode conflict fields in parallel. `None` marks a
        // `create` (no ABI to look up) or a transaction this ABI
        // cache/selector walk could not resolve; both fall back to
        // `SendBack`.
        let decoded: Vec<Option<Vec<ConflictKey>>> = transactions
            .par_iter()
            .map(|tx| self.decode_one(tx, deps, block_timestamp))
            .collect();

        let mut graph = DiGraph::<usize, ()>::new();
        let mut node_of: Vec<Option<NodeIndex>> = vec![None; n];
        for (i, entry) in decoded.iter().enumerate() {
            if entry.is_some() {
                node_of[i] = Some(graph.add_node(i));
            }
        }

        // Step 3: build the DAG. Edges only ever point from a lower
        // input index to a higher one, so the graph is acyclic by
        // construction (§4.G "Liveness").
        let mut last_writer: HashMap<Vec<u8>, usize> = HashMap::new();
        let mut last_slot: HashMap<u64, usize> = HashMap::new();
        for (i, entry) in decoded.iter().enumerate() {
            let Some(keys) = entry else { continue };
            let node_i = node_of[i].unwrap();
            for key in keys {
                // A bare slot-only key (All/Len, exactly 8 bytes) is
                // already covered by `last_slot`; tracking it in
                // `last_writer` too would only duplicate the edge.
                if key.bytes.len() > 8 {
                    if let Some(&prev) = last_writer.get(&key.bytes) {
                        graph.update_edge(node_of[prev].unwrap(), node_i, ());
                    }
                    last_writer.insert(key.bytes.clone(), i);
                }
                if let Some(&prev) = last_slot.get(&key.slot) {
                    graph.update_edge(node_of[prev].unwrap(), node_i, ());
                }
                last_slot.insert(key.slot, i);
            }
        }

        // Step 4: execute via topological waves.
        let results: Vec<Mutex<Option<CallParameters>>> = (0..n).map(|_| Mutex::new(None)).collect();
        run_waves(&graph, |i| {
            let params = call_parameters(&transactions[i]);
            let task_deps = FrameDeps {
                context_id: base_context_id + i as u64,
                ..deps.clone()
            };
            let out = Executive::execute(params, &task_deps, 0);
            *results[i].lock() = Some(out);
        });

        // Step 5: return in original input order.
        let mut out = Vec::with_capacity(n);
        for i in 0..n {
            match &decoded[i] {
                None => out.push(DagItem::SendBack(
                    reason_for(&transactions[i], deps).unwrap_or_else(|| "no matching ABI method".to_string()),
                )),
                Some(_) => out.push(DagItem::Executed(results[i].lock().take().expect("every DAG node ran"))),
            }
        }
        Ok(out)
    }

    fn decode_one(&self, tx: &Transaction, deps: &FrameDeps, block_timestamp: u64) -> Option<Vec<ConflictKey>> {
        if tx.create || tx.input.len() < 4 {
            return None;
        }
        let selector: [u8; 4] = tx.input[0..4].try_into().ok()?;
        let abi = self.abi_cache.lookup(&deps.overlay, &tx.to, selector)?;
        conflict_keys(&abi, &tx.to, &tx.sender, deps.block_number, block_timestamp, &tx.input[4..])
    }
}

fn reason_for(tx: &Transaction, _deps: &FrameDeps) -> Option<String> {
    if tx.create {
        return Some("create transactions are not DAG-eligible".to_string());
    }
    if tx.input.len() < 4 {
        return Some("input shorter than a 4-byte selector".to_string());
    }
    None
}

fn call_parameters(tx: &Transaction) -> CallParameters {
    let mut params = CallParameters::message(tx.sender.clone(), tx.to.clone(), tx.gas);
    params.origin = tx.origin.clone();
    params.input = tx.input.clone();
    params.static_call = tx.static_call;
    params.create = tx.create;
    params.create_kind = tx.create_kind;
    params.create_salt = tx.create_salt;
    params
}

/// Runs `task` for every node in `graph` in Kahn-order waves, each
/// wave dispatched concurrently via `rayon`. A node's task index is
/// its node weight, not its `NodeIndex` — node indices are compacted
/// over the DAG-eligible subset of the batch.
fn run_waves(graph: &DiGraph<usize, ()>, task: impl Fn(usize) + Sync) {
    let mut in_degree: HashMap<NodeIndex, usize> = graph
        .node_indices()
        .map(|n| (n, graph.edges_directed(n, Direction::Incoming).count()))
        .collect();
    let mut ready: Vec<NodeIndex> = in_degree.iter().filter(|(_, &d)| d == 0).map(|(&n, _)| n).collect();
    while !ready.is_empty() {
        let wave = std::mem::take(&mut ready);
        wave.par_iter().for_each(|&n| task(graph[n]));
        for &n in &wave {
            for edge in graph.edges_directed(n, Direction::Outgoing) {
                let target = edge.target();
                let degree = in_degree.get_mut(&target).unwrap();
                *degree -= 1;
                if *degree == 0 {
                    ready.push(target);
                }
            }
        }
    }
}
