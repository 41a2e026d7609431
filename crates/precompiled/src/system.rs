// Copyright © chain-executor contributors
// SPDX-License-Identifier: Apache-2.0

//! The system precompiled contracts (§4.F): table factory, key/value
//! table access, the contract naming service, consensus and system
//! configuration, a crypto utility dispatcher, per-contract parallel
//! config, and the DAG-safe transfer helper addressing Open Question 1
//! in DESIGN.md (separate balance rows per holder, never one shared
//! "fromUser" row).

use crate::PrecompiledContext;
use crate::PrecompiledResult;
use chain_executor_types::{Entry, EntryStatus, TransactionStatus};
use sha2::Digest as _;
use sha3::{Digest as _, Keccak256};

pub const CONSENSUS_TABLE: &str = "/sys/consensus";
pub const CNS_TABLE: &str = "/sys/cns";
pub const SYS_CONFIG_TABLE: &str = "/sys/config";
const SYS_VALUE_FIELDS: &str = "value,enableBlockNumber";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum System {
    TableFactory,
    KvTable,
    Cns,
    ConsensusConfig,
    Crypto,
    ParallelConfig,
    DagTransfer,
    SysConfig,
}

impl System {
    pub fn call(self, ctx: &mut PrecompiledContext, input: &[u8], origin: &str, sender: &str) -> PrecompiledResult {
        match self {
            System::TableFactory => table_factory(ctx, input),
            System::KvTable => kv_table(ctx, input),
            System::Cns => cns(ctx, input),
            System::ConsensusConfig => sys_kv(ctx, input, CONSENSUS_TABLE),
            System::Crypto => crypto(input),
            System::ParallelConfig => parallel_config(ctx, input, sender),
            System::DagTransfer => dag_transfer(ctx, input, origin),
            System::SysConfig => sys_kv(ctx, input, SYS_CONFIG_TABLE),
        }
    }

    /// Most system precompiled touch a single, input-determined key
    /// and so can run in parallel once that key is registered as a
    /// conflict tag (§4.F, §4.G); `TableFactory`'s table-creation side
    /// effect is a block-wide invariant (no duplicate names) so it is
    /// excluded.
    pub fn is_parallel(self) -> bool {
        !matches!(self, System::TableFactory)
    }

    pub fn parallel_tags(self, input: &[u8]) -> Vec<String> {
        match self {
            System::TableFactory => Vec::new(),
            _ => vec![hex::encode(Keccak256::digest(input))],
        }
    }
}

fn split_fields(input: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(input)
        .split('\u{1}')
        .map(str::to_string)
        .collect()
}

fn table_factory(ctx: &mut PrecompiledContext, input: &[u8]) -> PrecompiledResult {
    const GAS: u64 = 5_000;
    let parts = split_fields(input);
    let (name, value_fields) = match (parts.first(), parts.get(1)) {
        (Some(n), Some(v)) => (n, v),
        _ => return PrecompiledResult::error(GAS, TransactionStatus::PrecompiledError),
    };
    match ctx.overlay.create_table(name, value_fields, ctx.recoder) {
        Ok(_) => PrecompiledResult::ok(GAS, Vec::new()),
        Err(_) => PrecompiledResult::error(GAS, TransactionStatus::PrecompiledError),
    }
}

fn kv_table(ctx: &mut PrecompiledContext, input: &[u8]) -> PrecompiledResult {
    const GAS: u64 = 1_000;
    let parts = split_fields(input);
    match parts.first().map(String::as_str) {
        Some("get") => {
            let (table, key) = match (parts.get(1), parts.get(2)) {
                (Some(t), Some(k)) => (t, k),
                _ => return PrecompiledResult::error(GAS, TransactionStatus::PrecompiledError),
            };
            let output = ctx
                .overlay
                .get_row(table, key)
                .and_then(|e| e.fields.first().cloned())
                .unwrap_or_default()
                .into_bytes();
            PrecompiledResult::ok(GAS, output)
        },
        Some("set") => {
            let (table, key, value) = match (parts.get(1), parts.get(2), parts.get(3)) {
                (Some(t), Some(k), Some(v)) => (t, k, v),
                _ => return PrecompiledResult::error(GAS, TransactionStatus::PrecompiledError),
            };
            let version = ctx.overlay.next_version(table, key);
            ctx.overlay.set_row(
                table,
                key,
                Entry {
                    fields: vec![value.clone()],
                    version,
                    status: EntryStatus::Normal,
                },
                ctx.recoder,
            );
            PrecompiledResult::ok(GAS, Vec::new())
        },
        _ => PrecompiledResult::error(GAS, TransactionStatus::PrecompiledError),
    }
}

fn cns(ctx: &mut PrecompiledContext, input: &[u8]) -> PrecompiledResult {
    let mut input_with_table = Vec::with_capacity(input.len() + CNS_TABLE.len() + 1);
    input_with_table.extend_from_slice(input);
    sys_kv(ctx, &input_with_table, CNS_TABLE)
}

fn sys_kv(ctx: &mut PrecompiledContext, input: &[u8], table: &str) -> PrecompiledResult {
    const GAS: u64 = 2_000;
    let parts = split_fields(input);
    match parts.first().map(String::as_str) {
        Some("get") => {
            let key = match parts.get(1) {
                Some(k) => k,
                None => return PrecompiledResult::error(GAS, TransactionStatus::PrecompiledError),
            };
            let output = ctx
                .overlay
                .get_row(table, key)
                .and_then(|e| e.fields.first().cloned())
                .unwrap_or_default()
                .into_bytes();
            PrecompiledResult::ok(GAS, output)
        },
        Some("set") => {
            let (key, value) = match (parts.get(1), parts.get(2)) {
                (Some(k), Some(v)) => (k, v),
                _ => return PrecompiledResult::error(GAS, TransactionStatus::PrecompiledError),
            };
            if ctx.overlay.open_table(table).is_none() {
                let _ = ctx.overlay.create_table(table, SYS_VALUE_FIELDS, ctx.recoder);
            }
            let version = ctx.overlay.next_version(table, key);
            ctx.overlay.set_row(
                table,
                key,
                Entry {
                    fields: vec![value.clone(), ctx.block_number.to_string()],
                    version,
                    status: EntryStatus::Normal,
                },
                ctx.recoder,
            );
            PrecompiledResult::ok(GAS, Vec::new())
        },
        _ => PrecompiledResult::error(GAS, TransactionStatus::PrecompiledError),
    }
}

/// A hash-selection utility precompiled so contracts can reach the
/// engine's native hash implementations without the gas cost of
/// re-deriving them in bytecode; selector is the first input byte.
fn crypto(input: &[u8]) -> PrecompiledResult {
    const GAS: u64 = 500;
    match input.first() {
        Some(0) => PrecompiledResult::ok(GAS, Keccak256::digest(&input[1..]).to_vec()),
        Some(1) => PrecompiledResult::ok(GAS, sha2::Sha256::digest(&input[1..]).to_vec()),
        _ => PrecompiledResult::error(GAS, TransactionStatus::PrecompiledError),
    }
}

fn parallel_config(ctx: &mut PrecompiledContext, input: &[u8], sender: &str) -> PrecompiledResult {
    const GAS: u64 = 2_000;
    let table = format!("/sys/parallelConfig/{sender}");
    let parts = split_fields(input);
    let (function_name, critical_size) = match (parts.first(), parts.get(1)) {
        (Some(f), Some(c)) => (f, c),
        _ => return PrecompiledResult::error(GAS, TransactionStatus::PrecompiledError),
    };
    if ctx.overlay.open_table(&table).is_none() {
        let _ = ctx.overlay.create_table(&table, "functionName,criticalSize", ctx.recoder);
    }
    let version = ctx.overlay.next_version(&table, function_name);
    ctx.overlay.set_row(
        &table,
        function_name,
        Entry {
            fields: vec![function_name.clone(), critical_size.clone()],
            version,
            status: EntryStatus::Normal,
        },
        ctx.recoder,
    );
    PrecompiledResult::ok(GAS, Vec::new())
}

/// Transfers between two explicit rows, `/sys/balances/<from>` and
/// `/sys/balances/<to>` — see DESIGN.md Open Question 1: the original
/// `userTransferCall` wrote both sides onto the same `fromUser` row,
/// which this implementation deliberately does not replicate.
fn dag_transfer(ctx: &mut PrecompiledContext, input: &[u8], origin: &str) -> PrecompiledResult {
    const GAS: u64 = 9_000;
    const TABLE: &str = "/sys/balances";
    let parts = split_fields(input);
    let (to, amount_str) = match (parts.first(), parts.get(1)) {
        (Some(t), Some(a)) => (t, a),
        _ => return PrecompiledResult::error(GAS, TransactionStatus::PrecompiledError),
    };
    let amount: u128 = match amount_str.parse() {
        Ok(a) => a,
        Err(_) => return PrecompiledResult::error(GAS, TransactionStatus::PrecompiledError),
    };
    if ctx.overlay.open_table(TABLE).is_none() {
        let _ = ctx.overlay.create_table(TABLE, "value", ctx.recoder);
    }
    let from_balance = balance_of(ctx, TABLE, origin);
    if from_balance < amount {
        return PrecompiledResult::error(GAS, TransactionStatus::NotEnoughCash);
    }
    let to_balance = balance_of(ctx, TABLE, to);
    write_balance(ctx, TABLE, origin, from_balance - amount);
    write_balance(ctx, TABLE, to, to_balance + amount);
    PrecompiledResult::ok(GAS, Vec::new())
}

fn balance_of(ctx: &PrecompiledContext, table: &str, holder: &str) -> u128 {
    ctx.overlay
        .get_row(table, holder)
        .and_then(|e| e.fields.first().and_then(|v| v.parse().ok()))
        .unwrap_or(0)
}

fn write_balance(ctx: &mut PrecompiledContext, table: &str, holder: &str, balance: u128) {
    let version = ctx.overlay.next_version(table, holder);
    ctx.overlay.set_row(
        table,
        holder,
        Entry {
            fields: vec![balance.to_string()],
            version,
            status: EntryStatus::Normal,
        },
        ctx.recoder,
    );
}
