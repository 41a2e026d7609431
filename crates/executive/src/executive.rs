// Copyright © chain-executor contributors
// SPDX-License-Identifier: Apache-2.0

//! The Transaction Executive (§4.D): one executive per call frame.
//! `execute` is the uniform synchronous entry point — used directly by
//! the DAG path (no nested calls expected there) and, for the
//! sequential path, recursively by this module itself whenever a
//! frame's VM issues a nested `call`/`create`. A true concurrent
//! multi-fiber scheduler (distinct executives suspended independently,
//! resumed out of order by an external driver) is the shape the
//! public `start`/`push` contract is built for; this crate drives that
//! contract with a single recursive call stack rather than a thread
//! pool of outstanding frames, which keeps the block-level concurrency
//! story to "one OS thread per live frame" instead of a second
//! scheduler layered on top of the fiber primitive.

use chain_executor_types::address::{evm_create2_address, evm_create_address, validate_wasm_path};
use chain_executor_types::{
    parse_contract_address, CallParameters, ContractAddress, CreateKind, DeadLock, Entry, EntryStatus, Hash,
    KeyLockRegistry, ScheduleVersion, TransactionStatus,
};
use chain_fiber::{spawn, FiberHandle, DEFAULT_STACK_SIZE};
use chain_precompiled::{Precompiled, PrecompiledContext, PrecompiledRegistry};
use chain_state_store::{Overlay, Recoder};
use chain_vm_host::{FrameInfo, HostContext, HostRequest, HostResponse, VALUE_FIELD};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use crate::gas::Schedule;
use crate::vm::{is_wasm_bytecode, Vm};

/// Sender nonces, one row per address (§4.D step 1, EVM `create`).
/// Not part of the original data model (§3 only describes contract
/// tables) — added because deriving a `create` address needs a
/// monotonic per-sender counter from somewhere durable.
const NONCE_TABLE: &str = "/sys/nonces";

/// One step of driving an executive's fiber (§4.D `start`/`push`):
/// either a host request awaiting a scheduler answer, or the frame's
/// terminal result.
pub enum ExecutiveStep {
    Request(HostRequest),
    Done(CallParameters),
}

/// Everything an executive needs that outlives any single frame,
/// shared (via `Arc`) across every executive live in a block (§4.E).
#[derive(Clone)]
pub struct FrameDeps {
    pub overlay: Arc<Overlay>,
    pub key_locks: Arc<KeyLockRegistry>,
    pub precompiled: Arc<PrecompiledRegistry>,
    pub vm: Arc<dyn Vm>,
    pub schedule: Arc<Schedule>,
    pub schedule_version: ScheduleVersion,
    pub block_number: u64,
    pub block_hashes: Arc<dyn Fn(u64) -> Option<Hash> + Send + Sync>,
    /// Stable across every frame of one externally-initiated
    /// transaction; distinguishes one transaction's frames from
    /// another's in the `(contextID, seq)` holder id (§3 "KeyLocks").
    pub context_id: u64,
    /// Shared by every frame spawned under `context_id`, so nested
    /// calls get their own distinct `seq` without a central registry.
    pub seq_counter: Arc<AtomicU32>,
}

/// One live call frame (§4.D): owns the frame's fiber handle, its
/// undo log, and the set of key-locks it has personally acquired
/// (merged into its result's `key_locks` on completion, per "External
/// calls": "a finished/revert CallParameters whose key-locks set is
/// merged into the caller's").
pub struct Executive {
    context_id: u64,
    seq: u32,
    fiber: Option<FiberHandle<HostRequest, HostResponse>>,
    result: Arc<Mutex<Option<CallParameters>>>,
    recoder: Recoder,
    acquired_locks: BTreeSet<(String, String)>,
}

impl Executive {
    pub fn context_id(&self) -> u64 {
        self.context_id
    }

    pub fn seq(&self) -> u32 {
        self.seq
    }

    fn holder_id(&self) -> u64 {
        holder_id(self.context_id, self.seq)
    }

    /// `start(params)`: spawns the frame's fiber and drives it to its
    /// first suspension point or immediate completion.
    fn start(context_id: u64, seq: u32, params: CallParameters, frame: FrameInfo, recoder: Recoder, deps: FrameDeps) -> (Self, ExecutiveStep) {
        let result = Arc::new(Mutex::new(None));
        let result_for_body = result.clone();
        let fiber = spawn::<HostRequest, HostResponse, _>(
            format!("exec-{context_id}-{seq}"),
            DEFAULT_STACK_SIZE,
            move |ctx| {
                let mut host = HostContext::new(&ctx, frame);
                let finished = run_frame_body(&mut host, &params, &deps);
                *result_for_body.lock().unwrap() = Some(finished);
            },
        );
        let mut exec = Self {
            context_id,
            seq,
            fiber: Some(fiber),
            result,
            recoder,
            acquired_locks: BTreeSet::new(),
        };
        let step = exec.pump();
        (exec, step)
    }

    /// `push(response)`: resumes the frame's fiber with a response to
    /// its last request and drives it to the next step.
    pub fn push(&mut self, response: HostResponse) -> ExecutiveStep {
        if let Some(fiber) = &self.fiber {
            fiber.resume(response);
        }
        self.pump()
    }

    fn pump(&mut self) -> ExecutiveStep {
        match self.fiber.as_ref().and_then(|f| f.next_request()) {
            Some(req) => ExecutiveStep::Request(req),
            None => {
                self.fiber = None;
                let result = self
                    .result
                    .lock()
                    .unwrap()
                    .take()
                    .expect("a fiber must store its result before its push channel closes");
                ExecutiveStep::Done(result)
            },
        }
    }

    /// Answers one host request against the block's shared overlay and
    /// key-lock registry, recursing into a fresh `execute` for nested
    /// `Call`/`Create` requests (§4.D "External calls").
    fn resolve(&mut self, req: HostRequest, deps: &FrameDeps, depth: u32) -> HostResponse {
        match req {
            HostRequest::GetRow { table, key } => HostResponse::Row(deps.overlay.get_row(&table, &key)),
            HostRequest::GetRows { table, keys } => HostResponse::Rows(deps.overlay.get_rows(&table, &keys)),
            HostRequest::GetPrimaryKeys { table } => {
                HostResponse::Keys(deps.overlay.get_primary_keys(&table, None))
            },
            HostRequest::SetRow { table, key, entry } => {
                let mut entry = entry;
                entry.version = deps.overlay.next_version(&table, &key);
                deps.overlay.set_row(&table, &key, entry, &mut self.recoder);
                HostResponse::Ack
            },
            HostRequest::OpenTable { name } => HostResponse::TableOpened(deps.overlay.open_table(&name).is_some()),
            HostRequest::CreateTable { name, value_fields } => {
                let ok = deps.overlay.create_table(&name, &value_fields, &mut self.recoder).is_ok();
                HostResponse::TableCreated(ok)
            },
            HostRequest::WaitKey { table, key } => match deps.key_locks.acquire(&table, &key, self.holder_id()) {
                Ok(()) => {
                    self.acquired_locks.insert((table, key));
                    HostResponse::Granted
                },
                Err(DeadLock) => HostResponse::Revert,
            },
            HostRequest::BlockHash(number) => HostResponse::Hash((deps.block_hashes)(number)),
            HostRequest::Call(params) => HostResponse::Call(Executive::execute(params, deps, depth + 1)),
            HostRequest::Create(params) => HostResponse::Call(Executive::execute(params, deps, depth + 1)),
        }
    }

    /// `execute(params) -> result` (§4.D): the six-step dispatch
    /// algorithm. Used both directly (DAG path, top-level sequential
    /// calls) and recursively (nested `call`/`create`).
    pub fn execute(params: CallParameters, deps: &FrameDeps, depth: u32) -> CallParameters {
        let schedule = &deps.schedule;
        let gas_limit = schedule.tx_gas_limit.min(params.gas);
        if schedule.intrinsic_gas(&params.input) > gas_limit {
            let gas = params.gas;
            return params.reverted(TransactionStatus::OutOfGasLimit, Vec::new(), gas);
        }

        let seq = deps.seq_counter.fetch_add(1, Ordering::SeqCst);

        if params.create {
            let (address, recoder) = match prepare_create(&params, deps) {
                Ok(pair) => pair,
                Err(reverted) => return reverted,
            };
            return run_frame(seq, address, params, recoder, deps, depth);
        }

        let target = parse_contract_address(&params.receiver);
        if let Some(precompiled) = deps.precompiled.get(&target) {
            return call_precompiled(precompiled, params, deps);
        }

        run_frame(seq, target, params, Recoder::new(), deps, depth)
    }
}

fn holder_id(context_id: u64, seq: u32) -> u64 {
    (context_id << 32) | seq as u64
}

/// `receiver` is either lowercase EVM hex (no `0x`) or an absolute
/// Wasm path (§3, §6.4).
fn decode_evm_sender(sender: &str) -> [u8; 20] {
    let mut bytes = [0u8; 20];
    if let Ok(decoded) = hex::decode(sender) {
        let n = decoded.len().min(20);
        bytes[..n].copy_from_slice(&decoded[..n]);
    }
    bytes
}

/// Invokes a precompiled target synchronously (§4.D step 2, §4.F): no
/// fiber is spawned, so there is no suspension point — the target
/// reads/writes the overlay directly through its own short-lived
/// recoder, which is rolled back on a non-`None` status.
fn call_precompiled(precompiled: Precompiled, params: CallParameters, deps: &FrameDeps) -> CallParameters {
    let mut recoder = Recoder::new();
    let mut ctx = PrecompiledContext {
        overlay: &deps.overlay,
        recoder: &mut recoder,
        block_number: deps.block_number,
    };
    let result = precompiled.call(&mut ctx, &params.input, &params.origin, &params.sender);
    let gas_remaining = params.gas.saturating_sub(result.gas_used);
    if result.status.is_success() {
        params.finished(result.output, gas_remaining)
    } else {
        deps.overlay.rollback(&recoder);
        params.reverted(result.status, result.output, gas_remaining)
    }
}

/// §4.D step 1: derive the new contract's address, create its table,
/// and (Wasm only) its ancestor directory rows and a gas-metered
/// copy of the bytecode. Returns the recoder pre-seeded with these
/// writes so a later revert of the frame undoes them too.
fn prepare_create(params: &CallParameters, deps: &FrameDeps) -> Result<(ContractAddress, Recoder), CallParameters> {
    let mut recoder = Recoder::new();
    let address = match params.create_kind {
        Some(CreateKind::Create) => {
            let sender = decode_evm_sender(&params.sender);
            let nonce = next_nonce(&deps.overlay, &mut recoder, &params.sender);
            ContractAddress::Evm(evm_create_address(&sender, nonce))
        },
        Some(CreateKind::Create2) => {
            let sender = decode_evm_sender(&params.sender);
            let salt = params.create_salt.unwrap_or([0u8; 32]);
            ContractAddress::Evm(evm_create2_address(&sender, &salt, &params.input))
        },
        // No Wasm variant exists in CreateKind (§3): a Wasm deployment
        // is always a top-level `executeTransaction` with `create=true`
        // and no `create_kind`, carrying its absolute path in `receiver`.
        None => {
            if let Err(reason) = validate_wasm_path(&params.receiver) {
                tracing::warn!(%reason, "rejected wasm contract path");
                return Err(params.clone().reverted(TransactionStatus::CallAddressError, Vec::new(), params.gas));
            }
            create_wasm_directories(&deps.overlay, &mut recoder, &params.receiver);
            ContractAddress::Wasm(params.receiver.clone())
        },
    };
    match deps.overlay.create_table(&address.table_name(), VALUE_FIELD, &mut recoder) {
        Ok(_) => Ok((address, recoder)),
        Err(_) => Err(params
            .clone()
            .reverted(TransactionStatus::ContractAddressAlreadyUsed, Vec::new(), params.gas)),
    }
}

fn next_nonce(overlay: &Overlay, recoder: &mut Recoder, sender: &str) -> u64 {
    let nonce = overlay
        .get_row(NONCE_TABLE, sender)
        .and_then(|e| e.fields.first().and_then(|s| s.parse::<u64>().ok()))
        .unwrap_or(0);
    if overlay.open_table(NONCE_TABLE).is_none() {
        let _ = overlay.create_table(NONCE_TABLE, VALUE_FIELD, recoder);
    }
    let version = overlay.next_version(NONCE_TABLE, sender);
    let entry = Entry {
        fields: vec![(nonce + 1).to_string()],
        version,
        status: EntryStatus::Normal,
    };
    overlay.set_row(NONCE_TABLE, sender, entry, recoder);
    nonce
}

/// Creates a placeholder row for every ancestor directory of a Wasm
/// contract path (§4.D step 1, "recursively create directory rows
/// along the path"), idempotently.
fn create_wasm_directories(overlay: &Overlay, recoder: &mut Recoder, path: &str) {
    const DIR_TABLE: &str = "/sys/dirs";
    if overlay.open_table(DIR_TABLE).is_none() {
        let _ = overlay.create_table(DIR_TABLE, VALUE_FIELD, recoder);
    }
    let mut prefix = String::new();
    for component in path.trim_start_matches('/').split('/') {
        if component.is_empty() {
            continue;
        }
        prefix.push('/');
        prefix.push_str(component);
        if overlay.get_row(DIR_TABLE, &prefix).is_some() {
            continue;
        }
        let version = overlay.next_version(DIR_TABLE, &prefix);
        let entry = Entry {
            fields: vec!["1".to_string()],
            version,
            status: EntryStatus::Normal,
        };
        overlay.set_row(DIR_TABLE, &prefix, entry, recoder);
    }
}

/// A gas-metering bytecode pass (§4.D step 1, "inject a gas-meter pass
/// through the bytecode before storing it") is a dedicated Wasm
/// bytecode transform (walk every basic block, insert a charge call)
/// that belongs in the VM layer, not the executive. This is the
/// injection point a real deployment wires a metering pass into;
/// left as a pass-through here since `chain-mock-vm` doesn't meter gas
/// by instruction anyway.
fn inject_gas_meter(bytecode: Vec<u8>) -> Vec<u8> {
    bytecode
}

fn run_frame(
    seq: u32,
    address: ContractAddress,
    params: CallParameters,
    recoder: Recoder,
    deps: &FrameDeps,
    depth: u32,
) -> CallParameters {
    let mut params = params;
    if params.create && is_wasm_bytecode(&params.input) {
        params.input = inject_gas_meter(params.input.clone());
    }

    let frame = FrameInfo {
        my_address: address,
        caller: params.sender.clone(),
        origin: params.origin.clone(),
        input_data: params.input.clone(),
        is_create: params.create,
        is_static_call: params.static_call,
        depth,
        gas_left: params.gas,
        schedule: deps.schedule_version,
    };

    let (mut exec, mut step) = Executive::start(deps.context_id, seq, params, frame, recoder, deps.clone());
    let mut result = loop {
        match step {
            ExecutiveStep::Done(result) => break result,
            ExecutiveStep::Request(req) => {
                let resp = exec.resolve(req, deps, depth);
                step = exec.push(resp);
            },
        }
    };
    if !result.status.is_success() {
        deps.overlay.rollback(&exec.recoder);
    }
    result.key_locks.extend(exec.acquired_locks.iter().cloned());
    deps.key_locks.release_all(holder_id(exec.context_id, exec.seq));
    result
}

/// Runs inside the frame's fiber: selects the bytecode and VM kind,
/// drives the VM, and applies the §4.D steps 4-6 post-processing
/// (status mapping, create-success code persistence, logs, suicides).
fn run_frame_body(host: &mut HostContext, params: &CallParameters, deps: &FrameDeps) -> CallParameters {
    let bytecode = if params.create { params.input.clone() } else { host.code() };
    let outcome = deps.vm.run(host, &bytecode, params.gas, deps.schedule_version);

    let status = match outcome.status.into_transaction_status() {
        chain_executor_types::MappedStatus::Ok(status) => status,
        chain_executor_types::MappedStatus::Fatal => {
            panic!("VM returned internal_error: fatal, executor must abort (§4.D VM status table)")
        },
    };

    if !status.is_success() {
        host.take_logs();
        host.take_suicides();
        return params.clone().reverted(status, outcome.output, outcome.gas_remaining);
    }

    let mut gas_remaining = outcome.gas_remaining;
    let mut new_contract_address = None;
    if params.create {
        if outcome.output.len() > deps.schedule.max_code_size {
            host.take_logs();
            host.take_suicides();
            return params
                .clone()
                .reverted(TransactionStatus::OutOfGasLimit, Vec::new(), gas_remaining);
        }
        let code_deposit = deps.schedule.create_data_gas * outcome.output.len() as u64;
        if code_deposit > gas_remaining {
            host.take_logs();
            host.take_suicides();
            return params
                .clone()
                .reverted(TransactionStatus::OutOfGasLimit, Vec::new(), 0);
        }
        gas_remaining -= code_deposit;
        if host.set_code(&outcome.output).is_err() {
            host.take_logs();
            host.take_suicides();
            return params.clone().reverted(TransactionStatus::Unknown, Vec::new(), gas_remaining);
        }
        new_contract_address = Some(host.my_address().to_hex());
    }

    // Suicide is applied immediately in the destructing frame rather
    // than deferred to the transaction's outer frame: `CallParameters`
    // has no wire field to carry a pending suicide set upward, so the
    // simplest faithful-enough behavior is to zero the code here.
    for (_, _beneficiary) in host.take_suicides() {
        let _ = host.set_code(&[]);
    }

    let mut finished = params.clone().finished(outcome.output, gas_remaining);
    finished.log_entries = host.take_logs();
    finished.new_contract_address = new_contract_address;
    finished
}

#[cfg(test)]
mod tests {
    use super::*;
    use chain_state_store::{InMemoryBackend, Overlay};
    use std::sync::atomic::AtomicU32;

    struct EchoVm;

    impl Vm for EchoVm {
        fn run(&self, host: &mut HostContext, bytecode: &[u8], gas: u64, _schedule: ScheduleVersion) -> crate::vm::VmOutcome {
            if host.is_create() {
                return crate::vm::VmOutcome {
                    status: chain_executor_types::VmStatus::Success,
                    output: bytecode.to_vec(),
                    gas_remaining: gas.saturating_sub(10),
                };
            }
            crate::vm::VmOutcome {
                status: chain_executor_types::VmStatus::Success,
                output: host.input_data().to_vec(),
                gas_remaining: gas.saturating_sub(5),
            }
        }
    }

    fn deps() -> FrameDeps {
        let backend = Arc::new(InMemoryBackend::new());
        let overlay = Overlay::root(backend);
        FrameDeps {
            overlay,
            key_locks: Arc::new(KeyLockRegistry::new()),
            precompiled: Arc::new(PrecompiledRegistry::new()),
            vm: Arc::new(EchoVm),
            schedule: Arc::new(Schedule::default()),
            schedule_version: 1,
            block_number: 1,
            block_hashes: Arc::new(|_| None),
            context_id: 1,
            seq_counter: Arc::new(AtomicU32::new(0)),
        }
    }

    #[test]
    fn create_then_call_round_trips_through_one_overlay() {
        let deps = deps();
        let mut create_params = CallParameters::message("11".repeat(20), "", 1_000_000);
        create_params.create = true;
        create_params.create_kind = Some(CreateKind::Create);
        create_params.input = vec![1, 2, 3];

        let created = Executive::execute(create_params, &deps, 0);
        assert!(created.status.is_success());
        let address = created.new_contract_address.expect("create must report the new address");

        let mut call_params = CallParameters::message("11".repeat(20), address, 100_000);
        call_params.input = b"hello".to_vec();
        let called = Executive::execute(call_params, &deps, 0);
        assert!(called.status.is_success());
        assert_eq!(called.output, b"hello".to_vec());
    }

    #[test]
    fn gas_below_intrinsic_cost_reverts_before_dispatch() {
        let deps = deps();
        let mut params = CallParameters::message("11".repeat(20), "22".repeat(20), 1);
        params.input = vec![1, 2, 3, 4, 5, 6, 7, 8];
        let result = Executive::execute(params, &deps, 0);
        assert_eq!(result.status, TransactionStatus::OutOfGasLimit);
    }

    #[test]
    fn create_twice_at_same_nonce_would_differ_address() {
        let deps = deps();
        let mut p1 = CallParameters::message("33".repeat(20), "", 1_000_000);
        p1.create = true;
        p1.create_kind = Some(CreateKind::Create);
        p1.input = vec![9];
        let r1 = Executive::execute(p1, &deps, 0);

        let mut p2 = CallParameters::message("33".repeat(20), "", 1_000_000);
        p2.create = true;
        p2.create_kind = Some(CreateKind::Create);
        p2.input = vec![9];
        let r2 = Executive::execute(p2, &deps, 0);

        assert_ne!(r1.new_contract_address, r2.new_contract_address);
    }

    #[test]
    fn precompiled_call_bypasses_the_vm() {
        let deps = deps();
        let receiver = hex::encode(chain_precompiled::Ethereum::Identity.address());
        let mut params = CallParameters::message("44".repeat(20), receiver, 100_000);
        params.input = b"passthrough".to_vec();
        let result = Executive::execute(params, &deps, 0);
        assert!(result.status.is_success());
        assert_eq!(result.output, b"passthrough".to_vec());
    }
}
