// Copyright © chain-executor contributors
// SPDX-License-Identifier: Apache-2.0

use crate::ops::{MockOp, OP_GAS_COST};
use chain_executive::{Vm, VmOutcome};
use chain_executor_types::{ScheduleVersion, VmStatus};
use chain_vm_host::HostContext;
use parity_scale_codec::Decode;

/// A script-tape interpreter standing in for a real EVM/Wasm engine
/// (§1 Non-goals: the core "does not prescribe a specific VM
/// implementation"). Bytecode is a SCALE-encoded `Vec<MockOp>`; there
/// is no control flow, gas metering is a flat per-op charge, and
/// `Deploy` is the only op meaningful in a `create` frame.
#[derive(Default)]
pub struct MockVm;

impl Vm for MockVm {
    fn run(&self, host: &mut HostContext, bytecode: &[u8], gas: u64, _schedule: ScheduleVersion) -> VmOutcome {
        let ops = match Vec::<MockOp>::decode(&mut &bytecode[..]) {
            Ok(ops) => ops,
            Err(_) => {
                return VmOutcome {
                    status: VmStatus::InvalidInstruction,
                    output: Vec::new(),
                    gas_remaining: gas,
                };
            },
        };

        let mut gas_remaining = gas;
        let mut acc = Vec::new();
        let mut deployed_code: Option<Vec<u8>> = None;

        for op in ops {
            gas_remaining = match gas_remaining.checked_sub(OP_GAS_COST) {
                Some(rest) => rest,
                None => {
                    return VmOutcome {
                        status: VmStatus::OutOfGas,
                        output: Vec::new(),
                        gas_remaining: 0,
                    };
                },
            };
            match op {
                MockOp::Store { key, value } => {
                    if host.set(&key, &value).is_err() {
                        return VmOutcome {
                            status: VmStatus::Failure,
                            output: Vec::new(),
                            gas_remaining,
                        };
                    }
                },
                MockOp::Load { key } => acc.extend(host.get(&key)),
                MockOp::ReturnInput => {
                    return VmOutcome {
                        status: VmStatus::Success,
                        output: host.input_data().to_vec(),
                        gas_remaining,
                    };
                },
                MockOp::Return(bytes) => {
                    return VmOutcome {
                        status: VmStatus::Success,
                        output: bytes,
                        gas_remaining,
                    };
                },
                MockOp::Revert(bytes) => {
                    return VmOutcome {
                        status: VmStatus::Revert,
                        output: bytes,
                        gas_remaining,
                    };
                },
                MockOp::Call { receiver, input, gas: call_gas } => {
                    let call_gas = call_gas.min(gas_remaining);
                    let result = host.call(&receiver, input, call_gas, false);
                    gas_remaining = gas_remaining.saturating_sub(result.gas_used);
                    if !result.status.is_success() {
                        return VmOutcome {
                            status: VmStatus::Revert,
                            output: result.output,
                            gas_remaining,
                        };
                    }
                    host.merge_logs(result.log_entries);
                    acc.extend(result.output);
                },
                MockOp::Deploy(code) => deployed_code = Some(code),
                MockOp::Log { topics, data } => host.log(topics, data),
            }
        }

        let output = if host.is_create() { deployed_code.unwrap_or(acc) } else { acc };
        VmOutcome {
            status: VmStatus::Success,
            output,
            gas_remaining,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::encode_script;
    use chain_executive::{Executive, FrameDeps, Schedule};
    use chain_executor_types::{CallParameters, CreateKind, KeyLockRegistry};
    use chain_precompiled::PrecompiledRegistry;
    use chain_state_store::{InMemoryBackend, Overlay};
    use std::sync::atomic::AtomicU32;
    use std::sync::Arc;

    fn deps() -> FrameDeps {
        let backend = Arc::new(InMemoryBackend::new());
        let overlay = Overlay::root(backend);
        FrameDeps {
            overlay,
            key_locks: Arc::new(KeyLockRegistry::new()),
            precompiled: Arc::new(PrecompiledRegistry::new()),
            vm: Arc::new(MockVm),
            schedule: Arc::new(Schedule::default()),
            schedule_version: 1,
            block_number: 1,
            block_hashes: Arc::new(|_| None),
            context_id: 1,
            seq_counter: Arc::new(AtomicU32::new(0)),
        }
    }

    fn deploy(deps: &FrameDeps, sender: &str, script: Vec<MockOp>) -> String {
        let mut params = CallParameters::message(sender, "", 1_000_000);
        params.create = true;
        params.create_kind = Some(CreateKind::Create);
        params.input = encode_script(&script);
        let result = Executive::execute(params, deps, 0);
        assert!(result.status.is_success(), "deploy failed: {:?}", result.status);
        result.new_contract_address.unwrap()
    }

    #[test]
    fn store_then_load_round_trips_through_one_overlay() {
        let deps = deps();
        let address = deploy(
            &deps,
            &"11".repeat(20),
            vec![MockOp::Deploy(encode_script(&[MockOp::Load { key: "greeting".into() }]))],
        );

        let mut set_params = CallParameters::message("11".repeat(20), address.clone(), 100_000);
        set_params.input = encode_script(&[MockOp::Store {
            key: "greeting".into(),
            value: b"fisco bcos".to_vec(),
        }]);
        let set_result = Executive::execute(set_params, &deps, 0);
        assert!(set_result.status.is_success());

        let mut get_params = CallParameters::message("11".repeat(20), address, 100_000);
        get_params.input = encode_script(&[MockOp::Load { key: "greeting".into() }]);
        let get_result = Executive::execute(get_params, &deps, 0);
        assert!(get_result.status.is_success());
        assert_eq!(get_result.output, b"fisco bcos".to_vec());
    }

    #[test]
    fn revert_leaves_no_trace_in_the_overlay() {
        let deps = deps();
        let address = deploy(&deps, &"22".repeat(20), vec![MockOp::Deploy(encode_script(&[MockOp::Revert(b"boom".to_vec())]))]);

        let mut params = CallParameters::message("22".repeat(20), address, 100_000);
        params.input = encode_script(&[
            MockOp::Store {
                key: "k".into(),
                value: b"v".to_vec(),
            },
            MockOp::Revert(b"boom".to_vec()),
        ]);
        let result = Executive::execute(params, &deps, 0);
        assert!(!result.status.is_success());
        assert_eq!(result.output, b"boom".to_vec());
    }

    #[test]
    fn nested_call_bubbles_a_callee_revert_into_the_caller() {
        let deps = deps();
        let callee = deploy(
            &deps,
            &"33".repeat(20),
            vec![MockOp::Deploy(encode_script(&[MockOp::Revert(b"no".to_vec())]))],
        );
        let caller = deploy(
            &deps,
            &"33".repeat(20),
            vec![MockOp::Deploy(encode_script(&[MockOp::Call {
                receiver: callee.clone(),
                input: Vec::new(),
                gas: 50_000,
            }]))],
        );

        let mut params = CallParameters::message("33".repeat(20), caller, 100_000);
        params.input = encode_script(&[MockOp::Call {
            receiver: callee,
            input: Vec::new(),
            gas: 50_000,
        }]);
        let result = Executive::execute(params, &deps, 0);
        assert!(!result.status.is_success());
        assert_eq!(result.output, b"no".to_vec());
    }

    #[test]
    fn successful_call_surfaces_the_callees_logs_in_the_caller() {
        let deps = deps();
        let callee = deploy(
            &deps,
            &"44".repeat(20),
            vec![MockOp::Deploy(encode_script(&[
                MockOp::Log {
                    topics: vec![[1u8; 32]],
                    data: b"callee log".to_vec(),
                },
                MockOp::Return(Vec::new()),
            ]))],
        );
        let caller = deploy(
            &deps,
            &"44".repeat(20),
            vec![MockOp::Deploy(encode_script(&[MockOp::Call {
                receiver: callee.clone(),
                input: Vec::new(),
                gas: 50_000,
            }]))],
        );

        let mut params = CallParameters::message("44".repeat(20), caller, 100_000);
        params.input = encode_script(&[MockOp::Call {
            receiver: callee,
            input: Vec::new(),
            gas: 50_000,
        }]);
        let result = Executive::execute(params, &deps, 0);
        assert!(result.status.is_success());
        assert_eq!(result.log_entries.len(), 1);
        assert_eq!(result.log_entries[0].data, b"callee log".to_vec());
    }
}
