// Copyright © chain-executor contributors
// SPDX-License-Identifier: Apache-2.0

//! Gas schedule constants (§4.D "Gas"): the intrinsic transaction cost
//! and the per-byte code-deposit cost charged on a successful create.

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Schedule {
    pub tx_gas_limit: u64,
    pub create_data_gas: u64,
    pub max_code_size: usize,
    pub tx_base_gas: u64,
    pub tx_data_zero_gas: u64,
    pub tx_data_nonzero_gas: u64,
}

impl Default for Schedule {
    /// Commonly used EVM-style constants (post-Istanbul intrinsic gas,
    /// EIP-170 code-size cap).
    fn default() -> Self {
        Self {
            tx_gas_limit: 30_000_000,
            create_data_gas: 200,
            max_code_size: 24_576,
            tx_base_gas: 21_000,
            tx_data_zero_gas: 4,
            tx_data_nonzero_gas: 16,
        }
    }
}

impl Schedule {
    /// Intrinsic cost of a frame's input data (§4.D "Gas"): base cost
    /// plus a per-byte zero/non-zero surcharge.
    pub fn intrinsic_gas(&self, input: &[u8]) -> u64 {
        let mut gas = self.tx_base_gas;
        for byte in input {
            gas += if *byte == 0 {
                self.tx_data_zero_gas
            } else {
                self.tx_data_nonzero_gas
            };
        }
        gas
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intrinsic_gas_charges_nonzero_bytes_more() {
        let schedule = Schedule::default();
        let zero = schedule.intrinsic_gas(&[0, 0, 0]);
        let nonzero = schedule.intrinsic_gas(&[1, 2, 3]);
        assert!(nonzero > zero);
        assert_eq!(zero, schedule.tx_base_gas + 3 * schedule.tx_data_zero_gas);
    }
}
