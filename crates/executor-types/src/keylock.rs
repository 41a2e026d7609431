// Copyright © chain-executor contributors
// SPDX-License-Identifier: Apache-2.0

//! The key-lock table backing §4.D "Key locks": before a storage write
//! that conflicts with another live executive, the frame requests the
//! lock on `(table, key)`. The scheduler grants it (resuming the
//! frame) or, if granting would create a wait-for cycle, resumes with
//! a deadlock revert instead. One registry is shared by every
//! executive live in a block (owned by the Block Context).

use parking_lot::{Condvar, Mutex};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeadLock;

#[derive(Default)]
struct State {
    holders: HashMap<(String, String), u64>,
    /// Each executive waits on at most one lock at a time, so the
    /// wait-for graph has at most one outgoing edge per node.
    waiting_for: HashMap<u64, u64>,
}

pub struct KeyLockRegistry {
    state: Mutex<State>,
    cond: Condvar,
}

impl Default for KeyLockRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyLockRegistry {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            cond: Condvar::new(),
        }
    }

    /// Blocks `holder` until it owns the lock on `(table, key)`, or
    /// returns `Err(DeadLock)` without blocking if waiting would close
    /// a cycle back to `holder`.
    pub fn acquire(&self, table: &str, key: &str, holder: u64) -> Result<(), DeadLock> {
        let tk = (table.to_string(), key.to_string());
        let mut state = self.state.lock();
        loop {
            match state.holders.get(&tk).copied() {
                None => {
                    state.holders.insert(tk, holder);
                    state.waiting_for.remove(&holder);
                    return Ok(());
                },
                Some(h) if h == holder => {
                    state.waiting_for.remove(&holder);
                    return Ok(());
                },
                Some(h) => {
                    state.waiting_for.insert(holder, h);
                    if creates_cycle(&state.waiting_for, holder) {
                        state.waiting_for.remove(&holder);
                        return Err(DeadLock);
                    }
                    self.cond.wait(&mut state);
                },
            }
        }
    }

    /// Releases every lock held by `holder` (§4.D step 6: "drop any
    /// in-progress key-locks" on frame finalization, success or
    /// revert — see DESIGN.md Open Question 2).
    pub fn release_all(&self, holder: u64) {
        let mut state = self.state.lock();
        state.holders.retain(|_, h| *h != holder);
        state.waiting_for.remove(&holder);
        self.cond.notify_all();
    }
}

fn creates_cycle(waiting_for: &HashMap<u64, u64>, start: u64) -> bool {
    let mut cur = start;
    loop {
        match waiting_for.get(&cur) {
            None => return false,
            Some(&next) => {
                if next == start {
                    return true;
                }
                cur = next;
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn grants_immediately_when_free() {
        let reg = KeyLockRegistry::new();
        assert!(reg.acquire("T", "k", 1).is_ok());
        assert!(reg.acquire("T", "k", 1).is_ok());
    }

    #[test]
    fn second_holder_blocks_until_release() {
        let reg = Arc::new(KeyLockRegistry::new());
        reg.acquire("T", "k", 1).unwrap();
        let reg2 = reg.clone();
        let waiter = thread::spawn(move || reg2.acquire("T", "k", 2));
        thread::sleep(std::time::Duration::from_millis(50));
        reg.release_all(1);
        assert!(waiter.join().unwrap().is_ok());
    }

    #[test]
    fn direct_two_cycle_is_rejected_without_blocking() {
        let reg = Arc::new(KeyLockRegistry::new());
        reg.acquire("T", "a", 1).unwrap();
        reg.acquire("T", "b", 2).unwrap();
        // 2 already waits on 1 (e.g. from a prior WaitKey on a
        // different key). 1 now wants b, held by 2: granting would
        // close the cycle 1 -> 2 -> 1, so it must fail immediately.
        {
            let mut state = reg.state.lock();
            state.waiting_for.insert(2, 1);
        }
        assert_eq!(reg.acquire("T", "b", 1), Err(DeadLock));
    }
}
