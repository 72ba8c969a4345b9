//! Property-based tests for the edit lock.
//!
//! These tests verify:
//!  - Mutual exclusion: while one user holds a live lock, nobody else's
//!    acquire succeeds
//!  - Self re-entrance: a holder's repeated acquire never conflicts
//!  - Expiry monotonicity: remaining time never grows without a renewal,
//!    resets on renewal, and bottoms out at exactly zero

use proptest::prelude::*;
use sheetlock_core::{Clock, DocumentId, ManualClock, MemoryStore, UserId};
use sheetlock_lock::{LockConfig, LockError, LockManager};

#[derive(Clone, Debug)]
enum Op {
    Acquire(usize),
    Release(usize),
    Renew(usize),
    Advance(u64),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0usize..3).prop_map(Op::Acquire),
        (0usize..3).prop_map(Op::Release),
        (0usize..3).prop_map(Op::Renew),
        (0u64..400_000).prop_map(Op::Advance),
    ]
}

fn viewers(store: &MemoryStore, clock: &ManualClock) -> Vec<LockManager<MemoryStore, ManualClock>> {
    ["alice", "bob", "carol"]
        .iter()
        .map(|name| {
            LockManager::new(
                store.clone(),
                clock.clone(),
                DocumentId::default(),
                UserId::new(*name),
                LockConfig::default(),
            )
            .unwrap()
        })
        .collect()
}

proptest! {
    #[test]
    fn at_most_one_live_holder(ops in prop::collection::vec(op_strategy(), 1..60)) {
        let store = MemoryStore::new();
        let clock = ManualClock::new(0);
        let mut managers = viewers(&store, &clock);
        let timeout = LockConfig::default().lock_timeout_ms;

        // Model: (owner index, last renewal)
        let mut owner: Option<(usize, u64)> = None;

        for op in ops {
            let now = clock.now_ms();
            if let Some((_, renewed)) = owner {
                if now - renewed >= timeout {
                    owner = None;
                }
            }

            match op {
                Op::Acquire(i) => {
                    let result = managers[i].acquire();
                    match owner {
                        Some((o, _)) if o != i => {
                            let is_conflict = matches!(result, Err(LockError::Conflict { .. }));
                            prop_assert!(is_conflict);
                        }
                        Some((o, _)) => {
                            let acquisition = result.unwrap();
                            prop_assert!(acquisition.reentrant);
                            owner = Some((o, now));
                        }
                        None => {
                            prop_assert!(result.is_ok());
                            owner = Some((i, now));
                        }
                    }
                }
                Op::Release(i) => {
                    let released = managers[i].release().unwrap();
                    prop_assert_eq!(released, matches!(owner, Some((o, _)) if o == i));
                    if released {
                        owner = None;
                    }
                }
                Op::Renew(i) => {
                    let renewed = managers[i].renew().unwrap();
                    prop_assert_eq!(renewed, matches!(owner, Some((o, _)) if o == i));
                    if renewed {
                        owner = Some((i, now));
                    }
                }
                Op::Advance(ms) => clock.advance(ms),
            }

            let after = clock.now_ms();
            let live_owner = owner.filter(|(_, renewed)| after - renewed < timeout);
            for manager in managers.iter_mut() {
                manager.refresh().unwrap();
            }
            let self_holders: Vec<usize> = managers
                .iter()
                .enumerate()
                .filter(|(_, m)| m.is_held_by_self())
                .map(|(i, _)| i)
                .collect();
            prop_assert_eq!(self_holders, live_owner.map(|(o, _)| o).into_iter().collect::<Vec<_>>());
        }
    }

    #[test]
    fn remaining_is_monotonic_until_renewed(steps in prop::collection::vec(0u64..120_000, 1..20)) {
        let store = MemoryStore::new();
        let clock = ManualClock::new(0);
        let mut managers = viewers(&store, &clock);
        let timeout = LockConfig::default().lock_timeout_ms;
        let alice = &mut managers[0];

        alice.acquire().unwrap();
        let mut previous = alice.remaining_ms().unwrap();
        prop_assert_eq!(previous, timeout);

        for step in steps {
            clock.advance(step);
            let remaining = alice.remaining_ms().unwrap();
            prop_assert!(remaining <= previous);
            previous = remaining;
        }

        if previous == 0 {
            prop_assert!(!alice.is_held_by_self());
        } else {
            alice.renew().unwrap();
            prop_assert_eq!(alice.remaining_ms().unwrap(), timeout);
        }
    }
}
