// tests/execution_slot.rs

mod common;
use crate::common::init_tracing;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::Barrier;

use labdash::engine::{ExecutionSlot, SlotBusy, SlotState};

#[test]
fn second_acquire_is_rejected_with_holder_label() {
    init_tracing();

    let slot = Arc::new(ExecutionSlot::new());
    let guard = slot.try_acquire("Provision VMs").expect("idle slot must be acquired");

    assert!(slot.is_busy());
    assert_eq!(slot.current_label().as_deref(), Some("Provision VMs"));
    assert_eq!(guard.label(), "Provision VMs");

    let err = slot.try_acquire("Ansible: 01-base.yml").unwrap_err();
    assert_eq!(
        err,
        SlotBusy {
            label: "Provision VMs".to_string()
        }
    );
    assert_eq!(err.to_string(), "Another operation is already running: Provision VMs");

    // The rejected attempt must not have changed the holder.
    assert_eq!(slot.current_label().as_deref(), Some("Provision VMs"));
}

#[test]
fn dropping_guard_returns_to_idle() {
    init_tracing();

    let slot = Arc::new(ExecutionSlot::new());
    assert_eq!(slot.state(), SlotState::Idle);

    {
        let _guard = slot.try_acquire("Deprovision VMs").unwrap();
        assert_eq!(
            slot.state(),
            SlotState::Busy {
                label: "Deprovision VMs".to_string()
            }
        );
    }

    assert_eq!(slot.state(), SlotState::Idle);
    assert!(!slot.is_busy());
    assert_eq!(slot.current_label(), None);

    // And the slot can be taken again.
    let _again = slot.try_acquire("Provision VMs").unwrap();
    assert!(slot.is_busy());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_acquires_admit_exactly_one() {
    init_tracing();

    const CONTENDERS: usize = 16;

    let slot = Arc::new(ExecutionSlot::new());
    let start = Arc::new(Barrier::new(CONTENDERS));
    let attempted = Arc::new(Barrier::new(CONTENDERS));

    let mut handles = Vec::new();
    for i in 0..CONTENDERS {
        let slot = Arc::clone(&slot);
        let start = Arc::clone(&start);
        let attempted = Arc::clone(&attempted);

        handles.push(tokio::spawn(async move {
            start.wait().await;
            let result = slot.try_acquire(format!("op-{i}"));
            // Hold any guard until every contender has tried.
            attempted.wait().await;
            result.map(|guard| guard.label().to_string()).map_err(|busy| busy.label)
        }));
    }

    let mut winners = Vec::new();
    let mut observed_holders = Vec::new();
    for handle in handles {
        match handle.await.unwrap() {
            Ok(label) => winners.push(label),
            Err(holder) => observed_holders.push(holder),
        }
    }

    assert_eq!(winners.len(), 1, "exactly one contender must win");
    assert_eq!(observed_holders.len(), CONTENDERS - 1);
    for holder in observed_holders {
        assert_eq!(holder, winners[0], "losers must observe the winner's label");
    }
    assert!(!slot.is_busy());
}

#[tokio::test]
async fn run_exclusive_does_not_invoke_operation_when_busy() {
    init_tracing();

    let slot = Arc::new(ExecutionSlot::new());
    let _held = slot.try_acquire("Provision VMs").unwrap();
    let invoked = Arc::new(AtomicBool::new(false));

    let flag = Arc::clone(&invoked);
    let result = slot
        .run_exclusive("Ansible: site.yml", || async move {
            flag.store(true, Ordering::SeqCst);
        })
        .await;

    assert_eq!(
        result,
        Err(SlotBusy {
            label: "Provision VMs".to_string()
        })
    );
    assert!(!invoked.load(Ordering::SeqCst));
}

#[tokio::test]
async fn run_exclusive_holds_slot_during_operation_and_releases_after() {
    init_tracing();

    let slot = Arc::new(ExecutionSlot::new());
    let inner = Arc::clone(&slot);

    let seen = slot
        .run_exclusive("Ansible: site.yml", || async move { inner.current_label() })
        .await
        .unwrap();

    assert_eq!(seen.as_deref(), Some("Ansible: site.yml"));
    assert!(!slot.is_busy());
}

#[tokio::test]
async fn run_exclusive_releases_after_panic() {
    init_tracing();

    let slot = Arc::new(ExecutionSlot::new());
    let task_slot = Arc::clone(&slot);

    let joined = tokio::spawn(async move {
        task_slot
            .run_exclusive("Provision VMs", || async {
                if true {
                    panic!("operation blew up");
                }
            })
            .await
    })
    .await;

    assert!(joined.is_err(), "panic must propagate to the join handle");
    assert!(!slot.is_busy());
    assert_eq!(slot.current_label(), None);
}

#[tokio::test]
async fn run_exclusive_releases_after_cancellation() {
    init_tracing();

    let slot = Arc::new(ExecutionSlot::new());

    let cancelled = tokio::time::timeout(
        Duration::from_millis(50),
        slot.run_exclusive("Provision VMs", || std::future::pending::<()>()),
    )
    .await;

    assert!(cancelled.is_err());
    assert!(!slot.is_busy());
}

#[tokio::test]
async fn status_reads_do_not_wait_on_a_running_operation() {
    init_tracing();

    let slot = Arc::new(ExecutionSlot::new());
    let reader = Arc::clone(&slot);

    let result = slot
        .run_exclusive("Ansible: slow.yml", || async move {
            // Reads from inside the exclusive section return immediately.
            for _ in 0..100 {
                assert!(reader.is_busy());
                assert_eq!(reader.current_label().as_deref(), Some("Ansible: slow.yml"));
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
            reader.state()
        })
        .await
        .unwrap();

    assert_eq!(
        result,
        SlotState::Busy {
            label: "Ansible: slow.yml".to_string()
        }
    );
}
