mod common;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use common::*;
use trellis::core::{StoreError, StoredLedger, WriteBatch};
use trellis::{InvariantViolation, Joint, Ledger, LedgerError, LedgerStore, MemoryStore, RejectionKind};
use tokio::sync::Notify;
use trellis_storage_sled::SledStore;

#[tokio::test]
async fn transient_store_failures_are_retried() -> Result<()> {
    let network = Network::new()?;
    let store = Arc::new(MemoryStore::new());
    let ledger = Ledger::open(network.config().with_retry(fast_retry(5)), store.clone()).await?;
    network.start(&ledger).await?;

    let author = network.next_witness();
    let unit = network.compose(&ledger, &author, &[network.genesis.unit], &[]).await?;
    store.fail_next_commits(3);
    ledger.submit_unit(Joint::new(unit.clone())).await?;

    assert_eq!(store.commit_count(), 2);
    assert_eq!(ledger.free_units().await, vec![unit.unit]);
    assert!(store.snapshot().await.joints.contains_key(&unit.unit));
    Ok(())
}

#[tokio::test]
async fn exhausted_retries_leave_nothing_behind() -> Result<()> {
    let network = Network::new()?;
    let store = Arc::new(MemoryStore::new());
    let ledger = Ledger::open(network.config().with_retry(fast_retry(3)), store.clone()).await?;
    network.start(&ledger).await?;

    let author = network.next_witness();
    let unit = network.compose(&ledger, &author, &[network.genesis.unit], &[]).await?;
    store.fail_next_commits(10);
    let rejection = ledger.submit_unit(Joint::new(unit.clone())).await.unwrap_err();
    assert_eq!(rejection.kind(), RejectionKind::Unavailable);
    assert!(ledger.unit_props(&unit.unit).await.is_none());
    assert_eq!(ledger.free_units().await, vec![network.genesis.unit]);
    assert!(ledger.unit_props(&network.genesis.unit).await.is_some_and(|p| p.is_free));

    // once the store is back the same unit goes through
    store.fail_next_commits(0);
    ledger.submit_unit(Joint::new(unit.clone())).await?;
    assert_eq!(ledger.free_units().await, vec![unit.unit]);
    Ok(())
}

#[tokio::test]
async fn reopening_a_memory_store_replays_the_same_ledger() -> Result<()> {
    let mut network = Network::new()?;
    let store = Arc::new(MemoryStore::new());
    let ledger = Ledger::open(network.config(), store.clone()).await?;
    network.start(&ledger).await?;
    network.extend(&ledger, 16).await?;

    let reopened = Ledger::open(network.config(), store.clone()).await?;
    assert_eq!(reopened.main_chain().await, ledger.main_chain().await);
    assert_eq!(reopened.last_stable_ball().await, ledger.last_stable_ball().await);
    for unit in network.history.iter().map(|u| u.unit) {
        assert_eq!(reopened.unit_props(&unit).await, ledger.unit_props(&unit).await);
    }
    for witness in network.witness_addresses() {
        assert_eq!(reopened.commission_earnings(&witness).await, ledger.commission_earnings(&witness).await);
        assert_eq!(reopened.query_balance(&witness).await?, ledger.query_balance(&witness).await?);
    }
    Ok(())
}

/// Serves a stored ledger whose first stable non-genesis record was altered.
struct TamperedStore {
    ledger: StoredLedger,
}

#[async_trait]
impl LedgerStore for TamperedStore {
    async fn load(&self) -> Result<StoredLedger, StoreError> { Ok(self.ledger.clone()) }

    async fn commit(&self, _batch: WriteBatch) -> Result<(), StoreError> { Ok(()) }
}

#[tokio::test]
async fn replay_detects_a_stored_record_that_disagrees() -> Result<()> {
    let mut network = Network::new()?;
    let store = Arc::new(MemoryStore::new());
    let ledger = Ledger::open(network.config(), store.clone()).await?;
    network.start(&ledger).await?;
    network.extend(&ledger, 12).await?;

    let mut stored = store.snapshot().await;
    let (unit, record) =
        stored.records.iter_mut().find(|(_, record)| record.is_stable && record.level > 0).expect("something past genesis is stable");
    record.witnessed_level += 1;
    let unit = *unit;

    let result = Ledger::open(network.config(), Arc::new(TamperedStore { ledger: stored })).await;
    match result {
        Err(LedgerError::Invariant(InvariantViolation::Replay(diverged))) => assert_eq!(diverged, unit),
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("a tampered store opened cleanly"),
    }
    Ok(())
}

/// Holds each commit open until released, once the gate is closed.
#[derive(Default)]
struct GatedStore {
    inner: MemoryStore,
    closed: AtomicBool,
    entered: Notify,
    release: Notify,
}

#[async_trait]
impl LedgerStore for GatedStore {
    async fn load(&self) -> Result<StoredLedger, StoreError> { self.inner.load().await }

    async fn commit(&self, batch: WriteBatch) -> Result<(), StoreError> {
        if self.closed.load(Ordering::SeqCst) {
            self.entered.notify_one();
            self.release.notified().await;
        }
        self.inner.commit(batch).await
    }
}

#[tokio::test]
async fn readers_do_not_wait_for_the_store() -> Result<()> {
    let mut network = Network::new()?;
    let store = Arc::new(GatedStore::default());
    let ledger = Arc::new(Ledger::open(network.config(), store.clone()).await?);
    network.start(&ledger).await?;

    let author = network.next_witness();
    let unit = network.compose(&ledger, &author, &[network.genesis.unit], &[]).await?;
    network.record(&unit);
    store.closed.store(true, Ordering::SeqCst);
    let submitting = {
        let ledger = ledger.clone();
        let joint = Joint::new(unit.clone());
        tokio::spawn(async move { ledger.submit_unit(joint).await })
    };
    store.entered.notified().await;

    // the commit is still in flight: reads answer at once, from the last committed state
    let free = tokio::time::timeout(Duration::from_secs(1), ledger.free_units()).await?;
    assert_eq!(free, vec![network.genesis.unit]);
    let props = tokio::time::timeout(Duration::from_secs(1), ledger.unit_props(&unit.unit)).await?;
    assert!(props.is_none());

    store.release.notify_one();
    submitting.await??;
    assert_eq!(ledger.free_units().await, vec![unit.unit]);

    // the working copy kept up: the next unit builds on the published one
    store.closed.store(false, Ordering::SeqCst);
    let author = network.next_witness();
    let next = network.compose(&ledger, &author, &[unit.unit], &[]).await?;
    ledger.submit_unit(Joint::new(next.clone())).await?;
    assert_eq!(ledger.free_units().await, vec![next.unit]);
    Ok(())
}

#[tokio::test]
async fn sled_ledger_survives_a_restart() -> Result<()> {
    let scratch = tempfile::tempdir()?;
    let path = scratch.path().to_path_buf();
    let mut network = Network::new()?;

    let (main_chain, last_stable_ball, props) = {
        let store = Arc::new(SledStore::with_path(path.clone())?);
        let ledger = Ledger::open(network.config(), store).await?;
        network.start(&ledger).await?;
        network.extend(&ledger, 15).await?;
        let mut props = Vec::new();
        for unit in network.history.iter().map(|u| u.unit) {
            props.push(ledger.unit_props(&unit).await);
        }
        (ledger.main_chain().await, ledger.last_stable_ball().await, props)
    };

    let store = Arc::new(SledStore::with_path(path.clone())?);
    let ledger = Ledger::open(network.config(), store).await?;
    assert_eq!(ledger.main_chain().await, main_chain);
    assert_eq!(ledger.last_stable_ball().await, last_stable_ball);
    for (unit, expected) in network.history.iter().map(|u| u.unit).zip(props) {
        assert_eq!(ledger.unit_props(&unit).await, expected);
    }

    // and keeps going from where it stopped
    let before = ledger.last_stable_mci().await;
    network.extend(&ledger, 3).await?;
    assert!(ledger.last_stable_mci().await > before);

    drop(ledger);
    scratch.close()?;
    Ok(())
}

#[tokio::test]
async fn sled_store_round_trips_a_batch() -> Result<()> {
    let network = Network::new()?;
    let store = SledStore::new_test()?;
    let ledger = Ledger::in_memory(network.config()).await?;
    network.start(&ledger).await?;

    let joint = ledger.joint(&network.genesis.unit).await.expect("genesis is stored");
    let record = ledger.unit_props(&network.genesis.unit).await.expect("genesis is known");
    let ball = ledger.ball(&network.genesis.unit).await.expect("genesis has a ball");
    store
        .commit(WriteBatch { joint: Some(joint.clone()), records: vec![(network.genesis.unit, record.clone())], balls: vec![(network.genesis.unit, ball)], commissions: vec![] })
        .await?;

    let loaded = store.load().await?;
    assert_eq!(loaded.joints.get(&network.genesis.unit), Some(&joint));
    assert_eq!(loaded.records.get(&network.genesis.unit), Some(&record));
    assert_eq!(loaded.balls.get(&network.genesis.unit), Some(&ball));
    assert!(loaded.commissions.is_empty());
    Ok(())
}
