/// Propagation tests
///
/// Nested begin/commit/rollback scenarios: new-vs-participating statuses,
/// rollback-only escalation, suspend/resume for independent inner
/// transactions, and completion-state misuse.
/// Run with: cargo test --test propagation_tests
use std::sync::Arc;
use std::time::Duration;

use txflow::{
    ConnectionPool, InMemoryStore, PoolConfig, Propagation, TransactionContext,
    TransactionDescriptor, TransactionManager, TxError,
};

fn new_manager() -> (TransactionManager, Arc<InMemoryStore>) {
    let pool = ConnectionPool::new(
        PoolConfig::new()
            .max_connections(4)
            .acquire_timeout(Duration::from_secs(1)),
    )
    .unwrap();
    let store = pool.store();
    (TransactionManager::new(pool), store)
}

fn required() -> TransactionDescriptor {
    TransactionDescriptor::default()
}

fn requires_new() -> TransactionDescriptor {
    TransactionDescriptor::new().propagation(Propagation::RequiresNew)
}

#[tokio::test]
async fn first_begin_starts_new_transaction() {
    let (manager, _store) = new_manager();
    let ctx = TransactionContext::new();

    let mut status = manager.begin(&ctx, required()).await.unwrap();
    assert!(status.is_new_transaction());
    assert!(ctx.has_active_transaction().unwrap());

    manager.commit(&mut status).await.unwrap();
    assert!(status.is_completed());
    assert!(!ctx.has_active_transaction().unwrap());
}

#[tokio::test]
async fn commit_makes_writes_durable() {
    let (manager, store) = new_manager();
    let ctx = TransactionContext::new();

    let mut status = manager.begin(&ctx, required()).await.unwrap();
    let txn = ctx.current().unwrap().unwrap();
    txn.put("member", "alice", "Alice").await.unwrap();
    assert!(!store.contains("member", "alice").unwrap());

    manager.commit(&mut status).await.unwrap();
    assert!(store.contains("member", "alice").unwrap());
}

#[tokio::test]
async fn rollback_discards_writes() {
    let (manager, store) = new_manager();
    let ctx = TransactionContext::new();

    let mut status = manager.begin(&ctx, required()).await.unwrap();
    let txn = ctx.current().unwrap().unwrap();
    txn.put("member", "alice", "Alice").await.unwrap();

    manager.rollback(&mut status).await.unwrap();
    assert!(!store.contains("member", "alice").unwrap());
    assert!(!ctx.has_active_transaction().unwrap());
}

#[tokio::test]
async fn nested_required_joins_existing_transaction() {
    let (manager, _store) = new_manager();
    let ctx = TransactionContext::new();

    let mut outer = manager.begin(&ctx, required()).await.unwrap();
    assert!(outer.is_new_transaction());

    let mut inner = manager.begin(&ctx, required()).await.unwrap();
    assert!(!inner.is_new_transaction());
    assert_eq!(inner.transaction_id(), outer.transaction_id());

    manager.commit(&mut inner).await.unwrap();
    manager.commit(&mut outer).await.unwrap();
}

#[tokio::test]
async fn inner_commit_defers_to_outer() {
    // The participating commit must not end the physical transaction; work
    // done after it and committed by the outer status is one atomic unit.
    let (manager, store) = new_manager();
    let ctx = TransactionContext::new();

    let mut outer = manager.begin(&ctx, required()).await.unwrap();
    let mut inner = manager.begin(&ctx, required()).await.unwrap();

    ctx.current()
        .unwrap()
        .unwrap()
        .put("member", "inner", "by-inner")
        .await
        .unwrap();
    manager.commit(&mut inner).await.unwrap();

    // Still active: the inner commit was logical only.
    assert!(ctx.has_active_transaction().unwrap());
    assert!(!store.contains("member", "inner").unwrap());

    ctx.current()
        .unwrap()
        .unwrap()
        .put("member", "outer", "by-outer")
        .await
        .unwrap();
    manager.commit(&mut outer).await.unwrap();

    assert!(store.contains("member", "inner").unwrap());
    assert!(store.contains("member", "outer").unwrap());
}

#[tokio::test]
async fn outer_rollback_discards_inner_committed_work() {
    let (manager, store) = new_manager();
    let ctx = TransactionContext::new();

    let mut outer = manager.begin(&ctx, required()).await.unwrap();
    let mut inner = manager.begin(&ctx, required()).await.unwrap();

    ctx.current()
        .unwrap()
        .unwrap()
        .put("member", "inner", "by-inner")
        .await
        .unwrap();
    manager.commit(&mut inner).await.unwrap();

    manager.rollback(&mut outer).await.unwrap();
    assert!(!store.contains("member", "inner").unwrap());
}

#[tokio::test]
async fn inner_rollback_marks_rollback_only() {
    let (manager, _store) = new_manager();
    let ctx = TransactionContext::new();

    let outer = manager.begin(&ctx, required()).await.unwrap();
    let mut inner = manager.begin(&ctx, required()).await.unwrap();
    assert!(!outer.is_rollback_only());

    // Participant rollback: no physical rollback, the shared transaction is
    // doomed instead.
    manager.rollback(&mut inner).await.unwrap();
    assert!(inner.is_completed());
    assert!(outer.is_rollback_only());
    assert!(ctx.has_active_transaction().unwrap());
}

#[tokio::test]
async fn outer_commit_after_inner_rollback_fails_unexpectedly() {
    let (manager, store) = new_manager();
    let ctx = TransactionContext::new();

    let mut outer = manager.begin(&ctx, required()).await.unwrap();
    ctx.current()
        .unwrap()
        .unwrap()
        .put("member", "outer", "by-outer")
        .await
        .unwrap();

    let mut inner = manager.begin(&ctx, required()).await.unwrap();
    ctx.current()
        .unwrap()
        .unwrap()
        .put("log", "inner", "by-inner")
        .await
        .unwrap();
    manager.rollback(&mut inner).await.unwrap();

    let result = manager.commit(&mut outer).await;
    assert!(matches!(result, Err(TxError::UnexpectedRollback)));
    assert!(outer.is_completed());

    // Both participants' work is gone.
    assert!(!store.contains("member", "outer").unwrap());
    assert!(!store.contains("log", "inner").unwrap());
    assert!(!ctx.has_active_transaction().unwrap());
}

#[tokio::test]
async fn explicit_rollback_only_marking_overrides_commit() {
    let (manager, store) = new_manager();
    let ctx = TransactionContext::new();

    let mut outer = manager.begin(&ctx, required()).await.unwrap();
    ctx.current()
        .unwrap()
        .unwrap()
        .put("member", "alice", "Alice")
        .await
        .unwrap();

    let mut inner = manager.begin(&ctx, required()).await.unwrap();
    inner.set_rollback_only();
    manager.commit(&mut inner).await.unwrap();

    let result = manager.commit(&mut outer).await;
    assert!(matches!(result, Err(TxError::UnexpectedRollback)));
    assert!(!store.contains("member", "alice").unwrap());
}

#[tokio::test]
async fn requires_new_starts_independent_transaction() {
    let (manager, store) = new_manager();
    let ctx = TransactionContext::new();

    let mut outer = manager.begin(&ctx, required()).await.unwrap();
    let outer_id = outer.transaction_id();
    ctx.current()
        .unwrap()
        .unwrap()
        .put("member", "outer", "by-outer")
        .await
        .unwrap();

    let mut inner = manager.begin(&ctx, requires_new()).await.unwrap();
    assert!(inner.is_new_transaction());
    assert!(inner.has_suspended_transaction());
    assert_ne!(inner.transaction_id(), outer_id);

    // The context's current transaction is now the independent inner one.
    let current = ctx.current().unwrap().unwrap();
    assert_eq!(current.id(), inner.transaction_id());
    current.put("log", "inner", "by-inner").await.unwrap();

    // Rolling the inner transaction back does not doom the outer one.
    manager.rollback(&mut inner).await.unwrap();
    assert!(!outer.is_rollback_only());

    // The outer transaction is current again after the inner completes.
    let resumed = ctx.current().unwrap().unwrap();
    assert_eq!(resumed.id(), outer_id);

    manager.commit(&mut outer).await.unwrap();
    assert!(store.contains("member", "outer").unwrap());
    assert!(!store.contains("log", "inner").unwrap());
}

#[tokio::test]
async fn requires_new_commit_survives_outer_rollback() {
    let (manager, store) = new_manager();
    let ctx = TransactionContext::new();

    let mut outer = manager.begin(&ctx, required()).await.unwrap();
    ctx.current()
        .unwrap()
        .unwrap()
        .put("member", "outer", "by-outer")
        .await
        .unwrap();

    let mut inner = manager.begin(&ctx, requires_new()).await.unwrap();
    ctx.current()
        .unwrap()
        .unwrap()
        .put("log", "inner", "by-inner")
        .await
        .unwrap();
    manager.commit(&mut inner).await.unwrap();

    manager.rollback(&mut outer).await.unwrap();

    assert!(store.contains("log", "inner").unwrap());
    assert!(!store.contains("member", "outer").unwrap());
}

#[tokio::test]
async fn sequential_transactions_are_independent() {
    let (manager, store) = new_manager();
    let ctx = TransactionContext::new();

    let mut first = manager.begin(&ctx, required()).await.unwrap();
    ctx.current()
        .unwrap()
        .unwrap()
        .put("member", "first", "1")
        .await
        .unwrap();
    manager.commit(&mut first).await.unwrap();

    let mut second = manager.begin(&ctx, required()).await.unwrap();
    assert!(second.is_new_transaction());
    assert_ne!(second.transaction_id(), first.transaction_id());
    ctx.current()
        .unwrap()
        .unwrap()
        .put("member", "second", "2")
        .await
        .unwrap();
    manager.commit(&mut second).await.unwrap();

    assert!(store.contains("member", "first").unwrap());
    assert!(store.contains("member", "second").unwrap());
}

#[tokio::test]
async fn rollback_only_does_not_leak_across_transactions() {
    let (manager, store) = new_manager();
    let ctx = TransactionContext::new();

    let mut first = manager.begin(&ctx, required()).await.unwrap();
    let mut participant = manager.begin(&ctx, required()).await.unwrap();
    manager.rollback(&mut participant).await.unwrap();
    assert!(matches!(
        manager.commit(&mut first).await,
        Err(TxError::UnexpectedRollback)
    ));

    // A fresh transaction on the same context starts clean.
    let mut second = manager.begin(&ctx, required()).await.unwrap();
    assert!(!second.is_rollback_only());
    ctx.current()
        .unwrap()
        .unwrap()
        .put("member", "alice", "Alice")
        .await
        .unwrap();
    manager.commit(&mut second).await.unwrap();
    assert!(store.contains("member", "alice").unwrap());
}

#[tokio::test]
async fn sequential_commit_then_rollback_pair() {
    let (manager, _store) = new_manager();
    let ctx = TransactionContext::new();

    let mut first = manager.begin(&ctx, required()).await.unwrap();
    manager.commit(&mut first).await.unwrap();

    let mut second = manager.begin(&ctx, required()).await.unwrap();
    assert!(second.is_new_transaction());
    manager.rollback(&mut second).await.unwrap();
}

#[tokio::test]
async fn double_commit_fails_with_illegal_state() {
    let (manager, _store) = new_manager();
    let ctx = TransactionContext::new();

    let mut status = manager.begin(&ctx, required()).await.unwrap();
    manager.commit(&mut status).await.unwrap();

    let result = manager.commit(&mut status).await;
    assert!(matches!(result, Err(TxError::IllegalState(_))));
}

#[tokio::test]
async fn double_rollback_fails_with_illegal_state() {
    let (manager, _store) = new_manager();
    let ctx = TransactionContext::new();

    let mut status = manager.begin(&ctx, required()).await.unwrap();
    manager.rollback(&mut status).await.unwrap();

    let result = manager.rollback(&mut status).await;
    assert!(matches!(result, Err(TxError::IllegalState(_))));
}

#[tokio::test]
async fn rollback_after_commit_fails_with_illegal_state() {
    let (manager, _store) = new_manager();
    let ctx = TransactionContext::new();

    let mut status = manager.begin(&ctx, required()).await.unwrap();
    manager.commit(&mut status).await.unwrap();

    let result = manager.rollback(&mut status).await;
    assert!(matches!(result, Err(TxError::IllegalState(_))));
}

#[tokio::test]
async fn unresolved_propagation_is_rejected() {
    let (manager, _store) = new_manager();
    let ctx = TransactionContext::new();

    let descriptor = TransactionDescriptor::new().propagation(Propagation::Mandatory);
    let result = manager.begin(&ctx, descriptor).await;
    assert!(matches!(result, Err(TxError::UnsupportedOperation(_))));
    assert!(!ctx.has_active_transaction().unwrap());
}

#[tokio::test]
async fn contexts_are_isolated_from_each_other() {
    let (manager, store) = new_manager();
    let ctx_a = TransactionContext::new();
    let ctx_b = TransactionContext::new();

    let mut a = manager.begin(&ctx_a, required()).await.unwrap();
    let mut b = manager.begin(&ctx_b, required()).await.unwrap();

    // Both contexts see their own governing transaction, not each other's.
    assert!(a.is_new_transaction());
    assert!(b.is_new_transaction());
    assert_ne!(a.transaction_id(), b.transaction_id());

    // Dooming one context's transaction leaves the other committable.
    let mut b_participant = manager.begin(&ctx_b, required()).await.unwrap();
    manager.rollback(&mut b_participant).await.unwrap();
    assert!(!a.is_rollback_only());

    ctx_a
        .current()
        .unwrap()
        .unwrap()
        .put("member", "a", "A")
        .await
        .unwrap();
    manager.commit(&mut a).await.unwrap();
    assert!(matches!(
        manager.commit(&mut b).await,
        Err(TxError::UnexpectedRollback)
    ));

    assert!(store.contains("member", "a").unwrap());
}
