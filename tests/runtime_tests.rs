//! # Runtime Tests
//!
//! Verifies how reconcile outcomes and errors become controller actions.

mod common;

use common::{key, nop_resource, FakeExternal};
use kube_runtime::controller::Action;
use managed_resource_controller::config::ControllerConfig;
use managed_resource_controller::controller::reconciler::{Reconciler, ReconcilerError, Requeue};
use managed_resource_controller::crd::NopResource;
use managed_resource_controller::runtime::error_policy::handle_reconciliation_error;
use managed_resource_controller::runtime::{reconcile_managed, Context};
use managed_resource_controller::store::MemoryStore;
use std::sync::Arc;
use std::time::Duration;

fn context(store: &Arc<MemoryStore<NopResource>>) -> Arc<Context<NopResource>> {
    let reconciler = Reconciler::new(Arc::clone(store) as _, Arc::new(FakeExternal::new()));
    Arc::new(Context::new(reconciler, &ControllerConfig::default()))
}

#[test]
fn test_immediate_requeue_backs_off_per_resource() {
    let ctx = context(&Arc::new(MemoryStore::new()));
    let a = key("a");
    let b = key("b");

    assert_eq!(ctx.action_for(&a, Requeue::Immediate), Action::requeue(Duration::from_secs(1)));
    assert_eq!(ctx.action_for(&a, Requeue::Immediate), Action::requeue(Duration::from_secs(1)));
    assert_eq!(ctx.action_for(&a, Requeue::Immediate), Action::requeue(Duration::from_secs(2)));
    assert_eq!(ctx.action_for(&b, Requeue::Immediate), Action::requeue(Duration::from_secs(1)));
}

#[test]
fn test_settled_outcomes_reset_backoff() {
    let ctx = context(&Arc::new(MemoryStore::new()));
    let a = key("a");

    for _ in 0..4 {
        ctx.action_for(&a, Requeue::Immediate);
    }
    assert_eq!(
        ctx.action_for(&a, Requeue::After(Duration::from_secs(60))),
        Action::requeue(Duration::from_secs(60))
    );
    assert_eq!(ctx.action_for(&a, Requeue::Immediate), Action::requeue(Duration::from_secs(1)));
    assert_eq!(ctx.action_for(&a, Requeue::None), Action::await_change());
}

#[tokio::test]
async fn test_reconcile_managed_maps_outcome_to_action() {
    let store = Arc::new(MemoryStore::new());
    let obj = store.insert(nop_resource("example"));
    let ctx = context(&store);

    let action = reconcile_managed(Arc::new(obj), Arc::clone(&ctx)).await.unwrap();
    assert_eq!(action, Action::requeue(Duration::from_secs(1)));

    let obj = store.stored(&key("example")).unwrap();
    let action = reconcile_managed(Arc::new(obj), ctx).await.unwrap();
    assert_eq!(action, Action::requeue(Duration::from_secs(60)));
}

#[test]
fn test_error_policy_backs_off() {
    let ctx = context(&Arc::new(MemoryStore::new()));
    let obj = Arc::new(nop_resource("example"));
    let error = ReconcilerError::Timeout(Duration::from_secs(65));

    let first = handle_reconciliation_error(Arc::clone(&obj), &error, Arc::clone(&ctx));
    let second = handle_reconciliation_error(Arc::clone(&obj), &error, Arc::clone(&ctx));
    let third = handle_reconciliation_error(obj, &error, ctx);

    assert_eq!(first, Action::requeue(Duration::from_secs(1)));
    assert_eq!(second, Action::requeue(Duration::from_secs(1)));
    assert_eq!(third, Action::requeue(Duration::from_secs(2)));
}
