//! Initializer ordering and merge behavior

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use common::{entity, tree, Table};
use elif_resolver::{
    initializer_fn, loader_fn, DependencyNode, DependencyRegistry, Entity, EntityId, FilterArgs, InitializerOutput,
    ObjectType, RelationDescriptor, ResolveError, ResolveResult, Resolver, TypeKey,
};
use pretty_assertions::assert_eq;
use serde_json::{json, Map, Value};
use tokio::sync::Notify;

fn cart_key() -> TypeKey {
    TypeKey::new("Cart")
}

/// Cart.order -> Order by `orderId`
fn cart_registry() -> (Arc<DependencyRegistry<()>>, Arc<DependencyNode<()>>, Arc<DependencyNode<()>>) {
    let registry = Arc::new(DependencyRegistry::new());
    let cart = registry.get_or_create(
        ObjectType::new("Cart")
            .scalar("id")
            .scalar("orderId")
            .scalar("discountCode")
            .object("order", "Order")
            .into_descriptor(),
    );
    let order = registry.get_or_create(ObjectType::new("Order").scalar("id").scalar("total").into_descriptor());
    cart.require(&order, [RelationDescriptor::one("order").filter("id", "orderId")]);
    (registry, cart, order)
}

fn extra(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
}

/// Initializer assigning `orderId = 41 + id` to every cart
fn assign_order_ids(calls: Arc<AtomicUsize>) -> impl elif_resolver::Initializer<()> {
    initializer_fn(move |_: (), carts: Vec<Entity>, _fields| {
        let calls = calls.clone();
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            let mut output = InitializerOutput::new();
            for cart in &carts {
                if let Some(Value::Number(id)) = cart.value("id") {
                    let order_id = 41 + id.as_i64().unwrap_or_default();
                    output.insert(EntityId::from(id.as_i64().unwrap_or_default()), extra(json!({ "orderId": order_id })));
                }
            }
            Ok(output)
        }
    })
}

#[tokio::test]
async fn test_initializer_blocks_relations_on_trigger_fields() {
    let (registry, cart, order) = cart_registry();
    let orders = Table::new(vec![json!({ "id": 42, "total": 10 })]);
    order.define_loader(orders.clone());
    let calls = Arc::new(AtomicUsize::new(0));
    cart.define_initializer(assign_order_ids(calls.clone()), ["orderId"]);

    let root = entity(json!({ "id": 1 }));
    let (_, report) = Resolver::new(registry)
        .load_with_report(&cart_key(), root.clone(), &(), Some(&tree(json!({ "order": { "total": true } }))))
        .await
        .unwrap();

    assert_eq!(orders.requests(), vec![json!({ "id": [42] })]);
    assert_eq!(root.value("orderId"), Some(json!(42)));
    assert_eq!(root.related_one("order").unwrap().value("total"), Some(json!(10)));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(report.stats.initializer_calls, 1);
}

#[tokio::test]
async fn test_initializer_without_trigger_fields_always_blocks() {
    let (registry, cart, order) = cart_registry();
    let orders = Table::new(vec![json!({ "id": 42, "total": 10 }), json!({ "id": 43, "total": 20 })]);
    order.define_loader(orders.clone());
    cart.define_initializer(assign_order_ids(Arc::new(AtomicUsize::new(0))), Vec::<String>::new());

    let carts = vec![entity(json!({ "id": 1 })), entity(json!({ "id": 2 }))];
    Resolver::new(registry)
        .load(&cart_key(), carts.clone(), &(), Some(&tree(json!({ "order": { "total": true } }))))
        .await
        .unwrap();

    assert_eq!(orders.requests(), vec![json!({ "id": [42, 43] })]);
    assert_eq!(carts[1].related_one("order").unwrap().value("total"), Some(json!(20)));
}

#[tokio::test]
async fn test_unrelated_initializer_runs_alongside_loaders() {
    let (registry, cart, order) = cart_registry();
    let gate = Arc::new(Notify::new());

    // The loader opens the gate the initializer waits on: if either awaited
    // the other first, the load would never finish
    let loader_gate = gate.clone();
    order.define_loader(loader_fn(move |_: (), args: FilterArgs, _fields| {
        let gate = loader_gate.clone();
        async move {
            gate.notify_one();
            args.values("id")
                .iter()
                .map(|id| Entity::from_json(json!({ "id": id, "total": 10 })))
                .collect::<ResolveResult<Vec<_>>>()
        }
    }));
    let init_gate = gate.clone();
    cart.define_initializer(
        initializer_fn(move |_: (), _carts: Vec<Entity>, _fields| {
            let gate = init_gate.clone();
            async move {
                gate.notified().await;
                let mut output = InitializerOutput::new();
                output.insert(EntityId::from(1), extra(json!({ "discountCode": "SPRING" })));
                Ok(output)
            }
        }),
        ["discountCode"],
    );

    let root = entity(json!({ "id": 1, "orderId": 42 }));
    let resolver = Resolver::new(registry);
    let fields = tree(json!({ "discountCode": true, "order": { "total": true } }));
    let root_key = cart_key();
    let load = resolver.load(&root_key, root.clone(), &(), Some(&fields));
    tokio::time::timeout(Duration::from_secs(5), load)
        .await
        .expect("initializer and loader must run concurrently")
        .unwrap();

    assert_eq!(root.value("discountCode"), Some(json!("SPRING")));
    assert_eq!(root.related_one("order").unwrap().value("total"), Some(json!(10)));
}

#[tokio::test]
async fn test_entities_without_identifier_are_left_unmodified() {
    let (registry, cart, _order) = cart_registry();
    cart.define_initializer(
        initializer_fn(|_: (), _carts: Vec<Entity>, _fields| async {
            let mut output = InitializerOutput::new();
            output.insert(EntityId::from(1), extra(json!({ "discountCode": "SPRING" })));
            output.insert(EntityId::from(99), extra(json!({ "discountCode": "UNUSED" })));
            Ok(output)
        }),
        Vec::<String>::new(),
    );

    let identified = entity(json!({ "id": "1" }));
    let draft = entity(json!({ "name": "draft" }));
    Resolver::new(registry)
        .load(
            &cart_key(),
            vec![identified.clone(), draft.clone()],
            &(),
            Some(&tree(json!({ "discountCode": true }))),
        )
        .await
        .unwrap();

    assert_eq!(identified.value("discountCode"), Some(json!("SPRING")));
    assert_eq!(draft.snapshot(&tree(json!({}))), json!({ "name": "draft" }));
}

#[tokio::test]
async fn test_initializer_failure_fails_the_load() {
    let (registry, cart, order) = cart_registry();
    let orders = Table::new(Vec::new());
    order.define_loader(orders.clone());
    cart.define_initializer(
        initializer_fn(|_: (), _carts: Vec<Entity>, _fields| async {
            Err::<InitializerOutput, ResolveError>(anyhow::anyhow!("pricing service unavailable").into())
        }),
        ["orderId"],
    );

    let err = Resolver::new(registry)
        .load(&cart_key(), entity(json!({ "id": 1 })), &(), Some(&tree(json!({ "order": true }))))
        .await
        .unwrap_err();

    assert!(err.to_string().contains("pricing service unavailable"));
    assert_eq!(orders.calls(), 0);
}
