//! Shared fixtures for resolver integration tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use elif_resolver::{loosely_matches, Entity, FieldTree, FilterArgs, Loader, ResolveResult};
use serde_json::Value;

/// In-memory table answering loader calls by loose filter matching.
///
/// Clones share the call log, so a test can keep one clone for assertions
/// and hand the other to the registry.
#[derive(Clone)]
pub struct Table {
    rows: Arc<Vec<Value>>,
    calls: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<Value>>>,
    selections: Arc<Mutex<Vec<Value>>>,
}

impl Table {
    pub fn new(rows: Vec<Value>) -> Self {
        Self {
            rows: Arc::new(rows),
            calls: Arc::new(AtomicUsize::new(0)),
            requests: Arc::new(Mutex::new(Vec::new())),
            selections: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Filter arguments of every call, as JSON
    pub fn requests(&self) -> Vec<Value> {
        self.requests.lock().unwrap().clone()
    }

    /// Requested field tree of every call, as JSON
    pub fn selections(&self) -> Vec<Value> {
        self.selections.lock().unwrap().clone()
    }
}

#[async_trait]
impl<C: Send + Sync> Loader<C> for Table {
    async fn load(&self, _ctx: &C, args: &FilterArgs, fields: &FieldTree) -> ResolveResult<Vec<Entity>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(args.to_json());
        self.selections.lock().unwrap().push(fields.to_json());

        // Suspend once, like a real round trip, so fan-out calls interleave
        tokio::task::yield_now().await;

        self.rows
            .iter()
            .filter(|row| {
                args.iter().filter(|(_, values)| !values.is_empty()).all(|(key, values)| {
                    row.get(key)
                        .map_or(false, |actual| loosely_matches(&Value::Array(values.to_vec()), actual))
                })
            })
            .cloned()
            .map(Entity::from_json)
            .collect()
    }
}

pub fn entity(value: Value) -> Entity {
    Entity::from_json(value).expect("fixture must be a JSON object")
}

pub fn tree(value: Value) -> FieldTree {
    FieldTree::from_json(&value).expect("fixture must be a valid field tree")
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
