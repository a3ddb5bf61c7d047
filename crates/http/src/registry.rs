//! Registered web service endpoints
//!
//! Request handling reads an immutable [`EndpointTable`] snapshot without
//! locking. Registration copies the table, inserts the new endpoint and
//! swaps the snapshot in; writers serialize on a mutex.

use arc_swap::ArcSwap;
use edgegate_core::WebService;
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

/// Immutable routing table: URL pattern to web service
#[derive(Debug, Default, Clone)]
pub struct EndpointTable {
    routes: HashMap<String, Arc<WebService>>,
}

impl EndpointTable {
    pub fn get(&self, path: &str) -> Option<&Arc<WebService>> {
        self.routes.get(path)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.routes.keys().map(String::as_str)
    }
}

pub struct EndpointRegistry {
    prefix: String,
    table: ArcSwap<EndpointTable>,
    write: Mutex<()>,
}

impl EndpointRegistry {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            table: ArcSwap::from_pointee(EndpointTable::default()),
            write: Mutex::new(()),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Add a web service. Returns `false` when its pattern is already taken.
    pub fn register(&self, service: WebService) -> bool {
        let _guard = self.write.lock();
        let pattern = service.endpoint().pattern(&self.prefix);

        let current = self.table.load();
        if current.routes.contains_key(&pattern) {
            debug!(%pattern, "web service already registered");
            return false;
        }

        let mut next = EndpointTable::clone(&current);
        next.routes.insert(pattern.clone(), Arc::new(service));
        self.table.store(Arc::new(next));

        info!(%pattern, "registered web service");
        true
    }

    pub fn snapshot(&self) -> Arc<EndpointTable> {
        self.table.load_full()
    }

    pub fn lookup(&self, path: &str) -> Option<Arc<WebService>> {
        self.table.load().get(path).cloned()
    }

    pub fn len(&self) -> usize {
        self.table.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.load().is_empty()
    }

    /// Sorted, de-duplicated names of every accepted message type
    pub fn message_types(&self) -> Vec<String> {
        let table = self.table.load();
        table
            .routes
            .values()
            .flat_map(|service| service.message_types())
            .map(str::to_string)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use edgegate_core::Query;
    use std::thread;

    #[test]
    fn test_duplicate_registration_is_noop() {
        let registry = EndpointRegistry::new("/probler/");
        assert!(registry.register(WebService::builder("Flows", 3).get::<Query>().build()));
        assert!(!registry.register(WebService::builder("Flows", 3).post::<Query>().build()));
        assert_eq!(registry.len(), 1);

        let service = registry.lookup("/probler/3/Flows").unwrap();
        assert!(service.codec(&axum::http::Method::GET).is_some());
        assert!(service.codec(&axum::http::Method::POST).is_none());
    }

    #[test]
    fn test_snapshot_is_stable() {
        let registry = EndpointRegistry::new("/");
        let before = registry.snapshot();
        registry.register(WebService::builder("Flows", 0).get::<Query>().build());
        assert!(before.is_empty());
        assert_eq!(registry.snapshot().len(), 1);
    }

    #[test]
    fn test_concurrent_registration() {
        let registry = Arc::new(EndpointRegistry::new("/"));
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let registry = registry.clone();
                thread::spawn(move || {
                    registry.register(WebService::builder("Svc", i % 4).get::<Query>().build())
                })
            })
            .collect();

        let accepted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|accepted| *accepted)
            .count();
        assert_eq!(accepted, 4);
        assert_eq!(registry.len(), 4);
        assert_eq!(registry.message_types(), vec!["Query".to_string()]);
    }
}
