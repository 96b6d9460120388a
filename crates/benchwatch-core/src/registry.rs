// ABOUTME: Client registry: name → endpoint, rebuilt wholesale, readers get copies

use benchwatch_types::ClientEndpoint;
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::debug;

/// The set of JSON-RPC clients currently under test.
///
/// Interior synchronization with a read-write lock; a reload replaces the
/// whole table and every reader receives clones, never handles into the map.
#[derive(Default)]
pub struct ClientRegistry {
    inner: RwLock<HashMap<String, ClientEndpoint>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the registry contents wholesale.
    pub fn replace_all(&self, clients: Vec<ClientEndpoint>) {
        let mut table: HashMap<String, ClientEndpoint> = HashMap::with_capacity(clients.len());
        for client in clients {
            table.insert(client.name.clone(), client);
        }
        let count = table.len();
        *self.inner.write().expect("client registry lock poisoned") = table;
        debug!(count, "client registry rebuilt");
    }

    /// A copy of one client's endpoint.
    pub fn get(&self, name: &str) -> Option<ClientEndpoint> {
        self.inner
            .read()
            .expect("client registry lock poisoned")
            .get(name)
            .cloned()
    }

    /// Copies of every registered endpoint, sorted by name.
    pub fn list(&self) -> Vec<ClientEndpoint> {
        let mut clients: Vec<ClientEndpoint> = self
            .inner
            .read()
            .expect("client registry lock poisoned")
            .values()
            .cloned()
            .collect();
        clients.sort_by(|a, b| a.name.cmp(&b.name));
        clients
    }

    pub fn len(&self) -> usize {
        self.inner.read().expect("client registry lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint(name: &str, url: &str) -> ClientEndpoint {
        ClientEndpoint {
            name: name.to_string(),
            url: url.to_string(),
        }
    }

    #[test]
    fn test_replace_all_is_wholesale() {
        let registry = ClientRegistry::new();
        registry.replace_all(vec![
            endpoint("geth", "http://geth:8545"),
            endpoint("nethermind", "http://nethermind:8545"),
        ]);
        assert_eq!(registry.len(), 2);

        registry.replace_all(vec![endpoint("reth", "http://reth:8545")]);
        assert_eq!(registry.len(), 1);
        assert!(registry.get("geth").is_none());
        assert_eq!(registry.get("reth").unwrap().url, "http://reth:8545");
    }

    #[test]
    fn test_readers_get_copies() {
        let registry = ClientRegistry::new();
        registry.replace_all(vec![endpoint("geth", "http://geth:8545")]);

        let mut copy = registry.get("geth").unwrap();
        copy.url = "http://mutated:1".to_string();
        // The registry's own entry is untouched.
        assert_eq!(registry.get("geth").unwrap().url, "http://geth:8545");
    }

    #[test]
    fn test_list_is_sorted() {
        let registry = ClientRegistry::new();
        registry.replace_all(vec![
            endpoint("nethermind", "http://n:8545"),
            endpoint("geth", "http://g:8545"),
        ]);
        let names: Vec<String> = registry.list().into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["geth", "nethermind"]);
    }
}
