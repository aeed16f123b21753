//! Route table: which connection last carried each `(system, component)`.

use std::collections::{HashMap, HashSet};

use mavswitch_codec::Destination;
use mavswitch_network::ConnectionKey;

/// Maps observed sources to the connection they arrived on. Every valid
/// inbound frame overwrites the entry for its source, so the table always
/// points at the most recently seen path.
#[derive(Debug, Default)]
pub struct RouteTable {
    routes: HashMap<(u8, u8), ConnectionKey>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `(system, component)` was last seen on `key`. The 0
    /// wildcard is never stored as a key component.
    pub fn learn(&mut self, system: u8, component: u8, key: ConnectionKey) {
        if system == 0 || component == 0 {
            return;
        }
        self.routes.insert((system, component), key);
    }

    /// Resolve a destination to the set of connections that should carry it,
    /// with 0-wildcard semantics in both positions. The set is deduplicated;
    /// an empty set means the target has not been learned yet.
    pub fn resolve(&self, destination: Destination) -> HashSet<ConnectionKey> {
        let (want_system, want_component) = destination.raw();
        self.routes
            .iter()
            .filter(|((system, component), _)| {
                (want_system == 0 || *system == want_system)
                    && (want_component == 0 || *component == want_component)
            })
            .map(|(_, key)| key.clone())
            .collect()
    }

    pub fn lookup(&self, system: u8, component: u8) -> Option<&ConnectionKey> {
        self.routes.get(&(system, component))
    }

    /// Drop every route that points at a removed connection.
    pub fn forget_connection(&mut self, key: &ConnectionKey) {
        self.routes.retain(|_, route| route != key);
    }

    pub fn clear(&mut self) {
        self.routes.clear();
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(name: &str) -> ConnectionKey {
        ConnectionKey::new(name)
    }

    #[test]
    fn learning_overwrites_previous_path() {
        let mut table = RouteTable::new();
        table.learn(1, 1, key("a"));
        table.learn(1, 1, key("b"));
        assert_eq!(table.lookup(1, 1), Some(&key("b")));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn wildcard_zero_is_never_stored() {
        let mut table = RouteTable::new();
        table.learn(0, 1, key("a"));
        table.learn(1, 0, key("a"));
        assert!(table.is_empty());
    }

    #[test]
    fn system_wildcard_matches_every_component() {
        let mut table = RouteTable::new();
        table.learn(1, 1, key("a"));
        table.learn(1, 2, key("b"));
        table.learn(2, 1, key("c"));

        let routes = table.resolve(Destination::System(1));
        assert_eq!(routes.len(), 2);
        assert!(routes.contains(&key("a")));
        assert!(routes.contains(&key("b")));
    }

    #[test]
    fn component_wildcard_matches_every_system() {
        let mut table = RouteTable::new();
        table.learn(1, 1, key("a"));
        table.learn(2, 1, key("b"));
        table.learn(2, 2, key("c"));

        let routes = table.resolve(Destination::Component(1));
        assert_eq!(routes.len(), 2);
        assert!(routes.contains(&key("a")));
        assert!(routes.contains(&key("b")));
    }

    #[test]
    fn exact_target_resolves_to_one_connection() {
        let mut table = RouteTable::new();
        table.learn(1, 1, key("a"));
        table.learn(1, 2, key("b"));

        let routes = table.resolve(Destination::SystemComponent(1, 2));
        assert_eq!(routes.len(), 1);
        assert!(routes.contains(&key("b")));
    }

    #[test]
    fn matching_routes_behind_one_connection_deduplicate() {
        let mut table = RouteTable::new();
        table.learn(1, 1, key("a"));
        table.learn(1, 2, key("a"));

        let routes = table.resolve(Destination::System(1));
        assert_eq!(routes.len(), 1);
    }

    #[test]
    fn unknown_target_resolves_empty() {
        let table = RouteTable::new();
        assert!(table.resolve(Destination::SystemComponent(9, 9)).is_empty());
    }

    #[test]
    fn forgetting_a_connection_drops_its_routes() {
        let mut table = RouteTable::new();
        table.learn(1, 1, key("a"));
        table.learn(2, 1, key("b"));
        table.forget_connection(&key("a"));
        assert_eq!(table.len(), 1);
        assert_eq!(table.lookup(2, 1), Some(&key("b")));
    }
}
