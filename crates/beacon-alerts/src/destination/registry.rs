//! Name → destination lookup.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info};

use super::{Destination, DestinationConfig, DestinationFactory};
use crate::error::{ConfigError, RegistryError};

/// Owns every destination by name.
///
/// Lookups take a shared lock and hand out `Arc` clones, so no lock is held
/// while a destination is sending. Registration takes the exclusive lock.
#[derive(Debug, Default)]
pub struct DestinationRegistry {
    destinations: RwLock<HashMap<String, Arc<dyn Destination>>>,
}

impl DestinationRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds and registers every declared destination.
    ///
    /// Names must be unique. Nothing is registered unless every destination
    /// builds. Returns the number of destinations registered.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::DuplicateDestination`] for the first repeated
    /// name, or [`ConfigError::DestinationCreation`] naming the first
    /// destination that failed to build.
    pub fn load_from_config(
        &self,
        configs: &[DestinationConfig],
        factory: &DestinationFactory,
    ) -> Result<usize, ConfigError> {
        let mut seen = HashSet::new();
        if let Some(config) = configs.iter().find(|config| !seen.insert(config.name())) {
            return Err(ConfigError::DuplicateDestination {
                name: config.name().to_string(),
            });
        }

        let built = configs
            .iter()
            .map(|config| {
                factory
                    .create(config)
                    .map(|destination| (config.name().to_string(), destination))
                    .map_err(|e| ConfigError::DestinationCreation {
                        kind: config.kind(),
                        name: config.name().to_string(),
                        source: Box::new(e),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let count = built.len();
        let mut destinations = self.destinations.write();
        for (name, destination) in built {
            info!(destination = %name, kind = destination.kind(), "registered destination");
            destinations.insert(name, destination);
        }
        Ok(count)
    }

    /// Registers a destination, replacing any existing one with the same name.
    pub fn register(&self, name: impl Into<String>, destination: Arc<dyn Destination>) {
        let name = name.into();
        let kind = destination.kind();
        let replaced = self
            .destinations
            .write()
            .insert(name.clone(), destination)
            .is_some();
        info!(destination = %name, kind, replaced, "registered destination");
    }

    /// Looks up one destination.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] if nothing is registered under `name`.
    pub fn get(&self, name: &str) -> Result<Arc<dyn Destination>, RegistryError> {
        self.destinations
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound {
                name: name.to_string(),
            })
    }

    /// Looks up several destinations, preserving order.
    ///
    /// All or nothing: the first missing name fails the whole lookup.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] for the first missing name.
    pub fn get_many(&self, names: &[String]) -> Result<Vec<Arc<dyn Destination>>, RegistryError> {
        let destinations = self.destinations.read();
        let found = names
            .iter()
            .map(|name| {
                destinations
                    .get(name)
                    .cloned()
                    .ok_or_else(|| RegistryError::NotFound { name: name.clone() })
            })
            .collect::<Result<Vec<_>, _>>()?;
        debug!(count = found.len(), "resolved destinations");
        Ok(found)
    }

    /// Returns true if a destination is registered under `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.destinations.read().contains_key(name)
    }

    /// Returns the registered names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.destinations.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Returns the number of registered destinations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.destinations.read().len()
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.destinations.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::destination::testing::RecordingDestination;
    use crate::destination::SlackDestinationConfig;

    fn slack(name: &str, api_key: &str) -> DestinationConfig {
        DestinationConfig::Slack(SlackDestinationConfig::new(name, api_key, "#alerts"))
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(ToString::to_string).collect()
    }

    mod load_tests {
        use super::*;

        #[test]
        fn loads_every_destination() {
            let registry = DestinationRegistry::new();
            let count = registry
                .load_from_config(
                    &[slack("ops", "xoxb-1"), slack("sre", "xoxb-2")],
                    &DestinationFactory::new(),
                )
                .unwrap();

            assert_eq!(count, 2);
            assert_eq!(registry.names(), vec!["ops", "sre"]);
        }

        #[test]
        fn one_bad_destination_registers_nothing() {
            let registry = DestinationRegistry::new();
            let err = registry
                .load_from_config(
                    &[slack("ops", "xoxb-1"), slack("broken", "")],
                    &DestinationFactory::new(),
                )
                .unwrap_err();

            assert!(registry.is_empty());
            assert!(matches!(
                err,
                ConfigError::DestinationCreation { ref name, .. } if name == "broken"
            ));
            assert!(err.to_string().contains("failed to create slack destination 'broken'"));
        }
    }

    mod duplicate_tests {
        use super::*;

        #[test]
        fn duplicate_names_are_rejected() {
            let registry = DestinationRegistry::new();
            let err = registry
                .load_from_config(
                    &[slack("ops", "xoxb-1"), slack("sre", "xoxb-2"), slack("ops", "xoxb-3")],
                    &DestinationFactory::new(),
                )
                .unwrap_err();

            assert_eq!(
                err,
                ConfigError::DuplicateDestination {
                    name: "ops".to_string()
                }
            );
            assert_eq!(err.to_string(), "duplicate destination name 'ops'");
            assert!(registry.is_empty());
        }
    }

    mod lookup_tests {
        use super::*;

        fn registry() -> DestinationRegistry {
            let registry = DestinationRegistry::new();
            registry.register("a", Arc::new(RecordingDestination::new("a")));
            registry.register("b", Arc::new(RecordingDestination::new("b")));
            registry
        }

        #[test]
        fn get_known_and_unknown() {
            let registry = registry();
            assert_eq!(registry.get("a").unwrap().name(), "a");
            assert_eq!(
                registry.get("zzz").unwrap_err(),
                RegistryError::NotFound {
                    name: "zzz".to_string()
                }
            );
        }

        #[test]
        fn get_many_preserves_order() {
            let found = registry().get_many(&names(&["b", "a"])).unwrap();
            let found: Vec<_> = found.iter().map(|d| d.name().to_string()).collect();
            assert_eq!(found, vec!["b", "a"]);
        }

        #[test]
        fn get_many_is_all_or_nothing() {
            let err = registry()
                .get_many(&names(&["a", "missing", "b"]))
                .unwrap_err();
            assert_eq!(
                err,
                RegistryError::NotFound {
                    name: "missing".to_string()
                }
            );
        }

        #[test]
        fn register_overwrites() {
            let registry = registry();
            registry.register("a", Arc::new(RecordingDestination::new("a-v2")));
            assert_eq!(registry.len(), 2);
            assert_eq!(registry.get("a").unwrap().name(), "a-v2");
        }
    }

    #[test]
    fn concurrent_lookups_and_registration() {
        let registry = Arc::new(DestinationRegistry::new());
        registry.register("seed", Arc::new(RecordingDestination::new("seed")));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    let name = format!("d{i}");
                    registry.register(name.clone(), Arc::new(RecordingDestination::new(&name)));
                    assert!(registry.get("seed").is_ok());
                    assert!(registry.contains(&name));
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(registry.len(), 9);
    }
}
