//! Static plugin registry: a child binary links this crate and this
//! module's `HashMap` is built once at process start from a compile-time
//! list of constructors — no dynamic loading, no `dlopen`.

use crate::plugins;
use plugin_runtime_sdk::plugin::Plugin;
use std::collections::HashMap;
use std::sync::Arc;

type Constructor = fn() -> Arc<dyn Plugin>;

/// Build the registry of plugins this child binary links. A package's
/// declared entry points (from its `entry_points.toml`) are matched against
/// this registry by name at dispatch time; a name with no match fails with
/// `PluginEntryNotFound`.
pub fn builtin_registry() -> HashMap<&'static str, Constructor> {
    let mut map: HashMap<&'static str, Constructor> = HashMap::new();
    map.insert("echo", || Arc::new(plugins::echo::EchoPlugin));
    map.insert("time", || Arc::new(plugins::time::TimePlugin));
    map
}

pub struct Registry {
    entries: HashMap<&'static str, Constructor>,
}

impl Registry {
    pub fn new() -> Self {
        Registry { entries: builtin_registry() }
    }

    pub fn load(&self, name: &str) -> Option<Arc<dyn Plugin>> {
        self.entries.get(name).map(|ctor| ctor())
    }

    pub fn list_names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.entries.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_builtin_plugins_by_name() {
        let registry = Registry::new();
        assert!(registry.load("echo").is_some());
        assert!(registry.load("time").is_some());
        assert!(registry.load("does-not-exist").is_none());
    }

    #[test]
    fn list_names_is_sorted() {
        let registry = Registry::new();
        assert_eq!(registry.list_names(), vec!["echo", "time"]);
    }
}
