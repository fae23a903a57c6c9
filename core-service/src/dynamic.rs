//! Dynamic property providers.
//!
//! A provider is a host callback that returns JSON object text describing the
//! player's current state (level, coins, scene). The registry holds one
//! provider per instance id and runs it on every tracked event.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Produces the dynamic properties of one instance.
///
/// The returned text is forwarded as-is; it is not validated here.
pub trait DynamicPropertyProvider: Send + Sync {
    fn properties(&self) -> String;
}

impl<F> DynamicPropertyProvider for F
where
    F: Fn() -> String + Send + Sync,
{
    fn properties(&self) -> String {
        self()
    }
}

/// Instance id to provider table.
///
/// Registering replaces any earlier provider for the same id. Providers are
/// never removed. The lock is held only to look up or store a provider; the
/// provider itself runs unlocked, so it may call back into the registry.
#[derive(Default)]
pub struct DynamicPropertyRegistry {
    providers: Mutex<HashMap<String, Arc<dyn DynamicPropertyProvider>>>,
}

impl DynamicPropertyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<P>(&self, instance_id: impl Into<String>, provider: P)
    where
        P: DynamicPropertyProvider + 'static,
    {
        self.register_arc(instance_id, Arc::new(provider));
    }

    pub fn register_arc(
        &self,
        instance_id: impl Into<String>,
        provider: Arc<dyn DynamicPropertyProvider>,
    ) {
        let instance_id = instance_id.into();
        if self.providers().insert(instance_id.clone(), provider).is_some() {
            tracing::debug!(app_id = %instance_id, "Replaced dynamic property provider");
        }
    }

    /// Run the provider registered for `instance_id`, or return an empty
    /// string when there is none.
    pub fn resolve(&self, instance_id: &str) -> String {
        let provider = self.providers().get(instance_id).cloned();
        match provider {
            Some(provider) => provider.properties(),
            None => String::new(),
        }
    }

    /// Run the provider of the first id in `instance_ids` that has one.
    pub fn resolve_first<'a>(&self, instance_ids: impl IntoIterator<Item = &'a str>) -> String {
        let provider = {
            let providers = self.providers();
            instance_ids
                .into_iter()
                .find_map(|id| providers.get(id).cloned())
        };
        match provider {
            Some(provider) => provider.properties(),
            None => String::new(),
        }
    }

    pub fn contains(&self, instance_id: &str) -> bool {
        self.providers().contains_key(instance_id)
    }

    pub fn len(&self) -> usize {
        self.providers().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn providers(&self) -> MutexGuard<'_, HashMap<String, Arc<dyn DynamicPropertyProvider>>> {
        self.providers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for DynamicPropertyRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ids: Vec<String> = self.providers().keys().cloned().collect();
        ids.sort();
        f.debug_struct("DynamicPropertyRegistry")
            .field("instances", &ids)
            .finish()
    }
}
