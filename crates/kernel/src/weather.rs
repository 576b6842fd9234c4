use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use wayfarer_common::{ResourceRef, Value};

/// A live weather effect instance.
pub trait Weather: Send {
    /// Forward new server arguments to the effect.
    fn update(&mut self, args: &[Value]);
    /// Advance the effect by `dt` wall-clock seconds.
    fn tick(&mut self, dt: f64);
}

/// Shared handle to a live weather effect.
pub type WeatherHandle = Arc<Mutex<dyn Weather>>;

/// Constructs weather effects of one implementation type.
pub trait WeatherFactory: Send + Sync {
    fn instantiate(&self, args: &[Value]) -> WeatherHandle;
}

/// The backing resource has not finished loading yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("resource {0} is still loading")]
pub struct Loading(pub ResourceRef);

/// Looks up the effect implementation published by a resource.
pub trait ResourceProvider: Send + Sync {
    fn weather_factory(&self, res: ResourceRef) -> Result<Arc<dyn WeatherFactory>, Loading>;
}

enum WeatherEntry {
    /// Server arguments waiting for the resource to load.
    Pending(Vec<Value>),
    Live(WeatherHandle),
}

/// Weather effects keyed by resource, upgraded from raw server arguments to
/// live instances on first successful query.
#[derive(Default)]
pub struct WeatherMap {
    entries: BTreeMap<ResourceRef, WeatherEntry>,
}

impl std::fmt::Debug for WeatherMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeatherMap")
            .field("pending", &self.pending_count())
            .field("live", &self.live_count())
            .finish()
    }
}

impl WeatherMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one weather batch from the server.
    ///
    /// Entries for live effects are forwarded to them; anything else is
    /// stored for later instantiation. A full batch also removes every
    /// effect it does not mention.
    pub fn apply(&mut self, incremental: bool, batch: Vec<(ResourceRef, Vec<Value>)>) {
        let mut untouched: Vec<ResourceRef> = if incremental {
            Vec::new()
        } else {
            self.entries.keys().copied().collect()
        };
        for (res, args) in batch {
            match self.entries.get_mut(&res) {
                Some(WeatherEntry::Live(effect)) => effect.lock().update(&args),
                _ => {
                    self.entries.insert(res, WeatherEntry::Pending(args));
                }
            }
            untouched.retain(|r| *r != res);
        }
        for res in untouched {
            tracing::debug!(%res, "weather effect ended");
            self.entries.remove(&res);
        }
    }

    /// Drop one effect regardless of state. Returns whether it existed.
    pub fn remove(&mut self, res: ResourceRef) -> bool {
        self.entries.remove(&res).is_some()
    }

    /// Live effects, instantiating pending entries whose resources are ready.
    /// Entries still loading are skipped and retried on the next call.
    pub fn effects(&mut self, provider: &dyn ResourceProvider) -> Vec<WeatherHandle> {
        let mut ret = Vec::with_capacity(self.entries.len());
        for (res, entry) in self.entries.iter_mut() {
            match entry {
                WeatherEntry::Live(effect) => ret.push(effect.clone()),
                WeatherEntry::Pending(args) => match provider.weather_factory(*res) {
                    Ok(factory) => {
                        let effect = factory.instantiate(args);
                        tracing::debug!(%res, "instantiated weather effect");
                        ret.push(effect.clone());
                        *entry = WeatherEntry::Live(effect);
                    }
                    Err(Loading(_)) => {
                        tracing::trace!(%res, "weather resource still loading");
                    }
                },
            }
        }
        ret
    }

    pub fn tick(&mut self, dt: f64) {
        for entry in self.entries.values() {
            if let WeatherEntry::Live(effect) = entry {
                effect.lock().tick(dt);
            }
        }
    }

    pub fn contains(&self, res: ResourceRef) -> bool {
        self.entries.contains_key(&res)
    }

    pub fn is_live(&self, res: ResourceRef) -> bool {
        matches!(self.entries.get(&res), Some(WeatherEntry::Live(_)))
    }

    pub fn keys(&self) -> impl Iterator<Item = ResourceRef> + '_ {
        self.entries.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn pending_count(&self) -> usize {
        self.entries
            .values()
            .filter(|e| matches!(e, WeatherEntry::Pending(_)))
            .count()
    }

    pub fn live_count(&self) -> usize {
        self.len() - self.pending_count()
    }
}
