//! Dynamic Examples Cache
//!
//! Maps a named data source (`block_ids`, `entity_ids`, ...) to example
//! values used by completion. Entries expire after a fixed TTL and are
//! refreshed lazily on the next lookup; nothing is evicted in the background.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::error::{Result, SchemaError};

/// Default freshness window
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

/// Supplier of game content identifiers
pub trait ContentProvider {
    fn block_ids(&self) -> Result<Vec<String>>;
    fn entity_ids(&self) -> Result<Vec<String>>;
    fn item_ids(&self) -> Result<Vec<String>>;
    fn biome_ids(&self) -> Result<Vec<String>>;
}

/// Known example sources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExampleSource {
    BlockIds,
    EntityIds,
    ItemIds,
    BiomeIds,
}

impl ExampleSource {
    pub fn name(&self) -> &'static str {
        match self {
            Self::BlockIds => "block_ids",
            Self::EntityIds => "entity_ids",
            Self::ItemIds => "item_ids",
            Self::BiomeIds => "biome_ids",
        }
    }

    fn fetch(&self, provider: &dyn ContentProvider) -> Result<Vec<String>> {
        match self {
            Self::BlockIds => provider.block_ids(),
            Self::EntityIds => provider.entity_ids(),
            Self::ItemIds => provider.item_ids(),
            Self::BiomeIds => provider.biome_ids(),
        }
    }
}

impl FromStr for ExampleSource {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "block_ids" => Ok(Self::BlockIds),
            "entity_ids" => Ok(Self::EntityIds),
            "item_ids" => Ok(Self::ItemIds),
            "biome_ids" => Ok(Self::BiomeIds),
            other => Err(SchemaError::UnknownSource(other.to_string())),
        }
    }
}

impl fmt::Display for ExampleSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Source of the current time
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    data: Vec<String>,
    timestamp: DateTime<Utc>,
}

/// TTL cache in front of a [`ContentProvider`]
pub struct DynamicExamplesCache {
    provider: Box<dyn ContentProvider>,
    clock: Box<dyn Clock>,
    ttl: Duration,
    entries: HashMap<ExampleSource, CacheEntry>,
}

impl DynamicExamplesCache {
    pub fn new(provider: impl ContentProvider + 'static) -> Self {
        Self {
            provider: Box::new(provider),
            clock: Box::new(SystemClock),
            ttl: DEFAULT_TTL,
            entries: HashMap::new(),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Examples for several sources, concatenated and deduplicated
    ///
    /// Unknown names and failing providers contribute nothing.
    pub fn get_examples(&mut self, sources: &[&str]) -> Vec<String> {
        let mut combined: Vec<String> = Vec::new();
        for name in sources {
            for value in self.get_source(name) {
                if !combined.contains(&value) {
                    combined.push(value);
                }
            }
        }
        combined
    }

    /// Examples for one named source
    pub fn get_source(&mut self, name: &str) -> Vec<String> {
        match name.parse::<ExampleSource>() {
            Ok(source) => self.get(source),
            Err(e) => {
                warn!(source = name, "{}", e);
                Vec::new()
            }
        }
    }

    /// Examples for one source, refreshing an expired entry
    pub fn get(&mut self, source: ExampleSource) -> Vec<String> {
        let now = self.clock.now();

        if let Some(entry) = self.entries.get(&source) {
            // A timestamp in the future (clock moved back) still counts as fresh
            let fresh = now
                .signed_duration_since(entry.timestamp)
                .to_std()
                .map(|age| age < self.ttl)
                .unwrap_or(true);
            if fresh {
                return entry.data.clone();
            }
            self.entries.remove(&source);
        }

        match source.fetch(self.provider.as_ref()) {
            Ok(data) => {
                debug!(source = %source, count = data.len(), "refreshed examples");
                self.entries.insert(
                    source,
                    CacheEntry {
                        data: data.clone(),
                        timestamp: now,
                    },
                );
                data
            }
            Err(e) => {
                warn!(source = %source, error = %e, "content provider failed");
                Vec::new()
            }
        }
    }

    /// Drop every entry
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for DynamicExamplesCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamicExamplesCache")
            .field("ttl", &self.ttl)
            .field("entries", &self.entries.len())
            .finish()
    }
}

/// Fixed lists of common vanilla identifiers
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticContentProvider;

fn to_strings(ids: &[&str]) -> Vec<String> {
    ids.iter().map(|id| id.to_string()).collect()
}

impl ContentProvider for StaticContentProvider {
    fn block_ids(&self) -> Result<Vec<String>> {
        Ok(to_strings(&[
            "minecraft:air",
            "minecraft:stone",
            "minecraft:grass",
            "minecraft:dirt",
            "minecraft:cobblestone",
            "minecraft:planks",
            "minecraft:sand",
            "minecraft:gravel",
            "minecraft:oak_log",
            "minecraft:glass",
            "minecraft:water",
            "minecraft:lava",
        ]))
    }

    fn entity_ids(&self) -> Result<Vec<String>> {
        Ok(to_strings(&[
            "minecraft:pig",
            "minecraft:cow",
            "minecraft:sheep",
            "minecraft:chicken",
            "minecraft:zombie",
            "minecraft:skeleton",
            "minecraft:creeper",
            "minecraft:villager_v2",
            "minecraft:player",
        ]))
    }

    fn item_ids(&self) -> Result<Vec<String>> {
        Ok(to_strings(&[
            "minecraft:apple",
            "minecraft:bread",
            "minecraft:diamond",
            "minecraft:iron_ingot",
            "minecraft:stick",
            "minecraft:wooden_sword",
            "minecraft:bow",
            "minecraft:arrow",
        ]))
    }

    fn biome_ids(&self) -> Result<Vec<String>> {
        Ok(to_strings(&[
            "plains",
            "desert",
            "forest",
            "taiga",
            "swampland",
            "jungle",
            "ocean",
            "the_end",
            "hell",
        ]))
    }
}
