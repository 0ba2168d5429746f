//! Identity resolution for human-supplied references.
//!
//! # Design
//! - Outcomes are an explicit [`Resolution`] rather than an empty entity.
//! - Short identifiers match by unique prefix of the canonical UUID, in either
//!   hyphenated or simple form.
//! - [`IdentityCache`] lives for one command invocation. Each key space is
//!   cached independently; every resolved entity is also stored under its
//!   canonical id so later id lookups never hit the network.

use std::collections::HashMap;
use std::fmt;

use kosh_api_models::{HardwareProduct, Rack, RackRole, Room};
use tracing::debug;
use uuid::Uuid;

use crate::api::Inventory;
use crate::client::ResourceClient;
use crate::error::{CoreError, CoreResult, ErrorCategory};

/// Kinds of entity the resolver understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    /// Hardware product.
    HardwareProduct,
    /// Rack.
    Rack,
    /// Datacenter room.
    Room,
    /// Rack role.
    RackRole,
}

impl EntityKind {
    /// Lower-case label used in messages and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::HardwareProduct => "hardware product",
            Self::Rack => "rack",
            Self::Room => "room",
            Self::RackRole => "rack role",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Key space a lookup string belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeySpace {
    /// Canonical UUID.
    Id,
    /// UUID prefix.
    ShortId,
    /// Entity name.
    Name,
    /// Entity alias.
    Alias,
}

/// Outcome of matching a reference against candidates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution<T> {
    /// Exactly one candidate matched.
    Found(T),
    /// No candidate matched.
    NotFound,
    /// Several candidates matched.
    Ambiguous {
        /// Number of matching candidates.
        matches: usize,
    },
}

impl<T> Resolution<T> {
    /// Transform the found value.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Resolution<U> {
        match self {
            Self::Found(value) => Resolution::Found(f(value)),
            Self::NotFound => Resolution::NotFound,
            Self::Ambiguous { matches } => Resolution::Ambiguous { matches },
        }
    }

    /// Fall back to another matcher only when nothing matched.
    pub fn or_else(self, f: impl FnOnce() -> Self) -> Self {
        match self {
            Self::NotFound => f(),
            other => other,
        }
    }

    /// Convert into a [`CoreResult`], naming the lookup on failure.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotFound`] or [`CoreError::Ambiguous`].
    pub fn into_result(self, kind: EntityKind, key: &str) -> CoreResult<T> {
        match self {
            Self::Found(value) => Ok(value),
            Self::NotFound => Err(CoreError::NotFound {
                kind,
                key: key.to_string(),
            }),
            Self::Ambiguous { matches } => Err(CoreError::Ambiguous {
                kind,
                key: key.to_string(),
                matches,
            }),
        }
    }
}

fn settle<T>(mut hits: Vec<T>) -> Resolution<T> {
    match hits.len() {
        0 => Resolution::NotFound,
        1 => hits.pop().map_or(Resolution::NotFound, Resolution::Found),
        matches => Resolution::Ambiguous { matches },
    }
}

/// Match `key` as a prefix of each candidate's canonical UUID.
///
/// Comparison is case-insensitive and accepts either the hyphenated or the
/// simple (unhyphenated) form. An empty key never matches.
pub fn match_prefix<'c, T: Identified>(key: &str, candidates: &'c [T]) -> Resolution<&'c T> {
    let needle = key.trim().to_ascii_lowercase();
    if needle.is_empty() {
        return Resolution::NotFound;
    }
    settle(
        candidates
            .iter()
            .filter(|candidate| {
                let id = candidate.id();
                id.hyphenated().to_string().starts_with(&needle)
                    || id.simple().to_string().starts_with(&needle)
            })
            .collect(),
    )
}

/// Match `key` exactly against a label extracted from each candidate.
pub fn match_exact<'c, T>(
    key: &str,
    candidates: &'c [T],
    label: impl Fn(&T) -> &str,
) -> Resolution<&'c T> {
    settle(
        candidates
            .iter()
            .filter(|candidate| label(*candidate) == key)
            .collect(),
    )
}

/// Entity stored in the [`IdentityCache`].
#[derive(Debug, Clone)]
pub enum CachedEntity {
    /// Hardware product.
    HardwareProduct(HardwareProduct),
    /// Rack.
    Rack(Rack),
    /// Room.
    Room(Room),
    /// Rack role.
    RackRole(RackRole),
}

/// Entities with a canonical UUID that the resolver can cache.
pub trait Identified: Clone {
    /// Entity kind used in cache keys and errors.
    const KIND: EntityKind;

    /// Canonical identifier.
    fn id(&self) -> Uuid;

    /// Wrap into a cache entry.
    fn into_cached(self) -> CachedEntity;

    /// Borrow back out of a cache entry of the matching kind.
    fn from_cached(entity: &CachedEntity) -> Option<&Self>;
}

macro_rules! identified {
    ($ty:ty, $variant:ident) => {
        impl Identified for $ty {
            const KIND: EntityKind = EntityKind::$variant;

            fn id(&self) -> Uuid {
                self.id
            }

            fn into_cached(self) -> CachedEntity {
                CachedEntity::$variant(self)
            }

            fn from_cached(entity: &CachedEntity) -> Option<&Self> {
                match entity {
                    CachedEntity::$variant(inner) => Some(inner),
                    _ => None,
                }
            }
        }
    };
}

identified!(HardwareProduct, HardwareProduct);
identified!(Rack, Rack);
identified!(Room, Room);
identified!(RackRole, RackRole);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    kind: EntityKind,
    space: KeySpace,
    raw: String,
}

/// Per-invocation memo of resolved entities keyed by (kind, key space, raw key).
#[derive(Debug, Default)]
pub struct IdentityCache {
    entries: HashMap<CacheKey, CachedEntity>,
}

impl IdentityCache {
    /// Empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a previously resolved entity.
    #[must_use]
    pub fn get<T: Identified>(&self, space: KeySpace, raw: &str) -> Option<T> {
        let key = CacheKey {
            kind: T::KIND,
            space,
            raw: raw.to_string(),
        };
        let hit = self.entries.get(&key).and_then(T::from_cached).cloned();
        if hit.is_some() {
            debug!(kind = %T::KIND, ?space, key = raw, "identity cache hit");
        }
        hit
    }

    /// Record an entity under `(space, raw)` and under its canonical id.
    pub fn insert<T: Identified>(&mut self, space: KeySpace, raw: &str, entity: &T) {
        let canonical = CacheKey {
            kind: T::KIND,
            space: KeySpace::Id,
            raw: entity.id().to_string(),
        };
        self.entries
            .insert(canonical, entity.clone().into_cached());
        if space != KeySpace::Id {
            self.entries.insert(
                CacheKey {
                    kind: T::KIND,
                    space,
                    raw: raw.to_string(),
                },
                entity.clone().into_cached(),
            );
        }
    }

    /// Number of cached entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when nothing has been cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Resolves references through an [`Inventory`], memoising into an
/// [`IdentityCache`] owned for the lifetime of one command.
pub struct Resolver<'a, C: ?Sized> {
    inventory: Inventory<'a, C>,
    cache: IdentityCache,
}

impl<'a, C: ResourceClient + ?Sized> Resolver<'a, C> {
    /// Resolver with an empty cache.
    #[must_use]
    pub fn new(inventory: Inventory<'a, C>) -> Self {
        Self {
            inventory,
            cache: IdentityCache::new(),
        }
    }

    /// Inventory the resolver queries.
    #[must_use]
    pub fn inventory(&self) -> Inventory<'a, C> {
        self.inventory
    }

    /// Cache populated so far.
    #[must_use]
    pub const fn cache(&self) -> &IdentityCache {
        &self.cache
    }

    /// Resolve a hardware product by canonical id.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotFound`] on 404 and [`CoreError::Remote`] on any
    /// other client failure.
    pub async fn product_by_id(&mut self, id: Uuid) -> CoreResult<HardwareProduct> {
        let raw = id.to_string();
        if let Some(hit) = self.cache.get(KeySpace::Id, &raw) {
            return Ok(hit);
        }
        let product = self.inventory.hardware_product(id).await.map_err(|err| {
            CoreError::lookup(EntityKind::HardwareProduct, &raw, "fetch hardware product", err)
        })?;
        self.cache.insert(KeySpace::Id, &raw, &product);
        Ok(product)
    }

    /// Resolve a hardware product by name.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotFound`] on 404 and [`CoreError::Remote`] on any
    /// other client failure.
    pub async fn product_by_name(&mut self, name: &str) -> CoreResult<HardwareProduct> {
        if let Some(hit) = self.cache.get(KeySpace::Name, name) {
            return Ok(hit);
        }
        let product = self
            .inventory
            .hardware_product_by_name(name)
            .await
            .map_err(|err| {
                CoreError::lookup(EntityKind::HardwareProduct, name, "fetch hardware product", err)
            })?;
        self.cache.insert(KeySpace::Name, name, &product);
        Ok(product)
    }

    /// Resolve a hardware product by alias.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotFound`] on 404 and [`CoreError::Remote`] on any
    /// other client failure.
    pub async fn product_by_alias(&mut self, alias: &str) -> CoreResult<HardwareProduct> {
        if let Some(hit) = self.cache.get(KeySpace::Alias, alias) {
            return Ok(hit);
        }
        let product = self
            .inventory
            .hardware_product_by_alias(alias)
            .await
            .map_err(|err| {
                CoreError::lookup(EntityKind::HardwareProduct, alias, "fetch hardware product", err)
            })?;
        self.cache.insert(KeySpace::Alias, alias, &product);
        Ok(product)
    }

    /// Resolve a hardware product by unique UUID prefix.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotFound`], [`CoreError::Ambiguous`], or
    /// [`CoreError::Remote`] when the product listing fails.
    pub async fn product_by_short_id(&mut self, prefix: &str) -> CoreResult<HardwareProduct> {
        if let Some(hit) = self.cache.get(KeySpace::ShortId, prefix) {
            return Ok(hit);
        }
        let products = self
            .inventory
            .hardware_products()
            .await
            .map_err(|err| CoreError::remote("list hardware products", err))?;
        let product = match_prefix(prefix, &products)
            .into_result(EntityKind::HardwareProduct, prefix)?
            .clone();
        self.cache.insert(KeySpace::ShortId, prefix, &product);
        Ok(product)
    }

    /// Resolve a hardware product from a full UUID, a name, an alias, or a
    /// unique UUID prefix, in that order.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotFound`] when no form matches,
    /// [`CoreError::Ambiguous`] for a shared prefix, or [`CoreError::Remote`].
    pub async fn product(&mut self, key: &str) -> CoreResult<HardwareProduct> {
        let key = key.trim();
        if let Ok(id) = Uuid::parse_str(key) {
            return self.product_by_id(id).await;
        }
        match self.product_by_name(key).await {
            Err(err) if err.category() == ErrorCategory::NotFound => {}
            found => return found,
        }
        match self.product_by_alias(key).await {
            Err(err) if err.category() == ErrorCategory::NotFound => {}
            found => return found,
        }
        self.product_by_short_id(key).await
    }

    /// Resolve a rack from a full UUID, a unique UUID prefix, or a name.
    ///
    /// A full UUID is fetched directly. Anything else is matched against the
    /// rack listing by prefix first and by exact name when no prefix matches.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotFound`], [`CoreError::Ambiguous`], or
    /// [`CoreError::Remote`].
    pub async fn rack(&mut self, key: &str) -> CoreResult<Rack> {
        let key = key.trim();
        if let Ok(id) = Uuid::parse_str(key) {
            let raw = id.to_string();
            if let Some(hit) = self.cache.get(KeySpace::Id, &raw) {
                return Ok(hit);
            }
            let rack = self
                .inventory
                .rack(id)
                .await
                .map_err(|err| CoreError::lookup(EntityKind::Rack, key, "fetch rack", err))?;
            self.cache.insert(KeySpace::Id, &raw, &rack);
            return Ok(rack);
        }
        if let Some(hit) = self.cached_by_short_id_or_name(key) {
            return Ok(hit);
        }

        let racks = self
            .inventory
            .racks()
            .await
            .map_err(|err| CoreError::remote("list racks", err))?;
        self.pick(key, &racks, |rack| rack.name.as_str(), KeySpace::Name)
    }

    /// Resolve a room from a UUID, a unique UUID prefix, or its alias.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotFound`], [`CoreError::Ambiguous`], or
    /// [`CoreError::Remote`].
    pub async fn room(&mut self, key: &str) -> CoreResult<Room> {
        let key = key.trim();
        if let Some(hit) = self.cached_any(key, KeySpace::Alias) {
            return Ok(hit);
        }
        let rooms = self
            .inventory
            .rooms()
            .await
            .map_err(|err| CoreError::remote("list rooms", err))?;
        self.pick(key, &rooms, |room| room.alias.as_str(), KeySpace::Alias)
    }

    /// Resolve a rack role from a UUID, a unique UUID prefix, or its name.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotFound`], [`CoreError::Ambiguous`], or
    /// [`CoreError::Remote`].
    pub async fn rack_role(&mut self, key: &str) -> CoreResult<RackRole> {
        let key = key.trim();
        if let Some(hit) = self.cached_any(key, KeySpace::Name) {
            return Ok(hit);
        }
        let roles = self
            .inventory
            .rack_roles()
            .await
            .map_err(|err| CoreError::remote("list rack roles", err))?;
        self.pick(key, &roles, |role| role.name.as_str(), KeySpace::Name)
    }

    fn cached_by_short_id_or_name<T: Identified>(&self, key: &str) -> Option<T> {
        self.cache
            .get(KeySpace::ShortId, key)
            .or_else(|| self.cache.get(KeySpace::Name, key))
    }

    fn cached_any<T: Identified>(&self, key: &str, label_space: KeySpace) -> Option<T> {
        match Uuid::parse_str(key) {
            Ok(id) => self.cache.get(KeySpace::Id, &id.to_string()),
            Err(_) => self
                .cache
                .get(KeySpace::ShortId, key)
                .or_else(|| self.cache.get(label_space, key)),
        }
    }

    /// Match a listing by exact id, then unique prefix, then exact label, and
    /// cache the winner under the key space that matched.
    fn pick<T: Identified>(
        &mut self,
        key: &str,
        candidates: &[T],
        label: impl Fn(&T) -> &str,
        label_space: KeySpace,
    ) -> CoreResult<T> {
        if let Ok(id) = Uuid::parse_str(key) {
            let found = candidates
                .iter()
                .find(|candidate| candidate.id() == id)
                .cloned();
            return match found {
                Some(entity) => {
                    self.cache.insert(KeySpace::Id, &id.to_string(), &entity);
                    Ok(entity)
                }
                None => Err(CoreError::NotFound {
                    kind: T::KIND,
                    key: key.to_string(),
                }),
            };
        }

        let by_prefix = match_prefix(key, candidates).map(|hit| (KeySpace::ShortId, hit));
        let (space, entity) = by_prefix
            .or_else(|| match_exact(key, candidates, &label).map(|hit| (label_space, hit)))
            .into_result(T::KIND, key)?;
        let entity = entity.clone();
        self.cache.insert(space, key, &entity);
        Ok(entity)
    }
}
