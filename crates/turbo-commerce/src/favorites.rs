//! Favorited products, partitioned per identity.
//!
//! The active namespace's set is held in memory and written through to both
//! backends after every mutation. Guest favorites are copied (never moved)
//! into a user's namespace on login when that namespace is still empty.

use crate::catalog::Catalog;
use crate::error::CommerceError;
use crate::ids::ProductId;
use crate::namespace::Namespace;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use turbo_cache::{cache_key, Backends, Credential, Persist, SafeSerializer};
use turbo_data::{FavoriteToggle, ReconciliationClient, RemoteError};

const FAVORITES_PREFIX: &str = "favorites";

/// A favorited product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FavoriteEntry {
    /// Product id.
    pub product_id: ProductId,
    /// Product name (denormalized for display).
    pub product_name: String,
    /// When the product was favorited (Unix timestamp).
    pub added_at: i64,
}

impl FavoriteEntry {
    /// Create an entry stamped with the current time.
    pub fn new(product_id: ProductId, product_name: impl Into<String>) -> Self {
        Self {
            product_id,
            product_name: product_name.into(),
            added_at: chrono::Utc::now().timestamp(),
        }
    }
}

/// Favorites of one namespace, unique by product id, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FavoriteSet {
    entries: Vec<FavoriteEntry>,
}

impl FavoriteSet {
    /// Check if a product is favorited.
    pub fn contains(&self, product_id: &ProductId) -> bool {
        self.entries.iter().any(|e| &e.product_id == product_id)
    }

    /// Add an entry. Re-adding an existing product is a no-op.
    ///
    /// Returns `true` if the entry was added.
    pub fn insert(&mut self, entry: FavoriteEntry) -> bool {
        if self.contains(&entry.product_id) {
            return false;
        }
        self.entries.push(entry);
        true
    }

    /// Remove a product. Returns `true` if it was present.
    pub fn remove(&mut self, product_id: &ProductId) -> bool {
        let len_before = self.entries.len();
        self.entries.retain(|e| &e.product_id != product_id);
        self.entries.len() < len_before
    }

    /// Number of favorites.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if there are no favorites.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in insertion order.
    pub fn entries(&self) -> &[FavoriteEntry] {
        &self.entries
    }

    /// Favorited product ids.
    pub fn ids(&self) -> BTreeSet<ProductId> {
        self.entries.iter().map(|e| e.product_id.clone()).collect()
    }

    /// Drop duplicate ids, keeping the first occurrence.
    fn dedup(&mut self) {
        let mut seen = BTreeSet::new();
        self.entries.retain(|e| seen.insert(e.product_id.clone()));
    }
}

impl Persist for FavoriteSet {
    const KIND: &'static str = "favorites";
}

/// Where the result of a toggle came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FavoriteSource {
    /// Decided locally.
    Local,
    /// Adopted from the remote service.
    Remote {
        /// Message returned by the service.
        message: String,
    },
}

/// Result of a favorite toggle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToggleOutcome {
    /// Whether the product is now a favorite.
    pub is_favorite: bool,
    /// Who decided.
    pub source: FavoriteSource,
    /// Set when the remote call failed and the toggle fell back to local.
    pub warning: Option<RemoteError>,
}

/// Result of the guest-to-user transfer on login.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationOutcome {
    /// Guest favorites were copied into the user's namespace.
    Copied(usize),
    /// The guest namespace had nothing to copy.
    GuestEmpty,
    /// The user's namespace already held favorites.
    DestinationNotEmpty,
    /// A transfer already happened during this login.
    AlreadyMigrated,
    /// Logging in as guest is not a login.
    NotApplicable,
}

/// Preference cache: the favorites of the active namespace.
#[derive(Debug)]
pub struct Favorites {
    backends: Backends,
    serializer: SafeSerializer,
    namespace: Namespace,
    set: FavoriteSet,
    migrated: bool,
}

impl Favorites {
    /// Open the cache on the guest namespace.
    pub fn new(backends: Backends, serializer: SafeSerializer) -> Self {
        let mut favorites = Self {
            backends,
            serializer,
            namespace: Namespace::guest(),
            set: FavoriteSet::default(),
            migrated: false,
        };
        favorites.set = favorites.load(&Namespace::guest());
        favorites
    }

    /// The active namespace.
    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// Favorites of the active namespace.
    pub fn set(&self) -> &FavoriteSet {
        &self.set
    }

    /// Check if a product is favorited in the active namespace.
    pub fn contains(&self, product_id: &ProductId) -> bool {
        self.set.contains(product_id)
    }

    fn key(namespace: &Namespace) -> String {
        cache_key!(FAVORITES_PREFIX, namespace)
    }

    /// Load a namespace's set. Unreadable data counts as empty.
    fn load(&self, namespace: &Namespace) -> FavoriteSet {
        match self
            .serializer
            .read_first::<FavoriteSet>(&self.backends, &Self::key(namespace))
        {
            Ok(Some((_, mut set))) => {
                set.dedup();
                set
            }
            Ok(None) => FavoriteSet::default(),
            Err(e) => {
                tracing::warn!(namespace = %namespace, error = %e, "favorites unreadable, treating as empty");
                FavoriteSet::default()
            }
        }
    }

    fn persist_to(&self, namespace: &Namespace, set: &FavoriteSet) {
        let report = self
            .serializer
            .write_ordered(&self.backends, &Self::key(namespace), set);
        for warning in report.warnings() {
            tracing::warn!(namespace = %namespace, error = %warning, "favorites write degraded");
        }
    }

    fn persist(&self) {
        self.persist_to(&self.namespace, &self.set);
    }

    /// Make `namespace` active, loading its favorites.
    pub fn switch_namespace(&mut self, namespace: Namespace) {
        if namespace == self.namespace {
            return;
        }
        tracing::debug!(from = %self.namespace, to = %namespace, "switching favorites namespace");
        self.set = self.load(&namespace);
        self.namespace = namespace;
    }

    /// Add the product if absent, remove it if present.
    ///
    /// Returns whether the product is now a favorite.
    pub fn toggle_local(&mut self, product_id: &ProductId, product_name: &str) -> bool {
        let is_favorite = if self.set.remove(product_id) {
            false
        } else {
            self.set
                .insert(FavoriteEntry::new(product_id.clone(), product_name));
            true
        };
        self.persist();
        is_favorite
    }

    /// Adopt the remote service's verdict for a product.
    pub fn apply_remote_toggle(
        &mut self,
        product_id: &ProductId,
        product_name: &str,
        verdict: &FavoriteToggle,
    ) -> bool {
        let changed = if verdict.is_favorite {
            self.set
                .insert(FavoriteEntry::new(product_id.clone(), product_name))
        } else {
            self.set.remove(product_id)
        };
        if changed {
            self.persist();
        }
        verdict.is_favorite
    }

    /// Toggle a favorite.
    ///
    /// When signed in and a remote service is given, its answer is ground
    /// truth. If the call fails, or in guest mode, the toggle is local.
    pub async fn toggle(
        &mut self,
        product_id: &ProductId,
        product_name: &str,
        remote: Option<(&dyn ReconciliationClient, &Credential)>,
    ) -> ToggleOutcome {
        let remote = remote.filter(|_| !self.namespace.is_guest());

        let warning = match remote {
            Some((client, credential)) => {
                match client.toggle_favorite(credential, product_id.as_str()).await {
                    Ok(verdict) => {
                        let is_favorite = self.apply_remote_toggle(product_id, product_name, &verdict);
                        return ToggleOutcome {
                            is_favorite,
                            source: FavoriteSource::Remote {
                                message: verdict.message,
                            },
                            warning: None,
                        };
                    }
                    Err(e) => {
                        tracing::warn!(product = %product_id, error = %e, "remote toggle failed, toggling locally");
                        Some(e)
                    }
                }
            }
            None => None,
        };

        ToggleOutcome {
            is_favorite: self.toggle_local(product_id, product_name),
            source: FavoriteSource::Local,
            warning,
        }
    }

    /// Switch to a signed-in user's namespace, copying guest favorites into
    /// it if it is empty and no copy has happened during this login.
    pub fn on_login(&mut self, namespace: Namespace) -> MigrationOutcome {
        if namespace.is_guest() {
            self.switch_namespace(namespace);
            return MigrationOutcome::NotApplicable;
        }

        let guest = if self.namespace.is_guest() {
            self.set.clone()
        } else {
            self.load(&Namespace::guest())
        };

        self.switch_namespace(namespace);

        let outcome = if self.migrated {
            MigrationOutcome::AlreadyMigrated
        } else if !self.set.is_empty() {
            MigrationOutcome::DestinationNotEmpty
        } else if guest.is_empty() {
            MigrationOutcome::GuestEmpty
        } else {
            for entry in guest.entries() {
                self.set.insert(entry.clone());
            }
            self.persist();
            self.migrated = true;
            MigrationOutcome::Copied(guest.len())
        };

        tracing::info!(namespace = %self.namespace, outcome = ?outcome, "favorites login");
        outcome
    }

    /// Switch back to the guest namespace. Nothing is deleted.
    pub fn on_logout(&mut self) {
        self.migrated = false;
        self.switch_namespace(Namespace::guest());
    }

    /// Add server-side favorites missing locally. Never removes anything.
    ///
    /// Returns the number of entries added.
    pub async fn pull_remote(
        &mut self,
        client: &dyn ReconciliationClient,
        credential: &Credential,
        catalog: &Catalog,
    ) -> Result<usize, CommerceError> {
        if self.namespace.is_guest() {
            return Ok(0);
        }
        let remote_ids = client.fetch_favorites(credential).await?;

        let mut added = 0;
        for id in remote_ids {
            let product_id = ProductId::new(id);
            let name = catalog
                .name_of(&product_id)
                .unwrap_or(product_id.as_str())
                .to_string();
            if self.set.insert(FavoriteEntry::new(product_id, name)) {
                added += 1;
            }
        }
        if added > 0 {
            self.persist();
        }
        tracing::debug!(namespace = %self.namespace, added, "pulled remote favorites");
        Ok(added)
    }

    /// Remove every favorite of the active namespace.
    pub fn clear(&mut self) {
        self.set = FavoriteSet::default();
        self.persist();
    }

    /// Delete a namespace's favorites from both backends.
    pub fn purge_namespace(&mut self, namespace: &Namespace) -> Result<(), CommerceError> {
        self.backends.remove_everywhere(&Self::key(namespace))?;
        if namespace == &self.namespace {
            self.set = FavoriteSet::default();
        }
        tracing::info!(namespace = %namespace, "favorites purged");
        Ok(())
    }
}
