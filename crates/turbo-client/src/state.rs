//! The client state facade.
//!
//! [`ClientState`] owns the identity, favorites and cart caches and routes
//! UI events (login, logout, avatar upload, favorite toggle, cart edits)
//! into them, keeping the favorites and cart namespaces aligned with the
//! signed-in identity.

use std::sync::Arc;

use turbo_auth::{AuthError, AuthPhase, AuthState, IdentityShape, RefreshOutcome, UploadResult};
use turbo_cache::{Backends, Credential, SafeSerializer};
use turbo_commerce::{
    Cart, Catalog, CommerceError, Favorites, MigrationOutcome, Namespace, ProductId, QualityTier,
    ToggleOutcome,
};
use turbo_data::ReconciliationClient;

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::events::{Notice, StateEvent, StateListener};
use crate::snapshot::Snapshot;

/// Client-resident state: identity, favorites and cart.
pub struct ClientState {
    auth: AuthState,
    favorites: Favorites,
    cart: Cart,
    catalog: Arc<Catalog>,
    remote: Option<Arc<dyn ReconciliationClient>>,
    listeners: Vec<Arc<dyn StateListener>>,
}

impl ClientState {
    /// Create the caches over `backends`.
    pub fn new(backends: Backends, serializer: SafeSerializer, catalog: Catalog) -> Self {
        let catalog = Arc::new(catalog);
        Self {
            auth: AuthState::new(backends.clone(), serializer),
            favorites: Favorites::new(backends.clone(), serializer),
            cart: Cart::new(backends, serializer, catalog.clone()),
            catalog,
            remote: None,
            listeners: Vec::new(),
        }
    }

    /// Open the backends described by `config` and create the caches.
    pub fn open(config: &ClientConfig) -> anyhow::Result<Self> {
        let backends = config.open_backends()?;
        Ok(Self::new(backends, config.serializer(), config.catalog()))
    }

    /// Reconcile with a remote service.
    pub fn with_remote(mut self, remote: Arc<dyn ReconciliationClient>) -> Self {
        self.remote = Some(remote);
        self
    }

    /// Register a listener.
    pub fn subscribe(&mut self, listener: Arc<dyn StateListener>) {
        self.listeners.push(listener);
    }

    /// The identity cache.
    pub fn auth(&self) -> &AuthState {
        &self.auth
    }

    /// The favorites cache.
    pub fn favorites(&self) -> &Favorites {
        &self.favorites
    }

    /// The cart.
    pub fn cart(&self) -> &Cart {
        &self.cart
    }

    /// The price table.
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Current state for rendering.
    pub fn snapshot(&self) -> Snapshot {
        let total = match self.cart.total() {
            Ok(total) => Some(total),
            Err(e) => {
                tracing::warn!(error = %e, "cart total unavailable");
                None
            }
        };
        Snapshot {
            phase: self.auth.phase(),
            identity: self.auth.user().cloned(),
            namespace: self.favorites.namespace().clone(),
            favorites: self.favorites.set().entries().to_vec(),
            cart: self.cart.lines().to_vec(),
            item_count: self.cart.item_count(),
            total,
        }
    }

    fn emit(&self, event: StateEvent) {
        if self.listeners.is_empty() {
            return;
        }
        let snapshot = self.snapshot();
        for listener in &self.listeners {
            listener.on_state_event(&event, &snapshot);
        }
    }

    fn report_auth(&self, err: &AuthError) {
        match err {
            AuthError::Validation(e) => self.emit(StateEvent::Notice(Notice::Validation(e.to_string()))),
            AuthError::Network(e) => self.emit(StateEvent::Notice(Notice::Network(e.to_string()))),
            _ => tracing::debug!(error = %err, "auth error not shown to user"),
        }
    }

    fn report_commerce(&self, err: &CommerceError) {
        match err {
            CommerceError::Network(e) => self.emit(StateEvent::Notice(Notice::Network(e.to_string()))),
            CommerceError::ProductNotFound(_)
            | CommerceError::TierNotPriced { .. }
            | CommerceError::UnknownTier(_)
            | CommerceError::QuantityExceedsLimit(_, _) => {
                self.emit(StateEvent::Notice(Notice::Validation(err.to_string())))
            }
            _ => tracing::debug!(error = %err, "commerce error not shown to user"),
        }
    }

    /// Point favorites and cart at `namespace` without migrating anything.
    fn follow_namespace(&mut self, namespace: Namespace) {
        self.favorites.switch_namespace(namespace.clone());
        self.cart.switch_namespace(namespace);
    }

    fn identity_namespace(&self) -> Namespace {
        Namespace::for_identity(self.auth.user().map(|u| u.email.as_str()))
    }

    /// Restore a persisted session. Only the first call does anything.
    pub fn initialize(&mut self) -> AuthPhase {
        if self.auth.phase() != AuthPhase::Uninitialized {
            return self.auth.phase();
        }
        let phase = self.auth.initialize();
        self.follow_namespace(self.identity_namespace());
        self.emit(StateEvent::IdentityChanged);
        phase
    }

    /// Sign in and move favorites and cart to the user's namespace.
    ///
    /// Guest favorites are copied into an empty user namespace; carts are
    /// swapped, never merged.
    pub fn login(
        &mut self,
        shape: impl Into<IdentityShape>,
        token: &str,
        remember: bool,
    ) -> Result<MigrationOutcome, AuthError> {
        let was_logged_in = self.auth.is_logged_in();
        let result = self
            .auth
            .login(shape, token, remember)
            .map(|user| user.email.clone());
        let email = match result {
            Ok(email) => email,
            Err(e) => {
                // A login that failed while writing has already signed the previous user out.
                if was_logged_in && !self.auth.is_logged_in() {
                    self.favorites.on_logout();
                    self.cart.switch_namespace(Namespace::guest());
                    self.emit(StateEvent::IdentityChanged);
                }
                self.report_auth(&e);
                return Err(e);
            }
        };

        if was_logged_in {
            self.favorites.on_logout();
        }
        let namespace = Namespace::for_email(&email);
        let outcome = self.favorites.on_login(namespace.clone());
        self.cart.switch_namespace(namespace);
        self.emit(StateEvent::IdentityChanged);
        Ok(outcome)
    }

    /// Sign out. Favorites and cart fall back to the guest namespace.
    pub fn logout(&mut self) -> Result<(), AuthError> {
        let result = self.auth.clear_auth_data();
        self.favorites.on_logout();
        self.cart.switch_namespace(Namespace::guest());
        self.emit(StateEvent::IdentityChanged);
        result
    }

    /// Store an edited profile.
    pub fn update_user(&mut self, shape: impl Into<IdentityShape>) -> Result<(), AuthError> {
        if let Err(e) = self.auth.update_user(shape) {
            self.report_auth(&e);
            return Err(e);
        }
        self.follow_namespace(self.identity_namespace());
        self.emit(StateEvent::IdentityChanged);
        Ok(())
    }

    /// Pull the authoritative profile and favorites.
    ///
    /// Without a configured remote this reports the service as unavailable.
    pub async fn reconcile(&mut self) -> Result<RefreshOutcome, AuthError> {
        if !self.auth.is_logged_in() {
            return Err(AuthError::NotLoggedIn);
        }
        let Some(remote) = self.remote.clone() else {
            return Ok(RefreshOutcome::Offline(turbo_data::RemoteError::Unavailable));
        };

        let outcome = self.auth.refresh_from_server(remote.as_ref()).await?;
        match &outcome {
            RefreshOutcome::Refreshed => {
                self.follow_namespace(self.identity_namespace());
                self.emit(StateEvent::IdentityChanged);
                self.pull_favorites(remote.as_ref()).await;
            }
            RefreshOutcome::Offline(e) => {
                self.emit(StateEvent::Notice(Notice::Network(e.to_string())));
            }
            RefreshOutcome::Rejected(_) => {
                self.favorites.on_logout();
                self.cart.switch_namespace(Namespace::guest());
                self.emit(StateEvent::IdentityChanged);
            }
        }
        Ok(outcome)
    }

    async fn pull_favorites(&mut self, remote: &dyn ReconciliationClient) {
        let Some(credential) = self.auth.credential().cloned() else {
            return;
        };
        match self
            .favorites
            .pull_remote(remote, &credential, &self.catalog)
            .await
        {
            Ok(0) => {}
            Ok(_) => self.emit(StateEvent::FavoritesChanged),
            Err(e) => {
                tracing::warn!(error = %e, "favorites pull failed");
                self.report_commerce(&e);
            }
        }
    }

    /// Toggle a favorite, remotely when signed in and a remote is configured.
    pub async fn toggle_favorite(&mut self, product_id: &ProductId) -> ToggleOutcome {
        let name = self
            .catalog
            .name_of(product_id)
            .unwrap_or(product_id.as_str())
            .to_string();
        let credential = self.auth.credential().cloned();
        let remote = self.remote.clone();
        let target: Option<(&dyn ReconciliationClient, &Credential)> = match (&remote, &credential) {
            (Some(remote), Some(credential)) => Some((remote.as_ref(), credential)),
            _ => None,
        };

        let outcome = self.favorites.toggle(product_id, &name, target).await;
        if let Some(warning) = &outcome.warning {
            self.emit(StateEvent::Notice(Notice::Network(warning.to_string())));
        }
        self.emit(StateEvent::FavoritesChanged);
        outcome
    }

    /// Empty the active favorite set.
    pub fn clear_favorites(&mut self) {
        self.favorites.clear();
        self.emit(StateEvent::FavoritesChanged);
    }

    fn cart_result<T>(&self, result: Result<T, CommerceError>) -> Result<T, CommerceError> {
        match result {
            Ok(value) => {
                self.emit(StateEvent::CartChanged);
                Ok(value)
            }
            Err(e) => {
                self.report_commerce(&e);
                Err(e)
            }
        }
    }

    /// Add one unit to the cart. Returns the line's new quantity.
    pub fn add_to_cart(&mut self, product_id: &ProductId, tier: QualityTier) -> Result<i64, CommerceError> {
        let result = self.cart.add_item(product_id, tier);
        self.cart_result(result)
    }

    /// Set a line's quantity; zero or less removes it.
    pub fn update_cart_quantity(
        &mut self,
        product_id: &ProductId,
        tier: QualityTier,
        quantity: i64,
    ) -> Result<bool, CommerceError> {
        let result = self.cart.update_quantity(product_id, tier, quantity);
        self.cart_result(result)
    }

    /// Remove a cart line.
    pub fn remove_from_cart(&mut self, product_id: &ProductId, tier: QualityTier) -> bool {
        let removed = self.cart.remove_item(product_id, tier);
        if removed {
            self.emit(StateEvent::CartChanged);
        }
        removed
    }

    /// Empty the active cart.
    pub fn clear_cart(&mut self) {
        self.cart.clear();
        self.emit(StateEvent::CartChanged);
    }

    /// The upload collaborator started an avatar upload.
    pub fn begin_avatar_upload(&mut self) -> Result<(), AuthError> {
        self.auth.begin_avatar_upload()
    }

    /// The upload collaborator finished an avatar upload.
    pub fn finish_avatar_upload(&mut self, result: UploadResult) -> Result<(), AuthError> {
        match self.auth.finish_avatar_upload(result) {
            Ok(()) => {
                self.emit(StateEvent::IdentityChanged);
                Ok(())
            }
            Err(e) => {
                self.report_auth(&e);
                Err(e)
            }
        }
    }

    /// Sign out and delete the user's favorites and cart from both backends.
    pub fn delete_account(&mut self) -> Result<(), ClientError> {
        if !self.auth.is_logged_in() {
            return Err(AuthError::NotLoggedIn.into());
        }
        let namespace = self.identity_namespace();
        tracing::info!(namespace = %namespace, "deleting account data");

        self.logout()?;
        self.favorites.purge_namespace(&namespace)?;
        self.cart.purge_namespace(&namespace)?;
        Ok(())
    }
}
