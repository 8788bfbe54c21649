//! The identity cache.
//!
//! ```text
//! Uninitialized -> Initializing -> { LoggedOut, LoggedIn }
//! LoggedIn -> LoggedOut   (clear_auth_data, stale purge)
//! LoggedIn -> LoggedIn    (update_user, refresh_from_server)
//! ```
//!
//! The identity record is written to the active backend first and mirrored
//! to the other. The credential lives only in the active backend, so a
//! mirror left behind when the browsing session ends is detected as stale.

use crate::error::{AuthError, StaleReason, ValidationError};
use crate::events::{AuthEvent, AuthListener};
use crate::identity::{validate, AvatarRef, IdentityRecord, IdentityShape};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use turbo_cache::{
    Backend, Backends, CacheError, Credential, Persist, SafeSerializer, WriteOutcome, CREDENTIAL_KEY,
    IDENTITY_KEY,
};
use turbo_data::{ReconciliationClient, RemoteError, ServerProfile};

/// Lifecycle phase of the identity cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthPhase {
    /// `initialize` has not run.
    Uninitialized,
    /// Persisted state is being checked.
    Initializing,
    /// No identity is active.
    LoggedOut,
    /// An identity with a credential is active.
    LoggedIn,
}

impl AuthPhase {
    /// Get phase as string.
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthPhase::Uninitialized => "uninitialized",
            AuthPhase::Initializing => "initializing",
            AuthPhase::LoggedOut => "logged_out",
            AuthPhase::LoggedIn => "logged_in",
        }
    }
}

impl fmt::Display for AuthPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of a server refresh.
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    /// The authoritative record was applied.
    Refreshed,
    /// The service was unreachable; the cached record was kept.
    Offline(RemoteError),
    /// The service rejected the credential; auth data was cleared.
    Rejected(RemoteError),
}

/// How an avatar upload ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadResult {
    /// The upload completed with this final avatar reference.
    Succeeded { avatar: String },
    /// The upload failed.
    Failed { reason: String },
}

/// Identity cache: the current credential and identity record.
pub struct AuthState {
    backends: Backends,
    serializer: SafeSerializer,
    phase: AuthPhase,
    user: Option<IdentityRecord>,
    credential: Option<Credential>,
    initialized: bool,
    listeners: Vec<Arc<dyn AuthListener>>,
}

impl AuthState {
    /// Create an uninitialized cache over `backends`.
    pub fn new(backends: Backends, serializer: SafeSerializer) -> Self {
        Self {
            backends,
            serializer,
            phase: AuthPhase::Uninitialized,
            user: None,
            credential: None,
            initialized: false,
            listeners: Vec::new(),
        }
    }

    /// Register a listener for identity changes.
    pub fn subscribe(&mut self, listener: Arc<dyn AuthListener>) {
        self.listeners.push(listener);
    }

    /// Current phase.
    pub fn phase(&self) -> AuthPhase {
        self.phase
    }

    /// The signed-in identity.
    pub fn user(&self) -> Option<&IdentityRecord> {
        self.user.as_ref()
    }

    /// The active credential.
    pub fn credential(&self) -> Option<&Credential> {
        self.credential.as_ref()
    }

    /// Check if an identity is active.
    pub fn is_logged_in(&self) -> bool {
        self.phase == AuthPhase::LoggedIn
    }

    /// The storage backends.
    pub fn backends(&self) -> &Backends {
        &self.backends
    }

    fn notify(&self, event: &AuthEvent) {
        for listener in &self.listeners {
            listener.on_auth_event(event);
        }
    }

    /// Restore a persisted session, purging stale data.
    ///
    /// Only the first call does anything.
    pub fn initialize(&mut self) -> AuthPhase {
        if self.initialized {
            return self.phase;
        }
        self.initialized = true;
        self.phase = AuthPhase::Initializing;

        match self.load_persisted() {
            Ok(Some((user, credential))) => {
                self.backends.set_active(credential.backend());
                tracing::info!(user = %user.id, backend = %credential.backend(), "restored session");
                self.credential = Some(credential);
                self.user = Some(user.clone());
                self.phase = AuthPhase::LoggedIn;
                self.notify(&AuthEvent::SignedIn(user));
            }
            Ok(None) => {
                tracing::debug!("no persisted session");
                self.phase = AuthPhase::LoggedOut;
            }
            Err(reason) => {
                let err = AuthError::StaleState(reason);
                tracing::warn!(error = %err, "purging stale identity data");
                if let Err(e) = self.purge() {
                    tracing::warn!(error = %e, "stale purge incomplete");
                }
                self.phase = AuthPhase::LoggedOut;
            }
        }
        self.phase
    }

    fn load_persisted(&self) -> Result<Option<(IdentityRecord, Credential)>, StaleReason> {
        let identity = self
            .serializer
            .read_first::<IdentityRecord>(&self.backends, IDENTITY_KEY)
            .map_err(|source| StaleReason::Undecodable {
                kind: IdentityRecord::KIND,
                source,
            })?;
        let credential = self
            .serializer
            .read_first::<Credential>(&self.backends, CREDENTIAL_KEY)
            .map_err(|source| StaleReason::Undecodable {
                kind: Credential::KIND,
                source,
            })?;

        match (identity, credential) {
            (None, None) => Ok(None),
            (Some(_), None) => Err(StaleReason::IdentityWithoutCredential),
            (None, Some(_)) => Err(StaleReason::CredentialWithoutIdentity),
            (Some((_, record)), Some((backend, credential))) => {
                let credential = credential.located_in(backend);
                if credential.is_blank() {
                    return Err(StaleReason::BlankCredential);
                }
                let record = record.normalize().map_err(StaleReason::Invalid)?;
                if !credential.belongs_to(&record.id) {
                    return Err(StaleReason::CredentialMismatch {
                        credential_subject: credential.subject().to_string(),
                        identity: record.id,
                    });
                }
                Ok(Some((record, credential)))
            }
        }
    }

    /// Delete identity and credential from both backends.
    fn purge(&self) -> Result<(), CacheError> {
        let identity = self.backends.remove_everywhere(IDENTITY_KEY);
        let credential = self.backends.remove_everywhere(CREDENTIAL_KEY);
        identity.and(credential)
    }

    fn persist_identity(&self, record: &IdentityRecord) {
        let report = self
            .serializer
            .write_ordered(&self.backends, IDENTITY_KEY, record);
        for warning in report.warnings() {
            tracing::warn!(user = %record.id, error = %warning, "identity write degraded");
        }
    }

    /// Sign in with a server-provided identity and bearer token.
    ///
    /// `remember` selects the durable backend; otherwise the session lives
    /// in the ephemeral one.
    pub fn login(
        &mut self,
        shape: impl Into<IdentityShape>,
        token: &str,
        remember: bool,
    ) -> Result<&IdentityRecord, AuthError> {
        let record = validate(shape)?;
        if token.trim().is_empty() {
            return Err(ValidationError::MissingCredential.into());
        }

        let backend = Backend::for_login(remember);
        let credential = Credential::new(token, backend).for_subject(record.id.as_str());
        self.backends.set_active(backend);

        self.persist_identity(&record);
        if let WriteOutcome::Skipped(e) =
            self.serializer
                .write(self.backends.store(backend), CREDENTIAL_KEY, &credential)
        {
            tracing::warn!(backend = %backend, error = %e, "credential write failed, login aborted");
            // The previous session's records are already overwritten, so it cannot be resumed.
            if let Err(clear_err) = self.clear_auth_data() {
                tracing::warn!(error = %clear_err, "cleanup after failed login incomplete");
            }
            return Err(e.into());
        }
        // A credential left by an earlier session in the other backend would shadow this one.
        if let Err(e) = self.backends.store(backend.other()).delete(CREDENTIAL_KEY) {
            tracing::warn!(backend = %backend.other(), error = %e, "could not remove old credential");
        }

        tracing::info!(user = %record.id, backend = %backend, "signed in");
        self.credential = Some(credential);
        self.initialized = true;
        self.phase = AuthPhase::LoggedIn;
        self.notify(&AuthEvent::SignedIn(record.clone()));
        Ok(&*self.user.insert(record))
    }

    /// Validate, persist and expose a new version of the signed-in record.
    pub fn update_user(&mut self, shape: impl Into<IdentityShape>) -> Result<(), AuthError> {
        let upload_in_progress = self
            .user
            .as_ref()
            .ok_or(AuthError::NotLoggedIn)?
            .upload_in_progress;
        let mut record = validate(shape)?;
        record.upload_in_progress = upload_in_progress;
        self.store_user(record);
        Ok(())
    }

    fn store_user(&mut self, record: IdentityRecord) {
        self.persist_identity(&record);
        tracing::debug!(user = %record.id, "identity updated");
        self.notify(&AuthEvent::Updated(record.clone()));
        self.user = Some(record);
        self.phase = AuthPhase::LoggedIn;
    }

    /// Pull the authoritative record and apply it.
    ///
    /// A network failure keeps the cached record. A rejected credential
    /// clears auth data.
    pub async fn refresh_from_server(
        &mut self,
        client: &dyn ReconciliationClient,
    ) -> Result<RefreshOutcome, AuthError> {
        let credential = self.credential.clone().ok_or(AuthError::NotLoggedIn)?;

        match client.fetch_profile(&credential).await {
            Ok(profile) => {
                self.apply_server_record(profile)?;
                Ok(RefreshOutcome::Refreshed)
            }
            Err(e) if e.is_auth_failure() => {
                tracing::warn!(error = %e, "credential rejected, clearing auth data");
                self.clear_auth_data()?;
                Ok(RefreshOutcome::Rejected(e))
            }
            Err(e) => {
                tracing::warn!(error = %e, "profile refresh failed, keeping cached identity");
                Ok(RefreshOutcome::Offline(e))
            }
        }
    }

    /// Merge a server record into the cache.
    ///
    /// While an avatar upload is in flight the cached avatar is kept.
    pub fn apply_server_record(&mut self, profile: ServerProfile) -> Result<(), AuthError> {
        let current = self.user.as_ref().ok_or(AuthError::NotLoggedIn)?;
        let mut record = validate(profile)?;
        if current.upload_in_progress {
            tracing::debug!(user = %record.id, "upload in progress, keeping cached avatar");
            current.keep_avatar_of(&mut record);
            record.upload_in_progress = true;
        }
        self.store_user(record);
        Ok(())
    }

    /// Mark an avatar upload as started.
    pub fn begin_avatar_upload(&mut self) -> Result<(), AuthError> {
        let user = self.user.as_mut().ok_or(AuthError::NotLoggedIn)?;
        user.upload_in_progress = true;
        tracing::debug!(user = %user.id, "avatar upload started");
        Ok(())
    }

    /// Check if an avatar upload is in flight.
    pub fn upload_in_progress(&self) -> bool {
        self.user.as_ref().is_some_and(|u| u.upload_in_progress)
    }

    /// Clear the upload guard and, on success, store the final avatar.
    pub fn finish_avatar_upload(&mut self, result: UploadResult) -> Result<(), AuthError> {
        let user = self.user.as_mut().ok_or(AuthError::NotLoggedIn)?;
        user.upload_in_progress = false;

        match result {
            UploadResult::Succeeded { avatar } => {
                let mut record = user.clone();
                record.avatar = AvatarRef::from(Some(avatar));
                record.has_custom_avatar = record.avatar.is_present();
                tracing::info!(user = %record.id, bytes = record.avatar.payload_len(), "avatar upload finished");
                self.update_user(record)
            }
            UploadResult::Failed { reason } => {
                tracing::warn!(user = %user.id, reason = %reason, "avatar upload failed");
                Ok(())
            }
        }
    }

    /// Purge identity and credential from both backends and sign out.
    ///
    /// In-memory state is reset even if a backend delete fails.
    pub fn clear_auth_data(&mut self) -> Result<(), AuthError> {
        let purged = self.purge();
        let user = self.user.take();
        self.credential = None;
        self.initialized = true;
        self.phase = AuthPhase::LoggedOut;
        self.backends.set_active(Backend::Ephemeral);
        tracing::info!(user = user.as_ref().map(|u| u.id.as_str()), "auth data cleared");
        self.notify(&AuthEvent::SignedOut);
        purged.map_err(AuthError::from)
    }
}

impl fmt::Debug for AuthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthState")
            .field("phase", &self.phase)
            .field("user", &self.user.as_ref().map(|u| &u.id))
            .field("credential", &self.credential)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{ClientProfile, PLACEHOLDER_TOKEN};
    use async_trait::async_trait;
    use std::collections::BTreeSet;
    use std::sync::Mutex;
    use turbo_cache::{MemoryStore, StoragePort};
    use turbo_data::FavoriteToggle;

    struct FakeRemote {
        profile: Result<ServerProfile, RemoteError>,
    }

    #[async_trait]
    impl ReconciliationClient for FakeRemote {
        async fn fetch_profile(&self, _: &Credential) -> Result<ServerProfile, RemoteError> {
            self.profile.clone()
        }

        async fn fetch_favorites(&self, _: &Credential) -> Result<BTreeSet<String>, RemoteError> {
            Ok(BTreeSet::new())
        }

        async fn toggle_favorite(&self, _: &Credential, _: &str) -> Result<FavoriteToggle, RemoteError> {
            Err(RemoteError::Unavailable)
        }
    }

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<AuthEvent>>,
    }

    impl AuthListener for Recorder {
        fn on_auth_event(&self, event: &AuthEvent) {
            self.events.lock().unwrap().push(event.clone());
        }
    }

    fn server_profile(email: &str) -> ServerProfile {
        ServerProfile {
            id: "u1".to_string(),
            email: Some(email.to_string()),
            first_name: Some("Jane".to_string()),
            last_name: Some("Doe".to_string()),
            ..Default::default()
        }
    }

    fn profile_with_id(id: &str, email: &str) -> ServerProfile {
        ServerProfile {
            id: id.to_string(),
            ..server_profile(email)
        }
    }

    fn state(backends: &Backends) -> AuthState {
        AuthState::new(backends.clone(), SafeSerializer::default())
    }

    #[test]
    fn test_initialize_empty() {
        let backends = Backends::in_memory();
        let mut auth = state(&backends);
        assert_eq!(auth.phase(), AuthPhase::Uninitialized);
        assert_eq!(auth.initialize(), AuthPhase::LoggedOut);
        assert!(auth.user().is_none());
    }

    #[test]
    fn test_login_then_restore() {
        let backends = Backends::in_memory();
        let mut auth = state(&backends);
        auth.initialize();
        let user = auth.login(server_profile("jane@example.com"), "tok", true).unwrap();
        assert_eq!(user.display_name, "Jane Doe");

        let mut restored = state(&backends);
        assert_eq!(restored.initialize(), AuthPhase::LoggedIn);
        assert_eq!(restored.user().unwrap().email, "jane@example.com");
        assert_eq!(restored.credential().unwrap().backend(), Backend::Durable);
        assert_eq!(restored.credential().unwrap().token(), "tok");
    }

    #[test]
    fn test_credential_only_in_active_backend() {
        let backends = Backends::in_memory();
        let mut auth = state(&backends);
        auth.login(server_profile("jane@example.com"), "tok", false).unwrap();

        let ephemeral = backends.store(Backend::Ephemeral);
        let durable = backends.store(Backend::Durable);
        assert!(ephemeral.exists(CREDENTIAL_KEY).unwrap());
        assert!(!durable.exists(CREDENTIAL_KEY).unwrap());
        assert!(ephemeral.exists(IDENTITY_KEY).unwrap());
        assert!(durable.exists(IDENTITY_KEY).unwrap());
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let backends = Backends::in_memory();
        let recorder = Arc::new(Recorder::default());
        let mut auth = state(&backends);
        auth.login(server_profile("jane@example.com"), "tok", true).unwrap();

        let mut restored = state(&backends);
        restored.subscribe(recorder.clone());
        restored.initialize();
        restored.initialize();
        assert_eq!(recorder.events.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_identity_without_credential_is_purged() {
        let backends = Backends::in_memory();
        let record = crate::validate(server_profile("jane@example.com")).unwrap();
        SafeSerializer::default().write(backends.store(Backend::Durable), IDENTITY_KEY, &record);

        let mut auth = state(&backends);
        assert_eq!(auth.initialize(), AuthPhase::LoggedOut);
        assert!(!backends.store(Backend::Durable).exists(IDENTITY_KEY).unwrap());
        assert!(!backends.store(Backend::Ephemeral).exists(IDENTITY_KEY).unwrap());
    }

    #[test]
    fn test_ended_session_leaves_stale_mirror() {
        let backends = Backends::in_memory();
        let mut auth = state(&backends);
        auth.login(server_profile("jane@example.com"), "tok", false).unwrap();
        backends.end_session().unwrap();

        let mut restored = state(&backends);
        assert_eq!(restored.initialize(), AuthPhase::LoggedOut);
        assert!(backends.read_first(IDENTITY_KEY).unwrap().is_none());
    }

    #[test]
    fn test_credential_without_identity_is_purged() {
        let backends = Backends::in_memory();
        let credential = Credential::new("tok", Backend::Durable);
        SafeSerializer::default().write(backends.store(Backend::Durable), CREDENTIAL_KEY, &credential);

        let mut auth = state(&backends);
        assert_eq!(auth.initialize(), AuthPhase::LoggedOut);
        assert!(backends.read_first(CREDENTIAL_KEY).unwrap().is_none());
    }

    #[test]
    fn test_corrupt_identity_is_purged() {
        let backends = Backends::in_memory();
        let mut auth = state(&backends);
        auth.login(server_profile("jane@example.com"), "tok", true).unwrap();
        for backend in [Backend::Durable, Backend::Ephemeral] {
            backends.store(backend).set(IDENTITY_KEY, "{not json").unwrap();
        }

        let mut restored = state(&backends);
        assert_eq!(restored.initialize(), AuthPhase::LoggedOut);
        assert!(backends.read_first(IDENTITY_KEY).unwrap().is_none());
        assert!(backends.read_first(CREDENTIAL_KEY).unwrap().is_none());
    }

    #[test]
    fn test_invalid_stored_identity_is_purged() {
        let backends = Backends::in_memory();
        let mut record = crate::validate(server_profile("jane@example.com")).unwrap();
        record.email = "broken".to_string();
        let serializer = SafeSerializer::default();
        serializer.write(backends.store(Backend::Durable), IDENTITY_KEY, &record);
        serializer.write(
            backends.store(Backend::Durable),
            CREDENTIAL_KEY,
            &Credential::new("tok", Backend::Durable),
        );

        let mut auth = state(&backends);
        assert_eq!(auth.initialize(), AuthPhase::LoggedOut);
        assert!(backends.read_first(IDENTITY_KEY).unwrap().is_none());
    }

    #[test]
    fn test_login_rejects_invalid_input() {
        let backends = Backends::in_memory();
        let mut auth = state(&backends);
        let err = auth.login(ClientProfile::default(), "tok", true).unwrap_err();
        assert!(matches!(err, AuthError::Validation(ValidationError::MissingEmail)));

        let err = auth.login(server_profile("jane@example.com"), "  ", true).unwrap_err();
        assert!(matches!(err, AuthError::Validation(ValidationError::MissingCredential)));
        assert!(!auth.is_logged_in());
        assert!(backends.read_first(IDENTITY_KEY).unwrap().is_none());
    }

    #[test]
    fn test_login_aborts_when_credential_cannot_be_stored() {
        let durable = Arc::new(MemoryStore::new("durable").with_quota(8));
        let backends = Backends::new(durable, Arc::new(MemoryStore::new("ephemeral")));
        let mut auth = state(&backends);

        assert!(auth.login(server_profile("jane@example.com"), "tok", true).is_err());
        assert!(!auth.is_logged_in());
        assert!(backends.read_first(IDENTITY_KEY).unwrap().is_none());
    }

    #[test]
    fn test_interrupted_login_keeps_old_credential_from_pairing() {
        let backends = Backends::in_memory();
        let mut auth = state(&backends);
        auth.login(profile_with_id("u-alice", "alice@example.com"), "token-of-alice", true)
            .unwrap();

        // Bob's identity lands but his credential never does.
        let bob = crate::validate(profile_with_id("u-bob", "bob@example.com")).unwrap();
        SafeSerializer::default().write_ordered(&backends, IDENTITY_KEY, &bob);

        let mut restored = state(&backends);
        assert_eq!(restored.initialize(), AuthPhase::LoggedOut);
        assert!(restored.user().is_none());
        assert!(restored.credential().is_none());
        assert!(backends.read_first(IDENTITY_KEY).unwrap().is_none());
        assert!(backends.read_first(CREDENTIAL_KEY).unwrap().is_none());
    }

    #[test]
    fn test_unbound_credential_is_purged() {
        let backends = Backends::in_memory();
        let serializer = SafeSerializer::default();
        let record = crate::validate(server_profile("jane@example.com")).unwrap();
        serializer.write(backends.store(Backend::Durable), IDENTITY_KEY, &record);
        serializer.write(
            backends.store(Backend::Durable),
            CREDENTIAL_KEY,
            &Credential::new("tok", Backend::Durable),
        );

        let mut auth = state(&backends);
        assert_eq!(auth.initialize(), AuthPhase::LoggedOut);
        assert!(backends.read_first(CREDENTIAL_KEY).unwrap().is_none());
    }

    #[test]
    fn test_login_binds_credential_to_identity() {
        let backends = Backends::in_memory();
        let mut auth = state(&backends);
        auth.login(profile_with_id("u-alice", "alice@example.com"), "tok", true)
            .unwrap();
        assert_eq!(auth.credential().unwrap().subject(), "u-alice");

        let mut restored = state(&backends);
        assert_eq!(restored.initialize(), AuthPhase::LoggedIn);
        assert!(restored.credential().unwrap().belongs_to("u-alice"));
    }

    #[test]
    fn test_failed_relogin_signs_out_previous_user() {
        let durable = Arc::new(MemoryStore::new("durable").with_quota(8));
        let backends = Backends::new(durable, Arc::new(MemoryStore::new("ephemeral")));
        let recorder = Arc::new(Recorder::default());
        let mut auth = state(&backends);
        auth.subscribe(recorder.clone());
        auth.login(profile_with_id("u-alice", "alice@example.com"), "tok-a", false)
            .unwrap();

        let result = auth.login(profile_with_id("u-bob", "bob@example.com"), "tok-b", true);
        assert!(result.is_err());
        assert_eq!(auth.phase(), AuthPhase::LoggedOut);
        assert!(auth.user().is_none());
        assert!(auth.credential().is_none());
        assert_eq!(backends.active(), Backend::Ephemeral);
        assert!(backends.read_first(IDENTITY_KEY).unwrap().is_none());
        assert!(backends.read_first(CREDENTIAL_KEY).unwrap().is_none());
        assert_eq!(recorder.events.lock().unwrap().last(), Some(&AuthEvent::SignedOut));
    }

    #[test]
    fn test_update_user_requires_login() {
        let backends = Backends::in_memory();
        let mut auth = state(&backends);
        let err = auth.update_user(server_profile("jane@example.com")).unwrap_err();
        assert!(matches!(err, AuthError::NotLoggedIn));
    }

    #[test]
    fn test_update_user_persists_and_notifies() {
        let backends = Backends::in_memory();
        let recorder = Arc::new(Recorder::default());
        let mut auth = state(&backends);
        auth.subscribe(recorder.clone());
        auth.login(server_profile("jane@example.com"), "tok", true).unwrap();

        let mut edited = auth.user().unwrap().clone();
        edited.phone = Some("555-0100".to_string());
        auth.update_user(edited).unwrap();

        let (_, stored): (_, IdentityRecord) = SafeSerializer::default()
            .read_first(&backends, IDENTITY_KEY)
            .unwrap()
            .unwrap();
        assert_eq!(stored.phone.as_deref(), Some("555-0100"));

        let events = recorder.events.lock().unwrap();
        assert!(matches!(events[0], AuthEvent::SignedIn(_)));
        assert!(matches!(&events[1], AuthEvent::Updated(u) if u.phone.is_some()));
    }

    #[tokio::test]
    async fn test_refresh_applies_server_record() {
        let backends = Backends::in_memory();
        let mut auth = state(&backends);
        auth.login(server_profile("jane@example.com"), "tok", true).unwrap();

        let mut profile = server_profile("jane@example.com");
        profile.is_admin = true;
        let remote = FakeRemote { profile: Ok(profile) };

        let outcome = auth.refresh_from_server(&remote).await.unwrap();
        assert_eq!(outcome, RefreshOutcome::Refreshed);
        assert!(auth.user().unwrap().is_admin);
    }

    #[tokio::test]
    async fn test_refresh_offline_keeps_cache() {
        let backends = Backends::in_memory();
        let mut auth = state(&backends);
        auth.login(server_profile("jane@example.com"), "tok", true).unwrap();

        let remote = FakeRemote {
            profile: Err(RemoteError::Transport("connection refused".to_string())),
        };
        let outcome = auth.refresh_from_server(&remote).await.unwrap();
        assert!(matches!(outcome, RefreshOutcome::Offline(_)));
        assert!(auth.is_logged_in());
        assert_eq!(auth.user().unwrap().display_name, "Jane Doe");
    }

    #[tokio::test]
    async fn test_refresh_rejected_signs_out() {
        let backends = Backends::in_memory();
        let mut auth = state(&backends);
        auth.login(server_profile("jane@example.com"), "tok", true).unwrap();

        let remote = FakeRemote {
            profile: Err(RemoteError::Http {
                status: 401,
                message: "expired".to_string(),
            }),
        };
        let outcome = auth.refresh_from_server(&remote).await.unwrap();
        assert!(matches!(outcome, RefreshOutcome::Rejected(_)));
        assert_eq!(auth.phase(), AuthPhase::LoggedOut);
        assert!(backends.read_first(CREDENTIAL_KEY).unwrap().is_none());
    }

    #[test]
    fn test_upload_guard_keeps_avatar() {
        let backends = Backends::in_memory();
        let mut auth = state(&backends);
        let mut profile = server_profile("jane@example.com");
        profile.avatar = Some("data:image/png;base64,OLD".to_string());
        auth.login(profile, "tok", true).unwrap();

        auth.begin_avatar_upload().unwrap();
        let mut stale = server_profile("jane@example.com");
        stale.avatar = None;
        stale.phone = Some("555".to_string());
        auth.apply_server_record(stale).unwrap();

        let user = auth.user().unwrap();
        assert_eq!(user.avatar, AvatarRef::Inline("data:image/png;base64,OLD".to_string()));
        assert_eq!(user.phone.as_deref(), Some("555"));
        assert!(auth.upload_in_progress());

        auth.finish_avatar_upload(UploadResult::Succeeded {
            avatar: "data:image/png;base64,NEW".to_string(),
        })
        .unwrap();
        assert!(!auth.upload_in_progress());
        assert_eq!(auth.user().unwrap().avatar, AvatarRef::Inline("data:image/png;base64,NEW".to_string()));
        assert!(auth.user().unwrap().has_custom_avatar);
    }

    #[test]
    fn test_failed_upload_clears_guard() {
        let backends = Backends::in_memory();
        let mut auth = state(&backends);
        auth.login(server_profile("jane@example.com"), "tok", true).unwrap();
        auth.begin_avatar_upload().unwrap();
        auth.finish_avatar_upload(UploadResult::Failed {
            reason: "too large".to_string(),
        })
        .unwrap();
        assert!(!auth.upload_in_progress());

        let mut fresh = server_profile("jane@example.com");
        fresh.avatar = Some(PLACEHOLDER_TOKEN.to_string());
        auth.apply_server_record(fresh).unwrap();
        assert_eq!(auth.user().unwrap().avatar, AvatarRef::Placeholder);
    }

    #[test]
    fn test_huge_avatar_persisted_as_placeholder() {
        let backends = Backends::in_memory();
        let mut auth = state(&backends);
        auth.login(server_profile("jane@example.com"), "tok", true).unwrap();
        auth.begin_avatar_upload().unwrap();
        auth.finish_avatar_upload(UploadResult::Succeeded {
            avatar: "x".repeat(2_000_000),
        })
        .unwrap();

        let (_, stored): (_, IdentityRecord) = SafeSerializer::default()
            .read_first(&backends, IDENTITY_KEY)
            .unwrap()
            .unwrap();
        assert_eq!(stored.avatar, AvatarRef::Placeholder);
        assert!(stored.has_custom_avatar);
    }

    #[test]
    fn test_clear_auth_data() {
        let backends = Backends::in_memory();
        let recorder = Arc::new(Recorder::default());
        let mut auth = state(&backends);
        auth.subscribe(recorder.clone());
        auth.login(server_profile("jane@example.com"), "tok", true).unwrap();

        auth.clear_auth_data().unwrap();
        assert_eq!(auth.phase(), AuthPhase::LoggedOut);
        assert!(auth.user().is_none());
        assert!(backends.read_first(IDENTITY_KEY).unwrap().is_none());
        assert!(backends.read_first(CREDENTIAL_KEY).unwrap().is_none());
        assert_eq!(backends.active(), Backend::Ephemeral);
        assert_eq!(recorder.events.lock().unwrap().last(), Some(&AuthEvent::SignedOut));
    }
}
