//! The canonical identity record and its two input shapes.
//!
//! The profile service and the client each name identity fields their own
//! way. Both shapes are decoded into [`IdentityShape`] and funnelled through
//! [`validate`], which is the only place that reconciles them.

use crate::error::ValidationError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use turbo_cache::Persist;
use turbo_data::ServerProfile;

/// Sentinel stored instead of an avatar payload that is too large to cache.
pub const PLACEHOLDER_TOKEN: &str = "custom-avatar";

/// Reference to a user's avatar.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Option<String>", into = "Option<String>")]
pub enum AvatarRef {
    /// No avatar.
    #[default]
    None,
    /// Inline image encoding (e.g. a data URL).
    Inline(String),
    /// A full avatar exists server-side; fetch on demand.
    Placeholder,
}

impl AvatarRef {
    /// Check if this is the placeholder token.
    pub fn is_placeholder(&self) -> bool {
        matches!(self, AvatarRef::Placeholder)
    }

    /// Check if there is any avatar at all.
    pub fn is_present(&self) -> bool {
        !matches!(self, AvatarRef::None)
    }

    /// Length of the inline payload in bytes (0 otherwise).
    pub fn payload_len(&self) -> usize {
        match self {
            AvatarRef::Inline(data) => data.len(),
            _ => 0,
        }
    }
}

impl From<Option<String>> for AvatarRef {
    fn from(value: Option<String>) -> Self {
        match value {
            None => AvatarRef::None,
            Some(s) if s.is_empty() => AvatarRef::None,
            Some(s) if s == PLACEHOLDER_TOKEN => AvatarRef::Placeholder,
            Some(s) => AvatarRef::Inline(s),
        }
    }
}

impl From<AvatarRef> for Option<String> {
    fn from(value: AvatarRef) -> Self {
        match value {
            AvatarRef::None => None,
            AvatarRef::Inline(s) => Some(s),
            AvatarRef::Placeholder => Some(PLACEHOLDER_TOKEN.to_string()),
        }
    }
}

/// A validated, normalized identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityRecord {
    /// User id.
    pub id: String,
    /// Email address (unique).
    pub email: String,
    /// Name shown in the UI. Never empty.
    pub display_name: String,
    /// Phone number.
    #[serde(default)]
    pub phone: Option<String>,
    /// Birthday (ISO date).
    #[serde(default)]
    pub birthday: Option<String>,
    /// Admin flag.
    #[serde(default)]
    pub is_admin: bool,
    /// Email verified flag.
    #[serde(default)]
    pub email_verified: bool,
    /// Banned flag.
    #[serde(default)]
    pub is_banned: bool,
    /// Avatar reference.
    #[serde(default)]
    pub avatar: AvatarRef,
    /// Whether a custom avatar exists server-side.
    #[serde(default)]
    pub has_custom_avatar: bool,
    /// Creation time.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// Last update time.
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    /// Set while an avatar upload is in flight. Never persisted.
    #[serde(skip)]
    pub upload_in_progress: bool,
}

impl IdentityRecord {
    /// Re-run validation on an existing record.
    pub fn normalize(self) -> Result<Self, ValidationError> {
        let upload_in_progress = self.upload_in_progress;
        let mut record = validate(IdentityShape::from(self))?;
        record.upload_in_progress = upload_in_progress;
        Ok(record)
    }

    /// Keep this record's avatar fields in place of `incoming`'s.
    pub(crate) fn keep_avatar_of(&self, incoming: &mut IdentityRecord) {
        incoming.avatar = self.avatar.clone();
        incoming.has_custom_avatar = self.has_custom_avatar;
    }
}

impl Persist for IdentityRecord {
    const KIND: &'static str = "identity";

    fn bound_payloads(&mut self, limit: usize) -> bool {
        if self.avatar.payload_len() > limit {
            self.avatar = AvatarRef::Placeholder;
            self.has_custom_avatar = true;
            return true;
        }
        false
    }

    fn minimal(&self) -> Option<Self> {
        Some(Self {
            id: self.id.clone(),
            email: self.email.clone(),
            display_name: self.display_name.clone(),
            phone: None,
            birthday: None,
            is_admin: self.is_admin,
            email_verified: false,
            is_banned: false,
            avatar: AvatarRef::Placeholder,
            has_custom_avatar: true,
            created_at: None,
            updated_at: None,
            upload_in_progress: false,
        })
    }
}

/// An identity in the client's own naming convention.
///
/// Older clients stored `_id`, a combined `name` and a lowercase `isadmin`
/// flag. Those spellings are separate fields so a payload carrying both the
/// old and the current one still decodes; the current spelling wins.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientProfile {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default, rename = "_id", skip_serializing_if = "Option::is_none")]
    pub legacy_id: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub birthday: Option<String>,
    #[serde(default)]
    pub is_admin: Option<bool>,
    #[serde(default, rename = "isadmin", skip_serializing_if = "Option::is_none")]
    pub legacy_is_admin: Option<bool>,
    #[serde(default)]
    pub email_verified: bool,
    #[serde(default)]
    pub is_banned: bool,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub has_custom_avatar: bool,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl From<IdentityRecord> for ClientProfile {
    fn from(record: IdentityRecord) -> Self {
        Self {
            id: Some(record.id),
            legacy_id: None,
            email: Some(record.email),
            display_name: Some(record.display_name),
            name: None,
            phone: record.phone,
            birthday: record.birthday,
            is_admin: Some(record.is_admin),
            legacy_is_admin: None,
            email_verified: record.email_verified,
            is_banned: record.is_banned,
            avatar: record.avatar.into(),
            has_custom_avatar: record.has_custom_avatar,
            created_at: record.created_at.map(|t| t.to_rfc3339()),
            updated_at: record.updated_at.map(|t| t.to_rfc3339()),
        }
    }
}

/// Identity input in either naming convention.
///
/// Deserializing tries the server shape first (it requires `_id`), then
/// falls back to the client shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IdentityShape {
    /// As returned by the profile service.
    Server(ServerProfile),
    /// As produced by the client.
    Client(ClientProfile),
}

impl From<ServerProfile> for IdentityShape {
    fn from(profile: ServerProfile) -> Self {
        IdentityShape::Server(profile)
    }
}

impl From<ClientProfile> for IdentityShape {
    fn from(profile: ClientProfile) -> Self {
        IdentityShape::Client(profile)
    }
}

impl From<IdentityRecord> for IdentityShape {
    fn from(record: IdentityRecord) -> Self {
        IdentityShape::Client(record.into())
    }
}

/// Fields common to both shapes, after name reconciliation.
struct Fields {
    id: Option<String>,
    email: Option<String>,
    display_name: Option<String>,
    phone: Option<String>,
    birthday: Option<String>,
    is_admin: bool,
    email_verified: bool,
    is_banned: bool,
    avatar: Option<String>,
    has_custom_avatar: bool,
    created_at: Option<String>,
    updated_at: Option<String>,
}

impl From<IdentityShape> for Fields {
    fn from(shape: IdentityShape) -> Self {
        match shape {
            IdentityShape::Server(p) => {
                let full_name = [p.first_name.as_deref(), p.last_name.as_deref()]
                    .into_iter()
                    .flatten()
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .collect::<Vec<_>>()
                    .join(" ");
                Self {
                    id: Some(p.id),
                    email: p.email,
                    display_name: Some(full_name),
                    phone: p.phone,
                    birthday: p.birthday,
                    is_admin: p.is_admin,
                    email_verified: p.email_verified,
                    is_banned: p.is_banned,
                    avatar: p.avatar,
                    has_custom_avatar: p.has_custom_avatar,
                    created_at: p.created_at,
                    updated_at: p.updated_at,
                }
            }
            IdentityShape::Client(p) => Self {
                id: non_empty(p.id).or(p.legacy_id),
                email: p.email,
                display_name: non_empty(p.display_name).or(p.name),
                phone: p.phone,
                birthday: p.birthday,
                is_admin: p.is_admin.or(p.legacy_is_admin).unwrap_or(false),
                email_verified: p.email_verified,
                is_banned: p.is_banned,
                avatar: p.avatar,
                has_custom_avatar: p.has_custom_avatar,
                created_at: p.created_at,
                updated_at: p.updated_at,
            },
        }
    }
}

/// Validate identity input and normalize it into an [`IdentityRecord`].
///
/// Fails if the email is missing or not of the form `local@domain.tld`.
/// An empty display name is synthesized from the email's local part, and a
/// missing id falls back to the email.
pub fn validate(shape: impl Into<IdentityShape>) -> Result<IdentityRecord, ValidationError> {
    let fields = Fields::from(shape.into());

    let email = fields
        .email
        .as_deref()
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .ok_or(ValidationError::MissingEmail)?
        .to_string();
    let local_part = split_email(&email).ok_or_else(|| ValidationError::MalformedEmail(email.clone()))?.0;

    let display_name = match non_empty(fields.display_name) {
        Some(name) => name,
        None => local_part.to_string(),
    };
    let id = non_empty(fields.id).unwrap_or_else(|| email.clone());
    let avatar = AvatarRef::from(fields.avatar);
    let has_custom_avatar = fields.has_custom_avatar || avatar.is_placeholder();

    Ok(IdentityRecord {
        id,
        display_name,
        phone: non_empty(fields.phone),
        birthday: non_empty(fields.birthday),
        is_admin: fields.is_admin,
        email_verified: fields.email_verified,
        is_banned: fields.is_banned,
        avatar,
        has_custom_avatar,
        created_at: parse_timestamp(fields.created_at.as_deref()),
        updated_at: parse_timestamp(fields.updated_at.as_deref()),
        upload_in_progress: false,
        email,
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Split `local@domain.tld` into `(local, domain)`.
fn split_email(email: &str) -> Option<(&str, &str)> {
    if email.chars().any(char::is_whitespace) {
        return None;
    }
    let (local, domain) = email.split_once('@')?;
    if local.is_empty() || domain.contains('@') {
        return None;
    }
    let (host, tld) = domain.rsplit_once('.')?;
    if host.is_empty() || tld.is_empty() || host.split('.').any(str::is_empty) {
        return None;
    }
    Some((local, domain))
}

fn parse_timestamp(value: Option<&str>) -> Option<DateTime<Utc>> {
    let value = value?;
    match DateTime::parse_from_rfc3339(value) {
        Ok(t) => Some(t.with_timezone(&Utc)),
        Err(e) => {
            tracing::debug!(value, error = %e, "ignoring unparseable timestamp");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use turbo_cache::SafeSerializer;

    fn client(email: &str) -> ClientProfile {
        ClientProfile {
            email: Some(email.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_display_name_from_email() {
        let record = validate(client("a@b.com")).unwrap();
        assert_eq!(record.display_name, "a");
        assert_eq!(record.id, "a@b.com");
    }

    #[test]
    fn test_missing_email() {
        assert_eq!(
            validate(ClientProfile::default()).unwrap_err(),
            ValidationError::MissingEmail
        );
        assert_eq!(validate(client("   ")).unwrap_err(), ValidationError::MissingEmail);
    }

    #[test]
    fn test_malformed_email() {
        for bad in ["plain", "@b.com", "a@b", "a@.com", "a@b.", "a b@c.com", "a@b@c.com"] {
            assert!(
                matches!(validate(client(bad)), Err(ValidationError::MalformedEmail(_))),
                "{bad} should be rejected"
            );
        }
        assert!(validate(client("first.last@mail.example.co")).is_ok());
    }

    #[test]
    fn test_server_shape_joins_names() {
        let profile = ServerProfile {
            id: "u1".to_string(),
            email: Some("jane@example.com".to_string()),
            first_name: Some("Jane".to_string()),
            last_name: Some(" Doe ".to_string()),
            is_admin: true,
            ..Default::default()
        };
        let record = validate(profile).unwrap();
        assert_eq!(record.id, "u1");
        assert_eq!(record.display_name, "Jane Doe");
        assert!(record.is_admin);
    }

    #[test]
    fn test_server_shape_without_names() {
        let profile = ServerProfile {
            id: "u1".to_string(),
            email: Some("jane@example.com".to_string()),
            ..Default::default()
        };
        assert_eq!(validate(profile).unwrap().display_name, "jane");
    }

    #[test]
    fn test_shapes_decode_from_json() {
        let server: IdentityShape =
            serde_json::from_str(r#"{"_id":"u1","email":"a@b.com","firstName":"Ann","isAdmin":true}"#).unwrap();
        assert!(matches!(server, IdentityShape::Server(_)));

        let legacy: IdentityShape =
            serde_json::from_str(r#"{"email":"a@b.com","name":"Ann B","isadmin":true}"#).unwrap();
        let record = validate(legacy).unwrap();
        assert_eq!(record.display_name, "Ann B");
        assert!(record.is_admin);
    }

    #[test]
    fn test_client_shape_tolerates_both_spellings() {
        let both: ClientProfile = serde_json::from_str(
            r#"{"id":"u7","email":"a@b.com","displayName":"Ann","name":"Old Name","isAdmin":false,"isadmin":true}"#,
        )
        .unwrap();
        let record = validate(both).unwrap();
        assert_eq!(record.id, "u7");
        assert_eq!(record.display_name, "Ann");
        assert!(!record.is_admin);

        let legacy_only: ClientProfile =
            serde_json::from_str(r#"{"email":"a@b.com","name":"Old Name","isadmin":true}"#).unwrap();
        let record = validate(legacy_only).unwrap();
        assert_eq!(record.display_name, "Old Name");
        assert!(record.is_admin);
    }

    #[test]
    fn test_client_profile_writes_current_spelling_only() {
        let record = validate(client("a@b.com")).unwrap();
        let json = serde_json::to_value(ClientProfile::from(record)).unwrap();
        assert!(json.get("isadmin").is_none());
        assert!(json.get("name").is_none());
        assert!(json.get("_id").is_none());
        assert_eq!(json["isAdmin"], false);
    }

    #[test]
    fn test_placeholder_avatar_sets_flag() {
        let mut profile = client("a@b.com");
        profile.avatar = Some(PLACEHOLDER_TOKEN.to_string());
        let record = validate(profile).unwrap();
        assert_eq!(record.avatar, AvatarRef::Placeholder);
        assert!(record.has_custom_avatar);
    }

    #[test]
    fn test_timestamps_parsed() {
        let mut profile = client("a@b.com");
        profile.created_at = Some("2024-03-01T10:00:00Z".to_string());
        profile.updated_at = Some("not a date".to_string());
        let record = validate(profile).unwrap();
        assert!(record.created_at.is_some());
        assert!(record.updated_at.is_none());
    }

    #[test]
    fn test_oversized_avatar_replaced() {
        let mut profile = client("a@b.com");
        profile.avatar = Some("x".repeat(2_000_000));
        let record = validate(profile).unwrap();

        let serializer = SafeSerializer::default();
        let text = serializer.encode(&record).unwrap();
        let decoded: IdentityRecord = serializer.decode(&text).unwrap();
        assert_eq!(decoded.avatar, AvatarRef::Placeholder);
        assert!(decoded.has_custom_avatar);
        assert!(text.contains(PLACEHOLDER_TOKEN));
    }

    #[test]
    fn test_small_avatar_kept() {
        let mut profile = client("a@b.com");
        profile.avatar = Some("data:image/png;base64,AAAA".to_string());
        let record = validate(profile).unwrap();

        let serializer = SafeSerializer::default();
        let decoded: IdentityRecord = serializer.decode(&serializer.encode(&record).unwrap()).unwrap();
        assert_eq!(decoded.avatar, record.avatar);
        assert!(!decoded.has_custom_avatar);
    }

    #[test]
    fn test_normalize_after_round_trip_preserves_identity() {
        let mut profile = client("Jane.Doe@Example.com");
        profile.id = Some("u-42".to_string());
        profile.display_name = Some("Jane".to_string());
        profile.created_at = Some("2024-03-01T10:00:00+02:00".to_string());
        let record = validate(profile).unwrap();

        let serializer = SafeSerializer::default();
        let decoded: IdentityRecord = serializer.decode(&serializer.encode(&record).unwrap()).unwrap();
        let normalized = decoded.normalize().unwrap();
        assert_eq!(normalized.id, record.id);
        assert_eq!(normalized.email, record.email);
        assert_eq!(normalized.display_name, record.display_name);
        assert_eq!(normalized.created_at, record.created_at);
    }

    #[test]
    fn test_minimal_form() {
        let mut profile = client("a@b.com");
        profile.phone = Some("555".to_string());
        profile.is_admin = Some(true);
        let minimal = validate(profile).unwrap().minimal().unwrap();
        assert_eq!(minimal.phone, None);
        assert!(minimal.is_admin);
        assert_eq!(minimal.avatar, AvatarRef::Placeholder);
    }
}
