//! Wire types returned by the profile and favorites service.

use serde::{Deserialize, Serialize};

/// A user profile in the server's naming convention.
///
/// The server splits the name into given and family parts, keys the record
/// by `_id` and uses camelCase flags.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerProfile {
    /// Server-side user id.
    #[serde(rename = "_id")]
    pub id: String,
    /// Email address.
    #[serde(default)]
    pub email: Option<String>,
    /// Given name.
    #[serde(default)]
    pub first_name: Option<String>,
    /// Family name.
    #[serde(default)]
    pub last_name: Option<String>,
    /// Phone number.
    #[serde(default)]
    pub phone: Option<String>,
    /// Birthday as sent by the server (ISO date).
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
    /// Inline avatar payload or the placeholder token.
    #[serde(default)]
    pub avatar: Option<String>,
    /// Whether a custom avatar exists server-side.
    #[serde(default)]
    pub has_custom_avatar: bool,
    /// Creation time (RFC 3339).
    #[serde(default)]
    pub created_at: Option<String>,
    /// Last update time (RFC 3339).
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// Body of a profile response: either wrapped in `{"user": ...}` or bare.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum ProfileResponse {
    Wrapped { user: ServerProfile },
    Bare(ServerProfile),
}

impl ProfileResponse {
    pub(crate) fn into_profile(self) -> ServerProfile {
        match self {
            ProfileResponse::Wrapped { user } => user,
            ProfileResponse::Bare(profile) => profile,
        }
    }
}

/// One favorite as listed by the server.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum FavoriteItem {
    Id(String),
    Object {
        #[serde(rename = "productId")]
        product_id: String,
    },
}

impl FavoriteItem {
    pub(crate) fn into_id(self) -> String {
        match self {
            FavoriteItem::Id(id) => id,
            FavoriteItem::Object { product_id } => product_id,
        }
    }
}

/// Body of a favorites listing.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct FavoritesResponse {
    #[serde(default)]
    pub(crate) favorites: Vec<FavoriteItem>,
}

/// Request body of a favorite toggle.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ToggleRequest<'a> {
    pub(crate) product_id: &'a str,
}

/// Server verdict after toggling a favorite.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FavoriteToggle {
    /// Whether the product is now a favorite.
    pub is_favorite: bool,
    /// Human-readable message from the server.
    #[serde(default)]
    pub message: String,
}
