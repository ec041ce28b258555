//! Display profile derived from the session's user record.

use alloy_primitives::Address;
use serde::Serialize;

use crate::session::UserInfo;

const DEFAULT_NAME: &str = "User";
const DEFAULT_EMAIL: &str = "user@example.com";
const DEFAULT_IMAGE: &str = "https://images.unsplash.com/photo-1506794778202-cad84cf45f1d";
const DEFAULT_SHORT_ID: &str = "8F2A7C3D";

/// Greeting shown once after login.
pub const WELCOME_MESSAGE: &str = "Welcome to TopupGo";

/// What the dashboard shows about the logged-in user.
///
/// Every field is populated; missing or empty values in [`UserInfo`] fall
/// back to fixed placeholders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileView {
    /// Display name.
    pub name: String,
    /// Email address.
    pub email: String,
    /// Avatar URL.
    pub image: String,
    /// Username, or the verifier id, or the local part of the email.
    pub username: String,
    /// Up to eight upper-case alphanumerics derived from the user id.
    pub short_id: String,
}

fn present(value: Option<&String>) -> Option<&str> {
    value.map(String::as_str).filter(|s| !s.is_empty())
}

impl From<&UserInfo> for ProfileView {
    fn from(info: &UserInfo) -> Self {
        let name = present(info.name.as_ref()).unwrap_or(DEFAULT_NAME);
        let email = present(info.email.as_ref()).unwrap_or(DEFAULT_EMAIL);
        let image = present(info.profile_image.as_ref()).unwrap_or(DEFAULT_IMAGE);
        let username = present(info.username.as_ref())
            .or_else(|| present(info.verifier_id.as_ref()))
            .unwrap_or_else(|| email.split('@').next().unwrap_or(email));
        let id = present(info.id.as_ref())
            .or_else(|| present(info.verifier_id.as_ref()))
            .unwrap_or(DEFAULT_SHORT_ID);

        Self {
            name: name.to_owned(),
            email: email.to_owned(),
            image: image.to_owned(),
            username: username.to_owned(),
            short_id: short_id(id),
        }
    }
}

impl Default for ProfileView {
    fn default() -> Self {
        Self::from(&UserInfo::default())
    }
}

fn short_id(raw: &str) -> String {
    raw.chars()
        .filter(char::is_ascii_alphanumeric)
        .take(8)
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// Shortens an address for display: `0x2791...4174`.
#[must_use]
pub fn truncate_address(address: &Address) -> String {
    let full = address.to_checksum(None);
    format!("{}...{}", &full[..6], &full[full.len() - 4..])
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;

    #[test]
    fn test_defaults_for_empty_user() {
        let view = ProfileView::default();
        assert_eq!(view.name, "User");
        assert_eq!(view.email, "user@example.com");
        assert_eq!(view.username, "user");
        assert_eq!(view.short_id, "8F2A7C3D");
    }

    #[test]
    fn test_username_falls_back_to_verifier_then_email() {
        let info = UserInfo {
            email: Some("jane.doe@mail.com".into()),
            verifier_id: Some("jane@google".into()),
            ..UserInfo::default()
        };
        assert_eq!(ProfileView::from(&info).username, "jane@google");

        let info = UserInfo {
            email: Some("jane.doe@mail.com".into()),
            username: Some(String::new()),
            ..UserInfo::default()
        };
        assert_eq!(ProfileView::from(&info).username, "jane.doe");
    }

    #[test]
    fn test_short_id_strips_and_uppercases() {
        let info = UserInfo {
            id: Some("a1-b2_c3.d4e5f6g7".into()),
            ..UserInfo::default()
        };
        assert_eq!(ProfileView::from(&info).short_id, "A1B2C3D4");
    }

    #[test]
    fn test_image_alias_deserializes() {
        let info: UserInfo =
            serde_json::from_str(r#"{"name":"Jane","image":"https://x/y.png"}"#).unwrap();
        assert_eq!(ProfileView::from(&info).image, "https://x/y.png");
    }

    #[test]
    fn test_truncate_address() {
        let addr = address!("2791Bca1f2de4661ED88A30C99A7a9449Aa84174");
        assert_eq!(truncate_address(&addr), "0x2791...4174");
    }
}
