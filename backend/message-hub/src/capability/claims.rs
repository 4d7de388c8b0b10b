use serde::{Deserialize, Serialize};

/// Actions a capability token can authorize
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CapabilityAction {
    #[serde(rename = "post-message")]
    PostMessage,
    #[serde(rename = "get-messages")]
    GetMessages,
}

impl CapabilityAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            CapabilityAction::PostMessage => "post-message",
            CapabilityAction::GetMessages => "get-messages",
        }
    }
}

/// Wire claims of a capability token
///
/// Unknown actions and missing fields fail deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityClaims {
    /// Subject user id
    pub id: String,
    /// Subject display name
    pub name: String,
    /// Hub the token is addressed to
    pub hub: String,
    pub scope: CapabilityAction,
    /// Counter-party user ids. Post tokens call these `friends`.
    #[serde(alias = "friends")]
    pub users: Vec<String>,
    pub exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
}
