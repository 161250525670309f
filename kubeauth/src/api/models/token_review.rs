//! TokenReview request/response documents (`authentication.k8s.io/v1beta1`).

use serde::{Deserialize, Serialize};

use crate::auth::UserInfo;

pub const API_VERSION: &str = "authentication.k8s.io/v1beta1";
pub const KIND: &str = "TokenReview";

// Request models
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenReviewRequest {
    #[serde(default)]
    pub api_version: String,
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub spec: TokenReviewSpec,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TokenReviewSpec {
    #[serde(default)]
    pub token: String,
}

// Response models
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenReviewResponse {
    pub api_version: String,
    pub kind: String,
    pub status: TokenReviewStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TokenReviewStatus {
    pub authenticated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<TokenReviewUser>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TokenReviewUser {
    pub username: String,
    pub groups: Vec<String>,
}

impl TokenReviewResponse {
    pub fn authenticated(user: UserInfo) -> Self {
        Self::with_status(TokenReviewStatus {
            authenticated: true,
            user: Some(TokenReviewUser {
                username: user.username,
                groups: user.groups,
            }),
        })
    }

    pub fn unauthenticated() -> Self {
        Self::with_status(TokenReviewStatus {
            authenticated: false,
            user: None,
        })
    }

    fn with_status(status: TokenReviewStatus) -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            status,
        }
    }
}

impl From<Option<UserInfo>> for TokenReviewResponse {
    fn from(user: Option<UserInfo>) -> Self {
        match user {
            Some(user) => Self::authenticated(user),
            None => Self::unauthenticated(),
        }
    }
}
