use chrono::{Duration, Utc};
use serde_json::{json, Value};

use crate::{
    api::types::{Locale, TokenResponse, User},
    state::{permissions::Role, session::Session},
};

pub fn user(role: Role) -> User {
    User {
        id: "user-1".into(),
        email: "somchai@example.co.th".into(),
        display_name: "Somchai Jaidee".into(),
        role,
        locale: Locale::Th,
    }
}

pub fn token_response(access: &str, refresh: &str, expires_in: i64) -> TokenResponse {
    TokenResponse {
        user: user(Role::Customer),
        access_token: access.into(),
        refresh_token: refresh.into(),
        expires_in,
    }
}

/// Login / refresh response body as the server sends it.
pub fn token_json(access: &str, refresh: &str, expires_in: i64, role: &str) -> Value {
    json!({
        "user": {
            "id": "user-1",
            "email": "somchai@example.co.th",
            "displayName": "Somchai Jaidee",
            "role": role,
            "locale": "th"
        },
        "accessToken": access,
        "refreshToken": refresh,
        "expiresIn": expires_in
    })
}

/// A session expiring `expires_in` seconds from now; negative values are
/// already expired.
pub fn session(access: &str, refresh: &str, expires_in: i64) -> Session {
    session_for(access, refresh, expires_in, Role::Customer)
}

pub fn session_for(access: &str, refresh: &str, expires_in: i64, role: Role) -> Session {
    Session {
        access_token: access.into(),
        refresh_token: refresh.into(),
        user: user(role),
        expires_at: Utc::now() + Duration::seconds(expires_in),
    }
}
