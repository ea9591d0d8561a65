use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::users::Role;

/// Type of JWT: access or refresh.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    #[serde(alias = "Access")]
    Access,
    #[serde(alias = "Refresh")]
    Refresh,
}

/// The identity both tokens are minted from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimSet {
    pub user_id: Uuid,
    pub email: String,
    pub role: Role,
}

/// JWT payload used for authentication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,       // user ID
    pub email: String,   // as stored
    pub role: Role,      // portal role
    pub iat: usize,      // issued at (unix timestamp)
    pub exp: usize,      // expires at (unix timestamp)
    pub iss: String,     // issuer
    pub aud: String,     // audience
    pub kind: TokenKind, // token type
    pub jti: Uuid,       // token id
}

impl Claims {
    pub fn claim_set(&self) -> ClaimSet {
        ClaimSet {
            user_id: self.sub,
            email: self.email.clone(),
            role: self.role,
        }
    }
}
