use serde::{Deserialize, Serialize};

/// Request body for `POST /auth/signup/`.
#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub username: String,
    pub email: String,
}

/// Echoed back on success; never carries the confirmation code.
#[derive(Debug, Serialize)]
pub struct SignupResponse {
    pub username: String,
    pub email: String,
}

/// Request body for `POST /auth/token/`.
#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    pub username: String,
    pub confirmation_code: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
}
