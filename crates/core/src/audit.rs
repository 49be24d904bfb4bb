//! Audit event name constants.
//!
//! Every security-relevant operation appends an audit event naming an action
//! and a resource. Constants live here so the API layer and any future
//! tooling agree on spelling.

/// Known action names for audit events.
pub mod actions {
    pub const LOGIN: &str = "Login";
    pub const REFRESH_TOKEN: &str = "RefreshToken";
    pub const LOGOUT: &str = "Logout";
    pub const CHANGE_PASSWORD: &str = "ChangePassword";
    pub const ENABLE_TWO_FACTOR: &str = "EnableTwoFactor";
}

/// Known resource names for audit events.
pub mod resources {
    pub const AUTHENTICATION: &str = "Authentication";
    pub const USER: &str = "User";
}
