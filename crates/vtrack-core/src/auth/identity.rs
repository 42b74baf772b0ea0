use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Privilege level of an authenticated user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub enum Role {
    Admin,
    #[default]
    User,
}

/// The authenticated user as reported by the auth service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct UserIdentity {
    /// Opaque server-side identifier
    pub id: String,
    pub email: String,
    pub role: Role,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl UserIdentity {
    pub fn new(id: impl Into<String>, email: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            email: email.into(),
            role,
            first_name: None,
            last_name: None,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// "First Last" when the profile has a name, otherwise the email
    pub fn display_name(&self) -> String {
        let name = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        if name.is_empty() {
            self.email.clone()
        } else {
            name
        }
    }
}

/// User ids arrive as integers from the SQL backend but are treated as opaque.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Int(i64),
    Text(String),
}

/// Wire shape of the `user` object. `role` is newer than `is_admin`, so either
/// may be missing.
#[derive(Deserialize)]
struct UserPayload {
    id: RawId,
    email: String,
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    is_admin: Option<bool>,
    #[serde(default)]
    first_name: Option<String>,
    #[serde(default)]
    last_name: Option<String>,
}

impl<'de> Deserialize<'de> for UserIdentity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let payload = UserPayload::deserialize(deserializer)?;

        let role = match payload.role.as_deref().map(str::to_ascii_lowercase).as_deref() {
            Some("admin") => Role::Admin,
            Some(_) => Role::User,
            None if payload.is_admin == Some(true) => Role::Admin,
            None => Role::User,
        };

        Ok(Self {
            id: match payload.id {
                RawId::Int(n) => n.to_string(),
                RawId::Text(s) => s,
            },
            email: payload.email,
            role,
            first_name: payload.first_name,
            last_name: payload.last_name,
        })
    }
}

/// Login form credentials.
#[derive(Clone, Serialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}
