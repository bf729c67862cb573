//! User model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Decode, Encode, FromRow, Postgres};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// User role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    #[default]
    User,
    Guide,
    LeadGuide,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Guide => "guide",
            Role::LeadGuide => "lead-guide",
            Role::Admin => "admin",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "guide" => Ok(Role::Guide),
            "lead-guide" => Ok(Role::LeadGuide),
            "admin" => Ok(Role::Admin),
            _ => Err(format!("Invalid role: {}", s)),
        }
    }
}

// SQLx conversion for Role
impl sqlx::Type<Postgres> for Role {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<Postgres>>::type_info()
    }
}

impl<'r> Decode<'r, Postgres> for Role {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s: String = Decode::<Postgres>::decode(value)?;
        s.parse().map_err(|e: String| e.into())
    }
}

impl Encode<'_, Postgres> for Role {
    fn encode_by_ref(&self, buf: &mut sqlx::postgres::PgArgumentBuffer) -> sqlx::encode::IsNull {
        <&str as Encode<Postgres>>::encode(self.as_str(), buf)
    }
}

/// Full user model from database
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub photo: String,
    pub role: Role,
    /// Hashed password (argon2)
    #[serde(skip_serializing)]
    pub password: String,
    pub password_changed_at: Option<DateTime<Utc>>,
    pub active: bool,
    /// Incremented on every write
    #[serde(skip_serializing)]
    pub version: i32,
    pub created_at: DateTime<Utc>,
}

/// User fields embedded into tours in place of guide identifiers.
///
/// Password, password change tracking and version never leave the users table
/// through this type.
#[derive(Debug, Clone, PartialEq, Serialize, FromRow, ToSchema)]
pub struct GuideSummary {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub photo: String,
    pub role: Role,
}

/// Create user request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateUser {
    #[validate(length(min = 1, message = "Please tell us your name!"))]
    pub name: String,
    #[validate(email(message = "Please provide a valid email"))]
    pub email: String,
    pub photo: Option<String>,
    #[serde(default)]
    pub role: Role,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
}

impl CreateUser {
    pub fn normalized(mut self) -> Self {
        self.name = self.name.trim().to_string();
        self.email = self.email.trim().to_lowercase();
        self
    }
}

/// Update user request
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUser {
    #[validate(length(min = 1, message = "Please tell us your name!"))]
    pub name: Option<String>,
    #[validate(email(message = "Please provide a valid email"))]
    pub email: Option<String>,
    pub photo: Option<String>,
    pub role: Option<Role>,
    pub active: Option<bool>,
}

impl UpdateUser {
    pub fn normalized(mut self) -> Self {
        self.name = self.name.map(|n| n.trim().to_string());
        self.email = self.email.map(|e| e.trim().to_lowercase());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trip() {
        assert_eq!("lead-guide".parse::<Role>(), Ok(Role::LeadGuide));
        assert_eq!(Role::LeadGuide.as_str(), "lead-guide");
        assert_eq!(
            serde_json::to_value(Role::LeadGuide).unwrap(),
            serde_json::json!("lead-guide")
        );
        assert!("root".parse::<Role>().is_err());
    }

    #[test]
    fn test_user_hides_secrets() {
        let user = User {
            id: Uuid::new_v4(),
            name: "Leo Gillespie".to_string(),
            email: "leo@example.com".to_string(),
            photo: "default.jpg".to_string(),
            role: Role::Guide,
            password: "$argon2id$v=19$...".to_string(),
            password_changed_at: None,
            active: true,
            version: 3,
            created_at: Utc::now(),
        };
        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password").is_none());
        assert!(json.get("version").is_none());
        assert_eq!(json["role"], "guide");
    }

    #[test]
    fn test_create_user_validation() {
        let user = CreateUser {
            name: "  Jonas  ".to_string(),
            email: " Jonas@Example.COM ".to_string(),
            photo: None,
            role: Role::User,
            password: "pass1234".to_string(),
        }
        .normalized();
        assert_eq!(user.email, "jonas@example.com");
        assert!(user.validate().is_ok());

        let bad = CreateUser {
            email: "not-an-email".to_string(),
            ..user
        };
        assert!(bad.validate().is_err());
    }
}
