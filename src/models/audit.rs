//! Audit trail model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Decode, Encode, FromRow, Postgres};
use utoipa::{IntoParams, ToSchema};

/// Mutating action recorded in the audit trail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    Create,
    Update,
    Delete,
    Return,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Create => "CREATE",
            AuditAction::Update => "UPDATE",
            AuditAction::Delete => "DELETE",
            AuditAction::Return => "RETURN",
        }
    }
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for AuditAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "CREATE" => Ok(AuditAction::Create),
            "UPDATE" => Ok(AuditAction::Update),
            "DELETE" => Ok(AuditAction::Delete),
            "RETURN" => Ok(AuditAction::Return),
            _ => Err(format!("Invalid audit action: {}", s)),
        }
    }
}

// SQLx conversion for AuditAction (stored as TEXT)
impl sqlx::Type<Postgres> for AuditAction {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<Postgres>>::type_info()
    }
}

impl<'r> Decode<'r, Postgres> for AuditAction {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s: String = Decode::<Postgres>::decode(value)?;
        s.parse().map_err(|e: String| e.into())
    }
}

impl Encode<'_, Postgres> for AuditAction {
    fn encode_by_ref(&self, buf: &mut sqlx::postgres::PgArgumentBuffer) -> sqlx::encode::IsNull {
        <String as Encode<Postgres>>::encode(self.as_str().to_string(), buf)
    }
}

/// Audit entry from database. Append-only; never updated or deleted
/// by normal operations.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct AuditEntry {
    pub id: i32,
    pub action: AuditAction,
    /// Entity tag: "Book", "Loan" or "User"
    pub entity_type: String,
    pub entity_id: Option<i32>,
    /// Reassigned to the deleting administrator when the original actor
    /// is removed, preserving history without dangling references
    pub acting_user_id: Option<i32>,
    pub details: String,
    pub created_at: DateTime<Utc>,
}

/// New audit entry, appended within the transaction of the operation
/// it records
#[derive(Debug)]
pub struct NewAuditEntry {
    pub action: AuditAction,
    pub entity_type: &'static str,
    pub entity_id: Option<i32>,
    pub acting_user_id: Option<i32>,
    pub details: String,
}

/// Audit listing parameters
#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct AuditQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_parses_both_cases() {
        assert_eq!("RETURN".parse::<AuditAction>().unwrap(), AuditAction::Return);
        assert_eq!("delete".parse::<AuditAction>().unwrap(), AuditAction::Delete);
        assert!("PURGE".parse::<AuditAction>().is_err());
    }
}
