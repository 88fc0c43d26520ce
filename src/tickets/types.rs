//! Ticket domain types and their database mappings.
//!
//! Status, priority, category and activity kinds are closed enum sets stored
//! as text columns. `FromStr` is the single parsing path, so external input
//! (API payloads, classification results) and database rows decode the same
//! way.

use chrono::{DateTime, Utc};
use diesel::deserialize::{self, FromSql};
use diesel::pg::{Pg, PgValue};
use diesel::prelude::*;
use diesel::serialize::{self, Output, ToSql};
use diesel::sql_types::Text;
use diesel::{AsExpression, FromSqlRow};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::shared::schema::{sla_policies, ticket_activities, tickets};

/// Raised when a stored or submitted label is outside the closed enum set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownEnumValue(pub String);

impl fmt::Display for UnknownEnumValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown enum value: {}", self.0)
    }
}

impl std::error::Error for UnknownEnumValue {}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsExpression, FromSqlRow,
)]
#[diesel(sql_type = Text)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    Open,
    InProgress,
    WaitingOnUser,
    Resolved,
    Closed,
    Cancelled,
}

impl TicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::InProgress => "in_progress",
            Self::WaitingOnUser => "waiting_on_user",
            Self::Resolved => "resolved",
            Self::Closed => "closed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Closed and Cancelled accept no further work; Resolved can be reopened.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed | Self::Cancelled)
    }
}

impl Default for TicketStatus {
    fn default() -> Self {
        Self::Open
    }
}

impl FromStr for TicketStatus {
    type Err = UnknownEnumValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(Self::Open),
            "in_progress" => Ok(Self::InProgress),
            "waiting_on_user" => Ok(Self::WaitingOnUser),
            "resolved" => Ok(Self::Resolved),
            "closed" => Ok(Self::Closed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(UnknownEnumValue(other.to_string())),
        }
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ToSql<Text, Pg> for TicketStatus {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        <str as ToSql<Text, Pg>>::to_sql(self.as_str(), out)
    }
}

impl FromSql<Text, Pg> for TicketStatus {
    fn from_sql(bytes: PgValue<'_>) -> deserialize::Result<Self> {
        let value = <String as FromSql<Text, Pg>>::from_sql(bytes)?;
        value.parse::<Self>().map_err(Into::into)
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsExpression, FromSqlRow,
)]
#[diesel(sql_type = Text)]
#[serde(rename_all = "snake_case")]
pub enum TicketPriority {
    Low,
    Medium,
    High,
    Urgent,
}

impl TicketPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Urgent => "urgent",
        }
    }
}

impl Default for TicketPriority {
    fn default() -> Self {
        Self::Medium
    }
}

impl FromStr for TicketPriority {
    type Err = UnknownEnumValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "urgent" => Ok(Self::Urgent),
            other => Err(UnknownEnumValue(other.to_string())),
        }
    }
}

impl fmt::Display for TicketPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ToSql<Text, Pg> for TicketPriority {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        <str as ToSql<Text, Pg>>::to_sql(self.as_str(), out)
    }
}

impl FromSql<Text, Pg> for TicketPriority {
    fn from_sql(bytes: PgValue<'_>) -> deserialize::Result<Self> {
        let value = <String as FromSql<Text, Pg>>::from_sql(bytes)?;
        value.parse::<Self>().map_err(Into::into)
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsExpression, FromSqlRow,
)]
#[diesel(sql_type = Text)]
#[serde(rename_all = "snake_case")]
pub enum TicketCategory {
    Hardware,
    Software,
    Network,
    Access,
    Email,
    Printer,
    Account,
    Other,
}

impl TicketCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hardware => "hardware",
            Self::Software => "software",
            Self::Network => "network",
            Self::Access => "access",
            Self::Email => "email",
            Self::Printer => "printer",
            Self::Account => "account",
            Self::Other => "other",
        }
    }
}

impl FromStr for TicketCategory {
    type Err = UnknownEnumValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hardware" => Ok(Self::Hardware),
            "software" => Ok(Self::Software),
            "network" => Ok(Self::Network),
            "access" => Ok(Self::Access),
            "email" => Ok(Self::Email),
            "printer" => Ok(Self::Printer),
            "account" => Ok(Self::Account),
            "other" => Ok(Self::Other),
            other => Err(UnknownEnumValue(other.to_string())),
        }
    }
}

impl fmt::Display for TicketCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ToSql<Text, Pg> for TicketCategory {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        <str as ToSql<Text, Pg>>::to_sql(self.as_str(), out)
    }
}

impl FromSql<Text, Pg> for TicketCategory {
    fn from_sql(bytes: PgValue<'_>) -> deserialize::Result<Self> {
        let value = <String as FromSql<Text, Pg>>::from_sql(bytes)?;
        value.parse::<Self>().map_err(Into::into)
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsExpression, FromSqlRow,
)]
#[diesel(sql_type = Text)]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
    Created,
    Updated,
    Comment,
    StatusChanged,
    Assigned,
    PriorityChanged,
    Resolved,
    Closed,
    Reopened,
}

impl ActivityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Comment => "comment",
            Self::StatusChanged => "status_changed",
            Self::Assigned => "assigned",
            Self::PriorityChanged => "priority_changed",
            Self::Resolved => "resolved",
            Self::Closed => "closed",
            Self::Reopened => "reopened",
        }
    }
}

impl FromStr for ActivityType {
    type Err = UnknownEnumValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(Self::Created),
            "updated" => Ok(Self::Updated),
            "comment" => Ok(Self::Comment),
            "status_changed" => Ok(Self::StatusChanged),
            "assigned" => Ok(Self::Assigned),
            "priority_changed" => Ok(Self::PriorityChanged),
            "resolved" => Ok(Self::Resolved),
            "closed" => Ok(Self::Closed),
            "reopened" => Ok(Self::Reopened),
            other => Err(UnknownEnumValue(other.to_string())),
        }
    }
}

impl fmt::Display for ActivityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ToSql<Text, Pg> for ActivityType {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        <str as ToSql<Text, Pg>>::to_sql(self.as_str(), out)
    }
}

impl FromSql<Text, Pg> for ActivityType {
    fn from_sql(bytes: PgValue<'_>) -> deserialize::Result<Self> {
        let value = <String as FromSql<Text, Pg>>::from_sql(bytes)?;
        value.parse::<Self>().map_err(Into::into)
    }
}

/// One support request. `id` and `ticket_number` are immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable)]
#[diesel(table_name = tickets)]
pub struct Ticket {
    pub id: i32,
    pub ticket_number: String,
    pub user_id: i32,
    pub assigned_to_id: Option<i32>,
    pub title: String,
    pub description: String,
    pub category: TicketCategory,
    pub priority: TicketPriority,
    pub status: TicketStatus,
    pub ai_classification: Option<String>,
    pub ai_confidence: Option<f64>,
    pub sla_deadline: Option<DateTime<Utc>>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = tickets)]
pub struct NewTicket {
    pub ticket_number: String,
    pub user_id: i32,
    pub title: String,
    pub description: String,
    pub category: TicketCategory,
    pub priority: TicketPriority,
    pub status: TicketStatus,
    pub sla_deadline: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Column-level changeset applied to a ticket row. `None` leaves the column
/// untouched; the nested options set nullable columns to NULL.
#[derive(Debug, Clone, Default, AsChangeset)]
#[diesel(table_name = tickets)]
pub struct TicketChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<TicketCategory>,
    pub priority: Option<TicketPriority>,
    pub status: Option<TicketStatus>,
    pub assigned_to_id: Option<Option<i32>>,
    pub ai_classification: Option<String>,
    pub ai_confidence: Option<f64>,
    pub sla_deadline: Option<Option<DateTime<Utc>>>,
    pub resolved_at: Option<Option<DateTime<Utc>>>,
    pub closed_at: Option<Option<DateTime<Utc>>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl TicketChanges {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.category.is_none()
            && self.priority.is_none()
            && self.status.is_none()
            && self.assigned_to_id.is_none()
            && self.ai_classification.is_none()
            && self.ai_confidence.is_none()
            && self.sla_deadline.is_none()
            && self.resolved_at.is_none()
            && self.closed_at.is_none()
            && self.updated_at.is_none()
    }
}

/// One immutable audit entry. Rows are only ever inserted.
#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable)]
#[diesel(table_name = ticket_activities)]
pub struct TicketActivity {
    pub id: i32,
    pub ticket_id: i32,
    pub user_id: Option<i32>,
    pub activity_type: ActivityType,
    pub description: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = ticket_activities)]
pub struct NewActivity {
    pub ticket_id: i32,
    pub user_id: Option<i32>,
    pub activity_type: ActivityType,
    pub description: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Per-priority service commitment. Read-only from the engine's side.
#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable)]
#[diesel(table_name = sla_policies)]
pub struct SlaPolicy {
    pub id: i32,
    pub priority: TicketPriority,
    pub response_time_hours: i32,
    pub resolution_time_hours: i32,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct TicketFilter {
    pub status: Option<TicketStatus>,
    pub priority: Option<TicketPriority>,
    pub category: Option<TicketCategory>,
    pub user_id: Option<i32>,
    pub assigned_to_id: Option<i32>,
    pub search: Option<String>,
    pub offset: i64,
    pub limit: i64,
}
