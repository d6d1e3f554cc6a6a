use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A call-center agent (voip user) with availability and rolling call tallies.
///
/// Availability is flipped by the agent's own client; the counters are owned
/// by the counter aggregator and reset on calendar boundaries, never by hand.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, sqlx::FromRow)]
pub struct Agent {
    pub id: Uuid,
    #[serde(rename = "organizationId")]
    pub organization_id: Uuid,
    pub name: String,
    pub role: UserRole,
    #[serde(rename = "isAvailable")]
    pub is_available: bool,
    #[serde(rename = "todayInboundCalls")]
    pub today_inbound_calls: i32,
    #[serde(rename = "todayOutboundCalls")]
    pub today_outbound_calls: i32,
    #[serde(rename = "weeklyInboundCalls")]
    pub weekly_inbound_calls: i32,
    #[serde(rename = "weeklyOutboundCalls")]
    pub weekly_outbound_calls: i32,
    #[serde(rename = "monthlyInboundCalls")]
    pub monthly_inbound_calls: i32,
    #[serde(rename = "monthlyOutboundCalls")]
    pub monthly_outbound_calls: i32,
    #[serde(rename = "yearlyInboundCalls")]
    pub yearly_inbound_calls: i32,
    #[serde(rename = "yearlyOutboundCalls")]
    pub yearly_outbound_calls: i32,
    #[serde(rename = "lastCountResetDate")]
    pub last_count_reset_date: NaiveDate,
    #[serde(rename = "lastWeekResetDate")]
    pub last_week_reset_date: NaiveDate,
    #[serde(rename = "lastMonthResetDate")]
    pub last_month_reset_date: NaiveDate,
    #[serde(rename = "lastYearResetDate")]
    pub last_year_reset_date: NaiveDate,
    #[serde(rename = "createdAt")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
pub enum UserRole {
    Agent,
    Admin,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateAvailabilityRequest {
    pub available: bool,
}
