//! Sign-up request model and request/response payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SignupStatus {
    Pending,
    Accepted,
    Rejected,
    Expired,
    /// Terminal: the account for this request was created.
    Consumed,
}

impl SignupStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
            Self::Expired => "expired",
            Self::Consumed => "consumed",
        }
    }

    /// States the sweep moves to `expired` once `expires_at` has passed.
    #[must_use]
    pub const fn is_sweepable(self) -> bool {
        matches!(self, Self::Pending | Self::Accepted | Self::Rejected)
    }
}

impl fmt::Display for SignupStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SignupStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pending" => Ok(Self::Pending),
            "accepted" => Ok(Self::Accepted),
            "rejected" => Ok(Self::Rejected),
            "expired" => Ok(Self::Expired),
            "consumed" => Ok(Self::Consumed),
            other => Err(format!("unknown sign-up status: {other}")),
        }
    }
}

/// Owner decision on a pending request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision {
    Accept,
    Reject,
}

impl Decision {
    #[must_use]
    pub const fn target(self) -> SignupStatus {
        match self {
            Self::Accept => SignupStatus::Accepted,
            Self::Reject => SignupStatus::Rejected,
        }
    }
}

impl FromStr for Decision {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "accepted" => Ok(Self::Accept),
            "rejected" => Ok(Self::Reject),
            other => Err(format!("Invalid decision: {other}")),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub status: SignupStatus,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SignupRequest {
    /// Unexpired at `now`, regardless of whether the sweep has run.
    #[must_use]
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

#[derive(Clone, Debug)]
pub struct NewSignupRequest {
    pub email: String,
    pub name: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// What `request` tells the applicant.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignupReceipt {
    pub status: SignupStatus,
    pub can_resend: bool,
    pub expires_at: DateTime<Utc>,
    /// A new row was written (and an email sent) by this call.
    pub created: bool,
}

/// Fields supplied by the applicant when completing an accepted request.
#[derive(Clone, Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateAccountRequest {
    pub signup_request_id: Uuid,
    pub password: String,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SignupRequestBody {
    pub email: String,
    pub name: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct DecisionBody {
    /// `accepted` or `rejected`.
    pub status: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SignupReceiptResponse {
    pub success: bool,
    pub message: String,
    pub status: SignupStatus,
    pub can_resend: bool,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequestResponse {
    pub success: bool,
    pub message: String,
    pub request: SignupRequest,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SignupListResponse {
    pub success: bool,
    pub message: String,
    pub requests: Vec<SignupRequest>,
}
