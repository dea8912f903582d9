//! Loan application records, roles and statuses as the backend sends them.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Identifier of a loan application as issued by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct LoanApplicationId(pub String);

impl<'de> Deserialize<'de> for LoanApplicationId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(u64),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Text(text) => Self(text),
            Raw::Number(number) => Self(number.to_string()),
        })
    }
}

impl LoanApplicationId {
    /// Whether the id can stand as a single URL path segment.
    pub fn is_addressable(&self) -> bool {
        let trimmed = self.0.trim();
        !trimmed.is_empty() && trimmed != "." && trimmed != ".."
    }
}

impl From<&str> for LoanApplicationId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for LoanApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The fixed set of system roles a console user can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Administrator,
    InternalControl,
    UserSupport,
    AccountOfficer,
    FirstReviewer,
    SecondReviewer,
    AcceptanceOperations,
    BookingOperations,
    FinanceOperations,
}

impl Role {
    pub const ALL: [Role; 9] = [
        Role::Administrator,
        Role::InternalControl,
        Role::UserSupport,
        Role::AccountOfficer,
        Role::FirstReviewer,
        Role::SecondReviewer,
        Role::AcceptanceOperations,
        Role::BookingOperations,
        Role::FinanceOperations,
    ];

    pub const fn code(self) -> &'static str {
        match self {
            Role::Administrator => "ADMINISTRATOR",
            Role::InternalControl => "INTERNAL_CONTROL",
            Role::UserSupport => "USER_SUPPORT",
            Role::AccountOfficer => "ACCOUNT_OFFICER",
            Role::FirstReviewer => "FIRST_REVIEWER",
            Role::SecondReviewer => "SECOND_REVIEWER",
            Role::AcceptanceOperations => "ACCEPTANCE_OPERATIONS",
            Role::BookingOperations => "BOOKING_OPERATIONS",
            Role::FinanceOperations => "FINANCE_OPERATIONS",
        }
    }

    /// Reviewer roles may adjust approval terms before approving.
    pub const fn edits_terms(self) -> bool {
        matches!(self, Role::FirstReviewer | Role::SecondReviewer)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Role {
    type Err = ParseCodeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_uppercase().replace('-', "_");
        Role::ALL
            .into_iter()
            .find(|role| role.code() == normalized)
            .ok_or_else(|| ParseCodeError {
                kind: "role",
                value: value.to_string(),
            })
    }
}

/// Workflow stage of a loan application, in the order the backend advances it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApplicationStatus {
    PendingSubmission,
    PendingFirstReview,
    PendingSecondReview,
    PendingAcceptance,
    PendingBooking,
    Completed,
}

impl ApplicationStatus {
    pub const ORDER: [ApplicationStatus; 6] = [
        ApplicationStatus::PendingSubmission,
        ApplicationStatus::PendingFirstReview,
        ApplicationStatus::PendingSecondReview,
        ApplicationStatus::PendingAcceptance,
        ApplicationStatus::PendingBooking,
        ApplicationStatus::Completed,
    ];

    pub const fn code(self) -> &'static str {
        match self {
            ApplicationStatus::PendingSubmission => "PENDING_SUBMISSION",
            ApplicationStatus::PendingFirstReview => "PENDING_FIRST_REVIEW",
            ApplicationStatus::PendingSecondReview => "PENDING_SECOND_REVIEW",
            ApplicationStatus::PendingAcceptance => "PENDING_ACCEPTANCE",
            ApplicationStatus::PendingBooking => "PENDING_BOOKING",
            ApplicationStatus::Completed => "COMPLETED",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            ApplicationStatus::PendingSubmission => "Pending submission",
            ApplicationStatus::PendingFirstReview => "Pending first review",
            ApplicationStatus::PendingSecondReview => "Pending second review",
            ApplicationStatus::PendingAcceptance => "Pending acceptance",
            ApplicationStatus::PendingBooking => "Pending booking",
            ApplicationStatus::Completed => "Completed",
        }
    }

    pub fn stage_index(self) -> usize {
        Self::ORDER
            .iter()
            .position(|status| *status == self)
            .unwrap_or(Self::ORDER.len())
    }

    /// The stage an approval advances to. The backend remains authoritative;
    /// declines and returns never go through this.
    pub fn next(self) -> Option<ApplicationStatus> {
        Self::ORDER.get(self.stage_index() + 1).copied()
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, ApplicationStatus::Completed)
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for ApplicationStatus {
    type Err = ParseCodeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_uppercase().replace('-', "_");
        ApplicationStatus::ORDER
            .into_iter()
            .find(|status| status.code() == normalized)
            .ok_or_else(|| ParseCodeError {
                kind: "application status",
                value: value.to_string(),
            })
    }
}

/// Outcome attached to a workflow transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DecisionFlag {
    Approved,
    Declined,
    Returned,
}

impl DecisionFlag {
    pub const fn code(self) -> &'static str {
        match self {
            DecisionFlag::Approved => "APPROVED",
            DecisionFlag::Declined => "DECLINED",
            DecisionFlag::Returned => "RETURNED",
        }
    }
}

impl fmt::Display for DecisionFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for DecisionFlag {
    type Err = ParseCodeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "APPROVED" | "APPROVE" => Ok(DecisionFlag::Approved),
            "DECLINED" | "DECLINE" | "CANCEL" => Ok(DecisionFlag::Declined),
            "RETURNED" | "RETURN" => Ok(DecisionFlag::Returned),
            _ => Err(ParseCodeError {
                kind: "decision flag",
                value: value.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct ParseCodeError {
    pub kind: &'static str,
    pub value: String,
}

/// One past decision recorded against an application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalTrailEntry {
    pub processor: String,
    pub decision_flag: DecisionFlag,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub date_completed: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrailOrder {
    NewestFirst,
    OldestFirst,
}

/// Read-mostly snapshot of a loan application held by the console.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoanApplication {
    pub id: LoanApplicationId,
    pub application_status: ApplicationStatus,
    pub loan_amount: f64,
    #[serde(default)]
    pub approved_loan_amount: Option<f64>,
    pub loan_tenor_mths: u32,
    #[serde(default)]
    pub approved_tenor_mths: Option<u32>,
    pub net_mthly_income: f64,
    #[serde(default)]
    pub approved_dsr_rate: Option<f64>,
    #[serde(default)]
    pub approved_mthly_rate: Option<f64>,
    #[serde(default)]
    pub approved_mthly_repayment: Option<f64>,
    #[serde(default)]
    pub approval_trail: Vec<ApprovalTrailEntry>,
}

impl LoanApplication {
    /// Trail entries sorted by completion date; undated entries always sort last.
    pub fn trail(&self, order: TrailOrder) -> Vec<&ApprovalTrailEntry> {
        let mut entries: Vec<&ApprovalTrailEntry> = self.approval_trail.iter().collect();
        entries.sort_by(|left, right| match (left.date_completed, right.date_completed) {
            (Some(a), Some(b)) => match order {
                TrailOrder::NewestFirst => b.cmp(&a),
                TrailOrder::OldestFirst => a.cmp(&b),
            },
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        });
        entries
    }

    pub fn has_approved_terms(&self) -> bool {
        self.approved_loan_amount.is_some() || self.approved_tenor_mths.is_some()
    }
}

/// A console user as seen by the workflow: identifier plus role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActingUser {
    pub id: String,
    pub role: Role,
}

impl ActingUser {
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            role,
        }
    }
}

/// The signed-in user and, when support is impersonating, the user being impersonated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSession {
    pub user: ActingUser,
    #[serde(default)]
    pub impersonated: Option<ActingUser>,
}

impl UserSession {
    pub fn new(user: ActingUser) -> Self {
        Self {
            user,
            impersonated: None,
        }
    }

    pub fn impersonating(mut self, target: ActingUser) -> Self {
        self.impersonated = Some(target);
        self
    }

    /// The user whose role and identifier drive policy and dispatch.
    pub fn effective(&self) -> &ActingUser {
        self.impersonated.as_ref().unwrap_or(&self.user)
    }
}
