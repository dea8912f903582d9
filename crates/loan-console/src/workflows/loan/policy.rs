//! Role and status gating for workflow actions.

use serde::Serialize;

use super::domain::{ApplicationStatus, DecisionFlag, Role};

/// Whether a user holding `role` may take workflow actions on an application in `status`.
pub fn can_act_on(role: Role, status: ApplicationStatus) -> bool {
    use ApplicationStatus::*;

    match role {
        Role::Administrator
        | Role::InternalControl
        | Role::UserSupport
        | Role::FinanceOperations => false,
        Role::AccountOfficer => status == PendingSubmission,
        Role::FirstReviewer => status == PendingFirstReview,
        Role::SecondReviewer => status == PendingSecondReview,
        Role::AcceptanceOperations => status == PendingAcceptance,
        Role::BookingOperations => status == PendingBooking,
    }
}

/// Label of the primary action button; empty when the role has no action to render.
pub const fn action_label(role: Role) -> &'static str {
    match role {
        Role::FirstReviewer | Role::SecondReviewer => "Approve",
        Role::AccountOfficer => "Resubmit",
        Role::AcceptanceOperations => "Accept",
        Role::BookingOperations => "Book",
        Role::Administrator
        | Role::InternalControl
        | Role::UserSupport
        | Role::FinanceOperations => "",
    }
}

/// What triggering the primary action does for an application in a given status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PrimaryAction {
    /// Collect booking details before calling the booking workflow.
    Book,
    /// Ask for confirmation, then approve with a fixed comment.
    Confirm { comment: &'static str },
    /// Open the progress form for an approval with comment and, for reviewers, terms.
    Progress,
}

pub const ACCEPTED_COMMENT: &str = "Accepted";
pub const REVISED_COMMENT: &str = "Application revised";

pub const fn primary_action(status: ApplicationStatus) -> PrimaryAction {
    match status {
        ApplicationStatus::PendingBooking => PrimaryAction::Book,
        ApplicationStatus::PendingAcceptance => PrimaryAction::Confirm {
            comment: ACCEPTED_COMMENT,
        },
        ApplicationStatus::PendingSubmission => PrimaryAction::Confirm {
            comment: REVISED_COMMENT,
        },
        ApplicationStatus::PendingFirstReview
        | ApplicationStatus::PendingSecondReview
        | ApplicationStatus::Completed => PrimaryAction::Progress,
    }
}

/// Cancel (decline) is never offered once an application waits for booking.
pub const fn can_cancel(status: ApplicationStatus) -> bool {
    !matches!(status, ApplicationStatus::PendingBooking)
}

/// Nothing precedes submission, so there is nowhere to return it to.
pub const fn can_return(status: ApplicationStatus) -> bool {
    !matches!(status, ApplicationStatus::PendingSubmission)
}

/// Decision flags the user may trigger, primary action first.
pub fn allowed_transitions(role: Role, status: ApplicationStatus) -> Vec<DecisionFlag> {
    if !can_act_on(role, status) {
        return Vec::new();
    }

    let mut flags = vec![DecisionFlag::Approved];
    if can_cancel(status) {
        flags.push(DecisionFlag::Declined);
    }
    if can_return(status) {
        flags.push(DecisionFlag::Returned);
    }
    flags
}
