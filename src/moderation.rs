use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::ToSchema;

use crate::{
    error::{AppError, Result},
    models::PostStatus,
};

/// Decision
///
/// The only two moves a moderator can make. There is no way to send a post back to
/// `pending`: that state is entered by creation alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Approved,
    Rejected,
}

impl Decision {
    pub fn target(self) -> PostStatus {
        match self {
            Decision::Approved => PostStatus::Approved,
            Decision::Rejected => PostStatus::Rejected,
        }
    }
}

/// Transition
///
/// What applying a decision to a post in a given state amounts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Conditional write: move from `expected` to `status`, storing `reject_reason`.
    Apply {
        expected: PostStatus,
        status: PostStatus,
        reject_reason: Option<String>,
    },
    /// The post is already in the requested state; nothing to write.
    Unchanged,
}

/// plan_transition
///
/// The moderation state machine.
///
/// | current  | approved           | rejected                 |
/// |----------|--------------------|--------------------------|
/// | pending  | apply, clear reason| apply, store reason      |
/// | approved | unchanged          | conflict                 |
/// | rejected | conflict           | apply, replace reason    |
///
/// A rejection without a reason stores an empty one, so `reject_reason` is present
/// exactly when the status is `rejected`.
pub fn plan_transition(
    current: PostStatus,
    decision: Decision,
    reason: Option<String>,
) -> Result<Transition> {
    let reject_reason = match decision {
        Decision::Approved => None,
        Decision::Rejected => Some(reason.unwrap_or_default()),
    };

    match (current, decision) {
        (PostStatus::Pending, _) => Ok(Transition::Apply {
            expected: PostStatus::Pending,
            status: decision.target(),
            reject_reason,
        }),
        (PostStatus::Approved, Decision::Approved) => Ok(Transition::Unchanged),
        (PostStatus::Rejected, Decision::Rejected) => Ok(Transition::Apply {
            expected: PostStatus::Rejected,
            status: PostStatus::Rejected,
            reject_reason,
        }),
        (current, decision) => Err(AppError::conflict(format!(
            "post is already {}, cannot change it to {}",
            current.as_str(),
            decision.target().as_str()
        ))),
    }
}
