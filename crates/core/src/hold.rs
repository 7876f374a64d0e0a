//! Structured hold reasons for lab scripts.
//!
//! A hold reason is a label (one of the well-known "Hold for ..." labels or a
//! custom one), an optional comment, and for the "hold for approval" kind a
//! design link plus optional file attachments. The display form
//! `"<label>: <comment>"` is what gets persisted in `hold_reason`; the approval
//! data travels separately as structured JSON.

use serde::{Deserialize, Serialize};
use validator::ValidateUrl;

use crate::error::CoreError;

/* --------------------------------------------------------------------------
Constants
-------------------------------------------------------------------------- */

/// Labels starting with this marker are holds awaiting design approval.
pub const APPROVAL_HOLD_MARKER: &str = "Hold for Approval";

pub const HOLD_INSUFFICIENT_DATA: &str = "Hold for Insufficient Data";
pub const HOLD_PAYMENT: &str = "Hold for Payment";
pub const HOLD_PATIENT_AVAILABILITY: &str = "Hold for Patient Availability";

/// Labels offered to clients. Any other non-empty label is accepted as custom.
pub const KNOWN_HOLD_LABELS: &[&str] = &[
    HOLD_INSUFFICIENT_DATA,
    APPROVAL_HOLD_MARKER,
    HOLD_PAYMENT,
    HOLD_PATIENT_AVAILABILITY,
];

/// Maximum length of a hold comment.
pub const MAX_HOLD_COMMENT_LENGTH: usize = 2_000;

/// Maximum number of attachments on an approval hold.
pub const MAX_APPROVAL_ATTACHMENTS: usize = 20;

/// Separator between label and comment in the display form.
const SEPARATOR: &str = ": ";

/* --------------------------------------------------------------------------
Types
-------------------------------------------------------------------------- */

/// Data carried by a "hold for approval".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalHold {
    pub design_link: String,
    #[serde(default)]
    pub attachments: Vec<String>,
}

/// Why a lab script is on hold. Construct through [`HoldReason::new`] or
/// [`HoldReason::parse`] so the invariants are always checked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HoldReason {
    label: String,
    comment: Option<String>,
    approval: Option<ApprovalHold>,
}

impl HoldReason {
    /// Build a hold reason from its parts.
    ///
    /// Fails with [`CoreError::MissingRequiredData`] when the label is blank,
    /// or when an approval hold has no design link. A label may not contain
    /// the `": "` separator, since it would not survive the display form.
    pub fn new(
        label: &str,
        comment: Option<&str>,
        approval: Option<ApprovalHold>,
    ) -> Result<Self, CoreError> {
        let label = label.trim();
        if label.is_empty() {
            return Err(CoreError::MissingRequiredData(
                "A hold reason is required to put a lab script on hold".to_string(),
            ));
        }
        if label.contains(SEPARATOR) {
            return Err(CoreError::Validation(format!(
                "Hold label '{label}' may not contain '{SEPARATOR}'; put details in the comment"
            )));
        }

        let comment = comment
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string);
        if let Some(c) = &comment {
            if c.chars().count() > MAX_HOLD_COMMENT_LENGTH {
                return Err(CoreError::Validation(format!(
                    "Hold comment exceeds maximum length of {MAX_HOLD_COMMENT_LENGTH} characters"
                )));
            }
        }

        let approval = if label.starts_with(APPROVAL_HOLD_MARKER) {
            Some(validate_approval(approval)?)
        } else if approval.is_some() {
            return Err(CoreError::Validation(format!(
                "Design links and attachments can only be attached to '{APPROVAL_HOLD_MARKER}' holds"
            )));
        } else {
            None
        };

        Ok(Self {
            label: label.to_string(),
            comment,
            approval,
        })
    }

    /// Parse the display form `"<label>: <comment>"`.
    ///
    /// Only the first separator splits, so comments may themselves contain
    /// `": "`.
    pub fn parse(text: &str, approval: Option<ApprovalHold>) -> Result<Self, CoreError> {
        match text.split_once(SEPARATOR) {
            Some((label, comment)) => Self::new(label, Some(comment), approval),
            None => Self::new(text, None, approval),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }

    pub fn approval(&self) -> Option<&ApprovalHold> {
        self.approval.as_ref()
    }

    /// Whether this is the "hold for approval" sub-kind.
    pub fn is_approval(&self) -> bool {
        self.approval.is_some()
    }
}

impl std::fmt::Display for HoldReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.comment {
            Some(comment) => write!(f, "{}{SEPARATOR}{comment}", self.label),
            None => f.write_str(&self.label),
        }
    }
}

fn validate_approval(approval: Option<ApprovalHold>) -> Result<ApprovalHold, CoreError> {
    let approval = approval.ok_or_else(|| {
        CoreError::MissingRequiredData(format!(
            "A design link is required for '{APPROVAL_HOLD_MARKER}'"
        ))
    })?;

    let link = approval.design_link.trim();
    if link.is_empty() {
        return Err(CoreError::MissingRequiredData(format!(
            "A design link is required for '{APPROVAL_HOLD_MARKER}'"
        )));
    }
    let has_web_scheme = link.starts_with("https://") || link.starts_with("http://");
    if !has_web_scheme || !link.validate_url() {
        return Err(CoreError::Validation(format!(
            "Invalid design link '{link}'. Must be an http(s) URL"
        )));
    }

    let attachments: Vec<String> = approval
        .attachments
        .iter()
        .map(|a| a.trim())
        .filter(|a| !a.is_empty())
        .map(str::to_string)
        .collect();
    if attachments.len() > MAX_APPROVAL_ATTACHMENTS {
        return Err(CoreError::Validation(format!(
            "At most {MAX_APPROVAL_ATTACHMENTS} attachments may accompany an approval hold"
        )));
    }

    Ok(ApprovalHold {
        design_link: link.to_string(),
        attachments,
    })
}

/* --------------------------------------------------------------------------
Tests
-------------------------------------------------------------------------- */
