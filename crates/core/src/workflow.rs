//! Table-driven status state machine shared by every work-item type.
//!
//! A work-item type supplies a status enum, an action enum and a static
//! transition table; [`StateMachine`] answers "what happens if `action` is
//! applied in `current`" without any type-specific branching. Lab scripts
//! and manufacturing stages are both instances of this one abstraction.

use std::fmt;

use crate::error::CoreError;
use crate::types::DbId;

/* --------------------------------------------------------------------------
Enum plumbing
-------------------------------------------------------------------------- */

/// A closed set of names persisted as strings (statuses and actions).
pub trait WorkflowEnum: Copy + Eq + fmt::Debug + fmt::Display + Send + Sync + 'static {
    fn as_str(self) -> &'static str;
}

/// An operation that moves a work item between statuses.
pub trait WorkflowAction: WorkflowEnum {
    /// Whether re-applying the action to an item already in one of its
    /// target states succeeds as a no-op instead of being rejected.
    fn is_idempotent(self) -> bool;
}

/// Define a string-backed workflow enum.
///
/// Generates `as_str`, `ALL`, `Display`, `FromStr` (unknown values become a
/// [`CoreError::Validation`]) and serde (de)serialization using the given
/// string for each variant.
#[macro_export]
macro_rules! define_workflow_enum {
    (
        $(#[$meta:meta])*
        $name:ident ($label:literal) {
            $( $(#[$vmeta:meta])* $variant:ident = $value:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        pub enum $name {
            $( $(#[$vmeta])* #[serde(rename = $value)] $variant ),+
        }

        impl $name {
            /// Every variant, in declaration order.
            pub const ALL: &'static [$name] = &[ $( $name::$variant ),+ ];

            /// The persisted string form.
            pub fn as_str(self) -> &'static str {
                match self {
                    $( $name::$variant => $value ),+
                }
            }
        }

        impl $crate::workflow::WorkflowEnum for $name {
            fn as_str(self) -> &'static str {
                $name::as_str(self)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = $crate::error::CoreError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $( $value => Ok($name::$variant), )+
                    other => Err($crate::error::CoreError::Validation(format!(
                        "Invalid {} '{}'. Must be one of: {}",
                        $label,
                        other,
                        [$( $value ),+].join(", ")
                    ))),
                }
            }
        }
    };
}

/* --------------------------------------------------------------------------
State machine
-------------------------------------------------------------------------- */

/// One row of a transition table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rule<S, A> {
    pub from: S,
    pub action: A,
    pub to: S,
}

/// Outcome of checking an action against the current status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step<S> {
    /// The action is legal and moves the item.
    Move { from: S, to: S },
    /// The item is already where an idempotent action would put it.
    Stay(S),
}

/// What a planner decided to do with a record.
#[derive(Debug, Clone, PartialEq)]
pub enum Plan<T> {
    /// Persist this next version of the record.
    Apply(T),
    /// Idempotent re-application; nothing to write.
    Unchanged,
}

/// A finite-state model described entirely by its transition table.
#[derive(Debug)]
pub struct StateMachine<S: 'static, A: 'static> {
    entity: &'static str,
    rules: &'static [Rule<S, A>],
}

impl<S, A> StateMachine<S, A> {
    pub const fn new(entity: &'static str, rules: &'static [Rule<S, A>]) -> Self {
        Self { entity, rules }
    }

    pub fn rules(&self) -> &'static [Rule<S, A>] {
        self.rules
    }
}

impl<S: WorkflowEnum, A: WorkflowAction> StateMachine<S, A> {
    /// The status `action` leads to from `from`, if the table allows it.
    pub fn next(&self, from: S, action: A) -> Option<S> {
        self.rules
            .iter()
            .find(|r| r.from == from && r.action == action)
            .map(|r| r.to)
    }

    /// Whether `state` is a destination of `action` anywhere in the table.
    pub fn is_target_of(&self, state: S, action: A) -> bool {
        self.rules.iter().any(|r| r.action == action && r.to == state)
    }

    /// Actions that may legally be applied in `current`, in table order.
    pub fn available_actions(&self, current: S) -> Vec<A> {
        let mut actions: Vec<A> = Vec::new();
        for rule in self.rules.iter().filter(|r| r.from == current) {
            if !actions.contains(&rule.action) {
                actions.push(rule.action);
            }
        }
        actions
    }

    /// A status with no outgoing transitions.
    pub fn is_terminal(&self, state: S) -> bool {
        !self.rules.iter().any(|r| r.from == state)
    }

    /// Decide what applying `action` to item `id` in status `current` does.
    ///
    /// Returns [`CoreError::InvalidTransition`] naming the current status,
    /// the attempted action and the legal alternatives when the table has no
    /// matching row and the action is not an idempotent re-application.
    pub fn check(&self, id: DbId, current: S, action: A) -> Result<Step<S>, CoreError> {
        if let Some(to) = self.next(current, action) {
            return Ok(Step::Move { from: current, to });
        }

        if action.is_idempotent() && self.is_target_of(current, action) {
            return Ok(Step::Stay(current));
        }

        Err(CoreError::InvalidTransition {
            entity: self.entity,
            id,
            current: current.as_str().to_string(),
            action: action.as_str().to_string(),
            allowed: self
                .available_actions(current)
                .into_iter()
                .map(|a| a.as_str().to_string())
                .collect(),
        })
    }
}

/* --------------------------------------------------------------------------
Tests
-------------------------------------------------------------------------- */
