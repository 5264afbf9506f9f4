//! Order status state machine.

use serde::{Deserialize, Serialize};

use super::OrderError;

/// The status of an order in its lifecycle.
///
/// State transitions:
/// ```text
/// Pending ──┬──► Completed
///           └──► Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    /// Awaiting the payment outcome.
    #[default]
    Pending,

    /// Payment succeeded (terminal state).
    Completed,

    /// Payment expired, failed, or the customer cancelled (terminal state).
    Failed,
}

/// A status an order can be moved to.
///
/// Only terminal statuses are targets, so no caller can express a
/// transition back to `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TerminalStatus {
    Completed,
    Failed,
}

/// Result of applying a terminal status to an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusChange {
    /// The order moved from pending to the target status.
    Applied,
    /// The order was already in the target status.
    Unchanged,
}

impl OrderStatus {
    /// Returns true if this is a terminal state (no further transitions possible).
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Failed)
    }

    /// Returns true if items may still be added.
    pub fn can_modify_items(&self) -> bool {
        matches!(self, OrderStatus::Pending)
    }

    /// Checks whether moving to `target` is allowed.
    ///
    /// Re-applying the current terminal status is a no-op; moving between
    /// the two terminal statuses is rejected.
    pub fn transition(&self, target: TerminalStatus) -> Result<StatusChange, OrderError> {
        match self {
            OrderStatus::Pending => Ok(StatusChange::Applied),
            current if *current == OrderStatus::from(target) => Ok(StatusChange::Unchanged),
            current => Err(OrderError::InvalidStateTransition {
                current: *current,
                target,
            }),
        }
    }

    /// Returns the storage name of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Completed => "completed",
            OrderStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = OrderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OrderStatus::Pending),
            "completed" => Ok(OrderStatus::Completed),
            "failed" => Ok(OrderStatus::Failed),
            other => Err(OrderError::UnknownStatus(other.to_string())),
        }
    }
}

impl From<TerminalStatus> for OrderStatus {
    fn from(status: TerminalStatus) -> Self {
        match status {
            TerminalStatus::Completed => OrderStatus::Completed,
            TerminalStatus::Failed => OrderStatus::Failed,
        }
    }
}

impl TerminalStatus {
    pub fn as_str(&self) -> &'static str {
        OrderStatus::from(*self).as_str()
    }
}

impl StatusChange {
    pub fn is_applied(&self) -> bool {
        matches!(self, StatusChange::Applied)
    }
}

impl std::fmt::Display for TerminalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
