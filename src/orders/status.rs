//! Order Status
//!
//! The lifecycle state machine. Only `Pending` and `Preparing` orders are active; every other
//! state is terminal.

use std::{fmt, str::FromStr};

use thiserror::Error;

/// Lifecycle state of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderStatus {
    /// Placed and waiting for the restaurant
    Pending,

    /// Accepted by the restaurant
    Preparing,

    /// Handed to the customer
    Delivered,

    /// Turned down by the restaurant, or expired by a bulk pass
    Rejected,

    /// Withdrawn by the customer
    Cancelled,
}

impl OrderStatus {
    /// All states, in lifecycle order.
    pub const ALL: [OrderStatus; 5] = [
        OrderStatus::Pending,
        OrderStatus::Preparing,
        OrderStatus::Delivered,
        OrderStatus::Rejected,
        OrderStatus::Cancelled,
    ];

    /// Terminal orders no longer belong in a restaurant queue.
    pub const fn is_terminal(self) -> bool {
        !matches!(self, OrderStatus::Pending | OrderStatus::Preparing)
    }

    /// Rejected and cancelled orders are owed a refund.
    pub const fn is_refunded(self) -> bool {
        matches!(self, OrderStatus::Rejected | OrderStatus::Cancelled)
    }

    /// Canonical name, as written to the order files.
    pub const fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "Pending",
            OrderStatus::Preparing => "Preparing",
            OrderStatus::Delivered => "Delivered",
            OrderStatus::Rejected => "Rejected",
            OrderStatus::Cancelled => "Cancelled",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An unrecognised status name.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown order status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for OrderStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();

        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

/// A requested lifecycle transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Restaurant accepts a pending order
    Confirm,

    /// Restaurant turns down a pending order
    Reject,

    /// Restaurant hands over a prepared order
    Deliver,

    /// Customer withdraws a pending order
    Cancel,

    /// Bulk pass: too little time left before delivery
    BulkExpire,

    /// Bulk pass: enough time left, start preparing
    BulkRetain,
}

impl Action {
    /// Actions restaurant staff may request for an order by id.
    pub const fn is_staff(self) -> bool {
        matches!(self, Action::Confirm | Action::Reject | Action::Deliver)
    }

    /// State the order must be in for the action to apply.
    pub const fn requires(self) -> OrderStatus {
        match self {
            Action::Deliver => OrderStatus::Preparing,
            Action::Confirm
            | Action::Reject
            | Action::Cancel
            | Action::BulkExpire
            | Action::BulkRetain => OrderStatus::Pending,
        }
    }

    /// State the order ends up in.
    pub const fn target(self) -> OrderStatus {
        match self {
            Action::Confirm | Action::BulkRetain => OrderStatus::Preparing,
            Action::Reject | Action::BulkExpire => OrderStatus::Rejected,
            Action::Deliver => OrderStatus::Delivered,
            Action::Cancel => OrderStatus::Cancelled,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Action::Confirm => "confirm",
            Action::Reject => "reject",
            Action::Deliver => "deliver",
            Action::Cancel => "cancel",
            Action::BulkExpire => "expire",
            Action::BulkRetain => "retain",
        })
    }
}

/// An action was requested from a state that does not allow it. The order is unchanged.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("cannot {action} an order that is {status}, it must be {}", .action.requires())]
pub struct GuardViolation {
    /// Requested action
    pub action: Action,

    /// State the order was in
    pub status: OrderStatus,
}

/// A successful state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    /// Action that was applied
    pub action: Action,

    /// Previous state
    pub from: OrderStatus,

    /// New state
    pub to: OrderStatus,
}

impl Transition {
    /// The order must leave its restaurant queue.
    pub const fn leaves_queue(self) -> bool {
        !self.from.is_terminal() && self.to.is_terminal()
    }

    /// The order must be pushed onto the refund ledger.
    pub const fn enters_ledger(self) -> bool {
        !self.from.is_refunded() && self.to.is_refunded()
    }
}

/// Validate `action` against `status`.
///
/// # Errors
///
/// Returns a [`GuardViolation`] when the order is not in the state the action requires.
pub fn transition(status: OrderStatus, action: Action) -> Result<Transition, GuardViolation> {
    if status != action.requires() {
        return Err(GuardViolation { action, status });
    }

    Ok(Transition {
        action,
        from: status,
        to: action.target(),
    })
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use super::*;

    const ACTIONS: [Action; 6] = [
        Action::Confirm,
        Action::Reject,
        Action::Deliver,
        Action::Cancel,
        Action::BulkExpire,
        Action::BulkRetain,
    ];

    #[test]
    fn confirm_only_from_pending() -> TestResult {
        let t = transition(OrderStatus::Pending, Action::Confirm)?;

        assert_eq!(t.to, OrderStatus::Preparing);
        assert!(!t.leaves_queue());
        assert!(!t.enters_ledger());

        for status in [
            OrderStatus::Preparing,
            OrderStatus::Delivered,
            OrderStatus::Rejected,
            OrderStatus::Cancelled,
        ] {
            assert_eq!(
                transition(status, Action::Confirm),
                Err(GuardViolation {
                    action: Action::Confirm,
                    status
                })
            );
        }

        Ok(())
    }

    #[test]
    fn deliver_only_from_preparing() -> TestResult {
        let t = transition(OrderStatus::Preparing, Action::Deliver)?;

        assert_eq!(t.to, OrderStatus::Delivered);
        assert!(t.leaves_queue());
        assert!(!t.enters_ledger());

        assert!(transition(OrderStatus::Pending, Action::Deliver).is_err());

        Ok(())
    }

    #[test]
    fn reject_cancel_and_expire_enter_the_ledger() -> TestResult {
        for action in [Action::Reject, Action::Cancel, Action::BulkExpire] {
            let t = transition(OrderStatus::Pending, action)?;

            assert!(t.leaves_queue(), "{action} should leave the queue");
            assert!(t.enters_ledger(), "{action} should enter the ledger");
        }

        Ok(())
    }

    #[test]
    fn only_restaurant_actions_are_staff_actions() {
        let staff: Vec<Action> = ACTIONS.into_iter().filter(|action| action.is_staff()).collect();

        assert_eq!(staff, vec![Action::Confirm, Action::Reject, Action::Deliver]);
    }

    #[test]
    fn terminal_states_accept_no_action() {
        for status in OrderStatus::ALL.into_iter().filter(|s| s.is_terminal()) {
            for action in ACTIONS {
                assert!(
                    transition(status, action).is_err(),
                    "{action} should not apply to {status}"
                );
            }
        }
    }

    #[test]
    fn status_round_trips_through_its_name() -> TestResult {
        for status in OrderStatus::ALL {
            assert_eq!(status.as_str().parse::<OrderStatus>()?, status);
        }

        assert_eq!(" preparing ".parse::<OrderStatus>()?, OrderStatus::Preparing);
        assert_eq!(
            "Skipped".parse::<OrderStatus>(),
            Err(UnknownStatus("Skipped".to_string()))
        );

        Ok(())
    }

    #[test]
    fn guard_violation_message_names_required_state() {
        let err = GuardViolation {
            action: Action::Confirm,
            status: OrderStatus::Delivered,
        };

        assert_eq!(
            err.to_string(),
            "cannot confirm an order that is Delivered, it must be Pending"
        );
    }
}
