//! Order aggregate implementation.

use chrono::{DateTime, Utc};
use common::{Money, OrderId};
use serde::{Deserialize, Serialize};

use crate::product::Product;

use super::{MAX_QUANTITY, OrderError, OrderItem, OrderStatus, StatusChange, TerminalStatus};

/// Order aggregate root.
///
/// Represents a customer purchase from checkout until the payment outcome
/// is known. The total is always derived from the items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Unique order identifier.
    id: OrderId,

    /// Customer email; empty until provided.
    customer_email: String,

    /// Items in the order, in the order they were added.
    items: Vec<OrderItem>,

    /// Current status of the order.
    status: OrderStatus,

    /// Identifier of the hosted payment session, once one exists.
    payment_session_id: Option<String>,

    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

// Construction
impl Order {
    /// Creates a new pending order with no items.
    pub fn new(customer_email: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: OrderId::new(),
            customer_email: customer_email.into(),
            items: Vec::new(),
            status: OrderStatus::Pending,
            payment_session_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Rebuilds an order from stored fields.
    pub fn restore(
        id: OrderId,
        customer_email: String,
        items: Vec<OrderItem>,
        status: OrderStatus,
        payment_session_id: Option<String>,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            customer_email,
            items,
            status,
            payment_session_id,
            created_at,
            updated_at,
        }
    }
}

// Query methods
impl Order {
    pub fn id(&self) -> OrderId {
        self.id
    }

    pub fn customer_email(&self) -> &str {
        &self.customer_email
    }

    /// Returns the current status.
    pub fn status(&self) -> OrderStatus {
        self.status
    }

    /// Returns all items in insertion order.
    pub fn items(&self) -> &[OrderItem] {
        &self.items
    }

    /// Returns the number of distinct products.
    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// Returns true if the order has items.
    pub fn has_items(&self) -> bool {
        !self.items.is_empty()
    }

    /// Returns the sum of all item subtotals.
    pub fn total_amount(&self) -> Money {
        self.items.iter().map(OrderItem::total_price).sum()
    }

    pub fn payment_session_id(&self) -> Option<&str> {
        self.payment_session_id.as_deref()
    }

    /// Returns true if the order is in a terminal status.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

// Mutations
impl Order {
    /// Adds `quantity` units of `product`, merging with an existing line for
    /// the same product.
    pub fn add_item(&mut self, product: &Product, quantity: u32) -> Result<(), OrderError> {
        if !self.status.can_modify_items() {
            return Err(OrderError::ItemsLocked {
                status: self.status,
            });
        }

        if quantity == 0 || quantity > MAX_QUANTITY {
            return Err(OrderError::InvalidQuantity { quantity });
        }

        if let Some(existing) = self
            .items
            .iter_mut()
            .find(|item| item.product_id == product.id)
        {
            let merged = existing.quantity.saturating_add(quantity);
            if merged > MAX_QUANTITY {
                return Err(OrderError::InvalidQuantity { quantity: merged });
            }
            existing.quantity = merged;
        } else {
            self.items.push(OrderItem::new(
                product.id.clone(),
                product.name.clone(),
                quantity,
                product.price,
            ));
        }

        self.updated_at = Utc::now();
        Ok(())
    }

    /// Records the hosted payment session for this order.
    ///
    /// Assigning the same identifier again is accepted; a different one is not.
    pub fn attach_payment_session(
        &mut self,
        session_id: impl Into<String>,
    ) -> Result<(), OrderError> {
        let session_id = session_id.into();
        match &self.payment_session_id {
            Some(existing) if *existing == session_id => Ok(()),
            Some(existing) => Err(OrderError::PaymentSessionAlreadyAssigned {
                existing: existing.clone(),
            }),
            None => {
                self.payment_session_id = Some(session_id);
                self.updated_at = Utc::now();
                Ok(())
            }
        }
    }

    /// Moves the order to a terminal status, stamping `updated_at` when the
    /// status actually changes.
    pub fn apply_status(
        &mut self,
        target: TerminalStatus,
        at: DateTime<Utc>,
    ) -> Result<StatusChange, OrderError> {
        let change = self.status.transition(target)?;
        if change == StatusChange::Applied {
            self.status = target.into();
            self.updated_at = at;
        }
        Ok(change)
    }
}
