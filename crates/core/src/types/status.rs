//! Status enums for orders, payments, accounts, refunds and webhook events.
//!
//! Each enum maps to a `PostgreSQL` enum type in the `synclune` schema when
//! the `postgres` feature is enabled, and serializes as `snake_case`.

use serde::{Deserialize, Serialize};

/// Implements `as_str`, `Display` and `FromStr` from one variant/label table.
macro_rules! status_labels {
    ($name:ident { $($variant:ident => $label:literal),+ $(,)? }) => {
        impl $name {
            /// Database and wire label for this value.
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $label,)+
                }
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl ::core::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($label => Ok(Self::$variant),)+
                    _ => Err(format!(concat!("invalid ", stringify!($name), ": {}"), s)),
                }
            }
        }
    };
}

/// Lifecycle of an order.
///
/// ```text
/// pending ──► processing ──► shipped ──► delivered
///    │             │
///    └──► cancelled ◄┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "synclune.order_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Created at checkout, waiting for payment.
    #[default]
    Pending,
    /// Paid, being prepared in the workshop.
    Processing,
    /// Handed to the carrier.
    Shipped,
    /// Received by the customer.
    Delivered,
    /// Abandoned or cancelled before shipping.
    Cancelled,
}

status_labels!(OrderStatus {
    Pending => "pending",
    Processing => "processing",
    Shipped => "shipped",
    Delivered => "delivered",
    Cancelled => "cancelled",
});

impl OrderStatus {
    /// Whether an order may move from `self` to `next`.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Processing | Self::Cancelled)
                | (Self::Processing, Self::Shipped | Self::Cancelled)
                | (Self::Shipped, Self::Delivered)
        )
    }

    /// Whether no further transition is possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }
}

/// Payment state of an order, driven by provider webhooks and refunds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "synclune.payment_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Paid,
    Failed,
    Expired,
    PartiallyRefunded,
    Refunded,
}

status_labels!(PaymentStatus {
    Pending => "pending",
    Paid => "paid",
    Failed => "failed",
    Expired => "expired",
    PartiallyRefunded => "partially_refunded",
    Refunded => "refunded",
});

impl PaymentStatus {
    /// Whether money was captured for the order (even if later refunded).
    #[must_use]
    pub const fn is_paid(self) -> bool {
        matches!(self, Self::Paid | Self::PartiallyRefunded | Self::Refunded)
    }

    /// Whether more money can still be refunded.
    #[must_use]
    pub const fn is_refundable(self) -> bool {
        matches!(self, Self::Paid | Self::PartiallyRefunded)
    }
}

/// Fulfillment progress of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "synclune.fulfillment_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum FulfillmentStatus {
    #[default]
    Unfulfilled,
    Processing,
    Shipped,
    Delivered,
    Returned,
}

status_labels!(FulfillmentStatus {
    Unfulfilled => "unfulfilled",
    Processing => "processing",
    Shipped => "shipped",
    Delivered => "delivered",
    Returned => "returned",
});

/// GDPR lifecycle of a customer account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "synclune.account_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    #[default]
    Active,
    /// Deletion requested; anonymized once the grace period has passed.
    PendingDeletion,
    /// Personal data scrubbed. Irreversible.
    Anonymized,
}

status_labels!(AccountStatus {
    Active => "active",
    PendingDeletion => "pending_deletion",
    Anonymized => "anonymized",
});

/// Account role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "synclune.user_role", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    #[default]
    Customer,
    /// Back-office access.
    Admin,
}

status_labels!(UserRole {
    Customer => "customer",
    Admin => "admin",
});

/// Catalog visibility of a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "synclune.product_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum ProductStatus {
    #[default]
    Draft,
    Public,
    Archived,
}

status_labels!(ProductStatus {
    Draft => "draft",
    Public => "public",
    Archived => "archived",
});

/// Processing state of an inbound payment-provider event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "synclune.webhook_event_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum WebhookEventStatus {
    #[default]
    Pending,
    Processing,
    Processed,
    Failed,
    /// Event type the shop does not act on.
    Skipped,
}

status_labels!(WebhookEventStatus {
    Pending => "pending",
    Processing => "processing",
    Processed => "processed",
    Failed => "failed",
    Skipped => "skipped",
});

impl WebhookEventStatus {
    /// Whether a redelivery of this event should be acknowledged without work.
    #[must_use]
    pub const fn is_settled(self) -> bool {
        matches!(self, Self::Processed | Self::Skipped)
    }
}

/// State of a refund.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "synclune.refund_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum RefundStatus {
    #[default]
    Pending,
    Completed,
    Failed,
    Cancelled,
}

status_labels!(RefundStatus {
    Pending => "pending",
    Completed => "completed",
    Failed => "failed",
    Cancelled => "cancelled",
});

impl RefundStatus {
    /// Whether the refund counts against the order's refundable amount.
    #[must_use]
    pub const fn is_committed(self) -> bool {
        matches!(self, Self::Pending | Self::Completed)
    }
}

/// Why a refund was issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "synclune.refund_reason", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum RefundReason {
    CustomerRequest,
    Defective,
    WrongItem,
    LostInTransit,
    Fraud,
    Other,
}

status_labels!(RefundReason {
    CustomerRequest => "customer_request",
    Defective => "defective",
    WrongItem => "wrong_item",
    LostInTransit => "lost_in_transit",
    Fraud => "fraud",
    Other => "other",
});

impl RefundReason {
    /// Reason code understood by the payment provider.
    #[must_use]
    pub const fn provider_reason(self) -> &'static str {
        match self {
            Self::Fraud => "fraudulent",
            Self::CustomerRequest
            | Self::Defective
            | Self::WrongItem
            | Self::LostInTransit
            | Self::Other => "requested_by_customer",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_status_transitions() {
        use OrderStatus::{Cancelled, Delivered, Pending, Processing, Shipped};

        assert!(Pending.can_transition_to(Processing));
        assert!(Pending.can_transition_to(Cancelled));
        assert!(Processing.can_transition_to(Shipped));
        assert!(Processing.can_transition_to(Cancelled));
        assert!(Shipped.can_transition_to(Delivered));

        assert!(!Pending.can_transition_to(Shipped));
        assert!(!Shipped.can_transition_to(Cancelled));
        assert!(!Delivered.can_transition_to(Pending));
        assert!(!Cancelled.can_transition_to(Processing));
        assert!(!Processing.can_transition_to(Processing));
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(OrderStatus::Delivered.is_terminal());
        assert!(OrderStatus::Cancelled.is_terminal());
        assert!(!OrderStatus::Shipped.is_terminal());
    }

    #[test]
    fn test_payment_status_paid_and_refundable() {
        assert!(PaymentStatus::Paid.is_paid());
        assert!(PaymentStatus::Refunded.is_paid());
        assert!(!PaymentStatus::Expired.is_paid());

        assert!(PaymentStatus::PartiallyRefunded.is_refundable());
        assert!(!PaymentStatus::Refunded.is_refundable());
        assert!(!PaymentStatus::Pending.is_refundable());
    }

    #[test]
    fn test_labels_round_trip_through_from_str() {
        for status in [
            PaymentStatus::Pending,
            PaymentStatus::Paid,
            PaymentStatus::Failed,
            PaymentStatus::Expired,
            PaymentStatus::PartiallyRefunded,
            PaymentStatus::Refunded,
        ] {
            assert_eq!(status.as_str().parse::<PaymentStatus>(), Ok(status));
        }
        assert!("shipped".parse::<PaymentStatus>().is_err());
    }

    #[test]
    fn test_serde_matches_labels() {
        let json = serde_json::to_string(&AccountStatus::PendingDeletion).expect("serialize");
        assert_eq!(json, "\"pending_deletion\"");
        assert_eq!(AccountStatus::PendingDeletion.to_string(), "pending_deletion");
    }

    #[test]
    fn test_webhook_event_settled() {
        assert!(WebhookEventStatus::Processed.is_settled());
        assert!(WebhookEventStatus::Skipped.is_settled());
        assert!(!WebhookEventStatus::Failed.is_settled());
    }

    #[test]
    fn test_refund_reason_provider_mapping() {
        assert_eq!(RefundReason::Fraud.provider_reason(), "fraudulent");
        assert_eq!(RefundReason::Defective.provider_reason(), "requested_by_customer");
    }
}
