use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use spg_common::Money;
use sqlx::{FromRow, Type};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Conversion error: {0}")]
pub struct ConversionError(String);

//--------------------------------------     OrderNumber       ---------------------------------------------------------
/// The human- and provider-facing order reference. It is used as the `merchant_ref` on every provider transaction, so
/// it never changes once assigned.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct OrderNumber(pub String);

impl FromStr for OrderNumber {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ConversionError("Order number cannot be empty".into()));
        }
        Ok(Self(s.to_string()))
    }
}

impl From<String> for OrderNumber {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for OrderNumber {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Display for OrderNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl OrderNumber {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

//--------------------------------------     OrderStatus       ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Created at checkout. Waiting for the provider to report a settled payment.
    Pending,
    Paid,
    Processing,
    Shipped,
    Delivered,
    Completed,
    Cancelled,
    /// The provider reported an irrecoverable payment failure.
    Failed,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 8] = [
        OrderStatus::Pending,
        OrderStatus::Paid,
        OrderStatus::Processing,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
        OrderStatus::Completed,
        OrderStatus::Cancelled,
        OrderStatus::Failed,
    ];

    /// Terminal states accept no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Cancelled | OrderStatus::Completed | OrderStatus::Failed)
    }

    /// True once payment has been confirmed, i.e. the order is `PAID` or has moved further along the fulfilment path.
    pub fn is_paid_or_beyond(&self) -> bool {
        matches!(
            self,
            OrderStatus::Paid
                | OrderStatus::Processing
                | OrderStatus::Shipped
                | OrderStatus::Delivered
                | OrderStatus::Completed
        )
    }
}

impl Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Paid => "PAID",
            OrderStatus::Processing => "PROCESSING",
            OrderStatus::Shipped => "SHIPPED",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Completed => "COMPLETED",
            OrderStatus::Cancelled => "CANCELLED",
            OrderStatus::Failed => "FAILED",
        };
        write!(f, "{s}")
    }
}

impl FromStr for OrderStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PENDING" => Ok(Self::Pending),
            "PAID" => Ok(Self::Paid),
            "PROCESSING" => Ok(Self::Processing),
            "SHIPPED" => Ok(Self::Shipped),
            "DELIVERED" => Ok(Self::Delivered),
            "COMPLETED" => Ok(Self::Completed),
            "CANCELLED" => Ok(Self::Cancelled),
            "FAILED" => Ok(Self::Failed),
            s => Err(ConversionError(format!("Invalid order status: {s}"))),
        }
    }
}

//--------------------------------------        Order       ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct Order {
    pub id: i64,
    pub order_number: OrderNumber,
    pub owner_id: String,
    pub status: OrderStatus,
    pub total_amount: Money,
    pub shipping_cost: Money,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// The amount the customer is charged: goods plus shipping.
    pub fn amount_due(&self) -> Money {
        self.total_amount + self.shipping_cost
    }
}

//--------------------------------------        NewOrder       ---------------------------------------------------------
/// Orders are created by checkout, outside the reconciliation core. Always created in `PENDING`.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub order_number: OrderNumber,
    pub owner_id: String,
    pub total_amount: Money,
    pub shipping_cost: Money,
    pub created_at: DateTime<Utc>,
}

impl NewOrder {
    pub fn new(order_number: OrderNumber, owner_id: String, total_amount: Money, shipping_cost: Money) -> Self {
        Self { order_number, owner_id, total_amount, shipping_cost, created_at: Utc::now() }
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }
}

//--------------------------------------     StatusChange      ---------------------------------------------------------
/// One row of an order's status history. Every accepted transition appends exactly one of these.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct StatusChange {
    pub id: i64,
    pub order_number: OrderNumber,
    pub old_status: OrderStatus,
    pub new_status: OrderStatus,
    pub source: String,
    pub changed_at: DateTime<Utc>,
}

//--------------------------------------    PaymentMethod      ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentCategory {
    VirtualAccount,
    EWallet,
    Card,
    RetailCounter,
    PayLater,
}

/// The fixed set of payment instruments offered at checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    BcaVa,
    BniVa,
    BriVa,
    MandiriVa,
    PermataVa,
    Gopay,
    Ovo,
    Dana,
    Shopeepay,
    Qris,
    CreditCard,
    Alfamart,
    Indomaret,
    Akulaku,
    Kredivo,
}

impl PaymentMethod {
    pub const ALL: [PaymentMethod; 15] = [
        PaymentMethod::BcaVa,
        PaymentMethod::BniVa,
        PaymentMethod::BriVa,
        PaymentMethod::MandiriVa,
        PaymentMethod::PermataVa,
        PaymentMethod::Gopay,
        PaymentMethod::Ovo,
        PaymentMethod::Dana,
        PaymentMethod::Shopeepay,
        PaymentMethod::Qris,
        PaymentMethod::CreditCard,
        PaymentMethod::Alfamart,
        PaymentMethod::Indomaret,
        PaymentMethod::Akulaku,
        PaymentMethod::Kredivo,
    ];

    /// The provider's channel code for this instrument
    pub fn channel_code(&self) -> &'static str {
        match self {
            PaymentMethod::BcaVa => "BCAVA",
            PaymentMethod::BniVa => "BNIVA",
            PaymentMethod::BriVa => "BRIVA",
            PaymentMethod::MandiriVa => "MANDIRIVA",
            PaymentMethod::PermataVa => "PERMATAVA",
            PaymentMethod::Gopay => "GOPAY",
            PaymentMethod::Ovo => "OVO",
            PaymentMethod::Dana => "DANA",
            PaymentMethod::Shopeepay => "SHOPEEPAY",
            PaymentMethod::Qris => "QRIS",
            PaymentMethod::CreditCard => "CC",
            PaymentMethod::Alfamart => "ALFAMART",
            PaymentMethod::Indomaret => "INDOMARET",
            PaymentMethod::Akulaku => "AKULAKU",
            PaymentMethod::Kredivo => "KREDIVO",
        }
    }

    pub fn category(&self) -> PaymentCategory {
        use PaymentMethod::*;
        match self {
            BcaVa | BniVa | BriVa | MandiriVa | PermataVa => PaymentCategory::VirtualAccount,
            Gopay | Ovo | Dana | Shopeepay | Qris => PaymentCategory::EWallet,
            CreditCard => PaymentCategory::Card,
            Alfamart | Indomaret => PaymentCategory::RetailCounter,
            Akulaku | Kredivo => PaymentCategory::PayLater,
        }
    }

    pub fn from_channel_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.channel_code().eq_ignore_ascii_case(code))
    }
}

impl Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.channel_code())
    }
}

impl FromStr for PaymentMethod {
    type Err = ConversionError;

    /// Accepts either the provider channel code (`BRIVA`) or the variant name (`BRI_VA`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(m) = Self::from_channel_code(s) {
            return Ok(m);
        }
        serde_json::from_value(serde_json::Value::String(s.to_ascii_uppercase()))
            .map_err(|_| ConversionError(format!("Unknown payment method: {s}")))
    }
}

//--------------------------------------    PaymentAttempt     ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct PaymentAttempt {
    pub id: i64,
    pub order_number: OrderNumber,
    pub gateway_reference: String,
    pub method: PaymentMethod,
    /// The raw provider status, as last observed
    pub gateway_status: String,
    pub created_at: DateTime<Utc>,
    pub checked_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewPaymentAttempt {
    pub order_number: OrderNumber,
    pub gateway_reference: String,
    pub method: PaymentMethod,
    pub gateway_status: String,
}

impl NewPaymentAttempt {
    pub fn new(order_number: OrderNumber, gateway_reference: String, method: PaymentMethod, status: String) -> Self {
        Self { order_number, gateway_reference, method, gateway_status: status }
    }
}

//--------------------------------------     Notification      ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Notification {
    pub id: i64,
    pub user_id: String,
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub read_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNotification {
    pub user_id: String,
    pub title: String,
    pub message: String,
    pub kind: String,
    pub url: Option<String>,
}

//--------------------------------------         Role          ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    User,
    Admin,
}

impl Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "USER"),
            Role::Admin => write!(f, "ADMIN"),
        }
    }
}

impl FromStr for Role {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "USER" => Ok(Self::User),
            "ADMIN" => Ok(Self::Admin),
            _ => Err(ConversionError(format!("Invalid role: {s}"))),
        }
    }
}

//--------------------------------------        Account        ---------------------------------------------------------
/// The persisted account behind an identity. Account management lives outside this crate; we only read it.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct Account {
    pub id: i64,
    pub subject_id: String,
    pub email: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------        Identity       ---------------------------------------------------------
/// A caller identity, resolved per request from a bearer credential. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub subject_id: String,
    pub email: String,
    pub role: Role,
    pub token_expiry: DateTime<Utc>,
}

impl Identity {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Admins may act on any order. Everyone else only on their own.
    pub fn can_access(&self, order: &Order) -> bool {
        self.is_admin() || self.subject_id == order.owner_id
    }
}
