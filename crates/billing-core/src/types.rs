//! Strong type definitions shared across the billing crates.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A status code reported by the backend, or one of the client-side codes
/// used when an operation fails before or after the backend answered.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResponseCode(pub i32);

impl ResponseCode {
    pub const OK: Self = Self(0);
    pub const USER_CANCELED: Self = Self(1);
    pub const SERVICE_UNAVAILABLE: Self = Self(2);
    pub const BILLING_UNAVAILABLE: Self = Self(3);
    pub const ITEM_UNAVAILABLE: Self = Self(4);
    pub const DEVELOPER_ERROR: Self = Self(5);
    pub const ERROR: Self = Self(6);
    pub const ITEM_ALREADY_OWNED: Self = Self(7);
    pub const ITEM_NOT_OWNED: Self = Self(8);

    // Client-side codes, never sent by the backend.
    pub const UNKNOWN_ERROR: Self = Self(-1000);
    pub const DISPOSED: Self = Self(-1001);
    pub const VERIFICATION_FAILED: Self = Self(-1002);
    pub const PURCHASE_ERROR: Self = Self(-1003);

    /// Raw integer value.
    pub const fn code(&self) -> i32 {
        self.0
    }

    pub fn is_ok(&self) -> bool {
        *self == Self::OK
    }

    /// Symbolic name, if the code is one we know.
    pub fn name(&self) -> Option<&'static str> {
        let name = match *self {
            Self::OK => "OK",
            Self::USER_CANCELED => "USER_CANCELED",
            Self::SERVICE_UNAVAILABLE => "SERVICE_UNAVAILABLE",
            Self::BILLING_UNAVAILABLE => "BILLING_UNAVAILABLE",
            Self::ITEM_UNAVAILABLE => "ITEM_UNAVAILABLE",
            Self::DEVELOPER_ERROR => "DEVELOPER_ERROR",
            Self::ERROR => "ERROR",
            Self::ITEM_ALREADY_OWNED => "ITEM_ALREADY_OWNED",
            Self::ITEM_NOT_OWNED => "ITEM_NOT_OWNED",
            Self::UNKNOWN_ERROR => "UNKNOWN_ERROR",
            Self::DISPOSED => "DISPOSED",
            Self::VERIFICATION_FAILED => "VERIFICATION_FAILED",
            Self::PURCHASE_ERROR => "PURCHASE_ERROR",
            _ => return None,
        };
        Some(name)
    }
}

impl fmt::Debug for ResponseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "ResponseCode({}: {})", self.0, name),
            None => write!(f, "ResponseCode({})", self.0),
        }
    }
}

impl fmt::Display for ResponseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{} ({})", name, self.0),
            None => write!(f, "{}", self.0),
        }
    }
}

impl From<i32> for ResponseCode {
    fn from(code: i32) -> Self {
        Self(code)
    }
}

/// Kind of product being queried or bought.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ProductType {
    /// One-time, managed in-app product.
    #[default]
    #[serde(rename = "inapp")]
    InApp,
    /// Subscription.
    #[serde(rename = "subs")]
    Subscription,
}

impl ProductType {
    /// Wire name.
    pub const fn as_str(&self) -> &'static str {
        match self {
            ProductType::InApp => "inapp",
            ProductType::Subscription => "subs",
        }
    }

    pub fn from_wire(s: &str) -> Option<Self> {
        match s {
            "inapp" => Some(ProductType::InApp),
            "subs" => Some(ProductType::Subscription),
            _ => None,
        }
    }
}

impl fmt::Display for ProductType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State of a purchase as recorded by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PurchaseState {
    #[default]
    Purchased,
    Canceled,
    Refunded,
    /// A value the backend sent that we do not recognise.
    Unknown(i64),
}

impl PurchaseState {
    pub fn from_code(code: i64) -> Self {
        match code {
            0 => PurchaseState::Purchased,
            1 => PurchaseState::Canceled,
            2 => PurchaseState::Refunded,
            other => PurchaseState::Unknown(other),
        }
    }

    pub fn code(&self) -> i64 {
        match self {
            PurchaseState::Purchased => 0,
            PurchaseState::Canceled => 1,
            PurchaseState::Refunded => 2,
            PurchaseState::Unknown(other) => *other,
        }
    }
}

/// Identifier assigned to a launched purchase attempt, used to match the
/// result coming back from the purchase UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CorrelationId(pub u32);

impl CorrelationId {
    /// The id following this one, wrapping around.
    pub fn next(&self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
