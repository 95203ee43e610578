use super::UnknownVariant;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Pix,
    CreditCard,
    Billet,
    QrCode,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pix => "pix",
            Self::CreditCard => "credit_card",
            Self::Billet => "billet",
            Self::QrCode => "qr_code",
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pix" => Ok(Self::Pix),
            "credit_card" => Ok(Self::CreditCard),
            "billet" => Ok(Self::Billet),
            "qr_code" => Ok(Self::QrCode),
            other => Err(UnknownVariant::new("payment method", other)),
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Approved,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Failed => "failed",
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "failed" => Ok(Self::Failed),
            other => Err(UnknownVariant::new("payment status", other)),
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payment being authorized at checkout, before it has an identity.
///
/// The gateway fills in `external_reference` and, for QR payments, the
/// rendered image in `provider_payload`.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentDraft {
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub amount: Decimal,
    pub external_reference: Option<String>,
    pub provider_payload: Option<String>,
}

impl PaymentDraft {
    pub fn new(method: PaymentMethod, amount: Decimal) -> Self {
        Self {
            method,
            status: PaymentStatus::Pending,
            amount,
            external_reference: None,
            provider_payload: None,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct PaymentRow {
    pub id: i64,
    pub order_id: i64,
    pub status: String,
    pub method: String,
    pub amount: Decimal,
    pub external_reference: Option<String>,
    pub qr_data: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Payment {
    pub id: i64,
    pub order_id: i64,
    pub status: PaymentStatus,
    pub method: PaymentMethod,
    pub amount: Decimal,
    pub external_reference: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qr_data: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<PaymentRow> for Payment {
    type Error = UnknownVariant;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            order_id: row.order_id,
            status: row.status.parse()?,
            method: row.method.parse()?,
            amount: row.amount,
            external_reference: row.external_reference,
            qr_data: row.qr_data,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
