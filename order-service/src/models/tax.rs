use super::payment::PaymentMethod;
use super::UnknownVariant;
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaxAmountType {
    Fixed,
    Percentage,
}

impl TaxAmountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fixed => "fixed",
            Self::Percentage => "percentage",
        }
    }
}

impl FromStr for TaxAmountType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fixed" => Ok(Self::Fixed),
            "percentage" => Ok(Self::Percentage),
            other => Err(UnknownVariant::new("tax amount type", other)),
        }
    }
}

/// What a tax rule is charged against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaxScope {
    Global,
    CreditCard,
    Transportation,
    PlatformFee,
}

impl TaxScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Global => "global",
            Self::CreditCard => "credit_card",
            Self::Transportation => "transportation",
            Self::PlatformFee => "platform_fee",
        }
    }
}

impl FromStr for TaxScope {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "global" => Ok(Self::Global),
            "credit_card" => Ok(Self::CreditCard),
            "transportation" => Ok(Self::Transportation),
            "platform_fee" => Ok(Self::PlatformFee),
            other => Err(UnknownVariant::new("tax scope", other)),
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct TaxRuleRow {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub amount_type: String,
    pub amount_value: Decimal,
    pub applicable_to: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TaxRule {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub amount_type: TaxAmountType,
    pub amount_value: Decimal,
    pub applicable_to: TaxScope,
}

impl TaxRule {
    /// Card-scoped rules only apply to card payments; every other scope
    /// applies to any taxed method.
    pub fn applies_to(&self, method: PaymentMethod) -> bool {
        match self.applicable_to {
            TaxScope::CreditCard => method == PaymentMethod::CreditCard,
            TaxScope::Global | TaxScope::Transportation | TaxScope::PlatformFee => true,
        }
    }
}

impl TryFrom<TaxRuleRow> for TaxRule {
    type Error = UnknownVariant;

    fn try_from(row: TaxRuleRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            name: row.name,
            description: row.description,
            amount_type: row.amount_type.parse()?,
            amount_value: row.amount_value,
            applicable_to: row.applicable_to.parse()?,
        })
    }
}
