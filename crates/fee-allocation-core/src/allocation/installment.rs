use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, NaiveDate};
use rust_decimal::Decimal;
use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize};

use crate::types::*;

// ---------------------------------------------------------------------------
// Input types
// ---------------------------------------------------------------------------

/// Payment status of an installment as reported by the fee-plan service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    #[default]
    Unpaid,
    PartiallyPaid,
    Paid,
    Overdue,
}

/// One scheduled installment of a student's fee plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Installment {
    pub id: RecordId,
    /// Fee type this installment belongs to, resolved via [`FeeTypeLookup`]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fee_type_id: Option<String>,
    /// Original amount owed
    #[serde(default, deserialize_with = "crate::amount::lenient")]
    pub installment_amount: Money,
    /// Discount already applied to this installment
    #[serde(default, deserialize_with = "crate::amount::lenient")]
    pub discounted_amount: Money,
    /// Balance rolled over from a prior period, payable separately
    #[serde(default, deserialize_with = "crate::amount::lenient")]
    pub carry_forward_amount: Money,
    /// Amount still owed when the installment is partially paid
    #[serde(default, deserialize_with = "crate::amount::lenient")]
    pub remaining_amount: Money,
    #[serde(default)]
    pub payment_status: PaymentStatus,
    /// None when the service sent no date or an unparsable one
    #[serde(default, deserialize_with = "lenient_date")]
    pub due_date: Option<NaiveDate>,
    /// Concession records already applied; passed through untouched
    #[serde(default)]
    pub applied_concessions: Vec<serde_json::Value>,
}

impl Installment {
    pub fn is_partially_paid(&self) -> bool {
        self.payment_status == PaymentStatus::PartiallyPaid
    }

    pub fn is_paid(&self) -> bool {
        self.payment_status == PaymentStatus::Paid
    }

    /// Amount due before carry-forward, never negative. Zero once paid.
    pub fn base_payable_amount(&self) -> Money {
        if self.is_paid() {
            return Decimal::ZERO;
        }
        let base = if self.is_partially_paid() {
            self.remaining_amount
        } else {
            self.installment_amount - self.discounted_amount
        };
        base.max(Decimal::ZERO)
    }

    /// Due date used for ordering; missing dates sort as the epoch.
    pub fn sort_date(&self) -> NaiveDate {
        self.due_date.unwrap_or_else(epoch_date)
    }
}

// ---------------------------------------------------------------------------
// Fee type lookup
// ---------------------------------------------------------------------------

/// Resolves a fee-type id to the name shown next to an installment.
pub trait FeeTypeLookup {
    fn display_name(&self, fee_type_id: &str) -> Option<String>;
}

impl FeeTypeLookup for HashMap<String, String> {
    fn display_name(&self, fee_type_id: &str) -> Option<String> {
        self.get(fee_type_id).cloned()
    }
}

/// Label for an installment row: the fee type's display name when known,
/// otherwise the installment id.
pub fn installment_label(installment: &Installment, lookup: &dyn FeeTypeLookup) -> String {
    installment
        .fee_type_id
        .as_deref()
        .and_then(|id| lookup.display_name(id))
        .unwrap_or_else(|| installment.id.clone())
}

// ---------------------------------------------------------------------------
// Lenient due-date parsing
// ---------------------------------------------------------------------------

/// Parse `YYYY-MM-DD` or an RFC 3339 timestamp; anything else is `None`.
pub fn parse_due_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(trimmed)
                .ok()
                .map(|dt| dt.date_naive())
        })
}

fn lenient_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    deserializer.deserialize_any(LenientDateVisitor)
}

struct LenientDateVisitor;

impl<'de> Visitor<'de> for LenientDateVisitor {
    type Value = Option<NaiveDate>;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a date string or null")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        Ok(parse_due_date(v))
    }

    fn visit_i64<E: de::Error>(self, _v: i64) -> Result<Self::Value, E> {
        Ok(None)
    }

    fn visit_u64<E: de::Error>(self, _v: u64) -> Result<Self::Value, E> {
        Ok(None)
    }

    fn visit_f64<E: de::Error>(self, _v: f64) -> Result<Self::Value, E> {
        Ok(None)
    }

    fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(None)
    }

    fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(None)
    }

    fn visit_some<D>(self, deserializer: D) -> Result<Self::Value, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(LenientDateVisitor)
    }
}
