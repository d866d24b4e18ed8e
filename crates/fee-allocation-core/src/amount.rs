//! Parse-or-default coercion for amount fields.
//!
//! Amounts reach us as JSON numbers, numeric strings, empty strings or
//! `null`. Everything funnels through [`parse_amount`] so that the fallback
//! to zero happens in one place.

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize};

use crate::types::Money;

/// Parse a user- or service-supplied amount.
///
/// Accepts plain decimal notation (`"1200.50"`, `"-3"`) and scientific
/// notation (`"1.2e3"`). Returns `None` for empty or unparsable text.
pub fn parse_amount(raw: &str) -> Option<Money> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    Decimal::from_str(trimmed)
        .or_else(|_| Decimal::from_scientific(trimmed))
        .ok()
}

/// [`parse_amount`] with the zero fallback.
pub fn amount_or_zero(raw: &str) -> Money {
    parse_amount(raw).unwrap_or(Decimal::ZERO)
}

/// [`amount_or_zero`], with negative values also mapped to zero.
pub fn non_negative_amount(raw: &str) -> Money {
    amount_or_zero(raw).max(Decimal::ZERO)
}

/// Convert a JSON float through its printed form, so `250.1` stays `250.1`.
/// `None` when the value does not fit a decimal.
fn float_amount(v: f64) -> Option<Money> {
    if v.is_finite() {
        parse_amount(&v.to_string())
    } else {
        None
    }
}

fn out_of_range<E: de::Error>(v: f64) -> E {
    E::custom(format!("amount {v} is outside the supported decimal range"))
}

/// An amount exactly as the caller typed or sent it.
///
/// Numbers become `Number`, strings are kept verbatim as `Text`. A number
/// too large for a decimal is rejected, as in [`lenient`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RawAmount {
    Number(Decimal),
    Text(String),
}

impl RawAmount {
    pub fn parse(&self) -> Option<Money> {
        match self {
            RawAmount::Number(d) => Some(*d),
            RawAmount::Text(s) => parse_amount(s),
        }
    }

    pub fn as_text(&self) -> String {
        match self {
            RawAmount::Number(d) => d.to_string(),
            RawAmount::Text(s) => s.clone(),
        }
    }
}

impl<'de> Deserialize<'de> for RawAmount {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(RawAmountVisitor)
    }
}

struct RawAmountVisitor;

impl<'de> Visitor<'de> for RawAmountVisitor {
    type Value = RawAmount;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a number or a string")
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<RawAmount, E> {
        Ok(RawAmount::Number(Decimal::from(v)))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<RawAmount, E> {
        Ok(RawAmount::Number(Decimal::from(v)))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<RawAmount, E> {
        float_amount(v)
            .map(RawAmount::Number)
            .ok_or_else(|| out_of_range(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<RawAmount, E> {
        Ok(RawAmount::Text(v.to_string()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<RawAmount, E> {
        Ok(RawAmount::Text(v))
    }
}

/// Serde adapter for amount fields: numbers and numeric strings parse,
/// anything else (null, empty, garbage) becomes zero. A number too large
/// for a decimal is a deserialization error rather than a silent zero.
///
/// Use as `#[serde(default, deserialize_with = "crate::amount::lenient")]`.
pub fn lenient<'de, D>(deserializer: D) -> Result<Money, D::Error>
where
    D: Deserializer<'de>,
{
    deserializer.deserialize_any(LenientAmountVisitor)
}

struct LenientAmountVisitor;

impl<'de> Visitor<'de> for LenientAmountVisitor {
    type Value = Money;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a number, a numeric string or null")
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Money, E> {
        Ok(Decimal::from(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Money, E> {
        Ok(Decimal::from(v))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Money, E> {
        float_amount(v).ok_or_else(|| out_of_range(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Money, E> {
        Ok(amount_or_zero(v))
    }

    fn visit_bool<E: de::Error>(self, _v: bool) -> Result<Money, E> {
        Ok(Decimal::ZERO)
    }

    fn visit_none<E: de::Error>(self) -> Result<Money, E> {
        Ok(Decimal::ZERO)
    }

    fn visit_unit<E: de::Error>(self) -> Result<Money, E> {
        Ok(Decimal::ZERO)
    }

    fn visit_some<D>(self, deserializer: D) -> Result<Money, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(LenientAmountVisitor)
    }
}
