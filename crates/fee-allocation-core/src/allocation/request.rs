use std::time::Instant;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::allocation::allocator::{
    apply_manual_amounts, auto_distribute, default_include_carry_forward,
    initialize_allocations, Allocation, AllocationMode,
};
use crate::allocation::installment::Installment;
use crate::allocation::validation::validate;
use crate::error::FeeAllocationError;
use crate::types::*;
use crate::FeeAllocationResult;

// ---------------------------------------------------------------------------
// Input types
// ---------------------------------------------------------------------------

/// How the money was received.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMode {
    #[default]
    Cash,
    Cheque,
    BankTransfer,
    Card,
    Upi,
    Online,
    Other,
}

/// Values entered on the payment form alongside the allocation table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentForm {
    #[serde(deserialize_with = "crate::amount::lenient")]
    pub payment_amount: Money,
    #[serde(default = "default_include_carry_forward")]
    pub include_carry_forward: bool,
    #[serde(default)]
    pub payment_mode: PaymentMode,
    pub payment_date: NaiveDate,
    #[serde(default)]
    pub transaction_reference: Option<String>,
    #[serde(default)]
    pub remarks: Option<String>,
    /// Overrides the context's current session when set
    #[serde(default)]
    pub academic_session_id: Option<RecordId>,
}

/// Caller-supplied identity for the request: the student being charged and
/// the academic session to fall back on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestContext {
    pub student_id: RecordId,
    #[serde(default)]
    pub current_session_id: Option<RecordId>,
}

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

/// Payment recorded against one installment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentLineItem {
    pub installment_id: RecordId,
    /// Portion applied to the regular (non carry-forward) due
    pub amount_paid: Money,
    /// Pre-existing discount, passed through
    pub discount_amount: Money,
    pub payment_mode: PaymentMode,
    pub payment_date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_reference: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remarks: Option<String>,
    /// What the installment still owes after this payment
    pub remaining_amount: Money,
    pub carry_forward_paid: Money,
    pub applied_concessions: Vec<serde_json::Value>,
}

/// Body for the "pay multiple installments" endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub student_id: RecordId,
    pub academic_session_id: RecordId,
    pub installments: Vec<PaymentLineItem>,
}

// ---------------------------------------------------------------------------
// Building
// ---------------------------------------------------------------------------

/// Split an allocation into `(regular, carry_forward)` portions.
///
/// The allocation's own carry-forward (zero when it was built without
/// carry-forward) is settled first and only the excess counts against the
/// regular due.
pub fn split_allocated(allocation: &Allocation) -> (Money, Money) {
    let carry_forward = allocation.carry_forward_amount;
    if carry_forward > Decimal::ZERO {
        let cf_paid = allocation.allocated_amount.min(carry_forward);
        let regular = (allocation.allocated_amount - cf_paid).max(Decimal::ZERO);
        (regular, cf_paid)
    } else {
        (allocation.allocated_amount, Decimal::ZERO)
    }
}

/// Turn the selected allocations into a payment request.
///
/// Rows that are unselected or carry a zero amount are left out. Discounts
/// and concession records are copied from the installment as-is.
pub fn build_payment_request(
    allocations: &[Allocation],
    form: &PaymentForm,
    context: &RequestContext,
) -> FeeAllocationResult<PaymentRequest> {
    if context.student_id.trim().is_empty() {
        return Err(FeeAllocationError::InvalidInput {
            field: "student_id".into(),
            reason: "Student id is required".into(),
        });
    }
    let academic_session_id = form
        .academic_session_id
        .clone()
        .or_else(|| context.current_session_id.clone())
        .ok_or_else(|| FeeAllocationError::InvalidInput {
            field: "academic_session_id".into(),
            reason: "No academic session on the form or in the context".into(),
        })?;

    let installments = allocations
        .iter()
        .filter(|a| a.is_selected && a.allocated_amount > Decimal::ZERO)
        .map(|a| {
            let (amount_paid, carry_forward_paid) = split_allocated(a);
            PaymentLineItem {
                installment_id: a.installment.id.clone(),
                amount_paid,
                discount_amount: a.installment.discounted_amount,
                payment_mode: form.payment_mode,
                payment_date: form.payment_date,
                transaction_reference: form.transaction_reference.clone(),
                remarks: form.remarks.clone(),
                remaining_amount: a.remaining_amount,
                carry_forward_paid,
                applied_concessions: a.installment.applied_concessions.clone(),
            }
        })
        .collect();

    Ok(PaymentRequest {
        student_id: context.student_id.clone(),
        academic_session_id,
        installments,
    })
}

/// Input for preparing a submission in one call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRequestInput {
    pub installments: Vec<Installment>,
    pub form: PaymentForm,
    pub context: RequestContext,
    #[serde(default)]
    pub mode: AllocationMode,
}

/// Allocate, validate and build the request.
///
/// Any validation failure aborts with [`FeeAllocationError::Validation`]
/// carrying every rule that failed.
pub fn prepare_payment(
    input: &PaymentRequestInput,
) -> FeeAllocationResult<ComputationOutput<PaymentRequest>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();
    let form = &input.form;

    let initial = initialize_allocations(&input.installments, form.include_carry_forward);
    let allocations = match &input.mode {
        AllocationMode::Auto => {
            auto_distribute(&initial, form.payment_amount, form.include_carry_forward)
        }
        AllocationMode::Manual { amounts } => {
            apply_manual_amounts(&initial, amounts, &mut warnings)?
        }
    };

    let errors = validate(&allocations, form.payment_amount);
    if !errors.is_empty() {
        return Err(FeeAllocationError::Validation(errors));
    }

    let request = build_payment_request(&allocations, form, &input.context)?;

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Multi-installment payment request (carry-forward settled first)",
        &serde_json::json!({
            "payment_amount": form.payment_amount.to_string(),
            "include_carry_forward": form.include_carry_forward,
            "num_installments": input.installments.len(),
        }),
        warnings,
        elapsed,
        request,
    ))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
