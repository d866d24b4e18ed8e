use napi::Result as NapiResult;
use napi_derive::napi;
use rust_decimal::Decimal;
use serde::Serialize;

use fee_allocation_core::allocation::allocator::{self, Allocation, AllocationInput, AllocationSummary};
use fee_allocation_core::allocation::installment::Installment;
use fee_allocation_core::allocation::request::{self, PaymentRequestInput};
use fee_allocation_core::allocation::validation::{self, ValidationError};
use fee_allocation_core::amount;
use fee_allocation_core::timetable::{assignments, periods};

/// Convert any Display error into a napi::Error.
fn to_napi_error(e: impl std::fmt::Display) -> napi::Error {
    napi::Error::from_reason(e.to_string())
}

fn parse_allocations(allocations_json: &str) -> NapiResult<Vec<Allocation>> {
    serde_json::from_str(allocations_json).map_err(to_napi_error)
}

/// Amounts from JS arrive as text; unparsable text is zero.
fn parse_money(raw: &str) -> Decimal {
    amount::amount_or_zero(raw)
}

// ---------------------------------------------------------------------------
// Row-level allocation operations (driven by the payment form)
// ---------------------------------------------------------------------------

#[napi]
pub fn initialize_allocations(
    installments_json: String,
    include_carry_forward: bool,
) -> NapiResult<String> {
    let installments: Vec<Installment> =
        serde_json::from_str(&installments_json).map_err(to_napi_error)?;
    let output = allocator::initialize_allocations(&installments, include_carry_forward);
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn auto_distribute(
    allocations_json: String,
    payment_amount: String,
    include_carry_forward: bool,
) -> NapiResult<String> {
    let allocations = parse_allocations(&allocations_json)?;
    let output = allocator::auto_distribute(
        &allocations,
        parse_money(&payment_amount),
        include_carry_forward,
    );
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn set_manual_allocation(
    allocations_json: String,
    index: u32,
    raw_amount: String,
) -> NapiResult<String> {
    let allocations = parse_allocations(&allocations_json)?;
    let output = allocator::set_manual_allocation(&allocations, index as usize, &raw_amount)
        .map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn toggle_selection(
    allocations_json: String,
    index: u32,
    payment_amount: String,
) -> NapiResult<String> {
    let allocations = parse_allocations(&allocations_json)?;
    let remaining = allocator::remaining_to_allocate(&allocations, parse_money(&payment_amount));
    let output = allocator::toggle_selection(&allocations, index as usize, remaining)
        .map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[derive(Serialize)]
struct ValidationReport {
    is_valid: bool,
    errors: Vec<ValidationError>,
    messages: Vec<String>,
    summary: AllocationSummary,
}

#[napi]
pub fn validate_allocations(allocations_json: String, payment_amount: String) -> NapiResult<String> {
    let allocations = parse_allocations(&allocations_json)?;
    let payment = parse_money(&payment_amount);
    let errors = validation::validate(&allocations, payment);
    let report = ValidationReport {
        is_valid: errors.is_empty(),
        messages: errors.iter().map(|e| e.to_string()).collect(),
        errors,
        summary: allocator::summarize(&allocations, payment),
    };
    serde_json::to_string(&report).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// One-shot entry points
// ---------------------------------------------------------------------------

#[napi]
pub fn allocate_payment(input_json: String) -> NapiResult<String> {
    let input: AllocationInput = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = allocator::allocate(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn build_payment_request(input_json: String) -> NapiResult<String> {
    let input: PaymentRequestInput = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = request::prepare_payment(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Timetable
// ---------------------------------------------------------------------------

#[napi]
pub fn generate_periods(input_json: String) -> NapiResult<String> {
    let input: periods::DayScheduleInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = periods::generate_periods(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn validate_timetable(input_json: String) -> NapiResult<String> {
    let input: assignments::TimetableInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = assignments::validate_timetable(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}
