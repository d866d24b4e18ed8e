use clap::Args;
use rust_decimal::Decimal;
use serde_json::Value;

use fee_allocation_core::allocation::allocator::{self, AllocationInput};
use fee_allocation_core::allocation::request::{self, PaymentRequestInput};
use fee_allocation_core::FeeAllocationError;

use crate::input;

/// Arguments for allocating a payment across installments
#[derive(Args)]
pub struct AllocateArgs {
    /// Path to JSON input file (installments, payment amount, mode)
    #[arg(long)]
    pub input: Option<String>,

    /// Override the payment amount from the input
    #[arg(long)]
    pub payment_amount: Option<Decimal>,

    /// Leave carry-forward balances out of the installment ceilings
    #[arg(long)]
    pub exclude_carry_forward: bool,
}

/// Arguments for validating an allocation before submission
#[derive(Args)]
pub struct ValidateArgs {
    /// Path to JSON input file (same shape as `allocate`)
    #[arg(long)]
    pub input: Option<String>,

    /// Override the payment amount from the input
    #[arg(long)]
    pub payment_amount: Option<Decimal>,
}

/// Arguments for building a multi-installment payment request
#[derive(Args)]
pub struct BuildRequestArgs {
    /// Path to JSON input file (installments, form, context, mode)
    #[arg(long)]
    pub input: Option<String>,
}

pub fn run_allocate(args: AllocateArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let mut alloc_input: AllocationInput = input::read_input(args.input.as_deref(), "allocation")?;
    if let Some(amount) = args.payment_amount {
        alloc_input.payment_amount = amount;
    }
    if args.exclude_carry_forward {
        alloc_input.include_carry_forward = false;
    }
    let result = allocator::allocate(&alloc_input)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_validate(args: ValidateArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let mut alloc_input: AllocationInput = input::read_input(args.input.as_deref(), "allocation")?;
    if let Some(amount) = args.payment_amount {
        alloc_input.payment_amount = amount;
    }
    let result = allocator::allocate(&alloc_input)?;
    if !result.result.is_valid {
        return Err(FeeAllocationError::Validation(result.result.validation_errors).into());
    }
    Ok(serde_json::to_value(result.result.summary)?)
}

pub fn run_build_request(args: BuildRequestArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let req_input: PaymentRequestInput =
        input::read_input(args.input.as_deref(), "payment request")?;
    let result = request::prepare_payment(&req_input)?;
    Ok(serde_json::to_value(result)?)
}
