use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::allocation::allocator::{total_allocated, Allocation};
use crate::types::*;

/// A reason an allocation cannot be submitted.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationError {
    #[error("Payment amount must be greater than zero")]
    InvalidPaymentAmount { payment_amount: Money },

    #[error("Total allocated ({allocated}) must equal the payment amount ({payment_amount})")]
    AllocationMismatch {
        allocated: Money,
        payment_amount: Money,
    },

    #[error("Select at least one installment")]
    NothingSelected,

    #[error("Installment '{installment_id}' is allocated {allocated}, above its maximum payable {max_payable}")]
    ExceedsMaximum {
        installment_id: RecordId,
        allocated: Money,
        max_payable: Money,
    },
}

/// Check an allocation list against the payment before submission.
///
/// Every rule is evaluated; the result lists all failures, empty when the
/// allocation can be submitted. The sum must match the payment to the cent.
pub fn validate(allocations: &[Allocation], payment_amount: Money) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if payment_amount <= Decimal::ZERO {
        errors.push(ValidationError::InvalidPaymentAmount { payment_amount });
    }

    let allocated = total_allocated(allocations);
    if allocated != payment_amount {
        errors.push(ValidationError::AllocationMismatch {
            allocated,
            payment_amount,
        });
    }

    if !allocations.iter().any(|a| a.is_selected) {
        errors.push(ValidationError::NothingSelected);
    }

    for a in allocations
        .iter()
        .filter(|a| a.is_selected && a.allocated_amount > a.max_payable_amount)
    {
        errors.push(ValidationError::ExceedsMaximum {
            installment_id: a.installment.id.clone(),
            allocated: a.allocated_amount,
            max_payable: a.max_payable_amount,
        });
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocation::allocator::{auto_distribute, initialize_allocations, set_manual_allocation};
    use crate::allocation::installment::Installment;
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    fn installments() -> Vec<Installment> {
        serde_json::from_value(serde_json::json!([
            { "id": "a", "installment_amount": 1000, "due_date": "2024-01-01" },
            { "id": "b", "installment_amount": 500, "carry_forward_amount": 200, "due_date": "2024-02-01" }
        ]))
        .unwrap()
    }

    #[test]
    fn test_valid_allocation_has_no_errors() {
        let allocs = auto_distribute(&initialize_allocations(&installments(), true), dec!(1200), true);
        assert!(validate(&allocs, dec!(1200)).is_empty());
    }

    #[test]
    fn test_payment_exceeding_capacity_is_mismatch() {
        let allocs = auto_distribute(&initialize_allocations(&installments(), true), dec!(2000), true);
        assert_eq!(
            validate(&allocs, dec!(2000)),
            vec![ValidationError::AllocationMismatch {
                allocated: dec!(1700),
                payment_amount: dec!(2000),
            }]
        );
    }

    #[test]
    fn test_one_cent_mismatch_is_an_error() {
        let allocs = initialize_allocations(&installments(), true);
        let allocs = set_manual_allocation(&allocs, 0, "999.99").unwrap();
        let errors = validate(&allocs, dec!(1000));
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], ValidationError::AllocationMismatch { .. }));
    }

    #[test]
    fn test_all_errors_collected() {
        let allocs = initialize_allocations(&installments(), true);
        let errors = validate(&allocs, Decimal::ZERO);
        // Zero payment, nothing selected; 0 == 0 so no mismatch
        assert_eq!(
            errors,
            vec![
                ValidationError::InvalidPaymentAmount {
                    payment_amount: Decimal::ZERO
                },
                ValidationError::NothingSelected,
            ]
        );

        let errors = validate(&allocs, dec!(-5));
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn test_over_ceiling_row_detected() {
        let mut allocs = initialize_allocations(&installments(), true);
        // Bypass the clamp to simulate a stale row after the ceiling changed
        allocs[1].allocated_amount = dec!(900);
        allocs[1].is_selected = true;
        let errors = validate(&allocs, dec!(900));
        assert_eq!(
            errors,
            vec![ValidationError::ExceedsMaximum {
                installment_id: "b".into(),
                allocated: dec!(900),
                max_payable: dec!(700),
            }]
        );
    }

    #[test]
    fn test_messages_are_readable() {
        let err = ValidationError::AllocationMismatch {
            allocated: dec!(1700),
            payment_amount: dec!(2000),
        };
        assert_eq!(
            err.to_string(),
            "Total allocated (1700) must equal the payment amount (2000)"
        );
        assert_eq!(
            ValidationError::NothingSelected.to_string(),
            "Select at least one installment"
        );
    }
}
