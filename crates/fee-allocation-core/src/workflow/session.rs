use rust_decimal::Decimal;

use crate::allocation::allocator::{
    auto_distribute, initialize_allocations, remaining_to_allocate, set_manual_allocation,
    summarize, toggle_selection, Allocation, AllocationSummary,
};
use crate::allocation::installment::Installment;
use crate::allocation::validation::{validate, ValidationError};
use crate::amount;
use crate::error::FeeAllocationError;
use crate::types::*;
use crate::FeeAllocationResult;

/// Editable allocation state behind one payment form.
///
/// Allocations are derived from the installment list and the carry-forward
/// flag. Changing either one rebuilds them from scratch, dropping manual
/// edits; setting an equal value is a no-op.
#[derive(Debug, Clone)]
pub struct PaymentSession {
    installments: Vec<Installment>,
    include_carry_forward: bool,
    payment_amount: Money,
    auto_distribute: bool,
    allocations: Vec<Allocation>,
}

impl PaymentSession {
    pub fn new(installments: Vec<Installment>, include_carry_forward: bool) -> Self {
        let allocations = initialize_allocations(&installments, include_carry_forward);
        PaymentSession {
            installments,
            include_carry_forward,
            payment_amount: Decimal::ZERO,
            auto_distribute: true,
            allocations,
        }
    }

    pub fn installments(&self) -> &[Installment] {
        &self.installments
    }

    pub fn allocations(&self) -> &[Allocation] {
        &self.allocations
    }

    pub fn payment_amount(&self) -> Money {
        self.payment_amount
    }

    pub fn include_carry_forward(&self) -> bool {
        self.include_carry_forward
    }

    pub fn is_auto_distribute(&self) -> bool {
        self.auto_distribute
    }

    /// Replace the installment list. Returns whether allocations were rebuilt.
    pub fn set_installments(&mut self, installments: Vec<Installment>) -> bool {
        if installments == self.installments {
            return false;
        }
        self.installments = installments;
        self.rebuild();
        true
    }

    /// Change the carry-forward flag. Returns whether allocations were rebuilt.
    pub fn set_include_carry_forward(&mut self, include: bool) -> bool {
        if include == self.include_carry_forward {
            return false;
        }
        self.include_carry_forward = include;
        self.rebuild();
        true
    }

    /// Set the payment amount from form text; unparsable or negative text
    /// counts as zero. Returns the amount actually used.
    pub fn set_payment_amount(&mut self, raw: &str) -> Money {
        self.payment_amount = amount::non_negative_amount(raw);
        if self.auto_distribute {
            self.redistribute();
        }
        self.payment_amount
    }

    /// Switch between automatic and manual allocation. Turning auto on
    /// redistributes immediately; turning it off keeps current amounts.
    pub fn set_auto_distribute(&mut self, enabled: bool) {
        self.auto_distribute = enabled;
        if enabled {
            self.redistribute();
        }
    }

    /// Type an amount into one row. Only allowed in manual mode.
    ///
    /// Returns `false` when the text was not a number and was treated as 0.
    pub fn edit_amount(&mut self, index: usize, raw: &str) -> FeeAllocationResult<bool> {
        if self.auto_distribute {
            return Err(FeeAllocationError::InvalidState {
                operation: "edit_amount".into(),
                state: "auto distribution is on".into(),
            });
        }
        self.allocations = set_manual_allocation(&self.allocations, index, raw)?;
        Ok(amount::parse_amount(raw).is_some())
    }

    /// Select or deselect a row, drawing from what is still unallocated.
    pub fn toggle(&mut self, index: usize) -> FeeAllocationResult<()> {
        let remaining = remaining_to_allocate(&self.allocations, self.payment_amount);
        self.allocations = toggle_selection(&self.allocations, index, remaining)?;
        Ok(())
    }

    pub fn summary(&self) -> AllocationSummary {
        summarize(&self.allocations, self.payment_amount)
    }

    pub fn validate(&self) -> Vec<ValidationError> {
        validate(&self.allocations, self.payment_amount)
    }

    /// Drop all derived state after a successful submission. The caller is
    /// expected to load a fresh installment list.
    pub fn discard(&mut self) {
        self.installments.clear();
        self.allocations.clear();
        self.payment_amount = Decimal::ZERO;
    }

    fn rebuild(&mut self) {
        self.allocations = initialize_allocations(&self.installments, self.include_carry_forward);
        if self.auto_distribute {
            self.redistribute();
        }
    }

    fn redistribute(&mut self) {
        self.allocations = auto_distribute(
            &self.allocations,
            self.payment_amount,
            self.include_carry_forward,
        );
    }
}
