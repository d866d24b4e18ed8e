use std::collections::HashMap;
use std::time::Instant;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::allocation::installment::{installment_label, Installment};
use crate::allocation::validation::{validate, ValidationError};
use crate::amount::{self, RawAmount};
use crate::error::FeeAllocationError;
use crate::types::*;
use crate::FeeAllocationResult;

// ---------------------------------------------------------------------------
// Allocation state
// ---------------------------------------------------------------------------

/// The portion of one payment assigned to a single installment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Allocation {
    pub installment: Installment,
    /// Amount due before carry-forward (>= 0)
    pub base_payable_amount: Money,
    /// Installment carry-forward, or zero when carry-forward is excluded
    pub carry_forward_amount: Money,
    /// Ceiling for `allocated_amount`
    pub max_payable_amount: Money,
    pub allocated_amount: Money,
    /// `max_payable_amount - allocated_amount`
    pub remaining_amount: Money,
    pub is_selected: bool,
}

impl Allocation {
    fn new(installment: &Installment, include_carry_forward: bool) -> Self {
        let base_payable_amount = installment.base_payable_amount();
        let carry_forward_amount = if include_carry_forward {
            installment.carry_forward_amount.max(Decimal::ZERO)
        } else {
            Decimal::ZERO
        };
        // A partially paid installment's remaining amount already covers
        // its carry-forward, so nothing is added on top. A paid one takes
        // nothing at all.
        let max_payable_amount = if installment.is_paid() {
            Decimal::ZERO
        } else if installment.is_partially_paid() {
            base_payable_amount
        } else {
            base_payable_amount + carry_forward_amount
        };
        Allocation {
            installment: installment.clone(),
            base_payable_amount,
            carry_forward_amount,
            max_payable_amount,
            allocated_amount: Decimal::ZERO,
            remaining_amount: max_payable_amount,
            is_selected: false,
        }
    }

    /// Set the allocated amount, clamped to `[0, max_payable_amount]`.
    pub fn assign(&mut self, amount: Money) {
        let clamped = amount.max(Decimal::ZERO).min(self.max_payable_amount);
        self.allocated_amount = clamped;
        self.remaining_amount = self.max_payable_amount - clamped;
        self.is_selected = clamped > Decimal::ZERO;
    }

    /// Zero the allocation and deselect the row.
    pub fn clear(&mut self) {
        self.allocated_amount = Decimal::ZERO;
        self.remaining_amount = self.max_payable_amount;
        self.is_selected = false;
    }
}

/// Totals across an allocation list for a given payment amount.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationSummary {
    pub payment_amount: Money,
    /// Sum of every row's ceiling
    pub total_capacity: Money,
    /// Sum allocated across selected rows
    pub total_allocated: Money,
    /// Payment left to place; negative when rows are over-allocated
    pub remaining_to_allocate: Money,
    pub selected_count: usize,
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

/// Build a fresh allocation list, one row per installment, nothing allocated.
pub fn initialize_allocations(
    installments: &[Installment],
    include_carry_forward: bool,
) -> Vec<Allocation> {
    installments
        .iter()
        .map(|inst| Allocation::new(inst, include_carry_forward))
        .collect()
}

/// Greedily place `payment_amount` across the allocations.
///
/// Rows are filled in ascending due-date order (missing dates first), ties
/// broken by the smaller ceiling. Each row takes as much as it can until the
/// payment runs out. The returned list keeps the input order.
pub fn auto_distribute(
    allocations: &[Allocation],
    payment_amount: Money,
    include_carry_forward: bool,
) -> Vec<Allocation> {
    let mut result: Vec<Allocation> = allocations
        .iter()
        .map(|a| Allocation::new(&a.installment, include_carry_forward))
        .collect();

    let mut order: Vec<usize> = (0..result.len()).collect();
    order.sort_by(|&a, &b| {
        let (ra, rb) = (&result[a], &result[b]);
        ra.installment
            .sort_date()
            .cmp(&rb.installment.sort_date())
            .then(ra.max_payable_amount.cmp(&rb.max_payable_amount))
    });

    let mut remaining = payment_amount;
    for idx in order {
        if remaining <= Decimal::ZERO {
            break;
        }
        let row = &mut result[idx];
        let amount = remaining.min(row.max_payable_amount);
        if amount > Decimal::ZERO {
            row.assign(amount);
            remaining -= amount;
        }
    }

    result
}

/// Overwrite one row with a user-typed amount.
///
/// The input is parsed as a non-negative amount (unparsable text counts as
/// zero) and clamped to the row's ceiling. Other rows are untouched, so the
/// total may exceed the payment until [`validate`] catches it.
pub fn set_manual_allocation(
    allocations: &[Allocation],
    index: usize,
    raw_amount: &str,
) -> FeeAllocationResult<Vec<Allocation>> {
    check_index(allocations, index)?;
    let mut result = allocations.to_vec();
    result[index].assign(amount::non_negative_amount(raw_amount));
    Ok(result)
}

/// Flip a row's selection.
///
/// Deselecting releases the row's amount back to the unallocated pool.
/// Selecting takes whatever is still unallocated, up to the row's ceiling.
pub fn toggle_selection(
    allocations: &[Allocation],
    index: usize,
    total_remaining_to_allocate: Money,
) -> FeeAllocationResult<Vec<Allocation>> {
    check_index(allocations, index)?;
    let mut result = allocations.to_vec();
    let row = &mut result[index];
    if row.is_selected {
        row.clear();
    } else {
        let available = total_remaining_to_allocate.max(Decimal::ZERO) + row.allocated_amount;
        row.assign(available.min(row.max_payable_amount));
    }
    Ok(result)
}

/// Payment still to be placed: `payment_amount - Σ allocated (selected)`.
pub fn remaining_to_allocate(allocations: &[Allocation], payment_amount: Money) -> Money {
    payment_amount - total_allocated(allocations)
}

pub fn total_allocated(allocations: &[Allocation]) -> Money {
    allocations
        .iter()
        .filter(|a| a.is_selected)
        .map(|a| a.allocated_amount)
        .sum()
}

pub fn summarize(allocations: &[Allocation], payment_amount: Money) -> AllocationSummary {
    let total_allocated = total_allocated(allocations);
    AllocationSummary {
        payment_amount,
        total_capacity: allocations.iter().map(|a| a.max_payable_amount).sum(),
        total_allocated,
        remaining_to_allocate: payment_amount - total_allocated,
        selected_count: allocations.iter().filter(|a| a.is_selected).count(),
    }
}

fn check_index(allocations: &[Allocation], index: usize) -> FeeAllocationResult<()> {
    if index >= allocations.len() {
        return Err(FeeAllocationError::InvalidInput {
            field: "index".into(),
            reason: format!(
                "Row {} does not exist ({} allocations)",
                index,
                allocations.len()
            ),
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// One-shot entry point
// ---------------------------------------------------------------------------

/// How the payment should be spread across installments.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AllocationMode {
    /// Earliest due date first, then smallest ceiling
    #[default]
    Auto,
    /// Amounts typed per installment
    Manual { amounts: Vec<ManualAmount> },
}

/// A typed amount for one installment, keyed by installment id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManualAmount {
    pub installment_id: RecordId,
    pub amount: RawAmount,
}

/// Input for a complete allocation pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationInput {
    pub installments: Vec<Installment>,
    #[serde(deserialize_with = "crate::amount::lenient")]
    pub payment_amount: Money,
    #[serde(default = "default_include_carry_forward")]
    pub include_carry_forward: bool,
    #[serde(default)]
    pub mode: AllocationMode,
    /// Fee type id -> display name
    #[serde(default)]
    pub fee_type_names: HashMap<String, String>,
}

pub(crate) fn default_include_carry_forward() -> bool {
    true
}

/// Flat view of one allocation row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationRow {
    pub installment_id: RecordId,
    pub label: String,
    pub due_date: Option<NaiveDate>,
    pub base_payable_amount: Money,
    pub carry_forward_amount: Money,
    pub max_payable_amount: Money,
    pub allocated_amount: Money,
    pub remaining_amount: Money,
    pub is_selected: bool,
}

/// Result of a complete allocation pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationOutput {
    pub rows: Vec<AllocationRow>,
    pub summary: AllocationSummary,
    /// True when the allocation could be submitted as-is
    pub is_valid: bool,
    pub validation_errors: Vec<ValidationError>,
}

/// Initialise, distribute (automatically or from typed amounts), summarise
/// and validate in one call.
///
/// Validation failures are reported in the output rather than as an error,
/// since a half-finished allocation is a normal state while editing.
pub fn allocate(input: &AllocationInput) -> FeeAllocationResult<ComputationOutput<AllocationOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    if input.payment_amount < Decimal::ZERO {
        return Err(FeeAllocationError::InvalidInput {
            field: "payment_amount".into(),
            reason: "Payment amount cannot be negative".into(),
        });
    }

    for inst in input.installments.iter().filter(|i| i.due_date.is_none()) {
        warnings.push(format!(
            "Installment '{}' has no valid due date; it is ordered first",
            inst.id
        ));
    }

    let initial = initialize_allocations(&input.installments, input.include_carry_forward);
    let (allocations, methodology) = match &input.mode {
        AllocationMode::Auto => (
            auto_distribute(&initial, input.payment_amount, input.include_carry_forward),
            "Auto distribution (earliest due date, then smallest ceiling)",
        ),
        AllocationMode::Manual { amounts } => (
            apply_manual_amounts(&initial, amounts, &mut warnings)?,
            "Manual allocation (typed amounts clamped to installment ceilings)",
        ),
    };

    let summary = summarize(&allocations, input.payment_amount);
    let validation_errors = validate(&allocations, input.payment_amount);
    let rows = allocations
        .iter()
        .map(|a| AllocationRow {
            installment_id: a.installment.id.clone(),
            label: installment_label(&a.installment, &input.fee_type_names),
            due_date: a.installment.due_date,
            base_payable_amount: a.base_payable_amount,
            carry_forward_amount: a.carry_forward_amount,
            max_payable_amount: a.max_payable_amount,
            allocated_amount: a.allocated_amount,
            remaining_amount: a.remaining_amount,
            is_selected: a.is_selected,
        })
        .collect();

    let output = AllocationOutput {
        rows,
        summary,
        is_valid: validation_errors.is_empty(),
        validation_errors,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        methodology,
        &serde_json::json!({
            "payment_amount": input.payment_amount.to_string(),
            "include_carry_forward": input.include_carry_forward,
            "num_installments": input.installments.len(),
        }),
        warnings,
        elapsed,
        output,
    ))
}

/// Apply typed amounts by installment id, warning on unknown ids and on
/// text that fell back to zero.
pub(crate) fn apply_manual_amounts(
    allocations: &[Allocation],
    amounts: &[ManualAmount],
    warnings: &mut Vec<String>,
) -> FeeAllocationResult<Vec<Allocation>> {
    let mut result = allocations.to_vec();
    for entry in amounts {
        let Some(index) = result
            .iter()
            .position(|a| a.installment.id == entry.installment_id)
        else {
            warnings.push(format!(
                "Ignoring amount for unknown installment '{}'",
                entry.installment_id
            ));
            continue;
        };
        if entry.amount.parse().is_none() {
            warnings.push(format!(
                "Amount '{}' for installment '{}' is not a number; treated as 0",
                entry.amount.as_text(),
                entry.installment_id
            ));
        }
        result = set_manual_allocation(&result, index, &entry.amount.as_text())?;
    }
    Ok(result)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocation::installment::PaymentStatus;
    use rust_decimal_macros::dec;

    fn installment(id: &str, amount: Money, due: Option<(i32, u32, u32)>, cf: Money) -> Installment {
        Installment {
            id: id.into(),
            fee_type_id: None,
            installment_amount: amount,
            discounted_amount: Decimal::ZERO,
            carry_forward_amount: cf,
            remaining_amount: Decimal::ZERO,
            payment_status: PaymentStatus::Unpaid,
            due_date: due.and_then(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d)),
            applied_concessions: vec![],
        }
    }

    /// Two installments: 1000 due Jan, 500 + 200 carry-forward due Feb
    fn two_installments() -> Vec<Installment> {
        vec![
            installment("jan", dec!(1000), Some((2024, 1, 1)), dec!(0)),
            installment("feb", dec!(500), Some((2024, 2, 1)), dec!(200)),
        ]
    }

    #[test]
    fn test_initialize_with_and_without_carry_forward() {
        let with_cf = initialize_allocations(&two_installments(), true);
        assert_eq!(with_cf[1].max_payable_amount, dec!(700));
        assert_eq!(with_cf[1].carry_forward_amount, dec!(200));
        assert!(with_cf.iter().all(|a| !a.is_selected && a.allocated_amount.is_zero()));

        let without_cf = initialize_allocations(&two_installments(), false);
        assert_eq!(without_cf[1].max_payable_amount, dec!(500));
        assert_eq!(without_cf[1].carry_forward_amount, Decimal::ZERO);
    }

    #[test]
    fn test_initialize_discount_and_partial_payment() {
        let mut discounted = installment("d", dec!(1000), None, dec!(100));
        discounted.discounted_amount = dec!(150);
        let mut partial = installment("p", dec!(1000), None, dec!(100));
        partial.payment_status = PaymentStatus::PartiallyPaid;
        partial.remaining_amount = dec!(420);

        let allocs = initialize_allocations(&[discounted, partial], true);
        assert_eq!(allocs[0].base_payable_amount, dec!(850));
        assert_eq!(allocs[0].max_payable_amount, dec!(950));
        // Carry-forward is not added on top of a partial remaining amount
        assert_eq!(allocs[1].base_payable_amount, dec!(420));
        assert_eq!(allocs[1].max_payable_amount, dec!(420));
    }

    #[test]
    fn test_auto_distribute_earliest_first() {
        let allocs = initialize_allocations(&two_installments(), true);
        let out = auto_distribute(&allocs, dec!(1200), true);

        assert_eq!(out[0].allocated_amount, dec!(1000));
        assert_eq!(out[0].remaining_amount, Decimal::ZERO);
        assert_eq!(out[1].allocated_amount, dec!(200));
        assert_eq!(out[1].remaining_amount, dec!(500));
        assert!(out.iter().all(|a| a.is_selected));
        assert_eq!(total_allocated(&out), dec!(1200));
    }

    #[test]
    fn test_auto_distribute_skips_paid_installment() {
        let mut paid = installment("paid", dec!(1000), Some((2024, 1, 1)), dec!(0));
        paid.payment_status = PaymentStatus::Paid;
        let open = installment("open", dec!(500), Some((2024, 2, 1)), dec!(200));

        let allocs = initialize_allocations(&[paid, open], true);
        assert_eq!(allocs[0].max_payable_amount, Decimal::ZERO);

        let out = auto_distribute(&allocs, dec!(700), true);
        assert_eq!(out[0].allocated_amount, Decimal::ZERO);
        assert!(!out[0].is_selected);
        assert_eq!(out[1].allocated_amount, dec!(700));
        assert_eq!(out[1].remaining_amount, Decimal::ZERO);
    }

    #[test]
    fn test_auto_distribute_tie_broken_by_smaller_ceiling() {
        let insts = vec![
            installment("big", dec!(800), Some((2024, 3, 1)), dec!(0)),
            installment("small", dec!(300), Some((2024, 3, 1)), dec!(0)),
        ];
        let allocs = initialize_allocations(&insts, true);
        let out = auto_distribute(&allocs, dec!(500), true);

        // Input order is preserved in the output
        assert_eq!(out[0].installment.id, "big");
        assert_eq!(out[1].allocated_amount, dec!(300));
        assert_eq!(out[0].allocated_amount, dec!(200));
    }

    #[test]
    fn test_auto_distribute_missing_due_date_goes_first() {
        let insts = vec![
            installment("dated", dec!(500), Some((2020, 1, 1)), dec!(0)),
            installment("undated", dec!(500), None, dec!(0)),
        ];
        let allocs = initialize_allocations(&insts, true);
        let out = auto_distribute(&allocs, dec!(500), true);
        assert_eq!(out[1].allocated_amount, dec!(500));
        assert!(!out[0].is_selected);
    }

    #[test]
    fn test_auto_distribute_resets_previous_edits() {
        let allocs = initialize_allocations(&two_installments(), true);
        let edited = set_manual_allocation(&allocs, 1, "700").unwrap();
        let out = auto_distribute(&edited, dec!(100), true);
        assert_eq!(out[0].allocated_amount, dec!(100));
        assert_eq!(out[1].allocated_amount, Decimal::ZERO);
        assert!(!out[1].is_selected);
    }

    #[test]
    fn test_auto_distribute_capacity_shortfall() {
        let allocs = initialize_allocations(&two_installments(), true);
        let out = auto_distribute(&allocs, dec!(2000), true);
        assert_eq!(total_allocated(&out), dec!(1700));
        for a in &out {
            assert_eq!(a.allocated_amount, a.max_payable_amount);
        }
    }

    #[test]
    fn test_auto_distribute_is_deterministic() {
        let allocs = initialize_allocations(&two_installments(), true);
        let first = auto_distribute(&allocs, dec!(850.75), true);
        let second = auto_distribute(&allocs, dec!(850.75), true);
        assert_eq!(first, second);
    }

    #[test]
    fn test_manual_allocation_clamps() {
        let allocs = initialize_allocations(&two_installments(), false);
        let out = set_manual_allocation(&allocs, 1, "9999").unwrap();
        assert_eq!(out[1].allocated_amount, dec!(500));
        assert_eq!(out[1].remaining_amount, Decimal::ZERO);
        assert!(out[1].is_selected);
        // Other rows untouched
        assert_eq!(out[0], allocs[0]);

        let negative = set_manual_allocation(&out, 1, "-20").unwrap();
        assert_eq!(negative[1].allocated_amount, Decimal::ZERO);
        assert!(!negative[1].is_selected);

        let garbage = set_manual_allocation(&out, 1, "lots").unwrap();
        assert_eq!(garbage[1].allocated_amount, Decimal::ZERO);
    }

    #[test]
    fn test_manual_allocation_bad_index() {
        let allocs = initialize_allocations(&two_installments(), true);
        match set_manual_allocation(&allocs, 5, "10").unwrap_err() {
            FeeAllocationError::InvalidInput { field, .. } => assert_eq!(field, "index"),
            other => panic!("Expected InvalidInput, got: {other:?}"),
        }
    }

    #[test]
    fn test_toggle_selection_select_and_release() {
        let allocs = initialize_allocations(&two_installments(), true);
        let remaining = remaining_to_allocate(&allocs, dec!(1200));
        let selected = toggle_selection(&allocs, 0, remaining).unwrap();
        assert_eq!(selected[0].allocated_amount, dec!(1000));
        assert!(selected[0].is_selected);

        let remaining = remaining_to_allocate(&selected, dec!(1200));
        assert_eq!(remaining, dec!(200));
        let both = toggle_selection(&selected, 1, remaining).unwrap();
        assert_eq!(both[1].allocated_amount, dec!(200));

        let released = toggle_selection(&both, 0, Decimal::ZERO).unwrap();
        assert!(!released[0].is_selected);
        assert_eq!(released[0].allocated_amount, Decimal::ZERO);
        assert_eq!(remaining_to_allocate(&released, dec!(1200)), dec!(1000));
    }

    #[test]
    fn test_toggle_selection_with_nothing_left() {
        let allocs = initialize_allocations(&two_installments(), true);
        let full = auto_distribute(&allocs, dec!(1000), true);
        let out = toggle_selection(&full, 1, remaining_to_allocate(&full, dec!(1000))).unwrap();
        assert_eq!(out[1].allocated_amount, Decimal::ZERO);
        assert!(!out[1].is_selected);
    }

    #[test]
    fn test_summarize() {
        let allocs = initialize_allocations(&two_installments(), true);
        let out = auto_distribute(&allocs, dec!(1200), true);
        let summary = summarize(&out, dec!(1200));
        assert_eq!(summary.total_capacity, dec!(1700));
        assert_eq!(summary.total_allocated, dec!(1200));
        assert_eq!(summary.remaining_to_allocate, Decimal::ZERO);
        assert_eq!(summary.selected_count, 2);
    }

    #[test]
    fn test_allocate_manual_mode_warnings() {
        let input = AllocationInput {
            installments: two_installments(),
            payment_amount: dec!(300),
            include_carry_forward: true,
            mode: AllocationMode::Manual {
                amounts: vec![
                    ManualAmount {
                        installment_id: "jan".into(),
                        amount: RawAmount::Text("three hundred".into()),
                    },
                    ManualAmount {
                        installment_id: "feb".into(),
                        amount: RawAmount::Number(dec!(300)),
                    },
                    ManualAmount {
                        installment_id: "mar".into(),
                        amount: RawAmount::Number(dec!(1)),
                    },
                ],
            },
            fee_type_names: HashMap::new(),
        };
        let result = allocate(&input).unwrap();
        let out = &result.result;
        assert_eq!(out.rows[0].allocated_amount, Decimal::ZERO);
        assert_eq!(out.rows[1].allocated_amount, dec!(300));
        assert!(out.is_valid);
        assert_eq!(result.warnings.len(), 2);
    }

    #[test]
    fn test_allocate_rejects_negative_payment() {
        let input = AllocationInput {
            installments: two_installments(),
            payment_amount: dec!(-1),
            include_carry_forward: true,
            mode: AllocationMode::Auto,
            fee_type_names: HashMap::new(),
        };
        assert!(allocate(&input).is_err());
    }
}
