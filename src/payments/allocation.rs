use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::errors::{LedgerError, Result};
use crate::fees::FeeLine;
use crate::types::TxId;

use super::Allocation;

/// Order in which fee lines receive payment.
///
/// Earliest due installment first; at the same installment required fees
/// go before optional ones; ties keep catalog order.
pub fn allocation_order(lines: &[FeeLine], due_installments: &[u32]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..lines.len()).collect();
    order.sort_by_key(|&i| {
        let rank = due_installments.get(i).copied().unwrap_or(u32::MAX);
        (rank, !lines[i].required, i)
    });
    order
}

/// how a payment amount splits across fee lines
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocationPlan {
    pub allocations: Vec<Allocation>,
    pub credit: Money,
}

impl AllocationPlan {
    pub fn total_allocated(&self) -> Money {
        let zero = Money::zero(self.credit.currency());
        self.allocations.iter().fold(zero, |acc, a| acc + a.amount)
    }
}

/// Walk the lines in `order` and apply `amount` to each one's remaining.
///
/// Pure: nothing is mutated. Lines with nothing remaining are skipped and
/// whatever is left after the last line becomes credit.
pub fn allocate(
    amount: Money,
    lines: &[FeeLine],
    remaining: &[Money],
    order: &[usize],
) -> Result<AllocationPlan> {
    if lines.len() != remaining.len() {
        return Err(LedgerError::InvalidConfiguration {
            message: format!(
                "{} fee lines but {} remaining balances",
                lines.len(),
                remaining.len()
            ),
        });
    }

    let mut available = amount;
    let mut allocations = Vec::new();

    for &i in order {
        if available.is_zero() {
            break;
        }

        let (line, outstanding) = match (lines.get(i), remaining.get(i)) {
            (Some(line), Some(outstanding)) => (line, *outstanding),
            _ => {
                return Err(LedgerError::InvalidConfiguration {
                    message: format!("allocation order references missing line {}", i),
                })
            }
        };

        if outstanding.is_zero() {
            continue;
        }

        let applied = available.min(outstanding);
        available = available.subtract(applied)?;
        allocations.push(Allocation {
            fee_id: line.fee_id.clone(),
            amount: applied,
        });
    }

    Ok(AllocationPlan {
        allocations,
        credit: available,
    })
}

/// outcome of applying one payment, returned to the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationResult {
    pub tx_id: TxId,
    pub allocations: Vec<Allocation>,
    pub credit_created: Money,
    pub balance_before: Money,
    pub balance_after: Money,
    pub credit_balance: Money,
}

impl AllocationResult {
    pub fn amount_applied(&self) -> Money {
        let zero = Money::zero(self.credit_created.currency());
        self.allocations.iter().fold(zero, |acc, a| acc + a.amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines() -> Vec<FeeLine> {
        vec![
            FeeLine::new("tuition", "Tuition", Money::php(10_000), true).due_with_installment(1),
            FeeLine::new("misc", "Miscellaneous", Money::php(5_000), true).due_with_installment(2),
        ]
    }

    #[test]
    fn test_partial_payment_fills_earliest_due_first() {
        let lines = lines();
        let remaining: Vec<Money> = lines.iter().map(|l| l.assessed_amount).collect();
        let order = allocation_order(&lines, &[1, 2]);

        let plan = allocate(Money::php(12_000), &lines, &remaining, &order).unwrap();

        assert_eq!(plan.allocations.len(), 2);
        assert_eq!(plan.allocations[0].amount, Money::php(10_000));
        assert_eq!(plan.allocations[1].amount, Money::php(2_000));
        assert!(plan.credit.is_zero());
    }

    #[test]
    fn test_overpayment_becomes_credit() {
        let lines = lines();
        let remaining: Vec<Money> = lines.iter().map(|l| l.assessed_amount).collect();
        let order = allocation_order(&lines, &[1, 2]);

        let plan = allocate(Money::php(20_000), &lines, &remaining, &order).unwrap();

        assert_eq!(plan.total_allocated(), Money::php(15_000));
        assert_eq!(plan.credit, Money::php(5_000));
    }

    #[test]
    fn test_settled_lines_are_skipped() {
        let lines = lines();
        let remaining = vec![Money::ZERO, Money::php(5_000)];
        let order = allocation_order(&lines, &[1, 2]);

        let plan = allocate(Money::php(1_000), &lines, &remaining, &order).unwrap();

        assert_eq!(plan.allocations.len(), 1);
        assert_eq!(plan.allocations[0].fee_id, "misc");
    }

    #[test]
    fn test_order_breaks_ties_by_required_then_catalog() {
        let lines = vec![
            FeeLine::new("a", "A", Money::php(1), false),
            FeeLine::new("b", "B", Money::php(1), true),
            FeeLine::new("c", "C", Money::php(1), true),
            FeeLine::new("d", "D", Money::php(1), true),
        ];
        let order = allocation_order(&lines, &[1, 1, 1, 0]);
        assert_eq!(order, vec![3, 1, 2, 0]);
    }

    #[test]
    fn test_mismatched_inputs_rejected() {
        let lines = lines();
        assert!(allocate(Money::php(1), &lines, &[Money::ZERO], &[0]).is_err());
    }
}
