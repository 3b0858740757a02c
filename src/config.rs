use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::decimal::{Currency, Money, Percent};
use crate::errors::{LedgerError, Result};
use crate::fees::LateFeePolicy;
use crate::payments::{PaymentPlan, PaymentPolicy};

/// billing configuration, as maintained on the admin settings screen
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillingConfig {
    pub currency: Currency,
    pub reminders: ReminderConfig,
    pub late_fees: LateFeePolicy,
    pub partial_payments: PaymentPolicy,
    pub schedules: Vec<ScheduleSetting>,
}

/// reminder preferences
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderConfig {
    pub enabled: bool,
    /// days before a due date the upcoming reminder starts
    pub lead_days: u32,
    /// grace period used when the plan has no schedule setting of its own
    pub grace_period_days: u32,
}

/// a named payment schedule with its own grace period and late fee
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleSetting {
    pub name: String,
    pub interval_days: u32,
    pub grace_period_days: u32,
    pub late_fee: Money,
}

impl BillingConfig {
    /// senior high defaults: monthly and quarterly schedules, 3-day reminders,
    /// partial payments from 5,000
    pub fn senior_high_default() -> Self {
        Self {
            currency: Currency::Php,
            reminders: ReminderConfig {
                enabled: true,
                lead_days: 3,
                grace_period_days: 7,
            },
            late_fees: LateFeePolicy::fixed(Money::php(500)),
            partial_payments: PaymentPolicy {
                allow_partial: true,
                minimum_partial_amount: Some(Money::php(5_000)),
                allow_late_payments: true,
            },
            schedules: vec![
                ScheduleSetting {
                    name: "Monthly Payment".to_string(),
                    interval_days: 30,
                    grace_period_days: 7,
                    late_fee: Money::php(500),
                },
                ScheduleSetting {
                    name: "Quarterly Payment".to_string(),
                    interval_days: 90,
                    grace_period_days: 10,
                    late_fee: Money::php(1_000),
                },
            ],
        }
    }

    pub fn validate(&self) -> Result<()> {
        let amounts = self
            .schedules
            .iter()
            .map(|s| s.late_fee)
            .chain(std::iter::once(self.late_fees.fixed))
            .chain(self.partial_payments.minimum_partial_amount);

        for amount in amounts {
            if amount.currency() != self.currency {
                return Err(LedgerError::CurrencyMismatch {
                    expected: self.currency,
                    found: amount.currency(),
                });
            }
        }

        if let Some(percent) = self.late_fees.percent {
            if !percent.is_bounded() {
                return Err(LedgerError::InvalidConfiguration {
                    message: format!("late fee percent {} outside 0..=100", percent),
                });
            }
        }

        for schedule in &self.schedules {
            if schedule.interval_days == 0 {
                return Err(LedgerError::InvalidConfiguration {
                    message: format!("schedule {} has zero interval", schedule.name),
                });
            }
        }

        Ok(())
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: BillingConfig = serde_json::from_str(json)?;
        config.validate()?;
        debug!(schedules = config.schedules.len(), "billing config loaded");
        Ok(config)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn schedule_for(&self, plan: &PaymentPlan) -> Option<&ScheduleSetting> {
        self.schedules.iter().find(|s| s.name == plan.name)
    }

    /// grace period for an account on this plan
    pub fn grace_days_for(&self, plan: Option<&PaymentPlan>) -> u32 {
        plan.and_then(|p| self.schedule_for(p))
            .map(|s| s.grace_period_days)
            .unwrap_or(self.reminders.grace_period_days)
    }

    /// late fee policy with the plan's own flat fee when it has one
    pub fn late_fee_policy_for(&self, plan: Option<&PaymentPlan>) -> LateFeePolicy {
        match plan.and_then(|p| self.schedule_for(p)) {
            Some(schedule) => LateFeePolicy {
                fixed: schedule.late_fee,
                ..self.late_fees
            },
            None => self.late_fees,
        }
    }

    /// monthly plan matching the configured schedule
    pub fn monthly_plan(&self, installments: u32, down_payment: Percent) -> Result<PaymentPlan> {
        self.plan_from_schedule("Monthly Payment", installments, down_payment)
    }

    /// build a plan from a named schedule setting
    pub fn plan_from_schedule(
        &self,
        name: &str,
        installments: u32,
        down_payment: Percent,
    ) -> Result<PaymentPlan> {
        let schedule = self
            .schedules
            .iter()
            .find(|s| s.name == name)
            .ok_or_else(|| LedgerError::InvalidConfiguration {
                message: format!("no payment schedule named {}", name),
            })?;
        PaymentPlan::new(&schedule.name, installments, schedule.interval_days, down_payment)
    }
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self::senior_high_default()
    }
}
