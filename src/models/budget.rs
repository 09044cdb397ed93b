use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{EntityInput, Version};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetInput {
    pub category_id: Uuid,
    #[serde(with = "rust_decimal::serde::str")]
    pub monthly_limit: Decimal,
    pub start_date: NaiveDate,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
}

impl EntityInput for BudgetInput {
    fn category_id(&self) -> Uuid {
        self.category_id
    }

    fn check(&self) -> Result<(), String> {
        if self.monthly_limit < Decimal::ZERO {
            return Err(format!(
                "monthlyLimit must not be negative, got {}",
                self.monthly_limit
            ));
        }
        if let Some(end) = self.end_date {
            if end < self.start_date {
                return Err(format!(
                    "endDate {end} is before startDate {}",
                    self.start_date
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Budget {
    pub id: Uuid,
    pub user_id: Uuid,
    pub category_id: Uuid,
    #[serde(with = "rust_decimal::serde::str")]
    pub monthly_limit: Decimal,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub version: Version,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Budget {
    pub fn from_input(
        id: Uuid,
        user_id: Uuid,
        input: &BudgetInput,
        version: Version,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            user_id,
            category_id: input.category_id,
            monthly_limit: input.monthly_limit,
            start_date: input.start_date,
            end_date: input.end_date,
            version,
            created_at,
            updated_at,
        }
    }

    /// Whether the budget covers the given day.
    pub fn is_active_on(&self, day: NaiveDate) -> bool {
        day >= self.start_date && self.end_date.map_or(true, |end| day <= end)
    }
}

/// A budget joined with its category's display name.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetView {
    #[serde(flatten)]
    pub budget: Budget,
    pub category_name: String,
}
