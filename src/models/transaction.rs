use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{EntityInput, Version};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    Income,
    Expense,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Income => "INCOME",
            Self::Expense => "EXPENSE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "INCOME" => Some(Self::Income),
            "EXPENSE" => Some(Self::Expense),
            _ => None,
        }
    }
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionSource {
    Manual,
    SmsImport,
}

impl TransactionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Manual => "MANUAL",
            Self::SmsImport => "SMS_IMPORT",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "MANUAL" => Some(Self::Manual),
            "SMS_IMPORT" | "SMS" => Some(Self::SmsImport),
            _ => None,
        }
    }
}

/// Client-editable fields of a transaction. This is the body of create and
/// update requests and, together with an id, of a sync candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionInput {
    #[serde(rename = "type")]
    pub kind: TransactionType,
    #[serde(with = "rust_decimal::serde::str")]
    pub amount: Decimal,
    pub category_id: Uuid,
    #[serde(default)]
    pub sub_category_id: Option<Uuid>,
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub attachment_url: Option<String>,
    pub source: TransactionSource,
    #[serde(default)]
    pub sms_id: Option<Uuid>,
}

impl EntityInput for TransactionInput {
    fn category_id(&self) -> Uuid {
        self.category_id
    }

    fn check(&self) -> Result<(), String> {
        if self.amount < Decimal::ZERO {
            return Err(format!(
                "amount must not be negative, got {} (the type carries the sign)",
                self.amount
            ));
        }
        if self.sms_id.is_some() && self.source != TransactionSource::SmsImport {
            return Err("smsId is only allowed on SMS_IMPORT transactions".into());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    #[serde(with = "rust_decimal::serde::str")]
    pub amount: Decimal,
    pub category_id: Uuid,
    pub sub_category_id: Option<Uuid>,
    pub date: DateTime<Utc>,
    pub notes: Option<String>,
    pub attachment_url: Option<String>,
    pub source: TransactionSource,
    pub sms_id: Option<Uuid>,
    pub version: Version,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    pub fn from_input(
        id: Uuid,
        user_id: Uuid,
        input: &TransactionInput,
        version: Version,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            user_id,
            kind: input.kind,
            amount: input.amount,
            category_id: input.category_id,
            sub_category_id: input.sub_category_id,
            date: input.date,
            notes: input.notes.clone(),
            attachment_url: input.attachment_url.clone(),
            source: input.source,
            sms_id: input.sms_id,
            version,
            created_at,
            updated_at,
        }
    }
}
