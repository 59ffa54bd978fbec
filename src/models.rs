use crate::tlv::ParsedFields;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Payment data a QR is generated from. Accepts both the kiosk's camelCase
/// keys and the backend's snake_case keys.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentPayload {
    #[serde(
        default,
        alias = "merchant_account_info",
        alias = "merchant_account_information",
        alias = "merchantAccountInformation"
    )]
    pub merchant_account_info: Option<BTreeMap<String, String>>,
    #[serde(default, alias = "merchant_category_code")]
    pub merchant_category_code: Option<String>,
    #[serde(default, alias = "transaction_currency")]
    pub transaction_currency: Option<String>,
    #[serde(default, alias = "transaction_amount")]
    pub transaction_amount: Option<Amount>,
    #[serde(default, alias = "country_code")]
    pub country_code: Option<String>,
    #[serde(default, alias = "merchant_name")]
    pub merchant_name: Option<String>,
    #[serde(default, alias = "merchant_city")]
    pub merchant_city: Option<String>,
    #[serde(default, alias = "additional_data")]
    pub additional_data: Option<AdditionalData>,
    #[serde(default, rename = "50")]
    pub merchant_tax_id: Option<String>,
}

impl PaymentPayload {
    pub fn merchant_id(&self) -> Option<&str> {
        self.account_entry("02")
    }

    pub fn reference(&self) -> Option<&str> {
        self.account_entry("03")
    }

    fn account_entry(&self, key: &str) -> Option<&str> {
        self.merchant_account_info
            .as_ref()
            .and_then(|info| info.get(key))
            .map(String::as_str)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdditionalData {
    #[serde(default, alias = "bill_number")]
    pub bill_number: Option<String>,
    #[serde(default, alias = "customer_id")]
    pub customer_id: Option<String>,
    #[serde(default, alias = "due_date")]
    pub due_date: Option<String>,
}

impl AdditionalData {
    pub fn is_empty(&self) -> bool {
        self.bill_number.is_none() && self.customer_id.is_none() && self.due_date.is_none()
    }
}

/// Amount as sent by callers: a JSON number or a numeric string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Amount {
    Number(f64),
    Text(String),
}

impl From<f64> for Amount {
    fn from(value: f64) -> Self {
        Amount::Number(value)
    }
}

impl From<String> for Amount {
    fn from(value: String) -> Self {
        Amount::Text(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warnings: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<usize>,
}

impl ValidationReport {
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            valid: false,
            errors: vec![message.into()],
            warnings: None,
            length: None,
        }
    }

    pub fn passed(length: usize) -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            warnings: Some(Vec::new()),
            length: Some(length),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseOutcome {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<ParsedFields>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ParseOutcome {
    pub fn parsed(data: ParsedFields) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }

    pub fn field(&self, tag: &str) -> Option<&str> {
        self.data
            .as_ref()
            .and_then(|data| data.get(tag))
            .map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QrResponse {
    pub success: bool,
    pub qr: String,
    pub qr_image_url: String,
    pub validation: ValidationReport,
}
