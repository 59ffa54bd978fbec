use crate::generator::{generate_emv_qr, GeneratorConfig};
use crate::models::{AdditionalData, Amount, PaymentPayload};
use crate::validation::validate_emv_qr;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::path::Path;

/// One payment per CSV row. Empty cells fall back to the generator defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchRow {
    #[serde(default)]
    pub merchant_id: Option<String>,
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub merchant_category_code: Option<String>,
    #[serde(default)]
    pub transaction_currency: Option<String>,
    #[serde(default)]
    pub transaction_amount: Option<String>,
    #[serde(default)]
    pub country_code: Option<String>,
    #[serde(default)]
    pub merchant_name: Option<String>,
    #[serde(default)]
    pub merchant_city: Option<String>,
    #[serde(default)]
    pub bill_number: Option<String>,
    #[serde(default)]
    pub customer_id: Option<String>,
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default)]
    pub merchant_tax_id: Option<String>,
}

impl BatchRow {
    pub fn into_payload(self) -> PaymentPayload {
        let mut account = BTreeMap::new();
        if let Some(id) = self.merchant_id {
            account.insert("02".to_string(), id);
        }
        if let Some(reference) = self.reference {
            account.insert("03".to_string(), reference);
        }
        let additional = AdditionalData {
            bill_number: self.bill_number,
            customer_id: self.customer_id,
            due_date: self.due_date,
        };

        PaymentPayload {
            merchant_account_info: (!account.is_empty()).then_some(account),
            merchant_category_code: self.merchant_category_code,
            transaction_currency: self.transaction_currency,
            transaction_amount: self.transaction_amount.map(Amount::from),
            country_code: self.country_code,
            merchant_name: self.merchant_name,
            merchant_city: self.merchant_city,
            additional_data: (!additional.is_empty()).then_some(additional),
            merchant_tax_id: self.merchant_tax_id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchOutput {
    pub row: usize,
    pub qr: String,
    pub valid: bool,
    pub errors: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub total_rows: usize,
    pub generated: usize,
    pub generation_failed: usize,
    pub validation_failed: usize,
}

pub fn generate_csv(
    input: &Path,
    output: &Path,
    config: &GeneratorConfig,
) -> Result<BatchSummary, String> {
    let reader = std::fs::File::open(input)
        .map_err(|err| format!("cannot open {}: {}", input.display(), err))?;
    let writer = std::fs::File::create(output)
        .map_err(|err| format!("cannot create {}: {}", output.display(), err))?;
    generate_batch(reader, writer, config)
}

/// Generates and validates a QR per row. Rows that fail are written with an
/// empty QR and their error instead of aborting the batch.
pub fn generate_batch<R: Read, W: Write>(
    input: R,
    output: W,
    config: &GeneratorConfig,
) -> Result<BatchSummary, String> {
    let mut reader = csv::Reader::from_reader(input);
    let mut writer = csv::Writer::from_writer(output);
    let mut summary = BatchSummary::default();

    for (idx, result) in reader.deserialize().enumerate() {
        let row: BatchRow = result.map_err(|err| err.to_string())?;
        let row_number = idx + 1;
        summary.total_rows += 1;

        let out = match generate_emv_qr(&row.into_payload(), config) {
            Ok(qr) => {
                let report = validate_emv_qr(&qr);
                if report.valid {
                    summary.generated += 1;
                } else {
                    summary.validation_failed += 1;
                }
                BatchOutput {
                    row: row_number,
                    qr,
                    valid: report.valid,
                    errors: report.errors.join("; "),
                }
            }
            Err(err) => {
                log::warn!("row {}: {}", row_number, err);
                summary.generation_failed += 1;
                BatchOutput {
                    row: row_number,
                    qr: String::new(),
                    valid: false,
                    errors: err.to_string(),
                }
            }
        };
        writer.serialize(out).map_err(|err| err.to_string())?;
    }

    writer.flush().map_err(|err| err.to_string())?;
    Ok(summary)
}
