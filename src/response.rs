//! Generate-then-validate round trip behind the kiosk's QR endpoint.
//!
//! A payload is only handed out after the validator accepted it.

use crate::generator::{generate_emv_qr, GenerationError, GeneratorConfig};
use crate::models::{AdditionalData, Amount, PaymentPayload, QrResponse};
use crate::reference::{QR_IMAGE_SERVICE, QR_IMAGE_SIZE};
use crate::util::percent_encode;
use crate::validation::validate_emv_qr;

use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageService {
    pub base_url: String,
    pub size: u32,
}

impl Default for ImageService {
    fn default() -> Self {
        Self {
            base_url: QR_IMAGE_SERVICE.to_string(),
            size: QR_IMAGE_SIZE,
        }
    }
}

impl ImageService {
    pub fn url_for(&self, qr: &str) -> String {
        format!(
            "{}?size={}x{}&data={}",
            self.base_url,
            self.size,
            self.size,
            percent_encode(qr)
        )
    }
}

#[derive(Debug, Error)]
pub enum ResponseError {
    #[error(transparent)]
    Generation(#[from] GenerationError),

    /// The generated payload failed its own validation (HTTP 400).
    #[error("generated QR failed validation: {}", .errors.join("; "))]
    Invalid { qr: String, errors: Vec<String> },
}

pub fn build_response(
    payload: &PaymentPayload,
    config: &GeneratorConfig,
    images: &ImageService,
) -> Result<QrResponse, ResponseError> {
    let qr = generate_emv_qr(payload, config)?;
    let validation = validate_emv_qr(&qr);
    if !validation.valid {
        log::warn!("refusing to serve QR: {}", validation.errors.join("; "));
        return Err(ResponseError::Invalid {
            qr,
            errors: validation.errors,
        });
    }

    log::info!(
        "QR generated: {} chars, amount {}",
        qr.chars().count(),
        describe_amount(payload.transaction_amount.as_ref())
    );
    Ok(QrResponse {
        success: true,
        qr_image_url: images.url_for(&qr),
        qr,
        validation,
    })
}

/// Fixed payload used to smoke-test the generator.
pub fn sample_payload() -> PaymentPayload {
    let mut account = BTreeMap::new();
    account.insert("02".to_string(), "COOPE_001".to_string());
    account.insert("03".to_string(), "TEST_REF_001".to_string());
    PaymentPayload {
        merchant_account_info: Some(account),
        merchant_category_code: Some("4814".to_string()),
        transaction_currency: Some("032".to_string()),
        transaction_amount: Some(Amount::Number(1500.0)),
        country_code: Some("AR".to_string()),
        merchant_name: Some("COOPERATIVA POPULAR".to_string()),
        merchant_city: Some("RIVADAVIA".to_string()),
        additional_data: Some(AdditionalData {
            bill_number: Some("FAC-000123".to_string()),
            customer_id: Some("12345".to_string()),
            due_date: None,
        }),
        merchant_tax_id: None,
    }
}

fn describe_amount(amount: Option<&Amount>) -> String {
    match amount {
        Some(Amount::Number(value)) => value.to_string(),
        Some(Amount::Text(raw)) => raw.clone(),
        None => "open".to_string(),
    }
}
