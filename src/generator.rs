use crate::crc16::{checksum, format_crc};
use crate::models::{Amount, PaymentPayload};
use crate::reference::{
    CRC_HEADER, DEFAULT_ACCOUNT_GUI, DEFAULT_CATEGORY_CODE, DEFAULT_COUNTRY, DEFAULT_CURRENCY,
    DEFAULT_MERCHANT_CITY, DEFAULT_MERCHANT_ID, DEFAULT_MERCHANT_NAME, DEFAULT_REFERENCE,
    INITIATION_STATIC, MAX_CITY_LEN, MAX_NAME_LEN, PAYLOAD_FORMAT_VALUE, SUBTAG_ACCOUNT_GUI,
    SUBTAG_ACCOUNT_MERCHANT_ID, SUBTAG_ACCOUNT_REFERENCE, SUBTAG_BILL_NUMBER, SUBTAG_CUSTOMER_ID,
    SUBTAG_DUE_DATE, TAG_ADDITIONAL_DATA, TAG_AMOUNT, TAG_CATEGORY_CODE, TAG_COUNTRY, TAG_CRC,
    TAG_CURRENCY, TAG_INITIATION_METHOD, TAG_MERCHANT_ACCOUNT, TAG_MERCHANT_CITY,
    TAG_MERCHANT_NAME, TAG_MERCHANT_TAX_ID, TAG_PAYLOAD_FORMAT,
};
use crate::tlv::{encode_template, encode_tlv, TlvError};
use crate::util::{format_amount, truncate_chars};

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Values used when a payload leaves a field out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub account_gui: String,
    pub merchant_id: String,
    pub reference: String,
    pub category_code: String,
    pub currency: String,
    pub country: String,
    pub merchant_name: String,
    pub merchant_city: String,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            account_gui: DEFAULT_ACCOUNT_GUI.to_string(),
            merchant_id: DEFAULT_MERCHANT_ID.to_string(),
            reference: DEFAULT_REFERENCE.to_string(),
            category_code: DEFAULT_CATEGORY_CODE.to_string(),
            currency: DEFAULT_CURRENCY.to_string(),
            country: DEFAULT_COUNTRY.to_string(),
            merchant_name: DEFAULT_MERCHANT_NAME.to_string(),
            merchant_city: DEFAULT_MERCHANT_CITY.to_string(),
        }
    }
}

impl GeneratorConfig {
    /// Loads overrides from a JSON file; keys left out keep their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self, String> {
        let raw = std::fs::read_to_string(path)
            .map_err(|err| format!("cannot read config {}: {}", path.display(), err))?;
        serde_json::from_str(&raw)
            .map_err(|err| format!("invalid config {}: {}", path.display(), err))
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GenerationError {
    #[error("failed to generate QR: amount '{0}' is not a finite number")]
    InvalidAmount(String),

    #[error("failed to generate QR: {0}")]
    Field(#[from] TlvError),
}

/// Builds the EMV QR string for `payload`. Fields are emitted in a fixed
/// order and the CRC trailer always comes last.
pub fn generate_emv_qr(
    payload: &PaymentPayload,
    config: &GeneratorConfig,
) -> Result<String, GenerationError> {
    let mut qr = String::with_capacity(160);

    qr.push_str(&encode_tlv(TAG_PAYLOAD_FORMAT, Some(PAYLOAD_FORMAT_VALUE))?);
    qr.push_str(&encode_tlv(TAG_INITIATION_METHOD, Some(INITIATION_STATIC))?);

    let merchant_id = payload.merchant_id().unwrap_or(&config.merchant_id);
    let reference = payload.reference().unwrap_or(&config.reference);
    qr.push_str(&encode_template(
        TAG_MERCHANT_ACCOUNT,
        &[
            (SUBTAG_ACCOUNT_GUI, Some(config.account_gui.as_str())),
            (SUBTAG_ACCOUNT_MERCHANT_ID, Some(merchant_id)),
            (SUBTAG_ACCOUNT_REFERENCE, Some(reference)),
        ],
    )?);

    let category = payload
        .merchant_category_code
        .as_deref()
        .unwrap_or(&config.category_code);
    qr.push_str(&encode_tlv(TAG_CATEGORY_CODE, Some(category))?);

    let currency = payload
        .transaction_currency
        .as_deref()
        .unwrap_or(&config.currency);
    qr.push_str(&encode_tlv(TAG_CURRENCY, Some(currency))?);

    let amount = match &payload.transaction_amount {
        Some(amount) => Some(amount_value(amount)?),
        None => None,
    };
    qr.push_str(&encode_tlv(TAG_AMOUNT, amount.map(format_amount))?);

    let country = payload.country_code.as_deref().unwrap_or(&config.country);
    qr.push_str(&encode_tlv(TAG_COUNTRY, Some(country))?);

    let name = payload
        .merchant_name
        .as_deref()
        .unwrap_or(&config.merchant_name);
    qr.push_str(&encode_tlv(
        TAG_MERCHANT_NAME,
        Some(truncate_chars(name, MAX_NAME_LEN)),
    )?);

    let city = payload
        .merchant_city
        .as_deref()
        .unwrap_or(&config.merchant_city);
    qr.push_str(&encode_tlv(
        TAG_MERCHANT_CITY,
        Some(truncate_chars(city, MAX_CITY_LEN)),
    )?);

    if let Some(extra) = &payload.additional_data {
        qr.push_str(&encode_template(
            TAG_ADDITIONAL_DATA,
            &[
                (SUBTAG_BILL_NUMBER, extra.bill_number.as_deref()),
                (SUBTAG_CUSTOMER_ID, extra.customer_id.as_deref()),
                (SUBTAG_DUE_DATE, extra.due_date.as_deref()),
            ],
        )?);
    }

    qr.push_str(&encode_tlv(
        TAG_MERCHANT_TAX_ID,
        payload.merchant_tax_id.as_deref(),
    )?);

    let crc = checksum_for(&qr)?;
    qr.push_str(&encode_tlv(TAG_CRC, Some(crc))?);

    log::debug!("generated QR payload ({} chars)", qr.chars().count());
    Ok(qr)
}

/// CRC value for a payload body that does not yet carry the `6304` header.
fn checksum_for(body: &str) -> Result<String, GenerationError> {
    let crc_input = format!("{body}{CRC_HEADER}");
    let mut bytes = Vec::with_capacity(crc_input.len());
    for ch in crc_input.chars() {
        let byte = u8::try_from(u32::from(ch)).map_err(|_| TlvError::UnsupportedCharacter {
            tag: TAG_CRC.to_string(),
            ch,
        })?;
        bytes.push(byte);
    }
    Ok(format_crc(checksum(&bytes)))
}

fn amount_value(amount: &Amount) -> Result<f64, GenerationError> {
    let value = match amount {
        Amount::Number(value) => *value,
        Amount::Text(raw) => raw
            .trim()
            .parse::<f64>()
            .map_err(|_| GenerationError::InvalidAmount(raw.clone()))?,
    };
    if !value.is_finite() {
        return Err(GenerationError::InvalidAmount(value.to_string()));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crc16::crc16;
    use crate::models::AdditionalData;
    use crate::parser::parse_emv_qr;
    use crate::validation::validate_emv_qr;
    use std::collections::BTreeMap;

    fn scenario_payload() -> PaymentPayload {
        let mut account = BTreeMap::new();
        account.insert("02".to_string(), "COOPE_001".to_string());
        account.insert("03".to_string(), "REF".to_string());
        PaymentPayload {
            merchant_account_info: Some(account),
            merchant_category_code: Some("4814".to_string()),
            transaction_currency: Some("032".to_string()),
            transaction_amount: Some(Amount::from("1500".to_string())),
            country_code: Some("AR".to_string()),
            merchant_name: Some("COOPERATIVA POPULAR".to_string()),
            merchant_city: Some("RIVADAVIA".to_string()),
            additional_data: None,
            merchant_tax_id: None,
        }
    }

    #[test]
    fn scenario_payload_round_trips() {
        let qr = generate_emv_qr(&scenario_payload(), &GeneratorConfig::default()).unwrap();
        assert!(qr.starts_with("00020101021226"));
        assert!(qr.contains("54071500.00"));
        let crc_field = &qr[qr.len() - 8..];
        assert!(crc_field.starts_with("6304"));
        assert!(crc_field[4..]
            .chars()
            .all(|ch| ch.is_ascii_digit() || ('A'..='F').contains(&ch)));

        let parsed = parse_emv_qr(&qr);
        assert_eq!(parsed.field("59"), Some("COOPERATIVA POPULAR"));
        assert_eq!(parsed.field("60"), Some("RIVADAVIA"));
        assert!(validate_emv_qr(&qr).valid);
    }

    #[test]
    fn emits_fields_in_fixed_order() {
        let qr = generate_emv_qr(&scenario_payload(), &GeneratorConfig::default()).unwrap();
        let body = &qr[..qr.len() - 8];
        let expected = concat!(
            "000201",
            "010212",
            "2649",
            "0025ar.com.cooperativapopular",
            "0109COOPE_001",
            "0203REF",
            "52044814",
            "5303032",
            "54071500.00",
            "5802AR",
            "5919COOPERATIVA POPULAR",
            "6009RIVADAVIA",
        );
        assert_eq!(body, expected);
        let crc = crc16(&format!("{body}6304")).unwrap();
        assert_eq!(&qr[qr.len() - 4..], format_crc(crc));
    }

    #[test]
    fn empty_payload_uses_defaults() {
        let qr = generate_emv_qr(&PaymentPayload::default(), &GeneratorConfig::default()).unwrap();
        let parsed = parse_emv_qr(&qr);
        assert_eq!(parsed.field("52"), Some("4814"));
        assert_eq!(parsed.field("53"), Some("032"));
        assert_eq!(parsed.field("58"), Some("AR"));
        assert_eq!(parsed.field("59"), Some(DEFAULT_MERCHANT_NAME));
        assert_eq!(parsed.field("54"), None);
        assert_eq!(parsed.field("62"), None);
        assert_eq!(parsed.field("50"), None);
        assert!(validate_emv_qr(&qr).valid);
    }

    #[test]
    fn config_overrides_defaults() {
        let config = GeneratorConfig {
            merchant_id: "OTRA_COOP".to_string(),
            country: "UY".to_string(),
            ..GeneratorConfig::default()
        };
        let qr = generate_emv_qr(&PaymentPayload::default(), &config).unwrap();
        let parsed = parse_emv_qr(&qr);
        assert!(parsed.field("26").unwrap().contains("0109OTRA_COOP"));
        assert_eq!(parsed.field("58"), Some("UY"));
    }

    #[test]
    fn config_parses_partial_json() {
        let config: GeneratorConfig =
            serde_json::from_str(r#"{ "merchant_name": "COOP ELECTRICA" }"#).unwrap();
        assert_eq!(config.merchant_name, "COOP ELECTRICA");
        assert_eq!(config.category_code, DEFAULT_CATEGORY_CODE);
    }

    #[test]
    fn truncates_name_and_city() {
        let payload = PaymentPayload {
            merchant_name: Some("COOPERATIVA ELECTRICA DE SERVICIOS PUBLICOS".to_string()),
            merchant_city: Some("CARMEN DE PATAGONES".to_string()),
            ..PaymentPayload::default()
        };
        let qr = generate_emv_qr(&payload, &GeneratorConfig::default()).unwrap();
        let parsed = parse_emv_qr(&qr);
        assert_eq!(parsed.field("59"), Some("COOPERATIVA ELECTRICA DE "));
        assert_eq!(parsed.field("59").map(str::len), Some(25));
        assert_eq!(parsed.field("60"), Some("CARMEN DE PATAG"));
    }

    #[test]
    fn additional_data_only_when_present() {
        let payload = PaymentPayload {
            additional_data: Some(AdditionalData {
                bill_number: Some("F-00012345".to_string()),
                customer_id: Some("4021".to_string()),
                due_date: None,
            }),
            ..PaymentPayload::default()
        };
        let qr = generate_emv_qr(&payload, &GeneratorConfig::default()).unwrap();
        assert!(qr.contains("62220110F-00012345") && qr.contains("02044021"));

        let payload = PaymentPayload {
            additional_data: Some(AdditionalData::default()),
            ..PaymentPayload::default()
        };
        let qr = generate_emv_qr(&payload, &GeneratorConfig::default()).unwrap();
        assert_eq!(parse_emv_qr(&qr).field("62"), None);
    }

    #[test]
    fn tax_id_follows_additional_data() {
        let payload = PaymentPayload {
            additional_data: Some(AdditionalData {
                due_date: Some("20240510".to_string()),
                ..AdditionalData::default()
            }),
            merchant_tax_id: Some("30123456789".to_string()),
            ..PaymentPayload::default()
        };
        let qr = generate_emv_qr(&payload, &GeneratorConfig::default()).unwrap();
        let extra = qr.find("6212").unwrap();
        let tax = qr.find("501130123456789").unwrap();
        let crc = qr.rfind("6304").unwrap();
        assert!(extra < tax && tax < crc);
    }

    #[test]
    fn numeric_amounts_use_two_decimals() {
        let payload = PaymentPayload {
            transaction_amount: Some(Amount::from(99.9)),
            ..PaymentPayload::default()
        };
        let qr = generate_emv_qr(&payload, &GeneratorConfig::default()).unwrap();
        assert_eq!(parse_emv_qr(&qr).field("54"), Some("99.90"));
    }

    #[test]
    fn rejects_non_numeric_amount() {
        let payload = PaymentPayload {
            transaction_amount: Some(Amount::from("mil pesos".to_string())),
            ..PaymentPayload::default()
        };
        let err = generate_emv_qr(&payload, &GeneratorConfig::default()).unwrap_err();
        assert_eq!(err, GenerationError::InvalidAmount("mil pesos".to_string()));

        let payload = PaymentPayload {
            transaction_amount: Some(Amount::from("NaN".to_string())),
            ..PaymentPayload::default()
        };
        assert!(matches!(
            generate_emv_qr(&payload, &GeneratorConfig::default()),
            Err(GenerationError::InvalidAmount(_))
        ));
    }

    #[test]
    fn checksum_rejects_wide_characters_by_name() {
        let err = checksum_for("000201€").unwrap_err();
        assert!(matches!(
            err,
            GenerationError::Field(TlvError::UnsupportedCharacter { ch: '€', .. })
        ));
        let expected = format_crc(crc16("0002016304").unwrap());
        assert_eq!(checksum_for("000201").unwrap(), expected);
    }

    #[test]
    fn oversized_fields_fail_loudly() {
        let payload = PaymentPayload {
            merchant_tax_id: Some("9".repeat(120)),
            ..PaymentPayload::default()
        };
        let err = generate_emv_qr(&payload, &GeneratorConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            GenerationError::Field(TlvError::FieldTooLong { length: 120, .. })
        ));
    }

    #[test]
    fn generation_is_deterministic() {
        let config = GeneratorConfig::default();
        let first = generate_emv_qr(&scenario_payload(), &config).unwrap();
        let second = generate_emv_qr(&scenario_payload(), &config).unwrap();
        assert_eq!(first, second);
    }
}
