use crate::generator::{generate_emv_qr, GeneratorConfig};
use crate::models::{AdditionalData, Amount, PaymentPayload};
use crate::parser::parse_emv_qr;
use crate::reference::{MAX_CITY_LEN, MAX_NAME_LEN};
use crate::util::{random_alphanum_upper, random_digits, truncate_chars};
use crate::validation::validate_emv_qr;

use chrono::{Duration, NaiveDate};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueLevel {
    Error,
    Warning,
}

#[derive(Debug, Clone)]
pub struct SelfCheckIssue {
    pub level: IssueLevel,
    pub case: usize,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct SelfCheckReport {
    pub cases: usize,
    pub with_amount: usize,
    pub with_additional_data: usize,
    pub with_tax_id: usize,
    pub issues: Vec<SelfCheckIssue>,
}

impl SelfCheckReport {
    pub fn error_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|issue| issue.level == IssueLevel::Error)
            .count()
    }

    pub fn warning_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|issue| issue.level == IssueLevel::Warning)
            .count()
    }
}

const NAME_WORDS: &[&str] = &[
    "COOPERATIVA", "ELECTRICA", "POPULAR", "DE", "SERVICIOS", "PUBLICOS", "AGUA", "LUZ",
    "OBRAS", "VIVIENDA", "CONSUMO", "LIMITADA", "RIVADAVIA", "SUR", "NORTE",
];

const CITIES: &[&str] = &[
    "RIVADAVIA",
    "MENDOZA",
    "SAN RAFAEL",
    "GODOY CRUZ",
    "SAN MARTIN",
    "CARMEN DE PATAGONES",
    "COMODORO RIVADAVIA",
    "VILLA CARLOS PAZ",
    "JUNIN",
];

/// Encoded tags `00` and `01` of a static QR.
const STATIC_PREFIX: &str = "000201010212";

const CATEGORY_CODES: &[&str] = &["4814", "4900", "5411", "6012"];

pub fn run_selfcheck(
    cases: usize,
    seed: u64,
    config: &GeneratorConfig,
) -> Result<SelfCheckReport, String> {
    if cases == 0 {
        return Err("cases must be greater than zero".to_string());
    }
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut report = SelfCheckReport {
        cases,
        with_amount: 0,
        with_additional_data: 0,
        with_tax_id: 0,
        issues: Vec::new(),
    };

    for case in 0..cases {
        let payload = random_payload(&mut rng);
        if payload.transaction_amount.is_some() {
            report.with_amount += 1;
        }
        if payload.additional_data.is_some() {
            report.with_additional_data += 1;
        }
        if payload.merchant_tax_id.is_some() {
            report.with_tax_id += 1;
        }
        check_case(case, &payload, config, &mut rng, &mut report.issues);
    }

    log::debug!(
        "selfcheck finished: {} cases, {} errors",
        report.cases,
        report.error_count()
    );
    Ok(report)
}

fn check_case<R: Rng + ?Sized>(
    case: usize,
    payload: &PaymentPayload,
    config: &GeneratorConfig,
    rng: &mut R,
    issues: &mut Vec<SelfCheckIssue>,
) {
    let mut record = |level: IssueLevel, message: String| {
        issues.push(SelfCheckIssue {
            level,
            case,
            message,
        })
    };

    let qr = match generate_emv_qr(payload, config) {
        Ok(qr) => qr,
        Err(err) => {
            record(IssueLevel::Error, err.to_string());
            return;
        }
    };

    match generate_emv_qr(payload, config) {
        Ok(again) if again == qr => {}
        _ => record(IssueLevel::Error, "generation is not deterministic".to_string()),
    }
    if !qr.starts_with(STATIC_PREFIX) {
        record(
            IssueLevel::Error,
            format!("payload does not start with {STATIC_PREFIX}"),
        );
    }

    let report = validate_emv_qr(&qr);
    if !report.valid {
        record(IssueLevel::Error, format!("generated QR rejected: {}", report.errors.join("; ")));
    }
    if let Some(warnings) = report.warnings.filter(|warnings| !warnings.is_empty()) {
        record(
            IssueLevel::Warning,
            format!("validator warnings: {}", warnings.join("; ")),
        );
    }

    let parsed = parse_emv_qr(&qr);
    if parsed.field("00") != Some("01") || parsed.field("01") != Some("12") {
        record(IssueLevel::Error, "parser did not recover tags 00 and 01".to_string());
    }

    let name = payload
        .merchant_name
        .as_deref()
        .unwrap_or(&config.merchant_name);
    if parsed.field("59") != Some(truncate_chars(name, MAX_NAME_LEN)) {
        record(IssueLevel::Error, "merchant name was not truncated to 25 characters".to_string());
    }
    let city = payload
        .merchant_city
        .as_deref()
        .unwrap_or(&config.merchant_city);
    if parsed.field("60") != Some(truncate_chars(city, MAX_CITY_LEN)) {
        record(IssueLevel::Error, "merchant city was not truncated to 15 characters".to_string());
    }

    if payload.transaction_amount.is_none() && parsed.field("54").is_some() {
        record(IssueLevel::Error, "tag 54 emitted without an amount".to_string());
    }
    let has_extra = payload
        .additional_data
        .as_ref()
        .is_some_and(|extra| !extra.is_empty());
    if has_extra != parsed.field("62").is_some() {
        record(IssueLevel::Error, "tag 62 presence does not match additional data".to_string());
    }
    if payload.merchant_tax_id.is_none() && parsed.field("50").is_some() {
        record(IssueLevel::Error, "tag 50 emitted without a tax id".to_string());
    }

    if !corruption_detected(&qr, rng) {
        record(IssueLevel::Error, "flipped CRC character was not detected".to_string());
    }
}

/// Flips one of the last four characters to another hex digit and checks
/// that validation rejects the result.
fn corruption_detected<R: Rng + ?Sized>(qr: &str, rng: &mut R) -> bool {
    const HEX: &[u8] = b"0123456789ABCDEF";
    let mut bytes = qr.as_bytes().to_vec();
    let idx = bytes.len() - rng.gen_range(1..=4);
    let original = bytes[idx];
    let replacement = loop {
        let candidate = HEX[rng.gen_range(0..HEX.len())];
        if candidate != original {
            break candidate;
        }
    };
    bytes[idx] = replacement;
    match String::from_utf8(bytes) {
        Ok(corrupted) => !validate_emv_qr(&corrupted).valid,
        Err(_) => false,
    }
}

fn random_payload<R: Rng + ?Sized>(rng: &mut R) -> PaymentPayload {
    let mut account = BTreeMap::new();
    if rng.gen_bool(0.8) {
        account.insert(
            "02".to_string(),
            format!("COOPE_{}", random_digits(rng, 3)),
        );
    }
    if rng.gen_bool(0.6) {
        account.insert("03".to_string(), random_alphanum_upper(rng, 8));
    }

    let transaction_amount = if rng.gen_bool(0.7) {
        let cents: u32 = rng.gen_range(100..5_000_000);
        let value = f64::from(cents) / 100.0;
        Some(if rng.gen_bool(0.5) {
            Amount::from(value)
        } else {
            Amount::from(format!("{:.2}", value))
        })
    } else {
        None
    };

    let additional_data = if rng.gen_bool(0.5) {
        Some(AdditionalData {
            bill_number: rng
                .gen_bool(0.7)
                .then(|| format!("FAC-{}", random_digits(rng, 8))),
            customer_id: rng.gen_bool(0.7).then(|| random_digits(rng, 6)),
            due_date: rng.gen_bool(0.5).then(|| random_due_date(rng)),
        })
    } else {
        None
    };

    PaymentPayload {
        merchant_account_info: (!account.is_empty()).then_some(account),
        merchant_category_code: CATEGORY_CODES.choose(rng).map(|code| code.to_string()),
        transaction_currency: rng.gen_bool(0.5).then(|| "032".to_string()),
        transaction_amount,
        country_code: rng.gen_bool(0.5).then(|| "AR".to_string()),
        merchant_name: rng.gen_bool(0.9).then(|| random_name(rng)),
        merchant_city: CITIES.choose(rng).map(|city| city.to_string()),
        additional_data,
        merchant_tax_id: rng
            .gen_bool(0.3)
            .then(|| format!("30{}", random_digits(rng, 9))),
    }
}

fn random_name<R: Rng + ?Sized>(rng: &mut R) -> String {
    let words = rng.gen_range(1..=6);
    (0..words)
        .filter_map(|_| NAME_WORDS.choose(rng).copied())
        .collect::<Vec<_>>()
        .join(" ")
}

fn random_due_date<R: Rng + ?Sized>(rng: &mut R) -> String {
    let offset = rng.gen_range(0..730);
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .and_then(|base| base.checked_add_signed(Duration::days(offset)))
        .map(|date| date.format("%Y%m%d").to_string())
        .unwrap_or_else(|| "20240101".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_payloads_pass_every_check() {
        let report = run_selfcheck(250, 42, &GeneratorConfig::default()).unwrap();
        assert_eq!(report.cases, 250);
        assert_eq!(report.error_count(), 0, "{:?}", report.issues);
        assert_eq!(report.warning_count(), 0);
        assert!(report.with_amount > 0);
        assert!(report.with_additional_data > 0);
        assert!(report.with_tax_id > 0);
    }

    #[test]
    fn same_seed_same_payloads() {
        let mut first = ChaCha8Rng::seed_from_u64(9);
        let mut second = ChaCha8Rng::seed_from_u64(9);
        for _ in 0..20 {
            assert_eq!(random_payload(&mut first), random_payload(&mut second));
        }
    }

    #[test]
    fn zero_cases_is_rejected() {
        assert!(run_selfcheck(0, 1, &GeneratorConfig::default()).is_err());
    }

    #[test]
    fn due_dates_are_compact() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let date = random_due_date(&mut rng);
        assert_eq!(date.len(), 8);
        assert!(date.starts_with("202"));
    }

    #[test]
    fn default_payload_has_static_prefix_and_no_issues() {
        let payload = PaymentPayload::default();
        let config = GeneratorConfig::default();
        let qr = generate_emv_qr(&payload, &config).unwrap();
        assert!(qr.starts_with(STATIC_PREFIX));

        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let mut issues = Vec::new();
        check_case(0, &payload, &config, &mut rng, &mut issues);
        assert!(issues.is_empty(), "{:?}", issues);
    }

    #[test]
    fn bad_generation_is_reported() {
        let payload = PaymentPayload {
            transaction_amount: Some(Amount::from("x".to_string())),
            ..PaymentPayload::default()
        };
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut issues = Vec::new();
        check_case(7, &payload, &GeneratorConfig::default(), &mut rng, &mut issues);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].case, 7);
        assert_eq!(issues[0].level, IssueLevel::Error);
    }
}
