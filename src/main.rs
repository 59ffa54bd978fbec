mod batch;
mod crc16;
mod generator;
mod logging;
mod models;
mod parser;
mod reference;
mod response;
mod selfcheck;
mod tlv;
mod util;
mod validation;

use clap::{Parser, Subcommand};
use generator::GeneratorConfig;
use models::{ParseOutcome, PaymentPayload};
use parser::{parse_emv_qr_with, ParseOptions};
use rand::Rng;
use response::{build_response, sample_payload, ImageService, ResponseError};
use std::collections::BTreeMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Instant;
use validation::validate_emv_qr;

#[derive(Parser)]
#[command(name = "tas-qr")]
#[command(about = "EMV QR generator and validator for the TAS payment kiosk", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    Generate(GenerateArgs),
    Sample(SampleArgs),
    Validate(ValidateArgs),
    Parse(ParseArgs),
    Batch(BatchArgs),
    Selfcheck(SelfcheckArgs),
}

#[derive(Parser)]
struct ImageArgs {
    #[arg(long, default_value = reference::QR_IMAGE_SERVICE)]
    image_service: String,
    #[arg(long, default_value_t = reference::QR_IMAGE_SIZE)]
    image_size: u32,
}

#[derive(Parser)]
struct GenerateArgs {
    /// JSON payment payload; reads stdin when omitted.
    #[arg(long)]
    input: Option<PathBuf>,
    #[arg(long)]
    config: Option<PathBuf>,
    #[command(flatten)]
    image: ImageArgs,
}

#[derive(Parser)]
struct SampleArgs {
    #[arg(long)]
    config: Option<PathBuf>,
    #[command(flatten)]
    image: ImageArgs,
}

#[derive(Parser)]
struct ValidateArgs {
    /// QR payload; reads stdin when omitted.
    qr: Option<String>,
}

#[derive(Parser)]
struct ParseArgs {
    /// QR payload; reads stdin when omitted.
    qr: Option<String>,
    #[arg(long, default_value_t = false)]
    strict: bool,
    /// List fields with labels and decode the 26/62 templates.
    #[arg(long, default_value_t = false)]
    expand: bool,
}

#[derive(Parser)]
struct BatchArgs {
    #[arg(long, default_value = "data/payments.csv")]
    input: PathBuf,
    #[arg(long, default_value = "data/payments_qr.csv")]
    output: PathBuf,
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Parser)]
struct SelfcheckArgs {
    #[arg(long, default_value_t = 500)]
    cases: usize,
    #[arg(long)]
    seed: Option<u64>,
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    logging::init_logging("tas-qr")?;
    let cli = Cli::parse();
    match cli.command {
        Command::Generate(args) => run_generate(args),
        Command::Sample(args) => run_sample(args),
        Command::Validate(args) => run_validate(args),
        Command::Parse(args) => run_parse(args),
        Command::Batch(args) => run_batch(args),
        Command::Selfcheck(args) => run_selfcheck(args),
    }
}

fn run_generate(args: GenerateArgs) -> Result<(), String> {
    let raw = match &args.input {
        Some(path) => std::fs::read_to_string(path)
            .map_err(|err| format!("cannot read {}: {}", path.display(), err))?,
        None => read_stdin()?,
    };
    let payload: PaymentPayload =
        serde_json::from_str(&raw).map_err(|err| format!("invalid payload: {err}"))?;
    let config = load_config(args.config.as_deref())?;
    respond(&payload, &config, &image_service(&args.image))
}

fn run_sample(args: SampleArgs) -> Result<(), String> {
    let config = load_config(args.config.as_deref())?;
    log::info!("Generating sample QR");
    respond(&sample_payload(), &config, &image_service(&args.image))
}

fn respond(
    payload: &PaymentPayload,
    config: &GeneratorConfig,
    images: &ImageService,
) -> Result<(), String> {
    let start = Instant::now();
    match build_response(payload, config, images) {
        Ok(response) => {
            print_json(&response)?;
            log::debug!("QR response built in {} us", start.elapsed().as_micros());
            Ok(())
        }
        Err(ResponseError::Invalid { qr, errors }) => {
            print_json(&serde_json::json!({
                "success": false,
                "error": "QR generado no válido",
                "qr": qr,
                "errors": errors,
            }))?;
            Err("generated QR failed validation".to_string())
        }
        Err(err) => Err(err.to_string()),
    }
}

fn run_validate(args: ValidateArgs) -> Result<(), String> {
    let qr = qr_argument(args.qr)?;
    let report = validate_emv_qr(&qr);
    print_json(&report)?;
    if report.valid {
        emit_info_line(&format!("QR valid ({} chars)", qr.chars().count()));
        Ok(())
    } else {
        Err(format!("QR invalid: {}", report.errors.join("; ")))
    }
}

fn run_parse(args: ParseArgs) -> Result<(), String> {
    let qr = qr_argument(args.qr)?;
    let options = if args.strict {
        ParseOptions::strict()
    } else {
        ParseOptions::default()
    };
    let outcome = parse_emv_qr_with(&qr, options);
    if args.expand {
        print_expanded(&outcome);
    } else {
        print_json(&outcome)?;
    }
    match outcome.error {
        Some(err) if !outcome.success => Err(format!("parse failed: {err}")),
        _ => Ok(()),
    }
}

fn print_expanded(outcome: &ParseOutcome) {
    let Some(data) = &outcome.data else {
        return;
    };
    for (tag, value) in data {
        println!("{} {:<32} {}", tag, reference::tag_label(tag), value);
        if !reference::is_template(tag) {
            continue;
        }
        match tlv::decode_template(value) {
            Ok(fields) => {
                for (sub_tag, sub_value) in &fields {
                    println!(
                        "   {} {:<29} {}",
                        sub_tag,
                        reference::subtag_label(tag, sub_tag),
                        sub_value
                    );
                }
            }
            Err(err) => println!("   (template not decodable: {err})"),
        }
    }
}

fn run_batch(args: BatchArgs) -> Result<(), String> {
    let config = load_config(args.config.as_deref())?;
    if let Some(parent) = args.output.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|err| err.to_string())?;
        }
    }

    let start = Instant::now();
    let summary = batch::generate_csv(&args.input, &args.output, &config)?;
    emit_info_line(&format!(
        "Batch: input={} output={} rows={}",
        args.input.display(),
        args.output.display(),
        summary.total_rows
    ));
    emit_info_line(&format!(
        "Batch results: generated={} generation_failed={} validation_failed={}",
        summary.generated, summary.generation_failed, summary.validation_failed
    ));
    emit_info_line(&format!("Batch time: {} ms", start.elapsed().as_millis()));
    Ok(())
}

fn run_selfcheck(args: SelfcheckArgs) -> Result<(), String> {
    let config = load_config(args.config.as_deref())?;
    let seed = args.seed.unwrap_or_else(random_seed);
    let start = Instant::now();
    let report = selfcheck::run_selfcheck(args.cases, seed, &config)?;

    emit_info_line(&format!(
        "Selfcheck (seed {}): cases={} with_amount={} with_additional_data={} with_tax_id={}",
        seed, report.cases, report.with_amount, report.with_additional_data, report.with_tax_id
    ));
    emit_info_line(&format!(
        "Selfcheck issues: errors={} warnings={}",
        report.error_count(),
        report.warning_count()
    ));
    emit_issue_summary("error", &report.issues, selfcheck::IssueLevel::Error);
    emit_issue_summary("warning", &report.issues, selfcheck::IssueLevel::Warning);
    emit_info_line(&format!("Selfcheck time: {} ms", start.elapsed().as_millis()));

    if report.error_count() > 0 {
        return Err(format!(
            "selfcheck failed with {} error(s)",
            report.error_count()
        ));
    }
    Ok(())
}

/// One line per distinct issue message, most frequent first, naming the
/// first case that hit it so `--seed` reruns can be narrowed down.
fn emit_issue_summary(
    label: &str,
    issues: &[selfcheck::SelfCheckIssue],
    level: selfcheck::IssueLevel,
) {
    let mut groups: BTreeMap<&str, (usize, usize)> = BTreeMap::new();
    for issue in issues.iter().filter(|issue| issue.level == level) {
        let entry = groups.entry(issue.message.as_str()).or_insert((0, issue.case));
        entry.0 += 1;
    }

    let mut ranked: Vec<(&str, usize, usize)> = groups
        .into_iter()
        .map(|(message, (count, first_case))| (message, count, first_case))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1));

    const SHOWN: usize = 5;
    for (message, count, first_case) in ranked.iter().take(SHOWN) {
        emit_info_line(&format!(
            "Selfcheck {label}: {message} (x{count}, first at case {first_case})"
        ));
    }
    if ranked.len() > SHOWN {
        emit_info_line(&format!(
            "Selfcheck {label}: {} more kinds not shown",
            ranked.len() - SHOWN
        ));
    }
}

fn load_config(path: Option<&Path>) -> Result<GeneratorConfig, String> {
    match path {
        Some(path) => {
            let config = GeneratorConfig::from_json_file(path)?;
            log::info!("Loaded generator config from {}", path.display());
            Ok(config)
        }
        None => Ok(GeneratorConfig::default()),
    }
}

fn image_service(args: &ImageArgs) -> ImageService {
    ImageService {
        base_url: args.image_service.clone(),
        size: args.image_size,
    }
}

fn qr_argument(value: Option<String>) -> Result<String, String> {
    match value {
        Some(qr) => Ok(qr),
        None => read_stdin(),
    }
}

fn read_stdin() -> Result<String, String> {
    let mut raw = String::new();
    std::io::stdin()
        .read_to_string(&mut raw)
        .map_err(|err| err.to_string())?;
    Ok(raw.trim_end_matches(['\r', '\n']).to_string())
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), String> {
    let rendered = serde_json::to_string_pretty(value).map_err(|err| err.to_string())?;
    println!("{rendered}");
    Ok(())
}

fn random_seed() -> u64 {
    let mut rng = rand::rngs::OsRng;
    rng.gen()
}

fn emit_info_line(message: &str) {
    if log::log_enabled!(log::Level::Info) {
        log::info!("{}", message);
    } else {
        println!("{message}");
    }
}
