//! redactpdf CLI - transcript PII redaction tool

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use redactpdf::{
    AccessGate, FileAttemptLimiter, OcrOptions, OverflowPolicy, RedactOptions, RedactionReport, Redactor,
    TemplateProfile, Warning,
};

#[derive(Parser)]
#[command(name = "redactpdf")]
#[command(author = "iyulab")]
#[command(version)]
#[command(about = "Redact personal information from school transcript PDFs", long_about = None)]
struct Cli {
    /// Input PDF file
    #[arg(value_name = "FILE")]
    input: Option<PathBuf>,

    /// Access code (required when REDACTPDF_ACCESS_CODE is set)
    #[arg(long, global = true, env = "REDACTPDF_CODE", hide_env_values = true)]
    code: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Redact one or more PDFs
    Redact {
        /// Input PDF files
        #[arg(value_name = "FILE", required = true)]
        inputs: Vec<PathBuf>,

        #[command(flatten)]
        args: RedactArgs,
    },

    /// Show what would be redacted on one page, without writing anything
    Inspect {
        /// Input PDF file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Page number (1-based)
        #[arg(long, default_value = "1")]
        page: usize,

        /// Template profile (JSON)
        #[arg(long, value_name = "FILE", env = "REDACTPDF_PROFILE")]
        profile: Option<PathBuf>,

        /// Print the page layout as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the default template profile as JSON
    Profile {
        /// Output file (stdout if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Show version information
    Version,
}

#[derive(clap::Args, Clone, Default)]
struct RedactArgs {
    /// Output directory (next to the input if not specified)
    #[arg(short, long, value_name = "DIR")]
    output: Option<PathBuf>,

    /// Output file name prefix
    #[arg(long, default_value = "masked_")]
    prefix: String,

    /// Template profile (JSON)
    #[arg(long, value_name = "FILE", env = "REDACTPDF_PROFILE")]
    profile: Option<PathBuf>,

    /// Write a JSON report covering every input to this file
    #[arg(long, value_name = "FILE")]
    report: Option<PathBuf>,

    /// Disable the OCR fallback for scanned pages
    #[arg(long)]
    no_ocr: bool,

    /// OCR rasterization resolution
    #[arg(long, default_value = "300")]
    dpi: u32,

    /// OCR language(s), tesseract syntax
    #[arg(long, default_value = "kor")]
    lang: String,

    /// Pages processed per document
    #[arg(long, default_value_t = redactpdf::MAX_PROCESSED_PAGES)]
    max_pages: usize,

    /// Remove pages beyond --max-pages instead of copying them
    #[arg(long)]
    drop_overflow: bool,

    /// Keep going when a page's content cannot be read
    #[arg(long)]
    lenient: bool,

    /// Process pages one at a time
    #[arg(long)]
    sequential: bool,
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    let access = if needs_access(&cli) {
        check_access(cli.code.as_deref())
    } else {
        Ok(())
    };

    let result = access.and_then(|()| match cli.command {
        Some(Commands::Redact { inputs, args }) => cmd_redact(&inputs, &args),
        Some(Commands::Inspect {
            input,
            page,
            profile,
            json,
        }) => cmd_inspect(&input, page, profile.as_deref(), json),
        Some(Commands::Profile { output }) => cmd_profile(output.as_deref()),
        Some(Commands::Version) => {
            cmd_version();
            Ok(())
        }
        None => {
            // Default behavior: redact if input is provided
            if let Some(input) = cli.input {
                cmd_redact(&[input], &RedactArgs::defaults())
            } else {
                println!("{}", "Usage: redactpdf <FILE>".yellow());
                println!("       redactpdf --help for more information");
                Ok(())
            }
        }
    });

    if let Err(e) = result {
        eprintln!("{}: {}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

impl RedactArgs {
    /// Values clap would fill in when no flag is given.
    fn defaults() -> Self {
        Self {
            prefix: "masked_".to_string(),
            dpi: 300,
            lang: "kor".to_string(),
            max_pages: redactpdf::MAX_PROCESSED_PAGES,
            ..Self::default()
        }
    }

    fn redactor(&self) -> Result<Redactor, Box<dyn std::error::Error>> {
        let profile = load_profile(self.profile.as_deref())?;

        let ocr = OcrOptions {
            enabled: !self.no_ocr,
            ..OcrOptions::default()
        }
        .with_dpi(self.dpi)
        .with_lang(self.lang.clone());

        let mut options = RedactOptions::new()
            .with_max_pages(self.max_pages)
            .with_parallel(!self.sequential)
            .with_ocr(ocr);
        if self.drop_overflow {
            options = options.with_overflow(OverflowPolicy::Drop);
        }
        if self.lenient {
            options = options.lenient();
        }

        Ok(Redactor::new().with_profile(profile).with_options(options))
    }
}

/// Commands that read transcript content sit behind the access gate.
fn needs_access(cli: &Cli) -> bool {
    match &cli.command {
        Some(Commands::Redact { .. } | Commands::Inspect { .. }) => true,
        Some(Commands::Profile { .. } | Commands::Version) => false,
        None => cli.input.is_some(),
    }
}

/// Enforce the access code when one is configured.
fn check_access(attempt: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    let Ok(expected) = std::env::var("REDACTPDF_ACCESS_CODE") else {
        return Ok(());
    };
    let state = std::env::var_os("REDACTPDF_STATE_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| std::env::temp_dir().join("redactpdf"))
        .join("attempts.json");

    let gate = AccessGate::new(expected, FileAttemptLimiter::new(state));
    let attempt = attempt.ok_or("access code required (--code or REDACTPDF_CODE)")?;
    gate.check(attempt)?;
    Ok(())
}

fn load_profile(path: Option<&Path>) -> Result<TemplateProfile, Box<dyn std::error::Error>> {
    Ok(match path {
        Some(p) => TemplateProfile::from_path(p)?,
        None => TemplateProfile::default(),
    })
}

fn output_path(input: &Path, args: &RedactArgs) -> PathBuf {
    let name = input.file_name().unwrap_or_default().to_string_lossy();
    let dir = args
        .output
        .clone()
        .or_else(|| input.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."));
    dir.join(format!("{}{}", args.prefix, name))
}

fn cmd_redact(inputs: &[PathBuf], args: &RedactArgs) -> Result<(), Box<dyn std::error::Error>> {
    let redactor = args.redactor()?;
    log::info!(
        "redacting {} files with profile '{}'",
        inputs.len(),
        redactor.profile().name
    );
    if let Some(dir) = &args.output {
        fs::create_dir_all(dir)?;
    }

    let pb = ProgressBar::new(inputs.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("#>-"),
    );

    let mut failures = 0;
    let mut outputs = Vec::new();
    for input in inputs {
        pb.set_message(input.display().to_string());
        match redact_one(&redactor, input, args) {
            Ok((path, report)) => outputs.push((input.clone(), path, report)),
            Err(e) => {
                pb.println(format!("{} {}: {}", "Failed".red(), input.display(), e));
                failures += 1;
            }
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    for (_, path, report) in &outputs {
        print_summary(path, report);
    }
    if let Some(report_path) = &args.report {
        write_report(report_path, &outputs)?;
        println!("{} {}", "Report".green(), report_path.display());
    }

    if failures > 0 {
        return Err(format!("{} of {} files failed", failures, inputs.len()).into());
    }
    Ok(())
}

fn redact_one(
    redactor: &Redactor,
    input: &Path,
    args: &RedactArgs,
) -> Result<(PathBuf, RedactionReport), Box<dyn std::error::Error>> {
    let result = redactor.redact_file(input)?;
    let output = output_path(input, args);
    result.save(&output)?;
    Ok((output, result.report))
}

/// One JSON array with an entry per redacted file.
fn write_report(
    path: &Path,
    outputs: &[(PathBuf, PathBuf, RedactionReport)],
) -> Result<(), Box<dyn std::error::Error>> {
    let entries = outputs
        .iter()
        .map(|(input, output, report)| {
            Ok(serde_json::json!({
                "input": input.display().to_string(),
                "output": output.display().to_string(),
                "report": serde_json::to_value(report)?,
            }))
        })
        .collect::<Result<Vec<_>, serde_json::Error>>()?;
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    fs::write(path, serde_json::to_string_pretty(&entries)?)?;
    Ok(())
}

fn print_summary(output: &Path, report: &RedactionReport) {
    println!(
        "{} {} ({} pages, {} rectangles)",
        "Saved".green(),
        output.display(),
        report.redacted_pages(),
        report.rect_count()
    );
    for (page, warning) in report.warnings() {
        let line = format!("  page {}: {}", page + 1, warning);
        match warning {
            Warning::OcrEngineUnavailable { .. }
            | Warning::OcrFailed { .. }
            | Warning::OcrTimeout { .. }
            | Warning::ContentRetained { .. } => println!("{}", line.red()),
            _ => println!("{}", line.yellow()),
        }
    }
    if report.ocr_skipped {
        println!(
            "  {}",
            "OCR was unavailable: check scanned pages manually".red().bold()
        );
    }
}

fn cmd_inspect(
    input: &Path,
    page: usize,
    profile: Option<&Path>,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let index = page.checked_sub(1).ok_or("page numbers start at 1")?;
    let redactor = Redactor::new().with_profile(load_profile(profile)?);
    let data = fs::read(input)?;
    let inspection = redactor.inspect_bytes(&data, index)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&inspection.layout)?);
        return Ok(());
    }

    println!("{}", "Page Layout".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());
    println!("{}: {}", "File".bold(), input.display());
    println!("{}: {}", "Page".bold(), page);
    println!(
        "{}: {:.1} x {:.1} pt",
        "Size".bold(),
        inspection.layout.width,
        inspection.layout.height
    );
    println!("{}: {}", "Words".bold(), inspection.layout.words.len());
    println!("{}: {}", "Images".bold(), inspection.layout.images.len());
    println!("{}: {}", "Gridlines".bold(), inspection.layout.rules.len());

    println!();
    println!("{}", "Redaction Rectangles".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());
    for rect in &inspection.rects {
        let b = rect.bbox;
        println!(
            "{:<24} [{:>6.1}, {:>6.1}, {:>6.1}, {:>6.1}]",
            rect.field.to_string(),
            b.x0,
            b.y0,
            b.x1,
            b.y1
        );
    }

    if !inspection.warnings.is_empty() {
        println!();
        println!("{}", "Warnings".yellow().bold());
        println!("{}", "─".repeat(40).dimmed());
        for warning in &inspection.warnings {
            println!("  {}", warning);
        }
    }

    Ok(())
}

fn cmd_profile(output: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let profile = TemplateProfile::default();
    match output {
        Some(path) => {
            profile.save(path)?;
            println!("{} {}", "Saved to".green(), path.display());
        }
        None => println!("{}", profile.to_json()?),
    }
    Ok(())
}

fn cmd_version() {
    println!("{} {}", "redactpdf".cyan().bold(), env!("CARGO_PKG_VERSION"));
    println!("Transcript PII redaction tool");
    println!();
    println!("Repository: {}", "https://github.com/iyulab/redactpdf".dimmed());
    println!("License: MIT");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_path_uses_prefix_and_dir() {
        let mut args = RedactArgs::defaults();
        let input = Path::new("in/학생부.pdf");
        assert_eq!(output_path(input, &args), PathBuf::from("in/masked_학생부.pdf"));

        args.output = Some(PathBuf::from("out"));
        args.prefix = "redacted-".to_string();
        assert_eq!(output_path(input, &args), PathBuf::from("out/redacted-학생부.pdf"));
    }

    #[test]
    fn test_cli_parses_redact_flags() {
        let cli = Cli::parse_from([
            "redactpdf",
            "redact",
            "a.pdf",
            "b.pdf",
            "--no-ocr",
            "--max-pages",
            "5",
            "--drop-overflow",
            "--report",
            "out/report.json",
        ]);
        match cli.command {
            Some(Commands::Redact { inputs, args }) => {
                assert_eq!(inputs.len(), 2);
                assert!(args.no_ocr);
                assert_eq!(args.max_pages, 5);
                assert!(args.drop_overflow);
                assert_eq!(args.prefix, "masked_");
                assert_eq!(args.report, Some(PathBuf::from("out/report.json")));
            }
            _ => panic!("expected redact"),
        }
    }

    #[test]
    fn test_access_gate_covers_content_commands_only() {
        let gated = |argv: &[&str]| needs_access(&Cli::parse_from(argv));
        assert!(gated(&["redactpdf", "redact", "a.pdf"]));
        assert!(gated(&["redactpdf", "inspect", "a.pdf", "--page", "2"]));
        assert!(gated(&["redactpdf", "a.pdf"]));
        assert!(!gated(&["redactpdf", "version"]));
        assert!(!gated(&["redactpdf", "profile"]));
        assert!(!gated(&["redactpdf"]));
    }

    #[test]
    fn test_report_lists_every_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports").join("run.json");
        let report = RedactionReport {
            profile: "default".to_string(),
            page_count: 2,
            pages: Vec::new(),
            ocr_skipped: false,
        };
        let outputs = vec![
            (PathBuf::from("a.pdf"), PathBuf::from("masked_a.pdf"), report.clone()),
            (PathBuf::from("b.pdf"), PathBuf::from("masked_b.pdf"), report),
        ];
        write_report(&path, &outputs).unwrap();

        let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        let entries = json.as_array().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1]["input"], "b.pdf");
        assert_eq!(entries[1]["output"], "masked_b.pdf");
        assert_eq!(entries[0]["report"]["page_count"], 2);
    }

    #[test]
    fn test_profile_roundtrip_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profile.json");
        cmd_profile(Some(&path)).unwrap();
        let loaded = load_profile(Some(&path)).unwrap();
        assert_eq!(loaded, TemplateProfile::default());
    }
}
