use clap::Parser;
use std::path::{Path, PathBuf};

use oclbc::config::{self, UserConfig};
use oclbc::hostgen::{self, HostCodeOptions};
use oclbc::layout::RecorderLayout;
use oclbc::session::{self, SessionOutcome};
use oclbc::status::ExitStatus;

#[derive(Parser, Debug)]
#[command(
    name = "oclbc",
    version,
    about = "OpenCL kernel branch/barrier coverage instrumenter"
)]
struct Cli {
    /// Input source files (.cl files are kernels, anything else is host code)
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Output directory for instrumented kernels and metadata
    #[arg(
        short,
        long,
        required_unless_present_any = ["add_header", "remove_header"]
    )]
    output: Option<PathBuf>,

    /// User configuration file (macro list, host-code names)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Generate reference host code alongside each instrumented kernel
    #[arg(long)]
    host_code: bool,

    /// Also write metadata as a JSON sibling
    #[arg(long)]
    json: bool,

    /// Inject the compatibility fake header into the files in place and exit
    #[arg(long, conflicts_with = "remove_header")]
    add_header: bool,

    /// Strip the compatibility fake header from the files in place and exit
    #[arg(long)]
    remove_header: bool,

    /// Print pass progress and timing
    #[arg(long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => match UserConfig::load(path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("oclbc: error: {e}");
                std::process::exit(ExitStatus::Fatal.code());
            }
        },
        None => UserConfig::default(),
    };

    if cli.add_header || cli.remove_header {
        std::process::exit(run_header_mode(&cli, &config).code());
    }

    std::process::exit(run_instrument_mode(&cli, &config).code());
}

fn read_file(path: &Path) -> String {
    match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("oclbc: error: {}: {}", path.display(), e);
            std::process::exit(ExitStatus::Fatal.code());
        }
    }
}

fn write_file(path: &Path, text: &str) {
    if let Err(e) = std::fs::write(path, text) {
        eprintln!("oclbc: error: {}: {}", path.display(), e);
        std::process::exit(ExitStatus::Fatal.code());
    }
}

// ── Header mode ──

/// `--add-header` / `--remove-header`: edit the files in place, no
/// instrumentation.
fn run_header_mode(cli: &Cli, config: &UserConfig) -> ExitStatus {
    let macros = config.macros();
    for path in &cli.files {
        let source = read_file(path);
        if cli.add_header {
            if config::has_fake_header(&source) {
                eprintln!(
                    "oclbc: {}: {}",
                    path.display(),
                    ExitStatus::FakeHeaderAlreadyPresent
                );
                return ExitStatus::FakeHeaderAlreadyPresent;
            }
            let (text, added) = config::add_fake_header(&source, &macros);
            write_file(path, &text);
            if cli.verbose {
                eprintln!("oclbc: {}: added {} header line(s)", path.display(), added);
            }
        } else {
            match config::remove_fake_header(&source) {
                Some(text) => write_file(path, &text),
                None => {
                    eprintln!(
                        "oclbc: {}: {}",
                        path.display(),
                        ExitStatus::FakeHeaderMissingOnRemoval
                    );
                    return ExitStatus::FakeHeaderMissingOnRemoval;
                }
            }
        }
    }
    ExitStatus::Ok
}

// ── Instrument mode ──

fn run_instrument_mode(cli: &Cli, config: &UserConfig) -> ExitStatus {
    let (kernel_files, host_files): (Vec<_>, Vec<_>) = cli
        .files
        .iter()
        .partition(|p| p.extension().is_some_and(|e| e == "cl"));

    if cli.host_code {
        if host_files.is_empty() {
            eprintln!("oclbc: error: {}", ExitStatus::NoHostFileSupplied);
            return ExitStatus::NoHostFileSupplied;
        }
        if host_files.len() > 1 {
            eprintln!("oclbc: error: {}", ExitStatus::TooManyHostFilesSupplied);
            return ExitStatus::TooManyHostFilesSupplied;
        }
    }

    let out_dir = cli.output.as_deref().expect("clap enforces --output");
    if let Err(e) = std::fs::create_dir_all(out_dir) {
        eprintln!("oclbc: error: {}: {}", out_dir.display(), e);
        std::process::exit(ExitStatus::Fatal.code());
    }

    let macros = config.macros();
    let mut instrumented_any = false;

    for path in &kernel_files {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let source = read_file(path);

        let outcome = match session::run_session(&file_name, &source, &macros, cli.verbose) {
            Ok(outcome) => outcome,
            Err(e) => {
                eprintln!("oclbc: error: {e}");
                std::process::exit(ExitStatus::Fatal.code());
            }
        };

        let kernel = match outcome {
            SessionOutcome::Instrumented(kernel) => kernel,
            SessionOutcome::NothingToInstrument => {
                eprintln!("oclbc: {}: {}", file_name, ExitStatus::NothingToInstrument);
                continue;
            }
        };
        instrumented_any = true;

        let out_path = out_dir.join(&file_name);
        let dat_path = out_dir.join(format!("{file_name}.dat"));
        write_file(&out_path, &kernel.source);
        write_file(&dat_path, &kernel.metadata.render_dat());

        if cli.json {
            let json = match serde_json::to_string_pretty(&kernel.metadata) {
                Ok(j) => j,
                Err(e) => {
                    eprintln!("oclbc: error: {file_name}: {e}");
                    std::process::exit(ExitStatus::Fatal.code());
                }
            };
            write_file(&out_dir.join(format!("{file_name}.json")), &json);
        }

        if cli.host_code {
            let layout = RecorderLayout::new(
                kernel.analysis.branch_count,
                kernel.analysis.barrier_count,
            );
            let opts = HostCodeOptions::from_config(config);
            let host_text = hostgen::generate_host_code(
                &opts,
                layout,
                &dat_path.display().to_string(),
                &kernel.provenance,
            );
            write_file(&out_dir.join(format!("{file_name}.host.c")), &host_text);
        }

        eprintln!(
            "oclbc: {}: {} branch(es), {} barrier(s) instrumented",
            file_name, kernel.analysis.branch_count, kernel.analysis.barrier_count
        );
    }

    if !instrumented_any {
        return ExitStatus::NothingToInstrument;
    }
    ExitStatus::Ok
}
