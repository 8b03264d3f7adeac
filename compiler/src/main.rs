use clap::Parser;
use std::path::{Path, PathBuf};

use devhoist::diag::line_col;
use devhoist::pass::{descriptor, PassId, ALL_PASSES};

#[derive(Debug, Clone, clap::ValueEnum)]
enum EmitStage {
    Ir,
    Report,
    BuildInfo,
}

#[derive(Parser, Debug)]
#[command(
    name = "devhoist",
    version,
    about = "Hoists device launch bodies into their enclosing block and annotates them with the launch device"
)]
struct Cli {
    /// Input IR source file
    #[arg(required_unless_present = "list_passes")]
    source: Option<PathBuf>,

    /// Output file path (stdout when omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output stage
    #[arg(long, value_enum, default_value_t = EmitStage::Ir)]
    emit: EmitStage,

    /// Terminal pass, by registry identifier
    #[arg(long, default_value = devhoist::hoist::PASS_ARGUMENT)]
    pass: String,

    /// JSON file with pass options
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print registered passes and exit
    #[arg(long)]
    list_passes: bool,

    /// Print pass phases and timing
    #[arg(long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    if cli.list_passes {
        for id in ALL_PASSES {
            let desc = descriptor(id);
            println!("{:<32} {}", desc.argument, desc.description);
        }
        return;
    }

    let Some(source_path) = cli.source.as_deref() else {
        eprintln!("devhoist: error: no input file");
        std::process::exit(2);
    };

    let Some(terminal) = devhoist::pass::lookup(&cli.pass) else {
        eprintln!("devhoist: error: unknown pass '{}'", cli.pass);
        eprintln!("  hint: run with --list-passes to see registered passes");
        std::process::exit(2);
    };

    if cli.verbose {
        eprintln!("devhoist: source = {}", source_path.display());
        eprintln!("devhoist: pass   = {}", cli.pass);
        eprintln!("devhoist: emit   = {:?}", cli.emit);
    }

    // ── Load options ──
    let options = match &cli.config {
        Some(path) => match devhoist::config::PassOptions::load(path) {
            Ok(options) => options,
            Err(e) => {
                eprintln!("devhoist: error: {}", e);
                std::process::exit(2);
            }
        },
        None => devhoist::config::PassOptions::default(),
    };

    // ── Read and parse source ──
    let source = match std::fs::read_to_string(source_path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("devhoist: error: {}: {}", source_path.display(), e);
            std::process::exit(2);
        }
    };
    let file = source_path.display().to_string();

    let parse_result = devhoist::parser::parse(&source);
    if !parse_result.errors.is_empty() {
        for err in &parse_result.errors {
            let (line, col) = line_col(&source, err.span().start);
            eprintln!("{}:{}:{}: parse error: {}", file, line, col, err);
        }
        std::process::exit(1);
    }
    let ast = match parse_result.module {
        Some(m) => m,
        None => {
            eprintln!("devhoist: parse failed with no output");
            std::process::exit(1);
        }
    };

    if cli.verbose {
        eprintln!("devhoist: parsed {} top-level items", ast.items.len());
    }

    // ── Run passes ──
    let mut state = devhoist::pipeline::CompilationState::new(ast, options);
    state.provenance = Some(devhoist::pipeline::compute_provenance(
        &source,
        &state.options,
    ));

    let result = devhoist::pipeline::run_pipeline(&mut state, terminal, cli.verbose, |_, diags| {
        for diag in diags {
            eprintln!("{}", diag.render(&file, &source));
        }
    });
    if let Err(e) = result {
        if cli.verbose {
            eprintln!("devhoist: {}", e);
        }
        std::process::exit(1);
    }

    // ── Emit ──
    let output = match cli.emit {
        EmitStage::Ir => match &state.module {
            Some(module) => module.to_string(),
            None => {
                eprintln!("devhoist: error: no module was produced");
                std::process::exit(1);
            }
        },
        EmitStage::Report => match &state.report {
            Some(report) => match report.to_json() {
                Ok(json) => json,
                Err(e) => {
                    eprintln!("devhoist: error: cannot serialize report: {e}");
                    std::process::exit(2);
                }
            },
            None => {
                eprintln!(
                    "devhoist: error: pass '{}' does not produce a report",
                    descriptor(terminal).argument
                );
                eprintln!(
                    "  hint: use --pass {}",
                    descriptor(PassId::LaunchToDeviceAttribute).argument
                );
                std::process::exit(2);
            }
        },
        EmitStage::BuildInfo => match &state.provenance {
            Some(provenance) => provenance.to_json(),
            None => {
                eprintln!("devhoist: error: no provenance was computed");
                std::process::exit(1);
            }
        },
    };

    write_output(cli.output.as_deref(), &output);
}

fn write_output(path: Option<&Path>, text: &str) {
    match path {
        Some(path) => {
            if let Err(e) = std::fs::write(path, text) {
                eprintln!("devhoist: error: {}: {}", path.display(), e);
                std::process::exit(2);
            }
        }
        None => print!("{}", text),
    }
}
