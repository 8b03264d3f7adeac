// pipeline.rs — Compilation state and pass orchestration
//
// Holds the parsed module, the IR built from it and every pass artifact, and
// runs the minimal set of passes for a given terminal PassId. The hoisting
// pass is followed by a second verification of the rewritten module.
//
// Preconditions: the AST and options must be set before calling run_pipeline.
// Postconditions: all artifacts for required passes are populated, or has_error is set.
// Failure modes: any pass emitting error-level diagnostics; post-pass cert failure.
// Side effects: calls on_pass_complete callback after each pass for immediate display.

use std::fmt;
use std::time::Instant;

use crate::ast::ModuleAst;
use crate::config::PassOptions;
use crate::diag::codes;
use crate::diag::{has_errors, Diagnostic};
use crate::hoist::PassReport;
use crate::ir::{Context, Module};
use crate::pass::{descriptor, required_passes, PassId, StageCert};
use crate::verify::VerifyCert;

// ── Provenance ─────────────────────────────────────────────────────────────

/// Provenance metadata for reproducible runs.
///
/// `source_hash`: SHA-256 of the raw IR source text.
/// `options_fingerprint`: SHA-256 of `PassOptions::canonical_json()`.
/// `tool_version`: crate version from `Cargo.toml`.
#[derive(Debug, Clone)]
pub struct Provenance {
    pub source_hash: [u8; 32],
    pub options_fingerprint: [u8; 32],
    pub tool_version: &'static str,
}

impl Provenance {
    /// Hex string of the source hash (64 characters).
    pub fn source_hash_hex(&self) -> String {
        bytes_to_hex(&self.source_hash)
    }

    /// Hex string of the options fingerprint (64 characters).
    pub fn options_fingerprint_hex(&self) -> String {
        bytes_to_hex(&self.options_fingerprint)
    }

    /// Serialize provenance as a JSON string for `--emit build-info`.
    pub fn to_json(&self) -> String {
        format!(
            "{{\n  \"source_hash\": \"{}\",\n  \"options_fingerprint\": \"{}\",\n  \"tool_version\": \"{}\"\n}}\n",
            self.source_hash_hex(),
            self.options_fingerprint_hex(),
            self.tool_version,
        )
    }
}

fn bytes_to_hex(bytes: &[u8; 32]) -> String {
    let mut s = String::with_capacity(64);
    for b in bytes {
        use std::fmt::Write;
        let _ = write!(s, "{:02x}", b);
    }
    s
}

fn sha256(bytes: &[u8]) -> [u8; 32] {
    use sha2::{Digest, Sha256};

    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let result = hasher.finalize();
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&result);
    hash
}

/// Compute provenance from source text and pass options.
pub fn compute_provenance(source: &str, options: &PassOptions) -> Provenance {
    Provenance {
        source_hash: sha256(source.as_bytes()),
        options_fingerprint: sha256(options.canonical_json().as_bytes()),
        tool_version: env!("CARGO_PKG_VERSION"),
    }
}

// ── Compilation state ──────────────────────────────────────────────────────

/// Holds all pass artifacts and accumulated diagnostics.
pub struct CompilationState {
    pub ctx: Context,
    pub options: PassOptions,
    pub ast: ModuleAst,
    pub module: Option<Module>,
    pub verify_cert: Option<VerifyCert>,
    pub report: Option<PassReport>,
    pub diagnostics: Vec<Diagnostic>,
    pub has_error: bool,
    pub provenance: Option<Provenance>,
}

impl CompilationState {
    /// State with a context built from `options`.
    pub fn new(ast: ModuleAst, options: PassOptions) -> Self {
        Self {
            ctx: options.context(),
            options,
            ast,
            module: None,
            verify_cert: None,
            report: None,
            diagnostics: Vec::new(),
            has_error: false,
            provenance: None,
        }
    }
}

/// Error returned when a pass fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineError {
    /// The pass that produced the error.
    pub failing_pass: PassId,
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pass '{}' failed", descriptor(self.failing_pass).argument)
    }
}

impl std::error::Error for PipelineError {}

// ── Per-pass bookkeeping ───────────────────────────────────────────────────

/// Per-pass post-processing: callback, accumulate, verbose, error check.
fn finish_pass(
    state: &mut CompilationState,
    pass_id: PassId,
    diags: Vec<Diagnostic>,
    elapsed: std::time::Duration,
    verbose: bool,
    on_pass_complete: &mut impl FnMut(PassId, &[Diagnostic]),
) -> Result<(), PipelineError> {
    on_pass_complete(pass_id, &diags);
    let is_err = has_errors(&diags);
    state.diagnostics.extend(diags);
    if verbose {
        eprintln!(
            "devhoist: {} complete, {:.1}ms",
            descriptor(pass_id).name,
            elapsed.as_secs_f64() * 1000.0
        );
    }
    if is_err {
        state.has_error = true;
        return Err(PipelineError {
            failing_pass: pass_id,
        });
    }
    Ok(())
}

fn missing_module(pass_id: PassId) -> Vec<Diagnostic> {
    vec![Diagnostic::error(
        None,
        format!(
            "pass '{}' ran before the module was resolved",
            descriptor(pass_id).argument
        ),
    )]
}

// ── Pipeline runner ────────────────────────────────────────────────────────

/// Run the minimal set of passes to produce `terminal`.
///
/// Per-pass sequence: execute → on_pass_complete(callback) → verbose → error check.
///
/// Preconditions: `state.ast` and `state.options` are set.
/// Postconditions: artifacts for all passes in `required_passes(terminal)` are populated,
///   or `state.has_error` is true.
/// Failure modes: any pass producing error-level diagnostics; verification failure
///   after the hoisting pass.
/// Side effects: calls `on_pass_complete` after each pass for immediate diagnostic display.
pub fn run_pipeline(
    state: &mut CompilationState,
    terminal: PassId,
    verbose: bool,
    mut on_pass_complete: impl FnMut(PassId, &[Diagnostic]),
) -> Result<(), PipelineError> {
    for pass_id in required_passes(terminal) {
        log::debug!("running pass '{}'", descriptor(pass_id).argument);
        let t = Instant::now();
        let diags = match pass_id {
            PassId::Resolve => {
                let result = crate::resolve::resolve(&state.ast);
                state.module = Some(result.module);
                result.diagnostics
            }
            PassId::Verify => match state.module.as_ref() {
                Some(module) => {
                    let result = crate::verify::verify_module(&state.ctx, module);
                    state.verify_cert = Some(result.cert);
                    result.diagnostics
                }
                None => missing_module(pass_id),
            },
            PassId::LaunchToDeviceAttribute => match state.module.as_mut() {
                Some(module) => {
                    match crate::hoist::run_launch_to_device_attribute(
                        &state.ctx,
                        module,
                        &state.options,
                    ) {
                        Ok(report) => {
                            state.report = Some(report);
                            let result = crate::verify::verify_module(&state.ctx, module);
                            state.verify_cert = Some(result.cert);
                            let mut diags = result.diagnostics;
                            if !result.cert.all_pass() {
                                diags.push(
                                    Diagnostic::error(
                                        None,
                                        format!(
                                            "module verification failed after {}: {}",
                                            descriptor(pass_id).argument,
                                            result.cert.failed().join(", ")
                                        ),
                                    )
                                    .with_code(codes::E0600),
                                );
                            }
                            diags
                        }
                        Err(err) => vec![err.to_diagnostic(module)],
                    }
                }
                None => missing_module(pass_id),
            },
        };
        let elapsed = t.elapsed();
        finish_pass(
            state,
            pass_id,
            diags,
            elapsed,
            verbose,
            &mut on_pass_complete,
        )?;
    }
    Ok(())
}
