// config.rs — Pass options
//
// Names the hoisting pass works with: the launch and terminator operations,
// the device attribute key, the target dialect and its structural allow-list,
// and the dialects loaded into the context. Defaults target TensorFlow.
// Options can be loaded from a JSON file; missing keys take their default.
//
// Preconditions: none.
// Postconditions: a loaded `PassOptions` has non-empty operation, attribute
//   and dialect names.
// Failure modes: unreadable file, malformed JSON, unknown keys or empty names
//   produce `ConfigError`.
// Side effects: `load` reads the given file.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::ir::Context;

/// Operations outside the target dialect that still take a device.
pub const DEFAULT_STRUCTURAL_OPS: [&str; 9] = [
    "tf_executor.ControlTrigger",
    "tf_executor.Enter",
    "tf_executor.Exit",
    "tf_executor.LoopCond",
    "tf_executor.Merge",
    "tf_executor.NextIteration.Sink",
    "tf_executor.NextIteration.Source",
    "tf_executor.Switch",
    "tf_executor._SwitchN",
];

const DEFAULT_DIALECTS: [&str; 5] = ["builtin", "func", "tf", "tf_device", "tf_executor"];

const DEFAULT_TERMINATORS: [&str; 4] = [
    "func.return",
    "tf_device.return",
    "tf_executor.yield",
    "tf_executor.fetch",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PassOptions {
    /// Operation whose body is hoisted.
    pub scope_op: String,
    /// Terminator of the launch body.
    pub terminator_op: String,
    /// Attribute key carrying the device.
    pub device_attr: String,
    /// Every operation of this dialect receives the device.
    pub target_dialect: String,
    /// Operations from other dialects that receive the device.
    pub structural_ops: Vec<String>,
    /// Dialects loaded into the context.
    pub dialects: Vec<String>,
}

impl Default for PassOptions {
    fn default() -> Self {
        PassOptions {
            scope_op: "tf_device.launch".to_string(),
            terminator_op: "tf_device.return".to_string(),
            device_attr: "device".to_string(),
            target_dialect: "tf".to_string(),
            structural_ops: DEFAULT_STRUCTURAL_OPS.iter().map(|s| s.to_string()).collect(),
            dialects: DEFAULT_DIALECTS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl PassOptions {
    /// Load options from a JSON file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_json(&text).map_err(|e| e.with_path(path))
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let options: PassOptions = serde_json::from_str(text).map_err(|e| ConfigError::Parse {
            path: None,
            source: e,
        })?;
        options.validate()?;
        Ok(options)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            ("scope_op", &self.scope_op),
            ("terminator_op", &self.terminator_op),
            ("device_attr", &self.device_attr),
            ("target_dialect", &self.target_dialect),
        ];
        for (field, value) in required {
            if value.is_empty() {
                return Err(ConfigError::Invalid {
                    message: format!("'{field}' must not be empty"),
                });
            }
        }
        Ok(())
    }

    /// Compact JSON with fields in declaration order, for fingerprinting.
    pub fn canonical_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Context with the configured dialects and terminators loaded.
    pub fn context(&self) -> Context {
        let mut ctx = Context::new();
        for dialect in &self.dialects {
            ctx.load_dialect(dialect.as_str());
        }
        for terminator in DEFAULT_TERMINATORS {
            ctx.register_terminator(terminator);
        }
        ctx.register_terminator(self.terminator_op.as_str());
        ctx
    }

    pub fn is_structural(&self, op_name: &str) -> bool {
        self.structural_ops.iter().any(|s| s == op_name)
    }
}

// ── Errors ──────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        path: Option<PathBuf>,
        source: serde_json::Error,
    },
    Invalid {
        message: String,
    },
}

impl ConfigError {
    fn with_path(self, path: &Path) -> Self {
        match self {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: Some(path.to_path_buf()),
                source,
            },
            other => other,
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, source } => write!(f, "{}: {}", path.display(), source),
            ConfigError::Parse {
                path: Some(path),
                source,
            } => write!(f, "{}: invalid options: {}", path.display(), source),
            ConfigError::Parse { path: None, source } => {
                write!(f, "invalid options: {}", source)
            }
            ConfigError::Invalid { message } => write!(f, "invalid options: {}", message),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            ConfigError::Parse { source, .. } => Some(source),
            ConfigError::Invalid { .. } => None,
        }
    }
}
