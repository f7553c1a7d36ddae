//! Scripted [`CommandRunner`] for tests: no real subprocesses are started.
//!
//! Every invocation is recorded. If the arguments name a `--file` that exists
//! at call time, its contents are captured so tests can inspect files that are
//! removed once the run ends.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use metriccli_shared::{MetricCliError, Result};

use crate::{CommandRunner, ToolOutput};

type Effect = Arc<dyn Fn(&[String]) + Send + Sync>;

/// One recorded invocation.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    /// Contents of the `--file` argument at call time, if it existed.
    pub file_snapshot: Option<String>,
}

impl Invocation {
    pub fn is_probe(&self) -> bool {
        self.args == ["--help"]
    }

    /// Value following `flag`, if present.
    pub fn arg_after(&self, flag: &str) -> Option<&str> {
        arg_after(&self.args, flag)
    }
}

/// Behaviour of one fake program.
#[derive(Clone)]
pub struct ScriptedTool {
    installed: bool,
    help_exit: i32,
    exit_code: i32,
    stderr: String,
    effect: Option<Effect>,
}

impl ScriptedTool {
    /// A tool whose probe and runs succeed.
    pub fn installed() -> Self {
        Self {
            installed: true,
            help_exit: 0,
            exit_code: 0,
            stderr: String::new(),
            effect: None,
        }
    }

    /// A tool that cannot be started.
    pub fn missing() -> Self {
        Self {
            installed: false,
            ..Self::installed()
        }
    }

    pub fn with_help_exit(mut self, code: i32) -> Self {
        self.help_exit = code;
        self
    }

    /// Exit code for non-probe runs.
    pub fn with_exit(mut self, code: i32, stderr: impl Into<String>) -> Self {
        self.exit_code = code;
        self.stderr = stderr.into();
        self
    }

    /// Side effect run on every non-probe invocation, before it returns.
    pub fn with_effect(mut self, effect: impl Fn(&[String]) + Send + Sync + 'static) -> Self {
        self.effect = Some(Arc::new(effect));
        self
    }

    /// Write `value` to the path following `--file`, like the tracker tool.
    pub fn writes_to_file_arg(self, value: serde_json::Value) -> Self {
        self.with_effect(move |args| {
            if let Some(path) = arg_after(args, "--file") {
                let _ = std::fs::write(path, value.to_string());
            }
        })
    }

    /// Write `value` to `<--output>/<--project>_search_results.json`, like
    /// the requirements tool.
    pub fn writes_project_results(self, value: serde_json::Value) -> Self {
        self.with_effect(move |args| {
            if let (Some(dir), Some(project)) =
                (arg_after(args, "--output"), arg_after(args, "--project"))
            {
                let path = Path::new(dir).join(format!("{project}_search_results.json"));
                let _ = std::fs::write(path, value.to_string());
            }
        })
    }
}

/// Fake runner keyed by program name. Unknown programs behave as missing.
#[derive(Default)]
pub struct ScriptedRunner {
    tools: HashMap<String, ScriptedTool>,
    calls: Mutex<Vec<Invocation>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tool(mut self, program: impl Into<String>, tool: ScriptedTool) -> Self {
        self.tools.insert(program.into(), tool);
        self
    }

    /// All invocations so far, in order.
    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Non-probe invocations of `program`.
    pub fn runs_of(&self, program: &str) -> Vec<Invocation> {
        self.calls()
            .into_iter()
            .filter(|c| c.program == program && !c.is_probe())
            .collect()
    }

    /// Whether `program` was invoked at all, probe included.
    pub fn touched(&self, program: &str) -> bool {
        self.calls().iter().any(|c| c.program == program)
    }
}

impl CommandRunner for ScriptedRunner {
    async fn run(&self, program: &str, args: &[String]) -> Result<ToolOutput> {
        let file_snapshot = arg_after(args, "--file").and_then(|p| std::fs::read_to_string(p).ok());
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(Invocation {
                program: program.to_string(),
                args: args.to_vec(),
                file_snapshot,
            });
        }

        let tool = match self.tools.get(program) {
            Some(tool) if tool.installed => tool,
            _ => {
                return Err(MetricCliError::tool(program, "failed to start: not found"));
            }
        };

        if args == ["--help"] {
            return Ok(ToolOutput {
                code: Some(tool.help_exit),
                stdout: format!("usage: {program}"),
                stderr: String::new(),
            });
        }

        if let Some(effect) = &tool.effect {
            effect(args);
        }

        Ok(ToolOutput {
            code: Some(tool.exit_code),
            stdout: String::new(),
            stderr: tool.stderr.clone(),
        })
    }
}

fn arg_after<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}
