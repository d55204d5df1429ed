use std::path::PathBuf;

use clap::Parser;

/// Load a directory of Lua scripts into Redis and run one of them.
#[derive(Debug, Parser)]
#[command(name = "scripto-runner", version)]
pub struct Cli {
    /// Name of the script to run (file name without `.lua`).
    pub script: String,

    /// Script directory. Overrides `SCRIPTO_SCRIPT_DIR`.
    #[arg(long, short = 'd')]
    pub dir: Option<PathBuf>,

    /// Key argument passed before the free-form arguments. Repeatable.
    #[arg(long = "key", short = 'k')]
    pub keys: Vec<String>,

    /// Wait for background registration so the call goes by digest.
    #[arg(long)]
    pub wait: bool,

    /// Always submit the full script text.
    #[arg(long, conflicts_with = "digest_only")]
    pub text: bool,

    /// Only invoke by digest; implies `--wait`.
    #[arg(long)]
    pub digest_only: bool,

    /// Free-form script arguments.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

/// Which registry operation the runner calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvokeMode {
    Run,
    Text,
    Digest,
}

impl Cli {
    pub fn mode(&self) -> InvokeMode {
        if self.text {
            InvokeMode::Text
        } else if self.digest_only {
            InvokeMode::Digest
        } else {
            InvokeMode::Run
        }
    }

    pub fn should_wait(&self) -> bool {
        self.wait || self.digest_only
    }
}
