use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "corekit",
    about = "corekit: runtime checks, value descriptions and loader configuration",
    version
)]
pub struct Cli {
    /// Path to a loader configuration file (TOML)
    #[arg(long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the registered checks
    Checks {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate a JSON value against an instruction
    Validate {
        /// Value to validate (JSON)
        #[arg(long)]
        value: String,

        /// Instruction to evaluate, e.g. `"isString"` or `{"$any": ["isNull", "isNumber"]}`
        #[arg(long)]
        instruction: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Describe a JSON value with the first matching descriptive check
    Describe {
        /// Value to describe (JSON)
        #[arg(long)]
        value: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the effective loader configuration
    Config {
        /// Output as JSON instead of TOML
        #[arg(long)]
        json: bool,
    },
}
