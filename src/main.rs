//! tmreg CLI - inspect grammar dependency closures, metadata words and themes

mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser)]
#[command(name = "tmreg")]
#[command(version)]
#[command(about = "TextMate grammar registry - dependency resolution and token metadata")]
#[command(long_about = r#"
tmreg resolves the grammars a TextMate scope needs, enabling:
  • Listing every grammar and injection reachable from a scope
  • Inspecting the includes of a single grammar file
  • Packing and unpacking 32-bit token metadata words
  • Interning theme colors into a color map
  • Styling scope paths with the configured languages and theme

Example usage:
  tmreg init
  tmreg resolve source.js --dir ./grammars
  tmreg scan ./grammars/html.tmLanguage.json --rule tag-stuff
  tmreg unpack 0x00804201
  tmreg style text.html.basic source.css comment.block.css
"#)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to the config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, global = true, value_enum, default_value = "text")]
    format: OutputMode,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputMode {
    Text,
    Json,
}

impl OutputMode {
    pub fn is_human(self) -> bool {
        self == Self::Text
    }
}

/// Print a JSON envelope for a finished command
pub fn emit_success(
    output_mode: OutputMode,
    command: &str,
    data: serde_json::Value,
) -> anyhow::Result<()> {
    debug_assert_eq!(output_mode, OutputMode::Json);
    let envelope = serde_json::json!({
        "command": command,
        "ok": true,
        "data": data,
    });
    println!("{}", serde_json::to_string_pretty(&envelope)?);
    Ok(())
}

#[derive(Subcommand)]
enum Commands {
    /// Write a starter tmreg.toml
    Init {
        /// Overwrite an existing config
        #[arg(long)]
        force: bool,
    },

    /// Load every grammar reachable from a scope
    Resolve {
        /// Scope to resolve, e.g. source.js
        scope: String,

        /// Grammar directory (repeatable, added to the configured ones)
        #[arg(short, long)]
        dir: Vec<PathBuf>,

        /// Injection as target=scope (repeatable)
        #[arg(short, long)]
        inject: Vec<String>,
    },

    /// List the dependencies a grammar file declares
    Scan {
        /// Grammar file in JSON form
        file: PathBuf,

        /// Only scan what is reachable from this repository rule
        #[arg(short, long)]
        rule: Option<String>,
    },

    /// Pack highlighting attributes into a metadata word
    Pack {
        #[arg(short, long, default_value = "0")]
        language: u32,

        /// other, comment, string or regex
        #[arg(short, long, default_value = "other")]
        token_type: String,

        /// Space-separated: italic, bold, underline
        #[arg(short = 's', long, default_value = "")]
        font_style: String,

        #[arg(long, default_value = "0")]
        foreground: u32,

        #[arg(long, default_value = "0")]
        background: u32,
    },

    /// Unpack a metadata word (decimal, 0x or 0b)
    Unpack {
        word: String,
    },

    /// Metadata word of a scope path under the configured languages and theme
    Style {
        /// Scopes, outermost first, e.g. text.html.basic source.css comment.block.css
        #[arg(required = true)]
        scopes: Vec<String>,

        /// Language id of the root scope (overrides the config)
        #[arg(short, long)]
        language: Option<u32>,

        /// Theme file in JSON form (overrides the config)
        #[arg(short, long)]
        theme: Option<PathBuf>,
    },

    /// Intern the colors of a theme file
    Colors {
        /// Theme file in JSON form (defaults to the configured theme)
        theme: Option<PathBuf>,

        /// JSON array fixing the color map
        #[arg(long)]
        color_map: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let config_path = cli.config.unwrap_or_else(tmreg::config::default_config_path);
    let output_mode = cli.format;

    let result = match cli.command {
        Commands::Init { force } => commands::run_init(output_mode, &config_path, force),
        Commands::Resolve { scope, dir, inject } => {
            commands::run_resolve(output_mode, &config_path, &scope, dir, inject).await
        }
        Commands::Scan { file, rule } => commands::run_scan(output_mode, &file, rule.as_deref()),
        Commands::Pack {
            language,
            token_type,
            font_style,
            foreground,
            background,
        } => commands::run_pack(
            output_mode,
            language,
            &token_type,
            &font_style,
            foreground,
            background,
        ),
        Commands::Unpack { word } => commands::run_unpack(output_mode, &word),
        Commands::Style {
            scopes,
            language,
            theme,
        } => commands::run_style(output_mode, &config_path, &scopes, language, theme),
        Commands::Colors { theme, color_map } => {
            commands::run_colors(output_mode, &config_path, theme, color_map.as_deref())
        }
    };

    if let Err(e) = result {
        if output_mode.is_human() {
            tmreg::ui::error(&format!("{:#}", e));
        } else {
            let envelope = serde_json::json!({ "ok": false, "error": format!("{:#}", e) });
            println!("{}", serde_json::to_string_pretty(&envelope)?);
        }
        std::process::exit(1);
    }
    Ok(())
}
