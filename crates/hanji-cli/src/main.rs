use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use hanji_editor_core::{EnterPolicy, GuardConfig, Platform};
use miette::{IntoDiagnostic, NamedSource, Result};

mod config;
mod kdl_error;
mod replay;
mod script;

#[derive(Parser)]
#[command(version, about = "Hanji - composition-safe editor input, replayed from scripts", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay an editor session script against a reference document
    Replay {
        /// Path to a KDL session script
        script: PathBuf,

        /// Path to a KDL config file
        #[arg(long, env = "HANJI_CONFIG")]
        config: Option<PathBuf>,

        /// Initial document text
        #[arg(long, default_value = "")]
        text: String,

        /// User agent to detect the platform from (default: a desktop browser)
        #[arg(long)]
        user_agent: Option<String>,

        /// Print the final document as delta JSON
        #[arg(long)]
        json: bool,
    },
    /// Validate a config file and print the effective settings
    Config {
        /// Path to a KDL config file; defaults are printed without one
        file: Option<PathBuf>,
    },
    /// Show how a user agent is classified and whether Enter is intercepted
    Platform {
        user_agent: String,

        /// Value of navigator.platform
        #[arg(long, default_value = "")]
        platform: String,

        /// Value of navigator.maxTouchPoints
        #[arg(long, default_value_t = 0)]
        touch_points: i32,

        /// Path to a KDL config file
        #[arg(long, env = "HANJI_CONFIG")]
        config: Option<PathBuf>,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    init_miette();
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Replay {
            script,
            config,
            text,
            user_agent,
            json,
        } => {
            let config = load_config(config.as_deref()).await?;
            let platform = user_agent
                .map(|ua| Platform::from_user_agent(&ua, "", 0))
                .unwrap_or_default();
            run_replay(&script, config, platform, &text, json).await?;
        }
        Commands::Config { file } => {
            let config = load_config(file.as_deref()).await?;
            let json = serde_json::to_string_pretty(&config).into_diagnostic()?;
            println!("{json}");
        }
        Commands::Platform {
            user_agent,
            platform,
            touch_points,
            config,
        } => {
            let config = load_config(config.as_deref()).await?;
            let detected = Platform::from_user_agent(&user_agent, &platform, touch_points);
            let policy = EnterPolicy::new(&config, &detected);
            println!("{detected:#?}");
            println!(
                "enter workaround ({:?}): {}",
                config.enter_workaround,
                if policy.is_active() { "active" } else { "inactive" }
            );
        }
    }

    Ok(())
}

async fn load_config(path: Option<&Path>) -> Result<GuardConfig> {
    let Some(path) = path else {
        return Ok(GuardConfig::default());
    };
    let source = tokio::fs::read_to_string(path).await.into_diagnostic()?;
    config::parse_config(&source)
        .map_err(|e| e.with_source_code(NamedSource::new(path.display().to_string(), source)))
}

async fn run_replay(
    script_path: &Path,
    config: GuardConfig,
    platform: Platform,
    initial_text: &str,
    json: bool,
) -> Result<()> {
    let source = tokio::fs::read_to_string(script_path)
        .await
        .into_diagnostic()?;
    let commands = script::parse_script(&source).map_err(|e| {
        e.with_source_code(NamedSource::new(script_path.display().to_string(), source))
    })?;
    tracing::debug!(commands = commands.len(), "script parsed");

    // Image paths in the script are relative to the script itself.
    let base_dir = script_path.parent().unwrap_or(Path::new("."));

    let report = tokio::task::LocalSet::new()
        .run_until(replay::replay(
            &commands,
            initial_text,
            config,
            platform,
            base_dir,
        ))
        .await?;

    if json {
        let out = serde_json::to_string_pretty(&report).into_diagnostic()?;
        println!("{out}");
    } else {
        for (i, step) in report.steps.iter().enumerate() {
            println!("{:>3}  {step}", i + 1);
        }
        println!("---");
        print!("{}", report.text);
        println!("---");
        let over = if report.stats.over_limit { " (over limit)" } else { "" };
        println!(
            "chars {}{over}, embeds {}, caret {}",
            report.stats,
            report.stats.embeds,
            report
                .caret
                .map(|c| c.to_string())
                .unwrap_or_else(|| "-".to_string())
        );
    }
    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn init_miette() {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .with_cause_chain()
                .color(true)
                .context_lines(5)
                .tab_width(2)
                .break_words(true)
                .build(),
        )
    }))
    .expect("couldn't set the miette hook");
    miette::set_panic_hook();
}
