use clap::{Parser, Subcommand};
use govis_driver::Driver;
use miette::Result;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "govis")]
#[command(author, version, about = "Package-boundary visibility checker for Go")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check every package of a module for visibility errors
    Check {
        /// Module root (containing go.mod or govis.toml)
        #[arg(default_value = ".")]
        dir: PathBuf,
    },

    /// Check a module, then run its main package
    Run {
        /// Module root (containing go.mod or govis.toml)
        #[arg(default_value = ".")]
        dir: PathBuf,
    },

    /// Print the loaded packages and their HIR
    Dump {
        /// Module root (containing go.mod or govis.toml)
        #[arg(default_value = ".")]
        dir: PathBuf,
    },
}

fn main() -> Result<()> {
    // GOVIS_LOG=debug, or any EnvFilter directive.
    if let Ok(filter) = EnvFilter::try_from_env("GOVIS_LOG") {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .compact()
            .without_time()
            .with_writer(std::io::stderr)
            .init();
        tracing::debug!("tracing initialized");
    }

    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))?;

    let cli = Cli::parse();

    match cli.command {
        Commands::Check { dir } => {
            let driver = load(&dir)?;
            driver.check()?;
            println!(
                "{}: OK ({} packages)",
                dir.display(),
                driver.program().packages.len()
            );
        }

        Commands::Run { dir } => {
            let driver = load(&dir)?;
            let stdout = std::io::stdout();
            driver.run(&mut stdout.lock())?;
        }

        Commands::Dump { dir } => {
            let driver = load(&dir)?;
            print!("{}", driver.dump());
        }
    }

    Ok(())
}

fn load(dir: &Path) -> Result<Driver> {
    let mut driver = Driver::new();
    driver.load_dir(dir)?;
    Ok(driver)
}
