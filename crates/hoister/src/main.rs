use anyhow::{Context, Result};
use clap::Parser;
use hoister::{optimize_source, OptimizeOptions};
use std::fs;
use std::path::PathBuf;

/// hoister — common sub-expression elimination for Java-like statement code.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Input program
    input: PathBuf,

    /// Output file for the optimized program
    #[arg(long, short)]
    output: Option<PathBuf>,

    /// Also hoist static field reads (`Type.FIELD`)
    #[arg(long)]
    static_fields: bool,

    /// Log every hoisted expression
    #[arg(long, short)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG takes precedence over the --verbose level
    let level = if cli.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_module("hoister", level)
        .parse_default_env()
        .target(env_logger::Target::Stderr)
        .format_timestamp(None)
        .format_module_path(false)
        .format_target(false)
        .init();

    eprintln!("hoister: optimizing {}", cli.input.display());

    let source = fs::read_to_string(&cli.input)
        .with_context(|| format!("failed to read {}", cli.input.display()))?;

    let options = OptimizeOptions {
        static_fields: cli.static_fields,
    };
    let optimized = optimize_source(&source, &options)
        .with_context(|| format!("failed to optimize {}", cli.input.display()))?;

    if let Some(output_path) = cli.output {
        fs::write(&output_path, &optimized)
            .with_context(|| format!("failed to write {}", output_path.display()))?;
        eprintln!("hoister: wrote {}", output_path.display());
    } else {
        print!("{}", optimized);
    }

    eprintln!("hoister: done");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_defaults() {
        let cli = Cli::parse_from(["hoister", "Main.java"]);
        assert_eq!(cli.input, PathBuf::from("Main.java"));
        assert!(cli.output.is_none());
        assert!(!cli.static_fields);
        assert!(!cli.verbose);
    }

    #[test]
    fn cli_parses_flags() {
        let cli = Cli::parse_from([
            "hoister",
            "in.java",
            "-o",
            "out.java",
            "--static-fields",
            "--verbose",
        ]);
        assert_eq!(cli.output, Some(PathBuf::from("out.java")));
        assert!(cli.static_fields);
        assert!(cli.verbose);
    }
}
