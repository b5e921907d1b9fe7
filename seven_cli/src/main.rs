use clap::{Args, Parser, Subcommand};
use serde_json::Value;
use seven_core::PolicyCatalog;
use std::error::Error;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "seven", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Args)]
struct ManifestArgs {
    /// Policy manifest (TOML, or JSON with a .json extension)
    #[arg(long)]
    manifest: PathBuf,
}

impl ManifestArgs {
    fn load(&self) -> Result<PolicyCatalog, Box<dyn Error + Send + Sync>> {
        let catalog = PolicyCatalog::load(&self.manifest)?;
        info!(manifest = %self.manifest.display(), classes = catalog.len(), "loaded manifest");
        Ok(catalog)
    }
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print the abilities a class grants an actor over a subject
    Abilities {
        #[command(flatten)]
        manifest: ManifestArgs,

        /// Policy class name
        #[arg(long)]
        class: String,

        /// JSON actor; omit to evaluate without one
        #[arg(long)]
        actor: Option<String>,

        /// JSON subject
        #[arg(long)]
        subject: String,
    },
    /// List the rules a class evaluates, ancestors first
    Rules {
        #[command(flatten)]
        manifest: ManifestArgs,

        /// Policy class name
        #[arg(long)]
        class: String,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(output) => println!("{}", output),
        Err(e) => {
            error!("{}", e);
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

fn run(cli: Cli) -> Result<String, Box<dyn Error + Send + Sync>> {
    match cli.command {
        Commands::Abilities {
            manifest,
            class,
            actor,
            subject,
        } => {
            let catalog = manifest.load()?;
            let actor = actor.as_deref().map(parse_json).transpose()?;
            let subject = parse_json(&subject)?;
            let granted = catalog.class(&class)?.abilities_for(actor.as_ref(), &subject)?;
            Ok(serde_json::to_string(&granted)?)
        }
        Commands::Rules { manifest, class } => {
            let catalog = manifest.load()?;
            let class = catalog.class(&class)?;
            let mut lines = Vec::new();
            for ancestor in class.ancestors() {
                for (index, rule) in ancestor.rules().iter().enumerate() {
                    lines.push(format!("{}[{}]: {}", ancestor, index, rule.guard()));
                }
            }
            if lines.is_empty() {
                Ok(format!("{} has no rules.", class))
            } else {
                Ok(lines.join("\n"))
            }
        }
    }
}

fn parse_json(input: &str) -> Result<Value, Box<dyn Error + Send + Sync>> {
    serde_json::from_str(input).map_err(|e| format!("Invalid JSON `{}`: {}", input, e).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const MANIFEST: &str = r#"
        [[class]]
        name = "topic"

        [[class.rules]]
        abilities = ["read_topics"]

        [[class.rules]]
        check = "role"
        equal = "admin"
        abilities = ["edit_topic"]

        [[class]]
        name = "empty"
    "#;

    fn manifest_file() -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(MANIFEST.as_bytes()).unwrap();
        file
    }

    fn cli(file: &NamedTempFile, args: &[&str]) -> Cli {
        let manifest = file.path().to_str().unwrap();
        let mut argv = vec!["seven"];
        argv.extend_from_slice(args);
        argv.extend(["--manifest", manifest]);
        Cli::parse_from(argv)
    }

    #[test]
    fn test_abilities_command() {
        let file = manifest_file();

        let output = run(cli(
            &file,
            &["abilities", "--class", "topic", "--actor", r#"{"role":"admin"}"#, "--subject", "{}"],
        ))
        .unwrap();
        assert_eq!(output, r#"["read_topics","edit_topic"]"#);

        let output = run(cli(&file, &["abilities", "--class", "topic", "--subject", "{}"])).unwrap();
        assert_eq!(output, r#"["read_topics"]"#);
    }

    #[test]
    fn test_rules_command() {
        let file = manifest_file();

        let output = run(cli(&file, &["rules", "--class", "topic"])).unwrap();
        assert_eq!(output, "topic[0]: always\ntopic[1]: role == \"admin\"");

        let output = run(cli(&file, &["rules", "--class", "empty"])).unwrap();
        assert_eq!(output, "empty has no rules.");
    }

    #[test]
    fn test_errors() {
        let file = manifest_file();

        assert!(run(cli(&file, &["rules", "--class", "missing"])).is_err());
        assert!(run(cli(&file, &["abilities", "--class", "topic", "--subject", "{"])).is_err());
    }

    #[test]
    fn test_manifest_is_required() {
        let err = Cli::try_parse_from(["seven", "rules", "--class", "topic"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn test_missing_manifest_names_the_path() {
        let cli = Cli::parse_from([
            "seven",
            "rules",
            "--class",
            "topic",
            "--manifest",
            "/nonexistent/policies.toml",
        ]);
        let err = run(cli).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/policies.toml"));
    }
}
