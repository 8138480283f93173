//! paramtree CLI - distribute parameters through a dispatcher tree

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use serde_json::json;

use paramtree::{
    params, AppliedValue, BuiltTree, FixSuggestion, ParamError, ParamMap, ParameterStore,
    TreeConfig,
};

/// Exit status when a strict run leaves parameters unresolved
const EXIT_UNRESOLVED: i32 = 2;

#[derive(Parser)]
#[command(name = "paramtree")]
#[command(about = "Route named parameters through a tree of typed setters")]
#[command(version)]
struct Cli {
    /// Verbose logging (debug level)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit parameters to a tree and report where they went
    Run {
        /// Path to the tree description (YAML)
        tree: PathBuf,

        /// Properties file(s) with key=value lines; later files win
        #[arg(short, long = "params")]
        params: Vec<PathBuf>,

        /// Inline key=value assignment, applied after the files
        #[arg(short, long = "set")]
        set: Vec<String>,

        /// Fail when any parameter stays unresolved (also PARAMTREE_STRICT=1)
        #[arg(long)]
        strict: bool,

        /// Submit to this node instead of the tree root
        #[arg(long)]
        node: Option<String>,

        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// List every parameter name a subtree can bind
    Names {
        tree: PathBuf,

        #[arg(long)]
        node: Option<String>,
    },

    /// Parse and validate a tree description
    Validate { tree: PathBuf },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

fn main() {
    // Load .env file (ignore if not present)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Run {
            tree,
            params,
            set,
            strict,
            node,
            format,
        } => run(&tree, &params, &set, strict || strict_from_env(), node.as_deref(), format),
        Commands::Names { tree, node } => names(&tree, node.as_deref()),
        Commands::Validate { tree } => validate(&tree),
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        if let Some(suggestion) = e.fix_suggestion() {
            eprintln!("  {} {}", "Fix:".yellow(), suggestion);
        }
        let code = match e {
            ParamError::UnresolvedParameters { .. } => EXIT_UNRESOLVED,
            _ => 1,
        };
        std::process::exit(code);
    }
}

fn strict_from_env() -> bool {
    std::env::var("PARAMTREE_STRICT")
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

fn load_tree(path: &Path) -> Result<BuiltTree, ParamError> {
    TreeConfig::load(path)?.build()
}

/// Properties files in order, then --set assignments
fn collect_params(files: &[PathBuf], assignments: &[String]) -> Result<ParamMap, ParamError> {
    let mut store = ParameterStore::new();
    for file in files {
        store.extend(ParameterStore::from_properties_file(file)?.into_map());
    }
    for arg in assignments {
        let (key, value) = params::parse_assignment(arg)?;
        store.set(key, value);
    }
    Ok(store.into_map())
}

fn run(
    tree_path: &Path,
    files: &[PathBuf],
    assignments: &[String],
    strict: bool,
    node: Option<&str>,
    format: OutputFormat,
) -> Result<(), ParamError> {
    let mut built = load_tree(tree_path)?;
    let values = collect_params(files, assignments)?;
    let target = match node {
        Some(id) => built.node(id)?,
        None => built.root,
    };

    // Late links may still resolve names, so strictness is checked afterwards
    built.tree.submit(target, &values, false)?;
    built.attach_late()?;

    let owner = built.tree.owner(target)?.to_string();
    let unresolved = built.tree.unresolved(target)?.clone();
    let applied = built.log.entries();

    match format {
        OutputFormat::Json => {
            let report = json!({
                "node": owner,
                "submitted": values.len(),
                "applied": applied,
                "unresolved": unresolved,
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Text => print_report(&owner, values.len(), &applied, &unresolved),
    }

    if strict && !unresolved.is_empty() {
        return Err(ParamError::UnresolvedParameters {
            names: unresolved,
            handled: built.tree.list_handled_names(target)?,
        });
    }
    Ok(())
}

fn print_report(owner: &str, submitted: usize, applied: &[AppliedValue], unresolved: &BTreeSet<String>) {
    println!(
        "{} Submitted {} parameters to '{}'",
        "→".cyan(),
        submitted,
        owner.cyan().bold()
    );
    for entry in applied {
        println!("  {}.{} = {}", entry.node, entry.name.bold(), entry.value);
    }

    if unresolved.is_empty() {
        println!("{} All parameters resolved", "✓".green());
    } else {
        let names: Vec<&str> = unresolved.iter().map(String::as_str).collect();
        println!("{} Unresolved: {}", "⚠".yellow(), names.join(", "));
    }
}

fn names(tree_path: &Path, node: Option<&str>) -> Result<(), ParamError> {
    let built = load_tree(tree_path)?;
    let target = match node {
        Some(id) => built.node(id)?,
        None => built.root,
    };

    for name in built.tree.list_handled_names(target)? {
        println!("{name}");
    }
    Ok(())
}

fn validate(tree_path: &Path) -> Result<(), ParamError> {
    let config = TreeConfig::load(tree_path)?;
    let built = config.build()?;

    println!("{} Tree '{}' is valid", "✓".green(), tree_path.display());
    println!("  Root: {}", config.root);
    println!("  Nodes: {}", config.nodes.len());
    println!("  Links: {} ({} late)", config.links.len(), built.late.len());
    for (node, name, kind) in config.unsupported_kinds() {
        println!(
            "  {} {}.{}: kind '{}' is not supported and will fail when applied",
            "⚠".yellow(),
            node,
            name,
            kind
        );
    }
    Ok(())
}
