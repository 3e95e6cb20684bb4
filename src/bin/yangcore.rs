//! Command-line driver for yangcore.
//!
//! Exit codes: 0 success, 1 JSON/file problem, 2 data-model problem,
//! 3 validation failure.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use yangcore::validation::ValidationScope;
use yangcore::{ContentType, DataModel, Error, TreeOptions};

#[derive(Parser, Debug)]
#[command(name = "yangcore", version, about = "YANG data model tool")]
struct Cli {
    /// YANG-library file describing the data model
    yang_library: PathBuf,

    /// Module search directories
    #[arg(short = 'p', long = "path", value_delimiter = ':')]
    path: Vec<PathBuf>,

    /// Print the module-set id
    #[arg(long, group = "action")]
    id: bool,

    /// Print the schema as an ASCII tree
    #[arg(long, group = "action")]
    tree: bool,

    /// Omit types from the tree output
    #[arg(long, requires = "tree")]
    no_types: bool,

    /// Show validation counters in the tree output
    #[arg(long, requires = "tree")]
    val_count: bool,

    /// Print the schema digest as JSON
    #[arg(long, group = "action")]
    digest: bool,

    /// Validate an instance file
    #[arg(long, group = "action", value_name = "FILE")]
    validate: Option<PathBuf>,

    /// Validation scope (syntax, semantics, all)
    #[arg(long, default_value = "all")]
    scope: ValidationScopeArg,

    /// Content type (config, nonconfig, all)
    #[arg(long, default_value = "all")]
    ctype: ContentTypeArg,
}

#[derive(Clone, Debug)]
struct ValidationScopeArg(ValidationScope);

impl std::str::FromStr for ValidationScopeArg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(ValidationScopeArg)
    }
}

#[derive(Clone, Debug)]
struct ContentTypeArg(ContentType);

impl std::str::FromStr for ContentTypeArg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(ContentTypeArg)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let search_dirs = if cli.path.is_empty() {
        vec![PathBuf::from(".")]
    } else {
        cli.path.clone()
    };

    let model = match DataModel::from_file(&cli.yang_library, &search_dirs) {
        Ok(model) => model,
        Err(error) => return fail(&error),
    };

    if cli.id {
        println!("{}", model.module_set_id());
        return ExitCode::SUCCESS;
    }
    if cli.digest {
        match serde_json::to_string_pretty(&model.schema_digest()) {
            Ok(text) => println!("{text}"),
            Err(error) => return fail(&Error::Json(error)),
        }
        return ExitCode::SUCCESS;
    }
    if let Some(instance) = &cli.validate {
        let text = match std::fs::read_to_string(instance) {
            Ok(text) => text,
            Err(error) => {
                eprintln!("cannot read {}: {error}", instance.display());
                return ExitCode::from(1);
            }
        };
        let focus = match model.from_raw_str(&text) {
            Ok(focus) => focus,
            Err(error @ Error::Json(_)) => return fail(&error),
            Err(error) => {
                // Raw cooking failures are data problems of the instance.
                eprintln!("{error}");
                return ExitCode::from(3);
            }
        };
        if let Err(error) = model.validate(&focus, cli.scope.0, cli.ctype.0) {
            eprintln!("{error}");
            return ExitCode::from(3);
        }
        println!("OK");
        return ExitCode::SUCCESS;
    }

    // Default action (also --tree): print the schema tree.
    let options = TreeOptions {
        types: !cli.no_types,
        val_counts: cli.val_count,
    };
    print!("{}", model.ascii_tree(options));
    ExitCode::SUCCESS
}

fn fail(error: &Error) -> ExitCode {
    eprintln!("{error}");
    match error {
        Error::Json(_) | Error::Io { .. } => ExitCode::from(1),
        _ => ExitCode::from(2),
    }
}
