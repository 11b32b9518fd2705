// CLI application
use chblift_core::lifter::pipeline::AstLevel;
use clap::Parser;
use std::path::PathBuf;

mod commands;

use commands::{lift_program, print_duplicates, render_ast, LiftOptions};

#[derive(Parser)]
#[command(name = "chblift")]
#[command(about = "Lift analyzed ARM functions to C-like ASTs")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Render an AST JSON file as C-like text
    Render {
        /// Path to the AST JSON file
        #[arg(short, long)]
        ast: PathBuf,

        /// Leave out the `// id (span)` comments
        #[arg(long)]
        no_provenance: bool,
    },
    /// Report duplicate node ids in an AST JSON file
    Duplicates {
        /// Path to the AST JSON file
        #[arg(short, long)]
        ast: PathBuf,
    },
    /// Lift the functions of an analyzed program
    Lift {
        /// Path to the program JSON file
        #[arg(short, long)]
        input: PathBuf,

        /// Only lift the function with this name
        #[arg(short, long)]
        function: Option<String>,

        /// AST to print and export (high or low)
        #[arg(short, long, default_value = "high")]
        level: AstLevel,

        /// Write `<name>.ast.json` for every lifted function into this directory
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Lifter configuration JSON
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Render { ast, no_provenance } => render_ast(&ast, !no_provenance)?,
        Commands::Duplicates { ast } => print_duplicates(&ast)?,
        Commands::Lift {
            input,
            function,
            level,
            output_dir,
            config,
        } => lift_program(&LiftOptions {
            input,
            function,
            level,
            output_dir,
            config,
        })?,
    }

    Ok(())
}
