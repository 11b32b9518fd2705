// CLI command handlers
use anyhow::{Context, Result};
use chblift_core::config::{validate_config, LiftConfig, ProvenanceMode};
use chblift_core::lifter::ast::AbstractSyntaxTree;
use chblift_core::lifter::pipeline::{AstLevel, FunctionLifter, FunctionRecord, LiftStats, ProgramRecord};
use chblift_core::lifter::LiftedFunction;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::{Path, PathBuf};

pub struct LiftOptions {
    pub input: PathBuf,
    pub function: Option<String>,
    pub level: AstLevel,
    pub output_dir: Option<PathBuf>,
    pub config: Option<PathBuf>,
}

fn read_ast(path: &Path) -> Result<AbstractSyntaxTree> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read AST file: {}", path.display()))?;
    AbstractSyntaxTree::from_json(&text)
        .with_context(|| format!("Failed to parse AST file: {}", path.display()))
}

pub fn render_ast(path: &Path, provenance: bool) -> Result<()> {
    let tree = read_ast(path)?;
    let mode = if provenance {
        ProvenanceMode::Optional
    } else {
        ProvenanceMode::Omit
    };
    let text = tree.to_c_like_with(mode).context("Failed to render AST")?;
    println!("{}", text);
    Ok(())
}

pub fn print_duplicates(path: &Path) -> Result<()> {
    let tree = read_ast(path)?;
    if tree.cache().has_duplicates() {
        println!("Duplicate node ids:{}", tree.format_duplicates());
    } else {
        println!("No duplicate node ids in {}", path.display());
    }
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<LiftConfig> {
    let config = match path {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            LiftConfig::from_json(&text)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        }
        None => LiftConfig::default(),
    };
    validate_config(&config).map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;
    Ok(config)
}

fn write_ast(dir: &Path, lifted: &LiftedFunction, level: AstLevel) -> Result<()> {
    let path = dir.join(format!("{}.ast.json", lifted.name));
    let json = serde_json::to_string_pretty(&lifted.to_ast_record(level))
        .context("Failed to serialize AST")?;
    fs::write(&path, json).with_context(|| format!("Failed to write {}", path.display()))
}

fn create_progress_bar(len: u64) -> Result<ProgressBar> {
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::with_template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("=>-"),
    );
    Ok(pb)
}

pub fn lift_program(options: &LiftOptions) -> Result<()> {
    let config = load_config(options.config.as_deref())?;
    let text = fs::read_to_string(&options.input)
        .with_context(|| format!("Failed to read program file: {}", options.input.display()))?;
    let program = ProgramRecord::from_json(&text)?;

    let functions: Vec<&FunctionRecord> = match &options.function {
        Some(name) => {
            let selected: Vec<&FunctionRecord> =
                program.functions.iter().filter(|f| &f.name == name).collect();
            if selected.is_empty() {
                anyhow::bail!("Function '{}' not found in {}", name, options.input.display());
            }
            selected
        }
        None => program.functions.iter().collect(),
    };
    if let Some(dir) = &options.output_dir {
        fs::create_dir_all(dir).context("Failed to create output directory")?;
    }

    let lifter = FunctionLifter::for_program(config, &program);
    let pb = create_progress_bar(functions.len() as u64)?;
    let mut stats = LiftStats::default();
    let mut rendered: Vec<String> = Vec::with_capacity(functions.len());

    for function in functions {
        pb.set_message(function.name.clone());
        let result = lifter.lift_function(function);
        stats.record(function, &result);
        if let Ok(lifted) = result {
            let body = lifted
                .to_c_like(options.level, lifter.config().provenance)
                .with_context(|| format!("Failed to render {}", lifted.name))?;
            rendered.push(format!("// {} @ {} ({})\n{}", lifted.name, lifted.address, options.level, body));
            if let Some(dir) = &options.output_dir {
                write_ast(dir, &lifted, options.level)?;
            }
        }
        pb.inc(1);
    }
    pb.finish_with_message("Lifting complete");

    for text in &rendered {
        println!("{}\n", text);
    }
    println!("{}", stats);
    for failure in &stats.failures {
        println!("  {}: {}", failure.name, failure.error);
    }
    Ok(())
}
