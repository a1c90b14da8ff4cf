//! Interactive CLI driver: accepts a container path, lists its classes,
//! prompts for a class name (substring match, first hit), then a method
//! index or `*` for all, and prints the rendered source. Mirrors the
//! original tool's interactive prompt loop; the heavy lifting (CFG
//! construction, dataflow, structuring) all happens in
//! `dalvik_decompiler_core` — this binary is the thin external collaborator
//! named out of the core's scope in §1.

mod container_source;

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use clap::Parser;
use dalvik_decompiler_core::class::ClassDecl;
use dalvik_decompiler_core::orchestrator::ClassDecompiler;
use dalvik_decompiler_core::writer::JavaTextWriter;
use dalvik_decompiler_core::Config;
use indicatif::{ProgressBar, ProgressStyle};

#[derive(Parser)]
#[command(name = "dad")]
#[command(about = "Interactive Dalvik-to-Java method decompiler")]
#[command(version)]
struct Cli {
    /// Path to a container file (JSON; see container_source for the schema)
    container: PathBuf,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    let pb = create_progress_bar("Loading container...");
    let container = container_source::load_container(&cli.container)?;
    pb.finish_with_message(format!("Loaded {} class(es)", container.len()));

    if container.is_empty() {
        println!("Container has no classes.");
        return Ok(());
    }

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    println!("Classes:");
    for name in container.sorted_names() {
        println!("  {name}");
    }

    print!("Class name (substring match): ");
    io::stdout().flush()?;
    let Some(needle) = next_line(&mut lines)? else {
        return Ok(());
    };

    let Some(class) = container.find_class(needle.trim()) else {
        println!("No class matching {:?}", needle.trim());
        return Ok(());
    };

    print_methods(class);

    print!("Method index, or * for all: ");
    io::stdout().flush()?;
    let Some(choice) = next_line(&mut lines)? else {
        return Ok(());
    };
    let choice = choice.trim();

    let config = Config::default();
    let writer = JavaTextWriter;
    let decompiler = ClassDecompiler::new(&writer, &config);

    if choice == "*" {
        let result = decompiler.process(class);
        let sources: Vec<String> = result.methods.iter().map(|m| m.source_text.clone()).collect();
        println!("{}", dalvik_decompiler_core::writer::render_class_source(class, &sources));
    } else {
        let index: usize = match choice.parse() {
            Ok(i) => i,
            Err(_) => {
                println!("Not a valid index: {choice:?}");
                return Ok(());
            }
        };
        let Some(method) = class.methods.get(index) else {
            println!("No method at index {index}");
            return Ok(());
        };
        let result = decompiler.process_method(class, method);
        for warning in &result.warnings {
            eprintln!("warning: {warning}");
        }
        println!("{}", result.source_text);
    }

    Ok(())
}

fn print_methods(class: &ClassDecl) {
    println!("Methods of {}:", class.dotted_name);
    for (i, method) in class.methods.iter().enumerate() {
        println!("  [{i}] {}{}", method.name, method.descriptor);
    }
}

fn next_line(lines: &mut io::Lines<io::StdinLock<'static>>) -> anyhow::Result<Option<String>> {
    match lines.next() {
        Some(line) => Ok(Some(line?)),
        None => Ok(None),
    }
}

fn create_progress_bar(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap()
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    pb.set_message(message.to_string());
    pb
}
