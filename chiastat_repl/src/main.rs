use std::{borrow::Cow, ops::Range};

use anyhow::bail;
use chiastat::{
    ir::{self, IrError, PrintConfig},
    runtime::{run_program, Cost, Reduction, RunConfig},
    SerializedProgram, Value,
};
use clap::{Parser, ValueEnum};
use codesnake::{Block, CodeWidth, Label, LineIndex};
use tracing::debug;
use tracing_subscriber::EnvFilter;
use yansi::Paint;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Input {
    /// `program [args]` in the textual IR
    Ir,
    /// `program [args]` as hex-encoded serialized values
    Hex,
}

/// Evaluates CLVM programs line by line
#[derive(Debug, Parser)]
#[command(version)]
struct Args {
    /// Abort evaluation once this much cost has been spent
    #[arg(long)]
    max_cost: Option<Cost>,
    #[arg(long, value_enum, default_value_t = Input::Ir)]
    input: Input,
    /// Print operator atoms as numbers instead of keywords
    #[arg(long)]
    no_keywords: bool,
    /// Print every atom as hex
    #[arg(long)]
    hex_only: bool,
    /// Print lists as dotted pairs
    #[arg(long)]
    dotted: bool,
    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "warn")]
    log: String,
}

impl Args {
    fn print_config(&self) -> PrintConfig {
        PrintConfig {
            keywords: !self.no_keywords,
            only_hex: self.hex_only,
            compact_lists: !self.dotted,
            nil: Cow::Borrowed("()"),
            max_depth: None,
        }
    }

    fn run_config(&self) -> RunConfig {
        RunConfig {
            max_cost: self.max_cost,
        }
    }
}

/// Widens `offset` to the character under it, or the last one at end of input
fn error_span(src: &str, offset: usize) -> Option<Range<usize>> {
    let offset = offset.min(src.len());
    match src[offset..].chars().next() {
        Some(ch) => Some(offset..offset + ch.len_utf8()),
        None => src[..offset]
            .char_indices()
            .last()
            .map(|(start, ch)| start..start + ch.len_utf8()),
    }
}

fn make_block<'a>(
    idx: &'a LineIndex,
    span: Range<usize>,
    err: &IrError,
) -> Option<Block<&'a str, String>> {
    Block::new(
        idx,
        [Label::new(span)
            .with_text(err.to_string().red().to_string())
            .with_style(|s| s.red().to_string())],
    )
}

fn report_ir_error(src: &str, err: &IrError) {
    let idx = LineIndex::new(src);
    let block = error_span(src, err.offset())
        .and_then(|span| make_block(&idx, span, err))
        .map(|blk| blk.map_code(|c| CodeWidth::new(c, c.len())));
    match block {
        Some(block) => {
            println!("{}[input]", block.prologue());
            print!("{block}");
            println!("{}", block.epilogue());
        }
        None => println!("{}", err.red()),
    }
}

fn read_hex(src: &str) -> anyhow::Result<(Value, Value)> {
    let mut words = src.split_whitespace();
    let Some(program) = words.next() else {
        bail!("expected a hex-encoded program");
    };
    let program = SerializedProgram::from_hex(program)?.root().clone();
    let args = match words.next() {
        Some(args) => SerializedProgram::from_hex(args)?.root().clone(),
        None => Value::NIL,
    };
    if words.next().is_some() {
        bail!("expected at most a program and its arguments");
    }
    Ok((program, args))
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&args.log))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let print_config = args.print_config();
    let run_config = args.run_config();
    let mut readline = rustyline::DefaultEditor::new()?;

    while let Ok(input) = readline.readline(">> ") {
        let src = input.trim();
        if src.is_empty() {
            continue;
        }
        readline.add_history_entry(src)?;

        let (program, env) = match args.input {
            Input::Ir => match ir::parse_one_or_two(src) {
                Ok(parsed) => parsed,
                Err(err) => {
                    report_ir_error(src, &err);
                    continue;
                }
            },
            Input::Hex => match read_hex(src) {
                Ok(parsed) => parsed,
                Err(err) => {
                    println!("{}", err.red());
                    continue;
                }
            },
        };
        debug!(program = %program, "evaluating");

        match run_program(&program, &env, &run_config) {
            Ok(Reduction { cost, value }) => {
                println!("cost = {cost}");
                println!("{}", ir::display(&value, &print_config));
            }
            Err(err) => println!("{}", err.red()),
        }
    }

    Ok(())
}
