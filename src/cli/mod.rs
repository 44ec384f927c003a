/*
 * SPDX-FileCopyrightText: 2026 The heapgraph developers
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Command-line interface structs, functions, and methods.
//!
//! Each command is implemented as a submodule. Commands read graphs from
//! text files of arcs, which are loaded into a [`MemoryStore`] and then
//! imported like any other store.

use crate::graphs::GraphFactory;
use crate::import::{GraphLoader, Projection};
use crate::store::MemoryStore;
use crate::utils::MemoryBudget;
use anyhow::{anyhow, bail, ensure, Context, Result};
use clap::{Args, Command};
use jiff::fmt::friendly::{Designator, Spacing, SpanPrinter};
use jiff::SignedDuration;
use std::collections::HashMap;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::time::Instant;

pub mod degree;
pub mod stats;

/// The relationship type of the arcs read by [`read_arcs`].
pub const ARC_TYPE: &str = "ARC";
/// The relationship property holding the weight of an arc.
pub const WEIGHT_KEY: &str = "weight";

#[derive(Args, Debug)]
/// Shared CLI arguments for reading files containing arcs.
pub struct ArcsArgs {
    /// The file containing the arcs, one per line: a source, a target, and
    /// an optional weight. Use `-` to read from standard input.
    pub arcs: PathBuf,

    #[arg(long, default_value_t = '#')]
    /// Ignore lines that start with this symbol.
    pub line_comment_symbol: char,

    #[arg(long, default_value_t = '\t')]
    /// The column separator.
    pub separator: char,
}

/// Shared CLI arguments for commands that specify a number of threads.
#[derive(Args, Debug)]
pub struct NumThreadsArg {
    #[arg(short = 'j', long, default_value_t = rayon::current_num_threads().max(1))]
    /// The number of threads to use
    pub num_threads: usize,
}

/// Shared CLI arguments for loading a graph from arcs.
#[derive(Args, Debug)]
pub struct LoadArgs {
    #[arg(short, long, default_value_t = Projection::Natural)]
    /// How arcs become relationships: natural, reversed, or undirected.
    pub projection: Projection,

    #[arg(short, long)]
    /// Load the weights of the arcs.
    pub weighted: bool,

    #[arg(long, default_value_t = 1.0)]
    /// The weight of arcs without one.
    pub default_weight: f64,

    #[arg(short, long, value_parser = memory_budget_parser, default_value = "unlimited")]
    /// The memory budget of the import and of the computation. You can use
    /// the SI and NIST multipliers k, M, G, T, P, ki, Mi, Gi, Ti, and Pi,
    /// optionally followed by `B`. You can also use a percentage of the
    /// physical memory by appending a `%` to the number.
    pub memory: MemoryBudget,

    #[arg(long)]
    /// Also build the incoming relationships of directed projections.
    pub load_inverse: bool,

    #[arg(long, default_value = "compressed")]
    /// The graph representation: compressed, or view (relationships are
    /// read from the store at each visit).
    pub graph: GraphFactory,
}

impl LoadArgs {
    /// Returns a loader for the arcs in `store`, configured by these
    /// arguments.
    pub fn loader<'s>(
        &self,
        store: &'s MemoryStore,
        num_threads: usize,
    ) -> GraphLoader<'s, MemoryStore> {
        let loader = GraphLoader::new(store)
            .global_projection(self.projection)
            .concurrency(num_threads)
            .memory(self.memory)
            .load_inverse(self.load_inverse)
            .graph(self.graph);
        if self.weighted {
            loader.relationship_property(WEIGHT_KEY, self.default_weight)
        } else {
            loader
        }
    }
}

/// Output formats of results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Tab-separated text.
    Ascii,
    Json,
}

/// Shared CLI arguments for commands writing results.
#[derive(Args, Debug)]
pub struct OutputArgs {
    #[arg(value_enum, short, long, default_value = "ascii")]
    /// The output format.
    pub format: OutputFormat,

    #[arg(short, long)]
    /// The output file; results are written on standard output if missing.
    pub output: Option<PathBuf>,
}

impl OutputArgs {
    /// Opens the output, creating the parent directories of the output file.
    pub fn writer(&self) -> Result<Box<dyn Write>> {
        Ok(match &self.output {
            Some(path) => {
                if let Some(dir) = path.parent() {
                    std::fs::create_dir_all(dir)
                        .with_context(|| format!("Could not create {}", dir.display()))?;
                }
                let file = std::fs::File::create(path)
                    .with_context(|| format!("Could not create {}", path.display()))?;
                Box::new(std::io::BufWriter::new(file))
            }
            None => Box::new(std::io::BufWriter::new(std::io::stdout().lock())),
        })
    }
}

/// Arcs read from a text file, stored as relationships of type [`ARC_TYPE`].
#[derive(Debug)]
pub struct Arcs {
    pub store: MemoryStore,
    /// The name of each node of the store, indexed by node id.
    pub names: Vec<String>,
    /// The number of arcs with a weight.
    pub weighted: usize,
}

impl Arcs {
    /// Returns the name of the node with the given store id.
    pub fn name(&self, external: u64) -> &str {
        &self.names[external as usize]
    }
}

/// Reads arcs from a file, or from standard input if the path is `-`.
///
/// Nodes are named by the strings in the first two columns, and are created
/// in order of first appearance.
pub fn read_arcs(args: &ArcsArgs) -> Result<Arcs> {
    if args.arcs.as_os_str() == "-" {
        log::info!("Reading arcs from standard input");
        parse_arcs(std::io::stdin().lock(), args)
    } else {
        log::info!("Reading arcs from {}", args.arcs.display());
        let file = std::fs::File::open(&args.arcs)
            .with_context(|| format!("Could not open {}", args.arcs.display()))?;
        parse_arcs(BufReader::new(file), args)
    }
}

fn parse_arcs(reader: impl BufRead, args: &ArcsArgs) -> Result<Arcs> {
    let mut builder = MemoryStore::builder();
    let mut ids = HashMap::<String, u64>::new();
    let mut names = vec![];
    let mut weighted = 0;
    let mut count = 0;
    let mut node = |name: &str, builder: &mut crate::store::MemoryStoreBuilder| {
        *ids.entry(name.to_owned()).or_insert_with(|| {
            names.push(name.to_owned());
            builder.add_node(&[])
        })
    };

    for (line_num, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("Could not read line {}", line_num + 1))?;
        let line = line.trim();
        if line.is_empty() || line.starts_with(args.line_comment_symbol) {
            continue;
        }
        let columns = line.split(args.separator).map(str::trim).collect::<Vec<_>>();
        ensure!(
            columns.len() == 2 || columns.len() == 3,
            "Line {} has {} columns instead of two or three: {line:?}",
            line_num + 1,
            columns.len()
        );
        let source = node(columns[0], &mut builder);
        let target = node(columns[1], &mut builder);
        match columns.get(2) {
            Some(weight) => {
                let weight = weight.parse::<f64>().with_context(|| {
                    format!("Invalid weight {weight:?} on line {}", line_num + 1)
                })?;
                builder.add_relationship(source, target, ARC_TYPE, &[(WEIGHT_KEY, weight)])?;
                weighted += 1;
            }
            None => {
                builder.add_relationship(source, target, ARC_TYPE, &[])?;
            }
        }
        count += 1;
    }

    log::info!("Read {} nodes and {count} arcs ({weighted} weighted)", names.len());
    Ok(Arcs {
        store: builder.build(),
        names,
        weighted,
    })
}

/// Parses a memory budget.
///
/// This function accepts `unlimited`, a number of bytes (possibly followed
/// by a SI or NIST multiplier k, M, G, T, P, ki, Mi, Gi, Ti, or Pi, and by an
/// optional `B`), or a percentage (followed by a `%`) that is interpreted as
/// a percentage of the physical memory.
pub fn memory_budget_parser(arg: &str) -> Result<MemoryBudget> {
    const PREF_SYMS: [(&str, u64); 10] = [
        ("k", 1E3 as u64),
        ("m", 1E6 as u64),
        ("g", 1E9 as u64),
        ("t", 1E12 as u64),
        ("p", 1E15 as u64),
        ("ki", 1 << 10),
        ("mi", 1 << 20),
        ("gi", 1 << 30),
        ("ti", 1 << 40),
        ("pi", 1 << 50),
    ];
    let arg = arg.trim().to_ascii_lowercase();
    ensure!(!arg.is_empty(), "empty string");

    if arg == "unlimited" {
        return Ok(MemoryBudget::Unlimited);
    }

    if let Some(perc) = arg.strip_suffix('%') {
        let perc = perc.trim().parse::<f64>()?;
        ensure!((0.0..=100.0).contains(&perc), "percentage out of range");
        return Ok(MemoryBudget::from_perc(perc));
    }

    let arg = arg.strip_suffix('b').unwrap_or(&arg);
    let bytes = match arg.chars().position(|c| c.is_alphabetic()) {
        None => arg.parse::<u64>()?,
        Some(pos) => {
            let (num, pref_sym) = arg.split_at(pos);
            let multiplier = PREF_SYMS
                .iter()
                .find(|(x, _)| *x == pref_sym)
                .map(|(_, m)| m)
                .ok_or(anyhow!("invalid prefix symbol {pref_sym:?}"))?;
            num.trim()
                .parse::<u64>()?
                .checked_mul(*multiplier)
                .ok_or(anyhow!("memory budget too large"))?
        }
    };
    Ok(MemoryBudget::Bytes(bytes.try_into()?))
}

/// Initializes [`env_logger`] with the `info` level as default.
///
/// Each line starts with the local timestamp and the time elapsed since
/// initialization.
pub fn init_envlogger() -> Result<()> {
    let start = Instant::now();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(move |buf, record| {
            let style = buf.default_level_style(record.level());
            writeln!(
                buf,
                "{} +{} {style}{:<5}{style:#} {} - {}",
                jiff::Zoned::now().strftime("%F %T%.3f"),
                format_elapsed(start.elapsed()),
                record.level(),
                record.target(),
                record.args()
            )
        })
        .try_init()?;
    Ok(())
}

/// The entry point of the command-line interface.
pub fn main<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let start = Instant::now();

    let command = Command::new("heapgraph")
        .about("Imports graphs into compressed in-memory form and runs algorithms on them.")
        .version(env!("CARGO_PKG_VERSION"))
        .subcommand_required(true)
        .arg_required_else_help(true)
        .after_help(
            "Environment (noteworthy environment variables used):
RUST_LOG: configuration for env_logger, pass `info` to see the phases of the
  import, `debug` to see the details of each task. You can also use
  `RUST_LOG=heapgraph=debug` to see only the heapgraph logs.
",
        );

    let command = degree::cli(command);
    let command = stats::cli(command);
    let mut completion_command = command.clone();
    let matches = match command.try_get_matches_from(args) {
        Ok(matches) => matches,
        Err(err) if !err.use_stderr() => {
            // Help and version requests
            err.print()?;
            return Ok(());
        }
        Err(err) => return Err(err.into()),
    };

    match matches.subcommand() {
        Some((degree::COMMAND_NAME, sub_m)) => degree::main(sub_m)?,
        Some((stats::COMMAND_NAME, sub_m)) => stats::main(sub_m)?,
        Some((command_name, _)) => {
            completion_command.print_help()?;
            bail!("Unknown command: {command_name:?}");
        }
        None => {
            completion_command.print_help()?;
            return Ok(());
        }
    }

    log::info!("The command took {}", format_elapsed(start.elapsed()));

    Ok(())
}

/// Formats an elapsed time as a compact span, such as `1h2m3s45ms`.
fn format_elapsed(elapsed: std::time::Duration) -> String {
    match SignedDuration::try_from(elapsed).and_then(|d| d.round(jiff::Unit::Millisecond)) {
        Ok(elapsed) => SpanPrinter::new()
            .spacing(Spacing::None)
            .designator(Designator::Compact)
            .duration_to_string(&elapsed),
        Err(_) => format!("{:.3}s", elapsed.as_secs_f64()),
    }
}
