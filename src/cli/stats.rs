/*
 * SPDX-FileCopyrightText: 2026 The heapgraph developers
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

use crate::cli::*;
use crate::prelude::*;
use anyhow::Result;
use clap::{ArgMatches, Args, Command, FromArgMatches};
use dsi_progress_logger::prelude::*;
use std::io::Write;

pub const COMMAND_NAME: &str = "stats";

#[derive(Args, Debug)]
#[command(about = "Imports a graph and prints statistics about the import.", long_about = None)]
pub struct CliArgs {
    #[clap(flatten)]
    pub arcs: ArcsArgs,

    #[clap(flatten)]
    pub num_threads: NumThreadsArg,

    #[clap(flatten)]
    pub load: LoadArgs,

    #[clap(flatten)]
    pub output: OutputArgs,
}

/// Statistics about an imported graph.
#[derive(Debug, serde::Serialize)]
struct GraphStats<'a> {
    import: &'a ImportStats,
    relationships: u64,
    undirected: bool,
    weighted: bool,
    weighted_arcs: usize,
    max_out_degree: u32,
}

pub fn cli(command: Command) -> Command {
    command.subcommand(CliArgs::augment_args(Command::new(COMMAND_NAME)).display_order(0))
}

pub fn main(submatches: &ArgMatches) -> Result<()> {
    let args = CliArgs::from_arg_matches(submatches)?;
    let arcs = read_arcs(&args.arcs)?;
    let loader = args.load.loader(&arcs.store, args.num_threads.num_threads);

    let mut pl = concurrent_progress_logger![item_name = "node"];
    let (graph, import) = loader.load_with_logging(&mut pl)?;

    let mut max_out_degree = 0;
    for node in 0..graph.node_count() {
        max_out_degree = max_out_degree.max(graph.degree(node, Direction::Outgoing)?);
    }
    let stats = GraphStats {
        import: &import,
        relationships: graph.relationship_count(),
        undirected: graph.is_undirected(),
        weighted: graph.has_relationship_property(),
        weighted_arcs: arcs.weighted,
        max_out_degree,
    };

    let mut writer = args.output.writer()?;
    match args.output.format {
        OutputFormat::Ascii => {
            writeln!(writer, "nodes\t{}", stats.import.node_count)?;
            for (name, count) in &stats.import.relationship_counts {
                writeln!(writer, "records[{name}]\t{count}")?;
            }
            writeln!(writer, "relationships\t{}", stats.relationships)?;
            writeln!(writer, "undirected\t{}", stats.undirected)?;
            writeln!(writer, "weighted\t{}", stats.weighted)?;
            writeln!(writer, "weighted_arcs\t{}", stats.weighted_arcs)?;
            writeln!(writer, "max_out_degree\t{}", stats.max_out_degree)?;
            writeln!(writer, "tracked_bytes\t{}", stats.import.tracked_bytes)?;
            writeln!(writer, "elapsed\t{:.3}s", stats.import.elapsed.as_secs_f64())?;
        }
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut writer, &stats)?;
            writeln!(writer)?;
        }
    }
    writer.flush()?;
    Ok(())
}
