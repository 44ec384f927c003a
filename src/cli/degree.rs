/*
 * SPDX-FileCopyrightText: 2026 The heapgraph developers
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

use crate::cli::*;
use crate::prelude::*;
use anyhow::{Context, Result};
use clap::{ArgMatches, Args, Command, FromArgMatches};
use dsi_progress_logger::prelude::*;
use std::io::Write;
use std::sync::Arc;

pub const COMMAND_NAME: &str = "degree";

#[derive(Args, Debug)]
#[command(about = "Computes the (weighted) degree centrality of the nodes of a graph.", long_about = None)]
pub struct CliArgs {
    #[clap(flatten)]
    pub arcs: ArcsArgs,

    #[clap(flatten)]
    pub num_threads: NumThreadsArg,

    #[clap(flatten)]
    pub load: LoadArgs,

    #[arg(short, long, default_value = "outgoing")]
    /// The direction of the relationships to score: outgoing, incoming, or
    /// both.
    pub direction: Direction,

    #[clap(flatten)]
    pub output: OutputArgs,
}

pub fn cli(command: Command) -> Command {
    command.subcommand(CliArgs::augment_args(Command::new(COMMAND_NAME)).display_order(0))
}

pub fn main(submatches: &ArgMatches) -> Result<()> {
    let args = CliArgs::from_arg_matches(submatches)?;
    let arcs = read_arcs(&args.arcs)?;
    let num_threads = args.num_threads.num_threads;
    let pool = Arc::new(crate::thread_pool![num_threads]);
    let tracker = MemoryTracker::new(args.load.memory);

    let needs_inverse = args.direction != Direction::Outgoing
        && args.load.projection != Projection::Undirected
        && args.load.graph == GraphFactory::Compressed;
    if needs_inverse && !args.load.load_inverse {
        log::info!("Loading incoming relationships for direction {:?}", args.direction);
    }
    let loader = args
        .load
        .loader(&arcs.store, num_threads)
        .load_inverse(args.load.load_inverse || needs_inverse)
        .thread_pool(pool.clone())
        .tracker(tracker.clone());

    let mut pl = concurrent_progress_logger![item_name = "node"];
    let (graph, stats) = loader.load_with_logging(&mut pl)?;
    log::info!("Imported {stats}");

    let ctx = ExecutionContext::with_pool(pool, num_threads)?;
    let mut degree = DegreeCentrality::new(graph, ctx, &tracker)?;
    degree
        .direction(args.direction)
        .weighted(args.load.weighted)
        .compute_with_logging(&mut pl)?
        .release();
    let result = degree
        .result()
        .context("Degree centrality produced no result")?;

    let mut writer = args.output.writer()?;
    match args.output.format {
        OutputFormat::Ascii => {
            for (node, score) in result.iter().enumerate() {
                // Dense identifiers follow store order, which is the order of the names
                writeln!(writer, "{}\t{score}", arcs.names[node])?;
            }
        }
        OutputFormat::Json => {
            let scores = result
                .iter()
                .enumerate()
                .map(|(node, score)| serde_json::json!({ "node": arcs.names[node], "score": score }))
                .collect::<Vec<_>>();
            serde_json::to_writer_pretty(
                &mut writer,
                &serde_json::json!({
                    "status": result.status().to_string(),
                    "sum": result.sum(),
                    "max": result.max(),
                    "scores": scores,
                }),
            )?;
            writeln!(writer)?;
        }
    }
    writer.flush()?;
    Ok(())
}
