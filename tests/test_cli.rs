/*
 * SPDX-FileCopyrightText: 2026 The heapgraph developers
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

#![cfg(feature = "cli")]

use anyhow::Result;
use heapgraph::cli::main as cli_main;
use std::path::Path;

fn write_arcs(dir: &Path) -> Result<String> {
    let path = dir.join("arcs.tsv");
    std::fs::write(
        &path,
        "# source\ttarget\tweight\nA\tB\t0.5\nA\tC\t0\nB\tC\nC\tD\t3\n",
    )?;
    Ok(path.to_string_lossy().into_owned())
}

#[test]
fn test_degree_ascii() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let arcs = write_arcs(dir.path())?;
    let output = dir.path().join("out").join("degree.tsv");
    cli_main([
        "heapgraph",
        "degree",
        &arcs,
        "-j",
        "2",
        "--output",
        &output.to_string_lossy(),
    ])?;
    let text = std::fs::read_to_string(&output)?;
    assert_eq!(text, "A\t2\nB\t1\nC\t1\nD\t0\n");
    Ok(())
}

#[test]
fn test_weighted_incoming_degree_json() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let arcs = write_arcs(dir.path())?;
    let output = dir.path().join("degree.json");
    cli_main([
        "heapgraph",
        "degree",
        &arcs,
        "--weighted",
        "--default-weight",
        "2",
        "--direction",
        "incoming",
        "--format",
        "json",
        "--memory",
        "16MiB",
        "-o",
        &output.to_string_lossy(),
    ])?;
    let json: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&output)?)?;
    assert_eq!(json["status"], "completed");
    let scores = json["scores"]
        .as_array()
        .unwrap()
        .iter()
        .map(|entry| {
            (
                entry["node"].as_str().unwrap().to_owned(),
                entry["score"].as_f64().unwrap(),
            )
        })
        .collect::<Vec<_>>();
    assert_eq!(
        scores,
        vec![
            ("A".to_owned(), 0.0),
            ("B".to_owned(), 0.5),
            ("C".to_owned(), 2.0),
            ("D".to_owned(), 3.0),
        ]
    );
    Ok(())
}

#[test]
fn test_stats_json() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let arcs = write_arcs(dir.path())?;
    let output = dir.path().join("stats.json");
    cli_main([
        "heapgraph",
        "stats",
        &arcs,
        "--projection",
        "undirected",
        "--graph",
        "view",
        "--format",
        "json",
        "--output",
        &output.to_string_lossy(),
    ])?;
    let json: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&output)?)?;
    assert_eq!(json["import"]["node_count"], 4);
    assert_eq!(json["relationships"], 8);
    assert_eq!(json["undirected"], true);
    assert_eq!(json["weighted_arcs"], 3);
    assert_eq!(json["max_out_degree"], 3);
    Ok(())
}

#[test]
fn test_errors() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let arcs = write_arcs(dir.path())?;
    assert!(cli_main(["heapgraph", "degree", "missing.tsv"]).is_err());
    assert!(cli_main(["heapgraph", "degree", &arcs, "--memory", "12q"]).is_err());
    assert!(cli_main(["heapgraph", "degree", &arcs, "--memory", "64"]).is_err());
    assert!(cli_main(["heapgraph", "stats", &arcs, "--projection", "sideways"]).is_err());
    Ok(())
}
