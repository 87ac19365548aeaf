//! Run one analysis job from a JSON file and print the results as JSON.
//!
//! Usage: `frame-run <job.json> [output.json]`
//!
//! The job holds a model and the analysis options:
//! `{ "model": { ... }, "options": { "analysis_type": "Modal", "num_modes": 6 } }`.
//! With `"cases": [...]` the same analysis is run for each listed case.

use std::fs;

use anyhow::{bail, Context, Result};
use frame_solver::analysis::AnalysisOptions;
use frame_solver::FEModel;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct Job {
    model: FEModel,
    #[serde(default)]
    options: AnalysisOptions,
    /// Load cases to run with the same options
    #[serde(default)]
    cases: Vec<String>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().collect();
    let Some(input) = args.get(1) else {
        bail!("usage: {} <job.json> [output.json]", args[0]);
    };

    let text = fs::read_to_string(input).with_context(|| format!("reading {}", input))?;
    let job: Job = serde_json::from_str(&text).with_context(|| format!("parsing {}", input))?;
    log::info!(
        "Loaded '{}': {} nodes, {} elements",
        input,
        job.model.nodes.len(),
        job.model.elements.len()
    );

    let output = if job.cases.is_empty() {
        let result = job.model.analyze(&job.options)?;
        serde_json::to_string_pretty(&result)?
    } else {
        let mut failed = 0;
        let results: serde_json::Map<String, serde_json::Value> = job
            .model
            .analyze_cases(&job.cases, &job.options)
            .into_iter()
            .map(|(case, result)| {
                let value = match result {
                    Ok(result) => serde_json::to_value(result),
                    Err(err) => {
                        failed += 1;
                        Ok(serde_json::json!({ "error": err.to_string() }))
                    }
                };
                value.map(|v| (case, v))
            })
            .collect::<Result<_, _>>()?;
        if failed > 0 {
            log::warn!("{} of {} cases failed", failed, job.cases.len());
        }
        serde_json::to_string_pretty(&results)?
    };

    match args.get(2) {
        Some(path) => fs::write(path, output).with_context(|| format!("writing {}", path))?,
        None => println!("{}", output),
    }
    Ok(())
}
