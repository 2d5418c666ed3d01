//! JSON persistence of run results.
//!
//! Layout under the output root:
//!
//! ```text
//! <root>/<strategy>_n<population>_e<episodes>_i<iterations>_t<tests>/
//!     infected.json  isolated.json  healthy_free.json
//!     sick_free.json sick_isolated.json healthy_isolated.json
//!     run.json       (configuration, seeds, status, summaries)
//!     traces.json    (only when per-step traces were recorded)
//! ```
//!
//! Identical configurations always map to the same directory.

use crate::aggregate::{DistributionSummary, RunResults};

use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracenet_core::{PopulationCounts, Result, SimConfig, SimError};
use tracing::info;

/// Run metadata written next to the sequences.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunExport {
    /// Configuration the run used
    pub config: SimConfig,

    /// Master seed actually used (drawn from entropy if none was configured)
    pub master_seed: u64,

    pub requested_episodes: usize,
    pub completed_episodes: usize,
    pub stopped_early: bool,

    /// Per-episode seeds, for replaying a single episode
    pub episode_seeds: Vec<u64>,

    pub summary: DistributionSummary,
}

impl RunExport {
    pub fn new(config: &SimConfig, results: &RunResults) -> Self {
        Self {
            config: config.clone(),
            master_seed: results.master_seed,
            requested_episodes: results.requested_episodes,
            completed_episodes: results.completed_episodes(),
            stopped_early: results.stopped_early,
            episode_seeds: results.episode_seeds.clone(),
            summary: results.distributions.summary(),
        }
    }
}

/// Directory name for a configuration.
pub fn run_dir_name(config: &SimConfig) -> String {
    format!(
        "{}_n{}_e{}_i{}_t{}",
        config.strategy.letter(),
        config.population,
        config.episodes,
        config.iterations,
        config.test_capacity
    )
}

/// Results directory for `config` under `root`.
pub fn run_dir(root: &Path, config: &SimConfig) -> PathBuf {
    root.join(run_dir_name(config))
}

/// Creates the results directory.
///
/// Called before any episode runs so that an unusable location is reported
/// before there are results to lose.
pub fn prepare_run_dir(root: &Path, config: &SimConfig) -> Result<PathBuf> {
    let dir = run_dir(root, config);
    fs::create_dir_all(&dir).map_err(|e| SimError::output(&dir, e))?;
    Ok(dir)
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let file = File::create(path).map_err(|e| SimError::output(path, e))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value).map_err(SimError::serialization)?;
    writer.flush().map_err(|e| SimError::output(path, e))?;
    Ok(())
}

/// Writes every sequence, the metadata file and any traces into `dir`.
pub fn write_results(dir: &Path, config: &SimConfig, results: &RunResults) -> Result<()> {
    for (name, values) in results.distributions.series() {
        write_json(&dir.join(format!("{name}.json")), values)?;
    }

    write_json(&dir.join("run.json"), &RunExport::new(config, results))?;

    if !results.traces.is_empty() {
        let traces: &[Vec<PopulationCounts>] = &results.traces;
        write_json(&dir.join("traces.json"), traces)?;
    }

    info!(
        "Wrote {} episodes to {}",
        results.completed_episodes(),
        dir.display()
    );
    Ok(())
}

/// Reads one persisted sequence back.
pub fn read_series(dir: &Path, name: &str) -> Result<Vec<usize>> {
    let path = dir.join(format!("{name}.json"));
    let bytes = fs::read(&path).map_err(|e| SimError::output(&path, e))?;
    serde_json::from_slice(&bytes).map_err(SimError::serialization)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::RunAggregator;
    use tracenet_core::Strategy;

    fn config() -> SimConfig {
        SimConfig::default()
            .with_population(80)
            .with_mean_degree(3.0)
            .with_iterations(4)
            .with_episodes(5)
            .with_testing(10, 0.9)
            .with_strategy(Strategy::FullTrace)
            .with_seed(11)
    }

    #[test]
    fn test_run_dir_is_deterministic() {
        let root = Path::new("/results");
        assert_eq!(run_dir(root, &config()), run_dir(root, &config()));
        assert_eq!(run_dir_name(&config()), "B_n80_e5_i4_t10");

        let other = config().with_testing(20, 0.9);
        assert_ne!(run_dir(root, &config()), run_dir(root, &other));
    }

    #[test]
    fn test_write_and_read_back() {
        let tmp = tempfile::tempdir().unwrap();
        let config = config();
        let dir = prepare_run_dir(tmp.path(), &config).unwrap();

        let results = RunAggregator::new(config.clone()).unwrap().with_trace(true).run();
        write_results(&dir, &config, &results).unwrap();

        for (name, values) in results.distributions.series() {
            assert_eq!(read_series(&dir, name).unwrap(), values);
        }
        assert!(dir.join("traces.json").exists());

        let meta: RunExport =
            serde_json::from_slice(&fs::read(dir.join("run.json")).unwrap()).unwrap();
        assert_eq!(meta.master_seed, 11);
        assert_eq!(meta.completed_episodes, 5);
        assert_eq!(meta.config.strategy, Strategy::FullTrace);
        assert_eq!(meta.config.population, 80);
        assert_eq!(meta.episode_seeds, results.episode_seeds);
    }

    #[test]
    fn test_unusable_output_root_is_reported() {
        let tmp = tempfile::tempdir().unwrap();
        let blocker = tmp.path().join("file");
        fs::write(&blocker, b"not a directory").unwrap();

        let err = prepare_run_dir(&blocker, &config()).unwrap_err();
        assert!(matches!(err, SimError::Output { .. }));
    }
}
