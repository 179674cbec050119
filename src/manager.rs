use crate::analysis::Analyzer;
use crate::config::Config;
use crate::engine::Engine;
use crate::model::Record;
use anyhow::{Context, Result, bail};
use glob::glob;
use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

pub struct Manager {
    sim_dir: PathBuf,
}

impl Manager {
    pub fn new<P: AsRef<Path>>(sim_dir: P) -> Result<Self> {
        let sim_dir = sim_dir.as_ref().to_path_buf();
        fs::create_dir_all(&sim_dir).with_context(|| format!("failed to create {sim_dir:?}"))?;
        Ok(Self { sim_dir })
    }

    pub fn create_run(&self, cfg: Config) -> Result<()> {
        log::info!("{cfg:#?}");

        let run_idx = self.count_run_dirs().context("failed to count run dirs")?;
        let run_dir = self.run_dir(run_idx);
        fs::create_dir_all(&run_dir).with_context(|| format!("failed to create {run_dir:?}"))?;
        log::info!("created {run_dir:?}");

        let config_file = self.config_file(run_idx);
        let cfg_str = toml::to_string_pretty(&cfg).context("failed to serialize config")?;
        fs::write(&config_file, cfg_str)
            .with_context(|| format!("failed to write {config_file:?}"))?;

        let mut engine = Engine::generate_initial_condition(cfg)
            .context("failed to generate initial condition")?;
        let series = engine.run_simulation().context("failed to run simulation")?;

        write_series(self.series_file(run_idx), series).context("failed to write series")?;

        let counts = engine.counts();
        log::info!(
            "finished with {} alive and {} dead agents",
            counts.alive(),
            counts.dead
        );

        engine
            .save_checkpoint(self.checkpoint_file(run_idx))
            .context("failed to save checkpoint")?;

        Ok(())
    }

    pub fn analyze_sim(&self) -> Result<()> {
        let n_runs = self.count_run_dirs().context("failed to count run dirs")?;
        if n_runs == 0 {
            bail!("no runs found in {:?}", self.sim_dir);
        }

        let mut analyzer = Analyzer::new();
        for run_idx in 0..n_runs {
            let checkpoint_file = self.checkpoint_file(run_idx);
            let engine = Engine::load_checkpoint(&checkpoint_file)
                .with_context(|| format!("failed to load {checkpoint_file:?}"))?;
            log::info!(
                "run {run_idx}: {:?} topology, {} ticks",
                engine.cfg().model.topology,
                engine.series().len()
            );
            analyzer
                .add_run(&engine)
                .with_context(|| format!("failed to analyze run {run_idx}"))?;
        }

        let analysis_file = self.analysis_file();
        analyzer
            .save_results(&analysis_file)
            .context("failed to save results")?;
        log::info!("analyzed {n_runs} runs into {analysis_file:?}");

        Ok(())
    }

    pub fn clean_sim(&self) -> Result<()> {
        let n_runs = self.count_run_dirs().context("failed to count run dirs")?;
        for run_idx in 0..n_runs {
            let run_dir = self.run_dir(run_idx);
            fs::remove_dir_all(&run_dir).with_context(|| format!("failed to remove {run_dir:?}"))?;
        }

        let analysis_file = self.analysis_file();
        if analysis_file.exists() {
            fs::remove_file(&analysis_file)
                .with_context(|| format!("failed to remove {analysis_file:?}"))?;
        }
        log::info!("removed {n_runs} runs");

        Ok(())
    }

    fn count_run_dirs(&self) -> Result<usize> {
        let pattern = self.sim_dir.join("run-*");
        let pattern = pattern.to_str().context("pattern is not valid UTF-8")?;
        let count = glob(pattern)
            .context("failed to glob run dirs")?
            .filter_map(Result::ok)
            .filter(|p| p.is_dir())
            .count();
        Ok(count)
    }

    fn run_dir(&self, run_idx: usize) -> PathBuf {
        self.sim_dir.join(format!("run-{run_idx:04}"))
    }

    fn config_file(&self, run_idx: usize) -> PathBuf {
        self.run_dir(run_idx).join("config.toml")
    }

    fn series_file(&self, run_idx: usize) -> PathBuf {
        self.run_dir(run_idx).join("series.csv")
    }

    fn checkpoint_file(&self, run_idx: usize) -> PathBuf {
        self.run_dir(run_idx).join("checkpoint.msgpack")
    }

    fn analysis_file(&self) -> PathBuf {
        self.sim_dir.join("analysis.toml")
    }
}

fn write_series<P: AsRef<Path>>(file: P, series: &[Record]) -> Result<()> {
    let file = file.as_ref();
    let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
    let mut writer = BufWriter::new(file);

    writeln!(writer, "{}", Record::CSV_HEADER).context("failed to write header")?;
    for record in series {
        writeln!(writer, "{}", record.to_csv_row()).context("failed to write record")?;
    }

    writer.flush().context("failed to flush writer stream")?;

    Ok(())
}
