use crate::engine::Engine;
use crate::stats::Accumulator;
use anyhow::{Context, Result};
use std::{fs, path::Path};
use toml::{Table, Value};

/// Quantity observed once per finished run.
pub trait Obs {
    fn update(&mut self, engine: &Engine) -> Result<()>;
    fn report(&self) -> Result<(&'static str, Value)>;
}

/// Height and timing of the severe-case peak.
pub struct SeverePeak {
    size_acc: Accumulator,
    tick_acc: Accumulator,
}

impl SeverePeak {
    pub fn new() -> Self {
        Self {
            size_acc: Accumulator::new(),
            tick_acc: Accumulator::new(),
        }
    }
}

impl Obs for SeverePeak {
    fn update(&mut self, engine: &Engine) -> Result<()> {
        // Earliest tick wins on ties.
        let peak = engine
            .series()
            .iter()
            .rev()
            .max_by_key(|record| record.severe)
            .context("run has an empty time series")?;
        self.size_acc.add(peak.severe as f64);
        self.tick_acc.add(peak.tick as f64);
        Ok(())
    }

    fn report(&self) -> Result<(&'static str, Value)> {
        let mut table = Table::new();
        table.insert("size".into(), Value::try_from(self.size_acc.report())?);
        table.insert("tick".into(), Value::try_from(self.tick_acc.report())?);
        Ok(("severe_peak", Value::Table(table)))
    }
}

/// Fraction of runs in which severe cases died out, and when.
pub struct Extinction {
    prob_acc: Accumulator,
    tick_acc: Accumulator,
}

impl Extinction {
    pub fn new() -> Self {
        Self {
            prob_acc: Accumulator::new(),
            tick_acc: Accumulator::new(),
        }
    }
}

impl Obs for Extinction {
    fn update(&mut self, engine: &Engine) -> Result<()> {
        match engine.extinction_tick() {
            Some(tick) => {
                self.prob_acc.add(1.0);
                self.tick_acc.add(tick as f64);
            }
            None => self.prob_acc.add(0.0),
        }
        Ok(())
    }

    fn report(&self) -> Result<(&'static str, Value)> {
        let mut table = Table::new();
        table.insert("prob".into(), Value::try_from(self.prob_acc.report())?);
        table.insert("tick".into(), Value::try_from(self.tick_acc.report())?);
        Ok(("extinction", Value::Table(table)))
    }
}

/// Final number of agents per health state, summed over fields.
pub struct FinalCounts {
    sus_acc: Accumulator,
    mild_acc: Accumulator,
    severe_acc: Accumulator,
    dead_acc: Accumulator,
}

impl FinalCounts {
    pub fn new() -> Self {
        Self {
            sus_acc: Accumulator::new(),
            mild_acc: Accumulator::new(),
            severe_acc: Accumulator::new(),
            dead_acc: Accumulator::new(),
        }
    }
}

impl Obs for FinalCounts {
    fn update(&mut self, engine: &Engine) -> Result<()> {
        let counts = engine.counts();
        self.sus_acc.add(counts.susceptible as f64);
        self.mild_acc.add(counts.mild as f64);
        self.severe_acc.add(counts.severe as f64);
        self.dead_acc.add(counts.dead as f64);
        Ok(())
    }

    fn report(&self) -> Result<(&'static str, Value)> {
        let mut table = Table::new();
        table.insert("susceptible".into(), Value::try_from(self.sus_acc.report())?);
        table.insert("infected_mild".into(), Value::try_from(self.mild_acc.report())?);
        table.insert("infected_severe".into(), Value::try_from(self.severe_acc.report())?);
        table.insert("dead".into(), Value::try_from(self.dead_acc.report())?);
        Ok(("final_counts", Value::Table(table)))
    }
}

pub struct Analyzer {
    n_runs: usize,
    obs_ptr_vec: Vec<Box<dyn Obs>>,
}

impl Analyzer {
    pub fn new() -> Self {
        let obs_ptr_vec: Vec<Box<dyn Obs>> = vec![
            Box::new(SeverePeak::new()),
            Box::new(Extinction::new()),
            Box::new(FinalCounts::new()),
        ];
        Self {
            n_runs: 0,
            obs_ptr_vec,
        }
    }

    pub fn add_run(&mut self, engine: &Engine) -> Result<()> {
        for obs in &mut self.obs_ptr_vec {
            obs.update(engine).context("failed to update observable")?;
        }
        self.n_runs += 1;
        Ok(())
    }

    pub fn report(&self) -> Result<Table> {
        let mut table = Table::new();
        table.insert("n_runs".into(), Value::Integer(self.n_runs as i64));
        for obs in &self.obs_ptr_vec {
            let (name, value) = obs.report().context("failed to report observable")?;
            table.insert(name.into(), value);
        }
        Ok(table)
    }

    pub fn save_results<P: AsRef<Path>>(&self, file: P) -> Result<()> {
        let file = file.as_ref();
        let text = toml::to_string_pretty(&self.report()?).context("failed to serialize results")?;
        fs::write(file, text).with_context(|| format!("failed to write {file:?}"))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::frozen_config;

    fn run(n_severe: usize, t_severe: usize, seed: u32) -> Engine {
        let mut cfg = frozen_config();
        cfg.init.n_severe = n_severe;
        cfg.model.t_severe = t_severe;
        cfg.run.seed = Some(seed);
        let mut engine = Engine::generate_initial_condition(cfg).unwrap();
        engine.run_simulation().unwrap();
        engine
    }

    #[test]
    fn summarizes_runs() {
        let mut analyzer = Analyzer::new();
        analyzer.add_run(&run(5, 1_000, 1)).unwrap();
        analyzer.add_run(&run(0, 2, 2)).unwrap();

        let report = analyzer.report().unwrap();
        assert_eq!(report["n_runs"].as_integer(), Some(2));

        let extinction = report["extinction"].as_table().unwrap();
        let prob = extinction["prob"].as_table().unwrap();
        assert_eq!(prob["mean"].as_float(), Some(0.5));
        let tick = extinction["tick"].as_table().unwrap();
        assert_eq!(tick["max"].as_float(), Some(3.0));

        let peak = report["severe_peak"].as_table().unwrap();
        let size = peak["size"].as_table().unwrap();
        assert_eq!(size["max"].as_float(), Some(5.0));
        assert_eq!(size["min"].as_float(), Some(0.0));

        let counts = report["final_counts"].as_table().unwrap();
        let dead = counts["dead"].as_table().unwrap();
        assert_eq!(dead["mean"].as_float(), Some(0.0));
    }

    #[test]
    fn severe_peak_prefers_earliest_tick() {
        let mut peak = SeverePeak::new();
        peak.update(&run(5, 1_000, 3)).unwrap();
        let (_, value) = peak.report().unwrap();
        let tick = value["tick"].as_table().unwrap();
        assert_eq!(tick["mean"].as_float(), Some(0.0));
    }

    #[test]
    fn saves_toml_report() {
        let dir = std::env::temp_dir().join("epigrid_analysis_test");
        fs::create_dir_all(&dir).unwrap();
        let file = dir.join("analysis.toml");

        let mut analyzer = Analyzer::new();
        analyzer.add_run(&run(5, 1_000, 4)).unwrap();
        analyzer.save_results(&file).unwrap();

        let text = fs::read_to_string(&file).unwrap();
        let table: Table = toml::from_str(&text).unwrap();
        assert_eq!(table["n_runs"].as_integer(), Some(1));

        fs::remove_dir_all(&dir).ok();
    }
}
