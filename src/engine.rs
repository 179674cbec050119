use crate::config::{Config, Topology};
use crate::field::{CellDist, Field};
use crate::migration::Migration;
use crate::model::{Agent, Counts, Health, Record};
use crate::rule::{TransitionRule, draw};
use anyhow::{Context, Result, bail};
use rand::prelude::*;
use rand_chacha::ChaCha12Rng;
use rmp_serde::{decode, encode};
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, BufWriter, Write},
    iter,
    path::Path,
};

/// Probability that a susceptible agent turns severe during the outbreak event.
const PROB_OUTBREAK: f64 = 0.05;

/// Simulation engine.
///
/// Owns the configuration, the field(s), the random number generator and the
/// recorded time series, and provides methods to initialize, run, save and
/// load simulations.
#[derive(Serialize, Deserialize)]
pub struct Engine {
    cfg: Config,
    active: Field,
    reservoir: Option<Field>,
    rng: ChaCha12Rng,
    series: Vec<Record>,
    extinction_tick: Option<usize>,
}

impl Engine {
    /// Create a new `Engine` with the given configuration and a random initial state.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid.
    pub fn generate_initial_condition(cfg: Config) -> Result<Self> {
        cfg.validate().context("invalid configuration")?;

        let mut rng = match cfg.run.seed {
            Some(seed) => ChaCha12Rng::seed_from_u64(seed.into()),
            None => ChaCha12Rng::try_from_os_rng()?,
        };

        let size = cfg.init.grid_size;
        let capacity = size * size;
        let mut agt_vec = Vec::with_capacity(capacity);
        agt_vec.extend(iter::repeat_n(Agent::new(Health::Susceptible), cfg.init.n_sus));
        agt_vec.extend(iter::repeat_n(Agent::new(Health::InfectedMild), cfg.init.n_mild));
        agt_vec.extend(iter::repeat_n(Agent::new(Health::InfectedSevere), cfg.init.n_severe));
        agt_vec.resize(capacity, Agent::new(Health::Susceptible));
        agt_vec.shuffle(&mut rng);

        let active = Field::from_agents(size, agt_vec).context("failed to fill active field")?;
        let reservoir = match cfg.model.topology {
            Topology::Single => None,
            Topology::Dual => Some(Field::filled(size, Agent::new(Health::Susceptible))),
        };

        Ok(Self {
            cfg,
            active,
            reservoir,
            rng,
            series: Vec::new(),
            extinction_tick: None,
        })
    }

    /// Run the simulation until `max_ticks` or until severe cases die out.
    ///
    /// Returns the recorded time series.
    pub fn run_simulation(&mut self) -> Result<&[Record]> {
        if !self.series.is_empty() {
            bail!("simulation already ran for {} ticks", self.series.len());
        }

        let rule = TransitionRule::new(&self.cfg.model);
        let migration = Migration::new(&self.cfg.model);
        let cell_dist = CellDist::new(self.cfg.init.grid_size)?;

        let max_ticks = self.cfg.run.max_ticks;
        let ticks_per_log = (max_ticks / 10).max(1);

        for tick in 0..max_ticks {
            let record = self.perform_step(tick, &rule, &migration, &cell_dist);
            self.series.push(record);

            if (tick + 1) % ticks_per_log == 0 {
                let progress = 100.0 * (tick + 1) as f64 / max_ticks as f64;
                log::info!("completed {progress:06.2}%");
            }

            if record.severe == 0 && tick > self.cfg.model.t_severe {
                log::info!("severe cases died out at tick {tick}");
                self.extinction_tick = Some(tick);
                break;
            }
        }

        Ok(&self.series)
    }

    /// Save a checkpoint of the entire engine state.
    pub fn save_checkpoint<P: AsRef<Path>>(&self, file: P) -> Result<()> {
        let file = file.as_ref();
        let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
        let mut writer = BufWriter::new(file);
        encode::write_named(&mut writer, &self).context("failed to serialize engine")?;
        writer.flush().context("failed to flush writer stream")?;
        Ok(())
    }

    /// Load a previously saved engine checkpoint.
    pub fn load_checkpoint<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let file = File::open(file).with_context(|| format!("failed to open {file:?}"))?;
        let mut reader = BufReader::new(file);
        let engine = decode::from_read(&mut reader).context("failed to deserialize engine")?;
        Ok(engine)
    }

    pub fn cfg(&self) -> &Config {
        &self.cfg
    }

    pub fn series(&self) -> &[Record] {
        &self.series
    }

    /// Tick at which the run stopped because no severe case was left.
    pub fn extinction_tick(&self) -> Option<usize> {
        self.extinction_tick
    }

    /// Counts summed over all fields, dead agents included.
    pub fn counts(&self) -> Counts {
        let mut counts = self.active.counts();
        if let Some(reservoir) = &self.reservoir {
            counts += reservoir.counts();
        }
        counts
    }

    fn perform_step(
        &mut self,
        tick: usize,
        rule: &TransitionRule,
        migration: &Migration,
        cell_dist: &CellDist,
    ) -> Record {
        // Expire long-lasting severe cases before anyone else moves.
        self.remove_expired(tick);

        // Update randomly drawn agents.
        self.update_agents(tick, rule, cell_dist);

        // Seed the outbreak once.
        if tick == self.cfg.model.t_outbreak {
            self.trigger_outbreak(tick);
        }

        // Exchange migrants between fields.
        if let Some(reservoir) = &mut self.reservoir {
            let (n_out, n_in) =
                migration.migrate(reservoir, &mut self.active, cell_dist, &mut self.rng);
            log::debug!("tick {tick}: {n_out} outward and {n_in} inward migrants");
        }

        Record::new(tick, &self.counts())
    }

    fn remove_expired(&mut self, tick: usize) {
        let t_severe = self.cfg.model.t_severe;
        for agt in self.active.agents_mut() {
            if agt.severe_expired(tick, t_severe) {
                *agt = Agent::new(Health::Dead);
            }
        }
    }

    fn update_agents(&mut self, tick: usize, rule: &TransitionRule, cell_dist: &CellDist) {
        // Cells are drawn with replacement, one draw per cell on average.
        for _ in 0..self.active.capacity() {
            let (x, y) = cell_dist.sample(&mut self.rng);
            let agt = self.active.get(x, y);
            if agt.is_dead() {
                continue;
            }
            let agt_new = rule.apply(agt, self.active.neighbors(x, y), tick, &mut self.rng);
            self.active.set(x, y, agt_new);
        }
    }

    fn trigger_outbreak(&mut self, tick: usize) {
        let mut n_seeded = 0;
        for agt in self.active.agents_mut() {
            if agt.health() == Health::Susceptible && draw(&mut self.rng, PROB_OUTBREAK) {
                *agt = Agent::severe(tick);
                n_seeded += 1;
            }
        }
        log::info!("outbreak at tick {tick} seeded {n_seeded} severe cases");
    }
}
