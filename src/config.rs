use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::{fmt::Debug, ops::RangeBounds};

/// Field layout of the simulation.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Topology {
    /// One field holding the whole population.
    Single,
    /// A susceptible reservoir field exchanging migrants with an active field.
    Dual,
}

impl Topology {
    /// Map a number of fields (1 or 2) to a topology.
    pub fn from_field_num(field_num: u8) -> Result<Self> {
        match field_num {
            1 => Ok(Topology::Single),
            2 => Ok(Topology::Dual),
            _ => bail!("number of fields must be 1 or 2, but is {field_num}"),
        }
    }
}

/// Resolved simulation configuration.
///
/// Built from the command line and an optional override file,
/// and validated before any simulation starts.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Config {
    pub model: ModelConfig,
    pub init: InitConfig,
    pub run: RunConfig,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub topology: Topology,

    /// Infection probability per draw (alpha).
    pub prob_infect: f64,
    /// Recovery probability of mild cases (psi).
    pub prob_recover: f64,
    /// Progression probability from mild to severe (beta).
    pub prob_worsen: f64,
    /// Regression probability from severe to mild (omega).
    pub prob_improve: f64,
    /// Fraction of reservoir susceptibles moving to the active field (pi).
    pub prob_out: f64,
    /// Fraction of active infected moving to the reservoir (rho).
    pub prob_in: f64,

    /// Tick of the outbreak event (t1).
    pub t_outbreak: usize,
    /// Ticks a severe case survives before dying (t2).
    pub t_severe: usize,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct InitConfig {
    /// Side length of each field.
    pub grid_size: usize,

    pub n_sus: usize,
    pub n_mild: usize,
    pub n_severe: usize,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    pub max_ticks: usize,

    /// Random seed; drawn from the OS when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u32>,
}

impl Config {
    /// Check every parameter.
    ///
    /// # Errors
    /// Returns an error if a probability lies outside `[0, 1]`, if the grid size
    /// or tick limit is out of range, or if the initial population does not fit
    /// in the grid.
    pub fn validate(&self) -> Result<()> {
        let model = &self.model;
        let probs = [
            ("infection", model.prob_infect),
            ("recovery", model.prob_recover),
            ("progression", model.prob_worsen),
            ("regression", model.prob_improve),
            ("outward migration", model.prob_out),
            ("inward migration", model.prob_in),
        ];
        for (name, prob) in probs {
            check_num(prob, 0.0..=1.0).with_context(|| format!("invalid {name} probability"))?;
        }

        check_num(self.init.grid_size, 1..=10_000).context("invalid grid size")?;
        check_num(self.run.max_ticks, 1..=100_000_000)
            .context("invalid maximum number of ticks")?;

        let capacity = self.init.grid_size * self.init.grid_size;
        let n_init = self
            .init
            .n_sus
            .checked_add(self.init.n_mild)
            .and_then(|n| n.checked_add(self.init.n_severe))
            .context("initial population overflows")?;
        if n_init > capacity {
            bail!("initial population {n_init} exceeds grid capacity {capacity}");
        }

        Ok(())
    }
}

fn check_num<T, R>(num: T, range: R) -> Result<()>
where
    T: PartialOrd + Debug,
    R: RangeBounds<T> + Debug,
{
    if !range.contains(&num) {
        bail!("number must be in the range {range:?}, but is {num:?}");
    }
    Ok(())
}
