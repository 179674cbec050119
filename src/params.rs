use crate::config::{Config, InitConfig, ModelConfig, RunConfig, Topology};
use anyhow::{Context, Result, bail};
use clap::Args;
use std::{fs, path::PathBuf, str::FromStr};

/// Simulation parameters given on the command line.
///
/// Values read from `--file` take precedence over the flags.
#[derive(Debug, Args)]
pub struct ParamArgs {
    /// Parameter file with `key: value` lines
    #[arg(short = 'f', long)]
    file: Option<PathBuf>,

    /// Number of fields (1 or 2)
    #[arg(short = 'n', long, default_value_t = 2)]
    field_num: u8,

    /// Infection rate
    #[arg(short = 'a', long, default_value_t = 0.1)]
    alfa: f64,
    /// Recovery rate
    #[arg(short = 'y', long, default_value_t = 0.05)]
    psi: f64,
    /// Mild to severe rate
    #[arg(short = 'b', long, default_value_t = 0.02)]
    beta: f64,
    /// Severe to mild rate
    #[arg(short = 'w', long, default_value_t = 0.01)]
    omega: f64,
    /// Reservoir to active migration rate
    #[arg(short = 'p', long, default_value_t = 0.01)]
    pi: f64,
    /// Active to reservoir migration rate
    #[arg(short = 'r', long, default_value_t = 0.01)]
    rho: f64,

    /// Initial number of susceptible agents
    #[arg(long, default_value_t = 5000)]
    initial_z: usize,
    /// Initial number of mild cases
    #[arg(long, default_value_t = 100)]
    initial_a: usize,
    /// Initial number of severe cases
    #[arg(long, default_value_t = 100)]
    initial_b: usize,

    /// Tick of the outbreak event
    #[arg(long, default_value_t = 200)]
    t1: usize,
    /// Lifetime of severe cases
    #[arg(long, default_value_t = 800)]
    t2: usize,
    /// Maximum number of ticks
    #[arg(long, default_value_t = 1000)]
    max_time: usize,
    /// Side length of each field
    #[arg(long, default_value_t = 100)]
    grid_size: usize,

    /// Random seed
    #[arg(long)]
    seed: Option<u32>,
}

impl ParamArgs {
    /// Merge the flags with the parameter file and validate the result.
    pub fn resolve(self) -> Result<Config> {
        let mut cfg = Config {
            model: ModelConfig {
                topology: Topology::from_field_num(self.field_num)?,
                prob_infect: self.alfa,
                prob_recover: self.psi,
                prob_worsen: self.beta,
                prob_improve: self.omega,
                prob_out: self.pi,
                prob_in: self.rho,
                t_outbreak: self.t1,
                t_severe: self.t2,
            },
            init: InitConfig {
                grid_size: self.grid_size,
                n_sus: self.initial_z,
                n_mild: self.initial_a,
                n_severe: self.initial_b,
            },
            run: RunConfig {
                max_ticks: self.max_time,
                seed: self.seed,
            },
        };

        if let Some(file) = &self.file {
            let text =
                fs::read_to_string(file).with_context(|| format!("failed to read {file:?}"))?;
            let n_applied = apply_overrides(&mut cfg, &text);
            log::info!("applied {n_applied} parameters from {file:?}");
        }

        cfg.validate().context("invalid configuration")?;

        Ok(cfg)
    }
}

/// Apply every well-formed `key: value` line of `text` to `cfg`.
///
/// Blank lines and `#` comments are ignored. Bad lines are logged and skipped.
/// Returns the number of applied parameters.
pub fn apply_overrides(cfg: &mut Config, text: &str) -> usize {
    let mut n_applied = 0;
    for (i_line, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match apply_line(cfg, line) {
            Ok(()) => n_applied += 1,
            Err(error) => log::warn!("skipping line {} {line:?}: {error:#}", i_line + 1),
        }
    }
    n_applied
}

fn apply_line(cfg: &mut Config, line: &str) -> Result<()> {
    let (key, value) = line.split_once(':').context("missing ':' separator")?;
    let key = key.trim();
    let value = value.split_once('#').map_or(value, |(value, _)| value).trim();

    match key {
        "n" => cfg.model.topology = Topology::from_field_num(parse(value)?)?,
        "alfa" => cfg.model.prob_infect = parse(value)?,
        "psi" => cfg.model.prob_recover = parse(value)?,
        "beta" => cfg.model.prob_worsen = parse(value)?,
        "omega" => cfg.model.prob_improve = parse(value)?,
        "pi" => cfg.model.prob_out = parse(value)?,
        "rho" => cfg.model.prob_in = parse(value)?,
        "initial_Z" => cfg.init.n_sus = parse(value)?,
        "initial_A" => cfg.init.n_mild = parse(value)?,
        "initial_B" => cfg.init.n_severe = parse(value)?,
        "t1" => cfg.model.t_outbreak = parse(value)?,
        "t2" => cfg.model.t_severe = parse(value)?,
        "max_time" => cfg.run.max_ticks = parse(value)?,
        "grid_size" => cfg.init.grid_size = parse(value)?,
        "seed" => cfg.run.seed = Some(parse(value)?),
        _ => bail!("unknown key {key:?}"),
    }

    Ok(())
}

fn parse<T>(value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .parse()
        .with_context(|| format!("failed to parse value {value:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::frozen_config;

    #[test]
    fn applies_known_keys() {
        let mut cfg = frozen_config();
        let text = "\
# epidemic parameters
n: 2
alfa: 0.25
psi:0.5   # inline comment

initial_Z: 40
t2: 12
max_time: 300
seed: 9
";
        assert_eq!(apply_overrides(&mut cfg, text), 7);
        assert_eq!(cfg.model.topology, Topology::Dual);
        assert_eq!(cfg.model.prob_infect, 0.25);
        assert_eq!(cfg.model.prob_recover, 0.5);
        assert_eq!(cfg.init.n_sus, 40);
        assert_eq!(cfg.model.t_severe, 12);
        assert_eq!(cfg.run.max_ticks, 300);
        assert_eq!(cfg.run.seed, Some(9));
    }

    #[test]
    fn skips_malformed_lines() {
        let mut cfg = frozen_config();
        let text = "\
alfa 0.3
beta: lots
omega: 0.75
unknown: 1
n: 3
";
        assert_eq!(apply_overrides(&mut cfg, text), 1);
        assert_eq!(cfg.model.prob_improve, 0.75);
        assert_eq!(cfg.model.prob_infect, 0.0);
        assert_eq!(cfg.model.prob_worsen, 0.0);
        assert_eq!(cfg.model.topology, Topology::Single);
    }

    #[test]
    fn out_of_range_values_are_caught_by_validation() {
        let mut cfg = frozen_config();
        apply_overrides(&mut cfg, "rho: 2.0\n");
        assert_eq!(cfg.model.prob_in, 2.0);
        assert!(cfg.validate().is_err());
    }
}
