use crate::config::ModelConfig;
use crate::model::{Agent, Health};
use rand::prelude::*;

/// Contact-driven transition rule applied to one agent per draw.
///
/// Attempts are tried in a fixed order and the first one that applies wins.
/// Every attempt consumes exactly one uniform draw from the generator.
#[derive(Debug, Clone, Copy)]
pub struct TransitionRule {
    prob_infect: f64,
    prob_recover: f64,
    prob_worsen: f64,
    prob_improve: f64,
}

impl TransitionRule {
    pub fn new(model: &ModelConfig) -> Self {
        Self {
            prob_infect: model.prob_infect,
            prob_recover: model.prob_recover,
            prob_worsen: model.prob_worsen,
            prob_improve: model.prob_improve,
        }
    }

    /// Compute the next state of `agt` at `tick`.
    ///
    /// `neighbors` is only scanned for susceptible agents, and only until the
    /// first mild case is found.
    pub fn apply<I, R>(&self, agt: Agent, neighbors: I, tick: usize, rng: &mut R) -> Agent
    where
        I: IntoIterator<Item = Agent>,
        R: Rng + ?Sized,
    {
        match agt.health() {
            Health::Susceptible => {
                let exposed = neighbors
                    .into_iter()
                    .any(|nbr| nbr.health() == Health::InfectedMild);
                if exposed && draw(rng, self.prob_infect) {
                    return Agent::new(Health::InfectedMild);
                }
            }
            Health::InfectedMild => {
                // Progression is only drawn when recovery fails.
                if draw(rng, self.prob_recover) {
                    return Agent::new(Health::Susceptible);
                }
                if draw(rng, self.prob_worsen) {
                    return Agent::severe(tick);
                }
            }
            Health::InfectedSevere => {
                if draw(rng, self.prob_improve) {
                    return Agent::new(Health::InfectedMild);
                }
            }
            Health::Dead => {}
        }
        agt
    }
}

/// Draw `r` uniformly from `[0, 1)` and report whether `r < prob`.
pub fn draw<R: Rng + ?Sized>(rng: &mut R, prob: f64) -> bool {
    rng.random::<f64>() < prob
}
