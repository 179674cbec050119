use crate::config::ModelConfig;
use crate::field::{CellDist, Field};
use crate::model::{Agent, Health};
use rand::prelude::*;

/// Exchange of agents between the reservoir and the active field.
///
/// Migrants are inserted at random cells of the destination field, replacing
/// whatever agent occupied them. The replaced agent is lost.
#[derive(Debug, Clone, Copy)]
pub struct Migration {
    prob_out: f64,
    prob_in: f64,
}

impl Migration {
    pub fn new(model: &ModelConfig) -> Self {
        Self {
            prob_out: model.prob_out,
            prob_in: model.prob_in,
        }
    }

    /// Move susceptibles out of the reservoir, then infected agents into it.
    ///
    /// Returns the number of outward and inward migrants.
    pub fn migrate<R: Rng + ?Sized>(
        &self,
        reservoir: &mut Field,
        active: &mut Field,
        cell_dist: &CellDist,
        rng: &mut R,
    ) -> (usize, usize) {
        let i_agt_sus = reservoir.indices_where(|agt| agt.health() == Health::Susceptible);
        let i_agt_out = choose_migrants(&i_agt_sus, self.prob_out, rng);
        for &i_agt in &i_agt_out {
            reservoir.set_at(i_agt, Agent::new(Health::Dead));
            let (x, y) = cell_dist.sample(rng);
            active.set(x, y, Agent::new(Health::Susceptible));
        }

        let i_agt_inf = active.indices_where(|agt| {
            matches!(
                agt.health(),
                Health::InfectedMild | Health::InfectedSevere
            )
        });
        let i_agt_in = choose_migrants(&i_agt_inf, self.prob_in, rng);
        for &i_agt in &i_agt_in {
            let migrant = active.get_at(i_agt);
            active.set_at(i_agt, Agent::new(Health::Dead));
            let (x, y) = cell_dist.sample(rng);
            reservoir.set(x, y, migrant);
        }

        (i_agt_out.len(), i_agt_in.len())
    }
}

/// Sample `floor(len * prob)` candidates without replacement.
fn choose_migrants<R: Rng + ?Sized>(candidates: &[usize], prob: f64, rng: &mut R) -> Vec<usize> {
    let n_move = ((candidates.len() as f64 * prob).floor() as usize).min(candidates.len());
    candidates.choose_multiple(rng, n_move).copied().collect()
}
