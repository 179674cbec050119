use crate::model::{Agent, Counts};
use anyhow::{Result, bail};
use rand::prelude::*;
use rand_distr::Uniform;
use serde::{Deserialize, Serialize};

/// Moore neighborhood offsets.
const MOORE: [(isize, isize); 8] = [
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, -1),
    (0, 1),
    (1, -1),
    (1, 0),
    (1, 1),
];

/// Square toroidal grid of agents.
///
/// Every cell holds exactly one agent. Cells are stored in row-major order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    size: usize,
    agt_vec: Vec<Agent>,
}

impl Field {
    /// Create a field with every cell holding a copy of `agt`.
    pub fn filled(size: usize, agt: Agent) -> Self {
        Self {
            size,
            agt_vec: vec![agt; size * size],
        }
    }

    /// Create a field from a row-major list of agents.
    pub fn from_agents(size: usize, agt_vec: Vec<Agent>) -> Result<Self> {
        let len = agt_vec.len();
        if len != size * size {
            bail!("field of size {size} needs {} agents, but got {len}", size * size);
        }
        Ok(Self { size, agt_vec })
    }

    pub fn capacity(&self) -> usize {
        self.agt_vec.len()
    }

    pub fn get(&self, x: usize, y: usize) -> Agent {
        self.agt_vec[self.index(x, y)]
    }

    pub fn set(&mut self, x: usize, y: usize, agt: Agent) {
        let idx = self.index(x, y);
        self.agt_vec[idx] = agt;
    }

    pub fn get_at(&self, idx: usize) -> Agent {
        self.agt_vec[idx]
    }

    pub fn set_at(&mut self, idx: usize, agt: Agent) {
        self.agt_vec[idx] = agt;
    }

    pub fn agents_mut(&mut self) -> impl Iterator<Item = &mut Agent> {
        self.agt_vec.iter_mut()
    }

    /// Agents in the 8 cells around `(x, y)`, wrapping at the edges.
    pub fn neighbors(&self, x: usize, y: usize) -> impl Iterator<Item = Agent> {
        let size = self.size as isize;
        MOORE.iter().map(move |&(dx, dy)| {
            let nx = (x as isize + dx).rem_euclid(size) as usize;
            let ny = (y as isize + dy).rem_euclid(size) as usize;
            self.get(nx, ny)
        })
    }

    /// Row-major indices of the agents matching `pred`.
    pub fn indices_where<F>(&self, pred: F) -> Vec<usize>
    where
        F: Fn(&Agent) -> bool,
    {
        self.agt_vec
            .iter()
            .enumerate()
            .filter(|(_, agt)| pred(agt))
            .map(|(idx, _)| idx)
            .collect()
    }

    pub fn counts(&self) -> Counts {
        let mut counts = Counts::default();
        for agt in &self.agt_vec {
            counts.record(agt.health());
        }
        counts
    }

    /// Row-major index of the cell `(x, y)`.
    pub fn index(&self, x: usize, y: usize) -> usize {
        x * self.size + y
    }
}

/// Uniform distribution over the cells of a field of a given size.
///
/// Samples the x coordinate first and the y coordinate second.
#[derive(Debug, Clone, Copy)]
pub struct CellDist {
    coord_dist: Uniform<usize>,
}

impl CellDist {
    pub fn new(size: usize) -> Result<Self> {
        let coord_dist = Uniform::new(0, size)?;
        Ok(Self { coord_dist })
    }
}

impl Distribution<(usize, usize)> for CellDist {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> (usize, usize) {
        let x = self.coord_dist.sample(rng);
        let y = self.coord_dist.sample(rng);
        (x, y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Health;
    use rand_chacha::ChaCha12Rng;

    #[test]
    fn neighbors_wrap_around_edges() {
        let size = 10;
        let mut field = Field::filled(size, Agent::new(Health::Susceptible));
        field.set(9, 9, Agent::new(Health::InfectedMild));
        field.set(0, 1, Agent::new(Health::InfectedSevere));

        let neighbors: Vec<_> = field.neighbors(0, 0).collect();
        assert_eq!(neighbors.len(), 8);
        let counts = neighbors.iter().fold(Counts::default(), |mut acc, agt| {
            acc.record(agt.health());
            acc
        });
        assert_eq!(counts.mild, 1);
        assert_eq!(counts.severe, 1);
        assert_eq!(counts.susceptible, 6);
    }

    #[test]
    fn neighbors_exclude_center() {
        let mut field = Field::filled(3, Agent::new(Health::Susceptible));
        field.set(1, 1, Agent::new(Health::Dead));
        assert!(field.neighbors(1, 1).all(|agt| !agt.is_dead()));
        assert_eq!(field.neighbors(0, 0).filter(Agent::is_dead).count(), 1);
    }

    #[test]
    fn from_agents_checks_length() {
        let agt = Agent::new(Health::Susceptible);
        assert!(Field::from_agents(3, vec![agt; 8]).is_err());
        let field = Field::from_agents(3, vec![agt; 9]).unwrap();
        assert_eq!(field.capacity(), 9);
        assert_eq!(field.counts().susceptible, 9);
    }

    #[test]
    fn index_is_row_major() {
        let mut field = Field::filled(4, Agent::new(Health::Susceptible));
        field.set(2, 3, Agent::severe(1));
        assert_eq!(field.index(2, 3), 11);
        assert_eq!(field.get_at(11), Agent::severe(1));
        assert_eq!(field.indices_where(|agt| agt.infection_tick().is_some()), vec![11]);
    }

    #[test]
    fn cell_dist_stays_in_bounds() {
        let mut rng = ChaCha12Rng::seed_from_u64(7);
        let dist = CellDist::new(5).unwrap();
        for _ in 0..1000 {
            let (x, y) = dist.sample(&mut rng);
            assert!(x < 5 && y < 5);
        }
        assert!(CellDist::new(0).is_err());
    }
}
