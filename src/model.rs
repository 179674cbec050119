use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign};

/// Health state of an agent.
///
/// `Dead` is absorbing: once reached, an agent never changes again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Health {
    Susceptible,
    InfectedMild,
    InfectedSevere,
    Dead,
}

/// Agent occupying one grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
    health: Health,
    infection_tick: Option<usize>,
}

impl Agent {
    pub fn new(health: Health) -> Self {
        Self {
            health,
            infection_tick: None,
        }
    }

    /// Agent that became severely infected at `tick`.
    pub fn severe(tick: usize) -> Self {
        Self {
            health: Health::InfectedSevere,
            infection_tick: Some(tick),
        }
    }

    pub fn health(&self) -> Health {
        self.health
    }

    pub fn infection_tick(&self) -> Option<usize> {
        self.infection_tick
    }

    pub fn is_dead(&self) -> bool {
        self.health == Health::Dead
    }

    /// Whether a severe agent has been severe for at least `t_severe` ticks.
    ///
    /// An unset infection tick counts as -1, so agents seeded severe at
    /// initialization are treated as infected just before the first tick.
    pub fn severe_expired(&self, tick: usize, t_severe: usize) -> bool {
        if self.health != Health::InfectedSevere {
            return false;
        }
        let since = self.infection_tick().map_or(-1, |t| t as i64);
        tick as i64 - since >= t_severe as i64
    }
}

/// Number of agents in each health state.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counts {
    pub susceptible: usize,
    pub mild: usize,
    pub severe: usize,
    pub dead: usize,
}

impl Counts {
    pub fn record(&mut self, health: Health) {
        match health {
            Health::Susceptible => self.susceptible += 1,
            Health::InfectedMild => self.mild += 1,
            Health::InfectedSevere => self.severe += 1,
            Health::Dead => self.dead += 1,
        }
    }

    pub fn alive(&self) -> usize {
        self.susceptible + self.mild + self.severe
    }
}

impl Add for Counts {
    type Output = Counts;

    fn add(mut self, rhs: Counts) -> Counts {
        self += rhs;
        self
    }
}

impl AddAssign for Counts {
    fn add_assign(&mut self, rhs: Counts) {
        self.susceptible += rhs.susceptible;
        self.mild += rhs.mild;
        self.severe += rhs.severe;
        self.dead += rhs.dead;
    }
}

/// Time series entry. Dead agents are never counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub tick: usize,
    pub susceptible: usize,
    pub mild: usize,
    pub severe: usize,
}

impl Record {
    pub const CSV_HEADER: &'static str = "tick,susceptible,infected_mild,infected_severe";

    pub fn new(tick: usize, counts: &Counts) -> Self {
        Self {
            tick,
            susceptible: counts.susceptible,
            mild: counts.mild,
            severe: counts.severe,
        }
    }

    pub fn to_csv_row(&self) -> String {
        format!(
            "{},{},{},{}",
            self.tick, self.susceptible, self.mild, self.severe
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severe_expiry_uses_infection_tick() {
        let agt = Agent::severe(3);
        assert!(!agt.severe_expired(7, 5));
        assert!(agt.severe_expired(8, 5));
        assert!(!Agent::new(Health::InfectedMild).severe_expired(100, 5));
    }

    #[test]
    fn unset_infection_tick_counts_as_minus_one() {
        let agt = Agent::new(Health::InfectedSevere);
        assert!(!agt.severe_expired(3, 5));
        assert!(agt.severe_expired(4, 5));
    }

    #[test]
    fn record_drops_dead() {
        let mut counts = Counts::default();
        for health in [
            Health::Susceptible,
            Health::Susceptible,
            Health::InfectedMild,
            Health::Dead,
        ] {
            counts.record(health);
        }
        assert_eq!(counts.alive(), 3);
        let record = Record::new(4, &counts);
        assert_eq!(record.to_csv_row(), "4,2,1,0");
    }
}
