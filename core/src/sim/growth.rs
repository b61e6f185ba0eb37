//! Per-cell birth/death probabilities and population event counts

use rand::Rng;
use serde::Serialize;
use thiserror::Error;

use crate::sim::distr;

/// An error raised when constructing or rescaling a [`GrowthRate`]
#[derive(Error, Debug, PartialEq)]
pub enum GrowthRateError {
    /// A probability fell outside `[0, 1]`
    #[error("probability {0} lies outside [0, 1]")]
    OutOfRange(f64),
    /// Birth and death probabilities summed above one
    #[error("birth + death = {0} exceeds 1")]
    SumExceedsOne(f64),
}

/// Immutable per-cell birth and death probabilities for one time step
#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
pub struct GrowthRate {
    birth: f64,
    death: f64,
}

/// Birth and death event counts resolved for a population over one time step
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct GrowthCount {
    /// Number of cell divisions
    pub births: u64,
    /// Number of cell deaths
    pub deaths: u64,
}

impl GrowthCount {
    /// Signed change in population size
    pub fn net_change(&self) -> i64 {
        self.births as i64 - self.deaths as i64
    }
}

impl GrowthRate {
    /// Create a growth rate from per-cell birth and death probabilities
    pub fn new(birth: f64, death: f64) -> Result<Self, GrowthRateError> {
        for p in [birth, death] {
            if !p.is_finite() || !(0.0..=1.0).contains(&p) {
                return Err(GrowthRateError::OutOfRange(p));
            }
        }
        if birth + death > 1.0 {
            return Err(GrowthRateError::SumExceedsOne(birth + death));
        }

        Ok(Self { birth, death })
    }

    /// Growth rate with net rate `r`: `b = (1 + r) / 2`, `d = (1 - r) / 2`
    pub fn net(rate: f64) -> Result<Self, GrowthRateError> {
        Self::new((1.0 + rate) / 2.0, (1.0 - rate) / 2.0)
    }

    /// Pure death process with death probability `d`
    pub fn no_birth(death: f64) -> Result<Self, GrowthRateError> {
        Self::new(0.0, death)
    }

    /// Zero net growth with total event probability `p`
    pub fn no_growth(event_prob: f64) -> Result<Self, GrowthRateError> {
        Self::new(event_prob / 2.0, event_prob / 2.0)
    }

    /// Per-cell birth probability
    pub fn birth_rate(&self) -> f64 {
        self.birth
    }

    /// Per-cell death probability
    pub fn death_rate(&self) -> f64 {
        self.death
    }

    /// Net per-cell growth probability `b - d`
    pub fn net_rate(&self) -> f64 {
        self.birth - self.death
    }

    /// Expected per-step multiplicative population growth `1 + b - d`
    pub fn growth_factor(&self) -> f64 {
        1.0 + self.birth - self.death
    }

    /// Time steps for the expected population size to double
    pub fn doubling_time(&self) -> f64 {
        2f64.ln() / self.growth_factor().ln()
    }

    /// Rescale the birth probability by `factor`, leaving death unchanged
    pub fn rescale_birth(&self, factor: f64) -> Result<Self, GrowthRateError> {
        Self::new(self.birth * factor, self.death)
    }

    /// Rescale the birth probability by `factor`, clamping at `1 - d`
    ///
    /// Used where a genotype fitness factor may push the intrinsic rate out of
    /// the valid region; saturation replaces failure.
    pub fn with_birth_factor_capped(&self, factor: f64) -> Self {
        assert!(factor >= 0.0 && factor.is_finite());
        Self {
            birth: (self.birth * factor).min(1.0 - self.death),
            death: self.death,
        }
    }

    /// Resolve event counts for `cell_count` cells under net-growth cap `cap`
    ///
    /// Explicitly sampled for populations at or below `sampling_limit`,
    /// semi-stochastically computed above it.
    pub fn resolve_count<R: Rng>(
        &self,
        cell_count: u64,
        cap: u64,
        sampling_limit: u64,
        rng: &mut R,
    ) -> GrowthCount {
        if cell_count <= sampling_limit {
            self.sample_count(cell_count, cap, rng)
        } else {
            self.compute_count(cell_count, cap, rng)
        }
    }

    /// Fully stochastic event counts: one trial per cell
    ///
    /// A birth that would push net growth above `cap` is skipped.
    pub fn sample_count<R: Rng>(&self, cell_count: u64, cap: u64, rng: &mut R) -> GrowthCount {
        let mut count = GrowthCount::default();

        for _ in 0..cell_count {
            let u = rng.gen::<f64>();
            if u < self.birth {
                if count.net_change() + 1 <= cap as i64 {
                    count.births += 1;
                }
            } else if u < self.birth + self.death {
                count.deaths += 1;
            }
        }

        count
    }

    /// Semi-stochastic event counts from the expected totals
    ///
    /// `events = discretize(N (b + d))`, deaths drawn as the death share of
    /// the events, births the remainder, then clamped to the net-growth cap.
    pub fn compute_count<R: Rng>(&self, cell_count: u64, cap: u64, rng: &mut R) -> GrowthCount {
        let event_prob = self.birth + self.death;
        if event_prob == 0.0 {
            return GrowthCount::default();
        }

        let events = distr::discretize(cell_count as f64 * event_prob, rng);
        let deaths = distr::discretize(events as f64 * self.death / event_prob, rng).min(events);
        let mut births = events - deaths;

        if births as i64 - deaths as i64 > cap as i64 {
            births = deaths + cap;
        }

        GrowthCount { births, deaths }
    }
}
