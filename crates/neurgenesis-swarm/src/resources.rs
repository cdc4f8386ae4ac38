//! Resource autonomy: cpu/ram/net walks that run only while self-allocation is on

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Above this a resource counts as overclocked.
pub const OVERCLOCK_THRESHOLD: f64 = 100.0;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResourceMetrics {
    pub cpu: f64,
    pub ram: f64,
    pub net: f64,
}

impl Default for ResourceMetrics {
    fn default() -> Self {
        Self { cpu: 45.0, ram: 30.0, net: 20.0 }
    }
}

impl ResourceMetrics {
    /// One upward-biased step.
    pub fn step<R: Rng + ?Sized>(self, rng: &mut R) -> Self {
        Self {
            cpu: (self.cpu + (rng.gen::<f64>() - 0.3) * 10.0).clamp(20.0, 120.0),
            ram: (self.ram + (rng.gen::<f64>() - 0.4) * 5.0).clamp(30.0, 110.0),
            net: (self.net + (rng.gen::<f64>() - 0.2) * 15.0).clamp(10.0, 150.0),
        }
    }

    pub fn is_overclocked(&self) -> bool {
        self.cpu > OVERCLOCK_THRESHOLD
            || self.ram > OVERCLOCK_THRESHOLD
            || self.net > OVERCLOCK_THRESHOLD
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    #[test]
    fn walk_stays_in_bounds() {
        let mut rng = SmallRng::seed_from_u64(21);
        let mut r = ResourceMetrics::default();
        for _ in 0..2_000 {
            r = r.step(&mut rng);
            assert!((20.0..=120.0).contains(&r.cpu));
            assert!((30.0..=110.0).contains(&r.ram));
            assert!((10.0..=150.0).contains(&r.net));
        }
    }

    #[test]
    fn walk_eventually_overclocks() {
        let mut rng = SmallRng::seed_from_u64(22);
        let mut r = ResourceMetrics::default();
        assert!(!r.is_overclocked());
        for _ in 0..500 {
            r = r.step(&mut rng);
        }
        assert!(r.is_overclocked());
    }
}
