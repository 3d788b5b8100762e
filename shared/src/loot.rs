//! Probabilistic loot spawning
//!
//! Each map carries one generator. The target is one live loot item per dog;
//! every tick the generator rolls, for each vacancy, whether new loot appears
//! within the elapsed interval.

use std::time::Duration;

use rand::Rng;

/// Spawn schedule for a map's loot
#[derive(Debug, Clone, Copy)]
pub struct LootGenerator {
    /// Base interval the spawn probability is expressed over
    period: Duration,
    /// Probability that one vacancy is filled within one full period
    probability: f64,
}

impl LootGenerator {
    pub fn new(period: Duration, probability: f64) -> Self {
        Self { period, probability }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn probability(&self) -> f64 {
        self.probability
    }

    /// Number of loot items to spawn over `delta`
    ///
    /// Vacancies are dogs without a matching live loot item. Each vacancy is
    /// filled independently with probability `1 - (1 - p0)^(delta/period)`.
    pub fn generate<R: Rng>(
        &self,
        rng: &mut R,
        delta: Duration,
        live_loot: usize,
        dog_count: usize,
    ) -> usize {
        let vacancies = dog_count.saturating_sub(live_loot);
        if vacancies == 0 || self.period.is_zero() {
            return 0;
        }

        let ratio = delta.as_secs_f64() / self.period.as_secs_f64();
        let p = (1.0 - (1.0 - self.probability).powf(ratio)).clamp(0.0, 1.0);
        if p <= 0.0 {
            return 0;
        }

        (0..vacancies).filter(|_| rng.gen_bool(p)).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn generator() -> LootGenerator {
        LootGenerator::new(Duration::from_secs(5), 0.5)
    }

    #[test]
    fn test_no_vacancies_no_spawn() {
        let mut rng = SmallRng::seed_from_u64(1);
        let gen = generator();
        assert_eq!(gen.generate(&mut rng, Duration::from_secs(5), 3, 3), 0);
        assert_eq!(gen.generate(&mut rng, Duration::from_secs(5), 5, 3), 0);
    }

    #[test]
    fn test_zero_delta_no_spawn() {
        let mut rng = SmallRng::seed_from_u64(1);
        assert_eq!(generator().generate(&mut rng, Duration::ZERO, 0, 4), 0);
    }

    #[test]
    fn test_certain_probability_fills_all_vacancies() {
        let mut rng = SmallRng::seed_from_u64(1);
        let gen = LootGenerator::new(Duration::from_secs(5), 1.0);
        assert_eq!(gen.generate(&mut rng, Duration::from_secs(5), 1, 4), 3);
    }

    #[test]
    fn test_zero_probability_never_spawns() {
        let mut rng = SmallRng::seed_from_u64(1);
        let gen = LootGenerator::new(Duration::from_secs(5), 0.0);
        for _ in 0..50 {
            assert_eq!(gen.generate(&mut rng, Duration::from_secs(60), 0, 8), 0);
        }
    }

    #[test]
    fn test_spawn_count_never_exceeds_vacancies() {
        let mut rng = SmallRng::seed_from_u64(42);
        let gen = generator();
        for _ in 0..200 {
            let spawned = gen.generate(&mut rng, Duration::from_millis(500), 2, 6);
            assert!(spawned <= 4);
        }
    }

    #[test]
    fn test_longer_interval_raises_probability() {
        // Over many trials a 10x longer interval must spawn at least as much.
        let gen = generator();
        let mut rng = SmallRng::seed_from_u64(9);
        let short: usize = (0..500)
            .map(|_| gen.generate(&mut rng, Duration::from_millis(100), 0, 1))
            .sum();
        let long: usize = (0..500)
            .map(|_| gen.generate(&mut rng, Duration::from_millis(1000), 0, 1))
            .sum();
        assert!(long > short);
    }
}
