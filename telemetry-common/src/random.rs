use rand::Rng;

/// Source of uniformly distributed random numbers.
pub trait Random: Send + Sync {
    /// Returns a random number in `[0, 1)`.
    fn next_number(&self) -> f64;
}

/// A [`Random`] backed by the thread-local generator of the `rand` crate.
#[derive(Clone, Copy, Debug, Default)]
pub struct ThreadRandom;

impl Random for ThreadRandom {
    fn next_number(&self) -> f64 {
        rand::rng().random::<f64>()
    }
}

/// A [`Random`] that always returns the same number.
#[cfg(any(test, feature = "test"))]
#[derive(Clone, Copy, Debug)]
pub struct TestRandom(pub f64);

#[cfg(any(test, feature = "test"))]
impl Random for TestRandom {
    fn next_number(&self) -> f64 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thread_random_in_range() {
        for _ in 0..1000 {
            let n = ThreadRandom.next_number();
            assert!((0.0..1.0).contains(&n));
        }
    }
}
