//! Distance lookup between cities.
//!
//! Resolution is the only asynchronous step of an expense computation and
//! happens before the pipeline runs. A resolver returns `None` when the
//! distance can't be determined; callers treat that as "distance unknown".

use std::{collections::HashMap, future::Future};

use rust_decimal::Decimal;

/// Travel distance in kilometres between two places.
pub trait DistanceResolver: Send + Sync {
    fn resolve(
        &self,
        origin: &str,
        destination: &str,
    ) -> impl Future<Output = Option<Decimal>> + Send;
}

/// Fixed table of distances, looked up in either direction.
#[derive(Clone, Debug, Default)]
pub struct DistanceTable {
    distances: HashMap<(String, String), Decimal>,
}

impl DistanceTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, origin: &str, destination: &str, km: Decimal) -> Self {
        self.insert(origin, destination, km);
        self
    }

    pub fn insert(&mut self, origin: &str, destination: &str, km: Decimal) {
        self.distances
            .insert((normalize(origin), normalize(destination)), km);
    }

    #[must_use]
    pub fn get(&self, origin: &str, destination: &str) -> Option<Decimal> {
        let (a, b) = (normalize(origin), normalize(destination));
        self.distances
            .get(&(a.clone(), b.clone()))
            .or_else(|| self.distances.get(&(b, a)))
            .copied()
    }
}

impl DistanceResolver for DistanceTable {
    async fn resolve(&self, origin: &str, destination: &str) -> Option<Decimal> {
        self.get(origin, destination)
    }
}

fn normalize(place: &str) -> String {
    place.trim().to_lowercase()
}
