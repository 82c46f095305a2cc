//! Cache replacement policies.

mod lru;
mod random;

pub use lru::LruPolicy;
pub use random::RandomPolicy;

/// Common interface every replacement policy implements.
pub trait ReplacementPolicy {
    /// Updates policy state after an access to `way` within `set`.
    fn update(&mut self, set: usize, way: usize);

    /// Selects the way to evict within `set`.
    fn get_victim(&mut self, set: usize) -> usize;
}
