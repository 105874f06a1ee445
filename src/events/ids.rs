//! Correlation id generation

use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

/// Source of correlation ids, one per fetch attempt
///
/// Implementations must hand out distinct ids even when called from many
/// fetch tasks at once.
pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> String;
}

/// Random 128-bit ids rendered as 32 lowercase hex characters
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidIdGenerator;

impl IdGenerator for UuidIdGenerator {
    fn next_id(&self) -> String {
        Uuid::new_v4().simple().to_string()
    }
}

/// Deterministic ids (`<prefix>1`, `<prefix>2`, ...) for reproducible output
#[derive(Debug)]
pub struct CounterIdGenerator {
    prefix: String,
    next: AtomicU64,
}

impl CounterIdGenerator {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: AtomicU64::new(1),
        }
    }
}

impl Default for CounterIdGenerator {
    fn default() -> Self {
        Self::new("")
    }
}

impl IdGenerator for CounterIdGenerator {
    fn next_id(&self) -> String {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        format!("{}{}", self.prefix, n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn test_uuid_ids_are_hex() {
        let id = UuidIdGenerator.next_id();
        assert_eq!(id.len(), 32);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_counter_ids() {
        let ids = CounterIdGenerator::new("page-");
        assert_eq!(ids.next_id(), "page-1");
        assert_eq!(ids.next_id(), "page-2");
    }

    #[test]
    fn test_default_counter_starts_at_one() {
        let ids = CounterIdGenerator::default();
        assert_eq!(ids.next_id(), "1");
        assert_eq!(ids.next_id(), "2");
    }

    #[test]
    fn test_concurrent_ids_are_unique() {
        let generators: Vec<Arc<dyn IdGenerator>> = vec![
            Arc::new(UuidIdGenerator),
            Arc::new(CounterIdGenerator::new("")),
        ];

        for ids in generators {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    let ids = Arc::clone(&ids);
                    std::thread::spawn(move || (0..500).map(|_| ids.next_id()).collect::<Vec<_>>())
                })
                .collect();

            let mut seen = HashSet::new();
            for handle in handles {
                for id in handle.join().unwrap() {
                    assert!(seen.insert(id), "duplicate id generated");
                }
            }
            assert_eq!(seen.len(), 8 * 500);
        }
    }
}
