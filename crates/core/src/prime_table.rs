//! Small-prime table
//!
//! Built once per process with a sieve of Eratosthenes and shared read-only
//! (by reference or `Arc`) between verification code and mining threads.

use num_bigint::BigUint;
use num_traits::{One, Zero};

use crate::params::PRIME_TABLE_LIMIT;

/// Every prime below a fixed bound, in increasing order
#[derive(Debug, Clone)]
pub struct PrimeTable {
    primes: Vec<u32>,
    limit: u32,
}

impl PrimeTable {
    /// Sieve all primes below `limit`
    pub fn new(limit: u32) -> Self {
        let bound = limit as usize;
        let mut composite = vec![false; bound];
        let mut factor = 2usize;
        while factor * factor < bound {
            if !composite[factor] {
                let mut multiple = factor * factor;
                while multiple < bound {
                    composite[multiple] = true;
                    multiple += factor;
                }
            }
            factor += 1;
        }
        let primes: Vec<u32> = (2..bound)
            .filter(|&n| !composite[n])
            .map(|n| n as u32)
            .collect();
        log::debug!(
            "prime table [1, {}] generated with {} primes",
            limit,
            primes.len()
        );
        Self { primes, limit }
    }

    /// Table sized for the largest sieve
    pub fn standard() -> Self {
        Self::new(PRIME_TABLE_LIMIT as u32)
    }

    /// Exclusive upper bound of the table
    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn primes(&self) -> &[u32] {
        &self.primes
    }

    pub fn len(&self) -> usize {
        self.primes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.primes.is_empty()
    }

    /// The `index`-th prime (0-based)
    pub fn get(&self, index: usize) -> Option<u32> {
        self.primes.get(index).copied()
    }

    /// Smallest prime greater than `p`
    pub fn next_prime(&self, p: u32) -> Option<u32> {
        let idx = self.primes.partition_point(|&q| q <= p);
        self.primes.get(idx).copied()
    }

    /// Largest prime smaller than `p`
    pub fn previous_prime(&self, p: u32) -> Option<u32> {
        let idx = self.primes.partition_point(|&q| q < p);
        idx.checked_sub(1).map(|i| self.primes[i])
    }

    /// Primorial p#: product of all primes up to and including `p`
    pub fn primorial(&self, p: u32) -> BigUint {
        self.primes
            .iter()
            .take_while(|&&q| q <= p)
            .fold(BigUint::one(), |acc, &q| acc * q)
    }

    /// First primorial greater than or equal to `n`
    pub fn primorial_at(&self, n: &BigUint) -> BigUint {
        let mut primorial = BigUint::one();
        for &q in &self.primes {
            primorial *= q;
            if &primorial >= n {
                break;
            }
        }
        primorial
    }

    /// Write `n` as `k*p#` with the largest primorial dividing it
    pub fn primorial_form(&self, n: &BigUint) -> String {
        let mut factor = n.clone();
        let mut seq = 0usize;
        while seq < self.primes.len()
            && !factor.is_zero()
            && (&factor % self.primes[seq]).is_zero()
        {
            factor /= self.primes[seq];
            seq += 1;
        }
        let p = if seq > 0 { self.primes[seq - 1] } else { 0 };
        format!("{}*{}#", factor, p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_table() {
        let table = PrimeTable::new(30);
        assert_eq!(table.primes(), &[2, 3, 5, 7, 11, 13, 17, 19, 23, 29]);
        assert_eq!(table.limit(), 30);
    }

    #[test]
    fn test_limit_is_exclusive() {
        assert_eq!(PrimeTable::new(29).primes().last(), Some(&23));
        assert!(PrimeTable::new(2).is_empty());
    }

    #[test]
    fn test_prime_count_below_one_million() {
        assert_eq!(PrimeTable::standard().len(), 78498);
    }

    #[test]
    fn test_next_and_previous() {
        let table = PrimeTable::new(100);
        assert_eq!(table.next_prime(61), Some(67));
        assert_eq!(table.next_prime(62), Some(67));
        assert_eq!(table.next_prime(97), None);
        assert_eq!(table.previous_prime(61), Some(59));
        assert_eq!(table.previous_prime(60), Some(59));
        assert_eq!(table.previous_prime(2), None);
    }

    #[test]
    fn test_primorial() {
        let table = PrimeTable::new(100);
        assert_eq!(table.primorial(7), BigUint::from(210u32));
        assert_eq!(table.primorial(10), BigUint::from(210u32));
        assert_eq!(table.primorial(1), BigUint::one());
        assert_eq!(table.primorial(23), BigUint::from(223092870u64));
        assert_eq!(table.primorial_at(&BigUint::from(211u32)), BigUint::from(2310u32));
        assert_eq!(table.primorial_at(&BigUint::from(210u32)), BigUint::from(210u32));
    }

    #[test]
    fn test_primorial_form() {
        let table = PrimeTable::new(100);
        let n = BigUint::from(532541u64 * 223092870);
        assert_eq!(table.primorial_form(&n), "532541*23#");
        assert_eq!(table.primorial_form(&BigUint::from(9u32)), "9*0#");
    }
}
