//! Sieve of Eratosthenes over candidate multipliers
//!
//! For a fixed factor `F = header_hash * fixed_multiplier`, the chain origin
//! of multiplier `m` is `F * m`. Element `k` of a first-kind chain is
//! `2^k * F * m - 1`, of a second-kind chain `2^k * F * m + 1`. Weaving a
//! prime `p` marks every `m` for which one of these is divisible by `p`,
//! so the miner only spends primality tests on multipliers that survive.

use std::sync::Arc;

use num_bigint::BigUint;
use num_integer::Integer;

use crate::chain::ChainType;
use crate::error::PrimeError;
use crate::prime_table::PrimeTable;
use crate::target::Target;

/// Lifecycle of a sieve
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SieveState {
    /// Primes are still being woven
    Building,
    /// Weaving was cut short by the caller's budget; candidates are drawn as-is
    Ready,
    /// Every prime below the sieve size (or in the table) has been woven
    Exhausted,
}

/// Multiplier that survived the sieve, with the chain type it may start
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    pub multiplier: u32,
    pub chain_type: ChainType,
}

/// Per-thread sieve for one block header
pub struct Sieve {
    table: Arc<PrimeTable>,
    sieve_size: usize,
    target: Target,
    fixed_factor: BigUint,
    composite_cunningham1: Vec<bool>,
    composite_cunningham2: Vec<bool>,
    composite_bi_twin: Vec<bool>,
    /// Index of the next prime to weave
    prime_seq: usize,
    /// Last multiplier handed out
    candidate_multiplier: usize,
    /// No multiplier is left to hand out
    depleted: bool,
    state: SieveState,
}

impl Sieve {
    pub fn new(
        sieve_size: usize,
        target: Target,
        header_hash: &BigUint,
        fixed_multiplier: &BigUint,
        table: Arc<PrimeTable>,
    ) -> Self {
        Self {
            table,
            sieve_size,
            target,
            fixed_factor: header_hash * fixed_multiplier,
            composite_cunningham1: vec![false; sieve_size],
            composite_cunningham2: vec![false; sieve_size],
            composite_bi_twin: vec![false; sieve_size],
            prime_seq: 0,
            candidate_multiplier: 0,
            depleted: false,
            state: SieveState::Building,
        }
    }

    pub fn state(&self) -> SieveState {
        self.state
    }

    pub fn sieve_size(&self) -> usize {
        self.sieve_size
    }

    /// Number of primes consumed from the table so far
    pub fn weave_count(&self) -> usize {
        self.prime_seq
    }

    /// Next prime to be woven, if the table has one
    pub fn current_prime(&self) -> Option<u32> {
        self.table.get(self.prime_seq)
    }

    /// Weave the sieve for the next prime in the table
    ///
    /// Returns `Ok(false)` once the sieve is complete: the next prime reaches
    /// the sieve size or the table runs out.
    pub fn weave(&mut self) -> Result<bool, PrimeError> {
        let p = match self.table.get(self.prime_seq) {
            Some(p) if (p as usize) < self.sieve_size => p,
            _ => {
                self.state = SieveState::Exhausted;
                return Ok(false);
            }
        };

        let fixed_residue = residue(&self.fixed_factor, p);
        if fixed_residue == 0 {
            // Nothing in the sieve is divisible by this prime
            self.prime_seq += 1;
            return Ok(true);
        }

        let prime = p as u64;
        let mut fixed_inverse =
            mod_inverse(fixed_residue as u64, prime).ok_or(PrimeError::NoModularInverse {
                value: fixed_residue as u64,
                prime: p,
            })?;
        let two_inverse =
            mod_inverse(2, prime).ok_or(PrimeError::NoModularInverse { value: 2, prime: p })?;

        let chain_length = self.target.length() as usize;
        for bi_twin_seq in 0..2 * chain_length {
            // Even positions solve F*m = 1, odd positions F*m = -1 (mod p)
            let solved = if bi_twin_seq % 2 == 0 {
                fixed_inverse
            } else {
                prime - fixed_inverse
            } as usize;
            if bi_twin_seq % 2 == 1 {
                fixed_inverse = fixed_inverse * two_inverse % prime;
            }

            if bi_twin_seq < chain_length {
                mark(&mut self.composite_bi_twin, solved, p as usize);
            }
            if bi_twin_seq % 2 == 0 {
                mark(&mut self.composite_cunningham1, solved, p as usize);
            } else {
                mark(&mut self.composite_cunningham2, solved, p as usize);
            }
        }
        self.prime_seq += 1;
        Ok(true)
    }

    /// Multipliers still open for at least one chain type
    pub fn candidate_count(&self) -> usize {
        (0..self.sieve_size).filter(|&m| self.is_open(m)).count()
    }

    /// How far weaving has progressed through the sieve range, in percent
    pub fn progress_percentage(&self) -> u32 {
        let reached = match self.table.get(self.prime_seq) {
            Some(p) => p as u64,
            None => self.sieve_size as u64,
        };
        let size = self.sieve_size.max(1) as u64;
        (reached * 100 / size).min(100) as u32
    }

    /// Whether every open multiplier has been handed out
    pub fn is_depleted(&self) -> bool {
        self.depleted
    }

    /// Scan forward for the next open multiplier
    ///
    /// Returns `None` once no open multiplier is left; the caller must build
    /// a new sieve (for a new nonce).
    pub fn next_candidate(&mut self) -> Option<Candidate> {
        if self.depleted {
            return None;
        }
        if self.state == SieveState::Building {
            self.state = SieveState::Ready;
        }
        loop {
            self.candidate_multiplier += 1;
            if self.candidate_multiplier >= self.sieve_size {
                self.depleted = true;
                return None;
            }
            let m = self.candidate_multiplier;
            if self.is_open(m) {
                let chain_type = if !self.composite_bi_twin[m] {
                    ChainType::BiTwin
                } else if !self.composite_cunningham2[m] {
                    ChainType::Cunningham2
                } else {
                    ChainType::Cunningham1
                };
                return Some(Candidate {
                    multiplier: m as u32,
                    chain_type,
                });
            }
        }
    }

    /// Whether multiplier `m` is marked composite for `chain_type`
    pub fn is_composite(&self, chain_type: ChainType, m: usize) -> bool {
        match chain_type {
            ChainType::Cunningham1 => self.composite_cunningham1[m],
            ChainType::Cunningham2 => self.composite_cunningham2[m],
            ChainType::BiTwin => self.composite_bi_twin[m],
        }
    }

    #[inline]
    fn is_open(&self, m: usize) -> bool {
        !self.composite_cunningham1[m]
            || !self.composite_cunningham2[m]
            || !self.composite_bi_twin[m]
    }
}

#[inline]
fn mark(composite: &mut [bool], start: usize, stride: usize) {
    for slot in composite.iter_mut().skip(start).step_by(stride) {
        *slot = true;
    }
}

/// n mod p for a small prime
fn residue(n: &BigUint, p: u32) -> u32 {
    (n % p).iter_u32_digits().next().unwrap_or(0)
}

/// Inverse of `a` modulo a small prime `m`
fn mod_inverse(a: u64, m: u64) -> Option<u64> {
    let m = m as i64;
    let a = (a % m as u64) as i64;
    let gcd = a.extended_gcd(&m);
    if gcd.gcd != 1 {
        return None;
    }
    Some(gcd.x.rem_euclid(m) as u64)
}
