//! Per-thread probable prime chain miner
//!
//! Mines chains of the form `n = h * p# * m +/- 1`, where `h` is a header
//! hash divisible by the primorial hash factor, `p#` the fixed primorial
//! multiplier and `m` a sieve candidate. Each worker thread owns one
//! [`MinerContext`]; only the prime table is shared.

use std::sync::Arc;
use std::time::{Duration, Instant};

use num_bigint::BigUint;
use num_traits::{One, Zero};

use crate::block::{BlockHeader, hash_to_display_hex};
use crate::chain::{ChainType, chain_name, prime_chain_test_for_miner};
use crate::error::PrimeError;
use crate::params::{HEADER_HASH_LIMIT_BITS, MAX_SIEVE_SIZE};
use crate::pow::hash_to_biguint;
use crate::prime_table::PrimeTable;
use crate::sieve::Sieve;
use crate::target::Target;

/// Nonces at or above this value are left for extra-nonce rolling
pub const NONCE_LIMIT: u32 = 0xffff_0000;

/// Tells the miner whether the chain tip moved under it
pub trait TipWatch {
    fn tip_changed(&self) -> bool;
}

impl<F: Fn() -> bool> TipWatch for F {
    fn tip_changed(&self) -> bool {
        self()
    }
}

/// Knobs of the mining loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MinerOptions {
    pub sieve_size: usize,
    /// Wall-clock budget for building one sieve
    pub sieve_round_limit: Duration,
    /// Floor of the adaptive weave depth, in primes
    pub sieve_weave_initial: usize,
    /// Primorial embedded in the header hash (7 means 7# = 210)
    pub primorial_hash_factor: u32,
    /// Starting primorial of the fixed multiplier
    pub primorial_multiplier: u32,
    /// Time slice for testing candidates between tip checks
    pub candidate_slice: Duration,
}

impl Default for MinerOptions {
    fn default() -> Self {
        Self {
            sieve_size: MAX_SIEVE_SIZE,
            sieve_round_limit: Duration::from_millis(1000),
            sieve_weave_initial: 2000,
            primorial_hash_factor: 7,
            primorial_multiplier: 61,
            candidate_slice: Duration::from_millis(10),
        }
    }
}

/// Adaptive state carried between mining rounds
#[derive(Debug, Clone)]
pub struct MinerTuning {
    options: MinerOptions,
    primorial_multiplier: u32,
    sieve_weave_optimal: usize,
    sieve_round_shrink: bool,
    sieve_candidate_count: usize,
    sieve_ready: Option<Instant>,
    /// Average cost of one weave, microseconds
    sieve_weave_cost: u64,
    /// Average cost of one candidate test, microseconds
    primality_test_cost: u64,
    increment_primorial: bool,
    time_expected_prev: Option<f64>,
    block_rounds: RoundTotals,
}

#[derive(Debug, Clone, Copy, Default)]
struct RoundTotals {
    tests: u64,
    primes_hit: u64,
    elapsed: Duration,
}

impl MinerTuning {
    pub fn new(options: MinerOptions) -> Self {
        Self {
            options,
            primorial_multiplier: options.primorial_multiplier,
            sieve_weave_optimal: options.sieve_weave_initial,
            sieve_round_shrink: false,
            sieve_candidate_count: 0,
            sieve_ready: None,
            sieve_weave_cost: 0,
            primality_test_cost: 0,
            increment_primorial: true,
            time_expected_prev: None,
            block_rounds: RoundTotals::default(),
        }
    }

    pub fn options(&self) -> &MinerOptions {
        &self.options
    }

    pub fn primorial_multiplier(&self) -> u32 {
        self.primorial_multiplier
    }

    pub fn sieve_weave_optimal(&self) -> usize {
        self.sieve_weave_optimal
    }

    pub fn primality_test_cost(&self) -> u64 {
        self.primality_test_cost
    }

    /// Largest prime the adaptive weave depth reaches
    pub fn sieve_weave_optimal_prime(&self, table: &PrimeTable) -> u32 {
        table.get(self.sieve_weave_optimal).unwrap_or(table.limit())
    }

    pub fn timer_set_sieve_ready(&mut self, candidate_count: usize, at: Instant) {
        self.sieve_candidate_count = candidate_count;
        self.sieve_ready = Some(at);
    }

    /// Every candidate of the sieve has been tested
    pub fn timer_set_primality_done(&mut self, at: Instant) {
        if let Some(ready) = self.sieve_ready.take() {
            let elapsed = at.saturating_duration_since(ready).as_micros() as u64;
            self.primality_test_cost = elapsed / self.sieve_candidate_count.max(1) as u64;
        }
    }

    /// Weaving stopped early (budget or tip change) below the optimal depth
    pub fn set_sieve_weave_count(&mut self, weave_count: usize) {
        if weave_count < self.sieve_weave_optimal {
            self.sieve_weave_optimal = weave_count.max(self.options.sieve_weave_initial);
        }
    }

    /// Shrink the weave depth when one more weave costs more than the tests it saves
    pub fn set_sieve_weave_cost(&mut self, weave_cost: u64, composites: usize) {
        self.sieve_weave_cost = weave_cost;
        self.sieve_round_shrink = weave_cost > composites as u64 * self.primality_test_cost;
    }

    pub fn adjust_sieve_weave_optimal(&mut self, table_len: usize) {
        if self.sieve_round_shrink {
            self.sieve_weave_optimal =
                (self.sieve_weave_optimal * 95 / 100 + 1).max(self.options.sieve_weave_initial);
        } else {
            self.sieve_weave_optimal = (self.sieve_weave_optimal * 100 / 95).min(table_len);
        }
    }

    /// Fixed multiplier `p# / r#` for the current primorial `p` and hash factor `r`
    pub fn fixed_multiplier(&self, table: &PrimeTable) -> BigUint {
        if self.primorial_multiplier > self.options.primorial_hash_factor {
            table.primorial(self.primorial_multiplier)
                / table.primorial(self.options.primorial_hash_factor)
        } else {
            BigUint::one()
        }
    }

    /// Probability that a number on a sieved candidate chain is prime
    ///
    /// A candidate near `2^255 * 1.5 * p# * sieve_size / 2` is prime with
    /// probability `1 / ln(n)`; sieving up to prime `q` raises that by the
    /// Mertens factor `1.781072 * ln(q)`.
    pub fn estimate_candidate_prime_probability(&self, table: &PrimeTable) -> f64 {
        let weave_prime = self.sieve_weave_optimal_prime(table).max(1) as f64;
        let average_multiplier = (self.options.sieve_size / 2).max(1) as f64;
        let fixed_log: f64 = table
            .primes()
            .iter()
            .take_while(|&&p| p <= self.primorial_multiplier)
            .map(|&p| (p as f64).ln())
            .sum();
        1.781072 * weave_prime.ln()
            / (HEADER_HASH_LIMIT_BITS as f64 * 2f64.ln()
                + 1.5f64.ln()
                + fixed_log
                + average_multiplier.ln())
    }

    /// Account a finished round toward the primorial adjustment
    pub fn record_round(&mut self, round: &MineRound, elapsed: Duration) {
        self.block_rounds.tests += round.tests as u64;
        self.block_rounds.primes_hit += round.primes_hit as u64;
        self.block_rounds.elapsed += elapsed;
    }

    /// Expected microseconds to find a chain of `target_length` at the
    /// current primorial multiplier, from the rounds recorded so far
    pub fn expected_block_time(&self, target_length: u32, table: &PrimeTable) -> f64 {
        let mut tests = self.block_rounds.tests.max(1) as f64;
        // Rounds without a single prime are treated as hopeless
        if self.block_rounds.primes_hit == 0 {
            tests *= 1000.0;
        }
        let per_test = self.block_rounds.elapsed.as_micros() as f64 / tests;
        let probability = self.estimate_candidate_prime_probability(table);
        per_test / probability.powi(target_length as i32)
    }

    /// Step the primorial multiplier toward a shorter expected block time
    ///
    /// Keeps moving in the same direction while the estimate improves and
    /// turns around once it gets worse. Never drops to the hash factor.
    pub fn adjust_primorial_multiplier(&mut self, target_length: u32, table: &PrimeTable) {
        let expected = self.expected_block_time(target_length, table);
        if self.time_expected_prev.is_some_and(|prev| expected > prev) {
            self.increment_primorial = !self.increment_primorial;
        }
        if self.increment_primorial {
            if let Some(next) = table.next_prime(self.primorial_multiplier) {
                self.primorial_multiplier = next;
            }
        } else if let Some(prev) = table.previous_prime(self.primorial_multiplier) {
            if prev > self.options.primorial_hash_factor {
                self.primorial_multiplier = prev;
            }
        }
        log::debug!(
            "primorial multiplier {} expected={:.0}us",
            self.primorial_multiplier,
            expected
        );
        self.time_expected_prev = Some(expected);
        self.block_rounds = RoundTotals::default();
    }
}

/// How a mining round ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MineOutcome {
    /// A chain meeting the target; the header carries the multiplier
    Found {
        multiplier: BigUint,
        chain_type: ChainType,
        length: Target,
    },
    /// The time slice ran out; call again to continue with the same sieve
    TimedOut,
    /// The sieve is exhausted; change the nonce and call again
    NeedNewBlock,
    /// The chain tip moved; build on the new tip
    TipChanged,
}

/// Result and statistics of one round
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MineRound {
    pub outcome: MineOutcome,
    /// Candidates drawn from the sieve
    pub tests: u32,
    /// Candidates that started with at least one prime
    pub primes_hit: u32,
    pub tried_multiplier: u32,
    /// Length reached by the last tested candidate
    pub probable_length: Target,
}

/// Mining state owned by one worker thread
pub struct MinerContext {
    table: Arc<PrimeTable>,
    sieve: Option<Sieve>,
    tuning: MinerTuning,
}

impl MinerContext {
    pub fn new(table: Arc<PrimeTable>, options: MinerOptions) -> Self {
        Self {
            table,
            sieve: None,
            tuning: MinerTuning::new(options),
        }
    }

    pub fn table(&self) -> &Arc<PrimeTable> {
        &self.table
    }

    pub fn tuning(&self) -> &MinerTuning {
        &self.tuning
    }

    pub fn tuning_mut(&mut self) -> &mut MinerTuning {
        &mut self.tuning
    }

    /// Whether a sieve for the current header is still in use
    pub fn has_sieve(&self) -> bool {
        self.sieve.is_some()
    }

    /// Drop the sieve, e.g. after the header changed
    pub fn reset_sieve(&mut self) {
        self.sieve = None;
    }

    /// Fixed multiplier for the current primorial setting
    pub fn fixed_multiplier(&self) -> BigUint {
        self.tuning.fixed_multiplier(&self.table)
    }

    /// Run one mining round on `header`
    ///
    /// Builds a sieve for the header when none is held, then tests
    /// candidates for one time slice. On success the multiplier is written
    /// into `header`. A tip change drops the sieve, so the next call weaves
    /// one for the new header.
    pub fn mine_probable_prime_chain<W: TipWatch>(
        &mut self,
        header: &mut BlockHeader,
        fixed_multiplier: &BigUint,
        tip: &W,
    ) -> Result<MineRound, PrimeError> {
        let target = header.target();
        let header_hash = hash_to_biguint(&header.header_hash());

        let mut round = MineRound {
            outcome: MineOutcome::TimedOut,
            tests: 0,
            primes_hit: 0,
            tried_multiplier: 0,
            probable_length: Target::default(),
        };

        if self.sieve.is_none() {
            match self.build_sieve(target, &header_hash, fixed_multiplier, tip)? {
                Some(sieve) => self.sieve = Some(sieve),
                None => {
                    round.outcome = MineOutcome::TipChanged;
                    return Ok(round);
                }
            }
        }

        let Some(sieve) = self.sieve.as_mut() else {
            return Ok(round);
        };

        let base = &header_hash * fixed_multiplier;
        let start = Instant::now();
        loop {
            if start.elapsed() >= self.tuning.options.candidate_slice {
                break;
            }
            if tip.tip_changed() {
                round.outcome = MineOutcome::TipChanged;
                break;
            }
            let Some(candidate) = sieve.next_candidate() else {
                round.outcome = MineOutcome::NeedNewBlock;
                break;
            };
            round.tests += 1;
            round.tried_multiplier = candidate.multiplier;

            let origin = &base * candidate.multiplier;
            let (length, found) =
                prime_chain_test_for_miner(&origin, target, candidate.chain_type)?;
            round.probable_length = length;
            if found {
                header.multiplier = fixed_multiplier * candidate.multiplier;
                log::debug!(
                    "probable prime chain found for block={} target={} chain={}",
                    hash_to_display_hex(&header.block_hash()),
                    target,
                    chain_name(candidate.chain_type, length)
                );
                round.outcome = MineOutcome::Found {
                    multiplier: header.multiplier.clone(),
                    chain_type: candidate.chain_type,
                    length,
                };
                break;
            }
            if length.length() >= 1 {
                round.primes_hit += 1;
            }
        }

        match round.outcome {
            MineOutcome::NeedNewBlock => {
                self.tuning.timer_set_primality_done(Instant::now());
                self.sieve = None;
            }
            MineOutcome::TipChanged => self.sieve = None,
            _ => {}
        }
        Ok(round)
    }

    /// Weave a new sieve under the count and wall-clock budget
    ///
    /// Returns `None` when the tip changes while weaving.
    fn build_sieve<W: TipWatch>(
        &mut self,
        target: Target,
        header_hash: &BigUint,
        fixed_multiplier: &BigUint,
        tip: &W,
    ) -> Result<Option<Sieve>, PrimeError> {
        let options = self.tuning.options;
        let mut sieve = Sieve::new(
            options.sieve_size,
            target,
            header_hash,
            fixed_multiplier,
            self.table.clone(),
        );

        let start = Instant::now();
        let mut weave_times = 0usize;
        while sieve.weave()? {
            if tip.tip_changed() {
                log::debug!("tip changed, sieve abandoned after {} weaves", weave_times);
                return Ok(None);
            }
            if start.elapsed() >= options.sieve_round_limit {
                break;
            }
            weave_times += 1;
            if weave_times >= self.tuning.sieve_weave_optimal {
                break;
            }
        }
        let ready = Instant::now();
        let elapsed = ready.duration_since(start).as_micros() as u64;
        let weave_cost = elapsed / weave_times.max(1) as u64;

        // One more weave measures how many candidates a weave removes
        let before = sieve.candidate_count();
        sieve.weave()?;
        let candidate_count = sieve.candidate_count();
        let composites = before.saturating_sub(candidate_count);

        log::debug!(
            "new sieve ({}/{}@{}/{}) ready in {}us test cost={}us",
            candidate_count,
            options.sieve_size,
            self.table.get(weave_times).unwrap_or(self.table.limit()),
            self.tuning.sieve_weave_optimal_prime(&self.table),
            elapsed,
            self.tuning.primality_test_cost
        );

        self.tuning.timer_set_sieve_ready(candidate_count, ready);
        self.tuning.set_sieve_weave_count(weave_times);
        self.tuning.set_sieve_weave_cost(weave_cost, composites);
        self.tuning.adjust_sieve_weave_optimal(self.table.len());
        Ok(Some(sieve))
    }
}

/// Advance the nonce until the header hash is at least 2^255 and divisible
/// by `hash_factor`
///
/// Returns `false` when the nonce reaches `limit` first.
pub fn find_header_nonce(header: &mut BlockHeader, hash_factor: &BigUint, limit: u32) -> bool {
    let hash_limit = BigUint::one() << HEADER_HASH_LIMIT_BITS;
    while header.nonce < limit {
        let hash = hash_to_biguint(&header.header_hash());
        if hash >= hash_limit && (&hash % hash_factor).is_zero() {
            return true;
        }
        header.nonce += 1;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Rejection;
    use crate::params::Network;
    use crate::pow::check_prime_proof_of_work;

    fn test_options() -> MinerOptions {
        MinerOptions {
            sieve_size: 20_000,
            sieve_round_limit: Duration::from_millis(500),
            sieve_weave_initial: 100,
            ..MinerOptions::default()
        }
    }

    #[test]
    fn test_weave_depth_adjustment() {
        let mut tuning = MinerTuning::new(test_options());
        assert_eq!(tuning.sieve_weave_optimal(), 100);

        tuning.set_sieve_weave_cost(10, 0);
        tuning.adjust_sieve_weave_optimal(1000);
        // Shrinking never goes below the initial depth
        assert_eq!(tuning.sieve_weave_optimal(), 100);

        tuning.set_sieve_weave_cost(0, 10);
        tuning.adjust_sieve_weave_optimal(1000);
        assert_eq!(tuning.sieve_weave_optimal(), 105);
        tuning.adjust_sieve_weave_optimal(106);
        assert_eq!(tuning.sieve_weave_optimal(), 106);

        tuning.set_sieve_weave_count(50);
        assert_eq!(tuning.sieve_weave_optimal(), 100);
    }

    #[test]
    fn test_primality_test_cost() {
        let mut tuning = MinerTuning::new(test_options());
        let ready = Instant::now();
        tuning.timer_set_sieve_ready(100, ready);
        tuning.timer_set_primality_done(ready + Duration::from_millis(50));
        assert_eq!(tuning.primality_test_cost(), 500);
    }

    #[test]
    fn test_fixed_multiplier() {
        let table = PrimeTable::new(1000);
        let tuning = MinerTuning::new(test_options());
        // 61# / 7#
        let expected = table.primorial(61) / 210u32;
        assert_eq!(tuning.fixed_multiplier(&table), expected);

        let tuning = MinerTuning::new(MinerOptions {
            primorial_multiplier: 7,
            ..test_options()
        });
        assert_eq!(tuning.fixed_multiplier(&table), BigUint::one());
    }

    #[test]
    fn test_prime_probability_grows_with_weave_depth() {
        let table = PrimeTable::new(100_000);
        let shallow = MinerTuning::new(test_options());
        let deep = MinerTuning::new(MinerOptions {
            sieve_weave_initial: 5000,
            ..test_options()
        });
        let p1 = shallow.estimate_candidate_prime_probability(&table);
        let p2 = deep.estimate_candidate_prime_probability(&table);
        assert!(p1 > 0.0 && p1 < 1.0);
        assert!(p2 > p1);
    }

    #[test]
    fn test_primorial_adjustment_turns_around() {
        let table = PrimeTable::new(1000);
        let mut tuning = MinerTuning::new(test_options());
        let round = MineRound {
            outcome: MineOutcome::TimedOut,
            tests: 100,
            primes_hit: 10,
            tried_multiplier: 0,
            probable_length: Target::default(),
        };
        tuning.record_round(&round, Duration::from_millis(10));
        tuning.adjust_primorial_multiplier(2, &table);
        assert_eq!(tuning.primorial_multiplier(), 67);

        // Much slower now: turn around
        tuning.record_round(&round, Duration::from_secs(10));
        tuning.adjust_primorial_multiplier(2, &table);
        assert_eq!(tuning.primorial_multiplier(), 61);
    }

    #[test]
    fn test_find_header_nonce() {
        let mut header = BlockHeader::genesis(Network::Test);
        header.nonce = 0;
        let factor = BigUint::from(210u32);
        assert!(find_header_nonce(&mut header, &factor, NONCE_LIMIT));
        let hash = hash_to_biguint(&header.header_hash());
        assert!((&hash % 210u32).is_zero());
        assert!(hash.bits() == 256);

        let mut header = BlockHeader::genesis(Network::Test);
        header.nonce = 10;
        assert!(!find_header_nonce(&mut header, &factor, 10));
    }

    #[test]
    fn test_tip_change_stops_round() {
        let table = Arc::new(PrimeTable::new(100_000));
        let mut miner = MinerContext::new(table, test_options());
        let mut header = BlockHeader::genesis(Network::Test);
        header.bits = Target::from_length(2).bits();
        header.nonce = 0;
        assert!(find_header_nonce(&mut header, &BigUint::from(210u32), NONCE_LIMIT));
        let fixed = miner.fixed_multiplier();
        let round = miner
            .mine_probable_prime_chain(&mut header, &fixed, &|| true)
            .unwrap();
        assert_eq!(round.outcome, MineOutcome::TipChanged);
        assert_eq!(round.tests, 0);
        assert!(!miner.has_sieve());
    }

    #[test]
    fn test_tip_change_drops_built_sieve() {
        let table = Arc::new(PrimeTable::new(100_000));
        let options = MinerOptions {
            candidate_slice: Duration::ZERO,
            ..test_options()
        };
        let mut miner = MinerContext::new(table, options);
        let mut header = BlockHeader::genesis(Network::Test);
        header.bits = Target::from_length(2).bits();
        header.nonce = 0;
        assert!(find_header_nonce(&mut header, &BigUint::from(210u32), NONCE_LIMIT));
        let fixed = miner.fixed_multiplier();

        // An empty time slice builds the sieve and stops before testing
        let round = miner
            .mine_probable_prime_chain(&mut header, &fixed, &|| false)
            .unwrap();
        assert_eq!(round.outcome, MineOutcome::TimedOut);
        assert!(miner.has_sieve());

        let mut options = *miner.tuning().options();
        options.candidate_slice = Duration::from_secs(1);
        miner.tuning_mut().options = options;
        let round = miner
            .mine_probable_prime_chain(&mut header, &fixed, &|| true)
            .unwrap();
        assert_eq!(round.outcome, MineOutcome::TipChanged);
        assert!(!miner.has_sieve());
    }

    #[test]
    fn test_exhausting_round_counts_only_drawn_candidates() {
        const SIZE: usize = 50;
        let table = Arc::new(PrimeTable::new(1000));
        let options = MinerOptions {
            sieve_size: SIZE,
            sieve_weave_initial: 100,
            candidate_slice: Duration::from_secs(5),
            ..test_options()
        };
        let mut miner = MinerContext::new(table.clone(), options);
        let mut header = BlockHeader::genesis(Network::Test);
        // Far beyond anything a 50-slot sieve yields
        header.bits = Target::from_length(10).bits();
        header.nonce = 0;
        assert!(find_header_nonce(&mut header, &BigUint::from(210u32), NONCE_LIMIT));
        let fixed = miner.fixed_multiplier();

        let hash = hash_to_biguint(&header.header_hash());
        let mut reference = Sieve::new(SIZE, header.target(), &hash, &fixed, table);
        while reference.weave().unwrap() {}
        let mut open = 0;
        while reference.next_candidate().is_some() {
            open += 1;
        }

        let round = miner
            .mine_probable_prime_chain(&mut header, &fixed, &|| false)
            .unwrap();
        assert_eq!(round.outcome, MineOutcome::NeedNewBlock);
        assert_eq!(round.tests, open);
        assert!(!miner.has_sieve());
    }

    #[test]
    fn test_mined_chain_verifies() {
        let params = Network::Test.params();
        let table = Arc::new(PrimeTable::new(100_000));
        let mut miner = MinerContext::new(table.clone(), test_options());

        let mut header = BlockHeader::genesis(Network::Test);
        header.bits = Target::from_length(2).bits();
        header.nonce = 0;
        let hash_factor = table.primorial(miner.tuning().options().primorial_hash_factor);
        assert!(find_header_nonce(&mut header, &hash_factor, NONCE_LIMIT));

        let fixed = miner.fixed_multiplier();
        let never = || false;
        let mut verified = false;
        for _ in 0..10_000 {
            let round = miner.mine_probable_prime_chain(&mut header, &fixed, &never).unwrap();
            match round.outcome {
                MineOutcome::Found { multiplier, length, .. } => {
                    assert!(length >= Target::from_length(2));
                    match check_prime_proof_of_work(
                        &header.header_hash(),
                        header.target(),
                        &multiplier,
                        &params,
                    ) {
                        Ok(proof) => {
                            assert!(proof.length >= length);
                            verified = true;
                            break;
                        }
                        // A halved multiplier certifies a longer chain; keep mining
                        Err(Rejection::NotNormalized { .. }) => continue,
                        Err(other) => panic!("mined chain rejected: {}", other),
                    }
                }
                MineOutcome::NeedNewBlock => {
                    header.nonce += 1;
                    assert!(find_header_nonce(&mut header, &hash_factor, NONCE_LIMIT));
                }
                MineOutcome::TimedOut => {}
                MineOutcome::TipChanged => unreachable!(),
            }
        }
        assert!(verified);
    }
}
