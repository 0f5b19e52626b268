//! Multi-threaded mining pool
//!
//! Every thread owns a [`MinerContext`] and mines its own synthetic block
//! template built on the network's genesis block. Threads share only the
//! prime table, the counters and the list of verified proofs.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::algorithm::{
    BigUint, BlockHeader, ChainType, MAX_TARGET_LENGTH, MineOutcome, MinerContext, MinerOptions,
    NONCE_LIMIT, Network, PrimeTable, Rejection, Target, chain_name, check_prime_proof_of_work,
    find_header_nonce, hash_to_biguint, hash_to_display_hex, origin_primorial_form,
};

/// What to mine
#[derive(Debug, Clone)]
pub struct MiningJob {
    pub network: Network,
    pub target: Target,
    pub threads: usize,
    pub options: MinerOptions,
    /// Stop after the first verified proof
    pub once: bool,
}

/// A chain that passed the full verifier
#[derive(Debug, Clone)]
pub struct FoundProof {
    pub header: BlockHeader,
    pub chain_type: ChainType,
    pub length: Target,
    pub thread_id: usize,
}

/// Printable record of a found proof
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofReport {
    pub network: String,
    pub header_hash: String,
    pub block_hash: String,
    pub bits: String,
    pub time: u32,
    pub nonce: u32,
    pub multiplier: String,
    pub chain: String,
    pub primorial_form: String,
}

impl ProofReport {
    pub fn new(network: Network, proof: &FoundProof, table: &PrimeTable) -> Self {
        let header = &proof.header;
        let origin = hash_to_biguint(&header.header_hash()) * &header.multiplier;
        Self {
            network: network.name().to_string(),
            header_hash: hash_to_display_hex(&header.header_hash()),
            block_hash: hash_to_display_hex(&header.block_hash()),
            bits: format!("{:08x}", header.bits),
            time: header.time,
            nonce: header.nonce,
            multiplier: header.multiplier.to_str_radix(10),
            chain: chain_name(proof.chain_type, proof.length),
            primorial_form: origin_primorial_form(&origin, table),
        }
    }
}

/// Counters shared by all threads
#[derive(Debug, Default)]
pub struct MiningStats {
    tests: AtomicU64,
    primes_hit: AtomicU64,
    sieves: AtomicU64,
    templates: AtomicU64,
    proofs: AtomicU64,
}

/// Point-in-time copy of [`MiningStats`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StatsSnapshot {
    pub tests: u64,
    pub primes_hit: u64,
    pub sieves: u64,
    pub templates: u64,
    pub proofs: u64,
    pub elapsed_secs: f64,
}

impl StatsSnapshot {
    pub fn tests_per_second(&self) -> f64 {
        if self.elapsed_secs > 0.0 {
            self.tests as f64 / self.elapsed_secs
        } else {
            0.0
        }
    }
}

/// Running pool of mining threads
pub struct MiningPool {
    job: MiningJob,
    table: Arc<PrimeTable>,
    stats: Arc<MiningStats>,
    stop: Arc<AtomicBool>,
    found: Arc<Mutex<Vec<FoundProof>>>,
    handles: Vec<JoinHandle<anyhow::Result<()>>>,
    start: Instant,
}

impl MiningPool {
    /// Spawn `job.threads` mining threads sharing `table`
    pub fn start(job: MiningJob, table: Arc<PrimeTable>) -> anyhow::Result<Self> {
        if job.threads == 0 {
            anyhow::bail!("at least one mining thread is required");
        }
        let params = job.network.params();
        if job.target < Target::limit(&params) {
            anyhow::bail!(
                "target {} below the {} network minimum {}",
                job.target,
                job.network.name(),
                Target::limit(&params)
            );
        }
        if job.target.length() > MAX_TARGET_LENGTH {
            anyhow::bail!(
                "target {} above the maximum chain length {}",
                job.target,
                MAX_TARGET_LENGTH
            );
        }

        let stats = Arc::new(MiningStats::default());
        let stop = Arc::new(AtomicBool::new(false));
        let found = Arc::new(Mutex::new(Vec::new()));

        let mut handles = Vec::with_capacity(job.threads);
        for thread_id in 0..job.threads {
            let job = job.clone();
            let table = Arc::clone(&table);
            let stats = Arc::clone(&stats);
            let stop = Arc::clone(&stop);
            let found = Arc::clone(&found);
            let handle = std::thread::Builder::new()
                .name(format!("miner-{}", thread_id))
                .spawn(move || mine_thread(thread_id, &job, table, &stats, &stop, &found))
                .context("failed to spawn mining thread")?;
            handles.push(handle);
        }

        log::info!(
            "started {} mining threads on {} at target {}",
            job.threads,
            job.network.name(),
            job.target
        );
        Ok(Self {
            job,
            table,
            stats,
            stop,
            found,
            handles,
            start: Instant::now(),
        })
    }

    pub fn job(&self) -> &MiningJob {
        &self.job
    }

    pub fn table(&self) -> &Arc<PrimeTable> {
        &self.table
    }

    /// Ask every thread to stop; running sieves are abandoned
    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// Whether every thread has exited
    pub fn is_finished(&self) -> bool {
        self.handles.iter().all(|h| h.is_finished())
    }

    /// Proofs found since the last call
    pub fn take_found(&self) -> Vec<FoundProof> {
        match self.found.lock() {
            Ok(mut guard) => std::mem::take(&mut *guard),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            tests: self.stats.tests.load(Ordering::Relaxed),
            primes_hit: self.stats.primes_hit.load(Ordering::Relaxed),
            sieves: self.stats.sieves.load(Ordering::Relaxed),
            templates: self.stats.templates.load(Ordering::Relaxed),
            proofs: self.stats.proofs.load(Ordering::Relaxed),
            elapsed_secs: self.start.elapsed().as_secs_f64(),
        }
    }

    /// Stop and wait for all threads; the first thread error is returned
    pub fn join(self) -> anyhow::Result<StatsSnapshot> {
        self.stop();
        let snapshot = self.snapshot();
        let mut first_error = None;
        for handle in self.handles {
            let result = match handle.join() {
                Ok(result) => result,
                Err(_) => Err(anyhow::anyhow!("mining thread panicked")),
            };
            if let Err(e) = result {
                log::error!("mining thread failed: {:#}", e);
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(snapshot),
        }
    }
}

/// Fresh template on top of the genesis block with a random merkle root
pub fn block_template(network: Network, target: Target) -> anyhow::Result<BlockHeader> {
    let genesis = BlockHeader::genesis(network);
    let mut merkle_root = [0u8; 32];
    getrandom::getrandom(&mut merkle_root)
        .map_err(|e| anyhow::anyhow!("failed to generate merkle root: {}", e))?;
    let time = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as u32)
        .unwrap_or(genesis.time);
    Ok(BlockHeader {
        version: genesis.version,
        prev_hash: genesis.block_hash(),
        merkle_root,
        time,
        bits: target.bits(),
        nonce: 0,
        multiplier: BigUint::default(),
    })
}

fn mine_thread(
    thread_id: usize,
    job: &MiningJob,
    table: Arc<PrimeTable>,
    stats: &MiningStats,
    stop: &AtomicBool,
    found: &Mutex<Vec<FoundProof>>,
) -> anyhow::Result<()> {
    let params = job.network.params();
    let hash_factor = table.primorial(job.options.primorial_hash_factor);
    let mut miner = MinerContext::new(Arc::clone(&table), job.options);
    let tip_changed = || stop.load(Ordering::Relaxed);

    let mut header = block_template(job.network, job.target)?;
    stats.templates.fetch_add(1, Ordering::Relaxed);

    'template: while !stop.load(Ordering::Relaxed) {
        if !find_header_nonce(&mut header, &hash_factor, NONCE_LIMIT) {
            header = block_template(job.network, job.target)?;
            stats.templates.fetch_add(1, Ordering::Relaxed);
            continue;
        }
        miner.reset_sieve();
        let fixed = miner.fixed_multiplier();

        loop {
            let round_start = Instant::now();
            let round = miner.mine_probable_prime_chain(&mut header, &fixed, &tip_changed)?;
            stats.tests.fetch_add(round.tests as u64, Ordering::Relaxed);
            stats.primes_hit.fetch_add(round.primes_hit as u64, Ordering::Relaxed);
            miner.tuning_mut().record_round(&round, round_start.elapsed());

            match round.outcome {
                MineOutcome::TimedOut => {}
                MineOutcome::TipChanged => break 'template,
                MineOutcome::NeedNewBlock => {
                    stats.sieves.fetch_add(1, Ordering::Relaxed);
                    miner
                        .tuning_mut()
                        .adjust_primorial_multiplier(job.target.length(), &table);
                    header.nonce += 1;
                    continue 'template;
                }
                MineOutcome::Found { multiplier, .. } => {
                    match check_prime_proof_of_work(
                        &header.header_hash(),
                        header.target(),
                        &multiplier,
                        &params,
                    ) {
                        Ok(proof) => {
                            log::info!(
                                "thread {} found {} at nonce {}",
                                thread_id,
                                chain_name(proof.chain_type, proof.length),
                                header.nonce
                            );
                            stats.proofs.fetch_add(1, Ordering::Relaxed);
                            let entry = FoundProof {
                                header: header.clone(),
                                chain_type: proof.chain_type,
                                length: proof.length,
                                thread_id,
                            };
                            match found.lock() {
                                Ok(mut guard) => guard.push(entry),
                                Err(poisoned) => poisoned.into_inner().push(entry),
                            }
                            if job.once {
                                stop.store(true, Ordering::SeqCst);
                                break 'template;
                            }
                            header.nonce += 1;
                            continue 'template;
                        }
                        Err(Rejection::NotNormalized { target }) => {
                            // Halving the multiplier gives a longer chain; keep going
                            log::debug!("skipping non-normalized chain at target {}", target);
                        }
                        Err(rejection) => {
                            log::warn!("mined chain rejected by verifier: {}", rejection);
                        }
                    }
                }
            }
        }
    }
    log::debug!("mining thread {} stopped", thread_id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn test_job(threads: usize) -> MiningJob {
        MiningJob {
            network: Network::Test,
            target: Target::from_length(2),
            threads,
            options: MinerOptions {
                sieve_size: 20_000,
                sieve_round_limit: Duration::from_millis(200),
                sieve_weave_initial: 100,
                ..MinerOptions::default()
            },
            once: true,
        }
    }

    #[test]
    fn test_block_template() {
        let a = block_template(Network::Test, Target::from_length(2)).unwrap();
        let b = block_template(Network::Test, Target::from_length(2)).unwrap();
        assert_ne!(a.merkle_root, b.merkle_root);
        assert_eq!(a.prev_hash, BlockHeader::genesis(Network::Test).block_hash());
        assert_eq!(a.bits, 0x02000000);
        assert_eq!(a.nonce, 0);
    }

    #[test]
    fn test_rejects_bad_jobs() {
        let table = Arc::new(PrimeTable::new(10_000));
        assert!(MiningPool::start(test_job(0), Arc::clone(&table)).is_err());

        let job = MiningJob {
            network: Network::Main,
            target: Target::from_length(3),
            ..test_job(1)
        };
        assert!(MiningPool::start(job, Arc::clone(&table)).is_err());

        // No proof above length 99 passes the header bounds check
        let job = MiningJob {
            target: Target::from_length(MAX_TARGET_LENGTH + 1),
            ..test_job(1)
        };
        assert!(MiningPool::start(job, Arc::clone(&table)).is_err());

        let job = MiningJob {
            target: Target::from_bits(0x63ffffff),
            ..test_job(1)
        };
        let pool = MiningPool::start(job, table).unwrap();
        pool.join().unwrap();
    }

    #[test]
    fn test_pool_finds_verified_proof() {
        let table = Arc::new(PrimeTable::new(100_000));
        let pool = MiningPool::start(test_job(2), Arc::clone(&table)).unwrap();

        let deadline = Instant::now() + Duration::from_secs(120);
        while !pool.is_stopped() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(20));
        }
        let found = pool.take_found();
        let snapshot = pool.join().unwrap();

        assert!(!found.is_empty());
        assert!(snapshot.proofs >= 1);
        assert!(snapshot.tests > 0);

        let params = Network::Test.params();
        for proof in &found {
            let header = &proof.header;
            let checked = check_prime_proof_of_work(
                &header.header_hash(),
                header.target(),
                &header.multiplier,
                &params,
            )
            .unwrap();
            assert_eq!(checked.length, proof.length);

            let report = ProofReport::new(Network::Test, proof, &table);
            assert_eq!(report.bits, "02000000");
            assert_eq!(report.header_hash, hash_to_display_hex(&header.header_hash()));
            assert!(report.primorial_form.contains('#'));
            let json = serde_json::to_string(&report).unwrap();
            let parsed: ProofReport = serde_json::from_str(&json).unwrap();
            assert_eq!(parsed, report);
        }
    }

    #[test]
    fn test_stop_ends_threads() {
        let table = Arc::new(PrimeTable::new(100_000));
        let job = MiningJob {
            target: Target::from_length(12),
            once: false,
            ..test_job(2)
        };
        let pool = MiningPool::start(job, table).unwrap();
        std::thread::sleep(Duration::from_millis(100));
        pool.stop();
        let deadline = Instant::now() + Duration::from_secs(30);
        while !pool.is_finished() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(10));
        }
        assert!(pool.is_finished());
        let snapshot = pool.join().unwrap();
        assert_eq!(snapshot.proofs, 0);
    }

    #[test]
    fn test_tests_per_second() {
        let snapshot = StatsSnapshot {
            tests: 500,
            primes_hit: 0,
            sieves: 0,
            templates: 1,
            proofs: 0,
            elapsed_secs: 2.0,
        };
        assert_eq!(snapshot.tests_per_second(), 250.0);
        let idle = StatsSnapshot {
            elapsed_secs: 0.0,
            ..snapshot
        };
        assert_eq!(idle.tests_per_second(), 0.0);
    }
}
