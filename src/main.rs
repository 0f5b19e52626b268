//! Prime-Chain Prover CLI
//!
//! Mines and verifies prime-chain proofs of work.
//!
//! # Commands
//!
//! - `mine` - Start mining (multi-threaded, synthetic block templates)
//! - `verify` - Check a header hash / target / multiplier triple
//! - `genesis` - Rebuild and verify a network's genesis block
//! - `next-target` - Retarget from the previous target and block spacing
//! - `subsidy` - Block value for a target
//! - `benchmark` - Run performance benchmark

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use primechain::algorithm::{
    BigUint, BlockHeader, COIN, Network, PrimeTable, Target, block_proof, block_value, chain_name,
    check_prime_proof_of_work, check_proof_of_work_v02_compatibility, fermat_test,
    hash_from_display_hex, hash_to_biguint, hash_to_display_hex, next_target,
    origin_primorial_form,
};
use primechain::config::MinerConfig;
use primechain::worker::{FoundProof, MiningJob, MiningPool, ProofReport};

#[derive(Parser)]
#[command(name = "primechain")]
#[command(author = "Primechain developers")]
#[command(version = "0.3.0")]
#[command(about = "Prime-chain proof-of-work miner and verifier")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Network: main, test or regtest (default: main, or the config file's)
    #[arg(long, global = true)]
    network: Option<String>,

    /// Custom config file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Mine prime chains on synthetic block templates
    Mine {
        /// Number of threads to use (default: number of CPU cores)
        #[arg(short, long)]
        threads: Option<usize>,

        /// Target override in hex, e.g. 07.000000 (default: network initial target)
        #[arg(short, long)]
        bits: Option<String>,

        /// Sieve size override
        #[arg(long)]
        sieve_size: Option<usize>,

        /// Print found proofs as JSON
        #[arg(long)]
        json: bool,

        /// Exit after the first proof
        #[arg(long)]
        once: bool,
    },

    /// Verify a prime proof-of-work
    Verify {
        /// Header hash (display hex)
        #[arg(long)]
        hash: String,

        /// Target in hex
        #[arg(long)]
        bits: String,

        /// Chain multiplier (decimal)
        #[arg(long)]
        multiplier: String,
    },

    /// Rebuild and verify the genesis block
    Genesis {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Compute the next target after a block
    NextTarget {
        /// Previous target in hex
        #[arg(long)]
        bits: String,

        /// Seconds between the previous block and its parent
        #[arg(long)]
        spacing: i64,
    },

    /// Show the block value for a target
    Subsidy {
        /// Target in hex
        #[arg(long)]
        bits: String,

        /// Transaction fees to add, in base units
        #[arg(long, default_value = "0")]
        fees: u64,
    },

    /// Run performance benchmark
    Benchmark {
        /// Number of Fermat tests to run
        #[arg(short, long, default_value = "10000")]
        count: u32,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Mine {
            threads,
            bits,
            sieve_size,
            json,
            once,
        } => cmd_mine(
            cli.config,
            cli.network.as_deref(),
            threads,
            bits.as_deref(),
            sieve_size,
            json,
            once,
        ),
        Commands::Verify {
            hash,
            bits,
            multiplier,
        } => parse_network(cli.network.as_deref())
            .and_then(|network| cmd_verify(network, &hash, &bits, &multiplier)),
        Commands::Genesis { json } => {
            parse_network(cli.network.as_deref()).and_then(|network| cmd_genesis(network, json))
        }
        Commands::NextTarget { bits, spacing } => parse_network(cli.network.as_deref())
            .and_then(|network| cmd_next_target(network, &bits, spacing)),
        Commands::Subsidy { bits, fees } => parse_network(cli.network.as_deref())
            .and_then(|network| cmd_subsidy(network, &bits, fees)),
        Commands::Benchmark { count } => cmd_benchmark(count),
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn parse_network(name: Option<&str>) -> anyhow::Result<Network> {
    let name = name.unwrap_or("main");
    Network::parse(name).ok_or_else(|| anyhow::anyhow!("Unknown network: {}", name))
}

/// Accepts `0x07fd7624`, `07fd7624` or the display form `07.fd7624`
fn parse_bits(s: &str) -> anyhow::Result<Target> {
    let hex: String = s
        .trim()
        .trim_start_matches("0x")
        .chars()
        .filter(|&c| c != '.')
        .collect();
    if hex.is_empty() || hex.len() > 8 {
        anyhow::bail!("Invalid target: {}", s);
    }
    let bits =
        u32::from_str_radix(&hex, 16).map_err(|e| anyhow::anyhow!("Invalid target {}: {}", s, e))?;
    Ok(Target::from_bits(bits))
}

fn format_coins(value: u64) -> String {
    format!("{}.{:08}", value / COIN, value % COIN)
}

fn cmd_mine(
    config_path: Option<PathBuf>,
    network: Option<&str>,
    threads: Option<usize>,
    bits: Option<&str>,
    sieve_size: Option<usize>,
    json: bool,
    once: bool,
) -> anyhow::Result<()> {
    let mut config = MinerConfig::load_or_default(config_path.as_deref())?;
    if let Some(network) = network {
        config.network = network.to_string();
    }
    if threads.is_some() {
        config.threads = threads;
    }
    if let Some(size) = sieve_size {
        config.sieve_size = size;
    }
    config.validate()?;

    let network = config.network()?;
    let params = network.params();
    let target = match bits {
        Some(bits) => parse_bits(bits)?,
        None => Target::initial(&params),
    };
    let num_threads = config.threads.unwrap_or_else(num_cpus::get);
    let options = config.miner_options();

    if !json {
        println!("\n=== Prime-Chain Miner ===");
        println!("Network:    {}", network.name());
        println!("Target:     {} ({:.4})", target, target.prime_difficulty());
        println!("Threads:    {}", num_threads);
        println!("Sieve size: {}", options.sieve_size);
        println!("Primorial:  {}#", options.primorial_multiplier);
        println!("=========================\n");
    }

    let start = Instant::now();
    let table = Arc::new(PrimeTable::standard());
    log::info!(
        "prime table ready: {} primes in {:.2}s",
        table.len(),
        start.elapsed().as_secs_f64()
    );

    let job = MiningJob {
        network,
        target,
        threads: num_threads,
        options,
        once,
    };
    let pool = MiningPool::start(job, Arc::clone(&table))?;
    let report_every = Duration::from_secs(config.report_interval_secs.max(1));

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let mut progress = tokio::time::interval(report_every);
        let mut poll = tokio::time::interval(Duration::from_millis(200));
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);
        progress.tick().await;

        loop {
            tokio::select! {
                _ = &mut ctrl_c => {
                    if !json {
                        println!("\nStopping...");
                    }
                    pool.stop();
                    break;
                }
                _ = poll.tick() => {
                    for proof in pool.take_found() {
                        print_proof(network, &proof, &table, json)?;
                    }
                    if pool.is_finished() {
                        break;
                    }
                }
                _ = progress.tick() => {
                    if !json {
                        let stats = pool.snapshot();
                        print!(
                            "\rTests: {} ({:.0}/s) | Primes: {} | Sieves: {} | Proofs: {} | {:.0}s",
                            stats.tests,
                            stats.tests_per_second(),
                            stats.primes_hit,
                            stats.sieves,
                            stats.proofs,
                            stats.elapsed_secs
                        );
                        use std::io::Write;
                        std::io::stdout().flush().ok();
                    }
                }
            }
        }
        anyhow::Ok(())
    })?;

    let remaining = pool.take_found();
    let stats = pool.join()?;
    for proof in remaining {
        print_proof(network, &proof, &table, json)?;
    }

    if !json {
        println!("\n\nMining stopped.");
        println!(
            "  Tests:  {} ({:.0}/s)",
            stats.tests,
            stats.tests_per_second()
        );
        println!("  Proofs: {}", stats.proofs);
        println!("  Time:   {:.1}s", stats.elapsed_secs);
    }
    Ok(())
}

fn print_proof(
    network: Network,
    proof: &FoundProof,
    table: &PrimeTable,
    json: bool,
) -> anyhow::Result<()> {
    let report = ProofReport::new(network, proof, table);
    if json {
        println!("{}", serde_json::to_string(&report)?);
        return Ok(());
    }
    println!("\n\nFound prime chain!");
    println!("  Chain:      {}", report.chain);
    println!("  Origin:     {}", report.primorial_form);
    println!("  Block hash: {}", report.block_hash);
    println!("  Header:     {}", report.header_hash);
    println!("  Bits:       {}", report.bits);
    println!("  Nonce:      {}", report.nonce);
    println!("  Multiplier: {}", report.multiplier);
    println!("  Thread:     {}", proof.thread_id);
    Ok(())
}

fn cmd_verify(network: Network, hash: &str, bits: &str, multiplier: &str) -> anyhow::Result<()> {
    let header_hash = hash_from_display_hex(hash)
        .ok_or_else(|| anyhow::anyhow!("Invalid header hash: {}", hash))?;
    let target = parse_bits(bits)?;
    let multiplier = BigUint::parse_bytes(multiplier.as_bytes(), 10)
        .ok_or_else(|| anyhow::anyhow!("Invalid multiplier: {}", multiplier))?;
    let params = network.params();

    let proof = check_prime_proof_of_work(&header_hash, target, &multiplier, &params)
        .map_err(|rejection| anyhow::anyhow!("Proof rejected: {}", rejection))?;

    let table = PrimeTable::new(10_000);
    let origin = hash_to_biguint(&header_hash) * &multiplier;
    println!("Proof accepted");
    println!("  Chain:  {}", chain_name(proof.chain_type, proof.length));
    println!("  Origin: {}", origin_primorial_form(&origin, &table));
    println!("  Lengths: {}", proof.lengths);
    println!("  Work:   {}", block_proof(target, &params));
    println!(
        "  v0.2 compatible: {}",
        check_proof_of_work_v02_compatibility(&header_hash)?
    );
    Ok(())
}

fn cmd_genesis(network: Network, json: bool) -> anyhow::Result<()> {
    let genesis = BlockHeader::genesis(network);
    let params = network.params();
    let proof = check_prime_proof_of_work(
        &genesis.header_hash(),
        genesis.target(),
        &genesis.multiplier,
        &params,
    )
    .map_err(|rejection| anyhow::anyhow!("Genesis proof rejected: {}", rejection))?;

    let table = PrimeTable::new(10_000);
    let found = FoundProof {
        header: genesis.clone(),
        chain_type: proof.chain_type,
        length: proof.length,
        thread_id: 0,
    };
    let report = ProofReport::new(network, &found, &table);
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("\n=== Genesis block ({}) ===", network.name());
    println!("Block hash:  {}", report.block_hash);
    println!("Header hash: {}", report.header_hash);
    println!("Time:        {}", report.time);
    println!("Nonce:       {}", report.nonce);
    println!("Bits:        {}", genesis.target());
    println!("Multiplier:  {}", table.primorial_form(&genesis.multiplier));
    println!("Chain:       {}", report.chain);
    println!("Origin:      {}", report.primorial_form);
    println!(
        "Value:       {}",
        format_coins(block_value(genesis.target(), 0, &params)?)
    );
    println!(
        "Header hex:  {}",
        hex::encode(genesis.serialize_header())
    );
    Ok(())
}

fn cmd_next_target(network: Network, bits: &str, spacing: i64) -> anyhow::Result<()> {
    let prev = parse_bits(bits)?;
    let params = network.params();
    let next = next_target(
        prev,
        params.interval(),
        params.target_spacing,
        spacing,
        &params,
    )?;
    println!("Previous: {} ({:.6})", prev, prev.prime_difficulty());
    println!("Next:     {} ({:.6})", next, next.prime_difficulty());
    println!("Bits:     0x{:08x}", next.bits());
    Ok(())
}

fn cmd_subsidy(network: Network, bits: &str, fees: u64) -> anyhow::Result<()> {
    let target = parse_bits(bits)?;
    let params = network.params();
    let value = block_value(target, fees, &params)?;
    println!("Target: {}", target);
    println!("Value:  {} ({} base units)", format_coins(value), value);
    println!("Work:   {}", block_proof(target, &params));
    Ok(())
}

fn cmd_benchmark(count: u32) -> anyhow::Result<()> {
    println!("Running benchmark with {} Fermat tests...", count);

    let start = Instant::now();
    let table = PrimeTable::standard();
    let table_time = start.elapsed();

    let base = (BigUint::from(1u32) << 320u32) + 1u32;
    let start = Instant::now();
    let mut probable_primes = 0u32;
    for i in 0..count {
        let candidate = &base + (i as u64) * 2;
        if fermat_test(&candidate)?.is_probable_prime() {
            probable_primes += 1;
        }
    }
    let elapsed = start.elapsed();
    let rate = count as f64 / elapsed.as_secs_f64();

    println!("\nResults:");
    println!("  Total tests:     {}", count);
    println!("  Probable primes: {}", probable_primes);
    println!("  Time elapsed:    {:.2}s", elapsed.as_secs_f64());
    println!("  Test rate:       {:.2} tests/s", rate);

    println!("\nPrime table:");
    println!("  Primes:     {}", table.len());
    println!("  Limit:      {}", table.limit());
    println!("  Build time: {:.2}s", table_time.as_secs_f64());

    Ok(())
}
