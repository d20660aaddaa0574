//! # Basalt Sim
//!
//! A standalone CLI that runs small scenarios against a simulated Basalt
//! cluster and prints what each member sees.
//!
//! ## Scenarios
//!
//! ```text
//! demo      three members, keys spread over their buckets, one clear
//! conflict  concurrent updates delivered in different orders converge
//! churn     a member crashes with buckets, the clear is incomplete,
//!           survivors take the buckets over and the retry succeeds
//! config    print the default configuration as JSON
//! ```

use std::collections::BTreeSet;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;

use basalt_buckets::{
    BucketAdvisor, BucketConfig, BucketRegion, MembershipRegionAdvisor, PassiveVolunteering,
};
use basalt_clear::{ClearConfig, PartitionedRegion, RegionCluster, RegionEvent, RegionListener};
use basalt_entries::{EntryEvent, RegionAttributes};
use basalt_membership::{MemberIdentity, MembershipView};
use basalt_versions::{check_for_conflict, VersionStamp, VersionTag};
use clap::{Parser, Subcommand};
use colored::*;

// ─── CLI ───────────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "basalt-sim")]
#[command(about = "Simulated Basalt cluster: versioned replication and distributed clear")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Three members load a region and one of them clears it
    Demo {
        /// Number of keys to write before clearing
        #[arg(long, default_value_t = 24)]
        keys: u64,
    },
    /// Concurrent updates to one key, delivered in both orders
    Conflict,
    /// A member crashes before a clear, then its buckets move
    Churn,
    /// Print default bucket and clear configuration
    Config,
}

type Region = PartitionedRegion<String, u64>;

const TOTAL_BUCKETS: u32 = 6;

fn member(port: u16, name: &str) -> MemberIdentity {
    MemberIdentity::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port).with_name(name)
}

// ─── Pretty printing ──────────────────────────────────────────────────────

fn header(text: &str) {
    let bar = "═".repeat(60);
    println!("\n{}", bar.bright_cyan());
    println!("  {}", text.bold().bright_white());
    println!("{}", bar.bright_cyan());
}

fn section(text: &str) {
    println!("\n{} {}", "▸".bright_yellow(), text.bold());
}

fn step(text: &str) {
    println!("  {} {}", "•".bright_green(), text);
}

fn failure(text: &str) {
    println!("  {} {}", "✗".bright_red().bold(), text.bright_red());
}

fn show_members(regions: &[Region]) {
    let border = "─".repeat(44);
    println!("  ┌{}┐", border);
    for region in regions {
        let buckets = region.local_region().buckets().bucket_ids();
        let line = format!(
            "{:<10} buckets {:<12} entries {:>4}",
            region.member().membership_port(),
            format!("{:?}", buckets),
            region.local_size()
        );
        println!("  │ {:<42} │", line);
    }
    println!("  └{}┘", border);
}

// ─── Cluster helpers ──────────────────────────────────────────────────────

fn cluster() -> RegionCluster {
    let buckets = BucketConfig::builder()
        .total_buckets(TOTAL_BUCKETS)
        .redundant_copies(0)
        .build();
    RegionCluster::new("orders", buckets, ClearConfig::default())
}

fn join_three(cluster: &RegionCluster) -> Vec<Region> {
    let regions: Vec<Region> = [(40401, "alpha"), (40402, "beta"), (40403, "gamma")]
        .into_iter()
        .map(|(port, name)| cluster.add_member(member(port, name)))
        .collect();
    for bucket in 0..TOTAL_BUCKETS {
        if let Err(err) = regions[(bucket % 3) as usize].host_bucket(bucket) {
            failure(&format!("bucket {}: {}", bucket, err));
        }
    }
    regions
}

fn load(regions: &[Region], keys: u64) -> usize {
    let mut written = 0;
    for i in 0..keys {
        let key = format!("order-{}", i);
        match regions.iter().find(|r| r.hosts(&key)) {
            Some(owner) if owner.put(key.clone(), i).is_ok() => written += 1,
            _ => failure(&format!("no member stores {}", key)),
        }
    }
    written
}

struct PrintingListener {
    member: String,
}

impl RegionListener for PrintingListener {
    fn after_region_clear(&self, event: &RegionEvent) {
        let origin = if event.origin_remote { "remote" } else { "local" };
        step(&format!(
            "{} heard after_region_clear ({}, from {})",
            self.member.bright_magenta(),
            origin,
            event.origin.membership_port()
        ));
    }
}

// ─── Demo ──────────────────────────────────────────────────────────────────

fn run_demo(keys: u64) {
    header("DEMO — Distributed clear of a partitioned region");

    section("Phase 1: Three members join and split the buckets");
    let cluster = cluster();
    let regions = join_three(&cluster);
    for region in &regions {
        region.add_listener(Arc::new(PrintingListener {
            member: region.member().to_string(),
        }));
    }
    regions[2].register_interest("dashboard");

    section("Phase 2: Load");
    let written = load(&regions, keys);
    step(&format!("{} entries written", written));
    show_members(&regions);

    section("Phase 3: alpha clears the region");
    match regions[0].clear() {
        Ok(cleared) => {
            let distinct: BTreeSet<u32> = cleared.iter().copied().collect();
            step(&format!("buckets cleared: {:?}", distinct));
        }
        Err(err) => failure(&err.to_string()),
    }
    for notification in regions[2].take_client_notifications() {
        step(&format!("client {} notified", notification.client.bright_magenta()));
    }
    show_members(&regions);
}

// ─── Conflict ──────────────────────────────────────────────────────────────

fn replica(local: MemberIdentity, region: Arc<MembershipRegionAdvisor>) -> BucketRegion<String, String> {
    let advisor = BucketAdvisor::new(0, local, region, Arc::new(PassiveVolunteering));
    advisor.set_hosting(true);
    advisor.open_initialization_gate();
    BucketRegion::new(advisor, RegionAttributes::default())
}

fn remote_put(key: &str, value: &str, tag: VersionTag) -> EntryEvent<String, String> {
    EntryEvent::put(key.to_string(), value.to_string())
        .with_version_tag(tag)
        .from_remote()
}

fn run_conflict() {
    header("CONFLICT — Same key, same version, two writers");

    let a = member(40401, "alpha");
    let b = member(40402, "beta");
    let x = member(40403, "x");
    let y = member(40404, "y");
    let view = Arc::new(MembershipView::with_members([a.clone(), b.clone(), x.clone(), y.clone()]));
    let region = Arc::new(MembershipRegionAdvisor::new("/orders", 1, view));

    section("Phase 1: alpha and beta both write version 1 of order-7");
    let from_a = remote_put("order-7", "shipped", VersionTag::new(a.clone(), 1, 1));
    let from_b = remote_put("order-7", "cancelled", VersionTag::new(b.clone(), 1, 1));
    step(&format!("alpha → {}", "shipped".bright_yellow()));
    step(&format!("beta  → {}", "cancelled".bright_yellow()));

    section("Phase 2: deterministic resolution");
    for (name, incoming, holder) in [("beta over alpha", &b, &a), ("alpha over beta", &a, &b)] {
        let stamp = VersionStamp::from_tag(&VersionTag::new(holder.clone(), 1, 1));
        let outcome = check_for_conflict(&stamp, &VersionTag::new(incoming.clone(), 1, 1));
        step(&format!("{:<16} {:?}", name, outcome));
    }

    section("Phase 3: replicas receive the writes in opposite orders");
    let rx = replica(x, region.clone());
    let ry = replica(y, region);
    for event in [&from_a, &from_b] {
        if let Err(err) = rx.apply(&mut event.clone()) {
            failure(&err.to_string());
        }
    }
    for event in [&from_b, &from_a] {
        if let Err(err) = ry.apply(&mut event.clone()) {
            failure(&err.to_string());
        }
    }
    let key = "order-7".to_string();
    let (vx, vy) = (rx.get(&key), ry.get(&key));
    step(&format!("replica x: {:?}", vx));
    step(&format!("replica y: {:?}", vy));
    if vx == vy {
        println!("\n  {} {}", "✓".bright_green().bold(), "REPLICAS CONVERGED".bright_green().bold());
    } else {
        failure("replicas diverged");
    }
}

// ─── Churn ─────────────────────────────────────────────────────────────────

fn run_churn() {
    header("CHURN — A member crashes with buckets");

    let cluster = cluster();
    let regions = join_three(&cluster);
    load(&regions, 30);
    show_members(&regions);

    section("Phase 1: gamma crashes, alpha clears");
    let lost = regions[2].local_region().buckets().bucket_ids();
    cluster.crash(regions[2].member());
    match regions[0].clear() {
        Ok(_) => step("clear succeeded"),
        Err(err) => failure(&err.to_string()),
    }

    section("Phase 2: beta takes over gamma's buckets and alpha retries");
    for bucket in &lost {
        match regions[1].host_bucket(*bucket) {
            Ok(_) => step(&format!("beta now primary for bucket {}", bucket)),
            Err(err) => failure(&err.to_string()),
        }
    }
    match regions[0].clear() {
        Ok(cleared) => {
            let distinct: BTreeSet<u32> = cleared.into_iter().collect();
            step(&format!("clear succeeded, buckets {:?}", distinct));
        }
        Err(err) => failure(&err.to_string()),
    }
    show_members(&regions[..2]);
}

// ─── Config ────────────────────────────────────────────────────────────────

fn run_config() {
    header("CONFIG — Defaults");
    for (name, json) in [
        ("buckets", serde_json::to_string_pretty(&BucketConfig::default())),
        ("clear", serde_json::to_string_pretty(&ClearConfig::default())),
    ] {
        section(name);
        match json {
            Ok(json) => println!("{}", json),
            Err(err) => failure(&err.to_string()),
        }
    }
}

fn main() {
    let cli = Cli::parse();
    match cli.command {
        Commands::Demo { keys } => run_demo(keys),
        Commands::Conflict => run_conflict(),
        Commands::Churn => run_churn(),
        Commands::Config => run_config(),
    }
}
