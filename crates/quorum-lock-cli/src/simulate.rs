// Contention simulation over in-memory replicas
// Every holder increments a shared counter with a non-atomic read-modify-write
// inside its critical section; a lost update means exclusion was violated

use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use anyhow::ensure;
use quorum_lock_core::{LockOption, LockOptions, Locker, MemoryReplica, ReplicaClient};
use rand::Rng;
use tracing::{info, warn};

use crate::cli::SimulateArgs;

/// How often replicas drop expired keys
const REAPER_PERIOD: Duration = Duration::from_secs(1);

/// Outcome of a simulation run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub replicas: usize,
    pub offline: usize,
    pub quorum: usize,
    pub counter: u64,
    /// Critical sections entered
    pub expected: u64,
    pub failed_acquisitions: u64,
    pub unconfirmed_releases: u64,
    pub elapsed: Duration,
}

impl Report {
    pub fn lost_updates(&self) -> u64 {
        self.expected.saturating_sub(self.counter)
    }
}

impl Display for Report {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "replicas:              {} ({} offline, quorum {})",
            self.replicas, self.offline, self.quorum
        )?;
        writeln!(f, "counter:               {}", self.counter)?;
        writeln!(f, "expected:              {}", self.expected)?;
        writeln!(f, "lost updates:          {}", self.lost_updates())?;
        writeln!(f, "failed acquisitions:   {}", self.failed_acquisitions)?;
        writeln!(f, "unconfirmed releases:  {}", self.unconfirmed_releases)?;
        write!(f, "elapsed:               {:?}", self.elapsed)
    }
}

#[derive(Default)]
struct Counters {
    value: AtomicU64,
    entered: AtomicU64,
    failed: AtomicU64,
    unconfirmed: AtomicU64,
}

pub async fn run(args: SimulateArgs, options: LockOptions) -> anyhow::Result<Report> {
    ensure!(args.replicas > 0, "at least one replica is required");
    ensure!(
        args.offline <= args.replicas,
        "cannot take {} of {} replicas offline",
        args.offline,
        args.replicas
    );

    let replicas = MemoryReplica::cluster("replica", args.replicas);
    for replica in replicas.iter().take(args.offline) {
        replica.set_online(false);
    }
    let reapers: Vec<_> = replicas
        .iter()
        .map(|replica| replica.spawn_reaper(REAPER_PERIOD))
        .collect();

    let locker = Locker::with_defaults(
        replicas
            .iter()
            .map(|r| Arc::clone(r) as Arc<dyn ReplicaClient>),
        options,
    );
    info!(
        replicas = args.replicas,
        offline = args.offline,
        contenders = args.contenders,
        rounds = args.rounds,
        "Starting simulation"
    );

    let counters = Arc::new(Counters::default());
    let max_delay_ms = args.max_delay_ms.max(1);
    let started = Instant::now();

    let mut handles = Vec::with_capacity(args.contenders);
    for contender in 0..args.contenders {
        let mut lock = locker.new_lock_with(
            args.id.as_str(),
            [LockOption::RetryDelayFn(Arc::new(move |_: u32| {
                Duration::from_millis(rand::rng().random_range(1..=max_delay_ms))
            }))],
        );
        let counters = Arc::clone(&counters);
        let rounds = args.rounds;

        handles.push(tokio::spawn(async move {
            for _ in 0..rounds {
                if let Err(e) = lock.lock().await {
                    warn!(contender, error = %e, "Contender failed to acquire");
                    counters.failed.fetch_add(1, Ordering::SeqCst);
                    continue;
                }

                counters.entered.fetch_add(1, Ordering::SeqCst);
                let current = counters.value.load(Ordering::SeqCst);
                tokio::task::yield_now().await;
                counters.value.store(current + 1, Ordering::SeqCst);

                if !lock.unlock().await.confirmed {
                    counters.unconfirmed.fetch_add(1, Ordering::SeqCst);
                }
            }
        }));
    }

    for result in futures::future::join_all(handles).await {
        result?;
    }
    for reaper in reapers {
        reaper.abort();
    }

    let report = Report {
        replicas: args.replicas,
        offline: args.offline,
        quorum: locker.quorum(),
        counter: counters.value.load(Ordering::SeqCst),
        expected: counters.entered.load(Ordering::SeqCst),
        failed_acquisitions: counters.failed.load(Ordering::SeqCst),
        unconfirmed_releases: counters.unconfirmed.load(Ordering::SeqCst),
        elapsed: started.elapsed(),
    };

    if report.lost_updates() > 0 {
        warn!(lost = report.lost_updates(), "Mutual exclusion violated");
    } else {
        info!(counter = report.counter, "Simulation finished");
    }

    Ok(report)
}
