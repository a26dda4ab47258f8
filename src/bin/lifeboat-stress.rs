//! LIFEBOAT Stress Binary
//!
//! Exercises the whole coordination layer in-process: store traffic,
//! pattern pub/sub fan-out, budget reservations, and resilience-wrapped
//! calls against a deterministically flaky fake dependency.

use clap::Parser;
use lifeboat::{AppContext, BreakerConfig, Config, ResilienceConfig};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

/// LIFEBOAT Stress - In-Process Coordination Layer Exercise
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Number of store operations
    #[arg(long, default_value_t = 10_000)]
    store_ops: u64,

    /// Number of resilience-wrapped calls against the fake dependency
    #[arg(long, default_value_t = 200)]
    calls: u64,

    /// Every Nth fake-dependency call fails
    #[arg(long, default_value_t = 7)]
    fail_every: u64,

    /// Breaker failure threshold for the fake dependency
    #[arg(long, default_value_t = 5)]
    failure_threshold: u32,

    /// Breaker cooldown in milliseconds
    #[arg(long, default_value_t = 500)]
    cooldown_ms: u64,

    /// Expiry sweeper interval in seconds
    #[arg(long, default_value_t = 2)]
    sweep_interval: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("lifeboat=info".parse()?))
        .init();

    let args = Args::parse();

    let config = Config::default()
        .with_sweep_interval(args.sweep_interval)
        .with_breaker(
            "email",
            BreakerConfig {
                failure_threshold: args.failure_threshold,
                success_threshold: 2,
                cooldown: Duration::from_millis(args.cooldown_ms),
            },
        )
        .with_resilience(ResilienceConfig {
            timeout: Duration::from_millis(250),
            max_attempts: 3,
            base_delay: Duration::from_millis(50),
        });

    let ctx = AppContext::new(config);
    let _sweeper = ctx.spawn_sweeper();

    run_store_traffic(&ctx, args.store_ops);
    run_pubsub_fanout(&ctx);
    run_budget_reservations(&ctx);
    run_flaky_calls(&ctx, args.calls, args.fail_every).await;

    println!("{}", ctx.metrics().summary());
    println!("{}", ctx.health_check().evaluate().to_json());
    println!("{}", ctx.prometheus_exporter().export());
    Ok(())
}

fn run_store_traffic(ctx: &AppContext, ops: u64) {
    let store = ctx.store();
    let metrics = ctx.metrics();
    let start = Instant::now();
    let mut latencies = Vec::with_capacity(ops as usize);

    for i in 0..ops {
        let t = Instant::now();
        let key = format!("sess:{}", i % 1_000);
        match i % 4 {
            0 => store.setex(&key, 30, "payload"),
            1 => {
                store.get(&key);
            }
            2 => {
                store.incr(&format!("rate:{}", i % 50)).ok();
            }
            _ => {
                store
                    .multi()
                    .incr(format!("rate:{}", i % 50))
                    .expire(format!("rate:{}", i % 50), 60)
                    .exec();
            }
        }
        metrics.record_command("store");
        latencies.push(t.elapsed());
    }

    if latencies.is_empty() {
        return;
    }
    latencies.sort();
    let total = start.elapsed();
    let avg = latencies.iter().sum::<Duration>() / latencies.len() as u32;
    let p99_idx = ((latencies.len() as f64 * 0.99) as usize).min(latencies.len() - 1);
    let p99 = latencies[p99_idx];
    info!(
        ops = ops,
        keys = ctx.store().len(),
        "store traffic done in {:?}, avg={:?}, p99={:?}",
        total,
        avg,
        p99
    );
}

fn run_pubsub_fanout(ctx: &AppContext) {
    let bus = ctx.bus();
    let delivered = Arc::new(AtomicU64::new(0));

    let sink = Arc::clone(&delivered);
    bus.psubscribe("events:work-order:*", move |_, _| {
        sink.fetch_add(1, Ordering::Relaxed);
    });
    let sink = Arc::clone(&delivered);
    bus.subscribe("events:work-order:created", move |_, _| {
        sink.fetch_add(1, Ordering::Relaxed);
    });

    let mut sent = 0;
    for i in 0..1_000 {
        sent += bus.publish(&format!("events:work-order:{}", i % 3), "{}");
    }
    info!(
        published = 1_000,
        handler_invocations = sent,
        counted = delivered.load(Ordering::Relaxed),
        "pub/sub fan-out done"
    );
}

fn run_budget_reservations(ctx: &AppContext) {
    let store = ctx.store();
    let mut accepted = 0;
    let mut rejected = 0;
    for _ in 0..100 {
        if store.try_reserve("budget:sms:stress", 3, 150, Some(60)) {
            accepted += 1;
        } else {
            rejected += 1;
        }
    }
    info!(
        accepted = accepted,
        rejected = rejected,
        total = %store.get("budget:sms:stress").unwrap_or_default(),
        "budget reservations done"
    );
}

async fn run_flaky_calls(ctx: &AppContext, calls: u64, fail_every: u64) {
    let executor = ctx.executor();
    let attempts = Arc::new(AtomicU64::new(0));
    let mut ok = 0;
    let mut failed = 0;

    for _ in 0..calls {
        let counter = Arc::clone(&attempts);
        let result = executor
            .with_resilience("email", || {
                let counter = Arc::clone(&counter);
                async move {
                    let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                    if fail_every > 0 && n % fail_every == 0 {
                        Err(anyhow::anyhow!("smtp handshake failed"))
                    } else {
                        Ok(())
                    }
                }
            })
            .await;
        match result {
            Ok(()) => ok += 1,
            Err(_) => failed += 1,
        }
    }

    info!(
        calls = calls,
        ok = ok,
        failed = failed,
        upstream_attempts = attempts.load(Ordering::SeqCst),
        breaker_state = %ctx.breakers().get("email").map(|b| b.state().to_string()).unwrap_or_default(),
        "flaky dependency exercise done"
    );
}
