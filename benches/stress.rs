use std::time::{Duration, Instant};

use tokio_postgres::{Config, NoTls};
use ulid::Ulid;

const HOUR: i64 = 3_600_000; // 1 hour in ms
const DAY: i64 = 86_400_000;

async fn connect(host: &str, port: u16) -> tokio_postgres::Client {
    let mut config = Config::new();
    config
        .host(host)
        .port(port)
        .dbname(format!("bench_{}", Ulid::new()))
        .user("waitq")
        .password("waitq");

    let (client, conn) = config.connect(NoTls).await.expect("connect failed");
    tokio::spawn(async move {
        if let Err(e) = conn.await {
            eprintln!("connection error: {e}");
        }
    });
    client
}

fn percentile(sorted: &[Duration], p: f64) -> Duration {
    if sorted.is_empty() {
        return Duration::ZERO;
    }
    let idx = ((sorted.len() as f64) * p / 100.0) as usize;
    sorted[idx.min(sorted.len() - 1)]
}

fn print_latency(label: &str, latencies: &mut [Duration]) {
    latencies.sort();
    let total: Duration = latencies.iter().sum();
    let avg = total / latencies.len() as u32;
    println!("  {label}:");
    println!(
        "    n={}, avg={:.2}ms, p50={:.2}ms, p95={:.2}ms, p99={:.2}ms, max={:.2}ms",
        latencies.len(),
        avg.as_secs_f64() * 1000.0,
        percentile(latencies, 50.0).as_secs_f64() * 1000.0,
        percentile(latencies, 95.0).as_secs_f64() * 1000.0,
        percentile(latencies, 99.0).as_secs_f64() * 1000.0,
        latencies.last().unwrap().as_secs_f64() * 1000.0,
    );
}

/// One staff member with huge capacity plus one service, so bookings
/// spaced 2h apart always land as scheduled.
async fn seed_tenant(client: &tokio_postgres::Client) -> (Ulid, Ulid) {
    let staff_id = Ulid::new();
    client
        .batch_execute(&format!(
            "INSERT INTO staff (id, name, service_type, daily_capacity) VALUES ('{staff_id}', 'Bench Staff', 'Doctor', 100000)"
        ))
        .await
        .unwrap();
    let service_id = Ulid::new();
    client
        .batch_execute(&format!(
            "INSERT INTO services (id, name, duration, required_staff_type) VALUES ('{service_id}', 'General Checkup', 30, 'Doctor')"
        ))
        .await
        .unwrap();
    (staff_id, service_id)
}

async fn phase1_sequential(host: &str, port: u16) {
    let client = connect(host, port).await;
    let (staff_id, service_id) = seed_tenant(&client).await;

    let n = 2000;
    let mut latencies = Vec::with_capacity(n);
    let start = Instant::now();

    for i in 0..n {
        let id = Ulid::new();
        let at = (i as i64) * 2 * HOUR;
        let t = Instant::now();
        client
            .batch_execute(&format!(
                "INSERT INTO appointments (id, customer_name, service_id, staff_id, at) VALUES ('{id}', 'Customer {i}', '{service_id}', '{staff_id}', {at})"
            ))
            .await
            .unwrap();
        latencies.push(t.elapsed());
    }

    let elapsed = start.elapsed();
    let ops = n as f64 / elapsed.as_secs_f64();
    println!("  {n} bookings in {:.2}s = {ops:.0} ops/sec", elapsed.as_secs_f64());
    print_latency("write latency", &mut latencies);
}

async fn phase2_concurrent(host: &str, port: u16) {
    let n_tasks = 10;
    let n_per_task = 200;

    let start = Instant::now();
    let mut handles = Vec::new();

    for _ in 0..n_tasks {
        let host = host.to_string();
        handles.push(tokio::spawn(async move {
            // Each task uses its own tenant (unique dbname from connect())
            let client = connect(&host, port).await;
            let (staff_id, service_id) = seed_tenant(&client).await;

            for j in 0..n_per_task {
                let id = Ulid::new();
                let at = (j as i64) * 2 * HOUR;
                client
                    .batch_execute(&format!(
                        "INSERT INTO appointments (id, customer_name, service_id, staff_id, at) VALUES ('{id}', 'Customer {j}', '{service_id}', '{staff_id}', {at})"
                    ))
                    .await
                    .unwrap();
            }
        }));
    }

    for h in handles {
        h.await.unwrap();
    }

    let elapsed = start.elapsed();
    let total = n_tasks * n_per_task;
    let ops = total as f64 / elapsed.as_secs_f64();
    println!(
        "  {n_tasks} tasks x {n_per_task} bookings = {total} total in {:.2}s = {ops:.0} ops/sec",
        elapsed.as_secs_f64()
    );
}

async fn phase3_promotion_throughput(host: &str, port: u16) {
    let client = connect(host, port).await;
    let (_staff_id, service_id) = seed_tenant(&client).await;

    // Queue up waiting entries, one per day so promotions never cap out
    let n = 500;
    for i in 0..n {
        let id = Ulid::new();
        let at = (i as i64) * DAY;
        client
            .batch_execute(&format!(
                "INSERT INTO appointments (id, customer_name, service_id, staff_id, at) VALUES ('{id}', 'Queued {i}', '{service_id}', NULL, {at})"
            ))
            .await
            .unwrap();
    }

    let mut latencies = Vec::with_capacity(n);
    let start = Instant::now();
    for _ in 0..n {
        let t = Instant::now();
        client.simple_query("PROMOTE").await.unwrap();
        latencies.push(t.elapsed());
    }

    let elapsed = start.elapsed();
    let ops = n as f64 / elapsed.as_secs_f64();
    println!("  {n} promotions in {:.2}s = {ops:.0} ops/sec", elapsed.as_secs_f64());
    print_latency("promotion latency", &mut latencies);
}

async fn phase4_read_under_load(host: &str, port: u16) {
    // Writer tasks: continuously book in their own tenants
    let stop = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
    let mut writer_handles = Vec::new();
    for _ in 0..5 {
        let host = host.to_string();
        let stop = stop.clone();
        writer_handles.push(tokio::spawn(async move {
            let client = connect(&host, port).await;
            let (staff_id, service_id) = seed_tenant(&client).await;
            let mut i = 0i64;
            while !stop.load(std::sync::atomic::Ordering::Relaxed) {
                let id = Ulid::new();
                let at = i * 2 * HOUR;
                let _ = client
                    .batch_execute(&format!(
                        "INSERT INTO appointments (id, customer_name, service_id, staff_id, at) VALUES ('{id}', 'W', '{service_id}', '{staff_id}', {at})"
                    ))
                    .await;
                i += 1;
            }
        }));
    }

    // Reader tasks: list appointments and the queue, measure latency
    let n_readers = 10;
    let reads_per_reader = 500;
    let mut reader_handles = Vec::new();

    for _ in 0..n_readers {
        let host = host.to_string();
        reader_handles.push(tokio::spawn(async move {
            let client = connect(&host, port).await;
            let (staff_id, service_id) = seed_tenant(&client).await;
            for i in 0..100 {
                let id = Ulid::new();
                let at = (i as i64) * 2 * HOUR;
                client
                    .batch_execute(&format!(
                        "INSERT INTO appointments (id, customer_name, service_id, staff_id, at) VALUES ('{id}', 'R', '{service_id}', '{staff_id}', {at})"
                    ))
                    .await
                    .unwrap();
            }

            let mut latencies = Vec::with_capacity(reads_per_reader);
            for i in 0..reads_per_reader {
                let t = Instant::now();
                if i % 2 == 0 {
                    client
                        .batch_execute(&format!(
                            "SELECT * FROM appointments WHERE staff_id = '{staff_id}'"
                        ))
                        .await
                        .unwrap();
                } else {
                    client.batch_execute("SELECT * FROM queue").await.unwrap();
                }
                latencies.push(t.elapsed());
            }
            latencies
        }));
    }

    let mut all_latencies = Vec::new();
    for h in reader_handles {
        all_latencies.extend(h.await.unwrap());
    }

    stop.store(true, std::sync::atomic::Ordering::Relaxed);
    for h in writer_handles {
        let _ = h.await;
    }

    print_latency("read latency", &mut all_latencies);
}

async fn phase5_connection_storm(host: &str, port: u16) {
    let n_conns = 50;
    let ops_per_conn = 10;

    let start = Instant::now();
    let mut handles = Vec::new();
    let success = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));

    for _ in 0..n_conns {
        let host = host.to_string();
        let success = success.clone();
        handles.push(tokio::spawn(async move {
            let client = connect(&host, port).await;
            let (staff_id, service_id) = seed_tenant(&client).await;

            for i in 0..ops_per_conn {
                let id = Ulid::new();
                let at = (i as i64) * 2 * HOUR;
                client
                    .batch_execute(&format!(
                        "INSERT INTO appointments (id, customer_name, service_id, staff_id, at) VALUES ('{id}', 'Storm', '{service_id}', '{staff_id}', {at})"
                    ))
                    .await
                    .unwrap();
            }
            success.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        }));
    }

    for h in handles {
        let _ = h.await;
    }

    let elapsed = start.elapsed();
    let ok = success.load(std::sync::atomic::Ordering::Relaxed);
    println!(
        "  {n_conns} connections, {ops_per_conn} ops each: {ok}/{n_conns} succeeded in {:.2}s",
        elapsed.as_secs_f64()
    );
}

#[tokio::main]
async fn main() {
    let host = std::env::var("WAITQ_HOST").unwrap_or_else(|_| "127.0.0.1".into());
    let port: u16 = std::env::var("WAITQ_PORT")
        .unwrap_or_else(|_| "5433".into())
        .parse()
        .expect("invalid WAITQ_PORT");

    println!("=== waitq stress benchmark ===");
    println!("target: {host}:{port}\n");

    // Each phase uses its own tenant (unique dbname) to avoid interference

    println!("[phase 1] sequential write throughput");
    phase1_sequential(&host, port).await;

    println!("\n[phase 2] concurrent write throughput");
    phase2_concurrent(&host, port).await;

    println!("\n[phase 3] queue promotion throughput");
    phase3_promotion_throughput(&host, port).await;

    println!("\n[phase 4] read latency under write load");
    phase4_read_under_load(&host, port).await;

    println!("\n[phase 5] connection storm");
    phase5_connection_storm(&host, port).await;

    println!("\n=== benchmark complete ===");
}
