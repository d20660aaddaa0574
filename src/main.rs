use stress_test::{stress_test_clear, stress_test_replication, stress_test_scaling};

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}

#[tokio::main]
async fn main() {
    init_tracing();

    println!("\n╔════════════════════════════════════════════════════════════╗");
    println!("║            BASALT STRESS TESTS                             ║");
    println!("╚════════════════════════════════════════════════════════════╝");

    // Out-of-order replication, small and medium
    stress_test_replication(3, 1_000, 100).await.print();
    stress_test_replication(8, 5_000, 500).await.print();

    // Clears racing with writers
    stress_test_clear(3, 1_000, 10).await.print();
    stress_test_clear(6, 5_000, 25).await.print();

    println!("\n╔════════════════════════════════════════════════════════════╗");
    println!("║          SCALING ANALYSIS (replication)                    ║");
    println!("╚════════════════════════════════════════════════════════════╝");
    stress_test_scaling(16, 4).await;

    println!("\n✓ All stress tests completed");
}
