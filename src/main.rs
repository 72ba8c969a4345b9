use stress_test::{
    stress_test_contention, stress_test_expiry_race, stress_test_scaling, stress_test_snapshots,
};
use tracing_subscriber::EnvFilter;
pub mod stress_test;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("error")),
        )
        .init();

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("failed to start the Tokio runtime: {}", e);
            std::process::exit(1);
        }
    };
    let passed = rt.block_on(async_main());
    if !passed {
        std::process::exit(1);
    }
}

async fn async_main() -> bool {
    println!("\n\n╔════════════════════════════════════════════════════════════╗");
    println!("║            ASYNC STRESS TESTS                              ║");
    println!("╚════════════════════════════════════════════════════════════╝");

    let mut passed = true;

    // Test 1: contention with a handful of viewers
    let stats = stress_test_contention(4, 500).await;
    stats.print();
    passed &= stats.max_concurrent_holders <= 1;

    // Test 2: contention with many viewers
    let stats = stress_test_contention(32, 500).await;
    stats.print();
    passed &= stats.max_concurrent_holders <= 1;

    // Test 3: everyone races for an expired lock
    let stats = stress_test_expiry_race(16, 100).await;
    stats.print();
    passed &= stats.max_concurrent_holders == 1;

    // Test 4: offline snapshots stay per user
    passed &= stress_test_snapshots(16, 200).await;

    // Test 5: scaling analysis
    println!("\n\n╔════════════════════════════════════════════════════════════╗");
    println!("║          SCALING ANALYSIS (Lock Contention)                ║");
    println!("╚════════════════════════════════════════════════════════════╝");
    stress_test_scaling(24, 8).await;

    if passed {
        println!("\n✓ All stress tests completed successfully!");
    } else {
        println!("\n✗ Stress tests found a violation");
    }
    passed
}
