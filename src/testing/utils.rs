use crate::types::{NodePartition, Trigger};
use std::time::{Duration, Instant};
use tokio::time::sleep;

/// Install a test subscriber honouring `RUST_LOG`, once per process.
pub(crate) fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_test_writer()
        .try_init();
}

/// Wait for a condition with timeout
pub(crate) async fn wait_for<F>(condition: F, timeout: Duration, check_interval: Duration) -> bool
where
    F: Fn() -> bool,
{
    let start = Instant::now();
    while start.elapsed() < timeout {
        if condition() {
            return true;
        }
        sleep(check_interval).await;
    }
    condition()
}

/// Poll an async action until its result satisfies `predicate`.
pub(crate) async fn wait_for_result<F, Fut, T, P>(
    mut action: F,
    predicate: P,
    timeout: Duration,
) -> Option<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = T>,
    P: Fn(&T) -> bool,
{
    let start = Instant::now();
    let interval = Duration::from_millis(20);

    while start.elapsed() < timeout {
        let result = action().await;
        if predicate(&result) {
            return Some(result);
        }
        sleep(interval).await;
    }
    None
}

/// Generate `count` triggers spread over three tenants.
pub(crate) fn generate_triggers(count: usize) -> Vec<Trigger> {
    (0..count)
        .map(|i| Trigger::new(format!("tenant-{}", i % 3), format!("trigger-{:03}", i)))
        .collect()
}

/// Check that node slices together hold every trigger exactly once.
pub(crate) fn covers_exactly(slices: &[NodePartition], triggers: &[Trigger]) -> bool {
    let mut owned: Vec<(String, String)> = slices
        .iter()
        .flat_map(|slice| {
            slice.iter().flat_map(|(tenant, ids)| {
                ids.iter().map(move |id| (tenant.clone(), id.clone()))
            })
        })
        .collect();
    owned.sort();

    let mut expected: Vec<(String, String)> = triggers
        .iter()
        .map(|t| (t.tenant_id.clone(), t.id.clone()))
        .collect();
    expected.sort();

    owned == expected
}
