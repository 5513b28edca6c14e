use tern_shared::constants::{ADMIT_RETRIES, ADMIT_RETRY_INTERVAL};

use crate::stats::Stats;

/// Tries to reserve one unit of in-flight budget. Admits immediately while
/// the counter is at or under the limit; otherwise retries up to 100 times
/// with a short sleep before each, bounding the total wait at ~1s. The
/// controller never touches the counter itself; admitted work holds a
/// `TxGuard` instead.
pub async fn admit(stats: &Stats, task_limit: i64) -> bool {
    if stats.tx() <= task_limit {
        return true;
    }
    for _ in 0..ADMIT_RETRIES {
        tokio::time::sleep(ADMIT_RETRY_INTERVAL).await;
        if stats.tx() <= task_limit {
            return true;
        }
    }
    false
}
