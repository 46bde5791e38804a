use std::time::Duration;

/// Poll `check` every 10ms until it holds or `attempts` run out.
pub async fn until(attempts: usize, mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..attempts {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
