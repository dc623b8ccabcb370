/// Awaits `$operation` up to three times, pausing between attempts, and yields the last
/// error once attempts run out. `$operation` is re-evaluated on each attempt.
macro_rules! retry_ledger_operation {
    ($context:expr, $operation:expr) => {{
        const MAX_ATTEMPTS: u32 = 3;
        const RETRY_DELAY_MILLIS: u64 = 2_000;

        let context_value: String = $context.into();
        let mut attempt = 1;

        loop {
            match ($operation).await {
                Ok(value) => break Ok(value),
                Err(err) if attempt >= MAX_ATTEMPTS => {
                    log::error!(
                        "{} failed after {} attempt(s): {:#}",
                        context_value,
                        attempt,
                        err
                    );
                    break Err(err);
                }
                Err(err) => {
                    log::warn!(
                        "Attempt {}/{} for {} failed: {:#}. Retrying in {}ms.",
                        attempt,
                        MAX_ATTEMPTS,
                        context_value,
                        err,
                        RETRY_DELAY_MILLIS
                    );
                    tokio::time::sleep(std::time::Duration::from_millis(RETRY_DELAY_MILLIS))
                        .await;
                    attempt += 1;
                }
            }
        }
    }};
}

pub(crate) use retry_ledger_operation;
