use crate::error::{HearthError, ProviderError};
use std::future::Future;
use std::time::Duration;

/// Client errors that will not resolve by retrying.
fn is_non_retryable(err: &anyhow::Error) -> bool {
    let msg = err.to_string();
    if is_quota_exhausted(&msg) {
        return true;
    }

    if let Some(reqwest_err) = err.downcast_ref::<reqwest::Error>()
        && let Some(status) = reqwest_err.status()
    {
        let code = status.as_u16();
        // 429 and 408 are transient.
        return status.is_client_error() && code != 429 && code != 408;
    }
    for word in msg.split(|c: char| !c.is_ascii_digit()) {
        if let Ok(code) = word.parse::<u16>()
            && (400..500).contains(&code)
        {
            return code != 429 && code != 408;
        }
    }
    false
}

fn is_quota_exhausted(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    lower.contains("insufficient_quota")
        || lower.contains("exceeded your current quota")
        || lower.contains("billing")
        || lower.contains("api key not set")
}

/// Map a raw provider failure onto the transient/permanent split.
pub fn classify_provider_error(capability: &str, err: &anyhow::Error) -> ProviderError {
    let message = format!("{err:#}");
    if is_non_retryable(err) {
        ProviderError::permanent(capability, message)
    } else {
        ProviderError::transient(capability, message)
    }
}

/// Result of a call that may have been retried once.
#[derive(Debug)]
pub struct Attempted<T> {
    pub outcome: Result<T, HearthError>,
    pub attempts: u32,
}

/// Run `op`, retrying exactly once when the first failure is transient.
pub async fn with_single_retry<T, F, Fut>(
    capability: &str,
    backoff: Duration,
    mut op: F,
) -> Attempted<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, HearthError>>,
{
    match op().await {
        Ok(value) => Attempted {
            outcome: Ok(value),
            attempts: 1,
        },
        Err(err) if err.is_transient() => {
            tracing::warn!(capability, error = %err, "transient failure, retrying once");
            if !backoff.is_zero() {
                tokio::time::sleep(backoff).await;
            }
            let outcome = op().await;
            if outcome.is_ok() {
                tracing::info!(capability, "recovered after retry");
            }
            Attempted {
                outcome,
                attempts: 2,
            }
        }
        Err(err) => Attempted {
            outcome: Err(err),
            attempts: 1,
        },
    }
}
