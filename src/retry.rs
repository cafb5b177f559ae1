use crate::error::UpdateError;
use std::future::Future;

/// Run `block` up to `times` times, back to back.
///
/// Errors that cannot change on a second attempt are returned as-is. Once every attempt
/// has failed the result is `FetchFailed` carrying each failure in order, with `hint`
/// as the headline.
pub async fn retry<T, F, Fut>(times: u32, hint: &str, mut block: F) -> Result<T, UpdateError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, UpdateError>>,
{
    let times = times.max(1);
    let mut failures = Vec::new();

    for attempt in 0..times {
        match block(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_deterministic() => return Err(e),
            Err(e) => {
                tracing::warn!("Attempt {}/{} failed: {}", attempt + 1, times, e);
                failures.push(e.to_string());
            }
        }
    }

    Err(UpdateError::FetchFailed {
        context: hint.to_string(),
        failures,
    })
}
