use std::time::Duration;

use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, warn};

use crate::chat::ChatEndpoint;
use crate::utils::AdapterError;

/// Default cadence at which the typing indicator is re-asserted.
pub const TYPING_INTERVAL: Duration = Duration::from_millis(25_000);

/// Shows the typing indicator in `chat_id` for `delay`, then clears it.
///
/// The indicator is asserted immediately and again every `interval` until
/// `delay` elapses; a re-assert due at the same instant the delay ends is
/// skipped. The re-assert loop is a plain future owned by this call, so it is
/// dropped on every exit path, including cancellation of the caller.
pub async fn simulate_typing(
    chat: &dyn ChatEndpoint,
    chat_id: &str,
    delay: Duration,
    interval: Duration,
) -> Result<(), AdapterError> {
    chat.send_typing_state(chat_id).await?;
    debug!(chat_id, delay_ms = delay.as_millis() as u64, "Simulating typing...");

    let keep_alive = async {
        let mut ticker = time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(e) = chat.send_typing_state(chat_id).await {
                warn!(chat_id, error = %e, "Failed to re-assert typing state.");
            }
        }
    };

    tokio::select! {
        biased;
        _ = time::sleep(delay) => {}
        _ = keep_alive => {}
    }

    chat.clear_typing_state(chat_id).await
}
