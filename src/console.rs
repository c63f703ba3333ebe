//! Terminal voice session behind the `homie voice` CLI command.
//!
//! Opens the local microphone and speaker, starts a session with the
//! configured persona and prints status and filter changes until Ctrl-C or
//! until the model ends the conversation.
//!
//! ```text
//! $ GEMINI_API_KEY=... homie voice
//! ```

use anyhow::Result;
use anyhow::anyhow;

use crate::config::HomieConfig;

/// Run one voice session in the terminal.
#[cfg(feature = "device-audio")]
pub async fn run(config: HomieConfig) -> Result<()> {
    use crate::state::AppState;
    use tokio::sync::broadcast::error::RecvError;

    let state = AppState::new(config).map_err(|e| anyhow!(e.to_string()))?;
    let mut status_rx = state.voice.subscribe_status();
    let mut filters_rx = state.filters.subscribe();

    state
        .voice
        .start(state.session_config.clone())
        .await
        .map_err(|e| anyhow!("{} ({})", e.user_message(), e))?;
    println!("Listening. Press Ctrl-C to stop.");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = status_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let status = status_rx.borrow_and_update().clone();
                println!("[{status}]");
                if !status.is_live() {
                    break;
                }
            }
            filters = filters_rx.recv() => match filters {
                Ok(filters) => {
                    let count = state.listings.search(&filters).await.map(|l| l.len()).unwrap_or(0);
                    println!(
                        "Filters: {} ({count} matches)",
                        serde_json::to_string(&filters).unwrap_or_default()
                    );
                }
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            },
        }
    }

    state.voice.stop().await;
    for citation in state.voice.citations() {
        println!("Source: {} <{}>", citation.title, citation.uri);
    }
    Ok(())
}

#[cfg(not(feature = "device-audio"))]
pub async fn run(_config: HomieConfig) -> Result<()> {
    Err(anyhow!(
        "`homie voice` requires the `device-audio` feature. \
         Rebuild with `--features device-audio` to use the local microphone and speaker."
    ))
}
