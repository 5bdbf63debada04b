//! wpp-agent process entry point.
//!
//! Connects the broker and the chat sidecar, then runs both bridge directions
//! until Ctrl-C or until either one stops.

use std::sync::Arc;

use tracing::{error, info};

use wpp_agent::bridge::{InboundBridge, OutboundBridge};
use wpp_agent::broker::{BrokerGateway, LapinConnector};
use wpp_agent::chat::{ChatEndpoint, SidecarClient};
use wpp_agent::config::load_config;
use wpp_agent::utils::{AdapterError, BrokerError, Result, logging};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    if let Err(e) = run().await {
        // Logging may not be up yet if configuration failed
        logging::init("info");
        error!("wpp-agent failed: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let settings = load_config()?;
    logging::init(&settings.log.level);

    let gateway = Arc::new(BrokerGateway::new(
        settings.amqp.clone(),
        Arc::new(LapinConnector),
    ));
    gateway.connect().await?;

    let (client, mut events) = SidecarClient::connect(&settings.wpp).await?;
    info!("Waiting for the chat session to be ready...");
    events.wait_ready().await?;
    info!("Chat session ready.");

    let chat: Arc<dyn ChatEndpoint> = Arc::new(client);
    let outbound = Arc::new(OutboundBridge::new(Arc::clone(&chat), &settings));
    let inbound = InboundBridge::new(chat, Arc::clone(&gateway));

    tokio::select! {
        result = outbound.run(&gateway) => {
            result?;
            return Err(BrokerError::Consume {
                queue: settings.amqp.msg_send_queue.clone(),
                message: "consumer stream ended".to_string(),
            }
            .into());
        }
        result = inbound.run(events.messages) => {
            result?;
            return Err(AdapterError::Disconnected.into());
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received. Exiting gracefully.");
        }
    }

    Ok(())
}
