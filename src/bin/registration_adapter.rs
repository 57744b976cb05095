//! # Registration Adapter
//!
//! Runs the HTTP registration endpoint with a reference consumer loop that
//! accepts every well-formed registration. Configured through `PUBSUB_*`
//! environment variables; stops on Ctrl-C.

use anyhow::Context;
use pubsub_adapter::logging::{init_structured_logging, log_error, log_registration_operation};
use pubsub_adapter::{AdapterConfig, BridgeError, Delivery, JsonRegistrationParser, PubSubAdapter};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AdapterConfig::from_env().context("loading adapter configuration")?;
    init_structured_logging(config.log_format);

    let adapter = PubSubAdapter::start(config, JsonRegistrationParser::new())
        .await
        .context("starting registration adapter")?;

    info!(address = %adapter.local_addr(), "Registration adapter ready");

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                info!("Shutdown signal received");
                break;
            }
            next = adapter.next_registration() => match next {
                Ok((registration, acker)) => {
                    let dev_addr = registration.dev_addr.to_string();
                    match acker.ack(200, "registered") {
                        Ok(Delivery::Delivered) => log_registration_operation(
                            "ack",
                            Some(&dev_addr),
                            Some(acker.request_id()),
                            "delivered",
                            None,
                        ),
                        Ok(Delivery::Abandoned) => log_registration_operation(
                            "ack",
                            Some(&dev_addr),
                            Some(acker.request_id()),
                            "abandoned",
                            Some("caller stopped waiting"),
                        ),
                        Err(e) => log_error("consumer", "ack", &e.to_string(), Some(&dev_addr)),
                    }
                }
                Err(BridgeError::Closed) => {
                    warn!("Registration bridge closed; stopping consumer");
                    break;
                }
                Err(e) => log_error("consumer", "next_registration", &e.to_string(), None),
            }
        }
    }

    adapter.shutdown().await.context("shutting down adapter")?;
    Ok(())
}
