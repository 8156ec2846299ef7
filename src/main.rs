mod actions;
mod config;
mod github;
mod poller;
mod status;
mod utils;

use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::{
    actions::Action,
    config::{env_replacer, load_config},
    github::GitHubStatusClient,
    poller::{Cancellation, Poller},
};

static OUTPUT_NAME: &str = "jenkins-image-name";

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // stdout is reserved for workflow commands.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Cancels `cancel` on SIGINT, or SIGTERM on unix, recording which signal fired.
async fn cancel_on_signal(cancel: Cancellation) {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => {}
            Err(err) => {
                error!("failed to install Ctrl+C handler: {}", err);
                std::future::pending::<()>().await
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(err) => {
                error!("failed to install SIGTERM handler: {}", err);
                std::future::pending::<()>().await
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let reason = tokio::select! {
        _ = ctrl_c => "received SIGINT",
        _ = terminate => "received SIGTERM",
    };
    info!(reason, "cancelling");
    cancel.cancel(reason);
}

#[tokio::main]
async fn main() {
    init_tracing();
    let action = Action::new(env_replacer);

    let config = match load_config(env_replacer) {
        Ok(config) => config,
        Err(e) => action.fatal(&format!("error parsing configuration: {e}")),
    };
    if let Err(e) = config.validate() {
        action.fatal(&format!("error validating configuration: {e}"));
    }
    info!(?config, version = env!("CARGO_PKG_VERSION"), "starting jenkins-build-info");

    let client = match GitHubStatusClient::new(&config) {
        Ok(client) => client,
        Err(e) => action.fatal(&format!("error creating http client: {e}")),
    };
    info!(url = client.url(), "polling commit status");

    let cancel = Cancellation::new();
    tokio::spawn(cancel_on_signal(cancel.clone()));

    let report = match Poller::new(&client, &action, &config).run(&cancel).await {
        Ok(report) => report,
        Err(e) => action.fatal(&format!("error getting build info: {e}")),
    };

    let image = match report.image_reference(&config) {
        Ok(image) => image,
        Err(e) => action.fatal(&format!("error getting image name: {e}")),
    };
    info!(%image, "resolved image");

    if let Err(e) = action.set_output(OUTPUT_NAME, &image) {
        action.fatal(&format!("error setting output: {e}"));
    }
    if let Err(e) = action.save_state(OUTPUT_NAME, &image) {
        action.fatal(&format!("error saving state: {e}"));
    }
}
