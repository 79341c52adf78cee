use mailer::{config::Config, error::Error, logging, mail_server::MailServer};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Error> {
    let path = Config::locate()?;
    let config = Config::from_file(&path)?;
    let _guard = logging::init(&config.logging)?;
    info!("Loaded configuration from {}", path.display());

    let mail_server = match MailServer::builder().config(config).start_server().await {
        Ok(mail_server) => mail_server,
        Err(err) => {
            error!("{}", err);
            return Err(err);
        }
    };

    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("Unable to listen for shutdown signal: {}", err);
    }
    info!("Stopping");
    mail_server.signals.stop();
    Ok(())
}
