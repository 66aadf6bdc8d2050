use std::net::Ipv4Addr;
use std::sync::Arc;

use anyhow::Context as _;
use formrelay::mail::{Envelope, MailerConfig, SmtpMailer};
use formrelay::staging::Stager;
use formrelay::{Context, EnvConfig, ServerConfig};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    if let Err(err) = run().await {
        tracing::error!("{:#}", err);
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let config = ServerConfig::from_env().context("invalid server configuration")?;
    let mailer_config = MailerConfig::from_env().context("invalid SMTP configuration")?;

    let envelope = Envelope::resolve(&mailer_config, config.receiver_email.as_deref())
        .context("cannot determine where to deliver submissions")?;
    tracing::info!(recipient = %envelope.recipient(), "relaying submissions");

    let mailer = SmtpMailer::from_config(mailer_config).context("invalid SMTP transport")?;
    let stager = Stager::create(&config.upload_dir)
        .await
        .context("cannot create upload directory")?;

    let ctx = Context::new(Arc::new(mailer), stager, envelope, config.upload_cleanup);
    let routes = formrelay::router(ctx, &config);

    formrelay::serve((Ipv4Addr::UNSPECIFIED, config.port), routes).await?;
    Ok(())
}
