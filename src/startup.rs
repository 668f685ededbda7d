use std::net::TcpListener;
use std::sync::Arc;

use actix_web::dev::Server;
use actix_web::web;
use actix_web::App;
use actix_web::HttpServer;
use anyhow::Context;
use tracing_actix_web::TracingLogger;

use crate::configuration::Settings;
use crate::email_client::EmailClient;
use crate::email_client::MailTransport;
use crate::email_client::SmtpMailer;
use crate::mailing_list::MailingListClient;
use crate::routes::health_check;
use crate::routes::json_error_handler;
use crate::routes::submit_contact;
use crate::routes::submit_resource_lead;
use crate::routes::subscribe;

/// Wrapper for actix's `Server` with access to the bound port. Not to be
/// confused with actix's `App`!
pub struct Application {
    /// Left private; use `get_port` to access
    port: u16,
    server: Server,
}

impl Application {
    /// Build the SMTP transport and mailing-list client from `cfg`, then bind.
    ///
    /// Incomplete SMTP or mailing-list settings do not stop the server from
    /// starting; the affected adapter fails closed on every call instead.
    pub async fn build(cfg: Settings) -> Result<Self, anyhow::Error> {
        let transport = SmtpMailer::from_settings(&cfg.smtp)?
            .map(|mailer| Arc::new(mailer) as Arc<dyn MailTransport>);
        if transport.is_none() {
            tracing::warn!("SMTP settings incomplete; every email will fail");
        }
        Self::build_with_transport(cfg, transport).await
    }

    /// Same as `build`, but with the mail transport supplied by the caller
    /// (tests use an in-memory outbox).
    pub async fn build_with_transport(
        cfg: Settings,
        transport: Option<Arc<dyn MailTransport>>,
    ) -> Result<Self, anyhow::Error> {
        let addr = format!("{}:{}", cfg.application.host, cfg.application.port);
        let listener =
            TcpListener::bind(&addr).with_context(|| format!("Failed to bind {addr}"))?;

        // get the port assigned by OS (if 0 was requested)
        let port = listener.local_addr()?.port();

        let email_client = EmailClient::new(transport, cfg.notifications.recipient)
            .context("Failed to load email templates")?;

        let mailing_list = MailingListClient::from_settings(&cfg.mailing_list)
            .context("Failed to build mailing-list client")?;
        if !mailing_list.is_configured() {
            tracing::warn!("mailing-list settings incomplete; every sync will fail");
        }

        let server = run(listener, email_client, mailing_list)?;

        Ok(Self { port, server })
    }

    pub fn get_port(&self) -> u16 { self.port }

    /// Because this consumes `self`, this should be the final function call (or
    /// passed to `tokio::spawn`)
    pub async fn run_until_stopped(self) -> Result<(), std::io::Error> { self.server.await }
}

/// The server is not responsible for binding to an address, it only listens to
/// an already bound address.
///
/// Declares all API endpoints.
pub fn run(
    listener: TcpListener,
    email_client: EmailClient,
    mailing_list: MailingListClient,
) -> Result<Server, anyhow::Error> {
    // `Data` is externally an `Arc` (for sharing/cloning across workers)
    let email_client = web::Data::new(email_client);
    let mailing_list = web::Data::new(mailing_list);

    let server = HttpServer::new(move || {
        App::new()
            .wrap(TracingLogger::default())
            .app_data(web::JsonConfig::default().error_handler(json_error_handler))
            .route("/health_check", web::get().to(health_check))
            .service(
                web::scope("/api")
                    .route("/contact", web::post().to(submit_contact))
                    .route("/newsletter/subscribe", web::post().to(subscribe))
                    .route("/resources/lead", web::post().to(submit_resource_lead)),
            )
            .app_data(email_client.clone())
            .app_data(mailing_list.clone())
    })
    .listen(listener)?
    .run();

    Ok(server)
}
