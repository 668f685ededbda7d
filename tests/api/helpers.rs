use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;
use lead_intake::configuration::get_configuration;
use lead_intake::configuration::Settings;
use lead_intake::email_client::EmailMessage;
use lead_intake::email_client::MailError;
use lead_intake::email_client::MailTransport;
use lead_intake::mailing_list::subscriber_hash;
use lead_intake::startup::Application;
use lead_intake::telemetry::get_subscriber;
use lead_intake::telemetry::init_subscriber;
use once_cell::sync::Lazy;
use secrecy::Secret;
use wiremock::matchers::method;
use wiremock::matchers::path;
use wiremock::Mock;
use wiremock::MockServer;
use wiremock::ResponseTemplate;

pub const AUDIENCE: &str = "test-audience";
pub const OPERATOR: &str = "team@agency.test";

/// Init the tracing subscriber once for the whole test binary.
///
/// To opt in to verbose logging, use the env var `TEST_LOG`:
///
/// ```sh
///      TEST_LOG=true cargo test [test_name] | bunyan
/// ```
static TRACING: Lazy<()> = Lazy::new(|| {
    // the two sinks are different closure types, hence the two arms
    match std::env::var("TEST_LOG") {
        Ok(_) => {
            let subscriber = get_subscriber("test", "debug", std::io::stdout);
            init_subscriber(subscriber).expect("init tracing");
        }
        Err(_) => {
            let subscriber = get_subscriber("test", "debug", std::io::sink);
            init_subscriber(subscriber).expect("init tracing");
        }
    };
});

/// Stands in for SMTP: records every message, or refuses all of them.
#[derive(Default)]
pub struct Outbox {
    sent: Mutex<Vec<EmailMessage>>,
    broken: AtomicBool,
}

#[async_trait]
impl MailTransport for Outbox {
    async fn deliver(
        &self,
        message: &EmailMessage,
    ) -> Result<(), MailError> {
        if self.broken.load(Ordering::SeqCst) {
            return Err(MailError::Delivery(anyhow::anyhow!(
                "connection refused by smtp server"
            )));
        }
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}

pub struct TestApp {
    pub addr: String,
    /// simulates the mailing-list provider
    pub mailing_list_server: MockServer,
    pub outbox: Arc<Outbox>,
    client: reqwest::Client,
}

impl TestApp {
    pub async fn post_json(
        &self,
        endpoint: &str,
        body: &serde_json::Value,
    ) -> reqwest::Response {
        self.client
            .post(format!("{}{endpoint}", self.addr))
            .json(body)
            .send()
            .await
            .expect("execute request")
    }

    pub async fn post_contact(
        &self,
        body: &serde_json::Value,
    ) -> reqwest::Response {
        self.post_json("/api/contact", body).await
    }

    pub async fn post_newsletter(
        &self,
        body: &serde_json::Value,
    ) -> reqwest::Response {
        self.post_json("/api/newsletter/subscribe", body).await
    }

    pub async fn post_resource_lead(
        &self,
        body: &serde_json::Value,
    ) -> reqwest::Response {
        self.post_json("/api/resources/lead", body).await
    }

    pub fn sent_emails(&self) -> Vec<EmailMessage> { self.outbox.sent.lock().unwrap().clone() }

    pub fn break_smtp(&self) { self.outbox.broken.store(true, Ordering::SeqCst); }

    /// Every tag name sent to the provider's tags endpoint, in request order
    pub async fn tags_sent(&self) -> Vec<String> {
        self.mailing_list_server
            .received_requests()
            .await
            .unwrap()
            .iter()
            .filter(|r| r.url.path().ends_with("/tags"))
            .flat_map(|r| {
                let body: serde_json::Value = serde_json::from_slice(&r.body).unwrap();
                body["tags"]
                    .as_array()
                    .unwrap()
                    .iter()
                    .map(|t| t["name"].as_str().unwrap().to_string())
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    /// Accept upserts and tag calls for `email`, expecting exactly one upsert.
    pub async fn provider_accepts(
        &self,
        email: &str,
    ) {
        Mock::given(method("PUT"))
            .and(path(member_path(email)))
            .respond_with(ResponseTemplate::new(200))
            .named("upsert member")
            .expect(1)
            .mount(&self.mailing_list_server)
            .await;
        Mock::given(method("POST"))
            .and(path(format!("{}/tags", member_path(email))))
            .respond_with(ResponseTemplate::new(204))
            .named("attach tags")
            .mount(&self.mailing_list_server)
            .await;
    }
}

pub fn member_path(email: &str) -> String { format!("/lists/{AUDIENCE}/members/{}", subscriber_hash(email)) }

/// Links found in an email body. Entities are decoded first, since hrefs are
/// attribute-escaped.
pub fn links(html: &str) -> Vec<String> {
    let html = htmlescape::decode_html(html).expect("email body has malformed entities");
    linkify::LinkFinder::new()
        .links(&html)
        .filter(|l| *l.kind() == linkify::LinkKind::Url)
        .map(|l| l.as_str().to_owned())
        .collect()
}

pub async fn spawn_app() -> TestApp { spawn_app_with(|_| {}).await }

/// Spawn the app on a random port with a recording mail transport and the
/// mailing-list provider pointed at a `MockServer`. `customise` runs last, so
/// tests can unset parts of the config.
pub async fn spawn_app_with(customise: impl FnOnce(&mut Settings)) -> TestApp {
    Lazy::force(&TRACING);

    let mailing_list_server = MockServer::start().await;

    let cfg = {
        let mut cfg = get_configuration().expect("read configuration");
        // port 0: let the OS pick, then ask the app which one it got
        cfg.application.port = 0;
        cfg.notifications.recipient = Some(OPERATOR.to_string());
        cfg.mailing_list.api_key = Some(Secret::new("test-key-us1".to_string()));
        cfg.mailing_list.audience_id = Some(AUDIENCE.to_string());
        cfg.mailing_list.base_url = Some(mailing_list_server.uri());
        customise(&mut cfg);
        cfg
    };

    let outbox = Arc::new(Outbox::default());
    let app = Application::build_with_transport(
        cfg,
        Some(outbox.clone() as Arc<dyn MailTransport>),
    )
    .await
    .expect("build app");

    let port = app.get_port();
    tokio::spawn(app.run_until_stopped());

    TestApp {
        addr: format!("http://127.0.0.1:{port}"),
        mailing_list_server,
        outbox,
        client: reqwest::Client::new(),
    }
}
