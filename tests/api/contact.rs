use lead_intake::routes::LeadResponse;
use wiremock::matchers::any;
use wiremock::matchers::method;
use wiremock::Mock;
use wiremock::ResponseTemplate;

use crate::helpers::spawn_app;
use crate::helpers::spawn_app_with;
use crate::helpers::OPERATOR;

fn valid_body() -> serde_json::Value {
    serde_json::json!({
        "name": "Jane Doe",
        "email": "jane@foo.com",
        "message": "We need a new brand.\nCan you help?",
        "company": "Acme",
    })
}

#[tokio::test]
async fn contact_ok() {
    let app = spawn_app().await;
    app.provider_accepts("jane@foo.com").await;

    let resp = app.post_contact(&valid_body()).await;
    assert_eq!(resp.status().as_u16(), 200);
    assert_eq!(
        resp.json::<LeadResponse>().await.unwrap(),
        LeadResponse {
            success: true,
            error: None
        }
    );

    // operator notification, then confirmation to the submitter
    let sent = app.sent_emails();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].recipients, [OPERATOR]);
    assert!(sent[0].html_body.contains("Acme"));
    assert_eq!(sent[1].recipients, ["jane@foo.com"]);

    assert!(app.tags_sent().await.contains(&"contact_form".to_string()));
}

#[tokio::test]
async fn contact_source_becomes_tag() {
    let app = spawn_app().await;
    app.provider_accepts("jane@foo.com").await;

    let mut body = valid_body();
    body["source"] = "pricing-page".into();
    let resp = app.post_contact(&body).await;
    assert_eq!(resp.status().as_u16(), 200);

    assert_eq!(app.tags_sent().await, ["contact_form", "pricing-page"]);
}

#[tokio::test]
async fn contact_missing_fields() {
    let app = spawn_app().await;

    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&app.mailing_list_server)
        .await;

    for field in ["name", "email", "message"] {
        let mut body = valid_body();
        body.as_object_mut().unwrap().remove(field);
        let resp = app.post_contact(&body).await;
        assert_eq!(resp.status().as_u16(), 400, "no {field}");
        assert!(!resp.json::<LeadResponse>().await.unwrap().success);

        let mut body = valid_body();
        body[field] = "   ".into();
        let resp = app.post_contact(&body).await;
        assert_eq!(resp.status().as_u16(), 400, "blank {field}");
    }

    assert!(app.sent_emails().is_empty());
}

#[tokio::test]
async fn contact_malformed_body() {
    let app = spawn_app().await;

    for (body, msg) in [
        (serde_json::json!("just a string"), "not an object"),
        (serde_json::json!({ "name": 42, "email": "jane@foo.com", "message": "hi" }), "name not a string"),
    ] {
        let resp = app.post_contact(&body).await;
        assert_eq!(resp.status().as_u16(), 400, "{msg}");
        assert!(!resp.json::<LeadResponse>().await.unwrap().success, "{msg}");
    }

    let resp = reqwest::Client::new()
        .post(format!("{}/api/contact", app.addr))
        .header("Content-Type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 400);

    assert!(app.sent_emails().is_empty());
}

#[tokio::test]
async fn contact_survives_mailing_list_failure() {
    let app = spawn_app().await;

    for status in [400, 500] {
        let _mock = Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(status))
            .expect(1)
            .mount_as_scoped(&app.mailing_list_server)
            .await;

        let resp = app.post_contact(&valid_body()).await;
        assert_eq!(resp.status().as_u16(), 200, "provider returned {status}");
        assert!(resp.json::<LeadResponse>().await.unwrap().success);
    }
    assert_eq!(app.sent_emails().len(), 4);
}

#[tokio::test]
async fn contact_without_mailing_list_config() {
    let app = spawn_app_with(|cfg| cfg.mailing_list.api_key = None).await;

    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&app.mailing_list_server)
        .await;

    let resp = app.post_contact(&valid_body()).await;
    assert_eq!(resp.status().as_u16(), 200);
    assert_eq!(app.sent_emails().len(), 2);
}

#[tokio::test]
async fn contact_email_failure() {
    let app = spawn_app().await;
    app.break_smtp();

    // no sync once the critical path has failed
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&app.mailing_list_server)
        .await;

    let resp = app.post_contact(&valid_body()).await;
    assert_eq!(resp.status().as_u16(), 500);
    let body = resp.json::<LeadResponse>().await.unwrap();
    assert!(!body.success);
    // no internals leak to the user
    assert!(!body.error.unwrap().contains("smtp"));
}

#[tokio::test]
async fn contact_without_operator_recipient() {
    let app = spawn_app_with(|cfg| cfg.notifications.recipient = None).await;

    let resp = app.post_contact(&valid_body()).await;
    assert_eq!(resp.status().as_u16(), 500);
    assert!(app.sent_emails().is_empty());
}
