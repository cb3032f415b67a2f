// Integration tests for `SiteSession` using wiremock.
#![allow(clippy::unwrap_used)]

use std::time::Duration;

use secrecy::SecretString;
use url::Url;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use ptinvitee_api::{Error, SessionAuth, SiteSession, TransportConfig};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup(auth: SessionAuth) -> (MockServer, SiteSession) {
    let server = MockServer::start().await;
    let transport = TransportConfig {
        auth,
        timeout: Duration::from_secs(2),
        ..TransportConfig::default()
    };
    let session = SiteSession::new(Url::parse(&server.uri()).unwrap(), &transport).unwrap();
    (server, session)
}

// ── Happy path ──────────────────────────────────────────────────────

#[tokio::test]
async fn test_get_sends_cookie_and_returns_body() {
    let (server, session) =
        setup(SessionAuth::Cookie(SecretString::from("uid=42; pass=secret"))).await;

    Mock::given(method("GET"))
        .and(path("/invite.php"))
        .and(query_param("id", "42"))
        .and(header("cookie", "uid=42; pass=secret"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<h1>我的后宫</h1>"))
        .expect(1)
        .mount(&server)
        .await;

    let page = session.get("invite.php?id=42").await.unwrap();
    assert_eq!(page.status, 200);
    assert!(page.body.contains("我的后宫"));
    assert_eq!(page.url.path(), "/invite.php");
}

#[tokio::test]
async fn test_token_auth_headers() {
    let (server, session) = setup(SessionAuth::ApiToken {
        api_key: SecretString::from("key-1"),
        authorization: SecretString::from("token-2"),
    })
    .await;

    Mock::given(method("GET"))
        .and(path("/invite.php"))
        .and(header("api-key", "key-1"))
        .and(header("authorization", "token-2"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .expect(1)
        .mount(&server)
        .await;

    let page = session.get("invite.php").await.unwrap();
    assert_eq!(page.body, "ok");
}

// ── Failure classification ──────────────────────────────────────────

#[tokio::test]
async fn test_server_error_is_status_error() {
    let (server, session) = setup(SessionAuth::None).await;

    Mock::given(method("GET"))
        .and(path("/usercp.php"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let err = session.get("usercp.php").await.unwrap_err();
    assert!(matches!(err, Error::Status { status: 502, .. }), "{err:?}");
}

#[tokio::test]
async fn test_forbidden_is_authentication_error() {
    let (server, session) = setup(SessionAuth::None).await;

    Mock::given(method("GET"))
        .and(path("/usercp.php"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let err = session.get("usercp.php").await.unwrap_err();
    assert!(matches!(err, Error::Authentication { .. }), "{err:?}");
}

#[tokio::test]
async fn test_redirect_to_login_is_logged_out() {
    let (server, session) = setup(SessionAuth::None).await;

    Mock::given(method("GET"))
        .and(path("/usercp.php"))
        .respond_with(
            ResponseTemplate::new(302)
                .insert_header("location", format!("{}/login.php", server.uri()).as_str()),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/login.php"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(r#"<form method="post" action="takelogin.php"></form>"#),
        )
        .mount(&server)
        .await;

    let err = session.get("usercp.php").await.unwrap_err();
    assert!(matches!(err, Error::LoggedOut { .. }), "{err:?}");
}

#[tokio::test]
async fn test_slow_response_times_out() {
    let (server, session) = setup(SessionAuth::None).await;

    Mock::given(method("GET"))
        .and(path("/index.php"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;

    let err = session
        .get_with_timeout("index.php", Duration::from_millis(200))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Timeout { .. }), "{err:?}");
}
