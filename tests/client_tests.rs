mod common;

use anselus_cli::client::AnselusClient;
use anselus_cli::errors::ClientError;
use anselus_cli::protocol::RegistrationStatus;
use anselus_cli::storage::StorageBackend;
use anselus_config::Config;
use common::{FakeServer, DEVID, GREETING, PASSWORD, WID};
use tempfile::tempdir;

#[test]
fn register_then_login() {
    let server = FakeServer::start(2, GREETING, common::login_responder);
    let dir = tempdir().unwrap();
    let mut client = AnselusClient::new(dir.path(), Config::default()).unwrap();

    let result = client.register_account(&server.server(), PASSWORD).unwrap();
    assert_eq!(result.status, RegistrationStatus::Registered);
    assert!(!client.is_connected());

    let profile = client.get_active_profile().unwrap().clone();
    assert_eq!(profile.wid, result.wid);
    assert_eq!(profile.domain, "127.0.0.1");
    assert_eq!(profile.port, server.port);

    let address = profile.address();
    let store = client.store();
    assert!(store.get_workspace(&profile.wid, &profile.domain).is_some());
    let session = store.get_session(&address).expect("device session");
    assert_eq!(session.devid, DEVID);
    assert!(session.session.starts_with("CURVE25519:"));
    assert_eq!(store.keys_for(&address).len(), 5);
    assert_eq!(store.folders_for(&address).len(), 7);

    let profile_dir = dir.path().join(&profile.id);
    assert!(profile_dir.join("files").join("attachments").is_dir());

    let response = client.login(None, PASSWORD).unwrap();
    assert_eq!(response.code, 200);
    assert!(client.is_connected());
    drop(client);

    let requests = server.finish();
    let register = requests
        .iter()
        .find(|line| line.starts_with("REGISTER "))
        .expect("register request");
    assert!(register.ends_with(&session.session));
    assert!(requests.contains(&format!("LOGIN {}", profile.wid)));
    assert!(requests.contains(&format!("DEVICE {DEVID} {}", session.session)));
    assert_eq!(requests.iter().filter(|line| *line == "QUIT").count(), 2);
}

#[test]
fn refused_registration_leaves_no_local_data() {
    let server = FakeServer::start(1, GREETING, |_| Some("304 REGISTRATION CLOSED".into()));
    let dir = tempdir().unwrap();
    let mut client = AnselusClient::new(dir.path(), Config::default()).unwrap();

    let result = client.register_account(&server.server(), PASSWORD).unwrap();
    assert_eq!(result.status, RegistrationStatus::Closed);
    assert!(!client.get_active_profile().unwrap().has_identity());
    assert!(client.store().workspaces().is_empty());
    server.finish();
}

#[test]
fn registration_rolls_back_when_profile_cannot_be_saved() {
    let server = FakeServer::start(1, GREETING, common::login_responder);
    let dir = tempdir().unwrap();
    let mut client = AnselusClient::new(dir.path(), Config::default()).unwrap();
    std::fs::create_dir(dir.path().join("profiles.json.tmp")).unwrap();

    assert!(client.register_account(&server.server(), PASSWORD).is_err());
    let requests = server.finish();
    let wid = requests
        .iter()
        .find_map(|line| line.strip_prefix("REGISTER "))
        .and_then(|rest| rest.split_whitespace().next())
        .expect("register request")
        .to_string();

    assert!(!client.get_active_profile().unwrap().has_identity());
    let store = client.store();
    assert!(store.workspaces().is_empty());
    let address = format!("{wid}/127.0.0.1");
    assert!(store.keys_for(&address).is_empty());
    assert!(store.folders_for(&address).is_empty());
    assert!(store.get_session(&address).is_none());
}

#[test]
fn second_registration_is_refused() {
    let server = FakeServer::start(1, GREETING, common::login_responder);
    let dir = tempdir().unwrap();
    let mut client = AnselusClient::new(dir.path(), Config::default()).unwrap();
    client.register_account(&server.server(), PASSWORD).unwrap();
    server.finish();

    assert!(matches!(
        client.register_account("127.0.0.1:1", PASSWORD),
        Err(ClientError::ResourceExists(_))
    ));
}

#[test]
fn failed_password_is_a_server_error() {
    let server = FakeServer::start(2, GREETING, |request| {
        if request.starts_with("PASSWORD") {
            Some("402 AUTHENTICATION FAILURE".into())
        } else {
            common::login_responder(request)
        }
    });
    let dir = tempdir().unwrap();
    let mut client = AnselusClient::new(dir.path(), Config::default()).unwrap();
    client.register_account(&server.server(), PASSWORD).unwrap();

    match client.login(None, "Wr0ng!Passphrase") {
        Err(ClientError::ServerError(message)) => assert!(message.starts_with("402")),
        other => panic!("expected server error, got {other:?}"),
    }
    drop(client);
    server.finish();
}

#[test]
fn login_needs_a_known_session() {
    let dir = tempdir().unwrap();
    let mut client = AnselusClient::new(dir.path(), Config::default()).unwrap();
    assert!(matches!(
        client.login(Some(&format!("{WID}/example.com")), PASSWORD),
        Err(ClientError::ResourceNotFound(_))
    ));
    assert!(matches!(
        client.login(Some("not an address"), PASSWORD),
        Err(ClientError::BadParameterValue(_))
    ));
}

#[test]
fn unregister_uses_open_connection() {
    let server = FakeServer::start(2, GREETING, common::login_responder);
    let dir = tempdir().unwrap();
    let mut client = AnselusClient::new(dir.path(), Config::default()).unwrap();
    client.register_account(&server.server(), PASSWORD).unwrap();

    assert!(matches!(
        client.unregister_account(PASSWORD),
        Err(ClientError::NetworkError(_))
    ));

    client.connect(&server.server()).unwrap();
    let response = client.unregister_account(PASSWORD).unwrap();
    assert_eq!(response.code, 202);
    client.disconnect().unwrap();
    assert!(!client.is_connected());

    let requests = server.finish();
    assert!(requests.iter().any(|line| line.starts_with("UNREGISTER ")));
}

#[test]
fn preregister_talks_to_localhost() {
    let server = FakeServer::start(1, GREETING, |_| Some(format!("200 OK {WID} 4411-abcd csimons")));
    let dir = tempdir().unwrap();
    let mut client = AnselusClient::new(dir.path(), Config::default()).unwrap();

    let info = client.preregister_account(server.port, Some("csimons")).unwrap();
    assert_eq!(info.wid, WID);
    assert_eq!(info.regcode, "4411-abcd");
    assert_eq!(info.uid.as_deref(), Some("csimons"));
    assert_eq!(server.finish(), vec!["PREREG csimons", "QUIT"]);
}

#[test]
fn set_user_id_returns_new_address() {
    let server = FakeServer::start(1, GREETING, common::login_responder);
    let dir = tempdir().unwrap();
    let mut client = AnselusClient::new(dir.path(), Config::default()).unwrap();
    client.register_account(&server.server(), PASSWORD).unwrap();
    server.finish();

    assert_eq!(client.set_user_id("csimons").unwrap(), "csimons/127.0.0.1");
    let profile = client.get_active_profile().unwrap().clone();
    assert_eq!(
        client
            .store()
            .get_workspace(&profile.wid, &profile.domain)
            .unwrap()
            .userid
            .as_deref(),
        Some("csimons")
    );
}
