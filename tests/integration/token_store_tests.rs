//! Integration tests for the cached token store and its configuration

use usso_login::{FileTokenStore, LoginConfig, SsoData, TokenStore};

fn token() -> SsoData {
    SsoData {
        consumer_key: "consumerkey".to_string(),
        consumer_secret: "consumersecret".to_string(),
        realm: "realm".to_string(),
        token_key: "tokenkey".to_string(),
        token_name: "tokenname".to_string(),
        token_secret: "tokensecret".to_string(),
    }
}

#[test]
fn test_configured_token_path_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let token_path = dir.path().join("usso").join("token.json");
    let token_path_str = token_path.to_string_lossy().into_owned();

    let config = LoginConfig::load_from(&dir.path().join("config.toml"))
        .unwrap()
        .with_overrides(|key| (key == "USSO_TOKEN_PATH").then(|| token_path_str.clone()));
    assert_eq!(config.token_path().unwrap(), token_path);

    let store = FileTokenStore::new(config.token_path().unwrap());
    store.save_token(&token()).unwrap();
    assert_eq!(store.read_token().unwrap(), token());

    let on_disk: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&token_path).unwrap()).unwrap();
    assert_eq!(on_disk["token_name"], "tokenname");
    assert_eq!(on_disk["consumer_key"], "consumerkey");
}

#[test]
fn test_corrupted_token_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("token.json");
    std::fs::write(&path, r#"{"consumer_key": "k", "realm": 5}"#).unwrap();

    let err = FileTokenStore::new(path).read_token().unwrap_err();
    let message = err.to_string();
    assert!(message.starts_with("cannot unmarshal token: "), "{}", message);
    assert!(message.contains("line 1 column"), "{}", message);
}

#[test]
fn test_reads_token_written_by_other_client() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("token.json");
    std::fs::write(
        &path,
        r#"{
            "consumer_key": "consumerkey",
            "consumer_secret": "consumersecret",
            "realm": "realm",
            "token_key": "tokenkey",
            "token_name": "tokenname",
            "token_secret": "tokensecret"
        }"#,
    )
    .unwrap();

    assert_eq!(FileTokenStore::new(path).read_token().unwrap(), token());
}
