//! Token store loading from TOML files.

use std::fs;
use std::path::PathBuf;

use tempfile::TempDir;

use caproute::validator::{CredentialValidator, StaticTokenStore};

const TOKEN_FILE: &str = r#"
[tokens.token1]
user = "foo"
email = "foo@bar.com"
phone = "123433"

[tokens.token2]
user = "austin"
email = "austin@example.com"

[tokens.token3]
user = "lena"
"#;

fn write_token_file(contents: &str) -> (TempDir, PathBuf) {
    let dir = TempDir::new().expect("should create temp dir");
    let path = dir.path().join("tokens.toml");
    fs::write(&path, contents).expect("write token file");
    set_private(&path);
    (dir, path)
}

#[cfg(unix)]
fn set_private(path: &std::path::Path) {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600)).expect("chmod 600");
}

#[cfg(not(unix))]
fn set_private(_path: &std::path::Path) {}

#[test]
fn load_parses_all_tokens() {
    let (_dir, path) = write_token_file(TOKEN_FILE);
    let store = StaticTokenStore::load(&path).expect("store should load");

    assert_eq!(store.len(), 3);
    assert!(!store.is_empty());
}

#[test]
fn loaded_tokens_resolve_to_their_identities() {
    let (_dir, path) = write_token_file(TOKEN_FILE);
    let store = StaticTokenStore::load(&path).expect("store should load");

    let identity = store.validate("token1").expect("token1 should resolve");
    assert_eq!(identity.user, "foo");
    assert_eq!(identity.email.as_deref(), Some("foo@bar.com"));
    assert_eq!(identity.phone.as_deref(), Some("123433"));

    let identity = store.validate("token3").expect("token3 should resolve");
    assert_eq!(identity.user, "lena");
    assert_eq!(identity.email, None);
}

#[test]
fn load_missing_file_errors() {
    let dir = TempDir::new().expect("should create temp dir");
    let path = dir.path().join("does-not-exist.toml");

    let result = StaticTokenStore::load(&path);
    assert!(result.is_err());
}

#[test]
fn load_invalid_toml_errors() {
    let (_dir, path) = write_token_file("this is not toml [[[");
    let result = StaticTokenStore::load(&path);
    assert!(result.is_err());
}

#[test]
fn load_empty_tokens_table_yields_empty_store() {
    let (_dir, path) = write_token_file("");
    let store = StaticTokenStore::load(&path).expect("empty file is valid");
    assert!(store.is_empty());
    assert!(store.validate("anything").is_none());
}

#[cfg(unix)]
#[test]
fn load_rejects_group_readable_file() {
    use std::os::unix::fs::PermissionsExt;

    let dir = TempDir::new().expect("should create temp dir");
    let path = dir.path().join("tokens.toml");
    fs::write(&path, TOKEN_FILE).expect("write token file");
    fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).expect("chmod 644");

    let result = StaticTokenStore::load(&path);
    let message = match result {
        Err(e) => e.to_string(),
        Ok(_) => panic!("world-readable token file must be refused"),
    };
    assert!(message.contains("0600"), "unexpected error: {message}");
}
