//! Credential gating at the dispatch boundary.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde_json::json;

use caproute::router::{CapabilityRouter, DispatchError, DuplicatePolicy};
use caproute::types::{ArgumentBag, Identity};
use caproute::validator::{CredentialValidator, StaticTokenStore};

fn gated_router() -> CapabilityRouter {
    let mut tokens = HashMap::new();
    tokens.insert(
        "token1".to_owned(),
        Identity {
            user: "foo".to_owned(),
            email: Some("foo@bar.com".to_owned()),
            phone: Some("123433".to_owned()),
        },
    );
    tokens.insert("token2".to_owned(), Identity::named("austin"));

    let store: Arc<dyn CredentialValidator> = Arc::new(StaticTokenStore::from_map(tokens));
    CapabilityRouter::new(Some(store), DuplicatePolicy::Overwrite)
}

#[test]
fn unknown_credential_is_unauthorized_and_handler_never_runs() {
    let invocations = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&invocations);

    let router = gated_router();
    router
        .register(
            "guarded",
            Arc::new(move |_args, _identity| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(json!("should never happen"))
            }),
        )
        .expect("register");

    let result = router.dispatch("guarded", &ArgumentBag::new(), Some("bogus"));
    assert!(matches!(result, Err(DispatchError::Unauthorized)));
    assert_eq!(invocations.load(Ordering::SeqCst), 0);
}

#[test]
fn missing_credential_is_indistinguishable_from_unknown() {
    let router = gated_router();
    router
        .register("guarded", Arc::new(|_args, _identity| Ok(json!(null))))
        .expect("register");

    let missing = router.dispatch("guarded", &ArgumentBag::new(), None);
    let unknown = router.dispatch("guarded", &ArgumentBag::new(), Some("nope"));
    let empty = router.dispatch("guarded", &ArgumentBag::new(), Some(""));

    assert!(matches!(missing, Err(DispatchError::Unauthorized)));
    assert!(matches!(unknown, Err(DispatchError::Unauthorized)));
    assert!(matches!(empty, Err(DispatchError::Unauthorized)));
}

#[test]
fn valid_credential_binds_identity_into_the_call() {
    let router = gated_router();
    router
        .register(
            "whoami",
            Arc::new(|_args, identity| {
                let identity = identity.ok_or_else(|| anyhow::anyhow!("no identity bound"))?;
                Ok(json!({ "user": identity.user }))
            }),
        )
        .expect("register");

    let value = router
        .dispatch("whoami", &ArgumentBag::new(), Some("token1"))
        .expect("known token should pass the gate");
    assert_eq!(value, json!({ "user": "foo" }));
}

#[test]
fn gate_runs_before_lookup() {
    // Unauthorized even for a command that does not exist: the gate's
    // answer must not leak which names are registered.
    let router = gated_router();
    let result = router.dispatch("nonexistent", &ArgumentBag::new(), None);
    assert!(matches!(result, Err(DispatchError::Unauthorized)));
}

#[test]
fn distinct_tokens_bind_distinct_identities() {
    let router = gated_router();
    router
        .register(
            "whoami",
            Arc::new(|_args, identity| {
                Ok(json!(identity.map(|i| i.user.clone())))
            }),
        )
        .expect("register");

    let foo = router
        .dispatch("whoami", &ArgumentBag::new(), Some("token1"))
        .expect("token1");
    let austin = router
        .dispatch("whoami", &ArgumentBag::new(), Some("token2"))
        .expect("token2");

    assert_eq!(foo, json!("foo"));
    assert_eq!(austin, json!("austin"));
}

#[test]
fn ungated_router_ignores_credentials() {
    let router = CapabilityRouter::default();
    router
        .register("open", Arc::new(|_args, identity| Ok(json!(identity.is_none()))))
        .expect("register");

    let value = router
        .dispatch("open", &ArgumentBag::new(), Some("anything"))
        .expect("no gate, no rejection");
    assert_eq!(value, json!(true));
}
