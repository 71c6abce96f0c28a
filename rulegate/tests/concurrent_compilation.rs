//! Concurrent first use of an authorizer.
//!
//! Many threads hit the same uncompiled actions at once; each rule must be
//! compiled exactly once and every caller must see the same answer.

use std::sync::Arc;

use rulegate::{Authorizer, AuthzError, Principal};
use serde_json::json;

const CALLERS: usize = 32;

fn authorizer() -> Arc<Authorizer<serde_json::Value>> {
    let mut builder = Authorizer::builder("Machine");
    builder
        .register_generic("Start", r#"HasRole("Operator") || HasClaim("shift", "night")"#)
        .unwrap()
        .register_instance(
            "Service",
            r#"Resource.Maintainer == UserId || (HasRole("Supervisor") && Resource.Hours > 1000)"#,
        )
        .unwrap()
        .register_generic("Broken", "UserId ==")
        .unwrap();
    Arc::new(builder.build())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn rule_compiles_once_under_contention() {
    let authz = authorizer();
    let operator = Arc::new(Principal::new().with_subject("Wario").with_role("Operator"));
    let machine = Arc::new(json!({ "Maintainer": "Wario", "Hours": 200 }));

    let mut handles = Vec::with_capacity(CALLERS);
    for _ in 0..CALLERS {
        let authz = Arc::clone(&authz);
        let operator = Arc::clone(&operator);
        let machine = Arc::clone(&machine);
        handles.push(tokio::task::spawn_blocking(move || {
            let start = authz.can_generic(&*operator, "Start").unwrap();
            let service = authz
                .can_instance(&*operator, &*machine, "Service")
                .unwrap();
            (start, service)
        }));
    }

    for handle in handles {
        assert_eq!(handle.await.unwrap(), (true, true));
    }
    assert_eq!(authz.compilations(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn expression_and_checks_share_one_compilation() {
    let authz = authorizer();

    let mut handles = Vec::with_capacity(CALLERS);
    for i in 0..CALLERS {
        let authz = Arc::clone(&authz);
        handles.push(tokio::task::spawn_blocking(move || {
            let supervisor = Principal::new()
                .with_subject(format!("user-{i}"))
                .with_role("Supervisor");
            let machine = json!({ "Maintainer": "Wario", "Hours": 1000 + i });
            let direct = authz.can_instance(&supervisor, &machine, "Service").unwrap();
            let expression = authz.expression_for(&supervisor, "Service").unwrap();
            assert_eq!(direct, expression.matches(&machine).unwrap());
            direct
        }));
    }

    let mut allowed = 0;
    for handle in handles {
        if handle.await.unwrap() {
            allowed += 1;
        }
    }
    // Hours 1000 is not above the threshold
    assert_eq!(allowed, CALLERS - 1);
    assert_eq!(authz.compilations(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn failed_compilation_is_retried_not_cached() {
    let authz = authorizer();
    let nobody = Principal::new();

    let mut handles = Vec::with_capacity(CALLERS);
    for _ in 0..CALLERS {
        let authz = Arc::clone(&authz);
        let nobody = nobody.clone();
        handles.push(tokio::task::spawn_blocking(move || {
            matches!(
                authz.can_generic(&nobody, "Broken"),
                Err(AuthzError::RuleParse { .. })
            )
        }));
    }

    for handle in handles {
        assert!(handle.await.unwrap());
    }
    assert_eq!(authz.compilations(), 0);
    assert!(authz.can_generic(&nobody, "Start").is_ok());
    assert_eq!(authz.compilations(), 1);
}
