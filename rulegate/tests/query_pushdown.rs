//! Resource expressions: in-memory filtering, SQL translation and agreement
//! with direct checks.

use rulegate::{
    Authorizer, AuthzError, Principal, QueryTranslator, SqlTranslator, Value,
};
use rulegate_rules::TranslationError;
use serde_json::json;

/// Team documents as a query source would hold them.
struct Fixture {
    authz: Authorizer<serde_json::Value>,
    teams: Vec<serde_json::Value>,
}

impl Fixture {
    fn new() -> Self {
        let mut builder = Authorizer::builder("Team");
        builder
            .register_instance_function("IsCaptain", |ctx, team: &serde_json::Value| {
                Ok(team["Captain"].as_str() == ctx.subject_id())
            })
            .unwrap()
            .register_generic("Read", "true")
            .unwrap()
            .register_generic("Insert", r#"HasRole("Manager")"#)
            .unwrap()
            .register_instance("Edit", r#"HasRole("Manager") || HasRole("Admin")"#)
            .unwrap()
            .register_instance(
                "StartTraining",
                r#"Resource.Coach.Name == UserId || UserClaims.Contains("TeamCoach:" + Resource.Name)"#,
            )
            .unwrap()
            .register_instance(
                "Scout",
                r#"Resource.Budget >= 1000 && !Resource.Name.EndsWith("B") || HasClaim("Scout", Resource.Name)"#,
            )
            .unwrap()
            .register_instance("Captain", "IsCaptain()")
            .unwrap();

        let teams = vec![
            json!({ "Name": "Team A", "Coach": { "Name": "Luigi" }, "Budget": 1500, "Captain": "Yoshi" }),
            json!({ "Name": "Team B", "Coach": { "Name": "Mario" }, "Budget": 2000, "Captain": "Toad" }),
            json!({ "Name": "Team C", "Coach": { "Name": "Mario" }, "Budget": 500.5, "Captain": "Yoshi" }),
            json!({ "Name": "Team D", "Coach": { "Name": null }, "Budget": 0, "Captain": null }),
        ];

        Self {
            authz: builder.build(),
            teams,
        }
    }

    fn names(teams: Vec<&serde_json::Value>) -> Vec<&str> {
        teams.into_iter().filter_map(|t| t["Name"].as_str()).collect()
    }
}

fn luigi() -> Principal {
    Principal::new()
        .with_subject("Luigi")
        .with_claim("TeamCoach", "Team C")
}

fn identities() -> Vec<Principal> {
    vec![
        Principal::new(),
        luigi(),
        Principal::new().with_subject("Mario"),
        Principal::new().with_subject("Yoshi").with_claim("Scout", "Team B"),
        Principal::new().with_subject("Peach").with_role("Manager"),
        Principal::new().with_subject("Bowser").with_role("Admin"),
    ]
}

#[test]
fn coach_can_only_start_training_on_own_teams() {
    let fixture = Fixture::new();
    let teams = fixture
        .authz
        .filter(&luigi(), "StartTraining", &fixture.teams)
        .unwrap();
    assert_eq!(Fixture::names(teams), vec!["Team A", "Team C"]);
}

#[test]
fn manager_can_read_all_teams() {
    let fixture = Fixture::new();
    let peach = Principal::new().with_subject("Peach").with_role("Manager");

    let expression = fixture.authz.expression_for(&peach, "Read").unwrap();
    assert_eq!(expression.as_constant(), Some(true));
    assert_eq!(
        fixture.authz.filter(&peach, "Read", &fixture.teams).unwrap().len(),
        4
    );
}

#[test]
fn generic_rule_expression_is_constant() {
    let fixture = Fixture::new();
    let toad = Principal::new().with_subject("Toad");
    assert_eq!(
        fixture.authz.expression_for(&toad, "Insert").unwrap().as_constant(),
        Some(false)
    );
    assert!(fixture.authz.filter(&toad, "Insert", &fixture.teams).unwrap().is_empty());
}

#[test]
fn direct_and_expression_results_agree() {
    let fixture = Fixture::new();
    for principal in identities() {
        for action in fixture.authz.list_actions() {
            let expression = fixture.authz.expression_for(&principal, action.name()).unwrap();
            for team in &fixture.teams {
                let direct = fixture.authz.can_instance(&principal, team, action.name()).unwrap();
                assert_eq!(
                    direct,
                    expression.matches(team).unwrap(),
                    "{} on {} for {:?}",
                    action.name(),
                    team["Name"],
                    principal.find_first("sub")
                );
            }
        }
    }
}

#[test]
fn start_training_translates_to_sql() {
    let fixture = Fixture::new();
    let mut sql = SqlTranslator::new()
        .with_column("Name", "name")
        .with_column("Coach.Name", "coach_name")
        .strict(true);

    let filter = fixture
        .authz
        .translate_for(&luigi(), "StartTraining", &mut sql)
        .unwrap();
    assert_eq!(
        filter.clause,
        "(coach_name = ? OR (? || COALESCE(name, '')) IN (?, ?))"
    );
    // Every claim is visible to UserClaims, the subject included
    assert_eq!(
        filter.params,
        vec![
            Value::from("Luigi"),
            Value::from("TeamCoach:"),
            Value::from("TeamCoach:Team C"),
            Value::from("sub:Luigi"),
        ]
    );

    let anonymous = fixture
        .authz
        .translate_for(&Principal::new(), "StartTraining", &mut sql)
        .unwrap();
    assert_eq!(anonymous.clause, "(coach_name IS NULL OR 1 = 0)");
    assert!(anonymous.params.is_empty());
}

#[test]
fn role_rules_translate_to_constants() {
    let fixture = Fixture::new();
    let mut sql = SqlTranslator::new();
    let admin = Principal::new().with_role("Admin");

    assert_eq!(
        fixture.authz.translate_for(&admin, "Edit", &mut sql).unwrap().clause,
        "1 = 1"
    );
    assert_eq!(
        fixture
            .authz
            .translate_for(&Principal::new(), "Edit", &mut sql)
            .unwrap()
            .clause,
        "1 = 0"
    );
}

#[test]
fn translation_failures_are_reported() {
    let fixture = Fixture::new();
    let yoshi = Principal::new().with_subject("Yoshi");

    let err = fixture
        .authz
        .translate_for(&yoshi, "Captain", &mut SqlTranslator::new())
        .unwrap_err();
    assert!(matches!(
        err,
        AuthzError::RuleTranslation { ref action, source: TranslationError::UnsupportedFunction(ref name) }
            if action == "Captain" && name == "IsCaptain"
    ));
    assert_eq!(err.error_code(), "RULE_TRANSLATION_ERROR");

    let err = fixture
        .authz
        .translate_for(&yoshi, "StartTraining", &mut SqlTranslator::new().strict(true))
        .unwrap_err();
    assert!(matches!(
        err,
        AuthzError::RuleTranslation { source: TranslationError::UnmappedField(ref field), .. }
            if field == "Coach.Name"
    ));

    // The same expression still filters in memory
    let captained = fixture.authz.filter(&yoshi, "Captain", &fixture.teams).unwrap();
    assert_eq!(Fixture::names(captained), vec!["Team A", "Team C"]);
}

#[test]
fn failing_and_absent_identity_terms_agree_in_both_modes() {
    let mut builder = Authorizer::builder("Team");
    builder
        .register_generic_function("IsStaff", |_| {
            Err(rulegate::FunctionError::new("staff directory offline"))
        })
        .unwrap()
        .register_instance("Fund", "Resource.Budget > 1000 && IsStaff()")
        .unwrap()
        .register_instance("Browse", r#"Resource.Open || UserId > "m""#)
        .unwrap();
    let authz: Authorizer<serde_json::Value> = builder.build();

    let teams = vec![
        json!({ "Name": "Team A", "Budget": 1500, "Open": false }),
        json!({ "Name": "Team B", "Budget": 200, "Open": true }),
        json!({ "Name": "Team C", "Budget": 900.5, "Open": false }),
    ];
    for principal in [Principal::new(), luigi(), Principal::new().with_subject("Wario")] {
        for action in ["Fund", "Browse"] {
            let expression = authz.expression_for(&principal, action).unwrap();
            for team in &teams {
                let direct = authz
                    .can_instance(&principal, team, action)
                    .map_err(|err| err.to_string());
                let deferred = expression.matches(team).map_err(|err| {
                    AuthzError::RuleEvaluation {
                        action: action.to_string(),
                        source: err,
                    }
                    .to_string()
                });
                assert_eq!(direct, deferred, "{action} on {}", team["Name"]);
            }
        }
    }

    let anonymous = Principal::new();
    assert!(!authz.can_instance(&anonymous, &teams[0], "Browse").unwrap());
    assert!(!authz.can_instance(&anonymous, &teams[1], "Fund").unwrap());
    assert!(matches!(
        authz.can_instance(&anonymous, &teams[0], "Fund"),
        Err(AuthzError::RuleEvaluation { .. })
    ));
    assert!(matches!(
        authz.translate_for(&anonymous, "Fund", &mut SqlTranslator::new()),
        Err(AuthzError::RuleTranslation {
            source: TranslationError::FailedTerm(_),
            ..
        })
    ));
    let browse = authz
        .translate_for(&anonymous, "Browse", &mut SqlTranslator::new())
        .unwrap();
    assert_eq!(browse.clause, "(Open = ? OR 1 = 0)");
}

/// Translator that renders the residual tree as text.
struct Describe;

impl QueryTranslator for Describe {
    type Output = String;

    fn translate(
        &mut self,
        expr: &rulegate_rules::Residual,
        _identity: &rulegate::IdentityContext,
    ) -> Result<String, TranslationError> {
        Ok(expr.to_string())
    }
}

#[test]
fn custom_translators_see_the_residual() {
    let fixture = Fixture::new();
    let yoshi = Principal::new().with_subject("Yoshi").with_claim("Scout", "Team B");
    let text = fixture
        .authz
        .translate_for(&yoshi, "Scout", &mut Describe)
        .unwrap();
    assert_eq!(
        text,
        r#"(((Resource.Budget >= 1000) && !Resource.Name.EndsWith("B")) || HasClaim("Scout", Resource.Name))"#
    );
}
