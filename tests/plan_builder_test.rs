mod common;

use serde_json::json;
use silt::domain::models::domain_type::{CICD, CODE, CODE_REVIEW, TICKET};
use silt::domain::models::{
    BlueprintScope, DomainScopeKind, PipelineTask, ScopeConfig, ScopeRecord, SubtaskMeta,
    SyncMode, SyncPolicy, TaskOptions,
};
use silt::domain::ports::{ScopeRepository, SyncStateRepository};
use silt::infrastructure::http::Credentials;
use silt::services::{
    decode_task_options, ApiCollectorArgs, ParsedPage, PipelinePlanBuilder, StatefulCollector,
};
use silt::CollectorError;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn catalog() -> Vec<SubtaskMeta> {
    vec![
        SubtaskMeta::new("collectRuns", &[CICD]),
        SubtaskMeta::new("collectJobs", &[CICD]),
        SubtaskMeta::new("collectIssues", &[TICKET]),
        SubtaskMeta::new("collectPullRequests", &[CODE_REVIEW]),
        SubtaskMeta::new("collectCommits", &[CODE]),
    ]
}

fn bp(scope_ids: &[&str]) -> Vec<BlueprintScope> {
    scope_ids
        .iter()
        .map(|id| BlueprintScope {
            scope_id: (*id).to_string(),
        })
        .collect()
}

async fn store_scope(
    db: &common::TestDb,
    scope_id: &str,
    clone_url: Option<&str>,
    config: ScopeConfig,
) {
    let config_id = db.scopes.upsert_scope_config(&config).await.unwrap();
    db.scopes
        .upsert_scope(&ScopeRecord {
            connection_id: 1,
            scope_id: scope_id.to_string(),
            name: format!("org/repo-{scope_id}"),
            clone_url: clone_url.map(str::to_string),
            forked_from: None,
            scope_config_id: Some(config_id),
        })
        .await
        .unwrap();
}

fn builder(db: &common::TestDb) -> PipelinePlanBuilder {
    PipelinePlanBuilder::new("github", "GithubRepo", db.scopes.clone(), catalog())
}

fn plugins(stage: &[PipelineTask]) -> Vec<&str> {
    let mut plugins: Vec<&str> = stage.iter().map(|t| t.plugin.as_str()).collect();
    plugins.sort_unstable();
    plugins
}

#[tokio::test]
async fn test_full_sync_plan_then_collection_run() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/org/repo-12345/actions/runs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "total_count": 2,
            "workflow_runs": [
                {"id": 2, "created_at": "2021-06-01T00:00:00Z"},
                {"id": 1, "created_at": "2021-05-01T00:00:00Z"}
            ]
        })))
        .mount(&server)
        .await;
    let db = common::setup_test_db().await;
    store_scope(
        &db,
        "12345",
        None,
        ScopeConfig {
            entities: vec![CICD.to_string()],
            ..ScopeConfig::default()
        },
    )
    .await;

    let built = builder(&db).build(1, &bp(&["12345"]), None).await.unwrap();
    assert_eq!(built.plan.len(), 1);
    let task = &built.plan.stages[0][0];
    assert_eq!(task.plugin, "github");
    assert_eq!(task.subtasks, vec!["collectRuns", "collectJobs"]);
    assert_eq!(
        serde_json::to_value(&task.options).unwrap(),
        json!({"connectionId": 1, "scopeId": "12345", "name": "org/repo-12345"})
    );
    assert_eq!(built.scopes.len(), 1);
    assert_eq!(built.scopes[0].kind, DomainScopeKind::CicdScope);
    assert_eq!(built.scopes[0].id, "github:GithubRepo:1:12345");

    // The task runtime decodes the options and runs the collection
    let options = decode_task_options(serde_json::to_value(&task.options).unwrap()).unwrap();
    let params = options.collection_params("github_api_runs");
    let args = ApiCollectorArgs::new(
        params.clone(),
        "repos/{params.name}/actions/runs",
        |response| ParsedPage::from_field(response, "workflow_runs"),
    )
    .template_param("name", options.name.clone());

    let collector = StatefulCollector::new(common::context(&server.uri(), Credentials::None, &db));
    let outcome = collector
        .collect(&args, Some(&options.sync_policy()), None)
        .await
        .unwrap();
    assert_eq!(outcome.mode, SyncMode::Full);
    assert_eq!(outcome.summary.records, 2);

    let state = db.states.get(&params).await.unwrap().unwrap();
    assert_eq!(state.params.key(), r#"{"connectionId":1,"scopeId":"12345"}"#);
    assert_eq!(state.latest_success_start, Some(outcome.plan.started_at));
    assert_ne!(
        state.latest_success_start.unwrap().to_rfc3339(),
        "2021-06-01T00:00:00+00:00"
    );
}

#[tokio::test]
async fn test_diff_runs_one_stage_after_its_scope() {
    let db = common::setup_test_db().await;
    let mut diff = serde_json::Map::new();
    diff.insert("tagsLimit".to_string(), json!(10));
    diff.insert("tagsPattern".to_string(), json!("v\\d+\\.\\d+"));
    store_scope(
        &db,
        "111",
        Some("https://github.com/org/repo-111.git"),
        ScopeConfig {
            entities: vec![CODE.to_string(), CICD.to_string()],
            diff: Some(diff),
            ..ScopeConfig::default()
        },
    )
    .await;
    store_scope(
        &db,
        "222",
        None,
        ScopeConfig {
            entities: vec![TICKET.to_string()],
            ..ScopeConfig::default()
        },
    )
    .await;

    let policy = SyncPolicy::since("2023-01-01T00:00:00Z".parse().unwrap());
    let built = builder(&db)
        .with_proxy("http://proxy.local:3128")
        .build(1, &bp(&["111", "222"]), Some(&policy))
        .await
        .unwrap();

    assert_eq!(built.plan.len(), 2);
    assert_eq!(plugins(&built.plan.stages[0]), vec!["github", "gitextractor"]);
    assert_eq!(plugins(&built.plan.stages[1]), vec!["github", "refdiff"]);

    let diff_task = built.plan.stages[1]
        .iter()
        .find(|t| t.plugin == "refdiff")
        .unwrap();
    assert_eq!(
        serde_json::to_value(&diff_task.options).unwrap(),
        json!({
            "repoId": "github:GithubRepo:1:111",
            "tagsLimit": 10,
            "tagsPattern": "v\\d+\\.\\d+"
        })
    );

    let extract = built.plan.stages[0]
        .iter()
        .find(|t| t.plugin == "gitextractor")
        .unwrap();
    let TaskOptions::Extract(options) = &extract.options else {
        panic!("expected extraction options, got {:?}", extract.options);
    };
    assert_eq!(options.url, "https://github.com/org/repo-111.git");
    assert_eq!(options.repo_id, "github:GithubRepo:1:111");
    assert_eq!(options.proxy.as_deref(), Some("http://proxy.local:3128"));

    let collect = built.plan.stages[0]
        .iter()
        .find(|t| t.plugin == "github")
        .unwrap();
    let TaskOptions::Collect(options) = &collect.options else {
        panic!("expected collection options, got {:?}", collect.options);
    };
    assert_eq!(options.time_after, policy.time_after);
    assert_eq!(collect.subtasks, vec!["collectRuns", "collectJobs", "collectCommits"]);

    let kinds: Vec<DomainScopeKind> = built.scopes.iter().map(|s| s.kind).collect();
    assert_eq!(
        kinds,
        vec![
            DomainScopeKind::Repo,
            DomainScopeKind::CicdScope,
            DomainScopeKind::Board
        ]
    );

    // Serialized plan is a plain array of stages
    let value = serde_json::to_value(&built.plan).unwrap();
    assert_eq!(value.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_invalid_blueprints() {
    let db = common::setup_test_db().await;
    store_scope(
        &db,
        "12345",
        None,
        ScopeConfig {
            entities: vec!["BOGUS".to_string()],
            ..ScopeConfig::default()
        },
    )
    .await;

    let err = builder(&db).build(0, &bp(&["12345"]), None).await.unwrap_err();
    assert!(matches!(err, CollectorError::Validation(_)));

    let err = builder(&db).build(1, &bp(&["404"]), None).await.unwrap_err();
    assert!(matches!(err, CollectorError::Validation(msg) if msg.contains("404")));

    let err = builder(&db).build(1, &bp(&["12345"]), None).await.unwrap_err();
    assert!(matches!(err, CollectorError::Validation(msg) if msg.contains("BOGUS")));

    // CODE requested without a repository to clone
    store_scope(
        &db,
        "333",
        None,
        ScopeConfig {
            entities: vec![CODE.to_string()],
            ..ScopeConfig::default()
        },
    )
    .await;
    let err = builder(&db).build(1, &bp(&["333"]), None).await.unwrap_err();
    assert!(matches!(err, CollectorError::Validation(msg) if msg.contains("clone url")));

    let empty = builder(&db).build(1, &[], None).await.unwrap();
    assert!(empty.plan.is_empty());
    assert!(empty.scopes.is_empty());
}
