//! End-to-end checks of the composed saved-objects client: repository,
//! authorization, edit mode, conflict control and workspace id consumer.

use anyhow::Result;
use serde_json::json;
use std::sync::Arc;
use workspace_guard_core::auth::{AuthResult, RequestAuth};
use workspace_guard_core::config::GuardConfig;
use workspace_guard_core::data_source::{self, DATA_SOURCE_SAVED_OBJECT_TYPE};
use workspace_guard_core::permission::{PermissionMode, Permissions};
use workspace_guard_core::principal::{PrincipalType, Principals};
use workspace_guard_core::request::Request;
use workspace_guard_core::saved_objects::{
    AclSearchParams, BaseOptions, BulkCreateObject, BulkGetObject, BulkUpdateObject,
    CheckConflictsObject, CreateOptions, FindOptions, SavedObjectsClient,
    SavedObjectsClientProvider, SavedObjectsRepository, UpdateOptions, WORKSPACE_TYPE,
};
use workspace_guard_core::state::WorkspaceStateStore;
use workspace_guard_core::workspace::{SetupDeps, WorkspacePlugin, WorkspaceSetup};

const INNER_DASHBOARD: &str = "inner-workspace-dashboard-1";
const ACL_DASHBOARD: &str = "acl-controlled-dashboard-2";

struct Env {
    repo: Arc<SavedObjectsRepository>,
    provider: SavedObjectsClientProvider,
    setup: WorkspaceSetup,
}

impl Env {
    async fn new() -> Result<Self> {
        let config = GuardConfig::from_json(
            r#"{
                "workspace": {
                    "enabled": true,
                    "dashboardAdmin": { "groups": ["dashboard_admin"] }
                },
                "dataSource": { "editMode": "admin_only" }
            }"#,
        )?;
        let repo = Arc::new(SavedObjectsRepository::new());
        let state = Arc::new(WorkspaceStateStore::new());
        let mut provider = SavedObjectsClientProvider::new(repo.clone());
        let setup = WorkspacePlugin::new(config.workspace).setup(SetupDeps {
            provider: &mut provider,
            auth: Arc::new(RequestAuth),
            state: state.clone(),
            application_config: None,
        })?;
        data_source::register(&mut provider, config.data_source.edit_mode, state)?;

        let foo_rw = Permissions::new()
            .grant(PermissionMode::Read, PrincipalType::Users, "foo")
            .grant(PermissionMode::Write, PrincipalType::Users, "foo");
        let library = Permissions::new()
            .grant(PermissionMode::LibraryRead, PrincipalType::Users, "foo")
            .grant(PermissionMode::LibraryWrite, PrincipalType::Users, "foo");
        for (id, permissions) in [("workspace-1", library.clone()), ("workspace-2", library)] {
            repo.create(
                WORKSPACE_TYPE,
                json!({"name": id}),
                &CreateOptions {
                    id: Some(id.into()),
                    permissions: Some(permissions),
                    ..Default::default()
                },
            )
            .await?;
        }
        repo.create(
            "dashboard",
            json!({"title": "inner"}),
            &CreateOptions {
                id: Some(INNER_DASHBOARD.into()),
                workspaces: Some(vec!["workspace-1".into()]),
                ..Default::default()
            },
        )
        .await?;
        repo.create(
            "dashboard",
            json!({"title": "acl"}),
            &CreateOptions {
                id: Some(ACL_DASHBOARD.into()),
                permissions: Some(foo_rw),
                ..Default::default()
            },
        )
        .await?;
        Ok(Self {
            repo,
            provider,
            setup,
        })
    }

    /// Admit `request` the way the HTTP layer does and compose its client.
    async fn client(&self, request: &Request) -> Arc<dyn SavedObjectsClient> {
        if let Some(resolver) = &self.setup.admin_resolver {
            resolver.resolve(request).await;
        }
        self.provider.get_client(request)
    }
}

fn user(name: &str, groups: &[&str]) -> Request {
    Request::new("/api/saved_objects").with_auth(AuthResult::authenticated(
        Some(name.to_string()),
        Some(groups.iter().map(|g| g.to_string()).collect()),
    ))
}

fn permitted() -> Request {
    user("foo", &[])
}

fn not_permitted() -> Request {
    user("bar", &[])
}

fn dashboard_admin() -> Request {
    user("bob", &["dashboard_admin"])
}

fn base() -> BaseOptions {
    BaseOptions::default()
}

#[tokio::test]
async fn test_get() -> Result<()> {
    let env = Env::new().await?;

    let bar = env.client(&not_permitted()).await;
    for id in [INNER_DASHBOARD, ACL_DASHBOARD] {
        let err = bar.get("dashboard", id, &base()).await.unwrap_err();
        assert_eq!(err.status_code(), 403, "{id}");
    }

    let foo = env.client(&permitted()).await;
    let inner = foo.get("dashboard", INNER_DASHBOARD, &base()).await?;
    assert_eq!(inner.attributes["title"], "inner");
    let acl = foo.get("dashboard", ACL_DASHBOARD, &base()).await?;
    assert_eq!(acl.attributes["title"], "acl");

    let err = foo.get("dashboard", "missing", &base()).await.unwrap_err();
    assert!(err.is_not_found());
    Ok(())
}

#[tokio::test]
async fn test_bulk_get_keeps_input_order() -> Result<()> {
    let env = Env::new().await?;
    let refs = [
        BulkGetObject::new("dashboard", INNER_DASHBOARD),
        BulkGetObject::new("dashboard", "missing"),
        BulkGetObject::new("dashboard", ACL_DASHBOARD),
    ];

    let response = env.client(&not_permitted()).await.bulk_get(&refs, &base()).await?;
    let codes: Vec<_> = response
        .saved_objects
        .iter()
        .map(|o| o.error.as_ref().map(|e| e.status_code))
        .collect();
    assert_eq!(codes, vec![Some(403), Some(404), Some(403)]);
    let ids: Vec<_> = response.saved_objects.iter().map(|o| o.id.as_str()).collect();
    assert_eq!(ids, vec![INNER_DASHBOARD, "missing", ACL_DASHBOARD]);

    let response = env.client(&permitted()).await.bulk_get(&refs, &base()).await?;
    assert_eq!(response.errors().count(), 1);
    Ok(())
}

#[tokio::test]
async fn test_find_scoping() -> Result<()> {
    let env = Env::new().await?;
    env.repo
        .create(
            "dashboard",
            json!({}),
            &CreateOptions {
                id: Some("public".into()),
                ..Default::default()
            },
        )
        .await?;

    let bar = env.client(&not_permitted()).await;
    let err = bar
        .find(&FindOptions {
            workspaces: Some(vec!["workspace-1".into()]),
            ..FindOptions::of_type("dashboard")
        })
        .await
        .unwrap_err();
    assert!(err.is_not_authorized());

    let found = bar.find(&FindOptions::of_type("dashboard")).await?;
    let ids: Vec<_> = found.saved_objects.iter().map(|o| o.id.as_str()).collect();
    assert_eq!(ids, vec!["public"]);

    let found = env
        .client(&permitted())
        .await
        .find(&FindOptions::of_type("dashboard"))
        .await?;
    assert_eq!(found.total, 3);

    let workspaces = env
        .client(&not_permitted())
        .await
        .find(&FindOptions::of_type(WORKSPACE_TYPE))
        .await?;
    assert_eq!(workspaces.total, 0);
    Ok(())
}

#[tokio::test]
async fn test_implicit_scope_only_returns_accessible_workspaces() -> Result<()> {
    let env = Env::new().await?;
    let w1_only = Permissions::new().grant(PermissionMode::Read, PrincipalType::Users, "carol");
    env.repo
        .update(
            WORKSPACE_TYPE,
            "workspace-1",
            json!({}),
            &UpdateOptions {
                permissions: Some(w1_only),
                ..Default::default()
            },
        )
        .await?;
    for (id, workspace) in [("w1-doc", "workspace-1"), ("w2-doc", "workspace-2")] {
        env.repo
            .create(
                "visualization",
                json!({}),
                &CreateOptions {
                    id: Some(id.into()),
                    workspaces: Some(vec![workspace.into()]),
                    ..Default::default()
                },
            )
            .await?;
    }

    let found = env
        .client(&user("carol", &[]))
        .await
        .find(&FindOptions::of_type("visualization"))
        .await?;
    let ids: Vec<_> = found.saved_objects.iter().map(|o| o.id.as_str()).collect();
    assert_eq!(ids, vec!["w1-doc"]);
    Ok(())
}

#[tokio::test]
async fn test_find_ignores_caller_acl_params() -> Result<()> {
    let env = Env::new().await?;
    let bar_reads =
        Permissions::new().grant(PermissionMode::LibraryRead, PrincipalType::Users, "bar");
    env.repo
        .create(
            WORKSPACE_TYPE,
            json!({"name": "bar-workspace"}),
            &CreateOptions {
                id: Some("bar-workspace".into()),
                permissions: Some(bar_reads),
                ..Default::default()
            },
        )
        .await?;
    let foo_only = Permissions::new().grant(PermissionMode::Read, PrincipalType::Users, "foo");
    env.repo
        .create(
            "dashboard",
            json!({"title": "secret"}),
            &CreateOptions {
                id: Some("foo-secret".into()),
                permissions: Some(foo_only),
                ..Default::default()
            },
        )
        .await?;

    let bar = env.client(&not_permitted()).await;
    let err = bar.get("dashboard", "foo-secret", &base()).await.unwrap_err();
    assert!(err.is_forbidden());

    let forged = FindOptions {
        workspaces: Some(vec!["bar-workspace".into()]),
        acl_search_params: Some(AclSearchParams {
            principals: Principals::user("foo"),
            permission_modes: vec![PermissionMode::Read],
        }),
        ..FindOptions::of_type("dashboard")
    };
    let found = bar.find(&forged).await?;
    assert_eq!(found.total, 0);
    assert!(found.saved_objects.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_create() -> Result<()> {
    let env = Env::new().await?;
    let into_workspace = CreateOptions {
        workspaces: Some(vec!["workspace-1".into()]),
        ..Default::default()
    };

    let bar = env.client(&not_permitted()).await;
    assert!(bar
        .create("dashboard", json!({}), &into_workspace)
        .await
        .unwrap_err()
        .is_forbidden());
    let overwrite_acl = CreateOptions {
        id: Some(ACL_DASHBOARD.into()),
        overwrite: true,
        ..Default::default()
    };
    assert!(bar
        .create("dashboard", json!({}), &overwrite_acl)
        .await
        .unwrap_err()
        .is_forbidden());
    let missing_workspace = CreateOptions {
        workspaces: Some(vec!["no-such-workspace".into()]),
        ..Default::default()
    };
    let foo = env.client(&permitted()).await;
    assert!(foo
        .create("dashboard", json!({}), &missing_workspace)
        .await
        .unwrap_err()
        .is_forbidden());

    let created = foo.create("dashboard", json!({}), &into_workspace).await?;
    assert_eq!(created.workspaces(), ["workspace-1".to_string()]);
    foo.create("dashboard", json!({"title": "mine"}), &overwrite_acl)
        .await?;
    Ok(())
}

#[tokio::test]
async fn test_bulk_create_rejects_per_item() -> Result<()> {
    let env = Env::new().await?;
    let mut into_workspace = BulkCreateObject::new("dashboard", Some("b"), json!({}));
    into_workspace.workspaces = Some(vec!["workspace-1".into()]);
    let objects = vec![
        BulkCreateObject::new("dashboard", Some("a"), json!({})),
        into_workspace,
        BulkCreateObject::new("dashboard", Some("c"), json!({})),
        BulkCreateObject::new(DATA_SOURCE_SAVED_OBJECT_TYPE, Some("ds"), json!({})),
    ];

    let response = env
        .client(&not_permitted())
        .await
        .bulk_create(objects.clone(), &CreateOptions::default())
        .await?;
    assert_eq!(response.saved_objects.len(), 4);
    let ids: Vec<_> = response.saved_objects.iter().map(|o| o.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b", "c", "ds"]);
    let failed: Vec<_> = response
        .saved_objects
        .iter()
        .map(|o| o.is_error())
        .collect();
    assert_eq!(failed, vec![false, true, false, true]);
    for rejected in response.errors() {
        let error = rejected.error.as_ref().unwrap();
        assert_eq!(error.status_code, 403);
        assert!(error.metadata.as_ref().unwrap().is_not_overwritable);
    }

    // options-level workspaces are checked per item as well
    let response = env
        .client(&not_permitted())
        .await
        .bulk_create(
            vec![BulkCreateObject::new("dashboard", Some("d"), json!({}))],
            &CreateOptions {
                workspaces: Some(vec!["workspace-1".into()]),
                ..Default::default()
            },
        )
        .await?;
    assert_eq!(response.saved_objects[0].error.as_ref().unwrap().status_code, 403);
    Ok(())
}

#[tokio::test]
async fn test_update_and_bulk_update() -> Result<()> {
    let env = Env::new().await?;
    let bar = env.client(&not_permitted()).await;
    assert!(bar
        .update("dashboard", INNER_DASHBOARD, json!({"title": "x"}), &UpdateOptions::default())
        .await
        .unwrap_err()
        .is_forbidden());

    let objects = vec![
        BulkUpdateObject::new("dashboard", INNER_DASHBOARD, json!({"title": "x"})),
        BulkUpdateObject::new("dashboard", "missing", json!({})),
        BulkUpdateObject::new("dashboard", ACL_DASHBOARD, json!({"title": "x"})),
    ];
    let response = bar.bulk_update(objects.clone(), &base()).await?;
    let codes: Vec<_> = response
        .saved_objects
        .iter()
        .map(|o| o.error.as_ref().map(|e| e.status_code))
        .collect();
    assert_eq!(codes, vec![Some(403), Some(404), Some(403)]);

    let foo = env.client(&permitted()).await;
    let response = foo.bulk_update(objects, &base()).await?;
    assert_eq!(response.errors().count(), 1);
    let updated = foo.get("dashboard", INNER_DASHBOARD, &base()).await?;
    assert_eq!(updated.attributes["title"], "x");
    Ok(())
}

#[tokio::test]
async fn test_repeated_rejection_is_deterministic() -> Result<()> {
    let env = Env::new().await?;
    let before = env.repo.get("dashboard", ACL_DASHBOARD, &base()).await?;
    let bar = env.client(&not_permitted()).await;
    let objects = vec![BulkUpdateObject::new("dashboard", ACL_DASHBOARD, json!({"title": "x"}))];

    let first = bar.bulk_update(objects.clone(), &base()).await?;
    let second = bar.bulk_update(objects, &base()).await?;
    assert_eq!(first, second);
    let after = env.repo.get("dashboard", ACL_DASHBOARD, &base()).await?;
    assert_eq!(before, after);
    Ok(())
}

#[tokio::test]
async fn test_delete() -> Result<()> {
    let env = Env::new().await?;
    let bar = env.client(&not_permitted()).await;
    for id in [INNER_DASHBOARD, ACL_DASHBOARD] {
        assert!(bar.delete("dashboard", id, &base()).await.unwrap_err().is_forbidden());
    }
    let foo = env.client(&permitted()).await;
    for id in [INNER_DASHBOARD, ACL_DASHBOARD] {
        foo.delete("dashboard", id, &base()).await?;
    }
    assert!(env.repo.get("dashboard", INNER_DASHBOARD, &base()).await.is_err());
    Ok(())
}

#[tokio::test]
async fn test_dashboard_admin_bypasses_everything() -> Result<()> {
    let env = Env::new().await?;
    let admin = env.client(&dashboard_admin()).await;

    admin.get("dashboard", INNER_DASHBOARD, &base()).await?;
    let response = admin
        .bulk_get(&[BulkGetObject::new("dashboard", ACL_DASHBOARD)], &base())
        .await?;
    assert_eq!(response.errors().count(), 0);
    let found = admin
        .find(&FindOptions {
            workspaces: Some(vec!["workspace-1".into()]),
            ..FindOptions::of_type("dashboard")
        })
        .await?;
    assert_eq!(found.total, 1);
    admin
        .update("dashboard", ACL_DASHBOARD, json!({"title": "admin"}), &UpdateOptions::default())
        .await?;
    admin
        .create(
            DATA_SOURCE_SAVED_OBJECT_TYPE,
            json!({"endpoint": "https://example.org"}),
            &CreateOptions::default(),
        )
        .await?;
    admin.delete("dashboard", INNER_DASHBOARD, &base()).await?;
    Ok(())
}

#[tokio::test]
async fn test_admin_only_edit_mode() -> Result<()> {
    let env = Env::new().await?;
    let payload = json!({"title": "conn"});
    let options = CreateOptions {
        id: Some("ds-1".into()),
        ..Default::default()
    };

    let err = env
        .client(&permitted())
        .await
        .create(DATA_SOURCE_SAVED_OBJECT_TYPE, payload.clone(), &options)
        .await
        .unwrap_err();
    assert!(err.is_forbidden());

    env.client(&dashboard_admin())
        .await
        .create(DATA_SOURCE_SAVED_OBJECT_TYPE, payload, &options)
        .await?;
    Ok(())
}

#[tokio::test]
async fn test_unauthenticated_and_anonymous_requests() -> Result<()> {
    let env = Env::new().await?;

    let anonymous = Request::new("/api/saved_objects").with_auth(AuthResult::unauthenticated());
    let err = env
        .client(&anonymous)
        .await
        .get("dashboard", INNER_DASHBOARD, &base())
        .await
        .unwrap_err();
    assert!(err.is_not_authorized());

    // no authentication layer at all: unrestricted
    let open = env.client(&Request::new("/api/saved_objects")).await;
    open.get("dashboard", INNER_DASHBOARD, &base()).await?;
    open.delete("dashboard", ACL_DASHBOARD, &base()).await?;
    Ok(())
}

#[tokio::test]
async fn test_passthrough_methods_reach_the_repository() -> Result<()> {
    let env = Env::new().await?;
    let bar = env.client(&not_permitted()).await;
    let namespaces = bar
        .add_to_namespaces("dashboard", ACL_DASHBOARD, &["team".into()], &base())
        .await?;
    assert!(namespaces.contains(&"team".to_string()));
    let conflicts = bar
        .check_conflicts(
            &[CheckConflictsObject {
                object_type: "dashboard".into(),
                id: INNER_DASHBOARD.into(),
            }],
            &base(),
        )
        .await?;
    assert_eq!(conflicts.errors.len(), 1);
    Ok(())
}
