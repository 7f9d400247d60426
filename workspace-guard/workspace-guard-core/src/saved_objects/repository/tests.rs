use super::*;
use crate::permission::{PermissionMode, Permissions};
use crate::principal::{PrincipalType, Principals};
use crate::saved_objects::WORKSPACE_TYPE;
use serde_json::json;
use tempfile::tempdir;

fn create_options(id: &str) -> CreateOptions {
    CreateOptions {
        id: Some(id.to_string()),
        ..Default::default()
    }
}

#[tokio::test]
async fn create_get_and_delete() {
    let repo = SavedObjectsRepository::new();
    let created = repo
        .create("dashboard", json!({"title": "Sales"}), &create_options("d1"))
        .await
        .unwrap();
    assert_eq!(created.version.as_deref(), Some("1"));

    let fetched = repo.get("dashboard", "d1", &BaseOptions::default()).await.unwrap();
    assert_eq!(fetched.attributes["title"], "Sales");

    repo.delete("dashboard", "d1", &BaseOptions::default()).await.unwrap();
    let err = repo.get("dashboard", "d1", &BaseOptions::default()).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn create_without_id_generates_one() {
    let repo = SavedObjectsRepository::new();
    let created = repo
        .create("dashboard", json!({}), &CreateOptions::default())
        .await
        .unwrap();
    assert!(Uuid::parse_str(&created.id).is_ok());
}

#[tokio::test]
async fn existing_id_requires_overwrite() {
    let repo = SavedObjectsRepository::new();
    repo.create("dashboard", json!({"v": 1}), &create_options("d1"))
        .await
        .unwrap();
    let err = repo
        .create("dashboard", json!({"v": 2}), &create_options("d1"))
        .await
        .unwrap_err();
    assert!(err.is_conflict());

    let overwritten = repo
        .create(
            "dashboard",
            json!({"v": 2}),
            &CreateOptions {
                overwrite: true,
                ..create_options("d1")
            },
        )
        .await
        .unwrap();
    assert_eq!(overwritten.attributes["v"], 2);
}

#[tokio::test]
async fn update_merges_and_checks_version() {
    let repo = SavedObjectsRepository::new();
    let created = repo
        .create("dashboard", json!({"title": "a", "desc": "x"}), &create_options("d1"))
        .await
        .unwrap();

    let stale = UpdateOptions {
        version: Some("999".into()),
        ..Default::default()
    };
    let err = repo
        .update("dashboard", "d1", json!({"title": "b"}), &stale)
        .await
        .unwrap_err();
    assert!(err.is_conflict());

    let current = UpdateOptions {
        version: created.version.clone(),
        ..Default::default()
    };
    let updated = repo
        .update("dashboard", "d1", json!({"title": "b"}), &current)
        .await
        .unwrap();
    assert_eq!(updated.attributes, json!({"title": "b", "desc": "x"}));
    assert_ne!(updated.version, created.version);
}

#[tokio::test]
async fn bulk_calls_report_per_item_errors_in_order() {
    let repo = SavedObjectsRepository::new();
    repo.create("dashboard", json!({}), &create_options("d1"))
        .await
        .unwrap();

    let response = repo
        .bulk_get(
            &[
                BulkGetObject::new("dashboard", "missing"),
                BulkGetObject::new("dashboard", "d1"),
            ],
            &BaseOptions::default(),
        )
        .await
        .unwrap();
    assert_eq!(response.saved_objects.len(), 2);
    assert_eq!(response.saved_objects[0].error.as_ref().unwrap().status_code, 404);
    assert!(!response.saved_objects[1].is_error());

    let response = repo
        .bulk_create(
            vec![
                BulkCreateObject::new("dashboard", Some("d1"), json!({})),
                BulkCreateObject::new("dashboard", Some("d2"), json!({})),
            ],
            &CreateOptions::default(),
        )
        .await
        .unwrap();
    assert_eq!(response.saved_objects[0].error.as_ref().unwrap().status_code, 409);
    assert_eq!(response.saved_objects[1].id, "d2");
}

#[tokio::test]
async fn find_filters_and_paginates() {
    let repo = SavedObjectsRepository::new();
    for i in 0..5 {
        repo.create(
            "dashboard",
            json!({"title": format!("Board {i}")}),
            &create_options(&format!("d{i}")),
        )
        .await
        .unwrap();
    }
    repo.create("visualization", json!({"title": "Board viz"}), &create_options("v1"))
        .await
        .unwrap();

    let response = repo
        .find(&FindOptions {
            per_page: 2,
            page: 2,
            ..FindOptions::of_type("dashboard")
        })
        .await
        .unwrap();
    assert_eq!(response.total, 5);
    let ids: Vec<_> = response.saved_objects.iter().map(|o| o.id.as_str()).collect();
    assert_eq!(ids, vec!["d2", "d3"]);

    let response = repo
        .find(&FindOptions {
            search: Some("VIZ".into()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(response.total, 1);
    assert_eq!(response.saved_objects[0].id, "v1");
}

#[tokio::test]
async fn find_scopes_by_workspace_and_acl() {
    let repo = SavedObjectsRepository::new();
    let in_w1 = CreateOptions {
        workspaces: Some(vec!["w1".into()]),
        ..create_options("d1")
    };
    let in_w2 = CreateOptions {
        workspaces: Some(vec!["w2".into()]),
        ..create_options("d2")
    };
    let acl = CreateOptions {
        permissions: Some(Permissions::new().grant(
            PermissionMode::Read,
            PrincipalType::Users,
            "alice",
        )),
        ..create_options("d3")
    };
    repo.create("dashboard", json!({}), &in_w1).await.unwrap();
    repo.create("dashboard", json!({}), &in_w2).await.unwrap();
    repo.create("dashboard", json!({}), &acl).await.unwrap();
    repo.create("dashboard", json!({}), &create_options("d4"))
        .await
        .unwrap();
    repo.create(WORKSPACE_TYPE, json!({}), &create_options("w1"))
        .await
        .unwrap();

    let scoped = repo
        .find(&FindOptions {
            workspaces: Some(vec!["w1".into()]),
            ..Default::default()
        })
        .await
        .unwrap();
    let ids: Vec<_> = scoped.saved_objects.iter().map(|o| o.id.as_str()).collect();
    assert_eq!(ids, vec!["d1", "w1"]);

    let with_acl = repo
        .find(&FindOptions {
            types: vec!["dashboard".into()],
            workspaces: Some(vec!["w1".into()]),
            acl_search_params: Some(AclSearchParams {
                principals: Principals::user("alice"),
                permission_modes: vec![PermissionMode::Read],
            }),
            ..Default::default()
        })
        .await
        .unwrap();
    let ids: Vec<_> = with_acl.saved_objects.iter().map(|o| o.id.as_str()).collect();
    assert_eq!(ids, vec!["d1", "d3", "d4"]);
}

#[tokio::test]
async fn namespaces_can_be_added_and_removed() {
    let repo = SavedObjectsRepository::new();
    repo.create("dashboard", json!({}), &create_options("d1"))
        .await
        .unwrap();
    let namespaces = repo
        .add_to_namespaces("dashboard", "d1", &["team".into()], &BaseOptions::default())
        .await
        .unwrap();
    assert_eq!(namespaces, vec!["default".to_string(), "team".to_string()]);

    let team = BaseOptions {
        namespace: Some("team".into()),
    };
    assert!(repo.get("dashboard", "d1", &team).await.is_ok());

    let remaining = repo
        .delete_from_namespaces(
            "dashboard",
            "d1",
            &["default".into(), "team".into()],
            &BaseOptions::default(),
        )
        .await
        .unwrap();
    assert!(remaining.is_empty());
    assert!(repo.is_empty());
}

#[tokio::test]
async fn check_conflicts_reports_existing_ids() {
    let repo = SavedObjectsRepository::new();
    repo.create("dashboard", json!({}), &create_options("d1"))
        .await
        .unwrap();
    let response = repo
        .check_conflicts(
            &[
                CheckConflictsObject {
                    object_type: "dashboard".into(),
                    id: "d1".into(),
                },
                CheckConflictsObject {
                    object_type: "dashboard".into(),
                    id: "d2".into(),
                },
            ],
            &BaseOptions::default(),
        )
        .await
        .unwrap();
    assert_eq!(response.errors.len(), 1);
    assert_eq!(response.errors[0].error.status_code, 409);
}

#[tokio::test]
async fn objects_survive_reopen() {
    let dir = tempdir().unwrap();
    {
        let repo = SavedObjectsRepository::open(dir.path()).unwrap();
        repo.create(
            "dashboard",
            json!({"title": "kept"}),
            &CreateOptions {
                workspaces: Some(vec!["w1".into()]),
                ..create_options("d1")
            },
        )
        .await
        .unwrap();
        repo.create("dashboard", json!({}), &create_options("gone"))
            .await
            .unwrap();
        repo.delete("dashboard", "gone", &BaseOptions::default())
            .await
            .unwrap();
    }

    let repo = SavedObjectsRepository::open(dir.path()).unwrap();
    assert_eq!(repo.len(), 1);
    let object = repo.get("dashboard", "d1", &BaseOptions::default()).await.unwrap();
    assert_eq!(object.workspaces(), ["w1".to_string()]);

    // versions continue from the highest one on disk
    let next = repo
        .create("dashboard", json!({}), &create_options("d2"))
        .await
        .unwrap();
    assert_eq!(next.version.as_deref(), Some("2"));
}
