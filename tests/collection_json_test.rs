//! Collection+JSON documents built from persisted workflows, and client
//! writes read back through the schema validator.

mod common;

use serde_json::{Value, json};

use checklists::config::AppConfig;
use checklists::handlers::collections::{Abilities, Documents, Surface};
use checklists::hypermedia::{CollectionJson, TemplateWrite};
use checklists::models::definition;
use checklists::models::instance::{self, InstanceFilter, NewInstance};
use checklists::models::user::Role;
use checklists::schemas::SchemaRegistry;
use common::*;

const MEMBER: Abilities = Abilities {
    manage_definitions: false,
    manage_instances: true,
};

fn registry() -> SchemaRegistry {
    SchemaRegistry::load(255).expect("schemas load")
}

fn wire(doc: &checklists::hypermedia::CollectionDocument) -> Value {
    serde_json::to_value(CollectionJson::from(doc)).expect("serialize")
}

fn names(data: &Value) -> Vec<String> {
    data.as_array()
        .expect("data array")
        .iter()
        .map(|d| d["name"].as_str().expect("name").to_string())
        .collect()
}

#[tokio::test]
async fn test_instance_list_document_on_the_wire() {
    let db = setup_test_db_seeded().await;
    let pool = db.pool();
    let user_id = create_user(pool, "lister", "lister123", Role::Member).await;
    for def in ["def_morning_quick_start", "def_evening_wind_down", "def_morning_quick_start"] {
        instance::create(pool, user_id, &NewInstance::new(def)).await.expect("create");
    }

    let registry = registry();
    let config = AppConfig::default();
    let docs = Documents::new(&registry, &config, Surface::Api);
    let schema = docs.instance_schema(definition::find_ids(pool).await.expect("ids"));
    let instances = instance::find_for_user(pool, user_id, &InstanceFilter::default()).await.expect("list");

    let doc = docs
        .instance_list(&schema, &instances, Vec::new(), Vec::new(), MEMBER)
        .expect("represent");
    let body = wire(&doc);
    let collection = &body["collection"];

    assert_eq!(collection["version"], "1.0");
    assert_eq!(collection["href"], "/api/cj/workflow-instances");

    let items = collection["items"].as_array().expect("items");
    assert_eq!(items.len(), 3);
    for (item, wf) in items.iter().zip(&instances) {
        assert_eq!(item["href"], format!("/api/cj/workflow-instances/{}", wf.id));
        assert_eq!(
            names(&item["data"]),
            vec!["id", "workflow_definition_id", "name", "status", "progress", "created_at", "due_datetime", "share_token"]
        );
        // Item data carries no `required`
        assert!(item["data"][0].get("required").is_none());
        let rels: Vec<&str> = item["links"].as_array().expect("links").iter().filter_map(|l| l["rel"].as_str()).collect();
        assert!(rels.contains(&"archive"));
        assert!(!rels.contains(&"unarchive"));
        assert!(!rels.contains(&"shared"));
    }

    let query = &collection["queries"][0];
    assert_eq!(query["rel"], "search");
    assert!(!names(&query["data"]).contains(&"due_datetime".to_string()));

    let template = &collection["template"];
    assert_eq!(template["method"], "POST");
    assert_eq!(
        names(&template["data"]),
        vec!["workflow_definition_id", "name", "status", "due_datetime"]
    );
    let definition_field = &template["data"][0];
    assert_eq!(definition_field["type"], "select");
    assert_eq!(definition_field["required"], true);
    assert_eq!(
        definition_field["options"],
        json!(["def_evening_wind_down", "def_morning_quick_start"])
    );
}

#[tokio::test]
async fn test_template_write_round_trips_through_the_validator() {
    let db = setup_test_db_seeded().await;
    let pool = db.pool();
    let user_id = create_user(pool, "writer", "writer123", Role::Member).await;
    let registry = registry();

    let body = json!({
        "template": {
            "data": [
                { "name": "workflow_definition_id", "value": "def_evening_wind_down" },
                { "name": "name", "value": "Friday night" },
                { "name": "due_datetime", "value": "2025-05-02T22:00:00Z" }
            ]
        }
    });
    let write: TemplateWrite = serde_json::from_value(body).expect("template write");
    let payload = write.into_payload();

    let new = checklists::handlers::read_payload(&registry.instance, &payload, NewInstance::from_payload)
        .expect("valid payload");
    assert_eq!(new.name.as_deref(), Some("Friday night"));

    let wf = instance::create(pool, user_id, &new).await.expect("create");
    assert_eq!(wf.tasks.len(), 3);
    assert_eq!(wf.status.as_str(), "active");
}

#[tokio::test]
async fn test_invalid_write_reports_every_problem() {
    let registry = registry();
    let payload = json!({ "name": 42, "status": "sleeping" });
    let result = checklists::handlers::read_payload(
        &registry.instance,
        payload.as_object().expect("object"),
        NewInstance::from_payload,
    );
    match result {
        Err(checklists::errors::AppError::Validation(errors)) => assert!(errors.len() >= 2, "{errors:?}"),
        other => panic!("expected validation errors, got {other:?}"),
    }
}

#[tokio::test]
async fn test_shared_documents_carry_no_actions() {
    let db = setup_test_db_seeded().await;
    let pool = db.pool();
    let user_id = create_user(pool, "sharer", "sharer123", Role::Member).await;
    let wf = instance::create(pool, user_id, &NewInstance::new("def_morning_quick_start")).await.expect("create");
    let token = instance::share(pool, &wf.id, user_id).await.expect("share");
    let wf = instance::find_by_share_token(pool, &token).await.expect("lookup").expect("shared");

    let registry = registry();
    let config = AppConfig::default();
    let docs = Documents::new(&registry, &config, Surface::Api).shared(&token, &wf).expect("represent");
    assert_eq!(docs.len(), 2);

    let instance_doc = wire(&docs[0]);
    assert_eq!(instance_doc["collection"]["href"], format!("/api/cj/share/{token}"));
    assert!(instance_doc["collection"].get("template").is_none());
    assert_eq!(instance_doc["collection"]["links"][0]["rel"], "tasks");

    let tasks_doc = wire(&docs[1]);
    let items = tasks_doc["collection"]["items"].as_array().expect("items");
    assert_eq!(items.len(), 3);
    assert!(items.iter().all(|i| i["links"].as_array().is_none_or(|l| l.is_empty())));
}
