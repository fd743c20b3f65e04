//! REST API 集成测试（内存存储）

use axum::http::StatusCode;
use serde_json::{json, Value};
use uuid::Uuid;

mod common;
use common::{
    create_edge, create_node, delete, error_fields, get, memory_app, nas_payload, node_payload,
    post, put,
};

#[tokio::test]
async fn test_health_endpoint() {
    let app = memory_app();

    let response = get(&app, "/health").await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["status"], "ok");
    assert!(response.body["version"].is_string());
    assert!(response.body["uptime_secs"].is_number());
}

#[tokio::test]
async fn test_readiness_endpoint() {
    let app = memory_app();

    let response = get(&app, "/ready").await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["ready"], true);
    assert_eq!(response.body["checks"][0]["name"], "store");
}

#[tokio::test]
async fn test_trace_id_is_echoed() {
    let app = memory_app();

    let request = axum::http::Request::builder()
        .uri("/api/nodes")
        .header("x-trace-id", "trace-abc")
        .body(axum::body::Body::empty())
        .unwrap();
    let response = tower::ServiceExt::oneshot(app, request).await.unwrap();

    assert_eq!(response.headers()["x-trace-id"], "trace-abc");
    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn test_error_request_id_matches_header() {
    let app = memory_app();

    let response = get(&app, &format!("/api/nodes/{}", Uuid::new_v4())).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(
        response.body["error"]["request_id"],
        response.headers["x-request-id"].to_str().unwrap()
    );
}

#[tokio::test]
async fn test_create_node_applies_defaults() {
    let app = memory_app();

    let response = post(&app, "/api/nodes", node_payload("pve-01")).await;

    assert_eq!(response.status, StatusCode::CREATED);
    let node = &response.body;
    assert!(Uuid::parse_str(node["id"].as_str().unwrap()).is_ok());
    assert_eq!(node["name"], "pve-01");
    assert_eq!(node["osType"], "Debian 12");
    assert_eq!(node["deviceType"], "server");
    assert_eq!(node["status"], "unknown");
    assert_eq!(node["tags"], json!([]));
    assert_eq!(node["services"], json!([]));
    assert_eq!(node["position"], json!({"x": 0.0, "y": 0.0}));
    assert!(node["createdAt"].is_string());
    assert!(node["lastSeen"].is_string());
}

#[tokio::test]
async fn test_create_node_reports_all_missing_fields() {
    let app = memory_app();

    let response = post(&app, "/api/nodes", json!({"deviceType": "toaster"})).await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["error"]["code"], 400);
    assert_eq!(response.body["error"]["message"], "Validation failed");
    let fields = error_fields(&response.body);
    for field in ["name", "ip", "osType", "deviceType"] {
        assert!(fields.iter().any(|f| f == field), "missing {} in {:?}", field, fields);
    }
}

#[tokio::test]
async fn test_create_nas_used_exceeds_total() {
    let app = memory_app();

    let response = post(&app, "/api/nodes", nas_payload("nas", "100", "150")).await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        response.body["error"]["fields"],
        json!([{"field": "storageUsed", "message": "Used storage cannot exceed total storage"}])
    );
}

#[tokio::test]
async fn test_create_non_nas_ignores_storage_format() {
    let app = memory_app();
    let mut payload = node_payload("router");
    payload["deviceType"] = json!("router");
    payload["storageTotal"] = json!("abc");
    payload["storageUsed"] = json!("-5");

    let response = post(&app, "/api/nodes", payload).await;

    assert_eq!(response.status, StatusCode::CREATED);
    assert_eq!(response.body["storageTotal"], "abc");
}

#[tokio::test]
async fn test_create_node_with_invalid_service_url() {
    let app = memory_app();
    let mut payload = node_payload("web");
    payload["services"] = json!([
        {"name": "Proxmox", "url": "https://192.168.1.10:8006"},
        {"name": "Broken", "url": "not a url"},
    ]);

    let response = post(&app, "/api/nodes", payload).await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(error_fields(&response.body), vec!["services[1].url".to_string()]);
}

#[tokio::test]
async fn test_malformed_json_uses_error_envelope() {
    let app = memory_app();

    let request = axum::http::Request::builder()
        .method("POST")
        .uri("/api/nodes")
        .header("content-type", "application/json")
        .body(axum::body::Body::from("{not json"))
        .unwrap();
    let response = tower::ServiceExt::oneshot(app, request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let bytes = http_body_util::BodyExt::collect(response.into_body())
        .await
        .unwrap()
        .to_bytes();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["error"]["code"], 400);
}

#[tokio::test]
async fn test_get_node_not_found() {
    let app = memory_app();

    let response = get(&app, &format!("/api/nodes/{}", Uuid::new_v4())).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(response.body["error"]["message"], "Node not found");

    let response = get(&app, "/api/nodes/not-a-uuid").await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_list_nodes_with_filters() {
    let app = memory_app();
    create_node(&app, nas_payload("TrueNAS", "1000", "500")).await;
    let mut router = node_payload("OPNsense");
    router["deviceType"] = json!("router");
    router["tags"] = json!(["core", "network"]);
    create_node(&app, router).await;
    create_node(&app, node_payload("pve-01")).await;

    let all = get(&app, "/api/nodes").await;
    assert_eq!(all.status, StatusCode::OK);
    assert_eq!(all.body.as_array().unwrap().len(), 3);
    // 按创建顺序返回
    assert_eq!(all.body[0]["name"], "TrueNAS");

    let nas = get(&app, "/api/nodes?deviceType=nas").await;
    assert_eq!(nas.body.as_array().unwrap().len(), 1);

    let tagged = get(&app, "/api/nodes?tag=core").await;
    assert_eq!(tagged.body[0]["name"], "OPNsense");

    let searched = get(&app, "/api/nodes?search=PVE").await;
    assert_eq!(searched.body.as_array().unwrap().len(), 1);

    let invalid = get(&app, "/api/nodes?deviceType=toaster").await;
    assert_eq!(invalid.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_update_ignores_system_fields() {
    let app = memory_app();
    let id = create_node(&app, node_payload("pve-01")).await;
    let before = get(&app, &format!("/api/nodes/{}", id)).await.body;

    let response = put(
        &app,
        &format!("/api/nodes/{}", id),
        json!({
            "id": Uuid::new_v4(),
            "name": "pve-02",
            "position": {"x": 500, "y": 300},
            "createdAt": "2001-01-01T00:00:00Z",
            "updatedAt": "2001-01-01T00:00:00Z",
        }),
    )
    .await;

    assert_eq!(response.status, StatusCode::OK);
    let after = &response.body;
    assert_eq!(after["id"], before["id"]);
    assert_eq!(after["name"], "pve-02");
    assert_eq!(after["position"], before["position"]);
    assert_eq!(after["createdAt"], before["createdAt"]);
    assert_ne!(after["updatedAt"], "2001-01-01T00:00:00Z");
    assert_eq!(after["ip"], before["ip"]);
}

#[tokio::test]
async fn test_update_rejects_clearing_required_field() {
    let app = memory_app();
    let id = create_node(&app, node_payload("pve-01")).await;

    let response = put(&app, &format!("/api/nodes/{}", id), json!({"name": ""})).await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(error_fields(&response.body), vec!["name".to_string()]);
}

#[tokio::test]
async fn test_update_nas_checks_merged_storage() {
    let app = memory_app();
    let id = create_node(&app, nas_payload("nas", "1000", "500")).await;

    let response = put(&app, &format!("/api/nodes/{}", id), json!({"storageUsed": "1500"})).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(error_fields(&response.body), vec!["storageUsed".to_string()]);

    let response = put(&app, &format!("/api/nodes/{}", id), json!({"storageUsed": "900"})).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["storageUsed"], "900");
}

#[tokio::test]
async fn test_update_missing_node() {
    let app = memory_app();

    let response = put(&app, &format!("/api/nodes/{}", Uuid::new_v4()), json!({"name": "x"})).await;

    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_node_cascades_edges() {
    let app = memory_app();
    let a = create_node(&app, node_payload("a")).await;
    let b = create_node(&app, node_payload("b")).await;
    let c = create_node(&app, node_payload("c")).await;
    let lonely = create_node(&app, node_payload("lonely")).await;
    create_edge(&app, &a, &b).await;
    create_edge(&app, &b, &c).await;
    let kept = create_edge(&app, &a, &c).await;

    let response = delete(&app, &format!("/api/nodes/{}", b)).await;
    assert_eq!(response.status, StatusCode::NO_CONTENT);
    assert!(response.body.is_null());

    let edges = get(&app, "/api/edges").await.body;
    assert_eq!(edges.as_array().unwrap().len(), 1);
    assert_eq!(edges[0]["id"], kept.as_str());

    // 没有连线的节点同样可以删除
    let response = delete(&app, &format!("/api/nodes/{}", lonely)).await;
    assert_eq!(response.status, StatusCode::NO_CONTENT);
    assert_eq!(get(&app, "/api/nodes").await.body.as_array().unwrap().len(), 2);
    assert_eq!(get(&app, "/api/edges").await.body[0]["id"], kept.as_str());
}

#[tokio::test]
async fn test_delete_unknown_ids_succeed() {
    let app = memory_app();

    let response = delete(&app, &format!("/api/nodes/{}", Uuid::new_v4())).await;
    assert_eq!(response.status, StatusCode::NO_CONTENT);

    let response = delete(&app, "/api/edges/garbage").await;
    assert_eq!(response.status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_edge_lifecycle() {
    let app = memory_app();
    let a = create_node(&app, node_payload("a")).await;
    let b = create_node(&app, node_payload("b")).await;

    let response = post(&app, "/api/edges", json!({"source": a, "target": b, "animated": true})).await;
    assert_eq!(response.status, StatusCode::CREATED);
    assert_eq!(response.body["animated"], "true");
    let id = response.body["id"].as_str().unwrap().to_string();

    let fetched = get(&app, &format!("/api/edges/{}", id)).await;
    assert_eq!(fetched.status, StatusCode::OK);
    assert_eq!(fetched.body["source"], a.as_str());

    let response = delete(&app, &format!("/api/edges/{}", id)).await;
    assert_eq!(response.status, StatusCode::NO_CONTENT);

    let fetched = get(&app, &format!("/api/edges/{}", id)).await;
    assert_eq!(fetched.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_edge_requires_existing_nodes() {
    let app = memory_app();
    let a = create_node(&app, node_payload("a")).await;

    let response = post(&app, "/api/edges", json!({"source": a, "target": Uuid::new_v4()})).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(error_fields(&response.body), vec!["target".to_string()]);

    let response = post(&app, "/api/edges", json!({"source": "nope"})).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    let fields = error_fields(&response.body);
    assert!(fields.contains(&"source".to_string()));
    assert!(fields.contains(&"target".to_string()));
}

#[tokio::test]
async fn test_topology_and_export() {
    let app = memory_app();
    let a = create_node(&app, node_payload("a")).await;
    let b = create_node(&app, node_payload("b")).await;
    create_edge(&app, &a, &b).await;

    let topology = get(&app, "/api/topology").await;
    assert_eq!(topology.status, StatusCode::OK);
    assert_eq!(topology.body["nodes"].as_array().unwrap().len(), 2);
    assert_eq!(topology.body["edges"].as_array().unwrap().len(), 1);

    let export = get(&app, "/api/export").await;
    assert_eq!(export.status, StatusCode::OK);
    assert_eq!(
        export.headers["content-disposition"],
        "attachment; filename=topology.json"
    );
    assert_eq!(export.body, topology.body);
}

#[tokio::test]
async fn test_import_is_all_or_nothing() {
    let app = memory_app();

    let response = post(
        &app,
        "/api/import",
        json!({
            "nodes": [
                node_payload("a"),
                {"name": "broken", "ip": "10.0.0.9"},
                node_payload("b"),
                node_payload("c"),
            ]
        }),
    )
    .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(error_fields(&response.body), vec!["nodes[1].osType".to_string()]);
    assert_eq!(get(&app, "/api/nodes").await.body, json!([]));
}

#[tokio::test]
async fn test_import_rejects_missing_nodes_array() {
    let app = memory_app();

    let response = post(&app, "/api/import", json!({"edges": []})).await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        response.body["error"]["message"],
        "Invalid import data: nodes must be an array"
    );
}

#[tokio::test]
async fn test_export_can_be_reimported() {
    let source = memory_app();
    let a = create_node(&source, node_payload("a")).await;
    let b = create_node(&source, nas_payload("nas", "2000", "1000")).await;
    create_edge(&source, &a, &b).await;
    let exported = get(&source, "/api/export").await.body;

    let target = memory_app();
    let response = post(&target, "/api/import", exported).await;

    assert_eq!(response.status, StatusCode::CREATED, "{}", response.body);
    assert_eq!(response.body["message"], "Imported 2 nodes and 1 edges");

    let nodes = response.body["nodes"].as_array().unwrap();
    let edge = &response.body["edges"][0];
    assert_ne!(nodes[0]["id"], a.as_str());
    assert_eq!(edge["source"], nodes[0]["id"]);
    assert_eq!(edge["target"], nodes[1]["id"]);
    assert_eq!(nodes[1]["metadata"]["raidType"], "RAIDZ1");
}

#[tokio::test]
async fn test_import_edge_to_unknown_node_writes_nothing() {
    let app = memory_app();

    let response = post(
        &app,
        "/api/import",
        json!({
            "nodes": [node_payload("a")],
            "edges": [{"source": Uuid::new_v4(), "target": Uuid::new_v4()}],
        }),
    )
    .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert!(error_fields(&response.body).contains(&"edges[0].source".to_string()));
    assert_eq!(get(&app, "/api/nodes").await.body, json!([]));
}

#[tokio::test]
async fn test_stats_summary() {
    let app = memory_app();

    let empty = get(&app, "/api/stats").await;
    assert_eq!(empty.status, StatusCode::OK);
    assert_eq!(empty.body["totalNodes"], 0);
    assert!(empty.body["onlinePercent"].is_null());
    assert_eq!(empty.body["storage"], json!({"state": "no-nas-data"}));

    create_node(&app, nas_payload("nas-1", "1000", "500")).await;
    create_node(&app, nas_payload("nas-2", "2000", "1000")).await;
    let mut web = node_payload("web");
    web["services"] = json!([{"name": "Grafana", "url": "http://192.168.1.10:3000"}]);
    create_node(&app, web).await;

    let stats = get(&app, "/api/stats").await.body;
    assert_eq!(stats["totalNodes"], 3);
    assert_eq!(stats["onlineNodes"], 2);
    assert_eq!(stats["onlinePercent"], 67);
    assert_eq!(stats["serviceCount"], 1);
    assert_eq!(stats["storage"]["state"], "measured");
    assert_eq!(stats["storage"]["totalGb"].as_f64(), Some(3000.0));
    assert_eq!(stats["storage"]["usedGb"].as_f64(), Some(1500.0));
    assert_eq!(stats["storage"]["usedPercent"], 50);
    assert_eq!(stats["storage"]["totalDisplay"], "3 TB");
    assert_eq!(stats["storage"]["usedDisplay"], "1.5 TB");
}

#[tokio::test]
async fn test_update_checks_metadata_against_latest_device_type() {
    let app = memory_app();
    let id = create_node(&app, nas_payload("truenas", "200", "50")).await;
    let path = format!("/api/nodes/{}", id);

    let response = put(&app, &path, json!({"deviceType": "router"})).await;
    assert_eq!(response.status, StatusCode::OK);
    assert!(response.body.get("metadata").map_or(true, Value::is_null));

    let response = put(&app, &path, json!({"metadata": {"raidType": "raid6"}})).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert!(error_fields(&response.body).contains(&"metadata.raidType".to_string()));

    let node = get(&app, &path).await.body;
    assert_eq!(node["deviceType"], "router");
    assert!(node.get("metadata").map_or(true, Value::is_null));
}
