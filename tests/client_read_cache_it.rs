// std
use std::sync::Arc;
// crates.io
use httpmock::prelude::*;
use serde_json::{Value, json};
// self
use crm_api_client::{
	client::{ApiClient, RequestOptions, ReqwestApiClient},
	config::ClientConfig,
	session::{MemoryTokenStore, RecordingNavigator},
	url::Url,
};

fn build_client(server: &MockServer) -> ReqwestApiClient {
	let base_url =
		Url::parse(&server.base_url()).expect("Mock server URL should parse as a base URL.");
	let config = ClientConfig::new(base_url);

	ApiClient::new(
		config,
		Arc::new(MemoryTokenStore::default()),
		Arc::new(RecordingNavigator::default()),
	)
	.expect("Failed to build reqwest-backed test client.")
}

#[tokio::test]
async fn simultaneous_reads_share_one_transport_call() {
	let server = MockServer::start_async().await;
	let users = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/users/");
			then.status(200).json_body(json!([{ "id": 1, "role": "admin" }]));
		})
		.await;
	let client = build_client(&server);
	let (first, second): (Result<Value, _>, Result<Value, _>) =
		tokio::join!(client.get("/api/users/"), client.get("/api/users/"));
	let first = first.expect("First concurrent read should succeed.");
	let second = second.expect("Second concurrent read should succeed.");

	assert_eq!(first, second);
	assert_eq!(first, json!([{ "id": 1, "role": "admin" }]));
	assert_eq!(users.hits_async().await, 1);
	assert_eq!(client.metrics.cache_hits(), 1);
	assert_eq!(client.metrics.cache_misses(), 1);
}

#[tokio::test]
async fn mutation_invalidates_cached_reads_under_its_path() {
	let server = MockServer::start_async().await;
	let leads_get = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/leads/");
			then.status(200).json_body(json!([]));
		})
		.await;
	let leads_post = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/leads/");
			then.status(201).json_body(json!({ "id": 9 }));
		})
		.await;
	let client = build_client(&server);
	let _: Value = client.get("/api/leads/").await.expect("Initial lead read should succeed.");
	let created: Value = client
		.post("/api/leads/", &json!({ "name": "Acme" }))
		.await
		.expect("Lead creation should succeed.");

	assert_eq!(created, json!({ "id": 9 }));

	let _: Value = client.get("/api/leads/").await.expect("Post-mutation read should succeed.");

	assert_eq!(leads_get.hits_async().await, 2, "the POST must bust the cached GET");
	assert_eq!(leads_post.hits_async().await, 1);
}

#[tokio::test]
async fn invalidation_spares_sibling_paths() {
	let server = MockServer::start_async().await;
	let lead_detail = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/leads/123");
			then.status(200).json_body(json!({ "id": 123 }));
		})
		.await;
	let users = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/users/");
			then.status(200).json_body(json!([]));
		})
		.await;
	let leads_post = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/leads/");
			then.status(201).json_body(json!({ "id": 124 }));
		})
		.await;
	let client = build_client(&server);
	let _: Value = client.get("/api/leads/123").await.expect("Lead detail read should succeed.");
	let _: Value = client.get("/api/users/").await.expect("User read should succeed.");
	let _: Value = client
		.post("/api/leads/", &json!({ "name": "Beta" }))
		.await
		.expect("Lead creation should succeed.");
	let _: Value =
		client.get("/api/leads/123").await.expect("Lead detail reread should succeed.");
	let _: Value = client.get("/api/users/").await.expect("User reread should succeed.");

	assert_eq!(lead_detail.hits_async().await, 2, "descendant paths are invalidated");
	assert_eq!(users.hits_async().await, 1, "unrelated paths stay cached");
	assert_eq!(leads_post.hits_async().await, 1);
}

#[tokio::test]
async fn distinct_query_parameters_read_independently() {
	let server = MockServer::start_async().await;
	let users = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/users/");
			then.status(200).json_body(json!([]));
		})
		.await;
	let client = build_client(&server);
	let _: Value = client
		.get_with("/api/users/", RequestOptions::new().param("page", "1"))
		.await
		.expect("First page read should succeed.");
	let _: Value = client
		.get_with("/api/users/", RequestOptions::new().param("page", "2"))
		.await
		.expect("Second page read should succeed.");

	assert_eq!(users.hits_async().await, 2);
}

#[tokio::test]
async fn clear_cache_forces_a_refetch() {
	let server = MockServer::start_async().await;
	let tasks = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/tasks/");
			then.status(200).json_body(json!([]));
		})
		.await;
	let client = build_client(&server);
	let _: Value = client.get("/api/tasks/").await.expect("Initial task read should succeed.");

	client.clear_cache();

	let _: Value = client.get("/api/tasks/").await.expect("Post-clear read should succeed.");

	assert_eq!(tasks.hits_async().await, 2);
}
