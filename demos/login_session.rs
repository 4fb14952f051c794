//! Demonstrates signing in against a REST auth service, letting the coordinator renew an
//! expired access token behind concurrent requests, and signing out again.

// std
use std::sync::Arc;
// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
use serde_json::json;
// self
use session_broker::{
	api::RestAuthApi,
	auth::Role,
	config::SessionPolicy,
	dispatch::{Dispatcher, ReqwestTransport, RequestDescriptor},
	session::Coordinator,
	url::Url,
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let user = json!({
		"_id": "u-1",
		"name": "Demo",
		"email": "demo@example.com",
		"role": "buyer"
	});
	let login = json!({
		"data": { "accessToken": "access-1", "refreshToken": "refresh-1", "user": user.clone() }
	});

	server
		.mock_async(|when, then| {
			when.method(POST).path("/api/v1/auth/login");
			then.status(200).json_body(login);
		})
		.await;

	let refresh = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/v1/auth/refresh-token");
			then.status(200).json_body(json!({ "accessToken": "access-2" }));
		})
		.await;

	server
		.mock_async(|when, then| {
			when.method(GET).path("/api/v1/users/profile");
			then.status(200).json_body(user.clone());
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(GET).path("/api/v1/buyer/cart").header("authorization", "Bearer access-2");
			then.status(200).json_body(json!({ "items": [{ "sku": "tea", "qty": 2 }] }));
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(POST).path("/api/v1/auth/logout");
			then.status(204);
		})
		.await;

	let base = Url::parse(&server.url("/api/v1"))?;
	// Short-lived tokens so the demo can watch one go stale.
	let policy = SessionPolicy::builder()
		.access_token_lifetime(time::Duration::milliseconds(200))
		.renewal_threshold(time::Duration::ZERO)
		.build()?;
	let coordinator = Arc::new(
		Coordinator::builder(Arc::new(RestAuthApi::new(base.clone()))).policy(policy).build(),
	);
	let dispatcher = Dispatcher::new(coordinator.clone(), Arc::new(ReqwestTransport::new(base)));
	let signed_in = coordinator.login("demo@example.com", "demo-password").await?;

	println!("Signed in as {} ({}).", signed_in.name, signed_in.role);

	tokio::time::sleep(std::time::Duration::from_millis(250)).await;

	let (first, second) = tokio::join!(
		dispatcher.execute_json::<serde_json::Value>(RequestDescriptor::get("/buyer/cart")),
		dispatcher.execute_json::<serde_json::Value>(RequestDescriptor::get("/buyer/cart")),
	);

	println!("Cart: {}.", first?);
	println!("Cart again: {}.", second?);
	println!("Renewals shared by both requests: {}.", coordinator.metrics().attempts());

	coordinator.require_role(&[Role::Buyer])?;
	coordinator.logout().await?;

	println!("Signed out; phase is now {}.", coordinator.phase());

	refresh.assert_async().await;

	Ok(())
}
