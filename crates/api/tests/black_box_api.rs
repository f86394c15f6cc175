use std::sync::Arc;

use reqwest::StatusCode;
use serde_json::{Value, json};

use campuscart_api::app::{AppServices, build_app};
use campuscart_core::ProductId;
use campuscart_infra::{CommerceStore, InMemoryStore, seed_catalog};
use campuscart_products::{Category, Product};

struct TestServer {
    base_url: String,
    store: Arc<dyn CommerceStore>,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn(products: &[Product]) -> Self {
        // Same router as prod, in-memory store, ephemeral port.
        let store: Arc<dyn CommerceStore> = Arc::new(InMemoryStore::new());
        seed_catalog(store.as_ref(), products).await.unwrap();
        let app = build_app(Arc::new(AppServices::new(store.clone())));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            store,
            handle,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn product(id: &str, price: u64, stock: u32) -> Product {
    Product::new(
        ProductId::parse(id).unwrap(),
        format!("Product {id}"),
        price,
        Category::new("snacks").unwrap(),
        stock,
    )
    .unwrap()
}

async fn register(client: &reqwest::Client, srv: &TestServer, email: &str) -> String {
    let res = client
        .post(srv.url("/auth/register"))
        .json(&json!({"name": "Student", "email": email, "password": "library-card-99"}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: Value = res.json().await.unwrap();
    body["session_id"].as_str().unwrap().to_string()
}

async fn add_to_cart(client: &reqwest::Client, srv: &TestServer, session: &str, product_id: &str) -> Value {
    let res = client
        .post(srv.url("/cart/items"))
        .header("x-session-id", session)
        .json(&json!({"product_id": product_id}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    res.json().await.unwrap()
}

async fn checkout(client: &reqwest::Client, srv: &TestServer, session: &str) -> reqwest::Response {
    client
        .post(srv.url("/cart/checkout"))
        .header("x-session-id", session)
        .json(&json!({"hostel": "Brahmaputra", "room": "C-118"}))
        .send()
        .await
        .unwrap()
}

#[tokio::test]
async fn session_required_for_cart_and_orders() {
    let srv = TestServer::spawn(&[product("chips", 30, 5)]).await;
    let client = reqwest::Client::new();

    let res = client.get(srv.url("/cart")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = client
        .get(srv.url("/orders"))
        .header("x-session-id", "ses_does_not_exist")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    // The catalog is public.
    let res = client.get(srv.url("/products")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn register_login_logout() {
    let srv = TestServer::spawn(&[]).await;
    let client = reqwest::Client::new();

    register(&client, &srv, "kiran@campus.edu").await;

    let res = client
        .post(srv.url("/auth/register"))
        .json(&json!({"name": "Other", "email": "KIRAN@campus.edu", "password": "library-card-99"}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);

    let res = client
        .post(srv.url("/auth/login"))
        .json(&json!({"email": "kiran@campus.edu", "password": "wrong-password"}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = client
        .post(srv.url("/auth/login"))
        .json(&json!({"email": "kiran@campus.edu", "password": "library-card-99"}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    let session = body["session_id"].as_str().unwrap().to_string();

    let res = client
        .post(srv.url("/auth/logout"))
        .header("x-session-id", &session)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let res = client
        .get(srv.url("/cart"))
        .header("x-session-id", &session)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn cart_respects_stock_ceiling() {
    let srv = TestServer::spawn(&[product("chips", 30, 3)]).await;
    let client = reqwest::Client::new();
    let session = register(&client, &srv, "asha@campus.edu").await;

    let mut cart = Value::Null;
    for _ in 0..4 {
        cart = add_to_cart(&client, &srv, &session, "chips").await;
    }
    assert_eq!(cart["total_quantity"], 3);
    assert_eq!(cart["total_amount"], 90);

    let res = client
        .patch(srv.url("/cart/items/chips"))
        .header("x-session-id", &session)
        .json(&json!({"delta": -100}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let cart: Value = res.json().await.unwrap();
    assert_eq!(cart["total_quantity"], 0);
    assert!(cart["lines"].as_array().unwrap().is_empty());

    let res = client
        .post(srv.url("/cart/items"))
        .header("x-session-id", &session)
        .json(&json!({"product_id": "unknown"}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn checkout_records_order_and_clears_cart() {
    let srv = TestServer::spawn(&[product("chips", 30, 5), product("cola", 45, 2)]).await;
    let client = reqwest::Client::new();
    let session = register(&client, &srv, "dev@campus.edu").await;

    add_to_cart(&client, &srv, &session, "chips").await;
    add_to_cart(&client, &srv, &session, "chips").await;
    add_to_cart(&client, &srv, &session, "cola").await;

    let res = checkout(&client, &srv, &session).await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let order: Value = res.json().await.unwrap();
    assert_eq!(order["total"], 2 * 30 + 45);
    assert_eq!(order["status"], "confirmed");

    let cart: Value = client
        .get(srv.url("/cart"))
        .header("x-session-id", &session)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(cart["total_quantity"], 0);

    let chips: Value = client
        .get(srv.url("/products/chips"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(chips["stock"], 3);

    let orders: Value = client
        .get(srv.url("/orders"))
        .header("x-session-id", &session)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(orders.as_array().unwrap().len(), 1);
    assert_eq!(orders[0]["id"], order["id"]);
}

#[tokio::test]
async fn oversold_checkout_is_conflict_and_keeps_cart() {
    let srv = TestServer::spawn(&[product("cola", 45, 2)]).await;
    let client = reqwest::Client::new();
    let first = register(&client, &srv, "a@campus.edu").await;
    let second = register(&client, &srv, "b@campus.edu").await;

    for session in [&first, &second] {
        add_to_cart(&client, &srv, session, "cola").await;
        add_to_cart(&client, &srv, session, "cola").await;
    }

    assert_eq!(checkout(&client, &srv, &first).await.status(), StatusCode::CREATED);

    let res = checkout(&client, &srv, &second).await;
    assert_eq!(res.status(), StatusCode::CONFLICT);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "stock_insufficient");
    assert_eq!(body["product_id"], "cola");
    assert_eq!(body["requested"], 2);
    assert_eq!(body["available"], 0);

    let cart: Value = client
        .get(srv.url("/cart"))
        .header("x-session-id", &second)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(cart["total_quantity"], 2);
}

#[tokio::test]
async fn empty_cart_or_destination_is_bad_request() {
    let srv = TestServer::spawn(&[product("chips", 30, 5)]).await;
    let client = reqwest::Client::new();
    let session = register(&client, &srv, "z@campus.edu").await;

    assert_eq!(checkout(&client, &srv, &session).await.status(), StatusCode::BAD_REQUEST);

    add_to_cart(&client, &srv, &session, "chips").await;
    let res = client
        .post(srv.url("/cart/checkout"))
        .header("x-session-id", &session)
        .json(&json!({"hostel": "", "room": "12"}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn repriced_product_needs_cart_sync_before_checkout() {
    let srv = TestServer::spawn(&[product("chips", 30, 5), product("cola", 45, 1)]).await;
    let client = reqwest::Client::new();
    let session = register(&client, &srv, "ravi@campus.edu").await;

    add_to_cart(&client, &srv, &session, "chips").await;
    add_to_cart(&client, &srv, &session, "chips").await;
    add_to_cart(&client, &srv, &session, "cola").await;

    let mut chips = product("chips", 30, 5);
    chips.set_price(35);
    srv.store.put_product(&chips).await.unwrap();

    let res = checkout(&client, &srv, &session).await;
    assert_eq!(res.status(), StatusCode::CONFLICT);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "price_changed");
    assert_eq!(body["product_id"], "chips");
    assert_eq!(body["expected"], 30);
    assert_eq!(body["actual"], 35);

    // Someone else buys the last cola before the cart is refreshed.
    srv.store.put_product(&product("cola", 45, 0)).await.unwrap();

    let res = client
        .post(srv.url("/cart/sync"))
        .header("x-session-id", &session)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let cart: Value = res.json().await.unwrap();
    assert_eq!(cart["total_quantity"], 2);
    assert_eq!(cart["total_amount"], 70);

    let res = checkout(&client, &srv, &session).await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let order: Value = res.json().await.unwrap();
    assert_eq!(order["total"], 70);
}
