use std::str::FromStr;

use op_stock_client::engine::{FilterState, QueryDescriptor};
use op_stock_client::gateway::{HttpGateway, StockApi};
use op_stock_client::AppError;
use reqwest::Client;
use rust_decimal::Decimal;
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn gateway_for(server: &MockServer) -> HttpGateway {
    HttpGateway::with_client(Client::new(), &server.uri()).unwrap()
}

fn price(raw: &str) -> Option<Decimal> {
    Some(Decimal::from_str(raw).unwrap())
}

#[tokio::test]
async fn test_list_offers_sends_only_active_criteria() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/products"))
        .and(query_param("set", "OP-05"))
        .and(query_param("search", "luffy"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "id": 7,
                "name": "Awakening of the New Era Booster",
                "set_code": "OP-05",
                "site_slug": "cardmarket",
                "site_name": "Cardmarket",
                "url": "https://cardmarket.example/7",
                "image_url": null,
                "price": 5.5,
                "in_stock": 1,
                "checked_at": "2024-05-01T08:00:00"
            },
            {
                "id": 8,
                "name": "Awakening of the New Era Booster",
                "set_code": "OP-05",
                "site_slug": "ultrajeux",
                "site_name": "Ultrajeux",
                "url": "https://ultrajeux.example/8",
                "price": null,
                "in_stock": null,
                "checked_at": null
            }
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let filter = FilterState {
        site: "any".to_string(),
        set: "OP-05".to_string(),
        stock: String::new(),
        sort: String::new(),
        search: "luffy".to_string(),
    };
    let offers = gateway_for(&server)
        .await
        .list_offers(&QueryDescriptor::from_filter(&filter))
        .await
        .unwrap();

    assert_eq!(offers.len(), 2);
    assert!(offers[0].in_stock);
    assert_eq!(offers[0].price, price("5.5"));
    assert!(offers[0].checked_at.is_some());
    assert!(!offers[1].in_stock);
    assert_eq!(offers[1].price, None);

    let requests = server.received_requests().await.unwrap();
    let url = &requests[0].url;
    let keys: Vec<String> = url.query_pairs().map(|(k, _)| k.into_owned()).collect();
    assert_eq!(keys, vec!["set", "search"]);
}

#[tokio::test]
async fn test_empty_query_sends_no_parameters() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/products"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let offers = gateway_for(&server)
        .await
        .list_offers(&QueryDescriptor::default())
        .await
        .unwrap();

    assert!(offers.is_empty());
    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests[0].url.query(), None);
}

#[tokio::test]
async fn test_grouped_listing_is_normalized() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/products/grouped"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "set_code": "OP-01",
                "name": "Romance Dawn Booster",
                "image_url": null,
                "best_price": 1.0,
                "offers": [
                    {"id": 1, "name": "Romance Dawn Booster", "set_code": "OP-01",
                     "site_slug": "a", "site_name": "A", "url": "https://a.example/1",
                     "image_url": "https://a.example/1.png", "price": 4.5, "in_stock": true},
                    {"id": 2, "name": "Romance Dawn Booster", "set_code": "OP-01",
                     "site_slug": "b", "site_name": "B", "url": "https://b.example/2",
                     "price": 3.9, "in_stock": 0}
                ]
            }
        ])))
        .mount(&server)
        .await;

    let query = QueryDescriptor {
        site: Some("a".to_string()),
        sort: Some("name".to_string()),
        set: Some("OP-01".to_string()),
        ..QueryDescriptor::default()
    };
    let groups = gateway_for(&server).await.list_offer_groups(&query).await.unwrap();

    assert_eq!(groups.len(), 1);
    let group = &groups[0];
    // The server's best price is ignored: only in-stock offers count.
    assert_eq!(group.best_price(), price("4.5"));
    assert!(group.any_in_stock());
    assert_eq!(group.image_url(), Some("https://a.example/1.png"));

    // Site and sort are not understood by the grouped endpoint.
    let requests = server.received_requests().await.unwrap();
    let keys: Vec<String> = requests[0].url.query_pairs().map(|(k, _)| k.into_owned()).collect();
    assert_eq!(keys, vec!["set"]);
}

#[tokio::test]
async fn test_stats_sites_and_sets() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/stats"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "total_products": 12,
            "in_stock": 5,
            "out_of_stock": 7,
            "avg_price": 6.25,
            "total_sites": 3,
            "best_price": null,
            "last_scan": {"finished_at": "2024-05-01 08:00:00"}
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/sites"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"slug": "cardmarket", "name": "Cardmarket"}
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/sets"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(["OP-01", "OP-02"])))
        .mount(&server)
        .await;

    let gateway = gateway_for(&server).await;
    let stats = gateway.get_stats().await.unwrap();
    assert_eq!(stats.total_products, 12);
    assert_eq!(stats.avg_price, price("6.25"));
    assert_eq!(stats.best_price, None);
    assert!(stats.last_scan_finished_at().is_some());

    let sites = gateway.list_sites().await.unwrap();
    assert_eq!(sites[0].slug, "cardmarket");
    assert_eq!(gateway.list_sets().await.unwrap(), vec!["OP-01", "OP-02"]);
}

#[tokio::test]
async fn test_trigger_scan_accepted() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/scan"))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({"message": "Scan started"})))
        .expect(1)
        .mount(&server)
        .await;

    let accepted = gateway_for(&server).await.trigger_scan().await.unwrap();
    assert_eq!(accepted.message.as_deref(), Some("Scan started"));
}

#[tokio::test]
async fn test_trigger_scan_rejected_with_reason() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/scan"))
        .respond_with(
            ResponseTemplate::new(409).set_body_json(json!({"error": "A scan is already running"})),
        )
        .mount(&server)
        .await;

    let err = gateway_for(&server).await.trigger_scan().await.unwrap_err();
    match err {
        AppError::Rejected { reason } => assert_eq!(reason, "A scan is already running"),
        other => panic!("expected a rejection, got {:?}", other),
    }
}

#[tokio::test]
async fn test_trigger_scan_html_error_is_transport() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/scan"))
        .respond_with(ResponseTemplate::new(502).set_body_string("<html>Bad Gateway</html>"))
        .mount(&server)
        .await;

    let err = gateway_for(&server).await.trigger_scan().await.unwrap_err();
    assert!(err.is_transport());
    assert_eq!(err.user_message("Connection error"), "Connection error");
}

#[tokio::test]
async fn test_scan_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/scan/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "running": true,
            "started_at": "2024-05-01T08:00:00",
            "progress": 3
        })))
        .mount(&server)
        .await;

    let status = gateway_for(&server).await.get_scan_status().await.unwrap();
    assert!(status.running);
}

#[tokio::test]
async fn test_history_of_unknown_product() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/products/404/history"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"error": "Product not found"})))
        .mount(&server)
        .await;

    let err = gateway_for(&server).await.get_history(404).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound { .. }));
    assert_eq!(err.user_message("Failed to load price history"), "Product not found");
}

#[tokio::test]
async fn test_history_server_error_keeps_its_message() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/products/3/history"))
        .respond_with(
            ResponseTemplate::new(500).set_body_json(json!({"error": "Erreur base de donnees"})),
        )
        .mount(&server)
        .await;

    let err = gateway_for(&server).await.get_history(3).await.unwrap_err();
    assert!(matches!(err, AppError::Server { status: 500, .. }));
    assert_eq!(err.user_message("Failed to load price history"), "Erreur base de donnees");
}

#[tokio::test]
async fn test_history_server_error_without_body_falls_back() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/products/3/history"))
        .respond_with(ResponseTemplate::new(502).set_body_string("<html>Bad Gateway</html>"))
        .mount(&server)
        .await;

    let err = gateway_for(&server).await.get_history(3).await.unwrap_err();
    assert!(err.is_transport());
    assert_eq!(
        err.user_message("Failed to load price history"),
        "Failed to load price history"
    );
}

#[tokio::test]
async fn test_history_payload() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/products/3/history"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "product": {"name": "Romance Dawn Display", "set_code": "OP-01", "site_name": "Cardmarket"},
            "history": [
                {"checked_at": "2024-05-01T08:00:00", "price": 120.0, "in_stock": 1},
                {"checked_at": "2024-05-02T08:00:00", "price": null, "in_stock": 0}
            ]
        })))
        .mount(&server)
        .await;

    let history = gateway_for(&server).await.get_history(3).await.unwrap();
    assert_eq!(history.product.name, "Romance Dawn Display");
    assert_eq!(history.history.len(), 2);
    assert_eq!(history.latest().map(|p| p.in_stock), Some(false));
}

#[tokio::test]
async fn test_server_error_on_listing_is_transport() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/products"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({"error": "database locked"})))
        .mount(&server)
        .await;

    let err = gateway_for(&server)
        .await
        .list_offers(&QueryDescriptor::default())
        .await
        .unwrap_err();
    assert!(err.is_transport());
    assert!(err.to_string().contains("database locked"));
}

#[tokio::test]
async fn test_malformed_body_is_transport() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/sets"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let err = gateway_for(&server).await.list_sets().await.unwrap_err();
    assert!(err.is_transport());
}

#[tokio::test]
async fn test_unreachable_backend_is_transport() {
    let gateway = HttpGateway::with_client(Client::new(), "http://127.0.0.1:9").unwrap();
    let err = gateway.health().await.unwrap_err();
    assert!(err.is_transport());
}

#[tokio::test]
async fn test_health() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok", "version": "1.4.0"})))
        .mount(&server)
        .await;

    let health = gateway_for(&server).await.health().await.unwrap();
    assert_eq!(health.status, "ok");
    assert_eq!(health.version.as_deref(), Some("1.4.0"));
}
