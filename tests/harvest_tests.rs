//! Integration tests for the harvester
//!
//! These tests use wiremock to stand in for a storefront and drive the full
//! index → leaf → page → row cycle end-to-end.

use async_trait::async_trait;
use shelf_sweep::config::Config;
use shelf_sweep::crawler::{Coordinator, Expect, FetchOutcome, Sleeper, Strategy, Transport};
use shelf_sweep::extract::{ExtractionPipeline, ExtractionSource};
use shelf_sweep::output::CsvSink;
use shelf_sweep::sitemap::{SitemapTraversal, MAX_NESTED_DEPTH};
use shelf_sweep::HarvestError;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Sleeper that records requested delays and returns immediately
#[derive(Default)]
struct RecordingSleeper {
    delays: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    fn delays(&self) -> Vec<Duration> {
        self.delays.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.delays.lock().unwrap().push(duration);
    }
}

/// Creates a test configuration pointed at the mock server
fn create_test_config(base_url: &str) -> Config {
    let mut config = Config::default();
    config.site.base_url = base_url.to_string();
    config.transport.max_attempts = 3;
    config.transport.backoff_base_ms = 10;
    config.transport.backoff_cap_ms = 1000;
    config.transport.jitter_ms = 0;
    config.transport.timeout_secs = 5;
    config.transport.requests_per_second = 1000;
    config
}

fn test_transport(config: &Config, sleeper: Arc<dyn Sleeper>) -> Transport {
    Transport::from_config(&config.transport)
        .expect("Failed to build transport")
        .with_sleeper(sleeper)
}

fn sitemap_index(base: &str, leaves: &[&str]) -> String {
    let entries: String = leaves
        .iter()
        .map(|leaf| format!("<sitemap><loc>{}{}</loc></sitemap>", base, leaf))
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><sitemapindex xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">{}</sitemapindex>"#,
        entries
    )
}

fn urlset(base: &str, pages: &[&str]) -> String {
    let entries: String = pages
        .iter()
        .map(|page| format!("<url><loc>{}{}</loc></url>", base, page))
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">{}</urlset>"#,
        entries
    )
}

fn product_json(id: u64, variants: usize) -> String {
    let variants: Vec<String> = (0..variants)
        .map(|i| {
            format!(
                r#"{{"id": {}, "title": "V{}", "sku": "SKU-{}-{}", "option1": "Size {}", "price": "10.00", "available": true}}"#,
                id * 100 + i as u64,
                i,
                id,
                i,
                i
            )
        })
        .collect();
    format!(
        r#"{{"product": {{"id": {}, "title": "Product {}", "vendor": "Acme", "product_type": "Things",
            "handle": "p{}", "options": [{{"name": "Size"}}], "image": {{"src": "/files/p{}.jpg"}},
            "variants": [{}]}}}}"#,
        id,
        id,
        id,
        id,
        variants.join(",")
    )
}

async fn mount_xml(server: &MockServer, route: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

async fn mount_product(server: &MockServer, handle: &str, id: u64, variants: usize) {
    Mock::given(method("GET"))
        .and(path(format!("/products/{}.json", handle)))
        .respond_with(ResponseTemplate::new(200).set_body_string(product_json(id, variants)))
        .mount(server)
        .await;
}

fn read_rows(sink: CsvSink<Vec<u8>>) -> Vec<Vec<String>> {
    let bytes = sink.into_inner().expect("Failed to recover sink buffer");
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(bytes.as_slice());
    reader
        .records()
        .map(|r| r.expect("Invalid CSV row").iter().map(String::from).collect())
        .collect()
}

async fn count_requests(server: &MockServer, route: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path() == route)
        .count()
}

#[tokio::test]
async fn test_partition_fetches_only_owned_leaves() {
    let server = MockServer::start().await;
    let base = server.uri();

    let leaves = [
        "/sitemap_0.xml",
        "/sitemap_1.xml",
        "/sitemap_2.xml",
        "/sitemap_3.xml",
        "/sitemap_4.xml",
    ];
    mount_xml(&server, "/sitemap.xml", sitemap_index(&base, &leaves)).await;

    for (i, leaf) in leaves.iter().enumerate() {
        let expected = if i == 2 || i == 3 { 1 } else { 0 };
        Mock::given(method("GET"))
            .and(path(*leaf))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(urlset(&base, &[&format!("/products/item-{}", i)])),
            )
            .expect(expected)
            .mount(&server)
            .await;
    }

    mount_product(&server, "item-2", 2, 1).await;
    mount_product(&server, "item-3", 3, 2).await;

    let mut config = create_test_config(&base);
    config.partition.offset = 2;
    config.partition.count = 2;

    let transport = test_transport(&config, Arc::new(RecordingSleeper::default()));
    let coordinator = Coordinator::with_transport(config, transport).expect("Failed to create coordinator");

    let mut sink = CsvSink::new(Vec::new()).unwrap();
    let stats = coordinator
        .run_with_sink(&mut sink, CancellationToken::new())
        .await
        .expect("Run failed");

    assert_eq!(stats.sitemaps_in_index, 5);
    assert_eq!(stats.sitemaps_in_partition, 2);
    assert_eq!(stats.sitemaps_processed, 2);
    assert_eq!(stats.products_emitted, 2);
    assert_eq!(stats.rows_written, 3);

    let rows = read_rows(sink);
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0][0], "2");
    assert_eq!(rows[1][0], "3");
    assert_eq!(rows[2][0], "3");
}

#[tokio::test]
async fn test_soft_block_then_success_retries_with_backoff() {
    let blocked = MockServer::start().await;
    let clean = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/products/lamp.json"))
        .respond_with(ResponseTemplate::new(503).set_body_string("Service Unavailable"))
        .up_to_n_times(1)
        .mount(&blocked)
        .await;
    mount_product(&blocked, "lamp", 7, 2).await;
    mount_product(&clean, "lamp", 7, 2).await;

    let blocked_config = create_test_config(&blocked.uri());
    let sleeper = Arc::new(RecordingSleeper::default());
    let blocked_transport = test_transport(&blocked_config, sleeper.clone());

    let clean_config = create_test_config(&clean.uri());
    let clean_transport = test_transport(&clean_config, Arc::new(RecordingSleeper::default()));

    let retried = ExtractionPipeline::new(&blocked_transport, url::Url::parse(&blocked.uri()).unwrap())
        .extract(&format!("{}/products/lamp", blocked.uri()))
        .await
        .expect("Extraction after retry failed");

    let immediate = ExtractionPipeline::new(&clean_transport, url::Url::parse(&clean.uri()).unwrap())
        .extract(&format!("{}/products/lamp", clean.uri()))
        .await
        .expect("Immediate extraction failed");

    // Image paths resolve against different servers; everything else matches
    let mut retried_record = retried.record.clone();
    retried_record.featured_image = immediate.record.featured_image.clone();
    assert_eq!(retried_record, immediate.record);
    assert_eq!(retried.source, ExtractionSource::Endpoint);

    assert_eq!(count_requests(&blocked, "/products/lamp.json").await, 2);
    assert_eq!(count_requests(&blocked, "/products/lamp").await, 0);

    let policy = shelf_sweep::crawler::BackoffPolicy::from_config(&blocked_config.transport);
    assert_eq!(sleeper.delays(), vec![policy.delay_with_jitter(1, Duration::ZERO)]);
    assert_eq!(sleeper.delays(), vec![Duration::from_millis(20)]);

    // The escalated strategy worked and is now preferred
    assert!(blocked_transport.prefers_browser());
}

#[tokio::test]
async fn test_endpoint_success_skips_html_fetch() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_product(&server, "mug", 1, 1).await;
    Mock::given(method("GET"))
        .and(path("/products/mug"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
        .expect(0)
        .mount(&server)
        .await;

    let config = create_test_config(&base);
    let transport = test_transport(&config, Arc::new(RecordingSleeper::default()));
    let pipeline = ExtractionPipeline::new(&transport, url::Url::parse(&base).unwrap());

    let extracted = pipeline
        .extract(&format!("{}/products/mug", base))
        .await
        .expect("Extraction failed");

    assert_eq!(extracted.source, ExtractionSource::Endpoint);
    assert_eq!(extracted.record.title, "Product 1");
    assert_eq!(extracted.record.featured_image, format!("{}/files/p1.jpg", base));
}

#[tokio::test]
async fn test_script_fallback_when_endpoint_missing() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/products/scarf.json"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/products/scarf"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<html><head><script>
                var product = {"id": 55, "title": "Scarf", "vendor": "Knit Co", "type": "Accessories",
                  "options": ["Color"], "featured_image": "//cdn.example.com/scarf.jpg",
                  "variants": [{"id": 551, "option1": "Red", "price": 2500, "available": true},
                               {"id": 552, "option1": "Blue", "price": 2500, "available": false}]};
            </script></head><body>Scarf</body></html>"#,
        ))
        .expect(1)
        .mount(&server)
        .await;

    let config = create_test_config(&base);
    let transport = test_transport(&config, Arc::new(RecordingSleeper::default()));
    let pipeline = ExtractionPipeline::new(&transport, url::Url::parse(&base).unwrap());

    let extracted = pipeline
        .extract(&format!("{}/products/scarf", base))
        .await
        .expect("Extraction failed");

    assert_eq!(extracted.source, ExtractionSource::Script);
    assert_eq!(extracted.record.handle, "scarf");
    assert_eq!(extracted.record.product_type, "Accessories");
    assert_eq!(extracted.record.featured_image, "https://cdn.example.com/scarf.jpg");
    assert_eq!(extracted.record.variants.len(), 2);
    assert_eq!(extracted.record.variants[1].price, "2500");

    // 404 is definitive: no retry on the endpoint
    assert_eq!(count_requests(&server, "/products/scarf.json").await, 1);
}

#[tokio::test]
async fn test_json_ld_fallback() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/products/kettle.json"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/products/kettle"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<html><head><script type="application/ld+json">
                {"@context": "https://schema.org", "@type": "Product", "name": "Kettle", "sku": "KT-1",
                 "brand": {"name": "Boil"}, "image": "/img/kettle.jpg",
                 "offers": {"price": "49.00", "availability": "https://schema.org/InStock"}}
            </script></head></html>"#,
        ))
        .mount(&server)
        .await;

    let config = create_test_config(&base);
    let transport = test_transport(&config, Arc::new(RecordingSleeper::default()));
    let pipeline = ExtractionPipeline::new(&transport, url::Url::parse(&base).unwrap());

    let extracted = pipeline
        .extract(&format!("{}/products/kettle", base))
        .await
        .expect("Extraction failed");

    assert_eq!(extracted.source, ExtractionSource::JsonLd);
    assert_eq!(extracted.record.id, "KT-1");
    assert_eq!(extracted.record.vendor, "Boil");
    assert_eq!(extracted.record.featured_image, format!("{}/img/kettle.jpg", base));
    assert_eq!(extracted.record.variants.len(), 1);
    assert_eq!(extracted.record.variants[0].price, "49.00");
    assert!(extracted.record.variants[0].available);
}

#[tokio::test]
async fn test_duplicate_pages_written_once() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_xml(&server, "/sitemap.xml", sitemap_index(&base, &["/a.xml", "/b.xml"])).await;
    mount_xml(&server, "/a.xml", urlset(&base, &["/products/hat", "/products/hat"])).await;
    mount_xml(&server, "/b.xml", urlset(&base, &["/products/hat", "/products/belt"])).await;
    mount_product(&server, "hat", 1, 3).await;
    mount_product(&server, "belt", 2, 1).await;

    let config = create_test_config(&base);
    let transport = test_transport(&config, Arc::new(RecordingSleeper::default()));
    let coordinator = Coordinator::with_transport(config, transport).unwrap();

    let mut sink = CsvSink::new(Vec::new()).unwrap();
    let stats = coordinator
        .run_with_sink(&mut sink, CancellationToken::new())
        .await
        .expect("Run failed");

    assert_eq!(stats.products_emitted, 2);
    assert_eq!(stats.pages_skipped_seen, 2);
    assert_eq!(count_requests(&server, "/products/hat.json").await, 1);

    let rows = read_rows(sink);
    assert_eq!(rows.len(), 4);
    // Product-level fields repeat on every variant row
    for row in &rows[..3] {
        assert_eq!(&row[0..5], &["1", "Product 1", "Acme", "Things", "p1"]);
        assert_eq!(row[9], "Size");
    }
    assert_eq!(rows[0][17], format!("{}/products/hat?variant=100", base));
    assert_eq!(rows[3][0], "2");
}

#[tokio::test]
async fn test_unreachable_index_is_fatal() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/sitemap.xml"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let config = create_test_config(&server.uri());
    let transport = test_transport(&config, Arc::new(RecordingSleeper::default()));
    let coordinator = Coordinator::with_transport(config, transport).unwrap();

    let mut sink = CsvSink::new(Vec::new()).unwrap();
    let result = coordinator.run_with_sink(&mut sink, CancellationToken::new()).await;

    assert!(matches!(result, Err(HarvestError::IndexUnavailable { .. })));
}

#[tokio::test]
async fn test_failing_leaf_is_skipped() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_xml(&server, "/sitemap.xml", sitemap_index(&base, &["/broken.xml", "/good.xml"])).await;
    mount_xml(&server, "/broken.xml", "<urlset><url><loc>unclosed".to_string()).await;
    mount_xml(&server, "/good.xml", urlset(&base, &["/products/sock", "/about-us"])).await;
    mount_product(&server, "sock", 9, 2).await;

    let config = create_test_config(&base);
    let transport = test_transport(&config, Arc::new(RecordingSleeper::default()));
    let coordinator = Coordinator::with_transport(config, transport).unwrap();

    let mut sink = CsvSink::new(Vec::new()).unwrap();
    let stats = coordinator
        .run_with_sink(&mut sink, CancellationToken::new())
        .await
        .expect("Run failed");

    assert_eq!(stats.sitemaps_failed, 1);
    assert_eq!(stats.sitemaps_processed, 1);
    // The non-product URL is filtered out before any fetch
    assert_eq!(stats.pages_listed, 1);
    assert_eq!(count_requests(&server, "/about-us.json").await, 0);
    assert_eq!(read_rows(sink).len(), 2);
}

#[tokio::test]
async fn test_concurrent_workers_keep_sitemap_order() {
    let server = MockServer::start().await;
    let base = server.uri();

    let pages: Vec<String> = (1..=6).map(|i| format!("/products/item-{}", i)).collect();
    let page_refs: Vec<&str> = pages.iter().map(String::as_str).collect();
    mount_xml(&server, "/sitemap.xml", sitemap_index(&base, &["/leaf.xml"])).await;
    mount_xml(&server, "/leaf.xml", urlset(&base, &page_refs)).await;

    for i in 1..=6u64 {
        // Earlier pages answer slower so completion order differs from sitemap order
        Mock::given(method("GET"))
            .and(path(format!("/products/item-{}.json", i)))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(product_json(i, 1))
                    .set_delay(Duration::from_millis((7 - i) * 20)),
            )
            .mount(&server)
            .await;
    }

    let mut config = create_test_config(&base);
    config.crawler.workers = 4;
    let transport = test_transport(&config, Arc::new(RecordingSleeper::default()));
    let coordinator = Coordinator::with_transport(config, transport).unwrap();

    let mut sink = CsvSink::new(Vec::new()).unwrap();
    coordinator
        .run_with_sink(&mut sink, CancellationToken::new())
        .await
        .expect("Run failed");

    let ids: Vec<String> = read_rows(sink).into_iter().map(|row| row[0].clone()).collect();
    assert_eq!(ids, vec!["1", "2", "3", "4", "5", "6"]);
}

#[tokio::test]
async fn test_cancelled_run_returns_partial_stats() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_xml(&server, "/sitemap.xml", sitemap_index(&base, &["/leaf.xml"])).await;

    let config = create_test_config(&base);
    let transport = test_transport(&config, Arc::new(RecordingSleeper::default()));
    let coordinator = Coordinator::with_transport(config, transport).unwrap();

    let cancel = CancellationToken::new();
    cancel.cancel();

    let mut sink = CsvSink::new(Vec::new()).unwrap();
    let stats = coordinator
        .run_with_sink(&mut sink, cancel)
        .await
        .expect("Cancelled run should not fail");

    assert!(stats.cancelled);
    assert_eq!(stats.products_emitted, 0);
    assert_eq!(count_requests(&server, "/leaf.xml").await, 0);
    assert!(read_rows(sink).is_empty());
}

#[tokio::test]
async fn test_run_writes_chunk_file_named_by_offset() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_xml(&server, "/sitemap.xml", sitemap_index(&base, &["/a.xml", "/b.xml"])).await;
    mount_xml(&server, "/b.xml", urlset(&base, &["/products/cup"])).await;
    mount_product(&server, "cup", 3, 2).await;

    let dir = tempfile::tempdir().unwrap();
    let mut config = create_test_config(&base);
    config.partition.offset = 1;
    config.output.directory = dir.path().to_path_buf();

    let transport = test_transport(&config, Arc::new(RecordingSleeper::default()));
    let coordinator = Coordinator::with_transport(config, transport).unwrap();
    let stats = coordinator.run(CancellationToken::new()).await.expect("Run failed");
    assert_eq!(stats.rows_written, 2);

    let content = std::fs::read_to_string(dir.path().join("products_chunk_1.csv")).unwrap();
    let mut lines = content.lines();
    assert_eq!(
        lines.next(),
        Some(
            "product_id,product_title,vendor,type,handle,variant_id,variant_title,sku,barcode,\
             option_1_name,option_1_value,option_2_name,option_2_value,option_3_name,option_3_value,\
             variant_price,available,variant_url,image_url"
        )
    );
    assert_eq!(lines.count(), 2);
}

#[tokio::test]
async fn test_crawl_rejects_missing_base_url() {
    let result = shelf_sweep::crawler::crawl(Config::default(), CancellationToken::new()).await;
    assert!(matches!(result, Err(HarvestError::Config(_))));
}

#[tokio::test]
async fn test_persistent_soft_block_stops_at_max_attempts() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/sitemap.xml"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let config = create_test_config(&server.uri());
    let sleeper = Arc::new(RecordingSleeper::default());
    let transport = test_transport(&config, sleeper.clone());

    let result = transport
        .fetch(&format!("{}/sitemap.xml", server.uri()), Expect::Xml)
        .await;

    assert_eq!(result.attempts, config.transport.max_attempts);
    assert!(matches!(result.outcome, FetchOutcome::SoftBlocked(_)));
    assert_eq!(count_requests(&server, "/sitemap.xml").await, 3);
    assert_eq!(
        sleeper.delays(),
        vec![Duration::from_millis(20), Duration::from_millis(40)]
    );
    assert!(!transport.prefers_browser());
}

#[tokio::test]
async fn test_browser_preference_carries_to_next_fetch() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/sitemap_a.xml"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_xml(&server, "/sitemap_a.xml", urlset(&base, &["/products/a"])).await;
    mount_xml(&server, "/sitemap_b.xml", urlset(&base, &["/products/b"])).await;

    let config = create_test_config(&base);
    let sleeper = Arc::new(RecordingSleeper::default());
    let transport = test_transport(&config, sleeper.clone());

    let first = transport.fetch(&format!("{}/sitemap_a.xml", base), Expect::Xml).await;
    assert!(first.is_ok());
    assert_eq!(first.attempts, 2);
    assert_eq!(first.strategy, Strategy::Browser);

    let second = transport.fetch(&format!("{}/sitemap_b.xml", base), Expect::Xml).await;
    assert!(second.is_ok());
    assert_eq!(second.attempts, 1);
    assert_eq!(second.strategy, Strategy::Browser);
    assert_eq!(sleeper.delays().len(), 1);
}

#[tokio::test]
async fn test_vendor_header_accepted_on_only_attempt() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/sitemap.xml"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("server", "cloudflare")
                .insert_header("cf-ray", "8a1b2c3d4e5f-AMS")
                .set_body_string(sitemap_index(&base, &["/sitemap_1.xml"])),
        )
        .mount(&server)
        .await;

    let mut config = create_test_config(&base);
    config.transport.max_attempts = 1;
    config.transport.escalate = true;
    let transport = test_transport(&config, Arc::new(RecordingSleeper::default()));

    let result = transport.fetch(&format!("{}/sitemap.xml", base), Expect::Xml).await;
    assert!(result.is_ok());
    assert_eq!(result.attempts, 1);

    let leaves = SitemapTraversal::new(&transport)
        .load_index(&format!("{}/sitemap.xml", base))
        .await
        .expect("Index behind a vendor proxy should load");
    assert_eq!(leaves, vec![format!("{}/sitemap_1.xml", base)]);
}

#[tokio::test]
async fn test_vendor_header_escalates_when_attempts_remain() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/sitemap.xml"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("server", "cloudflare")
                .set_body_string(urlset(&base, &["/products/a"])),
        )
        .mount(&server)
        .await;

    let config = create_test_config(&base);
    let transport = test_transport(&config, Arc::new(RecordingSleeper::default()));

    let result = transport.fetch(&format!("{}/sitemap.xml", base), Expect::Xml).await;
    assert!(result.is_ok());
    assert_eq!(result.attempts, 2);
    assert_eq!(result.strategy, Strategy::Browser);
}

#[tokio::test]
async fn test_nested_index_descends_in_order_and_skips_failing_child() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_xml(
        &server,
        "/nested.xml",
        sitemap_index(&base, &["/part_a.xml", "/missing.xml", "/part_b.xml"]),
    )
    .await;
    mount_xml(&server, "/part_a.xml", urlset(&base, &["/products/a1", "/products/a2"])).await;
    mount_xml(&server, "/part_b.xml", urlset(&base, &["/products/b1"])).await;
    Mock::given(method("GET"))
        .and(path("/missing.xml"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let config = create_test_config(&base);
    let transport = test_transport(&config, Arc::new(RecordingSleeper::default()));

    let pages = SitemapTraversal::new(&transport)
        .load_leaf(&format!("{}/nested.xml", base), None, 0)
        .await
        .expect("Nested leaf failed");

    assert_eq!(
        pages,
        vec![
            format!("{}/products/a1", base),
            format!("{}/products/a2", base),
            format!("{}/products/b1", base),
        ]
    );
    assert_eq!(count_requests(&server, "/missing.xml").await, 1);
}

#[tokio::test]
async fn test_nested_index_depth_is_bounded() {
    let server = MockServer::start().await;
    let base = server.uri();

    assert_eq!(MAX_NESTED_DEPTH, 3);
    mount_xml(&server, "/depth_0.xml", sitemap_index(&base, &["/depth_1.xml"])).await;
    mount_xml(&server, "/depth_1.xml", sitemap_index(&base, &["/depth_2.xml"])).await;
    mount_xml(
        &server,
        "/depth_2.xml",
        sitemap_index(&base, &["/depth_3.xml", "/shallow.xml"]),
    )
    .await;
    mount_xml(&server, "/depth_3.xml", sitemap_index(&base, &["/depth_4.xml"])).await;
    mount_xml(&server, "/shallow.xml", urlset(&base, &["/products/kept"])).await;
    Mock::given(method("GET"))
        .and(path("/depth_4.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(urlset(&base, &["/products/too-deep"])))
        .expect(0)
        .mount(&server)
        .await;

    let config = create_test_config(&base);
    let transport = test_transport(&config, Arc::new(RecordingSleeper::default()));

    let pages = SitemapTraversal::new(&transport)
        .load_leaf(&format!("{}/depth_0.xml", base), None, 0)
        .await
        .expect("Nested leaf failed");

    assert_eq!(pages, vec![format!("{}/products/kept", base)]);
    assert_eq!(count_requests(&server, "/depth_3.xml").await, 1);
}

#[tokio::test]
async fn test_unreachable_index_leaves_no_chunk_file() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/sitemap.xml"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let mut config = create_test_config(&server.uri());
    config.output.directory = dir.path().to_path_buf();

    let transport = test_transport(&config, Arc::new(RecordingSleeper::default()));
    let coordinator = Coordinator::with_transport(config, transport).unwrap();
    let result = coordinator.run(CancellationToken::new()).await;

    assert!(matches!(result, Err(HarvestError::IndexUnavailable { .. })));
    assert!(!dir.path().join("products_chunk_0.csv").exists());
}
