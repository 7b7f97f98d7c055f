//! End-to-end capture sessions driven by a scripted page driver

use base64::Engine;
use kodegen_tools_snapshot::asset_store::asset_path;
use kodegen_tools_snapshot::config::{CaptureJob, CaptureMode, InteractionPolicy};
use kodegen_tools_snapshot::interaction::{ActionKind, InteractionAction};
use kodegen_tools_snapshot::{CaptureError, CaptureSession};
use serde_json::json;
use std::collections::BTreeMap;
use tempfile::TempDir;

mod common;
use common::{FAKE_PNG, MockDriver, ScriptedPage, create_test_html, quick_job};

const START: &str = "https://example.com/";

fn actions_of(actions: &[InteractionAction], kind: ActionKind) -> Vec<&InteractionAction> {
    actions.iter().filter(|a| a.action == kind).collect()
}

/// Value of the first `attr="..."` whose value starts with `prefix`
fn attribute_starting_with<'a>(html: &'a str, attr: &str, prefix: &str) -> Option<&'a str> {
    let needle = format!(r#"{attr}="{prefix}"#);
    let start = html.find(&needle)? + attr.len() + 2;
    let end = html[start..].find('"')? + start;
    Some(&html[start..end])
}

#[tokio::test]
async fn static_capture_freezes_the_page() {
    let temp = TempDir::new().unwrap();
    let html = create_test_html(
        "",
        r#"<base href="https://example.com/"><script src="https://example.com/app.js"></script>"#,
        "<h1>Hello</h1><script>window.boot()</script>",
    );
    let driver = MockDriver::new().with_page(START, ScriptedPage::new(html));
    let job = quick_job(START, temp.path(), CaptureMode::Static);

    let report = CaptureSession::new(job, &driver).run().await.unwrap();

    assert_eq!(report.pages.len(), 1);
    let output = tokio::fs::read_to_string(temp.path().join("index_offline.html"))
        .await
        .unwrap();
    assert!(!output.contains("app.js"));
    assert!(!output.contains("window.boot"));
    assert!(!output.contains("<base"));
    assert!(output.contains("<title>Offline Snapshot</title>"));
    assert!(output.contains("<h1>Hello</h1>"));
    // Only the offline utility script and its keyword declaration survive
    assert_eq!(output.matches("<script").count(), 2);
    assert!(output.contains(r#"<script src="_offline/offline_utils.js"></script>"#));
    assert!(output.contains(
        r#"<script>window.__OFFLINE_THEME_KEYWORDS__ = ["dark","light","theme","mode","night","day"];</script><script src="_offline/offline_utils.js">"#
    ));
    assert!(!output.contains("fetch_patch.js"));

    assert!(temp.path().join("_offline/offline_utils.js").exists());
    assert!(!temp.path().join("_offline/fetch_patch.js").exists());
    assert_eq!(
        tokio::fs::read(temp.path().join("screenshot.png")).await.unwrap(),
        FAKE_PNG
    );
    let log: Vec<InteractionAction> = serde_json::from_str(
        &tokio::fs::read_to_string(temp.path().join("actions_log.json"))
            .await
            .unwrap(),
    )
    .unwrap();
    assert!(log.is_empty());
    assert!(report.single_file.is_none());
    assert_eq!(driver.scrolls(), 1);
}

#[tokio::test]
async fn stylesheet_is_stored_content_addressed_and_referenced() {
    let temp = TempDir::new().unwrap();
    let css_url = "https://cdn.example.com/a/style.css";
    let html = create_test_html(
        "Styled",
        &format!(r#"<link rel="stylesheet" href="{css_url}" integrity="sha384-abc" crossorigin="anonymous">"#),
        r#"<div style="color:red">x</div>"#,
    );
    let page = ScriptedPage::new(html).with_response(css_url, "text/css; charset=utf-8", b"body{margin:0}");
    let driver = MockDriver::new().with_page(START, page);

    let report = CaptureSession::new(quick_job(START, temp.path(), CaptureMode::Static), &driver)
        .run()
        .await
        .unwrap();

    let rel = asset_path(css_url, Some("text/css; charset=utf-8"));
    let (dir, file) = rel.split_once('/').unwrap();
    assert_eq!(dir, "assets");
    assert_eq!(file.len(), 16 + ".css".len());
    assert!(file.ends_with(".css"));
    assert!(file[..16].chars().all(|c| c.is_ascii_hexdigit()));

    assert_eq!(
        tokio::fs::read(temp.path().join(&rel)).await.unwrap(),
        b"body{margin:0}"
    );
    let output = tokio::fs::read_to_string(temp.path().join("index_offline.html"))
        .await
        .unwrap();
    assert!(output.contains(&format!(r#"href="{rel}""#)));
    assert!(!output.contains(css_url));
    assert!(!output.contains("integrity"));
    assert!(!output.contains("crossorigin"));
    assert_eq!(report.assets_written, 1);
}

#[tokio::test]
async fn interactive_capture_caches_api_responses() {
    let temp = TempDir::new().unwrap();
    let api_url = "https://example.com/api/data";
    let body = br#"{"items":[1,2,3]}"#;
    let html = create_test_html(
        "App",
        r#"<script src="https://example.com/static/app.js"></script>"#,
        r#"<div id="root"></div>"#,
    );
    let page = ScriptedPage::new(html)
        .with_response("https://example.com/static/app.js", "application/javascript", b"render()")
        .with_response(api_url, "application/json", body);
    let driver = MockDriver::new().with_page(START, page);

    let report = CaptureSession::new(quick_job(START, temp.path(), CaptureMode::Interactive), &driver)
        .run()
        .await
        .unwrap();
    assert_eq!(report.api_responses_cached, 1);

    let manifest: BTreeMap<String, String> = serde_json::from_str(
        &tokio::fs::read_to_string(temp.path().join("_offline/api_manifest.json"))
            .await
            .unwrap(),
    )
    .unwrap();
    let local = manifest.get(api_url).expect("API URL in manifest");
    assert!(local.ends_with(".json"));
    assert_eq!(tokio::fs::read(temp.path().join(local)).await.unwrap(), body);

    let output = tokio::fs::read_to_string(temp.path().join("index_offline.html"))
        .await
        .unwrap();
    let script_rel = asset_path("https://example.com/static/app.js", Some("application/javascript"));
    assert!(output.contains(&format!(r#"<script src="{script_rel}"></script>"#)));
    assert!(output.contains("window.__OFFLINE_API_MANIFEST__ = '_offline/api_manifest.json';"));
    assert!(output.contains(r#"<script src="_offline/fetch_patch.js"></script>"#));
    // Manifest declaration precedes the patch that reads it
    assert!(
        output.find("__OFFLINE_API_MANIFEST__").unwrap()
            < output.find("_offline/fetch_patch.js").unwrap()
    );

    let patch = tokio::fs::read_to_string(temp.path().join("_offline/fetch_patch.js"))
        .await
        .unwrap();
    assert!(patch.contains("__OFFLINE_API_MANIFEST__"));
}

#[tokio::test]
async fn in_page_anchor_is_clicked_not_enqueued() {
    let temp = TempDir::new().unwrap();
    let page = ScriptedPage::new(create_test_html("Doc", "", r##"<a class="jump" href="#section2">Next</a>"##))
        .with_candidates(json!([
            { "selector": "a.jump", "reason": "generic", "tag": "a", "text": "Next", "href": "#section2" }
        ]));
    let driver = MockDriver::new().with_page(START, page);

    let report = CaptureSession::new(quick_job(START, temp.path(), CaptureMode::Static), &driver)
        .run()
        .await
        .unwrap();

    assert_eq!(driver.anchor_clicks(), vec!["#section2".to_string()]);
    let anchors = actions_of(&report.actions, ActionKind::AnchorClick);
    assert_eq!(anchors.len(), 1);
    assert_eq!(anchors[0].href.as_deref(), Some("#section2"));
    assert!(actions_of(&report.actions, ActionKind::QueueSubpage).is_empty());
    assert_eq!(report.pages.len(), 1);
    assert!(report.pages[0].discovered.is_empty());
    assert_eq!(driver.navigations(), vec![START.to_string()]);
}

#[tokio::test]
async fn disabled_anchor_clicks_are_logged_as_skipped() {
    let temp = TempDir::new().unwrap();
    let page = ScriptedPage::new(create_test_html("Doc", "", "")).with_candidates(json!([
        { "selector": "a", "tag": "a", "href": "#top" }
    ]));
    let driver = MockDriver::new().with_page(START, page);
    let policy = InteractionPolicy::from_override_str(r#"{"anchor_click": false}"#);
    let job = CaptureJob::builder()
        .output_dir(temp.path().to_path_buf())
        .start_url(START)
        .wait_idle_ms(0)
        .scroll_passes(1)
        .policy(policy)
        .build()
        .unwrap();

    let report = CaptureSession::new(job, &driver).run().await.unwrap();

    assert!(driver.anchor_clicks().is_empty());
    assert_eq!(actions_of(&report.actions, ActionKind::SkipAnchor).len(), 1);
}

#[tokio::test]
async fn missing_anchor_is_logged_as_failed_and_costs_no_click() {
    let temp = TempDir::new().unwrap();
    let page = ScriptedPage::new(create_test_html("Doc", "", r#"<button class="more">More</button>"#))
        .with_selector("button.more")
        .with_candidates(json!([
            { "selector": "a.ghost", "tag": "a", "href": "#missing" },
            { "selector": "button.more", "reason": "generic", "tag": "button" }
        ]));
    let driver = MockDriver::new().with_page(START, page);
    let job = CaptureJob::builder()
        .output_dir(temp.path().to_path_buf())
        .start_url(START)
        .wait_idle_ms(0)
        .scroll_passes(1)
        .policy(InteractionPolicy::from_override_str("max_clicks_per_page: 1"))
        .build()
        .unwrap();

    let report = CaptureSession::new(job, &driver).run().await.unwrap();

    assert!(driver.anchor_clicks().is_empty());
    let anchors = actions_of(&report.actions, ActionKind::AnchorClick);
    assert_eq!(anchors.len(), 1);
    assert_eq!(anchors[0].error.as_deref(), Some("anchor not found"));
    // The failed anchor left the single click for the button
    assert_eq!(driver.clicks(), vec!["button.more".to_string()]);
    assert_eq!(report.failed_actions(), 1);
}

#[tokio::test]
async fn padded_anchor_href_is_matched_as_written() {
    let temp = TempDir::new().unwrap();
    let page = ScriptedPage::new(create_test_html("Doc", "", r##"<a href=" #intro ">Intro</a>"##))
        .with_candidates(json!([
            { "selector": "a", "tag": "a", "href": " #intro " }
        ]));
    let driver = MockDriver::new().with_page(START, page);

    let report = CaptureSession::new(quick_job(START, temp.path(), CaptureMode::Static), &driver)
        .run()
        .await
        .unwrap();

    assert_eq!(driver.anchor_clicks(), vec![" #intro ".to_string()]);
    assert_eq!(report.failed_actions(), 0);
}

#[tokio::test]
async fn overridden_theme_keywords_reach_the_saved_page() {
    let temp = TempDir::new().unwrap();
    let driver = MockDriver::new().with_page(START, ScriptedPage::new(create_test_html("Doc", "", "")));
    let job = CaptureJob::builder()
        .output_dir(temp.path().to_path_buf())
        .start_url(START)
        .wait_idle_ms(0)
        .scroll_passes(1)
        .policy(InteractionPolicy::from_override_str("theme_toggle_keywords: [sombre, nuit]"))
        .build()
        .unwrap();

    CaptureSession::new(job, &driver).run().await.unwrap();

    let output = tokio::fs::read_to_string(temp.path().join("index_offline.html"))
        .await
        .unwrap();
    assert!(output.contains(r#"window.__OFFLINE_THEME_KEYWORDS__ = ["sombre","nuit"];"#));
    assert_eq!(output.matches("__OFFLINE_THEME_KEYWORDS__").count(), 1);
}

fn linked_site() -> MockDriver {
    let home = ScriptedPage::new(create_test_html("Home", "", r#"<a href="/about">About</a>"#))
        .with_candidates(json!([
            { "selector": "a", "tag": "a", "href": "/about" },
            { "selector": "a", "tag": "a", "href": "https://other.org/page" },
            { "selector": "a", "tag": "a", "href": "https://blog.example.com/post#comments" }
        ]));
    let about = ScriptedPage::new(create_test_html("About", "", "<p>about</p>"));
    let blog = ScriptedPage::new(create_test_html("Post", "", "<p>post</p>"));
    MockDriver::new()
        .with_page(START, home)
        .with_page("https://example.com/about", about)
        .with_page("https://blog.example.com/post", blog)
}

#[tokio::test]
async fn same_site_links_become_subpages() {
    let temp = TempDir::new().unwrap();
    let driver = linked_site();

    let report = CaptureSession::new(quick_job(START, temp.path(), CaptureMode::Static), &driver)
        .run()
        .await
        .unwrap();

    assert_eq!(report.pages.len(), 3);
    assert_eq!(
        report.pages[0].discovered,
        vec![
            "https://example.com/about".to_string(),
            "https://blog.example.com/post".to_string()
        ]
    );
    assert!(temp.path().join("index_offline.html").exists());
    assert!(temp.path().join("page_2.html").exists());
    assert!(temp.path().join("page_3.html").exists());
    assert_eq!(report.pages[1].url, "https://example.com/about");

    let external = actions_of(&report.actions, ActionKind::SkipExternal);
    assert_eq!(external.len(), 1);
    assert_eq!(external[0].href.as_deref(), Some("https://other.org/page"));
    assert!(!driver.navigations().iter().any(|u| u.contains("other.org")));
}

#[tokio::test]
async fn page_cap_bounds_the_crawl() {
    let temp = TempDir::new().unwrap();
    let driver = linked_site();
    let job = CaptureJob::builder()
        .output_dir(temp.path().to_path_buf())
        .start_url(START)
        .wait_idle_ms(0)
        .scroll_passes(1)
        .max_pages(2)
        .build()
        .unwrap();

    let report = CaptureSession::new(job, &driver).run().await.unwrap();

    assert_eq!(report.pages.len(), 2);
    assert_eq!(driver.navigations().len(), 2);
    assert!(!temp.path().join("page_3.html").exists());
}

#[tokio::test]
async fn subpages_are_not_followed_when_disabled() {
    let temp = TempDir::new().unwrap();
    let driver = linked_site();
    let job = CaptureJob::builder()
        .output_dir(temp.path().to_path_buf())
        .start_url(START)
        .wait_idle_ms(0)
        .scroll_passes(1)
        .follow_subpages(false)
        .build()
        .unwrap();

    let report = CaptureSession::new(job, &driver).run().await.unwrap();

    assert_eq!(report.pages.len(), 1);
    assert!(actions_of(&report.actions, ActionKind::QueueSubpage).is_empty());
}

#[tokio::test]
async fn forced_selectors_are_clicked_when_present() {
    let temp = TempDir::new().unwrap();
    let page = ScriptedPage::new(create_test_html("Doc", "", r#"<button id="theme-toggle">Dark</button>"#))
        .with_selector("#theme-toggle")
        .with_selector("button.open-modal")
        .with_candidates(json!([
            { "selector": "button.open-modal", "reason": "modal-guess", "tag": "button" },
            { "selector": "div.gone", "reason": "generic", "tag": "div" }
        ]));
    let driver = MockDriver::new().with_page(START, page);
    let policy = InteractionPolicy::from_override_str(
        r##"{"selectors_force_click": ["#theme-toggle", "#missing"]}"##,
    );
    let job = CaptureJob::builder()
        .output_dir(temp.path().to_path_buf())
        .start_url(START)
        .wait_idle_ms(0)
        .scroll_passes(1)
        .policy(policy)
        .build()
        .unwrap();

    let report = CaptureSession::new(job, &driver).run().await.unwrap();

    assert_eq!(
        driver.clicks(),
        vec!["#theme-toggle".to_string(), "button.open-modal".to_string()]
    );
    let forced = actions_of(&report.actions, ActionKind::ForcedClick);
    assert_eq!(forced.len(), 1);
    assert_eq!(forced[0].selector.as_deref(), Some("#theme-toggle"));
    assert_eq!(actions_of(&report.actions, ActionKind::Click).len(), 1);
    assert_eq!(report.failed_actions(), 0);
}

#[tokio::test]
async fn forced_clicks_share_the_page_budget() {
    let temp = TempDir::new().unwrap();
    let page = ScriptedPage::new(create_test_html("Doc", "", ""))
        .with_selector("#cookie")
        .with_selector("#tab")
        .with_selector("button.a")
        .with_selector("button.b")
        .with_selector("button.c")
        .with_candidates(json!([
            { "selector": "button.a", "reason": "generic", "tag": "button" },
            { "selector": "button.b", "reason": "generic", "tag": "button" },
            { "selector": "button.c", "reason": "generic", "tag": "button" }
        ]));
    let driver = MockDriver::new().with_page(START, page);
    let policy = InteractionPolicy::from_override_str(
        "max_clicks_per_page: 3\nselectors_force_click: ['#cookie', '#tab']\n",
    );
    let job = CaptureJob::builder()
        .output_dir(temp.path().to_path_buf())
        .start_url(START)
        .wait_idle_ms(0)
        .scroll_passes(1)
        .policy(policy)
        .build()
        .unwrap();

    let report = CaptureSession::new(job, &driver).run().await.unwrap();

    assert_eq!(
        driver.clicks(),
        vec!["#cookie".to_string(), "#tab".to_string(), "button.a".to_string()]
    );
    assert_eq!(actions_of(&report.actions, ActionKind::ForcedClick).len(), 2);
    assert_eq!(actions_of(&report.actions, ActionKind::Click).len(), 1);
}

#[tokio::test]
async fn discovered_clicks_stop_at_the_budget() {
    let temp = TempDir::new().unwrap();
    let candidates: Vec<_> = (0..6)
        .map(|i| json!({ "selector": format!("button.b{i}"), "reason": "generic", "tag": "button" }))
        .collect();
    let page = (0..6)
        .fold(ScriptedPage::new(create_test_html("Doc", "", "")), |page, i| {
            page.with_selector(&format!("button.b{i}"))
        })
        .with_candidates(json!(candidates));
    let driver = MockDriver::new().with_page(START, page);
    let job = CaptureJob::builder()
        .output_dir(temp.path().to_path_buf())
        .start_url(START)
        .wait_idle_ms(0)
        .scroll_passes(1)
        .policy(InteractionPolicy::from_override_str(r#"{"max_clicks_per_page": 4}"#))
        .build()
        .unwrap();

    let report = CaptureSession::new(job, &driver).run().await.unwrap();

    assert_eq!(driver.clicks().len(), 4);
    assert_eq!(driver.clicks().last().map(String::as_str), Some("button.b3"));
    assert_eq!(actions_of(&report.actions, ActionKind::Click).len(), 4);
}

#[tokio::test(start_paused = true)]
async fn navigation_timeouts_are_retried() {
    let temp = TempDir::new().unwrap();
    let driver = MockDriver::new()
        .with_page(START, ScriptedPage::new(create_test_html("Slow", "", "")))
        .with_navigation_timeouts(2);

    let report = CaptureSession::new(quick_job(START, temp.path(), CaptureMode::Static), &driver)
        .run()
        .await
        .unwrap();

    assert_eq!(report.pages.len(), 1);
    assert_eq!(driver.navigations().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn exhausted_navigation_attempts_abort_the_job() {
    let temp = TempDir::new().unwrap();
    let driver = MockDriver::new()
        .with_page(START, ScriptedPage::new(create_test_html("Slow", "", "")))
        .with_navigation_timeouts(3);

    let err = CaptureSession::new(quick_job(START, temp.path(), CaptureMode::Static), &driver)
        .run()
        .await
        .unwrap_err();

    match err {
        CaptureError::Navigation { url, attempts, .. } => {
            assert_eq!(url, START);
            assert_eq!(attempts, 3);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!temp.path().join("index_offline.html").exists());
}

#[tokio::test]
async fn non_timeout_navigation_failures_are_not_retried() {
    let temp = TempDir::new().unwrap();
    let driver = MockDriver::new();

    let err = CaptureSession::new(quick_job(START, temp.path(), CaptureMode::Static), &driver)
        .run()
        .await
        .unwrap_err();

    assert!(matches!(err, CaptureError::Navigation { attempts: 1, .. }));
    assert_eq!(driver.navigations().len(), 1);
}

#[tokio::test]
async fn screenshot_failure_does_not_abort() {
    let temp = TempDir::new().unwrap();
    let driver = MockDriver::new()
        .with_page(START, ScriptedPage::new(create_test_html("Doc", "", "")))
        .with_failing_screenshot();

    let report = CaptureSession::new(quick_job(START, temp.path(), CaptureMode::Static), &driver)
        .run()
        .await
        .unwrap();

    assert!(report.screenshot.is_none());
    assert!(!temp.path().join("screenshot.png").exists());
    assert!(temp.path().join("index_offline.html").exists());
}

#[tokio::test]
async fn single_file_mode_embeds_local_files() {
    let temp = TempDir::new().unwrap();
    let logo: Vec<u8> = (0u8..=255).collect();
    let background = vec![0u8, 159, 146, 150, 255];
    let html = create_test_html(
        "Single",
        r#"<link rel="stylesheet" href="https://cdn.example.com/site.css"><style>body{background:url('https://cdn.example.com/bg.png')}</style>"#,
        r#"<img src="https://cdn.example.com/logo.png"><a href="mailto:hi@example.com">mail</a>"#,
    );
    let page = ScriptedPage::new(html)
        .with_response("https://cdn.example.com/site.css", "text/css", b"h1{color:blue}")
        .with_response("https://cdn.example.com/logo.png", "image/png", &logo)
        .with_response("https://cdn.example.com/bg.png", "image/png", &background);
    let driver = MockDriver::new().with_page(START, page);

    let report = CaptureSession::new(quick_job(START, temp.path(), CaptureMode::SingleFile), &driver)
        .run()
        .await
        .unwrap();

    let single_path = report.single_file.expect("single-file output");
    assert!(single_path.ends_with("index_single.html"));
    let single = tokio::fs::read_to_string(&single_path).await.unwrap();
    let engine = base64::engine::general_purpose::STANDARD;

    let img = attribute_starting_with(&single, "src", "data:image/png;base64,").unwrap();
    let decoded = engine
        .decode(img.trim_start_matches("data:image/png;base64,"))
        .unwrap();
    assert_eq!(decoded, logo);

    let css = attribute_starting_with(&single, "href", "data:text/css;base64,").unwrap();
    let decoded = engine
        .decode(css.trim_start_matches("data:text/css;base64,"))
        .unwrap();
    assert_eq!(decoded, b"h1{color:blue}");

    let bg_start = single.find("url('data:image/png;base64,").unwrap() + "url('".len();
    let bg_end = single[bg_start..].find('\'').unwrap() + bg_start;
    let decoded = engine
        .decode(single[bg_start..bg_end].trim_start_matches("data:image/png;base64,"))
        .unwrap();
    assert_eq!(decoded, background);

    assert!(single.contains(r#"href="mailto:hi@example.com""#));
    assert!(single.contains("data:application/javascript;base64,"));
    assert!(!single.contains("assets/"));

    // The multi-file output stays as it was
    let primary = tokio::fs::read_to_string(temp.path().join("index_offline.html"))
        .await
        .unwrap();
    assert!(primary.contains(&asset_path("https://cdn.example.com/logo.png", Some("image/png"))));
}
