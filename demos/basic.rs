//! Basic usage example for the window-gate crate.

use http::HeaderMap;
use std::time::Duration;
use window_gate::{
    get_real_ip, Clock, ManualClock, MemoryStore, RateLimiter, RateLimiterBuilder,
    RateLimiterConfig,
};

fn main() {
    println!("=== Basic Rate Limiter Example ===\n");

    // Example 1: Hourly limit on an expensive route
    hourly_example();

    println!("{}", "\n".to_owned() + "=".repeat(50).as_str() + "\n");

    // Example 2: Client identity from proxy headers
    client_identity_example();

    println!("{}", "\n".to_owned() + "=".repeat(50).as_str() + "\n");

    // Example 3: Windows reopening, driven by a manual clock
    window_reset_example();

    println!("{}", "\n".to_owned() + "=".repeat(50).as_str() + "\n");

    // Example 4: Configuration from TOML
    toml_config_example();

    println!("{}", "\n".to_owned() + "=".repeat(50).as_str() + "\n");

    // Example 5: Monitoring metrics
    metrics_example();
}

fn hourly_example() {
    println!("1. Hourly Limit:");

    let limiter = RateLimiter::hourly(3);
    println!("   Created limiter with 3 requests per hour");

    for i in 1..=5 {
        let decision = limiter.check_rate_limit("203.0.113.7");
        if decision.allowed {
            println!("   Request {} - ✅ Allowed (remaining {})", i, decision.remaining);
        } else {
            let body = decision.rejection_body();
            println!("   Request {} - ❌ 429: {}", i, body.message);
        }
    }
}

fn client_identity_example() {
    println!("2. Client Identity:");

    let cases: [(&str, &str); 4] = [
        ("x-forwarded-for", "198.51.100.4, 10.0.0.1"),
        ("x-real-ip", "198.51.100.5"),
        ("cf-connecting-ip", "198.51.100.6"),
        ("x-forwarded-for", "   "),
    ];

    for (name, value) in cases {
        let mut headers = HeaderMap::new();
        headers.insert(name, value.parse().unwrap());
        println!("   {name}: {value:?} -> {}", get_real_ip(&headers));
    }

    println!("   (no headers) -> {}", get_real_ip(&HeaderMap::new()));
}

fn window_reset_example() {
    println!("3. Window Reset:");

    let clock = ManualClock::new(0);
    let limiter = RateLimiterBuilder::new()
        .max_requests(2)
        .window_ms(60_000)
        .try_build_with(MemoryStore::new(100), clock.clone())
        .unwrap();

    for step in 0..3 {
        let decision = limiter.check_rate_limit("192.0.2.1");
        println!(
            "   t={:>6}ms allowed={} remaining={} retry_after={}s",
            clock.now_ms(),
            decision.allowed,
            decision.remaining,
            decision.retry_after_secs()
        );
        if step == 1 {
            clock.advance(Duration::from_secs(30));
        }
    }

    clock.advance(Duration::from_secs(30));
    let decision = limiter.check_rate_limit("192.0.2.1");
    println!(
        "   t={:>6}ms allowed={} remaining={} (new window)",
        clock.now_ms(),
        decision.allowed,
        decision.remaining
    );
}

fn toml_config_example() {
    println!("4. TOML Configuration:");

    let config = RateLimiterConfig::from_toml_str(
        r#"
        [rate_limit]
        max_requests = 10
        window_ms = 60000
        max_tracked_clients = 1000
        "#,
    )
    .unwrap();

    println!("   {:?}", config);
    let limiter = RateLimiter::new(config).unwrap();
    let decision = limiter.check_rate_limit("192.0.2.1");
    for (name, value) in decision.headers().iter() {
        println!("   {}: {:?}", name, value);
    }
}

fn metrics_example() {
    println!("5. Monitoring Metrics:");

    let limiter = RateLimiter::new(RateLimiterConfig::per_minute(2).with_max_tracked_clients(10))
        .unwrap();

    for i in 0..9 {
        let ip = format!("192.0.2.{}", i % 3);
        limiter.check_rate_limit(&ip);
    }

    let metrics = limiter.metrics();
    println!("   {}", metrics.summary());
    println!("   Health: {}", metrics.health_status());
    println!("   Action: {}", metrics.health_status().suggested_action());
}
