use fetch_cache::{ClientConfig, FetchContext, FetchOptions, FetchPolicy};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    env_logger::init();

    let config = ClientConfig {
        base_url: Some("https://jsonplaceholder.typicode.com".to_string()),
        ..Default::default()
    };
    let ctx = FetchContext::with_surf(config);

    // Example 1: first request goes to the network
    println!("=== Cache-first ===");
    let start = std::time::Instant::now();
    let post = ctx.request(FetchOptions::get("/posts/1").with_request_name("post"));
    post.subscribe(|state| println!("post: fetching={} error={:?}", state.fetching, state.error));
    let state = post.settled().await;
    println!("First request took: {:?}", start.elapsed());
    println!("Status: {:?}", state.response.as_ref().map(|r| r.status));

    // Example 2: same request, answered from cache
    let start = std::time::Instant::now();
    let cached = ctx.request(FetchOptions::get("/posts/1"));
    cached.subscribe(|_| {});
    cached.settled().await;
    println!("Cached request took: {:?}", start.elapsed());

    // Example 3: several requests at once
    println!("\n=== Composed ===");
    let all = ctx.compose(vec![
        FetchOptions::get("/posts/1").with_fetch_policy(FetchPolicy::CacheAndNetwork),
        FetchOptions::get("/posts/2"),
        FetchOptions::get("/users/1"),
    ]);
    all.subscribe(|states| {
        let fetching = states.iter().filter(|s| s.fetching).count();
        println!("{} of {} still fetching", fetching, states.len());
    });
    let states = all.settled().await;
    for state in &states {
        println!("{:?}", state.data);
    }

    println!("\nCache stats: {:?}", ctx.cache().stats());
    println!("In-flight stats: {:?}", ctx.registry().stats());

    Ok(())
}
