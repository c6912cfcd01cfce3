use auth_cache::{Cache, MultiLevelCache};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
struct TestUser {
    id: u32,
    name: String,
}

#[tokio::main]
async fn main() {
    let cache = match MultiLevelCache::new("redis://127.0.0.1/") {
        Ok(c) => c,
        Err(e) => {
            println!("Redis connection failed: {}", e);
            return;
        }
    };

    println!("Connected to Cache");

    let user = TestUser {
        id: 1,
        name: "Vic".to_string(),
    };

    cache
        .set("user:1", &user, Duration::from_secs(10))
        .await
        .expect("Set failed");

    let fetched: TestUser = cache.get("user:1").await.expect("Key missing");
    assert_eq!(user, fetched);
    println!("L1 Get Passed");

    cache.delete("user:1").await.expect("Delete failed");

    let missing: Option<TestUser> = cache.get("user:1").await;
    assert!(missing.is_none());
    println!("Delete Passed");
}
