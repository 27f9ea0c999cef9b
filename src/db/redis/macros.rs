/// Read-through caching for catalog lookups.
///
/// Returns the cached value when present. Otherwise runs the block, stores its
/// result in the background and returns it. A failing cache read is logged
/// and treated as a miss so the catalog stays reachable without Redis.
///
/// # Arguments
/// * `$cache`: value with `get_from_cache` and `set_in_background` methods.
/// * `$key`: the `CacheKey` to read and write.
/// * `$ttl`: time-to-live of the stored value in seconds.
/// * `$block`: future computing the value on a miss.
#[macro_export]
macro_rules! cached {
    ($cache:expr, $key:expr, $ttl:expr, $block:expr) => {{
        let key = $key;
        match $cache.get_from_cache(&key).await {
            Ok(Some(cached)) => Ok(cached),
            miss => {
                if let Err(e) = miss {
                    tracing::warn!(key = %key, error = %e, "Cache read failed, treating as miss");
                }
                let value = $block.await?;
                $cache.set_in_background(&key, &value, $ttl);
                Ok(value)
            }
        }
    }};
}
