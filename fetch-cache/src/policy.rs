use crate::options::FetchPolicy;

/// What the orchestrator should do for one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    /// Deliver the cached response before anything else.
    pub read_cache: bool,
    /// Issue (or join) a network call.
    pub network: bool,
    /// Neither cache nor network can answer: settle empty, without error.
    pub cache_miss: bool,
}

impl Decision {
    const CACHED: Decision = Decision { read_cache: true, network: false, cache_miss: false };
    const NETWORK: Decision = Decision { read_cache: false, network: true, cache_miss: false };
    const CACHED_THEN_NETWORK: Decision = Decision { read_cache: true, network: true, cache_miss: false };
    const MISS: Decision = Decision { read_cache: false, network: false, cache_miss: true };
}

/// Decide between cache and network. Pure: no I/O, no state.
///
/// A manual invocation always goes to the network, skipping the cache
/// short-circuit of every policy.
pub fn resolve(policy: FetchPolicy, cache_present: bool, manual: bool) -> Decision {
    if manual {
        return Decision::NETWORK;
    }

    match (policy, cache_present) {
        (FetchPolicy::CacheFirst, true) => Decision::CACHED,
        (FetchPolicy::CacheFirst, false) => Decision::NETWORK,
        (FetchPolicy::CacheAndNetwork, true) => Decision::CACHED_THEN_NETWORK,
        (FetchPolicy::CacheAndNetwork, false) => Decision::NETWORK,
        (FetchPolicy::NetworkOnly, _) => Decision::NETWORK,
        (FetchPolicy::CacheOnly, true) => Decision::CACHED,
        (FetchPolicy::CacheOnly, false) => Decision::MISS,
    }
}

/// Whether a successful network response is written to the cache.
/// Every policy stores, network-only included; it only skips the read.
pub fn writes_cache(_policy: FetchPolicy) -> bool {
    true
}
