//! Implementation of a reputation-based ranking system for the RPC providers

use evm_rpc_types::{MultiRpcResult, RpcApi, RpcService, RpcServices};

use crate::{
    constants::{PROVIDER_COUNT, PROVIDER_THRESHOLD},
    journal::{JournalCollection, LogType},
    state::{CONFIG, RPC_REPUTATIONS},
    utils::error::{GatewayError, GatewayResult},
};

/// Builds the reputation table from the configured URLs, all starting at zero
pub fn reset_provider_reputations(urls: &[String]) {
    let providers = urls
        .iter()
        .map(|url| {
            (
                0,
                RpcApi {
                    url: url.clone(),
                    headers: None,
                },
            )
        })
        .collect();
    RPC_REPUTATIONS.with(|reputations| *reputations.borrow_mut() = providers);
}

/// Getter function to retrieve the provider list from the thread's local storage
fn fetch_provider_list() -> Vec<(i64, RpcApi)> {
    RPC_REPUTATIONS.with(|leaderboard| leaderboard.borrow().clone())
}

/// Sorts the providers and returns at most `count` of the best ones.
pub fn ranked_provider_list(count: usize) -> Vec<RpcApi> {
    let mut provider_list = fetch_provider_list();

    // Stable sort keeps the configured order between equal scores
    provider_list.sort_by(|a, b| b.0.cmp(&a.0));

    provider_list
        .into_iter()
        .map(|(_, provider)| provider)
        .take(count)
        .collect()
}

fn chain_id() -> u64 {
    CONFIG.with(|config| config.borrow().chain_id)
}

/// Returns the top ranked providers as a multi-provider source
pub fn get_ranked_rpc_providers() -> GatewayResult<RpcServices> {
    let services = ranked_provider_list(PROVIDER_COUNT as usize);
    if services.is_empty() {
        return Err(GatewayError::ProviderUnavailable);
    }
    Ok(RpcServices::Custom {
        chain_id: chain_id(),
        services,
    })
}

/// Returns the single best ranked provider as a multi-provider source
pub fn get_ranked_rpc_provider() -> GatewayResult<RpcServices> {
    let services = ranked_provider_list(1);
    if services.is_empty() {
        return Err(GatewayError::ProviderUnavailable);
    }
    Ok(RpcServices::Custom {
        chain_id: chain_id(),
        services,
    })
}

/// Returns the provider at the given rank, used for raw JSON-RPC requests
pub fn get_rpc_service(rank: usize) -> GatewayResult<RpcService> {
    ranked_provider_list(rank + 1)
        .into_iter()
        .nth(rank)
        .map(RpcService::Custom)
        .ok_or(GatewayError::ProviderUnavailable)
}

/// Adds `delta` to the score of the provider with the given URL
fn adjust_provider_score(url: &str, delta: i64) {
    RPC_REPUTATIONS.with(|leaderboard| {
        let mut leaderboard = leaderboard.borrow_mut();
        if let Some(entry) = leaderboard.iter_mut().find(|(_, p)| p.url == url) {
            entry.0 = entry.0.saturating_add(delta);
        }
    });
}

/// Increments the score of a specific provider by 1
pub fn increment_provider_score(provider: &RpcService) {
    if let RpcService::Custom(api) = provider {
        adjust_provider_score(&api.url, 1);
    }
}

/// Decrements the score of a specific provider by 1
pub fn decrement_provider_score(provider: &RpcService) {
    if let RpcService::Custom(api) = provider {
        adjust_provider_score(&api.url, -1);
    }
}

/// Picks the value reported by at least `threshold` providers.
/// Returns the value together with the providers that agreed and the ones that did not.
fn find_consensus<T: PartialEq + Clone>(
    results: &[(RpcService, Result<T, evm_rpc_types::RpcError>)],
    threshold: usize,
) -> Option<(T, Vec<RpcService>, Vec<RpcService>)> {
    let candidate = results.iter().find_map(|(_, result)| {
        let value = result.as_ref().ok()?;
        let votes = results
            .iter()
            .filter(|(_, other)| other.as_ref().ok() == Some(value))
            .count();
        (votes >= threshold).then(|| value.clone())
    })?;

    let (agreeing, disagreeing): (Vec<_>, Vec<_>) = results
        .iter()
        .partition(|(_, result)| result.as_ref().ok() == Some(&candidate));

    Some((
        candidate,
        agreeing.into_iter().map(|(service, _)| service.clone()).collect(),
        disagreeing
            .into_iter()
            .map(|(service, _)| service.clone())
            .collect(),
    ))
}

/// Unwraps a multi-provider result.
/// Consistent results are returned as-is; inconsistent ones need `PROVIDER_THRESHOLD`
/// matching answers. Providers agreeing with the consensus gain reputation, the rest lose it.
pub fn extract_multi_rpc_result<T: PartialEq + Clone>(
    rpc: RpcServices,
    result: MultiRpcResult<T>,
) -> GatewayResult<T> {
    match result {
        MultiRpcResult::Consistent(response) => {
            if let RpcServices::Custom { services, .. } = rpc {
                let delta = if response.is_ok() { 1 } else { -1 };
                services
                    .iter()
                    .for_each(|api| adjust_provider_score(&api.url, delta));
            }
            response.map_err(GatewayError::RpcResponseError)
        }
        MultiRpcResult::Inconsistent(results) => {
            let mut journal = JournalCollection::open(Some("provider_consensus"));
            match find_consensus(&results, PROVIDER_THRESHOLD as usize) {
                Some((value, agreeing, disagreeing)) => {
                    agreeing.iter().for_each(increment_provider_score);
                    disagreeing.iter().for_each(decrement_provider_score);
                    journal.append_note(
                        Ok(()),
                        LogType::ProviderReputationChange,
                        format!(
                            "Consensus reached; {} providers agreed, {} were penalized.",
                            agreeing.len(),
                            disagreeing.len()
                        ),
                    );
                    Ok(value)
                }
                None => {
                    results
                        .iter()
                        .for_each(|(service, _)| decrement_provider_score(service));
                    journal.append_note(
                        Err(GatewayError::NoConsensus),
                        LogType::ProviderReputationChange,
                        "No consensus was reached; every provider was penalized.",
                    );
                    Err(GatewayError::NoConsensus)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn urls() -> Vec<String> {
        vec![
            "https://a.example.org".to_string(),
            "https://b.example.org".to_string(),
            "https://c.example.org".to_string(),
            "https://d.example.org".to_string(),
        ]
    }

    fn service(url: &str) -> RpcService {
        RpcService::Custom(RpcApi {
            url: url.to_string(),
            headers: None,
        })
    }

    fn score_of(url: &str) -> i64 {
        RPC_REPUTATIONS.with(|leaderboard| {
            leaderboard
                .borrow()
                .iter()
                .find(|(_, api)| api.url == url)
                .map(|(score, _)| *score)
                .unwrap()
        })
    }

    #[test]
    fn ranking_prefers_higher_scores_and_truncates() {
        reset_provider_reputations(&urls());
        increment_provider_score(&service("https://d.example.org"));

        let ranked = ranked_provider_list(PROVIDER_COUNT as usize);
        assert_eq!(ranked.len(), 3);
        assert_eq!(ranked[0].url, "https://d.example.org");
        assert_eq!(ranked[1].url, "https://a.example.org");
    }

    #[test]
    fn no_providers_means_unavailable() {
        reset_provider_reputations(&[]);
        assert_eq!(
            get_ranked_rpc_providers(),
            Err(GatewayError::ProviderUnavailable)
        );
        assert_eq!(get_rpc_service(0), Err(GatewayError::ProviderUnavailable));
    }

    #[test]
    fn inconsistent_results_with_majority_are_accepted() {
        reset_provider_reputations(&urls());
        let rpc = get_ranked_rpc_providers().unwrap();
        let result = MultiRpcResult::Inconsistent(vec![
            (service("https://a.example.org"), Ok("0x01".to_string())),
            (service("https://b.example.org"), Ok("0x02".to_string())),
            (service("https://c.example.org"), Ok("0x01".to_string())),
        ]);

        assert_eq!(extract_multi_rpc_result(rpc, result), Ok("0x01".to_string()));
        assert_eq!(score_of("https://a.example.org"), 1);
        assert_eq!(score_of("https://b.example.org"), -1);
        assert_eq!(score_of("https://c.example.org"), 1);
    }

    #[test]
    fn inconsistent_results_without_majority_fail() {
        reset_provider_reputations(&urls());
        let rpc = get_ranked_rpc_providers().unwrap();
        let result = MultiRpcResult::Inconsistent(vec![
            (service("https://a.example.org"), Ok(1_u64)),
            (service("https://b.example.org"), Ok(2_u64)),
        ]);

        assert_eq!(
            extract_multi_rpc_result(rpc, result),
            Err(GatewayError::NoConsensus)
        );
        assert_eq!(score_of("https://a.example.org"), -1);
    }

    #[test]
    fn consistent_success_rewards_every_queried_provider() {
        reset_provider_reputations(&urls());
        let rpc = get_ranked_rpc_providers().unwrap();
        let result = MultiRpcResult::Consistent(Ok(7_u64));

        assert_eq!(extract_multi_rpc_result(rpc, result), Ok(7));
        assert_eq!(score_of("https://a.example.org"), 1);
        assert_eq!(score_of("https://d.example.org"), 0);
    }
}
