//! End-to-end tests for the request dispatcher: raw request body in,
//! response envelope out. No network is touched by any case here.

use serde_json::{json, Value};
use tempfile::tempdir;

use chaincore::config::Config;
use chaincore::proto::handler::handle_request;
use chaincore::CoreState;

fn test_state(config: Config) -> (CoreState, tempfile::TempDir) {
    let dir = tempdir().unwrap();
    let config = Config {
        cache_dir: dir.path().to_path_buf(),
        ..config
    };
    (CoreState::new(config), dir)
}

async fn call(state: &CoreState, body: &str) -> Value {
    handle_request(body, state).await
}

async fn call_json(state: &CoreState, request: Value) -> Value {
    call(state, &serde_json::to_string(&request).unwrap()).await
}

#[tokio::test]
async fn empty_input_is_a_usage_error() {
    let (state, _dir) = test_state(Config::default());
    let resp = call(&state, "").await;
    assert_eq!(resp["status"], "error");
    assert_eq!(resp["code"], 2);
}

#[tokio::test]
async fn invalid_json_is_a_usage_error() {
    let (state, _dir) = test_state(Config::default());
    let resp = call(&state, "{not json").await;
    assert_eq!(resp["status"], "error");
    assert_eq!(resp["code"], 2);
}

#[tokio::test]
async fn non_object_root_is_a_usage_error() {
    let (state, _dir) = test_state(Config::default());
    let resp = call(&state, "[1,2,3]").await;
    assert_eq!(resp["code"], 2);
}

#[tokio::test]
async fn missing_action_is_a_usage_error() {
    let (state, _dir) = test_state(Config::default());
    let resp = call_json(&state, json!({"params": {}})).await;
    assert_eq!(resp["code"], 2);
    assert!(resp["error"].as_str().unwrap().contains("action"));
}

#[tokio::test]
async fn missing_params_is_a_usage_error() {
    let (state, _dir) = test_state(Config::default());
    let resp = call_json(&state, json!({"action": "listChains"})).await;
    assert_eq!(resp["code"], 2);
    assert!(resp["error"].as_str().unwrap().contains("params"));
}

#[tokio::test]
async fn unknown_action_is_unsupported() {
    let (state, _dir) = test_state(Config::default());
    let resp = call_json(&state, json!({"action": "mintMoney", "params": {}})).await;
    assert_eq!(resp["code"], 13);
}

#[tokio::test]
async fn allowlist_blocks_before_params_are_read() {
    let config = Config {
        allowed_actions: Some(vec!["listChains".to_string()]),
        ..Config::default()
    };
    let (state, _dir) = test_state(config);

    // Blocked action: params are never validated, the gate answers first
    let resp = call_json(&state, json!({"action": "blockNumber"})).await;
    assert_eq!(resp["code"], 13);
    assert!(resp["error"].as_str().unwrap().contains("blocked"));

    let resp = call_json(&state, json!({"action": "listChains", "params": {}})).await;
    assert_eq!(resp["status"], "ok");
}

#[tokio::test]
async fn resolve_chain_normalizes_aliases() {
    let (state, _dir) = test_state(Config::default());
    for chain in ["ethereum", "eth", "1", "eip155:1"] {
        let resp = call_json(
            &state,
            json!({"action": "resolveChain", "params": {"chain": chain}}),
        )
        .await;
        assert_eq!(resp["status"], "ok", "alias {}", chain);
        assert_eq!(resp["chainId"], "eip155:1");
        assert_eq!(resp["nativeSymbol"], "ETH");
    }

    // Numeric JSON values normalize too
    let resp = call_json(
        &state,
        json!({"action": "resolveChain", "params": {"chain": 8453}}),
    )
    .await;
    assert_eq!(resp["chainId"], "eip155:8453");

    let resp = call_json(
        &state,
        json!({"action": "resolveChain", "params": {"chain": "narnia"}}),
    )
    .await;
    assert_eq!(resp["code"], 2);
}

#[tokio::test]
async fn resolve_asset_by_symbol() {
    let (state, _dir) = test_state(Config::default());
    let resp = call_json(
        &state,
        json!({"action": "resolveAsset", "params": {"chain": "ethereum", "asset": "usdc"}}),
    )
    .await;
    assert_eq!(resp["status"], "ok");
    assert_eq!(
        resp["assetId"],
        "eip155:1/erc20:0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48"
    );
    assert_eq!(resp["decimals"], 6);
}

#[tokio::test]
async fn results_only_nests_action_fields() {
    let (state, _dir) = test_state(Config::default());
    let resp = call_json(
        &state,
        json!({"action": "listChains", "params": {"resultsOnly": true}}),
    )
    .await;
    assert_eq!(resp["status"], "ok");
    assert!(resp["results"]["chains"].is_array());
    assert!(resp.get("chains").is_none());
}

// Transfer calldata layout: selector + padded recipient + padded amount.
#[tokio::test]
async fn build_transfer_erc20_example_scenario() {
    let token = "0xAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";
    let recipient = "0xBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBB";
    let (state, _dir) = test_state(Config::default());
    let resp = call_json(
        &state,
        json!({
            "action": "buildTransferErc20",
            "params": {
                "tokenAddress": token,
                "toAddress": recipient,
                "amountRaw": "1000000"
            }
        }),
    )
    .await;

    assert_eq!(resp["status"], "ok");
    let tx = &resp["txRequest"];
    assert_eq!(tx["to"].as_str().unwrap(), token.to_lowercase());
    assert_eq!(tx["value"], "0");

    let data = tx["data"].as_str().unwrap();
    assert!(data.starts_with("0xa9059cbb"));
    let body = &data[10..];
    assert_eq!(&body[0..64], format!("{:0>64}", &recipient.to_lowercase()[2..]));
    assert_eq!(&body[64..128], format!("{:0>64x}", 1_000_000u64));
    // no chain was passed, so no chainId appears
    assert!(tx.get("chainId").is_none());
}

#[tokio::test]
async fn build_transfer_erc20_from_symbol_and_human_amount() {
    let (state, _dir) = test_state(Config::default());
    let resp = call_json(
        &state,
        json!({
            "action": "buildTransferErc20",
            "params": {
                "chain": "ethereum",
                "asset": "USDC",
                "toAddress": "0xBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBB",
                "amount": "12.5"
            }
        }),
    )
    .await;
    assert_eq!(resp["status"], "ok", "{}", resp);
    let tx = &resp["txRequest"];
    assert_eq!(tx["to"], "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48");
    assert_eq!(tx["chainId"], "eip155:1");
    // 12.5 USDC at 6 decimals
    let data = tx["data"].as_str().unwrap();
    assert_eq!(&data[74..138], format!("{:0>64x}", 12_500_000u64));
}

#[tokio::test]
async fn build_transfer_rejects_bad_address() {
    let (state, _dir) = test_state(Config::default());
    let resp = call_json(
        &state,
        json!({
            "action": "buildTransferErc20",
            "params": {
                "tokenAddress": "0x1234",
                "toAddress": "0xBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBB",
                "amountRaw": "1"
            }
        }),
    )
    .await;
    assert_eq!(resp["code"], 2);
    assert_eq!(resp["error"], "invalid tokenAddress");
}

#[tokio::test]
async fn build_swap_requires_two_hop_path() {
    let (state, _dir) = test_state(Config::default());
    let resp = call_json(
        &state,
        json!({
            "action": "buildSwap",
            "params": {
                "routerAddress": "0xCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCC",
                "amountIn": "1000",
                "amountOutMin": "990",
                "path": ["0xAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA"],
                "toAddress": "0xBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBB"
            }
        }),
    )
    .await;
    assert_eq!(resp["code"], 2);
    assert!(resp["error"].as_str().unwrap().contains("path"));
}

#[tokio::test]
async fn build_swap_encodes_dynamic_path() {
    let (state, _dir) = test_state(Config::default());
    let resp = call_json(
        &state,
        json!({
            "action": "buildSwap",
            "params": {
                "chain": "base",
                "routerAddress": "0xCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCC",
                "amountIn": "1000",
                "amountOutMin": "990",
                "path": [
                    "0xAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA",
                    "0xBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBB"
                ],
                "toAddress": "0xBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBB",
                "deadline": "1700000000"
            }
        }),
    )
    .await;
    assert_eq!(resp["status"], "ok", "{}", resp);
    let tx = &resp["txRequest"];
    assert_eq!(tx["chainId"], "eip155:8453");
    let data = tx["data"].as_str().unwrap();
    assert!(data.starts_with("0x38ed1739"));
    // selector + 5 head words + length word + 2 path elements
    assert_eq!(data.len(), 2 + 8 + 64 * 8);
}

// Registry mode always succeeds with zero network calls (no RPC or
// provider URLs are configured here at all).
#[tokio::test]
async fn yield_opportunities_registry_mode_for_monad() {
    let (state, _dir) = test_state(Config::default());
    let resp = call_json(
        &state,
        json!({
            "action": "yieldOpportunities",
            "params": {"chain": "monad", "liveMode": "registry"}
        }),
    )
    .await;
    assert_eq!(resp["status"], "ok");
    assert_eq!(resp["source"], "registry");
    let markets = resp["markets"].as_array().unwrap();
    assert!(!markets.is_empty());
    for row in markets {
        assert_eq!(row["chain"], "monad");
        assert_eq!(row["source"], "registry");
    }
}

#[tokio::test]
async fn lending_markets_are_borrow_oriented() {
    let (state, _dir) = test_state(Config::default());
    let resp = call_json(
        &state,
        json!({
            "action": "lendingMarkets",
            "params": {"chain": "ethereum", "asset": "USDC", "liveMode": "registry"}
        }),
    )
    .await;
    assert_eq!(resp["status"], "ok");
    for row in resp["markets"].as_array().unwrap() {
        assert!(row["apyBorrow"].is_number());
    }
}

#[tokio::test]
async fn stable_family_match_is_recorded() {
    let (state, _dir) = test_state(Config::default());
    let resp = call_json(
        &state,
        json!({
            "action": "yieldOpportunities",
            "params": {"chain": "ethereum", "asset": "USDT", "liveMode": "registry"}
        }),
    )
    .await;
    assert_eq!(resp["status"], "ok");
    let markets = resp["markets"].as_array().unwrap();
    let kinds: Vec<&str> = markets
        .iter()
        .map(|r| r["matchKind"].as_str().unwrap())
        .collect();
    assert!(kinds.contains(&"exact"));
    assert!(kinds.contains(&"family"));
}

#[tokio::test]
async fn forced_provider_without_url_is_unavailable() {
    let (state, _dir) = test_state(Config::default());
    let resp = call_json(
        &state,
        json!({
            "action": "yieldOpportunities",
            "params": {"liveProvider": "morpho"}
        }),
    )
    .await;
    assert_eq!(resp["status"], "error");
    assert_eq!(resp["code"], 12);
    assert!(resp["error"].as_str().unwrap().contains("provider unavailable"));
}

#[tokio::test]
async fn broadcast_is_gated() {
    let (state, _dir) = test_state(Config::default());
    let resp = call_json(
        &state,
        json!({
            "action": "sendRawTransaction",
            "params": {"chain": "ethereum", "rawTx": "0xdeadbeef"}
        }),
    )
    .await;
    assert_eq!(resp["code"], 13);
    assert!(resp["error"].as_str().unwrap().contains("broadcast"));
}

#[tokio::test]
async fn rpc_call_refuses_raw_broadcast_method() {
    let config = Config {
        chain_rpc_urls: [("eip155:1".to_string(), "http://localhost:1".to_string())]
            .into_iter()
            .collect(),
        ..Config::default()
    };
    let (state, _dir) = test_state(config);
    let resp = call_json(
        &state,
        json!({
            "action": "rpcCall",
            "params": {"chain": "ethereum", "method": "eth_sendRawTransaction", "params": ["0x00"]}
        }),
    )
    .await;
    assert_eq!(resp["code"], 13);
}

#[tokio::test]
async fn rpc_actions_need_a_configured_endpoint() {
    let (state, _dir) = test_state(Config::default());
    let resp = call_json(
        &state,
        json!({"action": "blockNumber", "params": {"chain": "ethereum"}}),
    )
    .await;
    assert_eq!(resp["code"], 2);
    assert!(resp["error"].as_str().unwrap().contains("not configured"));
}
