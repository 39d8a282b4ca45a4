// src/proto/handler.rs

//! The request dispatcher.
//!
//! Parses the single request from the bridge, runs it through the policy
//! gate, routes it to exactly one handler family, and produces exactly one
//! response envelope. Handlers validate their own params and return
//! action-specific fields; the envelope shaping lives here.

use chrono::Utc;
use serde_json::{json, Value};
use tracing::info;

use crate::blockchain::encoder;
use crate::blockchain::rpc::{canonical_method, hex_quantity_to_decimal, CachedRpcReader};
use crate::markets::models::{LiveMode, MarketQuery, ProviderChoice};
use crate::markets::MarketsEngine;
use crate::policy::PolicyGate;
use crate::proto::protocol::{error_codes, failure, success, CoreError};
use crate::registry::{normalize_chain, resolve_asset, ChainInfo, CHAINS};
use crate::utils;
use crate::CoreState;

/// Handle one raw request body and produce the response envelope. Never
/// panics; every failure mode maps to an error envelope.
pub async fn handle_request(input: &str, state: &CoreState) -> Value {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return failure(
            error_codes::USAGE_ERROR,
            "empty input: expected one JSON request object",
        );
    }

    let root: Value = match serde_json::from_str(trimmed) {
        Ok(v) => v,
        Err(e) => return failure(error_codes::USAGE_ERROR, &format!("invalid JSON: {}", e)),
    };
    if !root.is_object() {
        return failure(error_codes::USAGE_ERROR, "request must be a JSON object");
    }

    let action = match root.get("action").and_then(|a| a.as_str()) {
        Some(a) => a,
        None => return failure(error_codes::USAGE_ERROR, "missing 'action' string"),
    };
    info!("handling action: {}", action);

    // Policy gate runs before params are even looked at
    let gate = PolicyGate::new(&state.config);
    if gate.is_supported(action) && !gate.is_allowed(action) {
        return failure(
            error_codes::UNSUPPORTED,
            &format!("action '{}' is blocked by policy", action),
        );
    }

    let params = match root.get("params") {
        Some(p) if p.is_object() => p,
        _ => return failure(error_codes::USAGE_ERROR, "missing 'params' object"),
    };

    let results_only = match utils::flag(params, "resultsOnly") {
        Ok(b) => b,
        Err(e) => return (&e).into(),
    };

    match dispatch(action, params, state).await {
        Ok(fields) => success(fields, results_only),
        Err(e) => (&e).into(),
    }
}

async fn dispatch(action: &str, params: &Value, state: &CoreState) -> Result<Value, CoreError> {
    match action {
        "resolveChain" => handle_resolve_chain(params),
        "resolveAsset" => handle_resolve_asset(params),
        "listChains" => handle_list_chains(),
        "blockNumber" => handle_block_number(params, state).await,
        "gasPrice" => handle_gas_price(params, state).await,
        "estimateGas" => handle_estimate_gas(params, state).await,
        "nativeBalance" => handle_native_balance(params, state).await,
        "erc20Balance" => handle_erc20_balance(params, state).await,
        "rpcCall" => handle_rpc_call(params, state).await,
        "yieldOpportunities" => handle_markets(params, state, false).await,
        "lendingMarkets" => handle_markets(params, state, true).await,
        "buildTransferNative" => handle_build_transfer_native(params),
        "buildTransferErc20" => handle_build_transfer_erc20(params),
        "buildApproveErc20" => handle_build_approve_erc20(params),
        "buildSwap" => handle_build_swap(params),
        "sendRawTransaction" => handle_send_raw_transaction(params, state).await,
        other => Err(CoreError::Unsupported(format!(
            "unsupported action '{}'",
            other
        ))),
    }
}

// --- Registry handlers ---

fn parse_chain_param(params: &Value) -> Result<&'static ChainInfo, CoreError> {
    let raw = utils::required_str_or_number(params, "chain")?;
    normalize_chain(&raw)
}

fn parse_optional_chain(params: &Value) -> Result<Option<&'static ChainInfo>, CoreError> {
    match utils::optional_str_or_number(params, "chain")? {
        Some(raw) => Ok(Some(normalize_chain(&raw)?)),
        None => Ok(None),
    }
}

fn handle_resolve_chain(params: &Value) -> Result<Value, CoreError> {
    let chain = parse_chain_param(params)?;
    let (namespace, reference) = chain
        .id
        .split_once(':')
        .unwrap_or((chain.id, ""));
    Ok(json!({
        "chainId": chain.id,
        "name": chain.name,
        "namespace": namespace,
        "reference": reference,
        "nativeSymbol": chain.native_symbol,
        "nativeDecimals": chain.native_decimals,
    }))
}

fn handle_resolve_asset(params: &Value) -> Result<Value, CoreError> {
    let chain = parse_chain_param(params)?;
    let asset = utils::required_str(params, "asset")?;
    let resolved = resolve_asset(chain, &asset)?;
    Ok(resolved.to_json(chain))
}

fn handle_list_chains() -> Result<Value, CoreError> {
    let chains: Vec<Value> = CHAINS
        .iter()
        .map(|c| {
            json!({
                "chainId": c.id,
                "name": c.name,
                "aliases": c.aliases,
                "nativeSymbol": c.native_symbol,
            })
        })
        .collect();
    Ok(json!({ "chains": chains, "count": chains.len() }))
}

// --- Cached RPC handlers ---

fn rpc_endpoint(state: &CoreState, chain: &ChainInfo) -> Result<String, CoreError> {
    match state.config.rpc_url(chain.id) {
        Some(url) => Ok(url.clone()),
        None => Err(CoreError::usage(format!(
            "RPC URL not configured for chain '{}'. Available: {}",
            chain.id,
            state.config.configured_chains().join(", ")
        ))),
    }
}

async fn handle_block_number(params: &Value, state: &CoreState) -> Result<Value, CoreError> {
    let chain = parse_chain_param(params)?;
    let endpoint = rpc_endpoint(state, chain)?;
    let reader = CachedRpcReader::new(&state.config, &state.cache);
    let read = reader.read(&endpoint, "eth_blockNumber", &json!([])).await?;
    Ok(json!({
        "chain": chain.id,
        "blockNumber": hex_quantity_to_decimal(&read.value)?,
        "source": read.source,
    }))
}

async fn handle_gas_price(params: &Value, state: &CoreState) -> Result<Value, CoreError> {
    let chain = parse_chain_param(params)?;
    let endpoint = rpc_endpoint(state, chain)?;
    let reader = CachedRpcReader::new(&state.config, &state.cache);
    let read = reader.read(&endpoint, "eth_gasPrice", &json!([])).await?;
    Ok(json!({
        "chain": chain.id,
        "gasPriceWei": hex_quantity_to_decimal(&read.value)?,
        "source": read.source,
    }))
}

fn is_hex_payload(s: &str) -> bool {
    match s.strip_prefix("0x") {
        Some(body) => body.len() % 2 == 0 && body.chars().all(|c| c.is_ascii_hexdigit()),
        None => false,
    }
}

async fn handle_estimate_gas(params: &Value, state: &CoreState) -> Result<Value, CoreError> {
    let chain = parse_chain_param(params)?;
    let endpoint = rpc_endpoint(state, chain)?;

    let tx = params
        .get("tx")
        .filter(|t| t.is_object())
        .ok_or_else(|| CoreError::usage("Missing or invalid required argument: 'tx'"))?;

    let to = utils::required_str(tx, "to")?;
    encoder::parse_address("tx.to", &to)?;
    let mut call = serde_json::Map::new();
    call.insert("to".to_string(), json!(to));
    if let Some(from) = utils::optional_str(tx, "from")? {
        encoder::parse_address("tx.from", &from)?;
        call.insert("from".to_string(), json!(from));
    }
    if let Some(value) = utils::optional_str_or_number(tx, "value")? {
        let amount = encoder::parse_amount("tx.value", &value)?;
        call.insert("value".to_string(), json!(format!("{:#x}", amount)));
    }
    if let Some(data) = utils::optional_str(tx, "data")? {
        if !is_hex_payload(&data) {
            return Err(CoreError::usage("invalid tx.data"));
        }
        call.insert("data".to_string(), json!(data));
    }

    let reader = CachedRpcReader::new(&state.config, &state.cache);
    let read = reader
        .read(&endpoint, "eth_estimateGas", &json!([Value::Object(call)]))
        .await?;
    Ok(json!({
        "chain": chain.id,
        "gasLimit": hex_quantity_to_decimal(&read.value)?,
        "source": read.source,
    }))
}

async fn handle_native_balance(params: &Value, state: &CoreState) -> Result<Value, CoreError> {
    let chain = parse_chain_param(params)?;
    let endpoint = rpc_endpoint(state, chain)?;
    let address = utils::required_str(params, "address")?;
    encoder::parse_address("address", &address)?;

    let reader = CachedRpcReader::new(&state.config, &state.cache);
    let read = reader
        .read(&endpoint, "eth_getBalance", &json!([address, "latest"]))
        .await?;
    Ok(json!({
        "chain": chain.id,
        "address": address,
        "balanceWei": hex_quantity_to_decimal(&read.value)?,
        "source": read.source,
    }))
}

/// Token reference: an explicit `tokenAddress`, or an `asset` symbol
/// resolved through the registry.
fn token_reference(
    params: &Value,
    chain: &ChainInfo,
) -> Result<(String, Option<u8>, Option<String>), CoreError> {
    if let Some(addr) = utils::optional_str(params, "tokenAddress")? {
        let parsed = encoder::parse_address("tokenAddress", &addr)?;
        let addr = format!("0x{}", hex::encode(parsed));
        return Ok((addr, None, None));
    }
    if let Some(symbol) = utils::optional_str(params, "asset")? {
        let resolved = resolve_asset(chain, &symbol)?;
        let address = resolved.address.clone().ok_or_else(|| {
            CoreError::usage(format!("asset '{}' has no contract address", symbol))
        })?;
        return Ok((address, resolved.decimals, Some(resolved.asset_id)));
    }
    Err(CoreError::usage(
        "Missing required argument: 'tokenAddress' or 'asset'",
    ))
}

async fn handle_erc20_balance(params: &Value, state: &CoreState) -> Result<Value, CoreError> {
    let chain = parse_chain_param(params)?;
    let endpoint = rpc_endpoint(state, chain)?;
    let address = utils::required_str(params, "address")?;
    let (token_address, decimals, asset_id) = token_reference(params, chain)?;

    let data = encoder::encode_balance_of(&address)?;
    let call = json!([{ "to": token_address, "data": data }, "latest"]);

    let reader = CachedRpcReader::new(&state.config, &state.cache);
    let read = reader.read(&endpoint, "eth_call", &call).await?;
    Ok(json!({
        "chain": chain.id,
        "address": address,
        "tokenAddress": token_address,
        "assetId": asset_id,
        "balanceRaw": hex_quantity_to_decimal(&read.value)?,
        "decimals": decimals,
        "source": read.source,
    }))
}

async fn handle_rpc_call(params: &Value, state: &CoreState) -> Result<Value, CoreError> {
    let chain = parse_chain_param(params)?;
    let endpoint = rpc_endpoint(state, chain)?;
    let method = canonical_method(&utils::required_str(params, "method")?);

    // Broadcasts go through the gated sendRawTransaction action only
    if method == "eth_sendRawTransaction" {
        return Err(CoreError::Unsupported(
            "eth_sendRawTransaction is not available via rpcCall; use sendRawTransaction".into(),
        ));
    }

    let call_params = match params.get("params") {
        None | Some(Value::Null) => json!([]),
        Some(v @ Value::Array(_)) => v.clone(),
        Some(_) => {
            return Err(CoreError::usage("Argument 'params' must be an array"));
        }
    };

    let reader = CachedRpcReader::new(&state.config, &state.cache);
    let read = reader.read(&endpoint, &method, &call_params).await?;
    Ok(json!({
        "chain": chain.id,
        "method": method,
        "result": read.value,
        "source": read.source,
    }))
}

// --- Market data handlers ---

async fn handle_markets(
    params: &Value,
    state: &CoreState,
    borrow_side: bool,
) -> Result<Value, CoreError> {
    let chain = parse_optional_chain(params)?;
    let asset = utils::optional_str(params, "asset")?;
    let provider = utils::optional_str(params, "provider")?;
    let live_mode = LiveMode::parse(utils::optional_str(params, "liveMode")?.as_deref())?;
    let provider_choice =
        ProviderChoice::parse(utils::optional_str(params, "liveProvider")?.as_deref());
    let limit = utils::optional_u64(params, "limit")?.unwrap_or(50) as usize;

    let query = MarketQuery {
        chain,
        asset,
        provider,
        live_mode,
        provider_choice,
        borrow_side,
        limit,
    };

    let engine = MarketsEngine::new(&state.config, &state.cache);
    let page = engine.query(&query).await?;
    Ok(json!({
        "markets": page.rows,
        "count": page.rows.len(),
        "source": page.provenance.source,
        "sourceProvider": page.provenance.source_provider,
        "fetchedAtUnix": page.provenance.fetched_at_unix,
    }))
}

// --- Transaction builders ---

fn chain_id_param(params: &Value) -> Result<Option<String>, CoreError> {
    Ok(parse_optional_chain(params)?.map(|c| c.id.to_string()))
}

fn handle_build_transfer_native(params: &Value) -> Result<Value, CoreError> {
    let chain = parse_optional_chain(params)?;
    let to = utils::required_str(params, "toAddress")?;

    let amount_wei = match utils::optional_str_or_number(params, "amountWei")? {
        Some(wei) => wei,
        None => {
            let amount = utils::optional_str_or_number(params, "amount")?
                .ok_or_else(|| {
                    CoreError::usage("Missing required argument: 'amountWei' or 'amount'")
                })?;
            let decimals = chain.map(|c| c.native_decimals).unwrap_or(18);
            encoder::scale_amount("amount", &amount, decimals)?.to_string()
        }
    };

    let tx = encoder::build_native_transfer(&to, &amount_wei, chain.map(|c| c.id.to_string()))?;
    Ok(json!({ "txRequest": tx }))
}

/// Raw amount for an ERC-20 operation: `amountRaw` as given, or a human
/// `amount` scaled by the resolved asset's decimals.
fn erc20_amount(
    params: &Value,
    decimals: Option<u8>,
) -> Result<String, CoreError> {
    if let Some(raw) = utils::optional_str_or_number(params, "amountRaw")? {
        return Ok(raw);
    }
    let amount = utils::optional_str_or_number(params, "amount")?.ok_or_else(|| {
        CoreError::usage("Missing required argument: 'amountRaw' or 'amount'")
    })?;
    let decimals = decimals.ok_or_else(|| {
        CoreError::usage("token decimals unknown; pass 'amountRaw' instead of 'amount'")
    })?;
    Ok(encoder::scale_amount("amount", &amount, decimals)?.to_string())
}

fn erc20_build_inputs(
    params: &Value,
) -> Result<(String, String, Option<String>), CoreError> {
    let chain = parse_optional_chain(params)?;
    let (token_address, decimals, _asset_id) = match chain {
        Some(chain) => token_reference(params, chain)?,
        None => {
            // Without a chain the token must be an explicit address
            let addr = utils::optional_str(params, "tokenAddress")?.ok_or_else(|| {
                CoreError::usage("Missing required argument: 'tokenAddress' (or 'chain' + 'asset')")
            })?;
            let parsed = encoder::parse_address("tokenAddress", &addr)?;
            (format!("0x{}", hex::encode(parsed)), None, None)
        }
    };
    let amount_raw = erc20_amount(params, decimals)?;
    Ok((token_address, amount_raw, chain.map(|c| c.id.to_string())))
}

fn handle_build_transfer_erc20(params: &Value) -> Result<Value, CoreError> {
    let (token_address, amount_raw, chain_id) = erc20_build_inputs(params)?;
    let to = utils::required_str(params, "toAddress")?;
    let tx = encoder::build_erc20_transfer(&token_address, &to, &amount_raw, chain_id)?;
    Ok(json!({ "txRequest": tx }))
}

fn handle_build_approve_erc20(params: &Value) -> Result<Value, CoreError> {
    let (token_address, amount_raw, chain_id) = erc20_build_inputs(params)?;
    let spender = utils::required_str(params, "spenderAddress")?;
    let tx = encoder::build_erc20_approve(&token_address, &spender, &amount_raw, chain_id)?;
    Ok(json!({ "txRequest": tx }))
}

fn handle_build_swap(params: &Value) -> Result<Value, CoreError> {
    let router = utils::required_str(params, "routerAddress")?;
    let amount_in = utils::required_str_or_number(params, "amountIn")?;
    let amount_out_min = utils::required_str_or_number(params, "amountOutMin")?;
    let to = utils::required_str(params, "toAddress")?;
    let path = utils::optional_str_array(params, "path")?
        .ok_or_else(|| CoreError::usage("Missing or invalid required argument: 'path'"))?;

    let deadline = match utils::optional_str_or_number(params, "deadline")? {
        Some(d) => d,
        // 20 minutes out, the common router default
        None => (Utc::now().timestamp() + 1200).to_string(),
    };

    let mut tx = encoder::build_swap(&router, &amount_in, &amount_out_min, &path, &to, &deadline)?;
    tx.chain_id = chain_id_param(params)?;
    Ok(json!({ "txRequest": tx }))
}

// --- Broadcast ---

async fn handle_send_raw_transaction(
    params: &Value,
    state: &CoreState,
) -> Result<Value, CoreError> {
    let gate = PolicyGate::new(&state.config);
    if !gate.broadcast_allowed() {
        return Err(CoreError::Unsupported(
            "broadcast is disabled; set ALLOW_BROADCAST to enable sendRawTransaction".into(),
        ));
    }

    let chain = parse_chain_param(params)?;
    let endpoint = rpc_endpoint(state, chain)?;
    let raw_tx = utils::required_str(params, "rawTx")?;
    if !is_hex_payload(&raw_tx) || raw_tx.len() <= 2 {
        return Err(CoreError::usage("invalid rawTx"));
    }

    let reader = CachedRpcReader::new(&state.config, &state.cache);
    let result = reader.send_raw(&endpoint, &raw_tx).await?;
    let tx_hash = result
        .as_str()
        .map(|s| s.to_string())
        .ok_or_else(|| CoreError::Unavailable("RPC returned no transaction hash".into()))?;
    Ok(json!({
        "chain": chain.id,
        "txHash": tx_hash,
    }))
}
