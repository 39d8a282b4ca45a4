// src/blockchain/encoder.rs

//! Calldata encoder: unsigned transaction construction.
//!
//! Pure and deterministic, no I/O. Function selectors come from keccak256 of
//! the canonical signature; parameters are encoded by hand as 32-byte words
//! per the contract ABI rules. Every input is validated before any encoding
//! happens; a validation failure never yields partial calldata.

use ethers_core::types::U256;
use ethers_core::utils::keccak256;
use serde::Serialize;

use crate::proto::protocol::CoreError;

pub const SIG_ERC20_TRANSFER: &str = "transfer(address,uint256)";
pub const SIG_ERC20_APPROVE: &str = "approve(address,uint256)";
pub const SIG_ERC20_BALANCE_OF: &str = "balanceOf(address)";
pub const SIG_SWAP_EXACT_TOKENS: &str =
    "swapExactTokensForTokens(uint256,uint256,address[],address,uint256)";

/// Unsigned transaction skeleton. Ownership passes entirely to the caller,
/// which signs and broadcasts elsewhere.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TxRequest {
    pub to: String,
    /// Native value in wei, as a decimal string
    pub value: String,
    /// 0x-prefixed calldata hex ("0x" when there is none)
    pub data: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<String>,
}

fn selector(sig: &str) -> [u8; 4] {
    let mut sel = [0u8; 4];
    sel.copy_from_slice(&keccak256(sig.as_bytes())[0..4]);
    sel
}

/// Validate and decode an address: exactly 40 hex chars after an optional
/// 0x prefix. The error names the offending field.
pub fn parse_address(field: &str, input: &str) -> Result<[u8; 20], CoreError> {
    let body = input.trim();
    let body = body.strip_prefix("0x").or_else(|| body.strip_prefix("0X")).unwrap_or(body);
    if body.len() != 40 || !body.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(CoreError::usage(format!("invalid {}", field)));
    }
    let mut out = [0u8; 20];
    let bytes = hex::decode(body).map_err(|_| CoreError::usage(format!("invalid {}", field)))?;
    out.copy_from_slice(&bytes);
    Ok(out)
}

/// Parse a non-negative integer amount, decimal or 0x-hex, within 256 bits.
pub fn parse_amount(field: &str, input: &str) -> Result<U256, CoreError> {
    let raw = input.trim();
    if raw.is_empty() || raw.starts_with('-') {
        return Err(CoreError::usage(format!("invalid {}", field)));
    }
    let parsed = if let Some(hex_body) = raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        U256::from_str_radix(hex_body, 16).ok()
    } else {
        U256::from_dec_str(raw).ok()
    };
    parsed.ok_or_else(|| CoreError::usage(format!("invalid {}", field)))
}

fn address_word(addr: &[u8; 20]) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[12..].copy_from_slice(addr);
    word
}

fn uint_word(n: U256) -> [u8; 32] {
    let mut word = [0u8; 32];
    n.to_big_endian(&mut word);
    word
}

fn to_hex_data(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

fn checksum_free(addr: &[u8; 20]) -> String {
    format!("0x{}", hex::encode(addr))
}

/// Native value transfer: no calldata at all.
pub fn build_native_transfer(
    to: &str,
    amount_wei: &str,
    chain_id: Option<String>,
) -> Result<TxRequest, CoreError> {
    let to_addr = parse_address("toAddress", to)?;
    let amount = parse_amount("amountWei", amount_wei)?;
    Ok(TxRequest {
        to: checksum_free(&to_addr),
        value: amount.to_string(),
        data: "0x".to_string(),
        chain_id,
    })
}

fn build_erc20_call(
    sig: &str,
    token: &str,
    subject_field: &str,
    subject: &str,
    amount_field: &str,
    amount: &str,
    chain_id: Option<String>,
) -> Result<TxRequest, CoreError> {
    let token_addr = parse_address("tokenAddress", token)?;
    let subject_addr = parse_address(subject_field, subject)?;
    let amount = parse_amount(amount_field, amount)?;

    let mut data = selector(sig).to_vec();
    data.extend_from_slice(&address_word(&subject_addr));
    data.extend_from_slice(&uint_word(amount));

    Ok(TxRequest {
        to: checksum_free(&token_addr),
        value: "0".to_string(),
        data: to_hex_data(&data),
        chain_id,
    })
}

/// ERC-20 `transfer(address,uint256)`.
pub fn build_erc20_transfer(
    token: &str,
    to: &str,
    amount_raw: &str,
    chain_id: Option<String>,
) -> Result<TxRequest, CoreError> {
    build_erc20_call(
        SIG_ERC20_TRANSFER,
        token,
        "toAddress",
        to,
        "amountRaw",
        amount_raw,
        chain_id,
    )
}

/// ERC-20 `approve(address,uint256)`.
pub fn build_erc20_approve(
    token: &str,
    spender: &str,
    amount_raw: &str,
    chain_id: Option<String>,
) -> Result<TxRequest, CoreError> {
    build_erc20_call(
        SIG_ERC20_APPROVE,
        token,
        "spenderAddress",
        spender,
        "amountRaw",
        amount_raw,
        chain_id,
    )
}

/// Router swap, `swapExactTokensForTokens` shape. Head words: amountIn,
/// amountOutMin, the dynamic-array offset (0xa0), recipient, deadline.
/// Tail: path length word followed by left-padded path elements.
pub fn build_swap(
    router: &str,
    amount_in: &str,
    amount_out_min: &str,
    path: &[String],
    recipient: &str,
    deadline: &str,
) -> Result<TxRequest, CoreError> {
    let router_addr = parse_address("routerAddress", router)?;
    let amount_in = parse_amount("amountIn", amount_in)?;
    let amount_out_min = parse_amount("amountOutMin", amount_out_min)?;
    let recipient_addr = parse_address("toAddress", recipient)?;
    let deadline = parse_amount("deadline", deadline)?;

    if path.len() < 2 {
        return Err(CoreError::usage("invalid path: at least two addresses required"));
    }
    let mut path_addrs = Vec::with_capacity(path.len());
    for hop in path {
        path_addrs.push(parse_address("path", hop)?);
    }

    let mut data = selector(SIG_SWAP_EXACT_TOKENS).to_vec();
    data.extend_from_slice(&uint_word(amount_in));
    data.extend_from_slice(&uint_word(amount_out_min));
    // Offset to the dynamic array: five head words of 32 bytes
    data.extend_from_slice(&uint_word(U256::from(5 * 32)));
    data.extend_from_slice(&address_word(&recipient_addr));
    data.extend_from_slice(&uint_word(deadline));
    data.extend_from_slice(&uint_word(U256::from(path_addrs.len())));
    for addr in &path_addrs {
        data.extend_from_slice(&address_word(addr));
    }

    Ok(TxRequest {
        to: checksum_free(&router_addr),
        value: "0".to_string(),
        data: to_hex_data(&data),
        chain_id: None,
    })
}

/// Scale a human decimal amount ("12.5") into raw units for an asset with
/// the given decimals. Fractional digits beyond the asset's precision are
/// rejected rather than truncated.
pub fn scale_amount(field: &str, input: &str, decimals: u8) -> Result<U256, CoreError> {
    let raw = input.trim();
    if raw.is_empty() || raw.starts_with('-') || raw.starts_with('+') {
        return Err(CoreError::usage(format!("invalid {}", field)));
    }
    let (whole, frac) = match raw.split_once('.') {
        Some((w, f)) => (w, f),
        None => (raw, ""),
    };
    let all_digits = |s: &str| s.chars().all(|c| c.is_ascii_digit());
    if !all_digits(whole) || !all_digits(frac) || (whole.is_empty() && frac.is_empty()) {
        return Err(CoreError::usage(format!("invalid {}", field)));
    }
    if frac.len() > decimals as usize {
        return Err(CoreError::usage(format!(
            "invalid {}: more than {} decimal places",
            field, decimals
        )));
    }

    let whole = if whole.is_empty() {
        U256::zero()
    } else {
        U256::from_dec_str(whole).map_err(|_| CoreError::usage(format!("invalid {}", field)))?
    };
    let mut frac_padded = frac.to_string();
    while frac_padded.len() < decimals as usize {
        frac_padded.push('0');
    }
    let frac = if frac_padded.is_empty() {
        U256::zero()
    } else {
        U256::from_dec_str(&frac_padded)
            .map_err(|_| CoreError::usage(format!("invalid {}", field)))?
    };

    let base = U256::from(10)
        .checked_pow(U256::from(decimals))
        .ok_or_else(|| CoreError::usage(format!("invalid {}", field)))?;
    whole
        .checked_mul(base)
        .and_then(|scaled| scaled.checked_add(frac))
        .ok_or_else(|| CoreError::usage(format!("invalid {}", field)))
}

/// Calldata for `balanceOf(address)`, used by the cached reader's ERC-20
/// balance query.
pub fn encode_balance_of(owner: &str) -> Result<String, CoreError> {
    let owner_addr = parse_address("address", owner)?;
    let mut data = selector(SIG_ERC20_BALANCE_OF).to_vec();
    data.extend_from_slice(&address_word(&owner_addr));
    Ok(to_hex_data(&data))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOKEN: &str = "0xAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";
    const RECIPIENT: &str = "0xBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBB";

    #[test]
    fn known_selectors() {
        assert_eq!(hex::encode(selector(SIG_ERC20_TRANSFER)), "a9059cbb");
        assert_eq!(hex::encode(selector(SIG_ERC20_APPROVE)), "095ea7b3");
        assert_eq!(hex::encode(selector(SIG_ERC20_BALANCE_OF)), "70a08231");
        assert_eq!(hex::encode(selector(SIG_SWAP_EXACT_TOKENS)), "38ed1739");
    }

    #[test]
    fn erc20_transfer_layout() {
        let tx = build_erc20_transfer(TOKEN, RECIPIENT, "1000000", None).unwrap();
        assert_eq!(tx.to, TOKEN.to_lowercase());
        assert_eq!(tx.value, "0");

        let data = tx.data.strip_prefix("0x").unwrap();
        assert_eq!(&data[0..8], "a9059cbb");
        // word 1: recipient, left-padded
        assert_eq!(&data[8..72], format!("{:0>64}", RECIPIENT[2..].to_lowercase()));
        // word 2: amount, big-endian
        assert_eq!(&data[72..136], format!("{:0>64x}", 1_000_000u64));
        assert_eq!(data.len(), 8 + 64 * 2);
    }

    #[test]
    fn transfer_roundtrip_recovers_inputs() {
        let amount = "123456789012345678901234567890";
        let tx = build_erc20_transfer(TOKEN, RECIPIENT, amount, None).unwrap();
        let data = tx.data.strip_prefix("0x").unwrap();

        let addr_back = &data[8 + 24..8 + 64];
        assert_eq!(addr_back, RECIPIENT[2..].to_lowercase());

        let amount_back = U256::from_str_radix(&data[72..136], 16).unwrap();
        assert_eq!(amount_back, U256::from_dec_str(amount).unwrap());
    }

    #[test]
    fn approve_uses_its_own_selector() {
        let tx = build_erc20_approve(TOKEN, RECIPIENT, "0xff", None).unwrap();
        let data = tx.data.strip_prefix("0x").unwrap();
        assert_eq!(&data[0..8], "095ea7b3");
        assert_eq!(&data[72..136], format!("{:0>64x}", 255));
    }

    #[test]
    fn native_transfer_has_no_calldata() {
        let tx = build_native_transfer(RECIPIENT, "42", Some("eip155:1".into())).unwrap();
        assert_eq!(tx.data, "0x");
        assert_eq!(tx.value, "42");
        assert_eq!(tx.chain_id.as_deref(), Some("eip155:1"));
    }

    #[test]
    fn swap_head_and_tail_layout() {
        let path = vec![TOKEN.to_string(), RECIPIENT.to_string()];
        let tx = build_swap(
            "0xCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCC",
            "1000",
            "990",
            &path,
            RECIPIENT,
            "1700000000",
        )
        .unwrap();

        let data = tx.data.strip_prefix("0x").unwrap();
        assert_eq!(&data[0..8], "38ed1739");
        let word = |i: usize| &data[8 + i * 64..8 + (i + 1) * 64];
        assert_eq!(U256::from_str_radix(word(0), 16).unwrap(), U256::from(1000));
        assert_eq!(U256::from_str_radix(word(1), 16).unwrap(), U256::from(990));
        // offset word points at the tail (5 head words)
        assert_eq!(U256::from_str_radix(word(2), 16).unwrap(), U256::from(160));
        assert_eq!(&word(3)[24..], RECIPIENT[2..].to_lowercase());
        assert_eq!(
            U256::from_str_radix(word(4), 16).unwrap(),
            U256::from(1_700_000_000u64)
        );
        // tail: length, then the two path elements
        assert_eq!(U256::from_str_radix(word(5), 16).unwrap(), U256::from(2));
        assert_eq!(&word(6)[24..], TOKEN[2..].to_lowercase());
        assert_eq!(&word(7)[24..], RECIPIENT[2..].to_lowercase());
        assert_eq!(data.len(), 8 + 64 * 8);
    }

    #[test]
    fn short_path_is_rejected() {
        let err = build_swap(
            TOKEN,
            "1",
            "1",
            &[RECIPIENT.to_string()],
            RECIPIENT,
            "1700000000",
        )
        .unwrap_err();
        assert!(err.to_string().contains("invalid path"));
    }

    #[test]
    fn bad_inputs_are_field_scoped() {
        let err = build_erc20_transfer("0x1234", RECIPIENT, "1", None).unwrap_err();
        assert_eq!(err.to_string(), "invalid tokenAddress");

        let err = build_erc20_transfer(TOKEN, RECIPIENT, "-5", None).unwrap_err();
        assert_eq!(err.to_string(), "invalid amountRaw");

        let err = build_erc20_transfer(TOKEN, RECIPIENT, "1.5", None).unwrap_err();
        assert_eq!(err.to_string(), "invalid amountRaw");
    }

    #[test]
    fn human_amounts_scale_by_decimals() {
        assert_eq!(scale_amount("amount", "1", 6).unwrap(), U256::from(1_000_000));
        assert_eq!(scale_amount("amount", "12.5", 6).unwrap(), U256::from(12_500_000));
        assert_eq!(scale_amount("amount", "0.000001", 6).unwrap(), U256::from(1));
        assert_eq!(scale_amount("amount", ".5", 2).unwrap(), U256::from(50));
        // more fractional digits than the asset has
        assert!(scale_amount("amount", "0.0000001", 6).is_err());
        assert!(scale_amount("amount", "-1", 6).is_err());
        assert!(scale_amount("amount", "1.2.3", 6).is_err());
    }

    #[test]
    fn amounts_accept_hex_and_reject_overflow() {
        assert_eq!(parse_amount("x", "0xff").unwrap(), U256::from(255));
        // 2^256 overflows a uint256
        let too_big =
            "115792089237316195423570985008687907853269984665640564039457584007913129639936";
        assert!(parse_amount("x", too_big).is_err());
    }
}
