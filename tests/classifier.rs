use alloy_primitives::U256;
use ethbus::blockchain::classifier::{classify, decode_transfer, TokenTransfer, TxKind};

const CONTRACT: &str = "0xadfe00d92e5a16e773891f59780e6e54f40b532e";

fn transfer_call(amount_word: &str) -> String {
    format!(
        "0xa9059cbb{}{}{:0>64}",
        "0".repeat(24),
        "e47494379c1d48ee73454c251a6395fdd4f9eb43",
        amount_word
    )
}

#[test]
fn test_classify_token_transfer() {
    let kind = classify(&transfer_call("3e8"), CONTRACT);
    assert_eq!(
        kind,
        TxKind::TokenTransfer(TokenTransfer {
            to: "0xe47494379c1d48ee73454c251a6395fdd4f9eb43".to_string(),
            amount: U256::from(1000u64),
        })
    );
}

#[test]
fn test_amount_wider_than_u64_is_not_truncated() {
    let transfer = decode_transfer(&transfer_call("1ffffffffffffffff")).unwrap();
    assert_eq!(transfer.amount.to_string(), "36893488147419103231");
}

#[test]
fn test_classify_unknown_selector() {
    let input = format!("0x12345678{}", "0".repeat(64));
    assert_eq!(classify(&input, CONTRACT), TxKind::Unrecognized);
}

#[test]
fn test_classify_empty_input_is_plain() {
    assert_eq!(classify("", CONTRACT), TxKind::Plain);
    assert_eq!(classify("0x", CONTRACT), TxKind::Plain);
}

#[test]
fn test_truncated_transfer_degrades_to_unrecognized() {
    let input = "0xa9059cbb000000000000000000000000e474";
    assert_eq!(classify(input, CONTRACT), TxKind::Unrecognized);
}

#[test]
fn test_contract_creation_is_never_decoded() {
    assert_eq!(classify(&transfer_call("3e8"), ""), TxKind::Unrecognized);
}

#[test]
fn test_selector_match_ignores_case() {
    let input = transfer_call("3e8").replace("0xa9059cbb", "0xA9059CBB");
    assert!(matches!(classify(&input, CONTRACT), TxKind::TokenTransfer(_)));
}

#[test]
fn test_trailing_call_data_is_tolerated() {
    let input = format!("{}{}", transfer_call("3e8"), "ff".repeat(4));
    assert!(matches!(classify(&input, CONTRACT), TxKind::TokenTransfer(_)));
}
