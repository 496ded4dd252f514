// Key layout of the index. The read service depends on these names; renaming
// any of them is a breaking change for it.

pub const QUEUE_BLOCKS: &str = "queue:blocks";
pub const QUEUE_DEAD: &str = "queue:dead";
pub const TRANSACTIONS_ORDER: &str = "transactions:order";
pub const ACCOUNT_ORDER: &str = "account:order";

// Scores of a queue:blocks member
pub const PENDING: f64 = 0.0;
pub const DONE: f64 = 1.0;

pub fn block_detail(number: u64) -> String {
    format!("block:{}:detail", number)
}

pub fn block_tx_list(number: u64) -> String {
    format!("block:{}:tx_list", number)
}

pub fn tx_detail(number: u64, hash: &str) -> String {
    format!("block_tx:{}:{}:detail", number, hash)
}

// Participants of one transaction: sender at score 0, recipient at score 1
pub fn tx_accounts(number: u64, hash: &str) -> String {
    format!("block_tx:{}:{}:list", number, hash)
}

pub fn tx_transfer(number: u64, hash: &str) -> String {
    format!("block_tx:{}:{}:transfer", number, hash)
}

pub fn account_tx_list(address: &str) -> String {
    format!("account:{}:tx_list", address)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_match_read_service_layout() {
        assert_eq!(block_detail(150000), "block:150000:detail");
        assert_eq!(block_tx_list(150000), "block:150000:tx_list");
        assert_eq!(tx_detail(7, "0xabc"), "block_tx:7:0xabc:detail");
        assert_eq!(tx_accounts(7, "0xabc"), "block_tx:7:0xabc:list");
        assert_eq!(account_tx_list("0xdef"), "account:0xdef:tx_list");
    }
}
