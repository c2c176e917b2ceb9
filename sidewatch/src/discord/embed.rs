//! Embed rendering for blocks and miners.
//!
//! Pure functions from observer payloads to Discord embed JSON. Fields
//! that are absent from a payload are left out of the embed rather than
//! rendered as placeholders, except where a value is the whole point of
//! the embed (then "N/A" keeps the layout stable).

use serde_json::{json, Value};

use crate::observer::events::FoundBlockEvent;
use crate::observer::types::{MinerInfo, PoolInfo, SideBlock};

const COLOR_GREEN: u32 = 0x2ecc71;
const COLOR_BLUE: u32 = 0x3498db;
const COLOR_RED: u32 = 0xe74c3c;
const COLOR_ORANGE: u32 = 0xe67e22;
const COLOR_TEAL: u32 = 0x1abc9c;

const FOOTER: &str = "Data from the pool observer";

/// Atomic units per coin.
const ATOMIC_UNITS: f64 = 1e12;

/// Whether a latest-block embed announces a fresh block or answers a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockContext {
    Latest,
    Notification,
}

fn field(name: &str, value: impl Into<Value>, inline: bool) -> Value {
    let value: Value = value.into();
    json!({ "name": name, "value": value, "inline": inline })
}

/// `abcdef1234...` code-formatted prefix of a hash-like string.
fn short_hash(hash: &str) -> String {
    match hash.get(..16) {
        Some(prefix) => format!("`{prefix}...`"),
        None => format!("`{hash}`"),
    }
}

/// `abcdefgh...wxyz` abbreviation of a wallet address.
fn short_address(address: &str) -> String {
    match (address.get(..8), address.get(address.len().saturating_sub(4)..)) {
        (Some(head), Some(tail)) if address.len() > 12 => format!("`{head}...{tail}`"),
        _ => format!("`{address}`"),
    }
}

/// Discord relative-time markup for a unix timestamp.
fn relative_ts(ts: u64) -> String {
    format!("<t:{ts}:R>")
}

/// Thousands-separated decimal rendering, for difficulty values.
fn group_digits(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    let lead = digits.len() % 3;
    for (i, c) in digits.chars().enumerate() {
        if i != 0 && (i + 3 - lead) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

fn reward_coins(atomic: u64) -> String {
    format!("{:.6} XMR", atomic as f64 / ATOMIC_UNITS)
}

/// Embed for a `side_block` stream event.
pub fn side_block(block: &SideBlock) -> Value {
    let mut fields = Vec::new();
    if let Some(h) = block.side_height {
        fields.push(field("Sidechain Height", h.to_string(), true));
    }
    if let Some(h) = block.main_height {
        fields.push(field("Mainchain Height", h.to_string(), true));
    }
    if let Some(id) = &block.template_id {
        fields.push(field("Template ID", short_hash(id), true));
    }
    if let Some(ts) = block.timestamp {
        fields.push(field("Timestamp", relative_ts(ts), true));
    }
    if let Some(d) = block.difficulty {
        fields.push(field("Difficulty", group_digits(d), true));
    }
    if let Some(addr) = &block.miner_address {
        fields.push(field("Found By", short_address(addr), true));
    }

    json!({
        "title": "New Sidechain Block",
        "color": COLOR_TEAL,
        "fields": fields,
        "footer": { "text": FOOTER },
    })
}

/// Embed for a `found_block` stream event.
pub fn found_block(found: &FoundBlockEvent) -> Value {
    let mut fields = Vec::new();
    let main = found.main_block.as_ref();

    if let Some(h) = main.and_then(|m| m.height) {
        fields.push(field("Mainnet Height", h.to_string(), true));
    }
    if let Some(id) = main.and_then(|m| m.id.as_ref()) {
        fields.push(field("Main Block ID", short_hash(id), true));
    }
    if let Some(reward) = main.and_then(|m| m.reward) {
        fields.push(field("Mainnet Reward", reward_coins(reward), true));
    }
    if let Some(h) = found.side_height() {
        fields.push(field("Sidechain Height", h.to_string(), true));
    }
    if let Some(ts) = found.timestamp {
        fields.push(field("Timestamp", relative_ts(ts), true));
    }
    if let Some(addr) = &found.miner_address {
        fields.push(field("Found By", short_address(addr), true));
    }

    json!({
        "title": "Pool Found a Mainnet Block!",
        "color": COLOR_GREEN,
        "fields": fields,
        "footer": { "text": FOOTER },
    })
}

/// Embed for the sidechain tip out of a full pool info payload. Serves
/// both the `latest_block` command and poll-detected notifications.
pub fn pool_block(info: &PoolInfo, context: BlockContext) -> Value {
    let Some(sidechain) = &info.sidechain else {
        return json!({
            "title": "Error",
            "description": "Invalid or empty sidechain data received.",
            "color": COLOR_RED,
        });
    };
    let Some(block) = &sidechain.last_block else {
        return json!({
            "title": "Latest Block Information",
            "description": "Could not retrieve the latest block from the sidechain.",
            "color": COLOR_ORANGE,
        });
    };

    let title = match context {
        BlockContext::Latest => "Latest Sidechain Block",
        BlockContext::Notification => "New Block Found on the Pool!",
    };

    let na = || "N/A".to_string();
    let mut fields = vec![
        field(
            "Sidechain Height",
            block.side_height.map(|h| h.to_string()).unwrap_or_else(na),
            true,
        ),
        field(
            "Block Hash",
            block.main_id.as_deref().map(short_hash).unwrap_or_else(na),
            true,
        ),
        field(
            "Template ID",
            block
                .template_id
                .as_deref()
                .map(short_hash)
                .unwrap_or_else(na),
            true,
        ),
        field(
            "Timestamp",
            block.timestamp.map(relative_ts).unwrap_or_else(na),
            true,
        ),
        field(
            "Difficulty",
            block.difficulty.map(group_digits).unwrap_or_else(na),
            true,
        ),
        field(
            "Found By",
            block
                .miner_address
                .as_deref()
                .map(short_address)
                .unwrap_or_else(na),
            true,
        ),
    ];

    if let Some(main) = sidechain.last_found.as_ref().and_then(|f| f.main_block.as_ref()) {
        fields.push(field("Last Mainnet Block Found by Pool", "\u{200b}", false));
        fields.push(field(
            "Mainnet Height",
            main.height.map(|h| h.to_string()).unwrap_or_else(na),
            true,
        ));
        fields.push(field(
            "Mainnet Block ID",
            main.id.as_deref().map(short_hash).unwrap_or_else(na),
            true,
        ));
        fields.push(field(
            "Mainnet Reward",
            main.reward.map(reward_coins).unwrap_or_else(na),
            true,
        ));
    }

    json!({
        "title": title,
        "color": COLOR_GREEN,
        "fields": fields,
        "footer": { "text": FOOTER },
    })
}

/// Embed answering a miner lookup.
pub fn miner(address: &str, info: &MinerInfo) -> Value {
    let title = if address.len() > 18 {
        format!(
            "Miner Information: {}...{}",
            &address[..12],
            &address[address.len() - 6..]
        )
    } else {
        format!("Miner Information: {address}")
    };

    let na = || "N/A".to_string();
    let mut fields = vec![
        field(
            "Miner ID",
            info.id.map(|id| id.to_string()).unwrap_or_else(na),
            true,
        ),
        field(
            "Address",
            format!("`{}`", info.address.as_deref().unwrap_or(address)),
            false,
        ),
    ];

    if info.shares.is_empty() {
        fields.push(field("Shares", "No share data found", true));
    } else {
        fields.push(field("Total Shares", info.total_shares().to_string(), true));
        fields.push(field("Total Uncles", info.total_uncles().to_string(), true));
    }

    fields.push(field(
        "Last Share Submitted",
        info.last_share_timestamp.map(relative_ts).unwrap_or_else(na),
        true,
    ));
    fields.push(field(
        "Last Share Height",
        info.last_share_height
            .map(|h| h.to_string())
            .unwrap_or_else(na),
        true,
    ));

    json!({
        "title": title,
        "color": COLOR_BLUE,
        "fields": fields,
        "footer": { "text": FOOTER },
    })
}

/// Embed for a miner the pool has never seen.
pub fn miner_not_found(address: &str) -> Value {
    json!({
        "title": "Miner Not Found",
        "description": format!(
            "Could not retrieve information for miner: `{address}`\n\
             The address might be invalid or not found on the pool."
        ),
        "color": COLOR_RED,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADDRESS: &str = "4AdUndXHHZ6cfufTMvppY6JwXNouMBzSkbLYfpAV5UsxyP3kPaTiN99BiiBZ2gLjubbXQ6DUgFK5rriBgSXhSkVs96JXYdd";

    fn full_pool_info() -> PoolInfo {
        serde_json::from_str(
            r#"{
                "sidechain": {
                    "last_block": {
                        "side_height": 500123,
                        "main_id": "abcd1234abcd1234abcd1234abcd1234",
                        "template_id": "ffee0011ffee0011ffee0011ffee0011",
                        "timestamp": 1700000000,
                        "difficulty": 120000000,
                        "miner_address": "4AdUndXHHZ6cfufTMvppY6JwXNouMBzSkbLYfpAV5Usx"
                    },
                    "last_found": {
                        "main_block": {
                            "height": 3210950,
                            "id": "deadbeefdeadbeefdeadbeefdeadbeef",
                            "reward": 600000000000
                        }
                    }
                }
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn group_digits_inserts_separators() {
        assert_eq!(group_digits(0), "0");
        assert_eq!(group_digits(999), "999");
        assert_eq!(group_digits(1_000), "1,000");
        assert_eq!(group_digits(120_000_000), "120,000,000");
        assert_eq!(group_digits(12_345), "12,345");
    }

    #[test]
    fn short_forms_do_not_panic_on_short_input() {
        assert_eq!(short_hash("ab"), "`ab`");
        assert_eq!(short_address("short"), "`short`");
        assert_eq!(
            short_hash("abcd1234abcd1234abcd1234"),
            "`abcd1234abcd1234...`"
        );
        assert!(short_address(ADDRESS).starts_with("`4AdUndXH..."));
    }

    #[test]
    fn pool_block_titles_follow_context() {
        let info = full_pool_info();
        assert_eq!(
            pool_block(&info, BlockContext::Latest)["title"],
            json!("Latest Sidechain Block")
        );
        assert_eq!(
            pool_block(&info, BlockContext::Notification)["title"],
            json!("New Block Found on the Pool!")
        );
    }

    #[test]
    fn pool_block_includes_last_found_section() {
        let info = full_pool_info();
        let embed = pool_block(&info, BlockContext::Latest);
        let fields = embed["fields"].as_array().unwrap();
        // 6 tip fields, one separator, 3 mainnet fields.
        assert_eq!(fields.len(), 10);
        assert_eq!(fields[8]["value"], json!("`deadbeefdeadbeef...`"));
        assert_eq!(fields[9]["value"], json!("0.600000 XMR"));
    }

    #[test]
    fn pool_block_degrades_when_payload_is_partial() {
        let empty: PoolInfo = serde_json::from_str(r#"{}"#).unwrap();
        let embed = pool_block(&empty, BlockContext::Latest);
        assert_eq!(embed["title"], json!("Error"));

        let no_block: PoolInfo = serde_json::from_str(r#"{"sidechain": {}}"#).unwrap();
        let embed = pool_block(&no_block, BlockContext::Latest);
        assert_eq!(embed["title"], json!("Latest Block Information"));
    }

    #[test]
    fn miner_embed_abbreviates_the_title_address() {
        let info: MinerInfo =
            serde_json::from_str(r#"{"id": 42, "shares": [{"shares": 3, "uncles": 1}]}"#).unwrap();
        let embed = miner(ADDRESS, &info);
        let title = embed["title"].as_str().unwrap();
        assert!(title.starts_with("Miner Information: 4AdUndXHHZ6c..."));
        assert!(title.ends_with("JXYdd"));

        let fields = embed["fields"].as_array().unwrap();
        assert_eq!(fields[2]["name"], json!("Total Shares"));
        assert_eq!(fields[2]["value"], json!("3"));
    }

    #[test]
    fn miner_embed_notes_missing_share_data() {
        let info: MinerInfo = serde_json::from_str(r#"{"id": 42}"#).unwrap();
        let embed = miner("short-address", &info);
        let fields = embed["fields"].as_array().unwrap();
        assert_eq!(fields[2]["name"], json!("Shares"));
        assert_eq!(fields[2]["value"], json!("No share data found"));
    }

    #[test]
    fn side_block_embed_omits_absent_fields() {
        let block: SideBlock =
            serde_json::from_str(r#"{"side_height": 500124, "difficulty": 1000}"#).unwrap();
        let embed = side_block(&block);
        let fields = embed["fields"].as_array().unwrap();
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[1]["value"], json!("1,000"));
    }

    #[test]
    fn found_block_embed_renders_reward_in_coins() {
        let found: FoundBlockEvent = serde_json::from_str(
            r#"{"side_height": 500200, "main_block": {"height": 3211000, "reward": 612345678901}}"#,
        )
        .unwrap();
        let embed = found_block(&found);
        let fields = embed["fields"].as_array().unwrap();
        assert_eq!(fields[1]["value"], json!("0.612346 XMR"));
    }
}
