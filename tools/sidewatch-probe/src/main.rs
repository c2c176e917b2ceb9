//! Hit the observer API by hand and print what comes back.
//!
//! Useful when bringing the bot up against a new pool instance, to check
//! the endpoints and response shape before pointing the daemon at it.
//!
//! ```bash
//! sidewatch-probe                       # pool info from the default observer
//! sidewatch-probe <miner-address>       # plus a miner lookup
//! OBSERVER_API_URL=http://127.0.0.1:9327/api sidewatch-probe
//! ```

use anyhow::Result;

use sidewatch::config::DEFAULT_API_URL;
use sidewatch::observer::ObserverClient;

#[tokio::main]
async fn main() -> Result<()> {
    let base =
        std::env::var("OBSERVER_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string());
    println!("Probing {base}");

    let client = ObserverClient::new(&base)?;

    let info = client.pool_info().await?;
    match info.sidechain.as_ref().and_then(|s| s.last_block.as_ref()) {
        Some(tip) => {
            println!("Sidechain tip:");
            println!("  side height:   {:?}", tip.side_height);
            println!("  main height:   {:?}", tip.main_height);
            println!("  template id:   {:?}", tip.template_id);
            println!("  timestamp:     {:?}", tip.timestamp);
            println!("  difficulty:    {:?}", tip.difficulty);
            println!("  miner address: {:?}", tip.miner_address);
        }
        None => println!("Pool info payload carried no sidechain tip: {info:?}"),
    }

    if let Some(main) = info
        .sidechain
        .as_ref()
        .and_then(|s| s.last_found.as_ref())
        .and_then(|f| f.main_block.as_ref())
    {
        println!("Last mainnet block found by pool:");
        println!("  height: {:?}", main.height);
        println!("  id:     {:?}", main.id);
        println!("  reward: {:?}", main.reward);
    }

    if let Some(address) = std::env::args().nth(1) {
        println!("Looking up miner {address}");
        match client.miner_info(&address).await {
            Ok(miner) => {
                println!("  id:               {:?}", miner.id);
                println!("  total shares:     {}", miner.total_shares());
                println!("  total uncles:     {}", miner.total_uncles());
                println!("  last share height: {:?}", miner.last_share_height);
            }
            Err(e) => println!("  lookup failed: {e}"),
        }
    }

    Ok(())
}
