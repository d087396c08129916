use anyhow::Result;

use synai_reporting::Ranking;

use crate::client::RelayClient;

pub async fn ranking(client: &RelayClient) -> Result<()> {
    print_ranking(&client.ranking().await?);
    Ok(())
}

pub async fn balance(client: &RelayClient, agent_id: &str) -> Result<()> {
    let balance = client.balance(agent_id).await?;
    println!("{agent_id}: {balance} USDC");
    Ok(())
}

fn print_ranking(ranking: &Ranking) {
    let stats = &ranking.stats;
    println!(
        "Agents: {}  Bounty volume: {} USDC  Active tasks: {}  Platform revenue: {} USDC",
        stats.total_agents, stats.total_bounty_volume, stats.active_tasks, ranking.platform_revenue
    );

    if ranking.agent_ranking.is_empty() {
        println!("No agents yet.");
    } else {
        println!("\nTop agents:");
        for (rank, a) in ranking.agent_ranking.iter().enumerate() {
            println!(
                "  {:>2}. {:<20} {:>12} USDC  owner: {:<14} {}",
                rank + 1,
                a.agent_id,
                a.balance,
                a.owner_id,
                a.wallet_address
            );
        }
    }

    if !ranking.owner_ranking.is_empty() {
        println!("\nTop owners:");
        for (rank, o) in ranking.owner_ranking.iter().enumerate() {
            println!("  {:>2}. {:<20} {:>12} USDC", rank + 1, o.owner_id, o.total_profit);
        }
    }
}
