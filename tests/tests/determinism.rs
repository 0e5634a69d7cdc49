mod common;

use anyhow::Result;
use common::*;
use trellis::{Ledger, Unit, UnitId};

/// Rounds of two sibling units on all free units, by different witnesses. Both siblings of
/// a round are composed before either is submitted, so they reference the same last ball
/// and may arrive in either order.
async fn braided_history(rounds: usize) -> Result<(Network, Vec<[Unit; 2]>)> {
    let mut network = Network::new()?;
    let ledger = network.ledger().await?;
    let mut pairs = Vec::with_capacity(rounds);
    for _ in 0..rounds {
        let parents = ledger.free_units().await;
        let left_author = network.next_witness();
        let left = network.compose(&ledger, &left_author, &parents, &[]).await?;
        network.record(&left);
        let right_author = network.next_witness();
        let right = network.compose(&ledger, &right_author, &parents, &[]).await?;
        network.record(&right);
        ledger.submit_unit(trellis::Joint::new(left.clone())).await?;
        ledger.submit_unit(trellis::Joint::new(right.clone())).await?;
        pairs.push([left, right]);
    }
    Ok((network, pairs))
}

async fn ledger_fed(network: &Network, pairs: &[[Unit; 2]], swap: impl Fn(usize) -> bool) -> Result<Ledger> {
    let ledger = network.ledger().await?;
    for (round, [left, right]) in pairs.iter().enumerate() {
        let order = if swap(round) { [right, left] } else { [left, right] };
        replay(&ledger, &order.map(|u| u.clone())).await?;
    }
    Ok(ledger)
}

#[tokio::test]
async fn every_arrival_order_yields_the_same_consensus() -> Result<()> {
    let (network, pairs) = braided_history(16).await?;
    let units: Vec<UnitId> = network.history.iter().map(|u| u.unit).collect();

    let reference = ledger_fed(&network, &pairs, |_| false).await?;
    let others = [
        ledger_fed(&network, &pairs, |_| true).await?,
        ledger_fed(&network, &pairs, |round| round % 2 == 0).await?,
        ledger_fed(&network, &pairs, |round| round % 3 == 1).await?,
    ];
    assert!(reference.last_stable_mci().await >= Some(5));

    for other in &others {
        assert_eq!(reference.main_chain().await, other.main_chain().await);
        assert_eq!(reference.last_stable_mci().await, other.last_stable_mci().await);
        assert_eq!(reference.last_stable_ball().await, other.last_stable_ball().await);
        for unit in &units {
            let expected = reference.unit_props(unit).await.expect("unit is known");
            let actual = other.unit_props(unit).await.expect("unit is known");
            assert_eq!(expected, actual, "unit {unit}");
            assert_eq!(reference.ball(unit).await, other.ball(unit).await, "ball of {unit}");
        }
    }
    Ok(())
}

#[tokio::test]
async fn off_chain_siblings_take_the_next_index() -> Result<()> {
    let (network, pairs) = braided_history(8).await?;
    let ledger = ledger_fed(&network, &pairs, |_| false).await?;

    for [left, right] in &pairs[..pairs.len() - 1] {
        let left_props = ledger.unit_props(&left.unit).await.expect("left is known");
        let right_props = ledger.unit_props(&right.unit).await.expect("right is known");
        // exactly one sibling carries the main chain through the round
        assert!(left_props.is_on_main_chain ^ right_props.is_on_main_chain);
        assert_eq!(left_props.level, right_props.level);
        let on_chain = if left_props.is_on_main_chain { &left_props } else { &right_props };
        let off_chain = if left_props.is_on_main_chain { &right_props } else { &left_props };
        assert_eq!(off_chain.main_chain_index, on_chain.main_chain_index.map(|mci| mci + 1));
    }
    Ok(())
}
