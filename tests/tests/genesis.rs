mod common;

use anyhow::Result;
use common::*;
use trellis::proto::hash::sha256;
use trellis::proto::UnitComposer;
use trellis::{Joint, Ledger, RejectionKind, Sequence, UnitId};

#[tokio::test]
async fn genesis_is_stable_on_arrival() -> Result<()> {
    let network = Network::new()?;
    let ledger = Ledger::in_memory(network.config()).await?;

    let accepted = network.start(&ledger).await?;
    assert_eq!(accepted.sequence, Sequence::Good);
    assert_eq!(accepted.stabilized, vec![0]);
    assert_eq!(accepted.last_stable_mci, Some(0));

    let props = ledger.unit_props(&network.genesis.unit).await.expect("genesis is known");
    assert_eq!(props.level, 0);
    assert_eq!(props.witnessed_level, 0);
    assert_eq!(props.main_chain_index, Some(0));
    assert!(props.is_on_main_chain);
    assert!(props.is_stable);
    assert!(props.is_free);

    let (unit, ball) = ledger.last_stable_ball().await.expect("genesis has a ball");
    assert_eq!(unit, network.genesis.unit);
    assert_eq!(ledger.ball(&unit).await, Some(ball));
    assert_eq!(ledger.query_witness_list().await, network.witness_addresses());
    assert_eq!(ledger.query_witness_list().await.len(), 12);
    Ok(())
}

#[tokio::test]
async fn genesis_funds_are_stable() -> Result<()> {
    let network = Network::new()?;
    let ledger = network.ledger().await?;

    let user = address_of(&network.user(0));
    let balance = ledger.query_balance(&user).await?;
    assert_eq!(balance.stable, genesis_holding());
    assert_eq!(balance.pending, 0);
    assert_eq!(ledger.spendable_outputs(&user).await?.len(), COINS_PER_HOLDER as usize);
    Ok(())
}

#[tokio::test]
async fn a_second_genesis_is_invalid() -> Result<()> {
    let network = Network::new()?;
    let ledger = network.ledger().await?;

    let rogue = key(101);
    let other = UnitComposer::genesis(&network.protocol, network.witness_addresses()).author(&rogue, true).change_to(address_of(&rogue)).compose()?;
    let rejection = ledger.submit_unit(Joint::new(other)).await.unwrap_err();
    assert_eq!(rejection.kind(), RejectionKind::Invalid);
    assert_eq!(ledger.main_chain().await, vec![(0, network.genesis.unit)]);
    Ok(())
}

#[tokio::test]
async fn resubmission_is_already_known() -> Result<()> {
    let mut network = Network::new()?;
    let ledger = network.ledger().await?;
    network.extend(&ledger, 1).await?;

    let rejection = ledger.submit_unit(Joint::new(network.genesis.clone())).await.unwrap_err();
    assert_eq!(rejection.kind(), RejectionKind::AlreadyKnown);
    let last = network.history.last().cloned().expect("one unit was added");
    let rejection = ledger.submit_unit(Joint::new(last)).await.unwrap_err();
    assert_eq!(rejection.kind(), RejectionKind::AlreadyKnown);
    Ok(())
}

#[tokio::test]
async fn tampered_units_are_rejected_without_side_effects() -> Result<()> {
    let network = Network::new()?;
    let ledger = network.ledger().await?;

    let author = network.next_witness();
    let unit = network.compose(&ledger, &author, &[network.genesis.unit], &[]).await?;
    let mut tampered = unit.clone();
    tampered.messages[0].payload.outputs[0].amount += 1;

    let rejection = ledger.submit_unit(Joint::new(tampered)).await.unwrap_err();
    assert_eq!(rejection.kind(), RejectionKind::Invalid);
    assert_eq!(ledger.free_units().await, vec![network.genesis.unit]);
    assert!(ledger.unit_props(&unit.unit).await.is_none());

    // the genuine unit still goes through
    ledger.submit_unit(Joint::new(unit.clone())).await?;
    assert_eq!(ledger.free_units().await, vec![unit.unit]);
    Ok(())
}

#[tokio::test]
async fn unknown_parents_are_unavailable() -> Result<()> {
    let network = Network::new()?;
    let ledger = network.ledger().await?;

    let phantom = UnitId::from_digest(&sha256(b"never seen"));
    let author = network.next_witness();
    let unit = network.compose(&ledger, &author, &[phantom], &[]).await?;
    let rejection = ledger.submit_unit(Joint::new(unit)).await.unwrap_err();
    assert_eq!(rejection.kind(), RejectionKind::Unavailable);
    Ok(())
}
