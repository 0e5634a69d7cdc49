mod common;

use anyhow::Result;
use common::*;
use trellis::core::CommissionKey;
use trellis::proto::{sha256_hex, CommissionKind, Input, ProtocolConfig};
use trellis::{Joint, Ledger, RejectionKind, Unit, UnitId};

fn headers_key(address: &trellis::Address, mci: u64) -> CommissionKey { CommissionKey { address: address.clone(), kind: CommissionKind::Headers, mci } }

fn witnessing_key(address: &trellis::Address, mci: u64) -> CommissionKey {
    CommissionKey { address: address.clone(), kind: CommissionKind::Witnessing, mci }
}

fn author_of(unit: &Unit) -> trellis::Address { unit.authors[0].address.clone() }

/// `u2` gets three children that the next main chain unit all includes: two side units and
/// the main chain unit itself.
struct TieBreak {
    network: Network,
    payer: Unit,
    side: [Unit; 2],
    next: Unit,
}

async fn tie_break_history() -> Result<TieBreak> {
    let mut network = Network::new()?;
    let ledger = network.ledger().await?;
    let line = network.extend(&ledger, 2).await?;
    let payer_id = line[1];

    let author = network.next_witness();
    let c1 = network.compose(&ledger, &author, &[payer_id], &[]).await?;
    network.record(&c1);
    let author = network.next_witness();
    let c2 = network.compose(&ledger, &author, &[payer_id], &[]).await?;
    network.record(&c2);
    ledger.submit_unit(Joint::new(c1.clone())).await?;
    ledger.submit_unit(Joint::new(c2.clone())).await?;

    let author = network.next_witness();
    let mut parents = vec![payer_id, c1.unit, c2.unit];
    parents.sort();
    let next = network.compose(&ledger, &author, &parents, &[]).await?;
    network.submit_unit(&ledger, next.clone()).await?;
    network.extend(&ledger, 12).await?;

    let payer = network.history.iter().find(|u| u.unit == payer_id).cloned().expect("payer was recorded");
    Ok(TieBreak { network, payer, side: [c1, c2], next })
}

#[tokio::test]
async fn headers_commission_goes_to_the_smallest_child_hash() -> Result<()> {
    let TieBreak { network, payer, side, next } = tie_break_history().await?;
    let ledger = Ledger::in_memory(network.config()).await?;
    replay(&ledger, &network.history).await?;

    let next_props = ledger.unit_props(&next.unit).await.expect("next is known");
    assert!(next_props.is_on_main_chain);
    assert_eq!(next_props.best_parent, Some(payer.unit));
    assert!(ledger.is_stable(&next.unit).await);

    let children = [&side[0], &side[1], &next];
    for child in children {
        assert_eq!(ledger.unit_props(&child.unit).await.and_then(|p| p.main_chain_index), Some(3));
    }
    let winner = children.iter().min_by_key(|child| sha256_hex(format!("{}{}", child.unit, next.unit).as_bytes())).expect("three children");

    for child in children {
        let earnings = ledger.commission_earnings(&author_of(child)).await;
        let earned = earnings.iter().find(|(key, _)| *key == headers_key(&author_of(child), 2)).map(|(_, amount)| *amount);
        if child.unit == winner.unit {
            assert_eq!(earned, Some(payer.headers_commission));
        } else {
            assert_eq!(earned, None);
        }
    }
    Ok(())
}

#[tokio::test]
async fn headers_commission_winner_ignores_arrival_order() -> Result<()> {
    let TieBreak { network, side, .. } = tie_break_history().await?;

    let in_order = Ledger::in_memory(network.config()).await?;
    replay(&in_order, &network.history).await?;

    let mut swapped_history = network.history.clone();
    let first = swapped_history.iter().position(|u| u.unit == side[0].unit).expect("side unit recorded");
    let second = swapped_history.iter().position(|u| u.unit == side[1].unit).expect("side unit recorded");
    swapped_history.swap(first, second);
    let swapped = Ledger::in_memory(network.config()).await?;
    replay(&swapped, &swapped_history).await?;

    let mut payees: Vec<trellis::Address> = network.witness_addresses();
    payees.push(address_of(&network.treasury));
    for address in &payees {
        assert_eq!(in_order.commission_earnings(address).await, swapped.commission_earnings(address).await, "{address:#}");
    }
    assert_eq!(in_order.main_chain().await, swapped.main_chain().await);
    Ok(())
}

#[tokio::test]
async fn witnessing_commission_pays_witnesses_that_followed() -> Result<()> {
    let mut network = Network::with_protocol(ProtocolConfig::default().with_paid_witnessing_window(2))?;
    let ledger = network.ledger().await?;
    let line = network.extend(&ledger, 14).await?;
    assert!(ledger.last_stable_mci().await >= Some(4));

    // u1 is followed within the window by u2 and u3 only
    let u1 = network.history.iter().find(|u| u.unit == line[0]).cloned().expect("u1 recorded");
    let followers: Vec<trellis::Address> = line[1..3]
        .iter()
        .map(|id| network.history.iter().find(|u| u.unit == *id).map(author_of).expect("recorded"))
        .collect();
    let share = u1.payload_commission / 2;
    for witness in network.witness_addresses() {
        let earnings = ledger.commission_earnings(&witness).await;
        let earned = earnings.iter().find(|(key, _)| *key == witnessing_key(&witness, 1)).map(|(_, amount)| *amount);
        if followers.contains(&witness) {
            assert_eq!(earned, Some(share));
        } else {
            assert_eq!(earned, None);
        }
    }
    Ok(())
}

#[tokio::test]
async fn earned_commissions_can_be_spent_once() -> Result<()> {
    let mut network = Network::with_protocol(ProtocolConfig::default().with_paid_witnessing_window(2))?;
    let ledger = network.ledger().await?;
    let line = network.extend(&ledger, 14).await?;

    // the author of u2 earned part of u1's payload commission
    let earner_address = network.history.iter().find(|u| u.unit == line[1]).map(author_of).expect("u2 recorded");
    let earner = network.witnesses.iter().find(|w| address_of(w) == earner_address).cloned().expect("u2 is by a witness");
    let earned = ledger
        .commission_earnings(&earner_address)
        .await
        .into_iter()
        .find(|(key, _)| *key == witnessing_key(&earner_address, 1))
        .map(|(_, amount)| amount)
        .expect("u2's author earned witnessing commission");
    let before = ledger.query_balance(&earner_address).await?;

    let tip: Vec<UnitId> = ledger.free_units().await;
    let coin = network.coin_for(&ledger, &earner_address, &tip).await?;
    let commission = Input::Witnessing { from_main_chain_index: 1, to_main_chain_index: 1, address: None };
    let inputs = [(coin.input(), coin.amount), (commission.clone(), earned)];
    let claim = network.compose_with(&ledger, &earner, &tip, &inputs, &[]).await?;
    let claim = network.submit_unit(&ledger, claim).await?.unit;

    let after = ledger.query_balance(&earner_address).await?;
    assert_eq!(after.stable + after.pending + claim_fees(&network, &claim), before.stable + before.pending);

    // the same range again, on top of the first claim
    let coin = network.coin_for(&ledger, &earner_address, &[claim]).await?;
    let inputs = [(coin.input(), coin.amount), (commission, earned)];
    let again = network.compose_with(&ledger, &earner, &[claim], &inputs, &[]).await?;
    let rejection = ledger.submit_unit(Joint::new(again)).await.unwrap_err();
    assert_eq!(rejection.kind(), RejectionKind::Invalid);
    Ok(())
}

fn claim_fees(network: &Network, unit: &UnitId) -> u64 {
    network.history.iter().find(|u| u.unit == *unit).map(|u| u.headers_commission + u.payload_commission).unwrap_or_default()
}

#[tokio::test]
async fn commission_beyond_the_paid_range_is_not_spendable() -> Result<()> {
    let network = Network::with_protocol(ProtocolConfig::default().with_paid_witnessing_window(2))?;
    let ledger = network.ledger().await?;

    let author = network.next_witness();
    let coin = network.coin_for(&ledger, &address_of(&author), &[network.genesis.unit]).await?;
    let commission = Input::HeadersCommission { from_main_chain_index: 0, to_main_chain_index: 5, address: None };
    let inputs = [(coin.input(), coin.amount), (commission, 10)];
    let unit = network.compose_with(&ledger, &author, &[network.genesis.unit], &inputs, &[]).await?;
    let rejection = ledger.submit_unit(Joint::new(unit)).await.unwrap_err();
    assert_eq!(rejection.kind(), RejectionKind::Invalid);
    Ok(())
}
