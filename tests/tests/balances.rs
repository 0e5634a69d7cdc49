mod common;

use anyhow::Result;
use common::*;
use trellis::Balance;

#[tokio::test]
async fn payments_are_pending_until_stable() -> Result<()> {
    let mut network = Network::new()?;
    let ledger = network.ledger().await?;
    let payer = network.user(0);
    let payee = address_of(&network.user(1));

    let tip = ledger.free_units().await;
    let payment = network.pay(&ledger, &payer, &tip, &payee, 5_000).await?;
    assert_eq!(ledger.query_balance(&payee).await?, Balance { stable: genesis_holding(), pending: 5_000 });
    let payer_balance = ledger.query_balance(&address_of(&payer)).await?;
    assert!(payer_balance.stable < genesis_holding());
    assert!(payer_balance.pending > 0);

    network.extend(&ledger, 10).await?;
    assert!(ledger.is_stable(&payment).await);
    assert_eq!(ledger.query_balance(&payee).await?, Balance { stable: genesis_holding() + 5_000, pending: 0 });

    let outputs = ledger.spendable_outputs(&payee).await?;
    assert_eq!(outputs.len(), COINS_PER_HOLDER as usize + 1);
    assert!(outputs.iter().any(|(output, amount)| output.unit == payment && *amount == 5_000));
    Ok(())
}

#[tokio::test]
async fn balances_follow_a_payment_chain() -> Result<()> {
    let mut network = Network::new()?;
    let ledger = network.ledger().await?;
    let (first, second, third) = (network.user(0), network.user(1), address_of(&network.user(2)));

    let tip = ledger.free_units().await;
    let payment = network.pay(&ledger, &first, &tip, &address_of(&second), 7_000).await?;
    network.extend(&ledger, 2).await?;

    assert!(ledger.spendable_outputs(&address_of(&second)).await?.iter().all(|(output, _)| output.unit != payment), "not stable yet");
    let tip = ledger.free_units().await;
    let forwarded = network.pay(&ledger, &second, &tip, &third, 3_000).await?;
    network.extend(&ledger, 10).await?;
    assert!(ledger.is_stable(&forwarded).await);

    let second_balance = ledger.query_balance(&address_of(&second)).await?;
    let fees = network.history.iter().find(|u| u.unit == forwarded).map(|u| u.headers_commission + u.payload_commission).unwrap_or_default();
    // authoring a unit can earn headers commission on its parent
    let earned: u64 = ledger.commission_earnings(&address_of(&second)).await.iter().map(|(_, amount)| amount).sum();
    assert_eq!(second_balance, Balance { stable: genesis_holding() + 7_000 - 3_000 - fees + earned, pending: 0 });
    assert_eq!(ledger.query_balance(&third).await?.stable, genesis_holding() + 3_000);
    Ok(())
}

#[tokio::test]
async fn revealed_definitions_are_remembered() -> Result<()> {
    let mut network = Network::new()?;
    let ledger = network.ledger().await?;
    let user = network.user(2);
    assert!(ledger.definition(&address_of(&user)).await.is_none());

    let tip = ledger.free_units().await;
    network.submit(&ledger, &user, &tip).await?;
    let definition = ledger.definition(&address_of(&user)).await.expect("definition was revealed");
    assert_eq!(definition.address()?, address_of(&user));
    Ok(())
}
