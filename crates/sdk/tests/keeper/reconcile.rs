use dimp_sdk::{
    cache::{read_snapshot, write_snapshot},
    envelope::Target,
    error::PolicyViolation,
    evm_utils::alloy::primitives::{Address, U256},
    reconcile::ReconcileAction,
    store::LedgerStore,
    test::{setup_fmt_tracing, TestEnv},
    utils::{Decimal, TxKind, TxStatus},
    Error,
};
use rust_decimal_macros::dec;

fn contract_amount(dimp: u64) -> U256 {
    U256::from(dimp) * U256::from(1_000_000u64)
}

#[tokio::test]
async fn first_sync_seeds_baseline() -> eyre::Result<()> {
    let _guard = setup_fmt_tracing("info");

    let env = TestEnv::new();
    let user = env
        .user(Some(Address::repeat_byte(1)), dec!(1234.5), dec!(0))
        .await?;
    let report = env.client.sync(user.id).await?;
    assert_eq!(
        report.action,
        ReconcileAction::BaselineSeeded {
            balance: dec!(1234.5)
        }
    );
    assert_eq!(report.merged, None);
    assert_eq!(
        read_snapshot(&env.cache, user.id).await?,
        Some(dec!(1234.5))
    );
    assert!(env.chain.submissions().is_empty());
    Ok(())
}

#[tokio::test]
async fn drift_threshold() -> eyre::Result<()> {
    let _guard = setup_fmt_tracing("info");
    let span = tracing::info_span!("drift_threshold");
    let _enter = span.enter();

    let env = TestEnv::new();
    let address = Address::repeat_byte(2);
    let user = env.user(Some(address), dec!(1050), dec!(0)).await?;
    write_snapshot(&env.cache, user.id, dec!(1000)).await?;
    env.chain.set_internal_balance(address, contract_amount(1200));

    let report = env.client.sync(user.id).await?;
    assert_eq!(
        report.action,
        ReconcileAction::WithinThreshold { drift: dec!(50) }
    );
    assert!(env.chain.submissions().is_empty());

    // Same snapshot, a drift of 100 triggers the correction.
    {
        let mut tx = env.store.begin().await?;
        let mut locked = tx.lock_user(user.id).await?.unwrap();
        locked.buffer = dec!(1100);
        tx.save_user(&locked).await?;
        tx.commit().await?;
    }
    let report = env.client.sync(user.id).await?;
    let ReconcileAction::Written { amount, .. } = report.action else {
        panic!("expected a write, got {:?}", report.action);
    };
    assert_eq!(amount, contract_amount(1100));
    assert_eq!(env.chain.balance_of(address), contract_amount(1100));
    assert_eq!(read_snapshot(&env.cache, user.id).await?, Some(dec!(1100)));

    let submissions = env.chain.submissions();
    assert_eq!(submissions.len(), 1);
    assert_eq!(submissions[0].call.to, TestEnv::EXCHANGE);
    assert!(submissions[0].gas_limit > 0);
    assert!(
        !env.client
            .reconciler()
            .sync_lock()
            .is_held(user.id)
            .await?
    );
    Ok(())
}

#[tokio::test]
async fn unapproved_increase_is_refused() -> eyre::Result<()> {
    let _guard = setup_fmt_tracing("info");

    let env = TestEnv::new();
    let address = Address::repeat_byte(3);
    let user = env.user(Some(address), dec!(700), dec!(0)).await?;
    write_snapshot(&env.cache, user.id, dec!(500)).await?;
    env.chain.set_internal_balance(address, contract_amount(500));

    let err = env.client.sync(user.id).await.unwrap_err();
    let Error::Policy(PolicyViolation::UnauthorizedIncrease {
        target, on_chain, ..
    }) = err
    else {
        panic!("expected a policy violation, got {err}");
    };
    assert_eq!(target, contract_amount(700));
    assert_eq!(on_chain, contract_amount(500));

    assert!(env.chain.submissions().is_empty());
    assert_eq!(env.chain.balance_of(address), contract_amount(500));
    assert_eq!(env.notifier.alerts().len(), 1);
    assert_eq!(env.notifier.alerts()[0].target, Target::Alert);
    assert_eq!(read_snapshot(&env.cache, user.id).await?, Some(dec!(500)));
    Ok(())
}

#[tokio::test]
async fn approved_rewards_are_merged_and_written() -> eyre::Result<()> {
    let _guard = setup_fmt_tracing("info");

    let env = TestEnv::new();
    let address = Address::repeat_byte(4);
    let user = env.user(Some(address), dec!(1000), dec!(300)).await?;
    write_snapshot(&env.cache, user.id, dec!(1000)).await?;
    env.chain.set_internal_balance(address, contract_amount(1000));

    // 300 DIMP is below the default minimum of 1000 DIMP.
    assert!(env.client.request_sync(user.id, dec!(0)).await.is_err());

    let mut tx = env.store.begin().await?;
    tx.lock_user(user.id).await?;
    tx.insert_internal_transaction(
        dimp_sdk::model::NewInternalTransaction::builder()
            .user_id(user.id)
            .kind(TxKind::Sync)
            .status(TxStatus::Approved)
            .amount(dec!(200))
            .build(),
    )
    .await?;
    tx.commit().await?;

    let report = env.client.sync(user.id).await?;
    assert_eq!(report.merged, Some(dec!(200)));
    assert_eq!(report.envelope.target, Target::Sync);
    assert_eq!(report.envelope.user.balance, dec!(1200));
    assert_eq!(report.envelope.user.rewards, dec!(100));
    assert_eq!(
        report.action,
        ReconcileAction::Written {
            tx_hash: env.chain.submissions()[0].hash,
            amount: contract_amount(1200),
        }
    );

    let user = env.store.user(user.id).await?.unwrap();
    assert_eq!(user.rewards, dec!(100));
    assert_eq!(user.buffer, dec!(1200));
    let entries = env.store.internal_transactions(user.id).await?;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].status, TxStatus::New);

    // Nothing left to merge.
    let report = env.client.sync(user.id).await?;
    assert_eq!(report.merged, None);
    assert_eq!(
        report.action,
        ReconcileAction::WithinThreshold {
            drift: Decimal::ZERO
        }
    );
    Ok(())
}

#[tokio::test]
async fn merge_is_capped_by_rewards() -> eyre::Result<()> {
    let env = TestEnv::new();
    let user = env.user(None, dec!(0), dec!(150)).await?;

    let mut tx = env.store.begin().await?;
    tx.lock_user(user.id).await?;
    tx.insert_internal_transaction(
        dimp_sdk::model::NewInternalTransaction::builder()
            .user_id(user.id)
            .kind(TxKind::Sync)
            .status(TxStatus::Approved)
            .amount(dec!(400))
            .build(),
    )
    .await?;
    tx.commit().await?;

    let merged = env.client.reconciler().merge_rewards(user.id).await?;
    assert_eq!(merged, Some(dec!(150)));
    let user = env.store.user(user.id).await?.unwrap();
    assert_eq!(user.buffer, dec!(150));
    assert_eq!(user.rewards, dec!(0));
    Ok(())
}

#[tokio::test]
async fn matching_chain_balance_refreshes_snapshot() -> eyre::Result<()> {
    let env = TestEnv::new();
    let address = Address::repeat_byte(5);
    let user = env.user(Some(address), dec!(2500.25), dec!(0)).await?;
    write_snapshot(&env.cache, user.id, dec!(1000)).await?;
    env.chain
        .set_internal_balance(address, U256::from(2_500_250_000u64));

    let report = env.client.sync(user.id).await?;
    assert_eq!(
        report.action,
        ReconcileAction::AlreadyInSync {
            amount: U256::from(2_500_250_000u64)
        }
    );
    assert_eq!(read_snapshot(&env.cache, user.id).await?, Some(dec!(2500.25)));
    assert!(env.chain.submissions().is_empty());
    Ok(())
}
