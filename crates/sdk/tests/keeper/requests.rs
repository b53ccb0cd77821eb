use dimp_sdk::{
    cache::write_snapshot,
    error::Rejection,
    evm_utils::alloy::primitives::{Address, U256},
    reconcile::ReconcileAction,
    store::LedgerStore,
    test::{setup_fmt_tracing, TestEnv},
    utils::{TxStatus, UserId},
};
use rust_decimal_macros::dec;

#[tokio::test]
async fn request_approve_and_sync() -> eyre::Result<()> {
    let _guard = setup_fmt_tracing("info");
    let span = tracing::info_span!("request_approve_and_sync");
    let _enter = span.enter();

    let env = TestEnv::new();
    let address = Address::repeat_byte(7);
    let user = env.user(Some(address), dec!(0), dec!(2500)).await?;
    write_snapshot(&env.cache, user.id, dec!(0)).await?;

    let request = env.client.request_sync(user.id, dec!(2000)).await?;
    assert_eq!(request.status, TxStatus::Requested);

    // A requested entry is not merged.
    let report = env.client.sync(user.id).await?;
    assert_eq!(report.merged, None);

    let err = env
        .client
        .request_sync(user.id, dec!(2000))
        .await
        .unwrap_err();
    assert_eq!(err.rejection(), Some(Rejection::WaitUntilResolved));
    assert_eq!(err.rejection().map(|r| r.code()), Some("wait_until_resolved"));

    env.client
        .approve_sync_request(user.id, Some(UserId(1)))
        .await?;
    let report = env.client.sync(user.id).await?;
    assert_eq!(report.merged, Some(dec!(2000)));
    assert!(matches!(report.action, ReconcileAction::Written { .. }));
    assert_eq!(
        env.chain.balance_of(address),
        U256::from(2_000_000_000u64)
    );

    let user = env.store.user(user.id).await?.unwrap();
    assert_eq!(user.buffer, dec!(2000));
    assert_eq!(user.rewards, dec!(500));

    let data = env.client.check_withdrawal(user.id, dec!(1500)).await?;
    assert_eq!(data.balance, dec!(2000));
    let err = env
        .client
        .check_withdrawal(user.id, dec!(2001))
        .await
        .unwrap_err();
    assert_eq!(err.rejection(), Some(Rejection::InsufficientFunds));
    Ok(())
}

#[tokio::test]
async fn per_user_withdrawal_limits() -> eyre::Result<()> {
    let env = TestEnv::new();
    let user = env.user(None, dec!(50000), dec!(0)).await?;
    {
        let mut tx = env.store.begin().await?;
        let mut locked = tx.lock_user(user.id).await?.unwrap();
        locked.withdraw_min = dec!(5);
        locked.withdraw_max = dec!(10);
        tx.save_user(&locked).await?;
        tx.commit().await?;
    }

    let rejection = |err: dimp_sdk::Error| err.rejection();
    assert_eq!(
        env.client
            .check_withdrawal(user.id, dec!(4999))
            .await
            .map_err(rejection)
            .err(),
        Some(Some(Rejection::MinWithdrawal))
    );
    assert_eq!(
        env.client
            .check_withdrawal(user.id, dec!(10001))
            .await
            .map_err(rejection)
            .err(),
        Some(Some(Rejection::MaxWithdrawal))
    );
    assert!(env.client.check_withdrawal(user.id, dec!(10000)).await.is_ok());
    Ok(())
}
