use dimp_sdk::{
    evm_utils::alloy::primitives::{Address, B256},
    ingest::{ApplyOutcome, Checkpoint, RejectReason},
    store::LedgerStore,
    test::{setup_fmt_tracing, TestEnv},
    utils::{ChainTxStatus, Direction},
};
use rust_decimal_macros::dec;

#[tokio::test]
async fn deposit_is_applied_once() -> eyre::Result<()> {
    let _guard = setup_fmt_tracing("info");
    let span = tracing::info_span!("deposit_is_applied_once");
    let _enter = span.enter();

    let env = TestEnv::new();
    let actor = Address::repeat_byte(1);
    let user = env.user(Some(actor), dec!(0), dec!(0)).await?;
    let hash = B256::repeat_byte(0xa1);
    env.push_log(Direction::Deposit, actor, 2_500_000, hash, 10);

    let watcher = env.client.event_watcher(Direction::Deposit);
    let mut checkpoint = Checkpoint::new(0);
    let first = watcher.poll_once(&mut checkpoint).await?;
    assert_eq!(first.applied, 1);
    assert_eq!(checkpoint.from_block(), 10);

    // Re-scanning the same range must not credit twice.
    let mut rescan = Checkpoint::new(0);
    let second = watcher.poll_once(&mut rescan).await?;
    assert_eq!(second.applied, 0);
    assert_eq!(second.already_processed, 1);
    assert_eq!(rescan.from_block(), 10);

    let user = env.store.user(user.id).await?.unwrap();
    assert_eq!(user.buffer, dec!(2.5));
    let mirror = env.store.chain_transaction(hash).await?.unwrap();
    assert_eq!(mirror.user_id, user.id);
    assert_eq!(mirror.direction, Direction::Deposit);
    assert_eq!(mirror.status, ChainTxStatus::Confirmed);
    assert_eq!(mirror.token_address, TestEnv::TOKEN);

    // The refresh after the commit publishes the fresh balances.
    let envelopes = env.notifier.envelopes();
    let (to, envelope) = envelopes.last().unwrap();
    assert_eq!(*to, user.id);
    assert_eq!(envelope.user.balance, dec!(2.5));
    Ok(())
}

#[tokio::test]
async fn balance_is_conserved() -> eyre::Result<()> {
    let _guard = setup_fmt_tracing("info");

    let env = TestEnv::new();
    let actor = Address::repeat_byte(2);
    let user = env.user(Some(actor), dec!(0), dec!(0)).await?;
    env.push_log(Direction::Deposit, actor, 100_000_000, B256::repeat_byte(1), 10);
    env.push_log(Direction::Withdraw, actor, 30_000_000, B256::repeat_byte(2), 11);
    env.push_log(Direction::Withdraw, actor, 200_000_000, B256::repeat_byte(3), 12);
    env.push_log(Direction::Deposit, actor, 5_000_000, B256::repeat_byte(4), 13);

    let deposits = env.client.event_watcher(Direction::Deposit);
    let withdrawals = env.client.event_watcher(Direction::Withdraw);
    let mut deposit_checkpoint = Checkpoint::new(0);
    let mut withdraw_checkpoint = Checkpoint::new(0);

    let summary = deposits.poll_once(&mut deposit_checkpoint).await?;
    assert_eq!(summary.applied, 2);
    assert_eq!(deposit_checkpoint.from_block(), 13);

    let summary = withdrawals.poll_once(&mut withdraw_checkpoint).await?;
    assert_eq!(summary.applied, 1);
    assert_eq!(summary.rejected, 1);
    assert_eq!(withdraw_checkpoint.from_block(), 11);

    let user = env.store.user(user.id).await?.unwrap();
    assert_eq!(user.buffer, dec!(100) - dec!(30) + dec!(5));
    assert!(env
        .store
        .chain_transaction(B256::repeat_byte(3))
        .await?
        .is_none());
    Ok(())
}

#[tokio::test]
async fn syncing_user_blocks_checkpoint() -> eyre::Result<()> {
    let _guard = setup_fmt_tracing("info");

    let env = TestEnv::new();
    let busy = Address::repeat_byte(3);
    let idle = Address::repeat_byte(4);
    let busy_user = env.user(Some(busy), dec!(0), dec!(0)).await?;
    let idle_user = env.user(Some(idle), dec!(0), dec!(0)).await?;
    env.push_log(Direction::Deposit, busy, 1_000_000, B256::repeat_byte(1), 10);
    env.push_log(Direction::Deposit, idle, 1_000_000, B256::repeat_byte(2), 11);

    let lock = env
        .client
        .reconciler()
        .sync_lock()
        .try_acquire(busy_user.id)
        .await?
        .expect("lock should be free");

    let watcher = env.client.event_watcher(Direction::Deposit);
    let mut checkpoint = Checkpoint::new(5);
    let summary = watcher.poll_once(&mut checkpoint).await?;
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.applied, 1);
    assert_eq!(checkpoint.from_block(), 5);
    assert_eq!(env.store.user(busy_user.id).await?.unwrap().buffer, dec!(0));
    assert_eq!(env.store.user(idle_user.id).await?.unwrap().buffer, dec!(1));

    lock.release().await?;
    let summary = watcher.poll_once(&mut checkpoint).await?;
    assert_eq!(summary.applied, 1);
    assert_eq!(summary.already_processed, 1);
    assert_eq!(checkpoint.from_block(), 11);
    assert_eq!(env.store.user(busy_user.id).await?.unwrap().buffer, dec!(1));
    Ok(())
}

#[tokio::test]
async fn rejected_withdrawal_does_not_hold_checkpoint() -> eyre::Result<()> {
    let _guard = setup_fmt_tracing("info");
    let span = tracing::info_span!("rejected_withdrawal_does_not_hold_checkpoint");
    let _enter = span.enter();

    let env = TestEnv::new();
    let actor = Address::repeat_byte(6);
    let user = env.user(Some(actor), dec!(10), dec!(0)).await?;
    env.push_log(Direction::Withdraw, actor, 20_000_000, B256::repeat_byte(0x60), 11);

    let watcher = env.client.event_watcher(Direction::Withdraw);
    let mut checkpoint = Checkpoint::new(0);
    let summary = watcher.poll_once(&mut checkpoint).await?;
    assert_eq!(summary.rejected, 1);
    assert_eq!(checkpoint.from_block(), 0);

    for (idx, block) in [100u64, 1_100, 2_100].into_iter().enumerate() {
        env.push_log(
            Direction::Withdraw,
            actor,
            1_000_000,
            B256::repeat_byte(0x61 + idx as u8),
            block,
        );
        let summary = watcher.poll_once(&mut checkpoint).await?;
        assert_eq!(summary.applied, 1);
        // The overdraw is rescanned until the checkpoint passes its block.
        assert_eq!(summary.rejected, usize::from(idx == 0));
        assert_eq!(checkpoint.from_block(), block);
    }

    assert_eq!(env.store.user(user.id).await?.unwrap().buffer, dec!(7));
    assert!(env
        .store
        .chain_transaction(B256::repeat_byte(0x60))
        .await?
        .is_none());
    Ok(())
}

#[tokio::test]
async fn non_positive_amount_is_rejected() -> eyre::Result<()> {
    let env = TestEnv::new();
    let actor = Address::repeat_byte(5);
    let user = env.user(Some(actor), dec!(10), dec!(0)).await?;

    for (direction, hash, block) in [
        (Direction::Deposit, B256::repeat_byte(0x55), 7),
        (Direction::Withdraw, B256::repeat_byte(0x56), 8),
    ] {
        env.push_log(direction, actor, 0, hash, block);

        let watcher = env.client.event_watcher(direction);
        let mut checkpoint = Checkpoint::new(0);
        let summary = watcher.poll_once(&mut checkpoint).await?;
        assert_eq!(summary.rejected, 1);
        assert_eq!(summary.applied, 0);
        assert_eq!(checkpoint.from_block(), 0);

        let log =
            dimp_sdk::test::exchange_log(TestEnv::EXCHANGE, direction, actor, 0, hash, block)
                .decode(direction)?;
        assert_eq!(
            watcher.apply_event(&log).await?,
            ApplyOutcome::Rejected(RejectReason::NonPositiveAmount)
        );
        assert!(env.store.chain_transaction(hash).await?.is_none());
    }
    assert_eq!(env.store.user(user.id).await?.unwrap().buffer, dec!(10));
    Ok(())
}

#[tokio::test]
async fn unknown_account_advances_checkpoint() -> eyre::Result<()> {
    let env = TestEnv::new();
    env.push_log(
        Direction::Deposit,
        Address::repeat_byte(9),
        1_000_000,
        B256::repeat_byte(9),
        30,
    );
    let watcher = env.client.event_watcher(Direction::Deposit);
    let mut checkpoint = Checkpoint::new(0);
    let summary = watcher.poll_once(&mut checkpoint).await?;
    assert_eq!(summary.unknown_accounts, 1);
    assert_eq!(checkpoint.from_block(), 30);
    Ok(())
}

#[tokio::test]
async fn rpc_failure_keeps_checkpoint() -> eyre::Result<()> {
    let env = TestEnv::new();
    let watcher = env.client.event_watcher(Direction::Withdraw);
    let mut checkpoint = Checkpoint::new(42);
    env.chain.fail_next(1);
    let err = watcher.poll_once(&mut checkpoint).await.unwrap_err();
    assert!(err.is_transient());
    assert_eq!(checkpoint.from_block(), 42);
    Ok(())
}
