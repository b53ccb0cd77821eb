use dimp_sdk::{
    model::NewUser,
    store::LedgerStore,
    test::{setup_fmt_tracing, TestEnv},
    utils::{ReferralLevel, TxKind, UserId},
};
use rust_decimal_macros::dec;

async fn upline_chain(env: &TestEnv, len: usize) -> eyre::Result<Vec<UserId>> {
    let mut ids: Vec<UserId> = Vec::with_capacity(len);
    for idx in 0..len {
        let mut user = NewUser::builder()
            .google_name(format!("user {idx}"))
            .build();
        user.upline = ids.last().copied();
        ids.push(env.store.insert_user(user).await?.id);
    }
    Ok(ids)
}

#[tokio::test]
async fn commissions_accumulate_per_level() -> eyre::Result<()> {
    let _guard = setup_fmt_tracing("info");
    let span = tracing::info_span!("commissions_accumulate_per_level");
    let _enter = span.enter();

    let env = TestEnv::new();
    // root <- a <- b <- c
    let ids = upline_chain(&env, 4).await?;
    let (root, a, b, c) = (ids[0], ids[1], ids[2], ids[3]);

    let credit = env
        .client
        .credit(c, TxKind::Reward, dec!(100), dec!(10))
        .await?;
    assert_eq!(credit.referral.len(), 3);
    env.client
        .credit(c, TxKind::Reward, dec!(50), dec!(0))
        .await?;

    let b_stats = env.client.referral_stats(b).await?;
    assert_eq!(b_stats.lvl_one_counter, 1);
    assert_eq!(b_stats.dimp_lvl_one, dec!(0.07) * dec!(150));
    assert_eq!(b_stats.dact_lvl_one, dec!(0.7));

    let a_stats = env.client.referral_stats(a).await?;
    assert_eq!(a_stats.lvl_two_counter, 1);
    assert_eq!(a_stats.dimp_lvl_two, dec!(7.5));

    let root_stats = env.client.referral_stats(root).await?;
    assert_eq!(root_stats.total_counter, 1);
    assert_eq!(root_stats.dimp_lvl_three, dec!(4.5));

    let relations = env.store.referrals_of(root).await?;
    assert_eq!(relations.len(), 1);
    assert_eq!(relations[0].originator, c);
    assert_eq!(relations[0].level, ReferralLevel::Three);
    assert_eq!(relations[0].originator_name, "user 3");

    let b_user = env.store.user(b).await?.unwrap();
    assert_eq!(b_user.rewards, dec!(10.5));
    assert_eq!(b_user.dimp_earned, dec!(10.5));
    assert_eq!(b_user.buffer, dec!(0));
    Ok(())
}

#[tokio::test]
async fn short_chain_stops_early() -> eyre::Result<()> {
    let env = TestEnv::new();
    let ids = upline_chain(&env, 2).await?;
    let credits = env
        .client
        .referral_distributor()
        .distribute(&env.client.app_config().await?, ids[1], dec!(100), dec!(0))
        .await?;
    assert_eq!(credits.len(), 1);
    assert_eq!(credits[0].beneficiary, ids[0]);

    // The root has no upline.
    let credits = env
        .client
        .referral_distributor()
        .distribute(&env.client.app_config().await?, ids[0], dec!(100), dec!(0))
        .await?;
    assert!(credits.is_empty());
    Ok(())
}

#[tokio::test]
async fn referral_pages() -> eyre::Result<()> {
    let env = TestEnv::new();
    let root = env.store.insert_user(NewUser::builder().build()).await?;
    let mut downlines = Vec::new();
    for _ in 0..5 {
        let user = env
            .store
            .insert_user(NewUser::builder().upline(root.id).build())
            .await?;
        env.client.referral_distributor().link(user.id).await?;
        downlines.push(user.id);
    }

    let first = env.client.referral_page(root.id, 1, 2).await?;
    assert_eq!(first.count, 5);
    assert_eq!(first.previous, None);
    assert_eq!(first.next, Some(2));
    let newest: Vec<_> = first.results.iter().map(|r| r.originator).collect();
    assert_eq!(newest, vec![downlines[4], downlines[3]]);

    let last = env.client.referral_page(root.id, 3, 2).await?;
    assert_eq!(last.results.len(), 1);
    assert_eq!(last.results[0].originator, downlines[0]);
    assert_eq!(last.next, None);
    assert_eq!(last.previous, Some(2));

    assert!(env.client.referral_page(root.id, 0, 2).await.is_err());
    assert!(env.client.referral_page(root.id, 1, 101).await.is_err());
    Ok(())
}
