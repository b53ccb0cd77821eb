use dimp_utils::{AppConfig, Decimal, Token, TxKind, TxStatus, UserId};
use serde::Serialize;

use crate::{
    error::Rejection,
    model::{InternalTransaction, NewInternalTransaction},
    referral::{LevelCredit, ReferralDistributor},
    store::{lock_existing_user, LedgerStore},
};

/// Result of [`credit`].
#[derive(Debug, Clone, Serialize)]
pub struct Credit {
    /// Recorded entry.
    pub transaction: InternalTransaction,
    /// Commissions paid to the uplines.
    pub referral: Vec<LevelCredit>,
}

/// Credit pending rewards to `user`.
///
/// `reward` credits are followed by the referral distribution; a failure
/// there is logged and leaves the credit committed.
pub async fn credit(
    store: &dyn LedgerStore,
    distributor: &ReferralDistributor,
    config: &AppConfig,
    user: UserId,
    kind: TxKind,
    dimp: Decimal,
    dact: Decimal,
) -> crate::Result<Credit> {
    if !matches!(kind, TxKind::Reward | TxKind::Bonus) {
        return Err(crate::Error::invalid_argument(format!(
            "`{kind}` entries cannot be credited"
        )));
    }
    if dimp < Decimal::ZERO {
        return Err(crate::Error::InvalidAmount(dimp));
    }
    if dact < Decimal::ZERO {
        return Err(crate::Error::InvalidAmount(dact));
    }

    let mut tx = store.begin().await?;
    let mut locked = lock_existing_user(tx.as_mut(), user).await?;
    locked.rewards += dimp;
    locked.dimp_earned += dimp;
    locked.dact_earned += dact;
    if kind == TxKind::Reward {
        locked.actions += 1;
    }
    let transaction = tx
        .insert_internal_transaction(
            NewInternalTransaction::builder()
                .user_id(user)
                .kind(kind)
                .status(TxStatus::Requested)
                .amount(dimp)
                .token(Token::Dimp)
                .address(locked.address)
                .build(),
        )
        .await?;
    tx.save_user(&locked).await?;
    tx.commit().await?;
    tracing::info!(%user, %kind, %dimp, %dact, "credited");

    let referral = if kind == TxKind::Reward {
        match distributor.distribute(config, user, dimp, dact).await {
            Ok(credits) => credits,
            Err(err) => {
                tracing::warn!(%err, %user, "failed to distribute referral commissions");
                Vec::new()
            }
        }
    } else {
        Vec::new()
    };

    Ok(Credit {
        transaction,
        referral,
    })
}

/// Spend `amount` from the balance of `user`.
pub async fn spend(
    store: &dyn LedgerStore,
    user: UserId,
    amount: Decimal,
    note: Option<String>,
) -> crate::Result<InternalTransaction> {
    if amount <= Decimal::ZERO {
        return Err(crate::Error::InvalidAmount(amount));
    }
    let mut tx = store.begin().await?;
    let mut locked = lock_existing_user(tx.as_mut(), user).await?;
    if amount > locked.buffer {
        return Err(Rejection::InsufficientFunds.into());
    }
    locked.buffer -= amount;
    locked.dimp_spent += amount;

    let mut entry = NewInternalTransaction::builder()
        .user_id(user)
        .author_id(user)
        .kind(TxKind::Spend)
        .status(TxStatus::Requested)
        .amount(amount)
        .address(locked.address)
        .build();
    entry.note = note;
    let transaction = tx.insert_internal_transaction(entry).await?;
    tx.save_user(&locked).await?;
    tx.commit().await?;

    tracing::info!(%user, %amount, "spent");
    Ok(transaction)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rust_decimal_macros::dec;

    use super::*;
    use crate::{model::NewUser, store::MemoryStore};

    #[tokio::test]
    async fn test_reward_pays_uplines() -> eyre::Result<()> {
        let store = MemoryStore::new();
        let upline = store.insert_user(NewUser::builder().build()).await?;
        let user = store
            .insert_user(NewUser::builder().upline(upline.id).build())
            .await?;
        let distributor = ReferralDistributor::new(Arc::new(store.clone()));
        let config = AppConfig::default();

        let credit = credit(
            &store,
            &distributor,
            &config,
            user.id,
            TxKind::Reward,
            dec!(100),
            dec!(2),
        )
        .await?;
        assert_eq!(credit.referral.len(), 1);

        let user = store.user(user.id).await?.unwrap();
        assert_eq!(user.rewards, dec!(100));
        assert_eq!(user.dact_earned, dec!(2));
        assert_eq!(user.actions, 1);
        let upline = store.user(upline.id).await?.unwrap();
        assert_eq!(upline.rewards, dec!(7));
        assert_eq!(upline.dact_earned, dec!(0.14));
        Ok(())
    }

    #[tokio::test]
    async fn test_bonus_skips_referral() -> eyre::Result<()> {
        let store = MemoryStore::new();
        let upline = store.insert_user(NewUser::builder().build()).await?;
        let user = store
            .insert_user(NewUser::builder().upline(upline.id).build())
            .await?;
        let distributor = ReferralDistributor::new(Arc::new(store.clone()));

        let credit = credit(
            &store,
            &distributor,
            &AppConfig::default(),
            user.id,
            TxKind::Bonus,
            dec!(50),
            dec!(0),
        )
        .await?;
        assert!(credit.referral.is_empty());
        assert_eq!(store.user(upline.id).await?.unwrap().rewards, dec!(0));
        assert!(credit_kind_rejected(&store, &distributor, user.id).await);
        Ok(())
    }

    async fn credit_kind_rejected(
        store: &MemoryStore,
        distributor: &ReferralDistributor,
        user: UserId,
    ) -> bool {
        credit(
            store,
            distributor,
            &AppConfig::default(),
            user,
            TxKind::Spend,
            dec!(1),
            dec!(0),
        )
        .await
        .is_err()
    }

    #[tokio::test]
    async fn test_spend() -> eyre::Result<()> {
        let store = MemoryStore::new();
        let user = store
            .insert_user(NewUser::builder().buffer(dec!(10)).build())
            .await?;

        let err = spend(&store, user.id, dec!(11), None).await.unwrap_err();
        assert_eq!(err.rejection(), Some(Rejection::InsufficientFunds));

        let entry = spend(&store, user.id, dec!(4), Some("boost".into())).await?;
        assert_eq!(entry.kind, TxKind::Spend);
        assert_eq!(entry.note.as_deref(), Some("boost"));
        let user = store.user(user.id).await?.unwrap();
        assert_eq!(user.buffer, dec!(6));
        assert_eq!(user.dimp_spent, dec!(4));
        Ok(())
    }
}
