use dimp_utils::{AppConfig, Decimal, TxKind, TxStatus, UserId};

use crate::{
    envelope::UserData,
    error::Rejection,
    model::{InternalTransaction, NewInternalTransaction},
    store::{find_sync_request, lock_existing_user, LedgerStore},
};

/// File a request to move pending rewards into the balance.
///
/// A non-positive `amount` requests all pending rewards. The user's sync
/// entry is reused when one exists.
pub async fn request_sync(
    store: &dyn LedgerStore,
    user: UserId,
    amount: Decimal,
    config: &AppConfig,
) -> crate::Result<InternalTransaction> {
    let mut tx = store.begin().await?;
    let locked = lock_existing_user(tx.as_mut(), user).await?;

    for pending in [TxStatus::Requested, TxStatus::Approved] {
        if find_sync_request(tx.as_mut(), user, Some(pending))
            .await?
            .is_some()
        {
            return Err(Rejection::WaitUntilResolved.into());
        }
    }

    let amount = if amount > Decimal::ZERO {
        amount
    } else {
        locked.rewards
    };
    if amount < config.min_withdrawal(locked.withdraw_min)? {
        return Err(Rejection::MinWithdrawal.into());
    }

    let request = match find_sync_request(tx.as_mut(), user, None).await? {
        Some(mut existing) => {
            existing.status = TxStatus::Requested;
            existing.amount = amount;
            existing.address = locked.address;
            tx.save_internal_transaction(&existing).await?;
            existing
        }
        None => {
            tx.insert_internal_transaction(
                NewInternalTransaction::builder()
                    .user_id(user)
                    .author_id(user)
                    .kind(TxKind::Sync)
                    .status(TxStatus::Requested)
                    .amount(amount)
                    .address(locked.address)
                    .build(),
            )
            .await?
        }
    };
    tx.commit().await?;

    tracing::info!(%user, %amount, id = request.id, "sync requested");
    Ok(request)
}

/// Approve the pending sync request of `user`.
pub async fn approve_sync_request(
    store: &dyn LedgerStore,
    user: UserId,
    admin: Option<UserId>,
) -> crate::Result<InternalTransaction> {
    resolve_sync_request(store, user, admin, TxStatus::Approved).await
}

/// Reject the pending sync request of `user`.
pub async fn reject_sync_request(
    store: &dyn LedgerStore,
    user: UserId,
    admin: Option<UserId>,
) -> crate::Result<InternalTransaction> {
    resolve_sync_request(store, user, admin, TxStatus::Rejected).await
}

async fn resolve_sync_request(
    store: &dyn LedgerStore,
    user: UserId,
    admin: Option<UserId>,
    status: TxStatus,
) -> crate::Result<InternalTransaction> {
    let mut tx = store.begin().await?;
    lock_existing_user(tx.as_mut(), user).await?;
    let mut request = find_sync_request(tx.as_mut(), user, Some(TxStatus::Requested))
        .await?
        .ok_or_else(|| crate::Error::not_found(format!("pending sync request of user {user}")))?;
    request.status = status;
    if admin.is_some() {
        request.author_id = admin;
    }
    tx.save_internal_transaction(&request).await?;
    tx.commit().await?;

    tracing::info!(%user, %status, id = request.id, "sync request resolved");
    Ok(request)
}

/// Check whether `user` may withdraw `amount` from the exchange contract.
///
/// Returns the user summary when allowed.
pub async fn check_withdrawal(
    store: &dyn LedgerStore,
    user: UserId,
    amount: Decimal,
    config: &AppConfig,
) -> crate::Result<UserData> {
    if amount <= Decimal::ZERO {
        return Err(crate::Error::InvalidAmount(amount));
    }
    let user = store
        .user(user)
        .await?
        .ok_or_else(|| crate::Error::not_found(format!("user {user}")))?;
    if amount > user.buffer {
        return Err(Rejection::InsufficientFunds.into());
    }
    if amount < config.min_withdrawal(user.withdraw_min)? {
        return Err(Rejection::MinWithdrawal.into());
    }
    if amount > config.max_withdrawal(user.withdraw_max)? {
        return Err(Rejection::MaxWithdrawal.into());
    }
    Ok(UserData::from(&user))
}
