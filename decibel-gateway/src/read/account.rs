//! Subaccount streams.

use decibel_core::error::SubscriptionError;
use decibel_core::types::{AccountAddress, StreamKind, Topic};
use serde::de::DeserializeOwned;
use std::sync::Arc;

use super::models::{
    AccountOverviewMessage, UserActiveTwapsMessage, UserBulkOrderMessage, UserNotificationMessage,
    UserOpenOrdersMessage, UserOrderUpdateMessage, UserPositionsMessage, UserTradesMessage,
};
use crate::ws::{CallbackHandle, SubscriptionManager};

/// Streams scoped to one subaccount.
///
/// Payloads that fail to decode are reported as `CallbackError::Decode`.
#[derive(Debug, Clone)]
pub struct AccountStream {
    manager: Arc<SubscriptionManager>,
}

impl AccountStream {
    pub(crate) fn new(manager: Arc<SubscriptionManager>) -> Self {
        Self { manager }
    }

    /// Margin and PnL summary.
    pub fn overview<F>(
        &self,
        subaccount: &AccountAddress,
        on_data: F,
    ) -> Result<CallbackHandle, SubscriptionError>
    where
        F: Fn(AccountOverviewMessage) + Send + Sync + 'static,
    {
        self.typed(StreamKind::AccountOverview, subaccount, on_data)
    }

    /// Open positions.
    pub fn positions<F>(
        &self,
        subaccount: &AccountAddress,
        on_data: F,
    ) -> Result<CallbackHandle, SubscriptionError>
    where
        F: Fn(UserPositionsMessage) + Send + Sync + 'static,
    {
        self.typed(StreamKind::AccountPositions, subaccount, on_data)
    }

    /// Resting orders.
    pub fn open_orders<F>(
        &self,
        subaccount: &AccountAddress,
        on_data: F,
    ) -> Result<CallbackHandle, SubscriptionError>
    where
        F: Fn(UserOpenOrdersMessage) + Send + Sync + 'static,
    {
        self.typed(StreamKind::AccountOpenOrders, subaccount, on_data)
    }

    /// Order lifecycle updates.
    pub fn order_updates<F>(
        &self,
        subaccount: &AccountAddress,
        on_data: F,
    ) -> Result<CallbackHandle, SubscriptionError>
    where
        F: Fn(UserOrderUpdateMessage) + Send + Sync + 'static,
    {
        self.typed(StreamKind::OrderUpdates, subaccount, on_data)
    }

    /// Own fills.
    pub fn trades<F>(
        &self,
        subaccount: &AccountAddress,
        on_data: F,
    ) -> Result<CallbackHandle, SubscriptionError>
    where
        F: Fn(UserTradesMessage) + Send + Sync + 'static,
    {
        self.typed(StreamKind::UserTrades, subaccount, on_data)
    }

    /// Bulk quote orders.
    pub fn bulk_orders<F>(
        &self,
        subaccount: &AccountAddress,
        on_data: F,
    ) -> Result<CallbackHandle, SubscriptionError>
    where
        F: Fn(UserBulkOrderMessage) + Send + Sync + 'static,
    {
        self.typed(StreamKind::BulkOrders, subaccount, on_data)
    }

    /// Running TWAP orders.
    pub fn active_twaps<F>(
        &self,
        subaccount: &AccountAddress,
        on_data: F,
    ) -> Result<CallbackHandle, SubscriptionError>
    where
        F: Fn(UserActiveTwapsMessage) + Send + Sync + 'static,
    {
        self.typed(StreamKind::UserActiveTwaps, subaccount, on_data)
    }

    /// Fills, liquidations and other account notices.
    pub fn notifications<F>(
        &self,
        subaccount: &AccountAddress,
        on_data: F,
    ) -> Result<CallbackHandle, SubscriptionError>
    where
        F: Fn(UserNotificationMessage) + Send + Sync + 'static,
    {
        self.typed(StreamKind::Notifications, subaccount, on_data)
    }

    fn typed<T, F>(
        &self,
        kind: StreamKind,
        subaccount: &AccountAddress,
        on_data: F,
    ) -> Result<CallbackHandle, SubscriptionError>
    where
        T: DeserializeOwned + 'static,
        F: Fn(T) + Send + Sync + 'static,
    {
        self.manager
            .subscribe_typed(Topic::account(kind, subaccount), on_data)
    }
}
