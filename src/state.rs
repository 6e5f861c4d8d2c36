use crate::{metrics::Metrics, repository::SubscriberRepository, subscription::SubscriptionService};
use axum::extract::FromRef;
use derive_getters::Getters;
use duplicate::duplicate_item;
use std::sync::Arc;

#[derive(Clone, Getters)]
pub struct AppState {
    subscription: Arc<SubscriptionService>,
    subscribers: Arc<dyn SubscriberRepository>,
    metrics: Arc<Metrics>,
}

impl AppState {
    pub fn new(
        subscription: SubscriptionService,
        subscribers: Arc<dyn SubscriberRepository>,
        metrics: Metrics,
    ) -> Self {
        Self {
            subscription: Arc::new(subscription),
            subscribers,
            metrics: Arc::new(metrics),
        }
    }
}

#[duplicate_item(
    service_type                   field;
    [ SubscriptionService ]        [ subscription ];
    [ dyn SubscriberRepository ]   [ subscribers ];
    [ Metrics ]                    [ metrics ];
)]
impl FromRef<AppState> for Arc<service_type> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.field.clone()
    }
}
