use std::sync::Arc;

use crate::config::Settings;
use crate::database::store::Store;
use crate::services::auth::AuthService;
use crate::services::billing::BillingService;
use crate::services::blast::BlastService;
use crate::services::issuer::IntentIssuer;
use crate::services::push::{PushSender, PushService};
use crate::services::stripe::PaymentProcessor;
use crate::services::webhook::Reconciler;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Ledger, messaging and membership tables
    pub store: Arc<dyn Store>,

    /// Card processor used to create intents
    pub processor: Arc<dyn PaymentProcessor>,

    /// Web push transport
    pub push_sender: Arc<dyn PushSender>,

    pub auth: AuthService,

    pub settings: Arc<Settings>,
}

impl AppState {
    pub fn new(
        settings: Settings,
        store: Arc<dyn Store>,
        processor: Arc<dyn PaymentProcessor>,
        push_sender: Arc<dyn PushSender>,
    ) -> Self {
        Self {
            auth: AuthService::new(&settings.auth),
            store,
            processor,
            push_sender,
            settings: Arc::new(settings),
        }
    }

    pub fn issuer(&self) -> IntentIssuer {
        IntentIssuer::new(
            self.store.clone(),
            self.processor.clone(),
            self.settings.stripe.currency.clone(),
        )
    }

    pub fn reconciler(&self) -> Reconciler {
        Reconciler::new(self.store.clone())
    }

    pub fn push(&self) -> PushService {
        PushService::new(self.store.clone(), self.push_sender.clone(), &self.settings.push)
    }

    pub fn blasts(&self) -> BlastService {
        BlastService::new(self.store.clone(), self.push())
    }

    pub fn billing(&self) -> BillingService {
        BillingService::new(self.store.clone())
    }
}
