pub mod catalog;
pub mod checkout;
pub mod config;
pub mod controllers;
pub mod error;
pub mod inventory;
pub mod ledger;
pub mod middleware;
pub mod models;
pub mod pricing;
pub mod services;

use std::sync::Arc;

use crate::catalog::{CatalogStore, Seed};
use crate::checkout::{CheckoutService, OrderStore};
use crate::inventory::SeatInventory;
use crate::ledger::VoucherLedger;
use crate::services::gateway::PaymentGatewayClient;

// Shared state для всего приложения
pub struct AppState {
    pub config: config::Config,
    pub catalog: Arc<CatalogStore>,
    pub inventory: Arc<SeatInventory>,
    pub orders: Arc<OrderStore>,
    pub ledger: Arc<VoucherLedger>,
    pub checkout: CheckoutService,
}

impl AppState {
    /// Состояние с демонстрационным каталогом — то, с чем сервис поднимается
    /// локально.
    pub fn new(config: config::Config) -> Arc<Self> {
        Self::with_seed(config, catalog::demo_seed())
    }

    /// Прогрев состояния при старте: каталог, посадочные слоты, промокоды и
    /// начальные балансы.
    pub fn with_seed(config: config::Config, seed: Seed) -> Arc<Self> {
        let catalog = Arc::new(seed.catalog);
        let inventory = Arc::new(SeatInventory::new());
        for (screening_id, slots) in seed.seats {
            inventory.register_screening(screening_id, slots);
        }
        let ledger = Arc::new(VoucherLedger::new(seed.vouchers));
        for (user_id, points) in seed.starting_points {
            ledger.credit(user_id, points, None);
        }
        let orders = Arc::new(OrderStore::new());
        let gateway = PaymentGatewayClient::from_config(&config.payment, &config.circuit_breaker);
        let checkout = CheckoutService::new(
            catalog.clone(),
            inventory.clone(),
            orders.clone(),
            ledger.clone(),
            gateway,
            &config.checkout,
        );

        Arc::new(Self { config, catalog, inventory, orders, ledger, checkout })
    }
}
