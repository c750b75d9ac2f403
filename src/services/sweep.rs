//! Фоновая уборка брошенных заказов.
//!
//! Брони мест истекают лениво сами, но заказ без сверки висел бы вечно и
//! держал бы инвентарь в неопределённости. Уборка проходит по незавершённым
//! заказам старше окна забвения: зависшие оплаты перед отменой один раз
//! перепроверяются у шлюза — вдруг платёж всё-таки прошёл, а callback
//! потерялся.

use chrono::Utc;
use tracing::{info, warn};

use crate::checkout::CheckoutService;
use crate::models::{Order, OrderStatus};
use crate::services::gateway::{GatewayError, GatewayResultCode};

pub struct SweepService {
    checkout: CheckoutService,
}

impl SweepService {
    pub fn new(checkout: CheckoutService) -> Self {
        Self { checkout }
    }

    pub async fn run_once(&self) {
        let stale = self.checkout.stale_orders(Utc::now());
        if stale.is_empty() {
            info!("🧹 Nothing to sweep");
            return;
        }
        info!("🧹 Sweeping {} abandoned orders", stale.len());

        let mut cancelled = 0usize;
        let mut recovered = 0usize;
        for order in stale {
            match order.status {
                OrderStatus::AwaitingPayment => {
                    if self.sweep_awaiting(&order).await {
                        recovered += 1;
                    } else if self.checkout.cancel_abandoned(order.id, Utc::now()) {
                        info!("💳 Abandoned payment for order {} cancelled, seats released", order.id);
                        cancelled += 1;
                    }
                }
                OrderStatus::Pending => {
                    if self.checkout.cancel_abandoned(order.id, Utc::now()) {
                        info!("🎫 Stale cart {} cancelled", order.id);
                        cancelled += 1;
                    }
                }
                _ => {}
            }
        }
        info!("✅ Sweep done: {} cancelled, {} recovered", cancelled, recovered);
    }

    /// Последняя попытка спасти зависшую оплату. Возвращает true, если платёж
    /// оказался подтверждённым и заказ ушёл в сверку.
    async fn sweep_awaiting(&self, order: &Order) -> bool {
        let Some(gateway_ref) = order.gateway_ref.as_deref() else {
            return false;
        };
        match self.checkout.gateway().check_payment_status(gateway_ref).await {
            Ok(check) => {
                let confirmed = check
                    .status
                    .as_deref()
                    .and_then(GatewayResultCode::from_status)
                    == Some(GatewayResultCode::Success);
                if confirmed {
                    info!("💳 Payment {} was confirmed during sweep", gateway_ref);
                    if let Err(e) = self.checkout.reconcile(gateway_ref, GatewayResultCode::Success) {
                        warn!("sweep reconcile for {} failed: {}", gateway_ref, e);
                    }
                    return true;
                }
                false
            }
            Err(GatewayError::CircuitOpen) => {
                warn!(
                    "circuit breaker is OPEN - skipping status probe for {}, proceeding with cleanup",
                    gateway_ref
                );
                false
            }
            Err(e) => {
                warn!("status probe for {} failed: {}", gateway_ref, e);
                false
            }
        }
    }
}
