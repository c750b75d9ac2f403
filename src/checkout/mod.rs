//! Оркестратор оформления: места -> бар -> скидки -> оплата -> сверка.
//!
//! Заказ — конечный автомат `Pending -> AwaitingPayment -> {Paid | Failed |
//! Cancelled}`. Каждый переход делается под мьютексом заказа со сверкой
//! текущего статуса, поэтому гонка callback'а шлюза и фоновой уборки всегда
//! разрешается в пользу ровно одного из них.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use chrono::{DateTime, Duration, Utc};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::catalog::CatalogStore;
use crate::config::CheckoutConfig;
use crate::error::BookingError;
use crate::inventory::SeatInventory;
use crate::ledger::VoucherLedger;
use crate::models::{AppliedVoucher, FailureReason, LineItem, Order, OrderStatus};
use crate::pricing::{self, Quote};
use crate::services::gateway::{GatewayResultCode, PaymentGatewayClient};

/// Хранилище заказов с индексом по платёжной ссылке шлюза.
#[derive(Default)]
pub struct OrderStore {
    orders: RwLock<HashMap<Uuid, Arc<Mutex<Order>>>>,
    by_gateway_ref: RwLock<HashMap<String, Uuid>>,
}

impl OrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&self, order: Order) -> Arc<Mutex<Order>> {
        let handle = Arc::new(Mutex::new(order));
        let id = handle.lock().unwrap().id;
        self.orders.write().unwrap().insert(id, handle.clone());
        handle
    }

    pub fn get(&self, id: Uuid) -> Option<Arc<Mutex<Order>>> {
        self.orders.read().unwrap().get(&id).cloned()
    }

    fn bind_gateway_ref(&self, gateway_ref: String, order_id: Uuid) {
        self.by_gateway_ref.write().unwrap().insert(gateway_ref, order_id);
    }

    pub fn find_by_gateway_ref(&self, gateway_ref: &str) -> Option<Arc<Mutex<Order>>> {
        let id = *self.by_gateway_ref.read().unwrap().get(gateway_ref)?;
        self.get(id)
    }

    /// Заказы пользователя, свежие первыми.
    pub fn orders_for_user(&self, user_id: i64) -> Vec<Order> {
        let handles: Vec<Arc<Mutex<Order>>> =
            self.orders.read().unwrap().values().cloned().collect();
        let mut list: Vec<Order> = handles
            .iter()
            .map(|h| h.lock().unwrap().clone())
            .filter(|o| o.user_id == user_id)
            .collect();
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        list
    }

    /// Незавершённые заказы, не менявшиеся с `cutoff`.
    fn stale(&self, cutoff: DateTime<Utc>) -> Vec<Order> {
        let handles: Vec<Arc<Mutex<Order>>> =
            self.orders.read().unwrap().values().cloned().collect();
        handles
            .iter()
            .map(|h| h.lock().unwrap().clone())
            .filter(|o| !o.status.is_terminal() && o.updated_at <= cutoff)
            .collect()
    }
}

#[derive(Clone)]
pub struct CheckoutService {
    catalog: Arc<CatalogStore>,
    inventory: Arc<SeatInventory>,
    orders: Arc<OrderStore>,
    ledger: Arc<VoucherLedger>,
    gateway: PaymentGatewayClient,
    hold_ttl: Duration,
    abandon_after: Duration,
}

impl CheckoutService {
    pub fn new(
        catalog: Arc<CatalogStore>,
        inventory: Arc<SeatInventory>,
        orders: Arc<OrderStore>,
        ledger: Arc<VoucherLedger>,
        gateway: PaymentGatewayClient,
        config: &CheckoutConfig,
    ) -> Self {
        Self {
            catalog,
            inventory,
            orders,
            ledger,
            gateway,
            hold_ttl: Duration::seconds(config.hold_ttl_seconds),
            abandon_after: Duration::seconds(config.abandon_after_seconds),
        }
    }

    pub fn gateway(&self) -> &PaymentGatewayClient {
        &self.gateway
    }

    /// Шаг 1: бронь мест и создание заказа.
    ///
    /// Каталог проверяется до захвата мест: на некорректный запрос инвентарь
    /// не тратится. Цены мест фиксируются в строках заказа в момент брони.
    pub fn start_checkout(
        &self,
        user_id: i64,
        screening_id: i64,
        seat_ids: &[i64],
        food_lines: &[(i64, u32)],
    ) -> Result<Order, BookingError> {
        if seat_ids.is_empty() {
            return Err(BookingError::InvalidRequest("at least one seat is required"));
        }
        let screening = self
            .catalog
            .screening(screening_id)
            .ok_or(BookingError::ScreeningNotFound(screening_id))?;
        if !screening.is_sellable() {
            return Err(BookingError::ScreeningNotSellable(screening_id));
        }

        let mut food_items = Vec::with_capacity(food_lines.len());
        for (food_id, quantity) in food_lines {
            if *quantity == 0 {
                return Err(BookingError::InvalidRequest("food quantity must be positive"));
            }
            let food = self
                .catalog
                .food(*food_id)
                .ok_or(BookingError::FoodNotFound(*food_id))?;
            food_items.push(LineItem::Food {
                food_id: food.id,
                name: food.name,
                quantity: *quantity,
                unit_price: food.price,
            });
        }

        let held = self.inventory.hold(screening_id, seat_ids, user_id, self.hold_ttl)?;
        let mut items: Vec<LineItem> = held
            .iter()
            .map(|slot| LineItem::Seat {
                slot_id: slot.id,
                row: slot.row,
                number: slot.number,
                price: slot.price,
            })
            .collect();
        items.extend(food_items);

        let quote = pricing::quote(&items, None, 0);
        let order = Order::new(user_id, screening_id, items, quote.total);
        self.orders.insert(order.clone());
        info!(
            "checkout started: order={} user={} screening={} seats={} total={}",
            order.id,
            user_id,
            screening_id,
            held.len(),
            order.total
        );
        Ok(order)
    }

    /// Шаг 2: применить промокод и/или баллы. Допускается только в `Pending`
    /// и сколько угодно раз — каждое применение замещает предыдущее.
    pub fn apply_discount(
        &self,
        order_id: Uuid,
        user_id: i64,
        voucher_code: Option<&str>,
        points: i64,
    ) -> Result<(Order, Quote), BookingError> {
        if points < 0 {
            return Err(BookingError::InvalidRequest("points must be >= 0"));
        }
        let handle = self
            .orders
            .get(order_id)
            .ok_or(BookingError::OrderNotFound(order_id))?;
        let mut order = handle.lock().unwrap();
        if order.user_id != user_id {
            return Err(BookingError::Forbidden);
        }
        if order.status != OrderStatus::Pending {
            return Err(BookingError::InvalidOrderState(order.status));
        }

        let voucher = match voucher_code {
            Some(code) => Some(self.ledger.validate_voucher(user_id, code)?),
            None => None,
        };
        if points > 0 {
            self.ledger.validate_points(user_id, points)?;
        }

        let quote = pricing::quote(&order.items, voucher.as_ref().map(|v| v.percent), points);
        if quote.clamped {
            warn!(
                "order {}: discounts exceed subtotal {}, total clamped to zero",
                order.id, quote.subtotal
            );
        }
        order.voucher = voucher.map(|v| AppliedVoucher { id: v.id, code: v.code, percent: v.percent });
        order.points_redeemed = points;
        order.total = quote.total;
        order.touch();
        Ok((order.clone(), quote))
    }

    /// Шаг 3: платёжное намерение у шлюза и переход в `AwaitingPayment`.
    ///
    /// Сетевого вызова под мьютексом заказа нет: сначала читаем нужные поля,
    /// отпускаем лок, ходим в шлюз, затем перепроверяем статус. Если шлюз
    /// недоступен, заказ остаётся `Pending` и шаг можно повторить.
    pub async fn initiate_payment(
        &self,
        order_id: Uuid,
        user_id: i64,
    ) -> Result<(Order, String), BookingError> {
        let handle = self
            .orders
            .get(order_id)
            .ok_or(BookingError::OrderNotFound(order_id))?;

        let (amount, description) = {
            let order = handle.lock().unwrap();
            if order.user_id != user_id {
                return Err(BookingError::Forbidden);
            }
            if order.status != OrderStatus::Pending {
                return Err(BookingError::InvalidOrderState(order.status));
            }
            if order.seat_count() == 0 {
                return Err(BookingError::InvalidRequest("order has no seats"));
            }
            let title = self
                .catalog
                .screening(order.screening_id)
                .map(|s| s.movie_title)
                .unwrap_or_else(|| "сеанс".to_string());
            (order.total, format!("{} - {} билет(ов)", title, order.seat_count()))
        };

        let intent = self
            .gateway
            .create_payment_intent(amount, order_id, &description, None)
            .await
            .map_err(|e| {
                error!("order {}: payment init failed: {}", order_id, e);
                BookingError::GatewayUnavailable(e.to_string())
            })?;

        let mut order = handle.lock().unwrap();
        if order.status != OrderStatus::Pending {
            // пока ходили в шлюз, заказ отменили (пользователь или уборка)
            warn!(
                "order {}: became {} during payment init, intent {} orphaned",
                order.id, order.status, intent.payment_id
            );
            return Err(BookingError::InvalidOrderState(order.status));
        }
        order.status = OrderStatus::AwaitingPayment;
        order.gateway_ref = Some(intent.payment_id.clone());
        order.touch();
        self.orders.bind_gateway_ref(intent.payment_id.clone(), order.id);
        info!(
            "order {}: awaiting payment, gateway ref {} amount {}",
            order.id, intent.payment_id, amount
        );
        Ok((order.clone(), intent.redirect_url))
    }

    /// Явная отмена пользователем. Работает из `Pending` и `AwaitingPayment`;
    /// повторная отмена — no-op.
    pub fn cancel(&self, order_id: Uuid, user_id: i64) -> Result<Order, BookingError> {
        let handle = self
            .orders
            .get(order_id)
            .ok_or(BookingError::OrderNotFound(order_id))?;
        let mut order = handle.lock().unwrap();
        if order.user_id != user_id {
            return Err(BookingError::Forbidden);
        }
        match order.status {
            OrderStatus::Cancelled => return Ok(order.clone()),
            OrderStatus::Pending | OrderStatus::AwaitingPayment => {}
            status => return Err(BookingError::InvalidOrderState(status)),
        }
        let released = self
            .inventory
            .release(order.screening_id, &order.seat_ids(), user_id)?;
        order.status = OrderStatus::Cancelled;
        order.touch();
        info!("order {}: cancelled by user, {} seats released", order.id, released);
        Ok(order.clone())
    }

    pub fn order(&self, order_id: Uuid, user_id: i64) -> Result<Order, BookingError> {
        let handle = self
            .orders
            .get(order_id)
            .ok_or(BookingError::OrderNotFound(order_id))?;
        let order = handle.lock().unwrap();
        if order.user_id != user_id {
            return Err(BookingError::Forbidden);
        }
        Ok(order.clone())
    }

    /// Сверка асинхронного ответа шлюза с заказом.
    ///
    /// Идемпотентна: повторный callback по терминальному заказу — успешный
    /// no-op. Успех оплаты сначала подтверждается у инвентаря; если бронь к
    /// этому моменту умерла, заказ закрывается как `SeatLostDuringPayment` —
    /// корректность мест важнее подтверждённого платежа.
    pub fn reconcile(
        &self,
        gateway_ref: &str,
        code: GatewayResultCode,
    ) -> Result<Order, BookingError> {
        let handle = self
            .orders
            .find_by_gateway_ref(gateway_ref)
            .ok_or_else(|| BookingError::UnknownGatewayReference(gateway_ref.to_string()))?;
        let mut order = handle.lock().unwrap();
        if order.status.is_terminal() {
            info!(
                "duplicate gateway callback for terminal order {} ({}), ignored",
                order.id, order.status
            );
            return Ok(order.clone());
        }

        let seat_ids = order.seat_ids();
        match code {
            GatewayResultCode::Success => {
                match self.inventory.confirm(order.screening_id, &seat_ids, order.user_id) {
                    Ok(()) => {
                        let earned = pricing::points_earned(order.total);
                        if let Err(e) = self.ledger.commit(
                            order.user_id,
                            order.voucher.as_ref(),
                            order.points_redeemed,
                            earned,
                            order.id,
                        ) {
                            // скидку успел забрать другой заказ, а деньги уже
                            // списаны: заказ исполняем, разницу возвращают люди
                            order.refund_eligible = true;
                            error!(
                                "order {}: paid but discount commit rejected ({}), flagged for refund",
                                order.id, e
                            );
                        }
                        order.status = OrderStatus::Paid;
                        order.touch();
                        info!("order {}: paid, {} seats sold", order.id, seat_ids.len());
                        Ok(order.clone())
                    }
                    Err(_) => {
                        // платёж прошёл, но места потеряны; добираем остатки
                        // брони, чтобы ничего не зависло
                        let _ = self.inventory.release(order.screening_id, &seat_ids, order.user_id);
                        order.status = OrderStatus::Failed;
                        order.failure_reason = Some(FailureReason::SeatLostDuringPayment);
                        order.refund_eligible = true;
                        order.touch();
                        error!(
                            "order {}: payment captured but seats lost, refund required (gateway ref {})",
                            order.id, gateway_ref
                        );
                        Err(BookingError::SeatLostDuringPayment)
                    }
                }
            }
            GatewayResultCode::NotFound | GatewayResultCode::ServerError => {
                self.release_quietly(&order, &seat_ids);
                order.status = OrderStatus::Failed;
                order.failure_reason = Some(match code {
                    GatewayResultCode::NotFound => FailureReason::GatewayNotFound,
                    _ => FailureReason::GatewayError,
                });
                order.touch();
                info!("order {}: payment failed ({:?}), seats released", order.id, code);
                Ok(order.clone())
            }
            GatewayResultCode::UserCancelled => {
                self.release_quietly(&order, &seat_ids);
                order.status = OrderStatus::Cancelled;
                order.touch();
                info!("order {}: payment cancelled by user, seats released", order.id);
                Ok(order.clone())
            }
        }
    }

    fn release_quietly(&self, order: &Order, seat_ids: &[i64]) {
        if let Err(e) = self.inventory.release(order.screening_id, seat_ids, order.user_id) {
            warn!("order {}: seat release failed: {}", order.id, e);
        }
    }

    /// Незавершённые заказы старше окна забвения — кандидаты на уборку.
    pub fn stale_orders(&self, now: DateTime<Utc>) -> Vec<Order> {
        self.orders.stale(now - self.abandon_after)
    }

    /// Отмена брошенного заказа фоновой уборкой. Статус и давность
    /// перепроверяются под мьютексом: если callback успел первым, уборке
    /// делать нечего.
    pub fn cancel_abandoned(&self, order_id: Uuid, now: DateTime<Utc>) -> bool {
        let Some(handle) = self.orders.get(order_id) else {
            return false;
        };
        let mut order = handle.lock().unwrap();
        if order.status.is_terminal() || order.updated_at > now - self.abandon_after {
            return false;
        }
        let seat_ids = order.seat_ids();
        self.release_quietly(&order, &seat_ids);
        order.status = OrderStatus::Cancelled;
        order.touch();
        info!("order {}: abandoned, cancelled by sweep", order.id);
        true
    }
}
