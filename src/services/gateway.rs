//! Клиент внешнего платёжного шлюза.
//!
//! Все сетевые вызовы идут через "автоматический выключатель": после серии
//! сбоев запросы блокируются локально, пока шлюз не оживёт. Это единственное
//! место, где ядро касается сети; держать блокировки мест поперёк этих
//! вызовов нельзя — резервом служит сама бронь с TTL, а не лок.

use std::sync::atomic::{AtomicI64, AtomicU32, Ordering};
use std::sync::{Arc, RwLock};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::time::Duration;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::{CircuitBreakerConfig, PaymentConfig};

const CURRENCY: &str = "KZT";

/// Состояния выключателя.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Нормальный режим, запросы разрешены.
    Closed,
    /// Шлюз признан лежащим, запросы блокируются до таймаута.
    Open,
    /// Пробный режим после таймаута: пропускается один тестовый запрос.
    HalfOpen,
}

#[derive(Debug)]
pub struct CircuitBreaker {
    state: RwLock<CircuitState>,
    failure_count: AtomicU32,
    /// Unix-время последнего сбоя.
    last_failure_at: AtomicI64,
    failure_threshold: u32,
    open_timeout_secs: i64,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, open_timeout_secs: u64) -> Self {
        Self {
            state: RwLock::new(CircuitState::Closed),
            failure_count: AtomicU32::new(0),
            last_failure_at: AtomicI64::new(0),
            failure_threshold,
            open_timeout_secs: open_timeout_secs as i64,
        }
    }

    pub fn can_execute(&self) -> bool {
        let state = self.state.read().unwrap();
        match *state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let since_failure = Utc::now().timestamp() - self.last_failure_at.load(Ordering::Relaxed);
                if since_failure >= self.open_timeout_secs {
                    drop(state);
                    *self.state.write().unwrap() = CircuitState::HalfOpen;
                    info!("circuit breaker transitioning to HalfOpen");
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn record_success(&self) {
        let mut state = self.state.write().unwrap();
        match *state {
            CircuitState::HalfOpen => {
                *state = CircuitState::Closed;
                self.failure_count.store(0, Ordering::Relaxed);
                info!("circuit breaker recovered, back to Closed");
            }
            CircuitState::Closed => {
                self.failure_count.store(0, Ordering::Relaxed);
            }
            CircuitState::Open => {}
        }
    }

    pub fn record_failure(&self) {
        let failures = self.failure_count.fetch_add(1, Ordering::Relaxed) + 1;
        self.last_failure_at.store(Utc::now().timestamp(), Ordering::Relaxed);

        let mut state = self.state.write().unwrap();
        match *state {
            CircuitState::Closed => {
                if failures >= self.failure_threshold {
                    *state = CircuitState::Open;
                    error!(
                        "circuit breaker OPENED: {} failures reached threshold {}",
                        failures, self.failure_threshold
                    );
                }
            }
            CircuitState::HalfOpen => {
                *state = CircuitState::Open;
                warn!("circuit breaker probe failed, back to Open");
            }
            CircuitState::Open => {}
        }
    }

    pub fn state(&self) -> CircuitState {
        *self.state.read().unwrap()
    }
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("circuit breaker is open - payment gateway temporarily unavailable")]
    CircuitOpen,
    #[error("payment gateway transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("payment gateway rejected the request: {message} (code {code:?})")]
    Rejected { code: Option<i32>, message: String },
}

/// Итог платежа, который шлюз сообщает в callback. Четыре исхода ядра;
/// словарь статусов шлюза шире и сворачивается в них.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GatewayResultCode {
    Success,
    NotFound,
    ServerError,
    UserCancelled,
}

impl GatewayResultCode {
    pub fn from_status(status: &str) -> Option<Self> {
        match status {
            "CONFIRMED" | "COMPLETED" | "AUTHORIZED" => Some(Self::Success),
            "NOT_FOUND" => Some(Self::NotFound),
            "FAILED" | "REJECTED" | "ERROR" | "EXPIRED" => Some(Self::ServerError),
            "CANCELLED" => Some(Self::UserCancelled),
            _ => None,
        }
    }
}

// --- Модели запросов/ответов API шлюза ---

#[derive(Debug, Serialize)]
struct PaymentInitRequest {
    #[serde(rename = "merchantId")]
    merchant_id: String,
    token: String,
    amount: i64,
    #[serde(rename = "orderId")]
    order_id: String,
    currency: String,
    description: String,
    #[serde(rename = "successURL")]
    success_url: String,
    #[serde(rename = "failURL")]
    fail_url: String,
    #[serde(rename = "notificationURL")]
    notification_url: String,
    email: Option<String>,
    language: String,
}

#[derive(Debug, Deserialize)]
pub struct PaymentInitResponse {
    pub success: bool,
    #[serde(rename = "paymentId")]
    pub payment_id: Option<String>,
    #[serde(rename = "paymentURL")]
    pub payment_url: Option<String>,
    #[serde(rename = "expiresAt")]
    pub expires_at: Option<String>,
    pub code: Option<i32>,
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
struct PaymentCheckRequest {
    #[serde(rename = "merchantId")]
    merchant_id: String,
    token: String,
    #[serde(rename = "paymentId")]
    payment_id: String,
}

#[derive(Debug, Deserialize)]
pub struct PaymentCheckResponse {
    pub success: bool,
    pub status: Option<String>,
    #[serde(rename = "paymentId")]
    pub payment_id: Option<String>,
    pub amount: Option<i64>,
    pub code: Option<i32>,
    pub message: Option<String>,
}

/// Платёжное намерение: куда отправить покупателя и как потом узнать платёж.
#[derive(Debug, Clone)]
pub struct PaymentIntent {
    pub payment_id: String,
    pub redirect_url: String,
    pub expires_at: Option<String>,
}

#[derive(Clone)]
pub struct PaymentGatewayClient {
    merchant_id: String,
    password: String,
    base_url: String,
    success_url: String,
    fail_url: String,
    webhook_url: String,
    http_client: reqwest::Client,
    circuit_breaker: Arc<CircuitBreaker>,
}

impl PaymentGatewayClient {
    pub fn from_config(payment: &PaymentConfig, breaker: &CircuitBreakerConfig) -> Self {
        Self {
            merchant_id: payment.merchant_id.clone(),
            password: payment.merchant_password.clone(),
            base_url: payment.gateway_url.trim_end_matches('/').to_string(),
            success_url: payment.success_url.clone(),
            fail_url: payment.fail_url.clone(),
            webhook_url: payment.webhook_url.clone(),
            http_client: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .expect("Failed to create HTTP client"),
            circuit_breaker: Arc::new(CircuitBreaker::new(
                breaker.failure_threshold,
                breaker.timeout_seconds,
            )),
        }
    }

    async fn execute_with_circuit_breaker<F, T>(&self, operation: F) -> Result<T, GatewayError>
    where
        F: std::future::Future<Output = Result<T, reqwest::Error>>,
    {
        if !self.circuit_breaker.can_execute() {
            warn!("circuit breaker is OPEN - blocking payment gateway request");
            return Err(GatewayError::CircuitOpen);
        }
        match operation.await {
            Ok(result) => {
                self.circuit_breaker.record_success();
                Ok(result)
            }
            Err(e) => {
                error!("payment gateway request failed: {:?}", e);
                self.circuit_breaker.record_failure();
                Err(GatewayError::Transport(e))
            }
        }
    }

    /// Токен подписи запроса: sha256(amount ‖ currency ‖ orderId ‖ password ‖ merchantId).
    fn sign_init(&self, amount: i64, currency: &str, order_ref: &str) -> String {
        let token_string = format!(
            "{}{}{}{}{}",
            amount, currency, order_ref, self.password, self.merchant_id
        );
        let mut hasher = Sha256::new();
        hasher.update(token_string.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    fn sign_check(&self, payment_id: &str) -> String {
        let token_string = format!("{}{}{}", payment_id, self.password, self.merchant_id);
        let mut hasher = Sha256::new();
        hasher.update(token_string.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Создаёт платёж и возвращает URL для редиректа покупателя.
    pub async fn create_payment_intent(
        &self,
        amount: i64,
        order_id: Uuid,
        description: &str,
        email: Option<String>,
    ) -> Result<PaymentIntent, GatewayError> {
        let order_ref = format!("order-{}", order_id);
        let token = self.sign_init(amount, CURRENCY, &order_ref);

        let request = PaymentInitRequest {
            merchant_id: self.merchant_id.clone(),
            token,
            amount,
            order_id: order_ref,
            currency: CURRENCY.to_string(),
            description: description.to_string(),
            success_url: self.success_url.clone(),
            fail_url: self.fail_url.clone(),
            notification_url: self.webhook_url.clone(),
            email,
            language: "ru".to_string(),
        };

        info!("creating payment intent: amount={} order={}", amount, order_id);

        let operation = async {
            self.http_client
                .post(format!("{}/api/v1/PaymentInit/init", self.base_url))
                .json(&request)
                .send()
                .await?
                .json::<PaymentInitResponse>()
                .await
        };
        let response = self.execute_with_circuit_breaker(operation).await?;

        if !response.success {
            return Err(GatewayError::Rejected {
                code: response.code,
                message: response.message.unwrap_or_else(|| "init rejected".to_string()),
            });
        }
        match (response.payment_id, response.payment_url) {
            (Some(payment_id), Some(redirect_url)) => Ok(PaymentIntent {
                payment_id,
                redirect_url,
                expires_at: response.expires_at,
            }),
            _ => Err(GatewayError::Rejected {
                code: response.code,
                message: "incomplete init response".to_string(),
            }),
        }
    }

    /// Справляется о статусе платежа. Используется фоновой уборкой как
    /// последний шанс перед отменой зависшего заказа.
    pub async fn check_payment_status(
        &self,
        payment_id: &str,
    ) -> Result<PaymentCheckResponse, GatewayError> {
        let token = self.sign_check(payment_id);
        let request = PaymentCheckRequest {
            merchant_id: self.merchant_id.clone(),
            token,
            payment_id: payment_id.to_string(),
        };

        let operation = async {
            self.http_client
                .post(format!("{}/api/v1/PaymentCheck/check", self.base_url))
                .json(&request)
                .send()
                .await?
                .json::<PaymentCheckResponse>()
                .await
        };
        self.execute_with_circuit_breaker(operation).await
    }

    pub fn circuit_state(&self) -> CircuitState {
        self.circuit_breaker.state()
    }
}
