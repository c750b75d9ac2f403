use serde::Deserialize;
use std::env;

// Главная структура конфигурации — контейнер для всех настроек
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub checkout: CheckoutConfig,
    pub payment: PaymentConfig,
    pub circuit_breaker: CircuitBreakerConfig,
}

// Настройки приложения
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub environment: String,
    pub rust_log: String,
}

// Настройки оформления заказа
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutConfig {
    /// Сколько секунд живёт бронь мест после выбора.
    pub hold_ttl_seconds: i64,
    /// Через сколько секунд брошенный заказ отменяется уборкой.
    /// По умолчанию — двойной TTL брони.
    pub abandon_after_seconds: i64,
    pub sweep_interval_seconds: u64,
}

// Настройки платёжного шлюза
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentConfig {
    pub merchant_id: String,
    pub merchant_password: String,
    pub gateway_url: String,
    pub success_url: String,
    pub fail_url: String,
    pub webhook_url: String,
}

// Настройки Circuit Breaker
#[derive(Debug, Clone, Deserialize)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub timeout_seconds: u64,
}

impl Config {
    pub fn from_env() -> Self {
        let hold_ttl_seconds: i64 = env::var("HOLD_TTL_SECONDS")
            .unwrap_or_else(|_| "600".to_string())
            .parse()
            .expect("HOLD_TTL_SECONDS must be a valid number");

        Config {
            app: AppConfig {
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env::var("PORT")
                    .unwrap_or_else(|_| "8000".to_string())
                    .parse()
                    .expect("PORT must be a valid number"),
                environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
                rust_log: env::var("RUST_LOG")
                    .unwrap_or_else(|_| "kinoplex=debug,tower_http=debug".to_string()),
            },
            checkout: CheckoutConfig {
                hold_ttl_seconds,
                abandon_after_seconds: env::var("ABANDON_AFTER_SECONDS")
                    .unwrap_or_else(|_| (hold_ttl_seconds * 2).to_string())
                    .parse()
                    .expect("ABANDON_AFTER_SECONDS must be a valid number"),
                sweep_interval_seconds: env::var("SWEEP_INTERVAL_SECONDS")
                    .unwrap_or_else(|_| "60".to_string())
                    .parse()
                    .expect("SWEEP_INTERVAL_SECONDS must be a valid number"),
            },
            payment: PaymentConfig {
                merchant_id: env::var("MERCHANT_ID").unwrap_or_else(|_| "kinoplex-demo".to_string()),
                merchant_password: env::var("MERCHANT_PASSWORD")
                    .unwrap_or_else(|_| "demo-password".to_string()),
                gateway_url: env::var("PAYMENT_GATEWAY_URL")
                    .unwrap_or_else(|_| "https://gateway.example.kz".to_string()),
                success_url: env::var("PAYMENT_SUCCESS_URL")
                    .unwrap_or_else(|_| "https://kinoplex.example.kz/payment/success".to_string()),
                fail_url: env::var("PAYMENT_FAIL_URL")
                    .unwrap_or_else(|_| "https://kinoplex.example.kz/payment/fail".to_string()),
                webhook_url: env::var("PAYMENT_WEBHOOK_URL")
                    .unwrap_or_else(|_| "https://kinoplex.example.kz/api/webhook/payment".to_string()),
            },
            circuit_breaker: CircuitBreakerConfig {
                failure_threshold: env::var("CIRCUIT_BREAKER_FAILURE_THRESHOLD")
                    .unwrap_or_else(|_| "5".to_string())
                    .parse()
                    .expect("CIRCUIT_BREAKER_FAILURE_THRESHOLD must be a valid number"),
                timeout_seconds: env::var("CIRCUIT_BREAKER_TIMEOUT_SECONDS")
                    .unwrap_or_else(|_| "60".to_string())
                    .parse()
                    .expect("CIRCUIT_BREAKER_TIMEOUT_SECONDS must be a valid number"),
            },
        }
    }
}
