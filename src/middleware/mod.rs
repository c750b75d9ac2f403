use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, StatusCode},
};
use base64::{engine::general_purpose, Engine as _};

/// Покупатель, от имени которого идёт запрос.
///
/// Учётные записи живут во внешнем сервисе пользователей; фронтовый шлюз
/// аутентифицирует покупателя и передаёт его числовой идентификатор логином
/// Basic-авторизации. Здесь только разбор заголовка, без проверки паролей.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: i64,
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Получаем заголовок Authorization
        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or(StatusCode::UNAUTHORIZED)?;

        // Проверяем что это Basic auth
        let encoded = auth_header
            .strip_prefix("Basic ")
            .ok_or(StatusCode::UNAUTHORIZED)?;

        // Декодируем base64
        let decoded = general_purpose::STANDARD
            .decode(encoded)
            .map_err(|_| StatusCode::UNAUTHORIZED)?;

        let credentials = String::from_utf8(decoded).map_err(|_| StatusCode::UNAUTHORIZED)?;

        // Логин — числовой идентификатор покупателя
        let login = credentials
            .splitn(2, ':')
            .next()
            .ok_or(StatusCode::UNAUTHORIZED)?;
        let user_id: i64 = login.parse().map_err(|_| StatusCode::UNAUTHORIZED)?;
        if user_id <= 0 {
            return Err(StatusCode::UNAUTHORIZED);
        }

        Ok(AuthUser { user_id })
    }
}

#[cfg(test)]
mod tests {
    use axum::http::Request;
    use base64::Engine as _;

    use super::*;

    async fn extract(header_value: Option<&str>) -> Result<AuthUser, StatusCode> {
        let mut builder = Request::builder().uri("/");
        if let Some(v) = header_value {
            builder = builder.header(header::AUTHORIZATION, v);
        }
        let request = builder.body(()).unwrap();
        let (mut parts, _) = request.into_parts();
        AuthUser::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn parses_numeric_login() {
        let encoded = general_purpose::STANDARD.encode("42:session-token");
        let user = extract(Some(&format!("Basic {}", encoded))).await.unwrap();
        assert_eq!(user.user_id, 42);
    }

    #[tokio::test]
    async fn rejects_missing_or_malformed_header() {
        assert_eq!(extract(None).await.unwrap_err(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            extract(Some("Bearer abc")).await.unwrap_err(),
            StatusCode::UNAUTHORIZED
        );
        let encoded = general_purpose::STANDARD.encode("not-a-number:x");
        assert_eq!(
            extract(Some(&format!("Basic {}", encoded))).await.unwrap_err(),
            StatusCode::UNAUTHORIZED
        );
    }
}
