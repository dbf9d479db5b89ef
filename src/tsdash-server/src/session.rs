//! Per-request view of the active connection.
//!
//! With the cookie backend every browser carries its own connection in an
//! http-only cookie; with the file backend all browsers share the one saved in
//! `data_dir`. Handlers only see [`Session`].

use actix_web::cookie::{time::Duration as CookieDuration, Cookie, SameSite};
use actix_web::{HttpRequest, HttpResponse};
use percent_encoding::{percent_decode_str, utf8_percent_encode, NON_ALPHANUMERIC};
use std::sync::{Arc, Mutex, RwLock};

use tsdash_core::store::form_from_value;
use tsdash_core::{ConnectionConfig, ConnectionForm, ConnectionStore, StoreError};
use tsdash_rs::{ClientProvider, TypesenseClient};

use crate::api::{ApiError, AppState, ConnectionBackend};

pub const COOKIE_NAME: &str = "typesense-connection-config";
pub const COOKIE_MAX_AGE_DAYS: i64 = 14;

/// Cookie holding `config` as percent-encoded JSON
pub fn connection_cookie(
    config: &ConnectionConfig,
    secure: bool,
) -> Result<Cookie<'static>, serde_json::Error> {
    let json = serde_json::to_string(config)?;
    let value = utf8_percent_encode(&json, NON_ALPHANUMERIC).to_string();
    Ok(Cookie::build(COOKIE_NAME, value)
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(CookieDuration::days(COOKIE_MAX_AGE_DAYS))
        .finish())
}

/// Cookie whose removal clears the connection
pub fn removal_cookie() -> Cookie<'static> {
    Cookie::build(COOKIE_NAME, "").path("/").finish()
}

fn form_from_cookie(value: &str) -> ConnectionForm {
    let decoded = match percent_decode_str(value).decode_utf8() {
        Ok(decoded) => decoded,
        Err(e) => {
            tracing::warn!("Ignoring connection cookie that is not UTF-8: {}", e);
            return ConnectionForm::default();
        }
    };
    match serde_json::from_str(&decoded) {
        Ok(value) => form_from_value(value),
        Err(e) => {
            tracing::warn!("Ignoring connection cookie that is not JSON: {}", e);
            ConnectionForm::default()
        }
    }
}

#[derive(Debug, Clone)]
enum CookieUpdate {
    Set(Cookie<'static>),
    Remove,
}

/// Connection store backed by the request's cookie.
///
/// Writes are queued and land on the response through [`CookieStore::apply`].
#[derive(Debug)]
pub struct CookieStore {
    secure: bool,
    current: RwLock<ConnectionForm>,
    pending: Mutex<Option<CookieUpdate>>,
}

impl CookieStore {
    pub fn from_request(req: &HttpRequest, secure: bool) -> Self {
        let current = req
            .cookie(COOKIE_NAME)
            .map(|c| form_from_cookie(c.value()))
            .unwrap_or_default();
        Self {
            secure,
            current: RwLock::new(current),
            pending: Mutex::new(None),
        }
    }

    /// Write any queued cookie change onto `response`
    pub fn apply(&self, response: &mut HttpResponse) -> Result<(), ApiError> {
        let pending = self
            .pending
            .lock()
            .map_err(|_| ApiError::Internal("cookie state poisoned".to_string()))?
            .take();
        match pending {
            Some(CookieUpdate::Set(cookie)) => response.add_cookie(&cookie),
            Some(CookieUpdate::Remove) => response.add_removal_cookie(&removal_cookie()),
            None => Ok(()),
        }
        .map_err(|e| ApiError::Internal(format!("failed to set cookie: {}", e)))
    }
}

impl ConnectionStore for CookieStore {
    fn load(&self) -> Result<ConnectionForm, StoreError> {
        Ok(self.current.read().map_err(|_| StoreError::Poisoned)?.clone())
    }

    fn save(&self, config: &ConnectionConfig) -> Result<(), StoreError> {
        let cookie = connection_cookie(config, self.secure)?;
        *self.current.write().map_err(|_| StoreError::Poisoned)? = config.to_form();
        *self.pending.lock().map_err(|_| StoreError::Poisoned)? = Some(CookieUpdate::Set(cookie));
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        *self.current.write().map_err(|_| StoreError::Poisoned)? = ConnectionForm::default();
        *self.pending.lock().map_err(|_| StoreError::Poisoned)? = Some(CookieUpdate::Remove);
        Ok(())
    }
}

/// Connection state and client access for one request
pub struct Session {
    provider: Arc<ClientProvider>,
    cookies: Option<Arc<CookieStore>>,
}

impl Session {
    pub fn new(req: &HttpRequest, state: &AppState) -> Self {
        match &state.backend {
            ConnectionBackend::Cookie { secure } => {
                let cookies = Arc::new(CookieStore::from_request(req, *secure));
                let provider = ClientProvider::with_options(
                    cookies.clone(),
                    state.http.clone(),
                    state.options.clone(),
                );
                Self {
                    provider: Arc::new(provider),
                    cookies: Some(cookies),
                }
            }
            ConnectionBackend::Shared(provider) => Self {
                provider: provider.clone(),
                cookies: None,
            },
        }
    }

    pub async fn client(&self) -> Result<Arc<TypesenseClient>, ApiError> {
        Ok(self.provider.get_client().await?)
    }

    pub fn load(&self) -> Result<ConnectionForm, ApiError> {
        Ok(self.provider.store().load().map_err(tsdash_rs::ClientError::from)?)
    }

    pub fn is_connected(&self) -> Result<bool, ApiError> {
        Ok(self.provider.is_connected()?)
    }

    pub async fn save(&self, config: &ConnectionConfig) -> Result<(), ApiError> {
        self.provider.save(config).await?;
        Ok(())
    }

    pub async fn clear(&self) -> Result<(), ApiError> {
        self.provider.clear().await?;
        Ok(())
    }

    /// Attach pending cookie changes to the outgoing response
    pub fn finish(&self, mut response: HttpResponse) -> Result<HttpResponse, ApiError> {
        if let Some(cookies) = &self.cookies {
            cookies.apply(&mut response)?;
        }
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;
    use tsdash_core::Protocol;

    fn sample() -> ConnectionConfig {
        ConnectionConfig {
            host: "localhost".to_string(),
            port: 8108,
            protocol: Protocol::Http,
            api_key: "x;y=z".to_string(),
        }
    }

    #[test]
    fn test_cookie_attributes() {
        let cookie = connection_cookie(&sample(), true).unwrap();
        assert_eq!(cookie.name(), COOKIE_NAME);
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.max_age(), Some(CookieDuration::days(14)));
        assert!(cookie.value().chars().all(|c| c.is_ascii_alphanumeric() || c == '%'));
    }

    #[test]
    fn test_cookie_round_trip() {
        let cookie = connection_cookie(&sample(), false).unwrap();
        let req = TestRequest::default().cookie(cookie).to_http_request();
        let store = CookieStore::from_request(&req, false);
        assert_eq!(store.load().unwrap().validate().unwrap(), sample());
    }

    #[test]
    fn test_garbage_cookie_loads_default() {
        let req = TestRequest::default()
            .cookie(Cookie::new(COOKIE_NAME, "not-json"))
            .to_http_request();
        let store = CookieStore::from_request(&req, false);
        assert_eq!(store.load().unwrap(), ConnectionForm::default());
        assert!(!store.is_connected().unwrap());
    }

    #[test]
    fn test_save_then_clear_queues_removal() {
        let req = TestRequest::default().to_http_request();
        let store = CookieStore::from_request(&req, false);
        store.save(&sample()).unwrap();
        assert!(store.is_connected().unwrap());

        store.clear().unwrap();
        assert_eq!(store.load().unwrap(), ConnectionForm::default());

        let mut response = HttpResponse::Ok().finish();
        store.apply(&mut response).unwrap();
        let removed = response.cookies().find(|c| c.name() == COOKIE_NAME).unwrap();
        assert_eq!(removed.value(), "");
        assert_eq!(removed.max_age(), Some(CookieDuration::ZERO));
    }
}
