use reqwest::{
    Client,
    header::{HeaderMap, HeaderValue, CONTENT_TYPE, AUTHORIZATION},
    Method,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, error};

use shared_config::AppConfig;

use crate::error::DatabaseError;

pub type DbResult<T> = Result<T, DatabaseError>;

pub struct SupabaseClient {
    client: Client,
    base_url: String,
    anon_key: String,
    service_role_key: String,
}

impl SupabaseClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.supabase_url.trim_end_matches('/').to_string(),
            anon_key: config.supabase_anon_key.clone(),
            service_role_key: config.supabase_service_role_key.clone(),
        }
    }

    fn header_value(value: &str) -> DbResult<HeaderValue> {
        HeaderValue::from_str(value)
            .map_err(|e| DatabaseError::Backend(format!("invalid header value: {}", e)))
    }

    fn get_headers(&self, auth_token: Option<&str>) -> DbResult<HeaderMap> {
        let mut headers = HeaderMap::new();

        headers.insert("apikey", Self::header_value(&self.anon_key)?);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        // Server-side writes prefer the service role; otherwise act as the caller.
        let bearer = match auth_token {
            Some(token) => Some(token),
            None if !self.service_role_key.is_empty() => Some(self.service_role_key.as_str()),
            None if !self.anon_key.is_empty() => Some(self.anon_key.as_str()),
            None => None,
        };

        if let Some(token) = bearer {
            headers.insert(AUTHORIZATION, Self::header_value(&format!("Bearer {}", token))?);
        }

        Ok(headers)
    }

    pub async fn request<T>(&self, method: Method, path: &str,
                            auth_token: Option<&str>, body: Option<Value>)
                            -> DbResult<T>
    where T: DeserializeOwned {
        self.request_with_headers(method, path, auth_token, body, None).await
    }

    pub async fn request_with_headers<T>(&self, method: Method, path: &str,
                                         auth_token: Option<&str>, body: Option<Value>,
                                         extra_headers: Option<HeaderMap>)
                                         -> DbResult<T>
    where T: DeserializeOwned {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making {} request to {}", method, url);

        let mut headers = self.get_headers(auth_token)?;
        if let Some(extra) = extra_headers {
            headers.extend(extra);
        }

        let mut req = self.client.request(method, &url)
            .headers(headers);

        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req.send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await?;
            error!("API error ({}): {}", status, error_text);
            return Err(DatabaseError::from_response(status.as_u16(), &error_text));
        }

        let data = response.json::<T>().await?;
        Ok(data)
    }

    /// GET rows from a PostgREST path (`/rest/v1/<table>?<filters>`).
    pub async fn select<T>(&self, path: &str) -> DbResult<Vec<T>>
    where T: DeserializeOwned {
        self.request(Method::GET, path, None, None).await
    }

    /// Fetch at most one row; an empty result is `None`.
    pub async fn select_one<T>(&self, path: &str) -> DbResult<Option<T>>
    where T: DeserializeOwned {
        let rows: Vec<T> = self.select(path).await?;
        Ok(rows.into_iter().next())
    }

    /// Insert a row and return the stored representation.
    pub async fn insert<T>(&self, table: &str, row: Value) -> DbResult<T>
    where T: DeserializeOwned {
        let path = format!("/rest/v1/{}", table);
        let rows: Vec<T> = self.request_with_headers(
            Method::POST,
            &path,
            None,
            Some(row),
            Some(Self::return_representation()),
        ).await?;

        rows.into_iter()
            .next()
            .ok_or_else(|| DatabaseError::Backend(format!("insert into {} returned no rows", table)))
    }

    /// PATCH rows matching `filter` and return the updated representations.
    pub async fn update<T>(&self, table: &str, filter: &str, changes: Value) -> DbResult<Vec<T>>
    where T: DeserializeOwned {
        let path = format!("/rest/v1/{}?{}", table, filter);
        self.request_with_headers(
            Method::PATCH,
            &path,
            None,
            Some(changes),
            Some(Self::return_representation()),
        ).await
    }

    /// DELETE rows matching `filter` and return what was removed.
    pub async fn delete<T>(&self, table: &str, filter: &str) -> DbResult<Vec<T>>
    where T: DeserializeOwned {
        let path = format!("/rest/v1/{}?{}", table, filter);
        self.request_with_headers(
            Method::DELETE,
            &path,
            None,
            None,
            Some(Self::return_representation()),
        ).await
    }

    fn return_representation() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("Prefer", HeaderValue::from_static("return=representation"));
        headers
    }
}
