use std::future::Future;
use std::pin::Pin;

use log::debug;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::json;

use crate::config::AdminConfig;
use crate::error::AdminError;
use crate::models::{AckEnvelope, ReportStatus, ReportsEnvelope, SirensEnvelope, UsersEnvelope};
use crate::storage::LocalStore;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The admin REST surface consumed by the console.
pub trait DataSource: Send + Sync {
    fn fetch_users(&self) -> BoxFuture<'_, Result<UsersEnvelope, AdminError>>;

    fn fetch_reports(&self) -> BoxFuture<'_, Result<ReportsEnvelope, AdminError>>;

    fn fetch_sirens(&self) -> BoxFuture<'_, Result<SirensEnvelope, AdminError>>;

    fn delete_user<'a>(&'a self, user_id: &'a str)
        -> BoxFuture<'a, Result<AckEnvelope, AdminError>>;

    fn change_status<'a>(
        &'a self,
        report_id: &'a str,
        status: &'a ReportStatus,
    ) -> BoxFuture<'a, Result<AckEnvelope, AdminError>>;

    fn delete_report<'a>(
        &'a self,
        report_id: &'a str,
    ) -> BoxFuture<'a, Result<AckEnvelope, AdminError>>;
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: String,
}

impl ApiClient {
    pub fn new(client: Client, base_url: &str, token: String) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        }
    }

    /// Builds a client from the stored credential, or fails when the
    /// administrator has not signed in.
    pub fn from_store(config: &AdminConfig, store: &LocalStore) -> Result<Self, AdminError> {
        let token = store.token()?.ok_or(AdminError::MissingCredential)?;
        let client = Client::builder().timeout(config.http_timeout).build()?;
        Ok(Self::new(client, &config.api_url, token))
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        request: RequestBuilder,
    ) -> Result<T, AdminError> {
        debug!("calling {endpoint}");
        let response = request.bearer_auth(&self.token).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AdminError::Status {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
            });
        }

        Ok(response.json::<T>().await?)
    }
}

impl DataSource for ApiClient {
    fn fetch_users(&self) -> BoxFuture<'_, Result<UsersEnvelope, AdminError>> {
        Box::pin(async move {
            let request = self.client.get(self.url("getusers"));
            self.send("/getusers", request).await
        })
    }

    fn fetch_reports(&self) -> BoxFuture<'_, Result<ReportsEnvelope, AdminError>> {
        Box::pin(async move {
            let request = self.client.get(self.url("reports"));
            self.send("/reports", request).await
        })
    }

    fn fetch_sirens(&self) -> BoxFuture<'_, Result<SirensEnvelope, AdminError>> {
        Box::pin(async move {
            let request = self.client.get(self.url("getsirens"));
            self.send("/getsirens", request).await
        })
    }

    fn delete_user<'a>(
        &'a self,
        user_id: &'a str,
    ) -> BoxFuture<'a, Result<AckEnvelope, AdminError>> {
        Box::pin(async move {
            let request = self
                .client
                .delete(self.url("deleteuser"))
                .query(&[("userId", user_id)]);
            self.send("/deleteuser", request).await
        })
    }

    fn change_status<'a>(
        &'a self,
        report_id: &'a str,
        status: &'a ReportStatus,
    ) -> BoxFuture<'a, Result<AckEnvelope, AdminError>> {
        Box::pin(async move {
            let request = self
                .client
                .put(self.url("changestatus"))
                .json(&json!({ "id": report_id, "status": status.as_str() }));
            self.send("/changestatus", request).await
        })
    }

    fn delete_report<'a>(
        &'a self,
        report_id: &'a str,
    ) -> BoxFuture<'a, Result<AckEnvelope, AdminError>> {
        Box::pin(async move {
            let request = self
                .client
                .delete(self.url("deletereport"))
                .json(&json!({ "id": report_id }));
            self.send("/deletereport", request).await
        })
    }
}
