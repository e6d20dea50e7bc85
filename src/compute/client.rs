//! REST implementation of [`ComputeApi`] built on `reqwest`.

use std::time::Duration;

use reqwest::{Method, RequestBuilder, Url};
use serde::de::DeserializeOwned;

use crate::resource::Resource;

use super::types::{ImageItem, InstanceItem, ListResponse, OperationBody, ZoneItem};
use super::{ComputeApi, ComputeError, ComputeFuture, Operation, Page};

/// Public Compute Engine v1 endpoint.
pub const DEFAULT_API_ENDPOINT: &str = "https://compute.googleapis.com/compute/v1/";

const LIST_ORDER: &str = "creationTimestamp desc";

/// Upper bound on a single API request, including reading the body.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Authenticated Compute Engine client.
///
/// The client does not mint credentials; it sends the supplied OAuth access
/// token as a bearer token on every request.
#[derive(Clone, Debug)]
pub struct ComputeClient {
    http: reqwest::Client,
    base_url: Url,
    token: String,
}

impl ComputeClient {
    /// Creates a client rooted at `endpoint` whose requests give up after
    /// [`REQUEST_TIMEOUT`].
    ///
    /// # Errors
    ///
    /// Returns [`ComputeError::Config`] when the endpoint is not a valid URL
    /// or the token is blank.
    pub fn new(endpoint: &str, token: &str) -> Result<Self, ComputeError> {
        Self::with_request_timeout(endpoint, token, REQUEST_TIMEOUT)
    }

    /// Like [`ComputeClient::new`] with a custom per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`ComputeError::Config`] when the endpoint is not a valid URL,
    /// the token is blank or the HTTP client cannot be built.
    pub fn with_request_timeout(
        endpoint: &str,
        token: &str,
        request_timeout: Duration,
    ) -> Result<Self, ComputeError> {
        let trimmed_token = token.trim();
        if trimmed_token.is_empty() {
            return Err(ComputeError::Config(String::from("access token is empty")));
        }
        let mut normalised = endpoint.trim().to_owned();
        if !normalised.ends_with('/') {
            normalised.push('/');
        }
        let base_url = Url::parse(&normalised)
            .map_err(|err| ComputeError::Config(format!("invalid endpoint {endpoint}: {err}")))?;
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|err| ComputeError::Config(format!("cannot build HTTP client: {err}")))?;
        Ok(Self {
            http,
            base_url,
            token: trimmed_token.to_owned(),
        })
    }

    fn url(&self, path: &str) -> Result<Url, ComputeError> {
        self.base_url
            .join(path)
            .map_err(|err| ComputeError::Config(format!("invalid request path {path}: {err}")))
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.http.request(method, url).bearer_auth(&self.token)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        url: &Url,
        resource: &str,
    ) -> Result<T, ComputeError> {
        let response = request
            .send()
            .await
            .map_err(|err| ComputeError::Transport {
                url: url.to_string(),
                message: err.to_string(),
            })?;
        let status = response.status();
        let body = response.text().await.map_err(|err| ComputeError::Transport {
            url: url.to_string(),
            message: err.to_string(),
        })?;
        if !status.is_success() {
            return Err(ComputeError::Api {
                status: status.as_u16(),
                url: url.to_string(),
                body,
            });
        }
        serde_json::from_str(&body).map_err(|err| ComputeError::Decode {
            resource: resource.to_owned(),
            message: err.to_string(),
        })
    }

    async fn list<T: DeserializeOwned>(
        &self,
        path: &str,
        page_token: Option<&str>,
        ordered: bool,
        resource: &str,
    ) -> Result<ListResponse<T>, ComputeError> {
        let url = self.url(path)?;
        let mut request = self.request(Method::GET, url.clone());
        if ordered {
            request = request.query(&[("orderBy", LIST_ORDER)]);
        }
        if let Some(token) = page_token {
            request = request.query(&[("pageToken", token)]);
        }
        self.send_json(request, &url, resource).await
    }

    async fn operation(&self, method: Method, path: &str) -> Result<Operation, ComputeError> {
        let url = self.url(path)?;
        let request = self.request(method, url.clone());
        let body: OperationBody = self.send_json(request, &url, "operation").await?;
        Operation::try_from(body)
    }
}

impl ComputeApi for ComputeClient {
    fn list_images<'a>(
        &'a self,
        project: &'a str,
        page_token: Option<&'a str>,
    ) -> ComputeFuture<'a, Page<Resource>> {
        Box::pin(async move {
            let path = format!("projects/{project}/global/images");
            let response: ListResponse<ImageItem> =
                self.list(&path, page_token, true, "images").await?;
            Ok(response.into_page(Resource::from))
        })
    }

    fn list_zones<'a>(
        &'a self,
        project: &'a str,
        page_token: Option<&'a str>,
    ) -> ComputeFuture<'a, Page<String>> {
        Box::pin(async move {
            let path = format!("projects/{project}/zones");
            let response: ListResponse<ZoneItem> =
                self.list(&path, page_token, false, "zones").await?;
            Ok(response.into_page(|zone| zone.name))
        })
    }

    fn list_instances<'a>(
        &'a self,
        project: &'a str,
        zone: &'a str,
        page_token: Option<&'a str>,
    ) -> ComputeFuture<'a, Page<Resource>> {
        Box::pin(async move {
            let path = format!("projects/{project}/zones/{zone}/instances");
            let response: ListResponse<InstanceItem> =
                self.list(&path, page_token, true, "instances").await?;
            Ok(response.into_page(|item| item.into_resource(zone)))
        })
    }

    fn delete_image<'a>(
        &'a self,
        project: &'a str,
        name: &'a str,
    ) -> ComputeFuture<'a, Operation> {
        Box::pin(async move {
            let path = format!("projects/{project}/global/images/{name}");
            self.operation(Method::DELETE, &path).await
        })
    }

    fn delete_instance<'a>(
        &'a self,
        project: &'a str,
        zone: &'a str,
        name: &'a str,
    ) -> ComputeFuture<'a, Operation> {
        Box::pin(async move {
            let path = format!("projects/{project}/zones/{zone}/instances/{name}");
            self.operation(Method::DELETE, &path).await
        })
    }

    fn get_zone_operation<'a>(
        &'a self,
        project: &'a str,
        zone: &'a str,
        operation: &'a str,
    ) -> ComputeFuture<'a, Operation> {
        Box::pin(async move {
            let path = format!("projects/{project}/zones/{zone}/operations/{operation}");
            self.operation(Method::GET, &path).await
        })
    }

    fn get_region_operation<'a>(
        &'a self,
        project: &'a str,
        region: &'a str,
        operation: &'a str,
    ) -> ComputeFuture<'a, Operation> {
        Box::pin(async move {
            let path = format!("projects/{project}/regions/{region}/operations/{operation}");
            self.operation(Method::GET, &path).await
        })
    }

    fn get_global_operation<'a>(
        &'a self,
        project: &'a str,
        operation: &'a str,
    ) -> ComputeFuture<'a, Operation> {
        Box::pin(async move {
            let path = format!("projects/{project}/global/operations/{operation}");
            self.operation(Method::GET, &path).await
        })
    }
}
