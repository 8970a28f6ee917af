// Freedompro cloud HTTP client
//
// Wraps `reqwest::Client` with base-URL joining, bearer auth, status
// mapping and JSON decoding. Base path: https://api.freedompro.eu/api/freedompro/

use secrecy::SecretString;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::models::{
    AccessoryDescriptor, AccessoryState, DeviceDescriptor, StateEnvelope, SwitchState,
};
use crate::transport::TransportConfig;

pub const DEFAULT_BASE_URL: &str = "https://api.freedompro.eu/api/freedompro/";

/// Async client for the Freedompro REST API and event feed.
///
/// Holds two HTTP clients: one with a request timeout for REST calls and
/// one without for the long-lived event stream.
#[derive(Debug, Clone)]
pub struct FreedomproClient {
    http: reqwest::Client,
    stream_http: reqwest::Client,
    base_url: Url,
}

impl FreedomproClient {
    // ── Constructors ─────────────────────────────────────────────────

    /// Build from a bearer token and transport config.
    pub fn new(
        base_url: &str,
        api_key: &SecretString,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        Ok(Self {
            http: transport.build_client(api_key)?,
            stream_http: transport.build_stream_client(api_key)?,
            base_url: Self::normalize_base_url(base_url)?,
        })
    }

    /// Wrap an existing `reqwest::Client` (caller manages auth headers).
    ///
    /// The same client is used for the event stream.
    pub fn from_reqwest(base_url: &str, http: reqwest::Client) -> Result<Self, Error> {
        Ok(Self {
            stream_http: http.clone(),
            http,
            base_url: Self::normalize_base_url(base_url)?,
        })
    }

    /// Ensure the base path ends with `/` so relative joins append to it.
    fn normalize_base_url(raw: &str) -> Result<Url, Error> {
        let mut url = Url::parse(raw)?;
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        Ok(url)
    }

    /// The normalized base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ── URL builders ─────────────────────────────────────────────────

    fn url(&self, path: &str) -> Result<Url, Error> {
        Ok(self.base_url.join(path)?)
    }

    /// `{base}accessories/{id}/state`, with the id percent-encoded as one segment.
    fn accessory_state_url(&self, composite_id: &str) -> Result<Url, Error> {
        let mut url = self.url("accessories")?;
        url.path_segments_mut()
            .map_err(|()| Error::InvalidUrl(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
            .push(composite_id)
            .push("state");
        Ok(url)
    }

    // ── HTTP verbs ───────────────────────────────────────────────────

    async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T, Error> {
        debug!("GET {url}");

        let resp = self.http.get(url).send().await?;
        let body = checked(resp).await?.text().await?;

        serde_json::from_str(&body).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body,
        })
    }

    async fn put_no_response<B: Serialize + Sync>(&self, url: Url, body: &B) -> Result<(), Error> {
        debug!("PUT {url}");

        let resp = self.http.put(url).json(body).send().await?;
        checked(resp).await?;
        Ok(())
    }

    // ── Endpoints ────────────────────────────────────────────────────

    /// `GET devices/`: every device with its accessories.
    pub async fn list_devices(&self) -> Result<Vec<DeviceDescriptor>, Error> {
        self.get(self.url("devices/")?).await
    }

    /// `GET accessories`: legacy flat accessory list.
    pub async fn list_accessories(&self) -> Result<Vec<AccessoryDescriptor>, Error> {
        self.get(self.url("accessories")?).await
    }

    /// `GET accessories/{id}/state`: current state of one accessory.
    pub async fn get_accessory_state(&self, composite_id: &str) -> Result<SwitchState, Error> {
        let envelope: StateEnvelope = self.get(self.accessory_state_url(composite_id)?).await?;
        Ok(envelope.state)
    }

    /// `GET accessories/state`: state of every accessory in one call.
    pub async fn list_accessory_states(&self) -> Result<Vec<AccessoryState>, Error> {
        self.get(self.url("accessories/state")?).await
    }

    /// `PUT accessories/{id}/state` with `{ "on": bool }`.
    ///
    /// The response body is not inspected: a success status is acceptance.
    pub async fn set_accessory_state(&self, composite_id: &str, on: bool) -> Result<(), Error> {
        self.put_no_response(self.accessory_state_url(composite_id)?, &SwitchState { on })
            .await
    }

    /// `GET events`: open the streaming event feed.
    ///
    /// Returns the response once headers arrive; the body is consumed by
    /// [`crate::events`].
    pub async fn open_event_stream(&self) -> Result<reqwest::Response, Error> {
        let url = self.url("events")?;
        debug!("GET {url} (stream)");

        let resp = self.stream_http.get(url).send().await?;
        checked(resp).await
    }
}

/// Map 401/403 to [`Error::Authentication`] and other non-2xx to [`Error::Api`].
async fn checked(resp: reqwest::Response) -> Result<reqwest::Response, Error> {
    let status = resp.status();

    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        return Err(Error::Authentication {
            message: format!("token rejected (HTTP {})", status.as_u16()),
        });
    }

    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(Error::Api {
            status: status.as_u16(),
            message: if body.is_empty() {
                status.canonical_reason().unwrap_or("unknown").to_owned()
            } else {
                body
            },
        });
    }

    Ok(resp)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_gains_trailing_slash() {
        let client = FreedomproClient::from_reqwest(
            "https://api.freedompro.eu/api/freedompro",
            reqwest::Client::new(),
        )
        .expect("valid url");
        assert_eq!(
            client.base_url().as_str(),
            "https://api.freedompro.eu/api/freedompro/"
        );
    }

    #[test]
    fn accessory_state_url_keeps_composite_id() {
        let client =
            FreedomproClient::from_reqwest(DEFAULT_BASE_URL, reqwest::Client::new()).expect("url");
        let url = client.accessory_state_url("dev1*acc1").expect("url");
        assert_eq!(
            url.as_str(),
            "https://api.freedompro.eu/api/freedompro/accessories/dev1*acc1/state"
        );
    }

    #[test]
    fn accessory_state_url_escapes_slashes() {
        let client =
            FreedomproClient::from_reqwest(DEFAULT_BASE_URL, reqwest::Client::new()).expect("url");
        let url = client.accessory_state_url("a/b*c").expect("url");
        assert!(url.path().ends_with("/accessories/a%2Fb*c/state"));
    }
}
