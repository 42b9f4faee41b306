use async_trait::async_trait;
use reqwest::Client as HttpClient;

use super::{profile::Profile, Error, Result};

/// Abstract Traffic Manager CRUD surface (spec.md §6). `Get` returning
/// `Ok(None)` is the "not found" case reconcilers treat as "proceed to
/// create" (spec.md §4.4 step 5).
#[async_trait]
pub trait TrafficManagerClient: Send + Sync {
    async fn get(&self, resource_group: &str, name: &str) -> Result<Option<Profile>>;
    async fn create_or_update(&self, resource_group: &str, name: &str, profile: &Profile) -> Result<Profile>;
    async fn delete(&self, resource_group: &str, name: &str) -> Result<()>;
}

/// Talks to Azure Resource Manager's Traffic Manager provider over plain
/// `reqwest`, mirroring the narrow abstract-client shape spec.md §6 calls
/// for rather than depending on a generated SDK (out of scope per spec.md
/// §1).
pub struct AzureTrafficManagerClient {
    http: HttpClient,
    endpoint: String,
    subscription_id: String,
    bearer_token: String,
    api_version: String,
}

impl AzureTrafficManagerClient {
    pub fn new(endpoint: String, subscription_id: String, bearer_token: String) -> Self {
        Self {
            http: HttpClient::new(),
            endpoint,
            subscription_id,
            bearer_token,
            api_version: "2022-04-01".to_string(),
        }
    }

    fn url(&self, resource_group: &str, name: &str) -> String {
        format!(
            "{}/subscriptions/{}/resourceGroups/{}/providers/Microsoft.Network/trafficManagerProfiles/{}?api-version={}",
            self.endpoint.trim_end_matches('/'),
            self.subscription_id,
            resource_group,
            name,
            self.api_version,
        )
    }
}

#[async_trait]
impl TrafficManagerClient for AzureTrafficManagerClient {
    async fn get(&self, resource_group: &str, name: &str) -> Result<Option<Profile>> {
        let resp = self
            .http
            .get(self.url(resource_group, name))
            .bearer_auth(&self.bearer_token)
            .send()
            .await?;
        let status = resp.status();
        if status.as_u16() == 404 {
            return Ok(None);
        }
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(Error::from_response(status.as_u16(), &body));
        }
        Ok(Some(serde_json::from_str(&body)?))
    }

    async fn create_or_update(&self, resource_group: &str, name: &str, profile: &Profile) -> Result<Profile> {
        let resp = self
            .http
            .put(self.url(resource_group, name))
            .bearer_auth(&self.bearer_token)
            .json(profile)
            .send()
            .await?;
        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(Error::from_response(status.as_u16(), &body));
        }
        Ok(serde_json::from_str(&body)?)
    }

    async fn delete(&self, resource_group: &str, name: &str) -> Result<()> {
        let resp = self
            .http
            .delete(self.url(resource_group, name))
            .bearer_auth(&self.bearer_token)
            .send()
            .await?;
        let status = resp.status();
        if status.as_u16() == 404 || status.is_success() {
            return Ok(());
        }
        let body = resp.text().await?;
        Err(Error::from_response(status.as_u16(), &body))
    }
}

#[cfg(test)]
pub mod fake {
    use std::{collections::BTreeMap, sync::Mutex};

    use super::*;

    /// In-memory stand-in used by the `TrafficManagerProfile` reconciler
    /// tests (SPEC_FULL.md §10.4): lets tests assert on exactly which
    /// operations were issued without a live endpoint.
    #[derive(Default)]
    pub struct FakeTrafficManagerClient {
        profiles: Mutex<BTreeMap<(String, String), Profile>>,
        pub force_forbidden: Mutex<bool>,
        pub force_conflict: Mutex<bool>,
    }

    impl FakeTrafficManagerClient {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn seed(&self, resource_group: &str, name: &str, profile: Profile) {
            self.profiles
                .lock()
                .unwrap()
                .insert((resource_group.to_string(), name.to_string()), profile);
        }
    }

    #[async_trait]
    impl TrafficManagerClient for FakeTrafficManagerClient {
        async fn get(&self, resource_group: &str, name: &str) -> Result<Option<Profile>> {
            if *self.force_forbidden.lock().unwrap() {
                return Err(Error::Api {
                    status: 403,
                    code: "AuthorizationFailed".into(),
                    message: "forbidden".into(),
                });
            }
            Ok(self
                .profiles
                .lock()
                .unwrap()
                .get(&(resource_group.to_string(), name.to_string()))
                .cloned())
        }

        async fn create_or_update(&self, resource_group: &str, name: &str, profile: &Profile) -> Result<Profile> {
            if *self.force_conflict.lock().unwrap() {
                return Err(Error::Api {
                    status: 409,
                    code: "DnsNameNotAvailable".into(),
                    message: "relative name already in use".into(),
                });
            }
            let mut stored = profile.clone();
            stored.properties.resource_id = Some(format!(
                "/subscriptions/fake/resourceGroups/{resource_group}/providers/Microsoft.Network/trafficManagerProfiles/{name}"
            ));
            stored.properties.dns_config.fqdn = Some(format!("{}.trafficmanager.net", stored.properties.dns_config.relative_name));
            self.profiles
                .lock()
                .unwrap()
                .insert((resource_group.to_string(), name.to_string()), stored.clone());
            Ok(stored)
        }

        async fn delete(&self, resource_group: &str, name: &str) -> Result<()> {
            self.profiles
                .lock()
                .unwrap()
                .remove(&(resource_group.to_string(), name.to_string()));
            Ok(())
        }
    }
}
