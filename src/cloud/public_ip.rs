use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde::Deserialize;

use super::{Error, Result};

/// spec.md §6 "Cloud public-IP protocol".
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicIpAddress {
    pub id: String,
    pub name: String,
    pub properties: PublicIpProperties,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicIpProperties {
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(default)]
    pub dns_settings: Option<PublicIpDnsSettings>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicIpDnsSettings {
    #[serde(default)]
    pub domain_name_label: Option<String>,
}

#[async_trait]
pub trait PublicIpClient: Send + Sync {
    async fn list(&self, resource_group: &str) -> Result<Vec<PublicIpAddress>>;
}

pub struct AzureTrafficManagerPublicIpClient {
    http: HttpClient,
    endpoint: String,
    subscription_id: String,
    bearer_token: String,
}

impl AzureTrafficManagerPublicIpClient {
    pub fn new(endpoint: String, subscription_id: String, bearer_token: String) -> Self {
        Self {
            http: HttpClient::new(),
            endpoint,
            subscription_id,
            bearer_token,
        }
    }
}

#[derive(Deserialize)]
struct ListResponse {
    value: Vec<PublicIpAddress>,
}

#[async_trait]
impl PublicIpClient for AzureTrafficManagerPublicIpClient {
    async fn list(&self, resource_group: &str) -> Result<Vec<PublicIpAddress>> {
        let url = format!(
            "{}/subscriptions/{}/resourceGroups/{}/providers/Microsoft.Network/publicIPAddresses?api-version=2022-05-01",
            self.endpoint.trim_end_matches('/'),
            self.subscription_id,
            resource_group,
        );
        let resp = self.http.get(url).bearer_auth(&self.bearer_token).send().await?;
        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(Error::from_response(status.as_u16(), &body));
        }
        let parsed: ListResponse = serde_json::from_str(&body)?;
        Ok(parsed.value)
    }
}

/// Finds the public IP resource whose `properties.ipAddress` matches the
/// Service's assigned load-balancer ingress IP (spec.md §4.2.1).
pub fn find_by_ingress_ip<'a>(addresses: &'a [PublicIpAddress], ingress_ip: &str) -> Option<&'a PublicIpAddress> {
    addresses
        .iter()
        .find(|addr| addr.properties.ip_address.as_deref() == Some(ingress_ip))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(name: &str, ip: &str) -> PublicIpAddress {
        PublicIpAddress {
            id: format!("/subscriptions/x/resourceGroups/rg/providers/Microsoft.Network/publicIPAddresses/{name}"),
            name: name.to_string(),
            properties: PublicIpProperties {
                ip_address: Some(ip.to_string()),
                dns_settings: None,
            },
        }
    }

    #[test]
    fn finds_matching_ingress_ip() {
        let addresses = vec![addr("a", "1.2.3.4"), addr("b", "5.6.7.8")];
        let found = find_by_ingress_ip(&addresses, "5.6.7.8").unwrap();
        assert_eq!(found.name, "b");
    }

    #[test]
    fn returns_none_when_no_ingress_assigned_yet() {
        let addresses = vec![addr("a", "1.2.3.4")];
        assert!(find_by_ingress_ip(&addresses, "9.9.9.9").is_none());
    }
}
