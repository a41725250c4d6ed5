//! REST-backed Cloud Director session
//!
//! Thin client over the cloudapi surface (gateways, load balancer pools,
//! virtual services, NAT rules, application port profiles) and the legacy
//! typed query endpoint (named disks). Only the calls the cleaners need are
//! implemented.
//!
//! Deletes treat HTTP 404 as success: an object that is already gone is
//! exactly the state the cleaner wants, and repeated passes must stay
//! idempotent.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use kube::Client;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, LINK};
use reqwest::{Response, StatusCode};
use serde::Deserialize;
use tracing::debug;
use url::Url;

use super::credentials::{credentials_for_cluster, UserCredentials};
use super::pagination::PageResponse;
use super::session::{
    DiskRecord, DiskRecordPage, GatewayRef, ResourceRecord, SessionProvider, VcdSession, VmRef,
};
use crate::crd::VCDCluster;
use crate::error::Error;

const CLOUDAPI_VERSION: &str = "37.2";
const TASK_POLL_INTERVAL: Duration = Duration::from_secs(3);

/// Builds [`RestSession`]s from cluster credentials.
///
/// Holds the kube client used to resolve Secret-referenced credentials; a
/// fresh login is performed per reconciliation pass.
pub struct RestSessionProvider {
    client: Client,
}

impl RestSessionProvider {
    /// Create a provider backed by the given kube client
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SessionProvider for RestSessionProvider {
    async fn session(&self, cluster: &VCDCluster) -> Result<Arc<dyn VcdSession>, Error> {
        let creds = credentials_for_cluster(&self.client, cluster).await?;
        let session = RestSession::login(&cluster.spec.site, cluster.org_name(), &creds).await?;
        Ok(Arc::new(session))
    }
}

/// Authenticated REST session against one Cloud Director site
pub struct RestSession {
    http: reqwest::Client,
    site: Url,
}

impl RestSession {
    /// Log in and return a session holding a bearer token.
    ///
    /// A refresh token is preferred when present; otherwise basic auth
    /// against the session endpoint is used.
    pub async fn login(site: &str, org: &str, creds: &UserCredentials) -> Result<Self, Error> {
        let site = Url::parse(site)
            .map_err(|e| Error::credentials(format!("invalid site URL [{site}]: {e}")))?;

        let token = if !creds.refresh_token.is_empty() {
            oauth_login(&site, org, &creds.refresh_token).await?
        } else {
            basic_login(&site, org, creds).await?
        };

        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|e| Error::credentials(format!("invalid bearer token: {e}")))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/json;version=37.2"),
        );

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self { http, site })
    }

    fn cloudapi(&self, path: &str) -> Result<Url, Error> {
        self.site
            .join(&format!("cloudapi/1.0.0/{path}"))
            .map_err(|e| Error::vcd(format!("invalid cloudapi path [{path}]: {e}")))
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, url: Url, what: &str) -> Result<T, Error> {
        let resp = check(self.http.get(url).send().await?, what).await?;
        resp.json().await.map_err(Error::Http)
    }

    /// DELETE the given URL; 404 counts as success.
    async fn delete(&self, url: Url, what: &str) -> Result<(), Error> {
        let resp = self.http.delete(url).send().await?;
        if resp.status() == StatusCode::NOT_FOUND {
            debug!(what, "object already gone, treating delete as success");
            return Ok(());
        }
        check(resp, what).await?;
        Ok(())
    }

    /// Poll a task href until it leaves the running states.
    async fn wait_for_task(&self, task_href: &str, what: &str) -> Result<(), Error> {
        let url = Url::parse(task_href)
            .map_err(|e| Error::vcd(format!("invalid task href [{task_href}]: {e}")))?;
        loop {
            let task: Task = self.get_json(url.clone(), what).await?;
            match task.status.as_str() {
                "success" => return Ok(()),
                "error" | "aborted" | "canceled" => {
                    return Err(Error::vcd(format!(
                        "{what}: task finished with status [{}]",
                        task.status
                    )))
                }
                _ => tokio::time::sleep(TASK_POLL_INTERVAL).await,
            }
        }
    }
}

async fn oauth_login(site: &Url, org: &str, refresh_token: &str) -> Result<String, Error> {
    let url = site
        .join(&format!("oauth/tenant/{org}/token"))
        .map_err(|e| Error::credentials(format!("invalid oauth path: {e}")))?;
    let resp = reqwest::Client::new()
        .post(url)
        .form(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ])
        .send()
        .await?;
    let resp = check(resp, "refresh token login").await?;
    let body: OauthToken = resp.json().await?;
    Ok(body.access_token)
}

async fn basic_login(site: &Url, org: &str, creds: &UserCredentials) -> Result<String, Error> {
    let url = site
        .join("cloudapi/1.0.0/sessions")
        .map_err(|e| Error::credentials(format!("invalid session path: {e}")))?;
    let resp = reqwest::Client::new()
        .post(url)
        .header(
            ACCEPT,
            format!("application/json;version={CLOUDAPI_VERSION}"),
        )
        .basic_auth(format!("{}@{}", creds.username, org), Some(&creds.password))
        .send()
        .await?;
    let resp = check(resp, "session login").await?;
    resp.headers()
        .get("x-vmware-vcloud-access-token")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .ok_or_else(|| Error::credentials("session login returned no access token".to_string()))
}

async fn check(resp: Response, what: &str) -> Result<Response, Error> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(Error::vcd(format!("{what} failed: {status}: {body}")))
}

fn link_headers(resp: &Response) -> Vec<String> {
    resp.headers()
        .get_all(LINK)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(str::to_string)
        .collect()
}

#[async_trait]
impl VcdSession for RestSession {
    async fn gateway(&self, network: &str, _vip_subnet: &str) -> Result<GatewayRef, Error> {
        let mut url = self.cloudapi("edgeGateways")?;
        url.query_pairs_mut()
            .append_pair("filter", &format!("(ovdcNetworkName=={network})"));
        let list: EntityList = self.get_json(url, "list edge gateways").await?;
        let gw = list.values.into_iter().next().ok_or_else(|| {
            Error::vcd(format!("no edge gateway found for network [{network}]"))
        })?;
        Ok(GatewayRef {
            id: gw.id,
            name: gw.name,
        })
    }

    async fn list_lb_pools(&self, gateway: &GatewayRef) -> Result<Vec<ResourceRecord>, Error> {
        let mut url = self.cloudapi("loadBalancer/pools")?;
        url.query_pairs_mut()
            .append_pair("filter", &format!("(gatewayRef.id=={})", gateway.id));
        let list: EntityList = self.get_json(url, "list load balancer pools").await?;
        Ok(list.values.into_iter().map(Entity::into_record).collect())
    }

    async fn delete_lb_pool(&self, pool: &ResourceRecord) -> Result<(), Error> {
        let url = self.cloudapi(&format!("loadBalancer/pools/{}", pool.id))?;
        self.delete(url, &format!("delete load balancer pool [{}]", pool.name))
            .await
    }

    async fn list_virtual_services(
        &self,
        gateway: &GatewayRef,
    ) -> Result<Vec<ResourceRecord>, Error> {
        let mut url = self.cloudapi("virtualServices")?;
        url.query_pairs_mut()
            .append_pair("filter", &format!("(gatewayRef.id=={})", gateway.id));
        let list: EntityList = self.get_json(url, "list virtual services").await?;
        Ok(list.values.into_iter().map(Entity::into_record).collect())
    }

    async fn delete_virtual_service(&self, service: &ResourceRecord) -> Result<(), Error> {
        let url = self.cloudapi(&format!("virtualServices/{}", service.id))?;
        self.delete(url, &format!("delete virtual service [{}]", service.name))
            .await
    }

    async fn nat_rules_page(
        &self,
        gateway: &GatewayRef,
        page_size: u32,
        cursor: Option<String>,
    ) -> Result<PageResponse<ResourceRecord>, Error> {
        let mut url = self.cloudapi(&format!("edgeGateways/{}/nat/rules", gateway.id))?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("pageSize", &page_size.to_string());
            if let Some(cursor) = &cursor {
                pairs.append_pair("cursor", cursor);
            }
        }
        let resp = check(self.http.get(url).send().await?, "list nat rules").await?;
        let link_headers = link_headers(&resp);
        let list: EntityList = resp.json().await?;
        Ok(PageResponse {
            values: list.values.into_iter().map(Entity::into_record).collect(),
            link_headers,
        })
    }

    async fn delete_nat_rule(
        &self,
        gateway: &GatewayRef,
        rule: &ResourceRecord,
    ) -> Result<(), Error> {
        let url = self.cloudapi(&format!("edgeGateways/{}/nat/rules/{}", gateway.id, rule.id))?;
        self.delete(url, &format!("delete NAT rule [{}]", rule.name))
            .await
    }

    async fn list_app_port_profiles(&self, org: &str) -> Result<Vec<ResourceRecord>, Error> {
        let mut url = self.cloudapi("applicationPortProfiles")?;
        url.query_pairs_mut()
            .append_pair("filter", &format!("(orgRef.name=={org};scope==TENANT)"));
        let list: EntityList = self
            .get_json(url, "list application port profiles")
            .await?;
        Ok(list.values.into_iter().map(Entity::into_record).collect())
    }

    async fn delete_app_port_profile(&self, profile: &ResourceRecord) -> Result<(), Error> {
        let url = self.cloudapi(&format!("applicationPortProfiles/{}", profile.id))?;
        self.delete(
            url,
            &format!("delete application port profile [{}]", profile.name),
        )
        .await
    }

    async fn disk_records_by_description(
        &self,
        description: &str,
        page: u32,
    ) -> Result<DiskRecordPage, Error> {
        let mut url = self
            .site
            .join("api/query")
            .map_err(|e| Error::vcd(format!("invalid query path: {e}")))?;
        url.query_pairs_mut()
            .append_pair("type", "disk")
            .append_pair("format", "records")
            .append_pair("filter", &format!("description=={description}"))
            .append_pair("filterEncoded", "true")
            .append_pair("page", &page.to_string());
        let resp = check(
            self.http
                .get(url)
                .header(
                    ACCEPT,
                    format!("application/*+json;version={CLOUDAPI_VERSION}"),
                )
                .send()
                .await?,
            "query disk records",
        )
        .await?;
        let result: QueryRecords = resp.json().await?;
        Ok(DiskRecordPage {
            records: result
                .record
                .into_iter()
                .map(|r| DiskRecord {
                    name: r.name,
                    href: r.href,
                })
                .collect(),
            has_next: result.link.iter().any(|l| l.rel == "nextPage"),
        })
    }

    async fn attached_vms(&self, disk: &DiskRecord) -> Result<Vec<VmRef>, Error> {
        let url = Url::parse(&format!("{}/attachedVms", disk.href))
            .map_err(|e| Error::vcd(format!("invalid disk href [{}]: {e}", disk.href)))?;
        let resp = self
            .http
            .get(url)
            .header(
                ACCEPT,
                format!("application/*+json;version={CLOUDAPI_VERSION}"),
            )
            .send()
            .await?;
        let resp = check(resp, &format!("list VMs attached to disk [{}]", disk.name)).await?;
        let vms: AttachedVms = resp.json().await?;
        Ok(vms
            .vm_reference
            .into_iter()
            .map(|v| VmRef {
                name: v.name,
                href: v.href,
            })
            .collect())
    }

    async fn detach_disk(&self, vm: &VmRef, disk: &DiskRecord) -> Result<(), Error> {
        let url = Url::parse(&format!("{}/disk/action/detach", vm.href))
            .map_err(|e| Error::vcd(format!("invalid vm href [{}]: {e}", vm.href)))?;
        let what = format!("detach disk [{}] from vm [{}]", disk.name, vm.name);
        let resp = self
            .http
            .post(url)
            .json(&serde_json::json!({ "disk": { "href": disk.href } }))
            .send()
            .await?;
        let resp = check(resp, &what).await?;
        let task: Task = resp.json().await?;
        self.wait_for_task(&task.href, &what).await
    }

    async fn delete_disk(&self, disk: &DiskRecord) -> Result<(), Error> {
        let url = Url::parse(&disk.href)
            .map_err(|e| Error::vcd(format!("invalid disk href [{}]: {e}", disk.href)))?;
        let what = format!("delete disk [{}]", disk.name);
        let resp = self.http.delete(url).send().await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        let resp = check(resp, &what).await?;
        let task: Task = resp.json().await?;
        self.wait_for_task(&task.href, &what).await
    }
}

// Wire types, reduced to the fields the cleaners consume.

#[derive(Debug, Deserialize)]
struct OauthToken {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct Entity {
    id: String,
    name: String,
}

impl Entity {
    fn into_record(self) -> ResourceRecord {
        ResourceRecord {
            name: self.name,
            id: self.id,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct EntityList {
    values: Vec<Entity>,
}

#[derive(Debug, Deserialize)]
struct Task {
    href: String,
    status: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct QueryRecords {
    record: Vec<DiskQueryRecord>,
    link: Vec<LinkEntry>,
}

#[derive(Debug, Deserialize)]
struct DiskQueryRecord {
    name: String,
    href: String,
}

#[derive(Debug, Deserialize)]
struct LinkEntry {
    rel: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct AttachedVms {
    vm_reference: Vec<VmEntry>,
}

#[derive(Debug, Deserialize)]
struct VmEntry {
    name: String,
    href: String,
}
