//! HTTP client for the Proxmox VE API.
//!
//! One shared client handle serves all requests. Every transport or protocol
//! failure is folded into [`Error::Upstream`]; callers map that to a 502
//! without seeing transport detail.

use async_trait::async_trait;
use reqwest::{Method, header::AUTHORIZATION};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::config::ProxmoxConfig;
use crate::errors::{Error, Result};
use crate::proxmox::types::{ConsoleTicket, CtCreateParams, Envelope, NodeInfo, RawConfig, RawInstance, Resource};
use crate::types::{ResourceKind, VmId};

/// Access to the external cluster inventory. Implemented by
/// [`ProxmoxClient`]; test code substitutes stubs.
#[async_trait]
pub trait Inventory: Send + Sync {
    /// Cluster node listing
    async fn nodes(&self) -> Result<Vec<NodeInfo>>;

    /// List resources of one kind, per node, best-effort merged: a node
    /// that fails to answer is skipped with a warning, never fatal.
    async fn list(&self, kind: ResourceKind, node: Option<&str>) -> Result<Vec<Resource>>;

    /// Fetch one resource (status + config merged)
    async fn get(&self, kind: ResourceKind, node: &str, vmid: VmId) -> Result<Resource>;

    /// Overwrite a resource's tag string
    async fn set_tags(&self, kind: ResourceKind, node: &str, vmid: VmId, tags: &str) -> Result<()>;

    /// Next free VMID in the cluster
    async fn next_id(&self) -> Result<VmId>;

    /// Full-clone a VM template
    #[allow(clippy::too_many_arguments)]
    async fn clone_vm(
        &self,
        node: &str,
        template_vmid: VmId,
        new_vmid: VmId,
        name: &str,
        storage: &str,
        description: &str,
    ) -> Result<Option<String>>;

    /// Set cores/memory/tags on a VM
    async fn configure_vm(&self, node: &str, vmid: VmId, cores: i64, memory_mb: i64, tags: &str) -> Result<()>;

    /// Grow a VM disk to `size_gb`
    async fn resize_vm_disk(&self, node: &str, vmid: VmId, disk: &str, size_gb: i64) -> Result<()>;

    /// Create an LXC container
    async fn create_ct(&self, node: &str, params: &CtCreateParams) -> Result<Option<String>>;

    /// start/stop/shutdown/... on a resource's status endpoint
    async fn status_action(&self, kind: ResourceKind, node: &str, vmid: VmId, action: &str) -> Result<Option<String>>;

    /// Delete a resource (must be stopped)
    async fn delete(&self, kind: ResourceKind, node: &str, vmid: VmId) -> Result<Option<String>>;

    /// VNC proxy ticket for the console tunnel
    async fn console_ticket(&self, kind: ResourceKind, node: &str, vmid: VmId) -> Result<ConsoleTicket>;
}

#[derive(Debug, Clone)]
pub struct ProxmoxClient {
    http: reqwest::Client,
    base: String,
    auth_header: String,
}

impl ProxmoxClient {
    pub fn new(config: &ProxmoxConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .danger_accept_invalid_certs(!config.verify_tls)
            .build()
            .map_err(|e| Error::Internal {
                operation: format!("build proxmox http client: {e}"),
            })?;
        Ok(Self {
            http,
            base: config.url.as_str().trim_end_matches('/').to_string(),
            auth_header: format!("PVEAPIToken={}={}", config.token_id, config.token_secret),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api2/json{}", self.base, path)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self
            .http
            .get(self.url(path))
            .header(AUTHORIZATION, &self.auth_header)
            .send()
            .await
            .map_err(|e| Error::Upstream {
                message: format!("GET {path}: {e}"),
            })?;
        Self::unwrap_envelope(response, path).await
    }

    /// Send a form-encoded mutation and return the task UPID if the cluster
    /// started one.
    async fn send_form(&self, method: Method, path: &str, params: &[(&str, String)]) -> Result<Option<String>> {
        let response = self
            .http
            .request(method.clone(), self.url(path))
            .header(AUTHORIZATION, &self.auth_header)
            .form(params)
            .send()
            .await
            .map_err(|e| Error::Upstream {
                message: format!("{method} {path}: {e}"),
            })?;
        let data: Option<serde_json::Value> = Self::unwrap_envelope(response, path).await?;
        Ok(data.and_then(|v| v.as_str().map(String::from)))
    }

    async fn unwrap_envelope<T: DeserializeOwned>(response: reqwest::Response, path: &str) -> Result<T> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Upstream {
                message: format!("{path} returned {status}: {body}"),
            });
        }
        let envelope: Envelope<T> = response.json().await.map_err(|e| Error::Upstream {
            message: format!("{path} returned unparsable body: {e}"),
        })?;
        Ok(envelope.data)
    }

    fn instance_path(kind: ResourceKind, node: &str, vmid: VmId) -> String {
        format!("/nodes/{node}/{}/{vmid}", kind.api_segment())
    }
}

#[async_trait]
impl Inventory for ProxmoxClient {
    async fn nodes(&self) -> Result<Vec<NodeInfo>> {
        self.get_json("/nodes").await
    }

    async fn list(&self, kind: ResourceKind, node: Option<&str>) -> Result<Vec<Resource>> {
        let node_names: Vec<String> = match node {
            Some(n) => vec![n.to_string()],
            None => self.nodes().await?.into_iter().map(|n| n.node).collect(),
        };

        // Fan out over the nodes concurrently; a node that fails to answer
        // is skipped, never fatal.
        let fetches = node_names.iter().map(|name| async move {
            let path = format!("/nodes/{name}/{}", kind.api_segment());
            (name, self.get_json::<Vec<RawInstance>>(&path).await)
        });

        let mut resources = Vec::new();
        for (name, fetched) in futures::future::join_all(fetches).await {
            match fetched {
                Ok(raw) => resources.extend(raw.into_iter().map(|r| r.normalize(kind, name))),
                Err(e) => warn!(node = %name, kind = %kind, error = %e, "skipping node in inventory listing"),
            }
        }
        debug!(kind = %kind, count = resources.len(), "listed inventory");
        Ok(resources)
    }

    async fn get(&self, kind: ResourceKind, node: &str, vmid: VmId) -> Result<Resource> {
        let base = Self::instance_path(kind, node, vmid);
        let mut status: RawInstance = self.get_json(&format!("{base}/status/current")).await?;
        let config: RawConfig = self.get_json(&format!("{base}/config")).await?;

        // Tags and names live on the config object; the status endpoint is
        // authoritative for everything runtime.
        status.vmid = vmid;
        if status.tags.is_none() {
            status.tags = config.tags;
        }
        if status.name.is_none() {
            status.name = config.name.or(config.hostname);
        }
        if status.template.is_none() {
            status.template = config.template;
        }
        Ok(status.normalize(kind, node))
    }

    async fn set_tags(&self, kind: ResourceKind, node: &str, vmid: VmId, tags: &str) -> Result<()> {
        let path = format!("{}/config", Self::instance_path(kind, node, vmid));
        self.send_form(Method::PUT, &path, &[("tags", tags.to_string())]).await?;
        Ok(())
    }

    async fn next_id(&self) -> Result<VmId> {
        // nextid comes back as a JSON string
        let raw: serde_json::Value = self.get_json("/cluster/nextid").await?;
        let id = match &raw {
            serde_json::Value::String(s) => s.parse::<VmId>().ok(),
            serde_json::Value::Number(n) => n.as_u64().and_then(|v| VmId::try_from(v).ok()),
            _ => None,
        };
        id.ok_or_else(|| Error::Upstream {
            message: format!("/cluster/nextid returned unexpected value: {raw}"),
        })
    }

    async fn clone_vm(
        &self,
        node: &str,
        template_vmid: VmId,
        new_vmid: VmId,
        name: &str,
        storage: &str,
        description: &str,
    ) -> Result<Option<String>> {
        let path = format!("/nodes/{node}/qemu/{template_vmid}/clone");
        self.send_form(
            Method::POST,
            &path,
            &[
                ("newid", new_vmid.to_string()),
                ("name", name.to_string()),
                ("full", "1".to_string()),
                ("target", node.to_string()),
                ("storage", storage.to_string()),
                ("description", description.to_string()),
            ],
        )
        .await
    }

    async fn configure_vm(&self, node: &str, vmid: VmId, cores: i64, memory_mb: i64, tags: &str) -> Result<()> {
        let path = format!("/nodes/{node}/qemu/{vmid}/config");
        self.send_form(
            Method::PUT,
            &path,
            &[
                ("cores", cores.to_string()),
                ("memory", memory_mb.to_string()),
                ("tags", tags.to_string()),
            ],
        )
        .await?;
        Ok(())
    }

    async fn resize_vm_disk(&self, node: &str, vmid: VmId, disk: &str, size_gb: i64) -> Result<()> {
        let path = format!("/nodes/{node}/qemu/{vmid}/resize");
        self.send_form(
            Method::PUT,
            &path,
            &[("disk", disk.to_string()), ("size", format!("{size_gb}G"))],
        )
        .await?;
        Ok(())
    }

    async fn create_ct(&self, node: &str, params: &CtCreateParams) -> Result<Option<String>> {
        let mut form = vec![
            ("vmid", params.vmid.to_string()),
            ("hostname", params.hostname.clone()),
            ("ostemplate", params.ostemplate.clone()),
            ("memory", params.memory_mb.to_string()),
            ("swap", params.swap_mb.to_string()),
            ("cores", params.cores.to_string()),
            ("rootfs", format!("{}:{}", params.storage, params.disk_gb)),
            (
                "net0",
                format!("name=eth0,bridge={},ip={},type=veth", params.net_bridge, params.net_ip),
            ),
            ("unprivileged", if params.unprivileged { "1" } else { "0" }.to_string()),
            ("start", if params.start { "1" } else { "0" }.to_string()),
            ("description", params.description.clone()),
            ("tags", params.tags.clone()),
        ];
        if let Some(password) = &params.password {
            form.push(("password", password.clone()));
        }
        self.send_form(Method::POST, &format!("/nodes/{node}/lxc"), &form).await
    }

    async fn status_action(&self, kind: ResourceKind, node: &str, vmid: VmId, action: &str) -> Result<Option<String>> {
        let path = format!("{}/status/{action}", Self::instance_path(kind, node, vmid));
        self.send_form(Method::POST, &path, &[]).await
    }

    async fn delete(&self, kind: ResourceKind, node: &str, vmid: VmId) -> Result<Option<String>> {
        let path = Self::instance_path(kind, node, vmid);
        let response = self
            .http
            .delete(self.url(&path))
            .header(AUTHORIZATION, &self.auth_header)
            .send()
            .await
            .map_err(|e| Error::Upstream {
                message: format!("DELETE {path}: {e}"),
            })?;
        let data: Option<serde_json::Value> = Self::unwrap_envelope(response, &path).await?;
        Ok(data.and_then(|v| v.as_str().map(String::from)))
    }

    async fn console_ticket(&self, kind: ResourceKind, node: &str, vmid: VmId) -> Result<ConsoleTicket> {
        let path = format!("{}/vncproxy", Self::instance_path(kind, node, vmid));
        let response = self
            .http
            .post(self.url(&path))
            .header(AUTHORIZATION, &self.auth_header)
            .form(&[("websocket", "1")])
            .send()
            .await
            .map_err(|e| Error::Upstream {
                message: format!("POST {path}: {e}"),
            })?;
        Self::unwrap_envelope(response, &path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use url::Url;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> ProxmoxClient {
        ProxmoxClient::new(&ProxmoxConfig {
            url: Url::parse(&server.uri()).unwrap(),
            token_id: "api@pam!pvectl".to_string(),
            token_secret: "secret".to_string(),
            verify_tls: false,
            timeout: std::time::Duration::from_secs(5),
        })
        .unwrap()
    }

    async fn mock_nodes(server: &MockServer, names: &[&str]) {
        let data: Vec<_> = names.iter().map(|n| json!({"node": n, "status": "online"})).collect();
        Mock::given(method("GET"))
            .and(path("/api2/json/nodes"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": data})))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn list_merges_nodes_best_effort() {
        let server = MockServer::start().await;
        mock_nodes(&server, &["pve1", "pve2"]).await;
        Mock::given(method("GET"))
            .and(path("/api2/json/nodes/pve1/qemu"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": [
                {"vmid": 100, "name": "web", "status": "running", "cpus": 2, "maxmem": 2147483648u64, "maxdisk": 34359738368u64, "tags": "owner:1"}
            ]})))
            .mount(&server)
            .await;
        // pve2 is down; the listing must still succeed with pve1's resources.
        Mock::given(method("GET"))
            .and(path("/api2/json/nodes/pve2/qemu"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let resources = client.list(ResourceKind::Vm, None).await.unwrap();
        assert_eq!(resources.len(), 1);
        assert_eq!(resources[0].vmid, 100);
        assert_eq!(resources[0].node, "pve1");
        assert_eq!(resources[0].vcpus, 2);
        assert_eq!(resources[0].tags, "owner:1");
    }

    #[tokio::test]
    async fn list_with_explicit_node_skips_node_discovery() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api2/json/nodes/pve1/lxc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": [
                {"vmid": 200, "name": "ct1", "status": "stopped"}
            ]})))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let resources = client.list(ResourceKind::Lxc, Some("pve1")).await.unwrap();
        assert_eq!(resources.len(), 1);
        assert_eq!(resources[0].kind, ResourceKind::Lxc);
    }

    #[tokio::test]
    async fn get_merges_status_and_config() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api2/json/nodes/pve1/qemu/100/status/current"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data":
                {"vmid": 100, "status": "running", "cpus": 4, "maxmem": 1024, "uptime": 99}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api2/json/nodes/pve1/qemu/100/config"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data":
                {"name": "web", "tags": "owner:3;prod"}
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let resource = client.get(ResourceKind::Vm, "pve1", 100).await.unwrap();
        assert_eq!(resource.name, "web");
        assert_eq!(resource.tags, "owner:3;prod");
        assert_eq!(resource.vcpus, 4);
        assert_eq!(resource.uptime, 99);
    }

    #[tokio::test]
    async fn get_failure_is_upstream_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api2/json/nodes/pve1/qemu/100/status/current"))
            .respond_with(ResponseTemplate::new(500).set_body_string("pve exploded"))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client.get(ResourceKind::Vm, "pve1", 100).await.unwrap_err();
        assert!(matches!(err, Error::Upstream { .. }));
        // The user-facing message must not carry upstream internals.
        assert!(!err.user_message().contains("pve exploded"));
    }

    #[tokio::test]
    async fn next_id_parses_string_payload() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api2/json/cluster/nextid"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": "105"})))
            .mount(&server)
            .await;

        let client = client_for(&server);
        assert_eq!(client.next_id().await.unwrap(), 105);
    }

    #[tokio::test]
    async fn set_tags_puts_config() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/api2/json/nodes/pve1/lxc/200/config"))
            .and(body_string_contains("tags=web%3Bowner%3A4"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": null})))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        client.set_tags(ResourceKind::Lxc, "pve1", 200, "web;owner:4").await.unwrap();
    }

    #[tokio::test]
    async fn status_action_returns_task_upid() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api2/json/nodes/pve1/qemu/100/status/start"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": "UPID:pve1:0001:start"})))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let task = client.status_action(ResourceKind::Vm, "pve1", 100, "start").await.unwrap();
        assert_eq!(task.as_deref(), Some("UPID:pve1:0001:start"));
    }

    #[tokio::test]
    async fn console_ticket_round_trip() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api2/json/nodes/pve1/qemu/100/vncproxy"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data":
                {"ticket": "PVEVNC:abc", "port": "5900", "user": "api@pam"}
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let ticket = client.console_ticket(ResourceKind::Vm, "pve1", 100).await.unwrap();
        assert_eq!(ticket.ticket, "PVEVNC:abc");
        assert_eq!(ticket.port, "5900");
    }
}
