// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

// Common test utilities for integration tests

use k8s_openapi::api::core::v1::Namespace;
use kube::{
    api::{Api, DeleteParams, PostParams},
    client::Client,
};
use nestlb::config::ReleaseConfig;
use serde_json::json;

/// Get a Kubernetes client or skip the test if no cluster is reachable
pub async fn get_kube_client_or_skip() -> Option<Client> {
    let client = match Client::try_default().await {
        Ok(client) => client,
        Err(e) => {
            eprintln!("Skipping integration test: no Kubernetes client available: {}", e);
            return None;
        }
    };
    match client.apiserver_version().await {
        Ok(_) => Some(client),
        Err(e) => {
            eprintln!("Skipping integration test: API server unreachable: {}", e);
            None
        }
    }
}

/// Create a test namespace
pub async fn create_test_namespace(
    client: &Client,
    name: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let namespaces: Api<Namespace> = Api::all(client.clone());

    let ns = serde_json::from_value(json!({
        "apiVersion": "v1",
        "kind": "Namespace",
        "metadata": {
            "name": name,
            "labels": {
                "test": "integration",
                "managed-by": "nestlb-test"
            }
        }
    }))?;

    match namespaces.create(&PostParams::default(), &ns).await {
        Ok(_) => {
            println!("Created test namespace: {}", name);
            Ok(())
        }
        Err(kube::Error::Api(ae)) if ae.code == 409 => {
            println!("Test namespace already exists: {}", name);
            Ok(())
        }
        Err(e) => Err(Box::new(e)),
    }
}

/// Cleanup test namespace
pub async fn cleanup_test_namespace(
    client: &Client,
    name: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let namespaces: Api<Namespace> = Api::all(client.clone());

    match namespaces.delete(name, &DeleteParams::default()).await {
        Ok(_) => {
            println!("Deleted test namespace: {}", name);
            Ok(())
        }
        Err(kube::Error::Api(ae)) if ae.code == 404 => {
            println!("Test namespace already deleted: {}", name);
            Ok(())
        }
        Err(e) => Err(Box::new(e)),
    }
}

/// Release configuration projecting into `host_namespace` with a single mapped class
pub fn release_config(host_namespace: &str, controller_namespace: &str) -> ReleaseConfig {
    let raw = format!(
        r#"
releaseName: it
namespace: {host_namespace}
loadBalancer:
  serviceName: it-lb
  selector:
    app.kubernetes.io/instance: it
ingress:
  classMappings:
    nginx:
      className: host-nginx
      nodePort:
        namespace: {controller_namespace}
        name: ingress-nginx-controller
        httpPort: http
        httpsPort: https
controller:
  addressPollIntervalMillis: 250
  reconcileTimeoutSecs: 30
"#
    );
    ReleaseConfig::from_yaml(&raw).expect("integration config must parse")
}
