// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `loadbalancer/index.rs`

#[cfg(test)]
mod tests {
    use crate::reconcilers::loadbalancer::index::{filler_port, ServiceIndex};
    use crate::reconcilers::ObjectKey;
    use k8s_openapi::api::core::v1::{Service, ServicePort, ServiceSpec};
    use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;

    fn port(name: Option<&str>, port: i32, node_port: Option<i32>) -> ServicePort {
        ServicePort {
            name: name.map(str::to_string),
            port,
            node_port,
            protocol: Some("TCP".to_string()),
            ..Default::default()
        }
    }

    fn service(ports: Vec<ServicePort>) -> Service {
        Service {
            spec: Some(ServiceSpec {
                type_: Some("NodePort".to_string()),
                ports: Some(ports),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_upsert_names_ports_by_checksum() {
        let mut index = ServiceIndex::new();
        let key = ObjectKey::new("ns1", "svc1");

        let contributed = index.upsert(
            &key,
            &service(vec![
                port(Some("http"), 80, Some(30080)),
                port(Some("https"), 443, Some(30443)),
            ]),
        );

        assert_eq!(contributed, vec![30080, 30443]);
        let ports = index.desired_ports();
        assert_eq!(ports.len(), 2);
        assert_eq!(ports[0].name.as_deref(), Some("np-0x1fcd04ae"));
        assert_eq!(ports[0].port, 30080);
        assert_eq!(ports[0].target_port, Some(IntOrString::Int(30080)));
        assert_eq!(ports[1].name.as_deref(), Some("np-0x24ee0521"));
        assert_eq!(ports[1].port, 30443);
    }

    #[test]
    fn test_unnamed_port_uses_port_number() {
        let mut index = ServiceIndex::new();

        index.upsert(
            &ObjectKey::new("ns1", "svc1"),
            &service(vec![port(None, 8080, Some(31000))]),
        );

        assert_eq!(
            index.desired_ports()[0].name.as_deref(),
            Some("np-0x1d8903be")
        );
    }

    #[test]
    fn test_unassigned_node_ports_are_skipped() {
        let mut index = ServiceIndex::new();
        let key = ObjectKey::new("ns1", "svc1");

        let contributed = index.upsert(
            &key,
            &service(vec![
                port(Some("a"), 80, None),
                port(Some("b"), 81, Some(0)),
            ]),
        );

        assert!(contributed.is_empty());
        assert!(index.remove(&key).is_empty());
        assert_eq!(index.desired_ports(), vec![filler_port()]);
    }

    #[test]
    fn test_upsert_replaces_previous_ports() {
        let mut index = ServiceIndex::new();
        let key = ObjectKey::new("ns1", "svc1");
        index.upsert(&key, &service(vec![port(Some("http"), 80, Some(30080))]));

        index.upsert(&key, &service(vec![port(Some("http"), 80, Some(30081))]));

        assert_eq!(index.len(), 1);
        assert_eq!(index.desired_ports()[0].port, 30081);
        assert_eq!(index.remove(&key), vec![30081]);
    }

    #[test]
    fn test_index_is_union_of_services() {
        let mut index = ServiceIndex::new();
        let a = ObjectKey::new("ns1", "a");
        let b = ObjectKey::new("ns2", "b");
        index.upsert(&a, &service(vec![port(Some("http"), 80, Some(30100))]));
        index.upsert(&b, &service(vec![port(Some("http"), 80, Some(30050))]));

        let ports: Vec<i32> = index.desired_ports().iter().map(|p| p.port).collect();
        assert_eq!(ports, vec![30050, 30100]);

        assert_eq!(index.remove(&a), vec![30100]);
        let ports: Vec<i32> = index.desired_ports().iter().map(|p| p.port).collect();
        assert_eq!(ports, vec![30050]);
    }

    #[test]
    fn test_removing_last_service_leaves_filler() {
        let mut index = ServiceIndex::new();
        let key = ObjectKey::new("ns1", "svc1");
        index.upsert(&key, &service(vec![port(Some("http"), 80, Some(30080))]));

        index.remove(&key);

        assert!(index.is_empty());
        let ports = index.desired_ports();
        assert_eq!(ports.len(), 1);
        assert_eq!(ports[0].name.as_deref(), Some("filler"));
        assert_eq!(ports[0].port, 1);
    }

    #[test]
    fn test_remove_unknown_key_is_noop() {
        let mut index = ServiceIndex::new();

        assert!(index.remove(&ObjectKey::new("ns1", "ghost")).is_empty());
    }
}
