// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `resources.rs`

#[cfg(test)]
mod tests {
    use crate::errors::ProjectionError;
    use crate::reconcilers::resources::{create_or_update, delete_and_wait, OperationResult};
    use crate::store::memory::MemoryStore;
    use crate::store::ObjectStore;
    use k8s_openapi::api::core::v1::ConfigMap;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use std::collections::BTreeMap;
    use std::time::Duration;

    const TEST_NAMESPACE: &str = "test-namespace";
    const TEST_NAME: &str = "test-resource";

    /// Helper to create an empty test ConfigMap
    fn create_test_configmap() -> ConfigMap {
        ConfigMap {
            metadata: ObjectMeta {
                name: Some(TEST_NAME.to_string()),
                namespace: Some(TEST_NAMESPACE.to_string()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn set_data(value: &'static str) -> impl Fn(&mut ConfigMap) {
        move |cm: &mut ConfigMap| {
            let mut data = BTreeMap::new();
            data.insert("key1".to_string(), value.to_string());
            cm.data = Some(data);
        }
    }

    #[tokio::test]
    async fn test_create_or_update_creates_when_missing() {
        let store = MemoryStore::<ConfigMap>::new();

        let (cm, result) = create_or_update(
            &store,
            TEST_NAMESPACE,
            create_test_configmap(),
            set_data("value1"),
        )
        .await
        .unwrap();

        assert_eq!(result, OperationResult::Created);
        assert_eq!(
            cm.data.unwrap().get("key1"),
            Some(&"value1".to_string())
        );
        assert_eq!(store.writes(), 1);
    }

    #[tokio::test]
    async fn test_create_or_update_is_idempotent() {
        let store = MemoryStore::<ConfigMap>::new();
        create_or_update(&store, TEST_NAMESPACE, create_test_configmap(), set_data("value1"))
            .await
            .unwrap();

        let (_, result) =
            create_or_update(&store, TEST_NAMESPACE, create_test_configmap(), set_data("value1"))
                .await
                .unwrap();

        assert_eq!(result, OperationResult::Unchanged);
        assert_eq!(store.writes(), 1, "Unchanged object must not be written");
    }

    #[tokio::test]
    async fn test_create_or_update_updates_on_diff() {
        let store = MemoryStore::<ConfigMap>::new();
        create_or_update(&store, TEST_NAMESPACE, create_test_configmap(), set_data("value1"))
            .await
            .unwrap();

        let (cm, result) = create_or_update(
            &store,
            TEST_NAMESPACE,
            create_test_configmap(),
            set_data("value1-updated"),
        )
        .await
        .unwrap();

        assert_eq!(result, OperationResult::Updated);
        assert_eq!(
            cm.data.unwrap().get("key1"),
            Some(&"value1-updated".to_string())
        );
    }

    #[tokio::test]
    async fn test_create_or_update_propagates_conflict() {
        let store = MemoryStore::<ConfigMap>::new();
        create_or_update(&store, TEST_NAMESPACE, create_test_configmap(), set_data("value1"))
            .await
            .unwrap();
        store.fail_next_writes(1);

        let err = create_or_update(
            &store,
            TEST_NAMESPACE,
            create_test_configmap(),
            set_data("value2"),
        )
        .await
        .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<crate::errors::StoreError>(),
            Some(crate::errors::StoreError::Conflict { .. })
        ));
    }

    #[tokio::test]
    async fn test_delete_and_wait_removes_object() {
        let store = MemoryStore::<ConfigMap>::new();
        store.seed(create_test_configmap());

        let deleted = delete_and_wait(
            &store,
            TEST_NAMESPACE,
            TEST_NAME,
            Duration::from_millis(1),
            Duration::from_secs(1),
        )
        .await
        .unwrap();

        assert!(deleted);
        assert!(store.get(TEST_NAMESPACE, TEST_NAME).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_and_wait_ignores_missing() {
        let store = MemoryStore::<ConfigMap>::new();

        let deleted = delete_and_wait(
            &store,
            TEST_NAMESPACE,
            TEST_NAME,
            Duration::from_millis(1),
            Duration::from_secs(1),
        )
        .await
        .unwrap();

        assert!(!deleted);
    }

    #[tokio::test]
    async fn test_delete_and_wait_times_out_while_finalized() {
        let store = MemoryStore::<ConfigMap>::new();
        let mut cm = create_test_configmap();
        cm.metadata.finalizers = Some(vec!["someone.else/finalizer".to_string()]);
        store.seed(cm);

        let err = delete_and_wait(
            &store,
            TEST_NAMESPACE,
            TEST_NAME,
            Duration::from_millis(5),
            Duration::from_millis(30),
        )
        .await
        .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<ProjectionError>(),
            Some(ProjectionError::WaitTimeout { .. })
        ));
    }
}
