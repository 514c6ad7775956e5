//! Integration tests for field selection filtering and path normalization.

use std::collections::BTreeSet;

use kube_field_select::{
    filter, normalize_path, resolve, ResourceRef, SchemaIndex, SchemaNode,
};
use serde_json::json;

fn deployment() -> SchemaNode {
    let index = SchemaIndex::from_document(json!({
        "definitions": {
            "Container": {
                "type": "object",
                "required": ["name"],
                "properties": {
                    "name": { "type": "string" },
                    "image": { "type": "string", "description": "Container image name." },
                    "ports": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "containerPort": { "type": "integer", "format": "int32" },
                                "protocol": { "type": "string", "enum": ["TCP", "UDP", "SCTP"] }
                            }
                        }
                    },
                    "resources": {
                        "type": "object",
                        "properties": {
                            "limits": { "type": "object", "additionalProperties": { "type": "string" } }
                        }
                    }
                }
            }
        }
    }));
    resolve(
        &json!({
            "type": "object",
            "properties": {
                "metadata": {
                    "type": "object",
                    "properties": {
                        "name": { "type": "string" },
                        "namespace": { "type": "string" }
                    }
                },
                "spec": {
                    "type": "object",
                    "required": ["template", "replicas"],
                    "properties": {
                        "replicas": { "type": "integer" },
                        "template": {
                            "type": "object",
                            "properties": {
                                "spec": {
                                    "type": "object",
                                    "required": ["containers"],
                                    "properties": {
                                        "containers": {
                                            "type": "array",
                                            "items": { "$ref": "#/definitions/Container" }
                                        },
                                        "hostname": { "type": "string" }
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }),
        &index,
    )
}

fn paths(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn property_names(node: &SchemaNode) -> Vec<&str> {
    node.as_object()
        .unwrap()
        .properties
        .iter()
        .map(|p| p.name.as_str())
        .collect()
}

// === Minimality ===

mod minimality {
    use super::*;

    #[test]
    fn array_item_field_selection() {
        let filtered = filter(
            &deployment(),
            &paths(&["spec.template.spec.containers[].image"]),
        );

        assert_eq!(property_names(&filtered), vec!["spec"]);
        assert_eq!(
            property_names(filtered.find("spec.template.spec").unwrap()),
            vec!["containers"]
        );
        let item = filtered.find("spec.template.spec.containers[]").unwrap();
        assert_eq!(property_names(item), vec!["image"]);
        assert!(item.is_reference());
        assert_eq!(
            filtered
                .find("spec.template.spec.containers[].image")
                .unwrap()
                .meta()
                .description
                .as_deref(),
            Some("Container image name.")
        );
    }

    #[test]
    fn required_lists_only_retained_fields() {
        let filtered = filter(
            &deployment(),
            &paths(&["spec.template.spec.containers[].image"]),
        );
        let spec = filtered.find("spec").unwrap().as_object().unwrap();
        assert_eq!(spec.required, vec!["template".to_string()]);
        let item = filtered
            .find("spec.template.spec.containers[]")
            .unwrap()
            .as_object()
            .unwrap();
        assert!(item.required.is_empty());
    }

    #[test]
    fn multiple_selections_merge_paths() {
        let filtered = filter(
            &deployment(),
            &paths(&[
                "metadata.name",
                "spec.replicas",
                "spec.template.spec.containers[].ports[].containerPort",
            ]),
        );
        assert_eq!(property_names(&filtered), vec!["metadata", "spec"]);
        assert_eq!(property_names(filtered.find("metadata").unwrap()), vec!["name"]);
        assert_eq!(
            property_names(filtered.find("spec").unwrap()),
            vec!["replicas", "template"]
        );
        assert_eq!(
            property_names(
                filtered
                    .find("spec.template.spec.containers[].ports[]")
                    .unwrap()
            ),
            vec!["containerPort"]
        );
    }

    #[test]
    fn selected_field_keeps_constraints_and_maps() {
        let filtered = filter(
            &deployment(),
            &paths(&[
                "spec.template.spec.containers[].resources",
                "spec.template.spec.containers[].ports[].protocol",
            ]),
        );
        let exported = filtered.to_value();
        let item = &exported["properties"]["spec"]["properties"]["template"]["properties"]
            ["spec"]["properties"]["containers"]["items"];
        assert_eq!(
            item["properties"]["resources"]["properties"]["limits"]["additionalProperties"]
                ["type"],
            "string"
        );
        assert_eq!(
            item["properties"]["ports"]["items"]["properties"]["protocol"]["enum"],
            json!(["TCP", "UDP", "SCTP"])
        );
    }

    #[test]
    fn unknown_paths_are_ignored() {
        let filtered = filter(&deployment(), &paths(&["spec.nope", "status.phase"]));
        assert_eq!(property_names(&filtered), vec!["spec"]);
        assert!(property_names(filtered.find("spec").unwrap()).is_empty());
    }
}

// === Normalization ===

mod normalization {
    use super::*;

    #[test]
    fn raw_paths_filter_like_canonical_paths() {
        let ctx = ResourceRef::parse("apps/v1/Deployment").unwrap().context();
        let raw = [
            "properties.spec.template.spec.containers[].image",
            "apps/v1/Deployment.metadata.name",
        ];
        let normalized: BTreeSet<String> = raw.iter().map(|p| normalize_path(p, &ctx)).collect();
        assert_eq!(
            normalized,
            paths(&["metadata.name", "spec.template.spec.containers[].image"])
        );

        let filtered = filter(&deployment(), &normalized);
        assert!(filtered.find("metadata.name").is_some());
        assert!(filtered.find("spec.template.spec.containers[].image").is_some());
    }

    #[test]
    fn crd_document_paths() {
        let ctx = ResourceRef::crd("cert-manager.io", "v1", "Certificate").context();
        assert_eq!(
            normalize_path(
                "spec.versions[0].schema.openAPIV3Schema.properties.spec.secretName",
                &ctx
            ),
            "spec.secretName"
        );
        assert_eq!(
            normalize_path("Certificate.spec.dnsNames", &ctx),
            "spec.dnsNames"
        );
        // A field merely starting with the kind is not a prefix
        assert_eq!(
            normalize_path("CertificateRequest.spec", &ctx),
            "CertificateRequest.spec"
        );
    }

    #[test]
    fn normalization_is_idempotent() {
        let ctx = ResourceRef::crd("example.com", "v1", "Widget").context();
        for raw in [
            "properties.Widget.properties.spec",
            "spec.versions[0].schema.openAPIV3Schema.properties.properties.spec",
            "Widget.Widget.spec",
            "spec.size",
        ] {
            let once = normalize_path(raw, &ctx);
            assert_eq!(normalize_path(&once, &ctx), once, "{raw}");
        }
    }
}
