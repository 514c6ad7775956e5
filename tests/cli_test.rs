//! CLI integration tests for the kube-field-select binary.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn cmd() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("kube-field-select"))
}

// Helper to create a temp schema file
fn write_temp_file(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

const SWAGGER: &str = r##"{
  "definitions": {
    "io.k8s.api.apps.v1.Deployment": {
      "type": "object",
      "x-kubernetes-group-version-kind": [{ "group": "apps", "version": "v1", "kind": "Deployment" }],
      "properties": {
        "metadata": { "$ref": "#/definitions/io.k8s.apimachinery.pkg.apis.meta.v1.ObjectMeta" },
        "spec": {
          "type": "object",
          "required": ["replicas"],
          "properties": {
            "replicas": { "type": "integer", "format": "int32" },
            "containers": {
              "type": "array",
              "items": {
                "type": "object",
                "properties": {
                  "name": { "type": "string" },
                  "image": { "type": "string" }
                }
              }
            }
          }
        }
      }
    }
  }
}"##;

const CRD: &str = r#"
apiVersion: apiextensions.k8s.io/v1
kind: CustomResourceDefinition
metadata:
  name: widgets.example.com
spec:
  group: example.com
  names:
    kind: Widget
  versions:
    - name: v1
      schema:
        openAPIV3Schema:
          type: object
          properties:
            spec:
              type: object
              properties:
                size:
                  type: integer
"#;

mod tree_command {
    use super::*;

    #[test]
    fn text_tree_expands_first_level() {
        let dir = TempDir::new().unwrap();
        let schema = write_temp_file(&dir, "swagger.json", SWAGGER);

        cmd()
            .args([
                "tree",
                schema.to_str().unwrap(),
                "--resource",
                "apps/v1/Deployment",
            ])
            .assert()
            .success()
            .stdout(predicate::str::contains("metadata: object [ref]"))
            .stdout(predicate::str::contains("  replicas: integer (required)"))
            .stdout(predicate::str::contains("  containers: array ..."));
    }

    #[test]
    fn json_tree_with_expanded_path() {
        let dir = TempDir::new().unwrap();
        let schema = write_temp_file(&dir, "swagger.json", SWAGGER);

        cmd()
            .args([
                "tree",
                schema.to_str().unwrap(),
                "--resource",
                "apps/v1/Deployment",
                "--expand",
                "spec",
                "--expand",
                "spec.containers",
                "--json",
            ])
            .assert()
            .success()
            .stdout(predicate::str::contains(
                r#""path":"spec.containers[].image""#,
            ))
            .stdout(predicate::str::contains(r#""path":"metadata.name""#).not());
    }

    #[test]
    fn crd_tree_from_yaml() {
        let dir = TempDir::new().unwrap();
        let schema = write_temp_file(&dir, "crd.yaml", CRD);

        cmd()
            .args([
                "tree",
                schema.to_str().unwrap(),
                "--crd",
                "--resource",
                "example.com/v1/Widget",
                "--all",
            ])
            .assert()
            .success()
            .stdout(predicate::str::contains("kind: string"))
            .stdout(predicate::str::contains("  size: integer"));
    }

    #[test]
    fn unknown_resource_fails() {
        let dir = TempDir::new().unwrap();
        let schema = write_temp_file(&dir, "swagger.json", SWAGGER);

        cmd()
            .args(["tree", schema.to_str().unwrap(), "--resource", "v1/Pod"])
            .assert()
            .code(2)
            .stderr(predicate::str::contains("no schema definition found"));
    }

    #[test]
    fn missing_schema_file() {
        cmd()
            .args([
                "tree",
                "/nonexistent/swagger.json",
                "--resource",
                "v1/Pod",
            ])
            .assert()
            .code(3)
            .stderr(predicate::str::contains("file not found"));
    }

    #[test]
    fn invalid_resource_key() {
        let dir = TempDir::new().unwrap();
        let schema = write_temp_file(&dir, "swagger.json", SWAGGER);

        cmd()
            .args(["tree", schema.to_str().unwrap(), "--resource", "Deployment"])
            .assert()
            .code(2)
            .stderr(predicate::str::contains("invalid resource"));
    }
}

mod filter_command {
    use super::*;

    #[test]
    fn filter_keeps_only_selected_path() {
        let dir = TempDir::new().unwrap();
        let schema = write_temp_file(&dir, "swagger.json", SWAGGER);

        let output = cmd()
            .args([
                "filter",
                schema.to_str().unwrap(),
                "--resource",
                "apps/v1/Deployment",
                "--field",
                "properties.spec.containers[].image",
            ])
            .output()
            .unwrap();
        assert!(output.status.success());

        let filtered: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
        let props = filtered["properties"].as_object().unwrap();
        assert_eq!(props.keys().collect::<Vec<_>>(), vec!["spec"]);
        let items = &filtered["properties"]["spec"]["properties"]["containers"]["items"];
        assert_eq!(items["properties"]["image"]["type"], "string");
        assert!(items["properties"].get("name").is_none());
        assert!(filtered["properties"]["spec"].get("required").is_none());
    }

    #[test]
    fn filter_with_output_file() {
        let dir = TempDir::new().unwrap();
        let schema = write_temp_file(&dir, "swagger.json", SWAGGER);
        let out = dir.path().join("filtered.json");

        cmd()
            .args([
                "filter",
                schema.to_str().unwrap(),
                "--resource",
                "apps/v1/Deployment",
                "--field",
                "metadata.name",
                "--pretty",
                "--output",
                out.to_str().unwrap(),
            ])
            .assert()
            .success();

        let content = fs::read_to_string(&out).unwrap();
        assert!(content.contains("{\n"));
        assert!(content.contains(r#""isReference": true"#));
    }
}

mod normalize_command {
    use super::*;

    #[test]
    fn strips_crd_document_prefix() {
        cmd()
            .args([
                "normalize",
                "spec.versions[0].schema.openAPIV3Schema.properties.spec.size",
                "--crd",
                "--resource",
                "example.com/v1/Widget",
            ])
            .assert()
            .success()
            .stdout("spec.size\n");
    }

    #[test]
    fn strips_resource_key_prefix() {
        cmd()
            .args([
                "normalize",
                "apps/v1/Deployment.spec.replicas",
                "--resource",
                "apps/v1/Deployment",
            ])
            .assert()
            .success()
            .stdout("spec.replicas\n");
    }
}

mod select_command {
    use super::*;

    #[test]
    fn selection_persists_between_runs() {
        let dir = TempDir::new().unwrap();
        let schema = write_temp_file(&dir, "swagger.json", SWAGGER);
        let state = dir.path().join("state");

        cmd()
            .args([
                "select",
                schema.to_str().unwrap(),
                "--resource",
                "apps/v1/Deployment",
                "--state-dir",
                state.to_str().unwrap(),
                "--add",
                "spec.replicas",
            ])
            .assert()
            .success()
            .stdout(predicate::str::contains(r#""path":"spec.replicas""#))
            .stdout(predicate::str::contains(r#""required":true"#));

        cmd()
            .args([
                "select",
                schema.to_str().unwrap(),
                "--resource",
                "apps/v1/Deployment",
                "--state-dir",
                state.to_str().unwrap(),
                "--add",
                "spec.replicas",
                "--add",
                "metadata.name",
            ])
            .assert()
            .success()
            .stdout(predicate::str::contains(r#""path":"metadata.name""#))
            .stdout(predicate::str::contains(r#""path":"spec.replicas""#));
    }

    #[test]
    fn parent_selection_replaces_descendants() {
        let dir = TempDir::new().unwrap();
        let schema = write_temp_file(&dir, "swagger.json", SWAGGER);
        let state = dir.path().join("state");

        cmd()
            .args([
                "select",
                schema.to_str().unwrap(),
                "--resource",
                "apps/v1/Deployment",
                "--state-dir",
                state.to_str().unwrap(),
                "--add",
                "spec.containers[].image",
                "--add",
                "spec",
            ])
            .assert()
            .success()
            .stderr(predicate::str::contains(
                "spec replaces selected descendant spec.containers[].image",
            ))
            .stdout(predicate::str::contains("spec.containers").not());
    }

    #[test]
    fn clear_and_unknown_field() {
        let dir = TempDir::new().unwrap();
        let schema = write_temp_file(&dir, "swagger.json", SWAGGER);
        let state = dir.path().join("state");

        cmd()
            .args([
                "select",
                schema.to_str().unwrap(),
                "--resource",
                "apps/v1/Deployment",
                "--state-dir",
                state.to_str().unwrap(),
                "--add",
                "spec.bogus",
            ])
            .assert()
            .code(2)
            .stderr(predicate::str::contains("does not exist"));

        cmd()
            .args([
                "select",
                schema.to_str().unwrap(),
                "--resource",
                "apps/v1/Deployment",
                "--state-dir",
                state.to_str().unwrap(),
                "--clear",
            ])
            .assert()
            .success()
            .stdout("[]\n");
    }
}

#[cfg(feature = "remote")]
mod remote {
    use super::*;

    #[test]
    fn tree_from_url() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("GET", "/openapi/v2")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(SWAGGER)
            .create();

        cmd()
            .args([
                "tree",
                &format!("{}/openapi/v2", server.url()),
                "--resource",
                "apps/v1/Deployment",
            ])
            .assert()
            .success()
            .stdout(predicate::str::contains("spec: object"));
        mock.assert();
    }
}
