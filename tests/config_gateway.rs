//! Gateway built from a YAML file: env-resolved secrets, overrides and routing.

mod common;

use ai_lib_gateway::config::ENV_MAX_RETRIES;
use ai_lib_gateway::{ChatRequest, GatewayBuilder, GatewayConfig, Message};
use common::{ScriptedAdapter, Step};
use std::io::Write;
use std::path::PathBuf;
use tokio_test::assert_ok;

const YAML: &str = r#"
retry:
  max_retries: 3
  retry_delay_ms: 1
tools:
  max_iterations: 2
  handler_base_delay_ms: 1
  handler_max_delay_ms: 2
providers:
  - name: primary
    priority: 10
    models:
      - { name: big-model, priority: 10 }
    keys:
      - { id: env-key, secret_env: GATEWAY_TEST_PRIMARY_SECRET }
  - name: backup
    priority: 1
    models:
      - { name: small-model }
    keys:
      - { id: inline-key, secret: sk-inline }
"#;

struct TempConfig(PathBuf);

impl TempConfig {
    fn write(contents: &str) -> Self {
        let path = std::env::temp_dir().join(format!("gateway-{}.yaml", uuid::Uuid::new_v4()));
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        Self(path)
    }
}

impl Drop for TempConfig {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.0);
    }
}

#[tokio::test]
async fn gateway_from_file_routes_with_env_secrets() {
    std::env::set_var("GATEWAY_TEST_PRIMARY_SECRET", "sk-from-env");
    std::env::set_var(ENV_MAX_RETRIES, "1");
    let file = TempConfig::write(YAML);

    let config = assert_ok!(GatewayConfig::from_file(&file.0));
    std::env::remove_var(ENV_MAX_RETRIES);
    assert_eq!(config.retry.max_retries, 1);
    assert_eq!(config.tools.max_iterations, 2);

    let primary = ScriptedAdapter::new("primary", Step::fail(503, "overloaded"));
    primary.on_secret("sk-from-env", Step::reply("hello from primary"));
    let backup = ScriptedAdapter::new("backup", Step::reply("hello from backup"));

    let gateway = assert_ok!(assert_ok!(GatewayBuilder::from_config(&config))
        .with_adapter("primary", primary.clone())
        .with_adapter("backup", backup.clone())
        .build());

    let response = assert_ok!(
        gateway
            .chat(ChatRequest::new(vec![Message::user("hi")]))
            .await
    );
    assert_eq!(response.content(), "hello from primary");
    assert_eq!(response.model.as_deref(), Some("big-model"));
    assert_eq!(primary.key_ids(), vec!["env-key"]);
    assert_eq!(backup.call_count(), 0);
}

#[test]
fn missing_env_secret_is_a_configuration_error() {
    let yaml = YAML.replace("GATEWAY_TEST_PRIMARY_SECRET", "GATEWAY_TEST_SECRET_NEVER_SET");
    let file = TempConfig::write(&yaml);
    let err = GatewayConfig::from_file(&file.0).unwrap_err();
    assert!(err.to_string().contains("GATEWAY_TEST_SECRET_NEVER_SET"), "{err}");
}
