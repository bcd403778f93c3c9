use std::ffi::OsString;

use bridge_artifacts::{ArtifactFormat, TempArtifactManager};
use bridge_registry::{ArgKind, ArgSource, CommandSpec};
use bridge_validate::{BoundValue, Invocation};

use crate::error::ExecError;

/// Builds the argv array for `invocation` against `spec`, materializing any
/// `file-of-*` arguments to disk first. Never touches a shell: every element
/// becomes one argv entry, so there is no word-splitting or glob expansion to
/// defend against (§4.4.1).
pub async fn build_argv(
    spec: &CommandSpec,
    invocation: &Invocation,
    artifacts: &TempArtifactManager,
) -> Result<Vec<OsString>, ExecError> {
    let mut argv: Vec<OsString> = spec
        .positional_template
        .iter()
        .map(OsString::from)
        .collect();

    for binding in &spec.named_args {
        let Some(value) = invocation.arguments.get(&binding.schema_name) else {
            continue;
        };

        if binding.bare_switch {
            if matches!(value, BoundValue::Boolean(true)) {
                if let Some(flag) = &binding.flag {
                    argv.push(OsString::from(flag));
                }
            }
            continue;
        }

        if let Some(flag) = &binding.flag {
            argv.push(OsString::from(flag));
        }

        match value {
            BoundValue::FileContent(content) => {
                let entry = spec.schema_for(&binding.schema_name);
                let format = match entry.map(|e| e.kind) {
                    Some(ArgKind::FileOfYaml) => ArtifactFormat::Yaml,
                    _ => ArtifactFormat::Json,
                };
                let path = artifacts
                    .materialize(invocation.id, &binding.schema_name, content, format)
                    .await?;
                argv.push(path.into_os_string());
            }
            other => argv.push(OsString::from(other.as_argv_token())),
        }
    }

    render_principal_claims(spec, invocation, &mut argv);

    Ok(argv)
}

/// Every `PrincipalClaim`-sourced schema entry is rendered as `--<flag>
/// <value>` even when the command's `named_args` template has no binding for
/// it — the invoked CLI still needs to know which caller it's acting on
/// behalf of. A command that *does* list an explicit `named_args` binding
/// for the claim is left alone here so it isn't rendered twice.
fn render_principal_claims(spec: &CommandSpec, invocation: &Invocation, argv: &mut Vec<OsString>) {
    for entry in &spec.schema {
        if entry.source != ArgSource::PrincipalClaim {
            continue;
        }
        if spec.named_args.iter().any(|binding| binding.schema_name == entry.name) {
            continue;
        }
        let Some(value) = invocation.arguments.get(&entry.name) else {
            continue;
        };
        argv.push(OsString::from(format!("--{}", kebab_case(&entry.name))));
        argv.push(OsString::from(value.as_argv_token()));
    }
}

/// `userId` -> `user-id`. Every claim-sourced schema entry is a plain
/// camelCase identifier, never a file-backed or already-hyphenated name.
fn kebab_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for ch in name.chars() {
        if ch.is_ascii_uppercase() {
            out.push('-');
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

/// Builds a fresh environment for the subprocess: only variables in
/// `allowed_env` are passed through from the service's own environment, plus
/// a minimal `PATH` pointing at the directory containing the CLI binary
/// (§4.4.2).
pub fn build_env(spec: &CommandSpec, cli_binary: &std::path::Path) -> Vec<(String, String)> {
    let mut env = Vec::with_capacity(spec.allowed_env.len() + 1);
    for name in &spec.allowed_env {
        if let Ok(value) = std::env::var(name) {
            env.push((name.clone(), value));
        }
    }
    if let Some(parent) = cli_binary.parent() {
        env.push(("PATH".to_string(), parent.to_string_lossy().into_owned()));
    }
    env
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_registry::default_catalog;
    use std::collections::HashMap;
    use std::time::Duration;

    fn spec_named(name: &str) -> CommandSpec {
        default_catalog()
            .into_iter()
            .find(|s| s.name == name)
            .unwrap()
    }

    #[tokio::test]
    async fn server_enable_renders_positional_id_then_bare_switch() {
        let spec = spec_named("server.enable");
        let mut args = HashMap::new();
        args.insert(
            "serverId".to_string(),
            BoundValue::String("github-server_01".to_string()),
        );
        args.insert("autoStart".to_string(), BoundValue::Boolean(true));
        let invocation = Invocation::new("server.enable", args, "user-1", Duration::from_secs(60));

        let dir = tempfile::tempdir().unwrap();
        let artifacts = TempArtifactManager::new(dir.path().join("artifacts"))
            .await
            .unwrap();
        let argv = build_argv(&spec, &invocation, &artifacts).await.unwrap();
        assert_eq!(
            argv,
            vec![
                OsString::from("server"),
                OsString::from("enable"),
                OsString::from("github-server_01"),
                OsString::from("--auto-start"),
            ]
        );
    }

    #[tokio::test]
    async fn bare_switch_omitted_when_false() {
        let spec = spec_named("server.enable");
        let mut args = HashMap::new();
        args.insert(
            "serverId".to_string(),
            BoundValue::String("s1".to_string()),
        );
        args.insert("autoStart".to_string(), BoundValue::Boolean(false));
        let invocation = Invocation::new("server.enable", args, "user-1", Duration::from_secs(60));

        let dir = tempfile::tempdir().unwrap();
        let artifacts = TempArtifactManager::new(dir.path().join("artifacts"))
            .await
            .unwrap();
        let argv = build_argv(&spec, &invocation, &artifacts).await.unwrap();
        assert_eq!(
            argv,
            vec![
                OsString::from("server"),
                OsString::from("enable"),
                OsString::from("s1"),
            ]
        );
    }

    #[tokio::test]
    async fn file_of_json_argument_is_materialized_to_a_path() {
        let spec = spec_named("config.set");
        let mut args = HashMap::new();
        args.insert(
            "configFile".to_string(),
            BoundValue::FileContent(serde_json::json!({"key": "value"})),
        );
        let invocation = Invocation::new("config.set", args, "user-1", Duration::from_secs(15));

        let dir = tempfile::tempdir().unwrap();
        let artifacts = TempArtifactManager::new(dir.path().join("artifacts"))
            .await
            .unwrap();
        let argv = build_argv(&spec, &invocation, &artifacts).await.unwrap();
        assert_eq!(argv[0], OsString::from("config"));
        assert_eq!(argv[1], OsString::from("set"));
        assert_eq!(argv[2], OsString::from("--config-file"));
        let path = std::path::PathBuf::from(&argv[3]);
        assert!(path.exists());
    }

    #[tokio::test]
    async fn principal_claim_without_a_named_binding_is_still_rendered() {
        let spec = spec_named("server.list");
        let mut args = HashMap::new();
        args.insert("userId".to_string(), BoundValue::String("user-7".to_string()));
        let invocation = Invocation::new("server.list", args, "user-7", Duration::from_secs(15));

        let dir = tempfile::tempdir().unwrap();
        let artifacts = TempArtifactManager::new(dir.path().join("artifacts"))
            .await
            .unwrap();
        let argv = build_argv(&spec, &invocation, &artifacts).await.unwrap();
        assert_eq!(
            argv,
            vec![
                OsString::from("server"),
                OsString::from("list"),
                OsString::from("--user-id"),
                OsString::from("user-7"),
            ]
        );
    }
}
