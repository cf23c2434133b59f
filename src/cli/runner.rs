//! CLI runner - executes commands

use crate::cli::commands::{Cli, Commands, OutputFormat, RequestArgs};
use crate::config::{load_settings, AuthSettings, ClientSettings, OptionsSettings};
use crate::error::{Error, Result};
use crate::http::Response;
use bytes::Bytes;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use tracing::debug;

/// CLI runner
pub struct Runner {
    cli: Cli,
}

impl Runner {
    /// Create a new runner
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Run the CLI command
    pub async fn run(&self) -> Result<()> {
        match &self.cli.command {
            Commands::Request(args) => self.request(args).await,
            Commands::Validate => self.validate().await,
        }
    }

    // ========================================================================
    // Commands
    // ========================================================================

    async fn request(&self, args: &RequestArgs) -> Result<()> {
        let settings = self.request_settings(args)?;
        let client = settings.build_client(None)?;

        let target = match args.path.as_deref() {
            Some(path) => Some(client.new_child(path)?),
            None => None,
        };
        let target_ref = target.as_ref().unwrap_or(&client);

        let body = args.data.clone().map(Bytes::from);
        let result = target_ref.execute(&args.method, body, None).await;

        // Closing the root also closes the child
        client.close().await?;
        let response = result?;

        self.output_message(&json!({
            "type": "RESPONSE",
            "response": response_json(&response)?,
        }));

        Ok(())
    }

    async fn validate(&self) -> Result<()> {
        let settings = self.load_settings()?.ok_or_else(|| {
            Error::config("validate needs a settings file, pass it with --settings")
        })?;

        // Building also checks credential fields
        let client = settings.build_client(None)?;
        client.close().await?;

        self.output_message(&json!({
            "type": "LOG",
            "log": {
                "level": "INFO",
                "message": format!(
                    "Settings for '{}' are valid (auth: {})",
                    settings.base_url,
                    auth_label(&settings.auth)
                )
            }
        }));

        Ok(())
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn load_settings(&self) -> Result<Option<ClientSettings>> {
        let Some(path) = &self.cli.settings else {
            return Ok(None);
        };
        debug!(path = %path.display(), "loading client settings");
        load_settings(path).map(Some)
    }

    /// Settings file (or bare `--url`) with the command line overrides applied
    fn request_settings(&self, args: &RequestArgs) -> Result<ClientSettings> {
        let mut settings = match (self.load_settings()?, &args.url) {
            (Some(mut settings), url) => {
                if let Some(url) = url {
                    settings.base_url = url.clone();
                }
                settings
            }
            (None, Some(url)) => ClientSettings {
                base_url: url.clone(),
                headers: BTreeMap::new(),
                query: BTreeMap::new(),
                options: OptionsSettings::default(),
                auth: AuthSettings::None,
            },
            (None, None) => {
                return Err(Error::config(
                    "no target, pass --url or a settings file with --settings",
                ))
            }
        };

        for header in &args.headers {
            let (name, value) = header
                .split_once(':')
                .ok_or_else(|| Error::invalid_header(header.as_str(), "expected 'Name: value'"))?;
            settings
                .headers
                .insert(name.trim().to_string(), value.trim().to_string());
        }

        if let Some(basic) = &args.basic {
            let (user_id, secret) = basic.split_once(':').ok_or_else(|| {
                Error::config("--basic expects credentials as USER:SECRET")
            })?;
            settings.auth = AuthSettings::Basic {
                user_id: user_id.to_string(),
                secret: secret.into(),
            };
        }

        if let Some(max_redirect) = args.max_redirect {
            settings.options.max_redirect = max_redirect as i64;
        }
        if args.no_follow {
            settings.options.follow = false;
        }
        if args.insecure {
            settings.options.only_https = false;
            settings.options.disable_tls_verify = true;
        }

        Ok(settings)
    }

    /// Output a message
    fn output_message(&self, msg: &Value) {
        match self.cli.format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string(msg).unwrap_or_default());
            }
            OutputFormat::Pretty => {
                println!("{}", serde_json::to_string_pretty(msg).unwrap_or_default());
            }
        }
    }
}

fn response_json(response: &Response) -> Result<Value> {
    // JSON bodies are embedded as is, anything else as text
    let body = serde_json::from_slice::<Value>(&response.body)
        .unwrap_or_else(|_| Value::String(response.text()));

    Ok(json!({
        "url": response.url.as_str(),
        "status": response.status,
        "success": response.success,
        "proto": response.proto,
        "response_time_ms": response.response_time.as_millis() as u64,
        "error_rate": response.error_rate,
        "redirect_trace": serde_json::to_value(&response.redirect_trace)?,
        "body": body,
    }))
}

fn auth_label(auth: &AuthSettings) -> &'static str {
    match auth {
        AuthSettings::None => "none",
        AuthSettings::Basic { .. } => "basic",
        AuthSettings::Digest { .. } => "digest",
        AuthSettings::Oauth2ClientCredentials { .. } => "oauth2_client_credentials",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn runner(args: &[&str]) -> Runner {
        Runner::new(Cli::try_parse_from(args).unwrap())
    }

    fn request_args(runner: &Runner) -> &RequestArgs {
        match &runner.cli.command {
            Commands::Request(args) => args,
            Commands::Validate => panic!("Expected request command"),
        }
    }

    #[test]
    fn test_request_settings_overrides() {
        let runner = runner(&[
            "herald",
            "request",
            "GET",
            "--url",
            "http://localhost:9000",
            "-H",
            "X-Trace: abc",
            "--basic",
            "user:p:ss",
            "--max-redirect",
            "0",
            "--no-follow",
            "--insecure",
        ]);

        let settings = runner.request_settings(request_args(&runner)).unwrap();
        assert_eq!(settings.base_url, "http://localhost:9000");
        assert_eq!(settings.headers["X-Trace"], "abc");
        assert_eq!(settings.options.max_redirect, 0);
        assert!(!settings.options.follow);
        assert!(!settings.options.only_https);
        assert!(settings.options.disable_tls_verify);
        match settings.auth {
            AuthSettings::Basic { user_id, secret } => {
                assert_eq!(user_id, "user");
                assert_eq!(secret.expose(), "p:ss");
            }
            other => panic!("Expected Basic auth, got {other:?}"),
        }
    }

    #[test]
    fn test_request_needs_a_target() {
        let runner = runner(&["herald", "request", "GET"]);
        assert!(matches!(
            runner.request_settings(request_args(&runner)),
            Err(Error::Config { .. })
        ));
    }

    #[test]
    fn test_malformed_header_rejected() {
        let runner = runner(&["herald", "request", "GET", "-u", "https://a.example", "-H", "oops"]);
        assert!(matches!(
            runner.request_settings(request_args(&runner)),
            Err(Error::InvalidHeader { .. })
        ));
    }

    #[test]
    fn test_url_overrides_settings_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("client.yaml");
        std::fs::write(&path, "base_url: https://from-file.example\n").unwrap();

        let runner = runner(&[
            "herald",
            "request",
            "GET",
            "--settings",
            path.to_str().unwrap(),
            "--url",
            "https://from-flag.example",
        ]);
        let settings = runner.request_settings(request_args(&runner)).unwrap();
        assert_eq!(settings.base_url, "https://from-flag.example");
    }

    #[tokio::test]
    async fn test_run_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/status"))
            .and(header("Authorization", "Basic dXNlcjpzZWNyZXQ="))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;

        let uri = server.uri();
        let runner = runner(&[
            "herald",
            "request",
            "GET",
            "--url",
            &uri,
            "--path",
            "/status",
            "--basic",
            "user:secret",
            "--insecure",
        ]);

        runner.run().await.unwrap();
    }

    #[tokio::test]
    async fn test_validate_requires_settings() {
        let runner = runner(&["herald", "validate"]);
        assert!(runner.run().await.is_err());
    }

    #[tokio::test]
    async fn test_validate_settings_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("client.json");
        std::fs::write(
            &path,
            r#"{"base_url": "https://api.example.com", "auth": {"type": "basic", "user_id": "u", "secret": "p"}}"#,
        )
        .unwrap();

        let runner = runner(&["herald", "validate", "--settings", path.to_str().unwrap()]);
        runner.run().await.unwrap();
    }
}
