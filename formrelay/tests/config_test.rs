use std::path::PathBuf;

use formrelay::config::{CleanupPolicy, EnvConfig, ServerConfig};
use formrelay::mail::{Envelope, MailError, MailerConfig, TlsMode};

// Each test uses its own prefix so parallel tests never see each other's variables.

#[test]
fn server_config_defaults() {
    let config = ServerConfig::from_env_with_prefix("FRTEST_EMPTY").unwrap();

    assert_eq!(config.port, 5000);
    assert_eq!(config.receiver_email, None);
    assert_eq!(config.upload_dir, PathBuf::from("uploads"));
    assert_eq!(config.upload_cleanup, CleanupPolicy::OnSuccess);
}

#[test]
fn server_config_loads_from_environment() {
    std::env::set_var("FRTEST_SRV_PORT", "8080");
    std::env::set_var("FRTEST_SRV_RECEIVER_EMAIL", "hr@example.com");
    std::env::set_var("FRTEST_SRV_UPLOAD_DIR", "/tmp/scratch");
    std::env::set_var("FRTEST_SRV_UPLOAD_CLEANUP", "always");

    let config = ServerConfig::from_env_with_prefix("FRTEST_SRV").unwrap();

    assert_eq!(config.port, 8080);
    assert_eq!(config.receiver_email.as_deref(), Some("hr@example.com"));
    assert_eq!(config.upload_dir, PathBuf::from("/tmp/scratch"));
    assert_eq!(config.upload_cleanup, CleanupPolicy::Always);

    std::env::remove_var("FRTEST_SRV_PORT");
    std::env::remove_var("FRTEST_SRV_RECEIVER_EMAIL");
    std::env::remove_var("FRTEST_SRV_UPLOAD_DIR");
    std::env::remove_var("FRTEST_SRV_UPLOAD_CLEANUP");
}

#[test]
fn mailer_config_loads_from_environment() {
    std::env::set_var("FRTEST_MAIL_SMTP_HOST", "smtp.example.com");
    std::env::set_var("FRTEST_MAIL_SMTP_USER", "relay@example.com");
    std::env::set_var("FRTEST_MAIL_SMTP_PASS", "secret");
    std::env::set_var("FRTEST_MAIL_SMTP_TLS", "starttls");
    std::env::set_var("FRTEST_MAIL_SMTP_ACCEPT_INVALID_CERTS", "true");

    let config = MailerConfig::from_env_with_prefix("FRTEST_MAIL").unwrap();

    assert_eq!(config.host, "smtp.example.com");
    assert_eq!(config.port, 465);
    assert_eq!(config.username.as_deref(), Some("relay@example.com"));
    assert_eq!(config.password.as_deref(), Some("secret"));
    assert_eq!(config.tls, TlsMode::Starttls);
    assert!(config.accept_invalid_certs);

    std::env::remove_var("FRTEST_MAIL_SMTP_HOST");
    std::env::remove_var("FRTEST_MAIL_SMTP_USER");
    std::env::remove_var("FRTEST_MAIL_SMTP_PASS");
    std::env::remove_var("FRTEST_MAIL_SMTP_TLS");
    std::env::remove_var("FRTEST_MAIL_SMTP_ACCEPT_INVALID_CERTS");
}

#[test]
fn mailer_config_requires_host() {
    std::env::set_var("FRTEST_NOHOST_SMTP_USER", "relay@example.com");

    assert!(MailerConfig::from_env_with_prefix("FRTEST_NOHOST").is_err());

    std::env::remove_var("FRTEST_NOHOST_SMTP_USER");
}

#[test]
fn startup_fails_without_any_recipient() {
    std::env::set_var("FRTEST_NORCPT_SMTP_HOST", "smtp.example.com");
    std::env::set_var("FRTEST_NORCPT_SMTP_FROM", "noreply@example.com");

    let mailer = MailerConfig::from_env_with_prefix("FRTEST_NORCPT").unwrap();
    let server = ServerConfig::from_env_with_prefix("FRTEST_NORCPT").unwrap();
    let err = Envelope::resolve(&mailer, server.receiver_email.as_deref()).unwrap_err();
    assert!(matches!(err, MailError::MissingConfig(_)));

    std::env::remove_var("FRTEST_NORCPT_SMTP_HOST");
    std::env::remove_var("FRTEST_NORCPT_SMTP_FROM");
}
