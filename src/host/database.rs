//! Database server credential capability
//!
//! SQL is fed to the client on stdin so the secret never shows up in a
//! process listing.

use crate::runner;
use anyhow::{Result, bail};
use stepkit::Secret;

/// Credential primitives of the database server
pub trait DatabaseServer {
    /// Set a password for `user@scope`, switching it to password auth
    fn set_credential(&self, user: &str, scope: &str, secret: &Secret) -> Result<()>;

    /// Whether `user` already authenticates by password instead of by
    /// OS identity
    fn uses_password_auth(&self, user: &str) -> Result<bool>;
}

/// `mysql` command-line client, connecting as the OS root user
pub struct MysqlCli {
    auth_plugin: String,
}

impl MysqlCli {
    pub fn new(auth_plugin: impl Into<String>) -> Self {
        Self {
            auth_plugin: auth_plugin.into(),
        }
    }
}

impl DatabaseServer for MysqlCli {
    fn set_credential(&self, user: &str, scope: &str, secret: &Secret) -> Result<()> {
        let sql = alter_user_sql(user, scope, &self.auth_plugin, secret);
        let out = runner::run_with_input("mysql", &["--batch", "--user=root"], &sql)?;
        if !out.success {
            bail!("mysql rejected the credential change: {}", out.stderr_str().trim());
        }
        Ok(())
    }

    fn uses_password_auth(&self, user: &str) -> Result<bool> {
        let sql = format!(
            "SELECT plugin FROM mysql.user WHERE user = {};\n",
            quote(user)
        );
        let out = runner::run_with_input(
            "mysql",
            &["--batch", "--skip-column-names", "--user=root"],
            &sql,
        )?;

        if out.success {
            let plugins = out.stdout_str();
            return Ok(!plugins.trim().is_empty() && !plugins.contains("auth_socket"));
        }

        let stderr = out.stderr_str();
        // Socket login refused: the password is already in place
        if stderr.contains("Access denied") {
            return Ok(true);
        }
        bail!("mysql query failed: {}", stderr.trim())
    }
}

/// SQL string literal
fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
}

fn alter_user_sql(user: &str, scope: &str, plugin: &str, secret: &Secret) -> String {
    format!(
        "ALTER USER {}@{} IDENTIFIED WITH {plugin} BY {};\nFLUSH PRIVILEGES;\n",
        quote(user),
        quote(scope),
        quote(secret.expose())
    )
}
