//! Route the database console through the web server
//!
//! The location block is patched into the site file, the whole nginx
//! configuration is tested, and only then is nginx reloaded. A rejected
//! configuration is rolled back on disk so the next restart does not pick
//! it up either.

use crate::host::Host;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use stepkit::patch::write_atomic;
use stepkit::{Action, Anchor, ApplyContext, PatchOutcome, RunSummary, ValidationFailed};

/// Console path as it appears in the location directive, without a trailing slash
pub fn location_path(console_path: &str) -> &str {
    console_path.trim_end_matches('/')
}

/// Marker identifying an already routed console
pub fn marker(console_path: &str) -> String {
    format!("location {console_path}")
}

/// nginx location block serving the console through PHP-FPM
pub fn location_block(path: &str, install_root: &Path, php_version: &str) -> String {
    let root = install_root.display();
    format!(
        "\tlocation {path} {{
\t\troot {root}/;
\t\tindex index.php index.html index.htm;
\t\tlocation ~ ^{path}/(.+\\.php)$ {{
\t\t\ttry_files $uri =404;
\t\t\troot {root}/;
\t\t\tfastcgi_pass unix:/run/php/php{php_version}-fpm.sock;
\t\t\tfastcgi_index index.php;
\t\t\tfastcgi_param SCRIPT_FILENAME $document_root$fastcgi_script_name;
\t\t\tinclude fastcgi_params;
\t\t}}
\t\tlocation ~* ^{path}/(.+\\.(jpg|jpeg|gif|css|png|js|ico|html|xml|txt|svg|woff2?))$ {{
\t\t\troot {root}/;
\t\t}}
\t}}
"
    )
}

#[derive(Debug)]
pub struct RouteConsole {
    host: Host,
    site_config: PathBuf,
    unit: String,
    console_path: String,
    anchor: Anchor,
    block: String,
}

impl RouteConsole {
    pub fn new(
        host: &Host,
        site_config: PathBuf,
        unit: &str,
        console_path: &str,
        anchor: Anchor,
        block: String,
    ) -> Self {
        Self {
            host: host.clone(),
            site_config,
            unit: unit.to_string(),
            console_path: console_path.to_string(),
            anchor,
            block,
        }
    }

    fn rollback(&self, original: &[u8]) -> Result<()> {
        write_atomic(&self.site_config, original)
            .with_context(|| format!("Failed to restore {}", self.site_config.display()))
    }
}

impl Action for RouteConsole {
    fn apply(&self, _ctx: &mut ApplyContext) -> Result<()> {
        let original = fs::read(&self.site_config)
            .with_context(|| format!("Could not read {}", self.site_config.display()))?;

        let marker = marker(&self.console_path);
        match stepkit::patch(&self.site_config, &marker, &self.block, &self.anchor)? {
            PatchOutcome::AlreadyPatched => {
                log::info!("{} already routes {}", self.site_config.display(), self.console_path);
                return Ok(());
            }
            PatchOutcome::Patched => {}
        }

        if let Err(e) = self.host.proxy.validate(&self.site_config) {
            self.rollback(&original)?;
            return Err(ValidationFailed {
                target: self.site_config.display().to_string(),
                message: format!("{e:#}"),
            }
            .into());
        }

        self.host
            .services
            .reload(&self.unit)
            .with_context(|| format!("Failed to reload {}", self.unit))
    }

    fn record(&self, summary: &mut RunSummary) {
        match self.host.facts.primary_ip_address() {
            Ok(ip) => summary.set_endpoint(format!("http://{ip}{}", self.console_path)),
            Err(e) => log::warn!("Could not determine host address: {e:#}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::fake::FakeHost;
    use stepkit::Attempt;

    const SITE: &str = "server {\n\tlisten 80 default_server;\n\troot /var/www/html;\n\tserver_name _;\n\n\tlocation / {\n\t\ttry_files $uri $uri/ =404;\n\t}\n}\n";

    fn route(fake: &FakeHost, site: &Path) -> RouteConsole {
        RouteConsole::new(
            &fake.host(),
            site.to_path_buf(),
            "nginx",
            "/phpmyadmin",
            Anchor::After("server_name _;".to_string()),
            location_block("/phpmyadmin", Path::new("/usr/share"), "8.3"),
        )
    }

    #[test]
    fn test_location_path_drops_trailing_slash() {
        assert_eq!(location_path("/phpmyadmin/"), "/phpmyadmin");
        assert_eq!(location_path("/phpmyadmin"), "/phpmyadmin");
        let block = location_block(location_path("/db/"), Path::new("/usr/share"), "8.3");
        assert!(block.contains(&marker(location_path("/db/"))));
    }

    #[test]
    fn test_block_carries_marker_and_socket() {
        let block = location_block("/phpmyadmin", Path::new("/usr/share"), "8.2");
        assert!(block.contains(&marker("/phpmyadmin")));
        assert!(block.contains("unix:/run/php/php8.2-fpm.sock"));
        assert!(block.contains("root /usr/share/;"));
        assert_eq!(block.matches('{').count(), block.matches('}').count());
    }

    #[test]
    fn test_patch_validate_reload() {
        let dir = tempfile::tempdir().unwrap();
        let site = dir.path().join("default");
        fs::write(&site, SITE).unwrap();
        let fake = FakeHost::new();
        let mut summary = RunSummary::new();
        let mut ctx = ApplyContext::new("route", Attempt::First, &mut summary, None);

        route(&fake, &site).apply(&mut ctx).unwrap();

        let content = fs::read_to_string(&site).unwrap();
        assert_eq!(content.matches("location /phpmyadmin").count(), 1);
        let anchor = content.find("server_name _;").unwrap();
        assert!(content.find("location /phpmyadmin").unwrap() > anchor);
        assert_eq!(fake.count("validate"), 1);
        assert_eq!(fake.count("reload nginx"), 1);
    }

    #[test]
    fn test_rejected_config_is_rolled_back_without_reload() {
        let dir = tempfile::tempdir().unwrap();
        let site = dir.path().join("default");
        fs::write(&site, SITE).unwrap();
        let fake = FakeHost::new();
        fake.reject_config();
        let mut summary = RunSummary::new();
        let mut ctx = ApplyContext::new("route", Attempt::First, &mut summary, None);

        let err = route(&fake, &site).apply(&mut ctx).unwrap_err();

        assert!(err.downcast_ref::<ValidationFailed>().is_some());
        assert_eq!(fs::read_to_string(&site).unwrap(), SITE);
        assert_eq!(fake.count("reload"), 0);
    }

    #[test]
    fn test_already_routed_is_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let site = dir.path().join("default");
        let patched = SITE.replace("server_name _;\n", "server_name _;\n\tlocation /phpmyadmin {\n\t}\n");
        fs::write(&site, &patched).unwrap();
        let fake = FakeHost::new();
        let mut summary = RunSummary::new();
        let mut ctx = ApplyContext::new("route", Attempt::First, &mut summary, None);

        route(&fake, &site).apply(&mut ctx).unwrap();
        assert_eq!(fs::read_to_string(&site).unwrap(), patched);
        assert!(fake.events().is_empty());
    }

    #[test]
    fn test_record_sets_endpoint() {
        let fake = FakeHost::new();
        let mut summary = RunSummary::new();
        route(&fake, Path::new("/nonexistent")).record(&mut summary);
        assert_eq!(
            summary.service_endpoint.as_deref(),
            Some("http://203.0.113.10/phpmyadmin")
        );
    }
}
