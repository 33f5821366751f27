//! The provisioning pipeline
//!
//! Step order encodes real dependencies: the web server exists before its
//! site file is patched, the database runs before its credential is set, the
//! PHP repository is registered before any PHP package installs, and the
//! console is routed last.

pub mod credential;
pub mod packages;
pub mod proxy;
pub mod service;

use crate::config::Config;
use crate::host::Host;
use aptkit::Repository;
use credential::{BootstrapCredential, ReinstallDatabase};
use packages::{AddRepository, Fact, InstallPackages};
use proxy::RouteConsole;
use service::EnableService;
use stepkit::{Anchor, Precondition, Step};

/// Debconf answers that keep the console install from prompting
fn console_preseed(package: &str) -> Vec<String> {
    vec![
        format!("{package} {package}/reconfigure-webserver multiselect"),
        format!("{package} {package}/dbconfig-install boolean false"),
    ]
}

fn install(host: &Host, name: &str, package: &str) -> Step {
    Step::new(
        name,
        Precondition::package(package),
        InstallPackages::new(host, &[package]),
    )
    .mutating_packages()
}

fn start(host: &Host, name: &str, unit: &str) -> Step {
    Step::new(name, Precondition::unit(unit), EnableService::new(host, unit))
}

/// Build the ordered step list for `config`
pub fn build_pipeline(config: &Config, host: &Host) -> Vec<Step> {
    let web = &config.web;
    let db = &config.database;
    let runtime = &config.runtime;
    let console = &config.console;

    let mut steps = vec![
        install(host, "install-web-server", &web.package),
        start(host, "start-web-server", &web.unit),
        install(host, "install-database-server", &db.package),
        start(host, "start-database-server", &db.unit),
    ];

    let bootstrap = Step::new(
        "bootstrap-database-credential",
        Precondition::credential(db.user.as_str()),
        BootstrapCredential::new(host, &db.user, &db.scope, config.credential.secret_bytes),
    );
    steps.push(if config.credential.reinstall_on_failure {
        bootstrap.mutating_packages().with_recovery(ReinstallDatabase::new(
            host,
            &db.package,
            &db.unit,
            db.data_dirs.clone(),
        ))
    } else {
        bootstrap
    });

    steps.push(
        Step::new(
            "add-runtime-repository",
            Precondition::repository(runtime.repository_pattern.as_str()),
            AddRepository::new(
                host,
                Repository::new(runtime.repository.as_str(), runtime.repository_pattern.as_str()),
                &runtime.helper_package,
            ),
        )
        .mutating_packages(),
    );

    for version in &runtime.versions {
        let fpm = format!("php{version}-fpm");
        steps.push(
            Step::new(
                format!("install-php{version}"),
                Precondition::package(fpm.as_str()),
                InstallPackages::new(host, &[fpm.as_str()])
                    .records(Fact::RuntimeVersion(version.clone())),
            )
            .mutating_packages(),
        );
        steps.push(start(host, &format!("start-php{version}-fpm"), &fpm));

        for extension in &runtime.extensions {
            let package = format!("php{version}-{extension}");
            steps.push(
                Step::new(
                    format!("install-php{version}-{extension}"),
                    Precondition::package(package.as_str()),
                    InstallPackages::new(host, &[package.as_str()])
                        .records(Fact::Extension(extension.clone()))
                        .restarts(fpm.as_str()),
                )
                .optional()
                .mutating_packages(),
            );
        }
    }

    steps.push(
        Step::new(
            "install-database-console",
            Precondition::package(console.package.as_str()),
            InstallPackages::new(host, &[console.package.as_str()])
                .preseed(console_preseed(&console.package)),
        )
        .mutating_packages(),
    );

    let anchor = if web.anchor.is_empty() {
        Anchor::EndOfFile
    } else {
        Anchor::After(web.anchor.clone())
    };
    let console_path = proxy::location_path(&console.path);
    steps.push(Step::new(
        "route-database-console",
        Precondition::file_contains(&web.site_config, proxy::marker(console_path)),
        RouteConsole::new(
            host,
            web.site_config.clone(),
            &web.unit,
            console_path,
            anchor,
            proxy::location_block(console_path, &console.install_root, runtime.primary_version()),
        ),
    ));

    steps
}
