//! End-to-end reconciliation passes against in-memory probes.

use declarative::memory::{
    MemoryFileSystem, MemoryPackageManager, MemoryServiceManager, ServiceCall,
};
use declarative::{
    ApplyResult, DriftOutcome, Engine, NoReport, Probes, ResourceDescriptor, RunOptions,
    ValidationError,
};
use std::sync::Arc;

struct Host {
    fs: Arc<MemoryFileSystem>,
    packages: Arc<MemoryPackageManager>,
    services: Arc<MemoryServiceManager>,
}

impl Host {
    fn new() -> Self {
        Self {
            fs: Arc::new(MemoryFileSystem::new()),
            packages: Arc::new(MemoryPackageManager::new()),
            services: Arc::new(MemoryServiceManager::new()),
        }
    }

    fn engine(&self) -> Engine {
        Engine::new(Probes::new(
            self.fs.clone(),
            self.packages.clone(),
            self.services.clone(),
        ))
    }
}

fn nginx_declaration() -> Vec<ResourceDescriptor> {
    vec![
        ResourceDescriptor::new("nginx_pkg", "package")
            .with_attr("name", "nginx")
            .with_attr("version", "1.24"),
        ResourceDescriptor::new("nginx_conf", "file")
            .with_attr("path", "/etc/nginx")
            .with_attr("name", "nginx.conf")
            .with_attr("mode", "0644")
            .with_attr("owner", "root")
            .with_attr("group", "root")
            .with_attr("content", "worker_processes 2;\n")
            .depends_on("nginx_pkg"),
        ResourceDescriptor::new("nginx", "service")
            .with_attr("name", "nginx")
            .with_attr("state", "running")
            .depends_on("nginx_conf"),
        ResourceDescriptor::new("marker", "dummy"),
    ]
}

#[test]
fn fresh_host_converges_then_reaches_fixed_point() {
    let host = Host::new();
    let engine = host.engine();
    let declaration = nginx_declaration();

    let first = engine
        .run(&declaration, &RunOptions::apply(), &mut NoReport)
        .unwrap();

    assert_eq!(first.get("nginx_pkg").unwrap().apply, Some(ApplyResult::Created));
    assert_eq!(first.get("nginx_conf").unwrap().apply, Some(ApplyResult::Created));
    // service was not running: the dependency change asks for a restart
    assert_eq!(first.get("nginx").unwrap().apply, Some(ApplyResult::Restarted));
    assert_eq!(first.get("marker").unwrap().drift, DriftOutcome::InSync);
    assert!(first.summary.is_success());

    let conf = host.fs.file("/etc/nginx/nginx.conf").unwrap();
    assert_eq!(conf.content, b"worker_processes 2;\n");
    assert_eq!(conf.mode, 0o644);
    assert_eq!(host.fs.dir_mode("/etc/nginx"), Some(0o644));
    assert!(host.services.active("nginx"));

    host.fs.clear_log();
    host.services.clear_calls();

    let second = engine
        .run(&declaration, &RunOptions::apply(), &mut NoReport)
        .unwrap();
    assert_eq!(second.summary.drifted, 0);
    assert_eq!(second.summary.no_change, 4);
    assert!(host.fs.mutations().is_empty());
    assert!(host.services.calls().is_empty());
    assert_eq!(host.packages.installs().len(), 1);
}

#[test]
fn edited_config_restarts_running_service() {
    let host = Host::new();
    host.packages.add_installed("nginx", "1.24.0-2ubuntu7");
    host.fs.add_file(
        "/etc/nginx/nginx.conf",
        "worker_processes 1;\n",
        0o644,
        "root",
        "root",
    );
    host.services.set_active("nginx", true);

    let report = host
        .engine()
        .run(&nginx_declaration(), &RunOptions::apply(), &mut NoReport)
        .unwrap();

    assert_eq!(report.get("nginx_pkg").unwrap().drift, DriftOutcome::InSync);
    assert_eq!(report.get("nginx_conf").unwrap().apply, Some(ApplyResult::Modified));
    assert_eq!(report.changed, vec!["nginx", "nginx_conf"]);
    assert_eq!(host.services.calls(), vec![ServiceCall::Restart("nginx".into())]);
    // every aspect is reapplied, not only the one that drifted
    assert_eq!(
        host.fs.mutations(),
        vec![
            "write /etc/nginx/nginx.conf",
            "chown /etc/nginx/nginx.conf",
            "chmod /etc/nginx/nginx.conf",
        ]
    );
}

#[test]
fn mode_drift_alone_is_detected() {
    let host = Host::new();
    host.packages.add_installed("nginx", "1.24.0");
    host.fs.add_file(
        "/etc/nginx/nginx.conf",
        "worker_processes 2;\n",
        0o600,
        "root",
        "root",
    );
    host.services.set_active("nginx", true);

    let report = host
        .engine()
        .run(&nginx_declaration(), &RunOptions::check(), &mut NoReport)
        .unwrap();

    assert_eq!(report.drifted().collect::<Vec<_>>(), ["nginx_conf", "nginx"]);
    assert!(host.fs.mutations().is_empty());
}

#[test]
fn malformed_declaration_aborts_before_probing() {
    let host = Host::new();
    let mut declaration = nginx_declaration();
    declaration.push(
        ResourceDescriptor::new("broken", "service")
            .with_attr("name", "broken")
            .with_attr("state", "paused"),
    );

    let err = host
        .engine()
        .run(&declaration, &RunOptions::apply(), &mut NoReport)
        .unwrap_err();

    assert!(matches!(err, ValidationError::InvalidValue { ref field, .. } if field == "state"));
    assert_eq!(host.fs.probe_count(), 0);
    assert_eq!(host.packages.probe_count(), 0);
    assert_eq!(host.services.probe_count(), 0);
}

#[test]
fn parallel_pass_matches_sequential_pass() {
    let sequential = Host::new();
    let parallel = Host::new();
    for host in [&sequential, &parallel] {
        host.services.set_active("nginx", true);
    }

    let a = sequential
        .engine()
        .run(&nginx_declaration(), &RunOptions::apply(), &mut NoReport)
        .unwrap();
    let b = parallel
        .engine()
        .run(
            &nginx_declaration(),
            &RunOptions::apply().with_jobs(4),
            &mut NoReport,
        )
        .unwrap();

    assert_eq!(a.resources, b.resources);
    assert_eq!(a.changed, b.changed);
    assert_eq!(a.summary, b.summary);
}
