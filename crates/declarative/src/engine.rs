//! Reconciliation engine - validates, detects drift, propagates, converges
//!
//! One call to [`Engine::run`] is one pass. The pass owns a fresh [`Ledger`];
//! every resource sees the drift outcome of every resource it depends on,
//! because dependencies must be declared first and are always evaluated first.

use crate::descriptor::ResourceDescriptor;
use crate::error::ValidationError;
use crate::kinds::Kind;
use crate::ledger::Ledger;
use crate::probe::Probes;
use crate::report::ReportSink;
use crate::resource::{BoxedResource, Resource};
use crate::types::{ApplyResult, DriftOutcome, ResourceOutcome, RunOptions, RunReport};
use rayon::prelude::*;
use std::collections::HashMap;

/// Runs reconciliation passes against a set of probes
#[derive(Debug, Clone)]
pub struct Engine {
    probes: Probes,
}

impl Engine {
    pub fn new(probes: Probes) -> Self {
        Self { probes }
    }

    /// Validate a whole declaration without probing anything.
    ///
    /// Checks, in declaration order, that names are unique, that each kind is
    /// known and its attributes are exactly the required set, and that every
    /// dependency names an earlier resource. Returns the resolved kinds.
    pub fn validate(
        &self,
        descriptors: &[ResourceDescriptor],
    ) -> Result<Vec<Kind>, ValidationError> {
        validate(descriptors)
    }

    /// Run one reconciliation pass.
    ///
    /// Validation failures abort before any probe or mutation. Probe and
    /// mutation failures are recorded per resource and the pass continues.
    pub fn run(
        &self,
        descriptors: &[ResourceDescriptor],
        opts: &RunOptions,
        sink: &mut dyn ReportSink,
    ) -> Result<RunReport, ValidationError> {
        let kinds = validate(descriptors)?;
        let mut resources = descriptors
            .iter()
            .zip(&kinds)
            .map(|(descriptor, kind)| kind.instantiate(descriptor, &self.probes))
            .collect::<Result<Vec<_>, _>>()?;

        log::info!(
            "{} {} resources",
            if opts.check_only { "Checking" } else { "Reconciling" },
            resources.len()
        );
        sink.on_run_start(resources.len(), opts.check_only);

        let mut ledger = Ledger::new();
        let outcomes = if opts.jobs > 1 && resources.len() > 1 {
            match rayon::ThreadPoolBuilder::new().num_threads(opts.jobs).build() {
                Ok(pool) => run_levels(&pool, &mut resources, &mut ledger, opts, sink),
                Err(e) => {
                    log::warn!("Failed to create thread pool, running sequentially: {e}");
                    run_sequential(&mut resources, &mut ledger, opts, sink)
                }
            }
        } else {
            run_sequential(&mut resources, &mut ledger, opts, sink)
        };

        let mut report = RunReport {
            check_only: opts.check_only,
            changed: ledger.names().into_iter().map(str::to_string).collect(),
            ..Default::default()
        };
        for outcome in outcomes {
            report.summary.add_outcome(&outcome);
            report.resources.push(outcome);
        }

        log::info!(
            "Pass complete: {} drifted, {} unknown, {} changed, {} failed",
            report.summary.drifted,
            report.summary.unknown,
            report.summary.changed,
            report.summary.failed
        );
        sink.on_run_complete(&report);
        Ok(report)
    }
}

/// Validate a declaration. See [`Engine::validate`].
pub fn validate(descriptors: &[ResourceDescriptor]) -> Result<Vec<Kind>, ValidationError> {
    let mut positions: HashMap<&str, usize> = HashMap::with_capacity(descriptors.len());
    for (index, descriptor) in descriptors.iter().enumerate() {
        if positions.insert(&descriptor.name, index).is_some() {
            return Err(ValidationError::DuplicateName(descriptor.name.clone()));
        }
    }

    let mut kinds = Vec::with_capacity(descriptors.len());
    for (index, descriptor) in descriptors.iter().enumerate() {
        let kind = Kind::of(descriptor)?;
        kind.validate(descriptor)?;

        for dependency in &descriptor.dependencies {
            if *dependency == descriptor.name {
                return Err(ValidationError::SelfDependency(descriptor.name.clone()));
            }
            match positions.get(dependency.as_str()) {
                None => {
                    return Err(ValidationError::UnknownDependency {
                        resource: descriptor.name.clone(),
                        dependency: dependency.clone(),
                    });
                }
                Some(&position) if position > index => {
                    return Err(ValidationError::ForwardDependency {
                        resource: descriptor.name.clone(),
                        dependency: dependency.clone(),
                    });
                }
                Some(_) => {}
            }
        }

        kinds.push(kind);
    }

    Ok(kinds)
}

/// Evaluate resources strictly one after another in declaration order.
fn run_sequential(
    resources: &mut [BoxedResource],
    ledger: &mut Ledger,
    opts: &RunOptions,
    sink: &mut dyn ReportSink,
) -> Vec<ResourceOutcome> {
    let mut outcomes = Vec::with_capacity(resources.len());

    for resource in resources.iter_mut() {
        let drift = detect(&mut **resource, ledger);
        record(&**resource, &drift, ledger, sink);

        let apply = (!opts.check_only).then(|| {
            let result = converge(&mut **resource, &drift);
            sink.on_converged(resource.name(), &result);
            result
        });

        outcomes.push(ResourceOutcome {
            name: resource.name().to_string(),
            kind: resource.kind().tag().to_string(),
            drift,
            apply,
        });
    }

    outcomes
}

/// Evaluate resources level by level, each level in parallel.
///
/// A resource's level is one more than the highest level among its
/// dependencies, so everything it depends on has been evaluated, recorded
/// and converged in an earlier level.
fn run_levels(
    pool: &rayon::ThreadPool,
    resources: &mut [BoxedResource],
    ledger: &mut Ledger,
    opts: &RunOptions,
    sink: &mut dyn ReportSink,
) -> Vec<ResourceOutcome> {
    let levels = dependency_levels(resources);
    let depth = levels.iter().max().map_or(0, |max| max + 1);

    let mut buckets: Vec<Vec<(usize, &mut dyn Resource)>> =
        (0..depth).map(|_| Vec::new()).collect();
    for (index, resource) in resources.iter_mut().enumerate() {
        let resource: &mut dyn Resource = resource.as_mut();
        buckets[levels[index]].push((index, resource));
    }

    let mut slots: Vec<Option<ResourceOutcome>> = Vec::new();
    slots.resize_with(levels.len(), || None);

    for (level, mut bucket) in buckets.into_iter().enumerate() {
        log::debug!("Evaluating level {level}: {} resources", bucket.len());

        let frozen: &Ledger = ledger;
        let drifts: Vec<DriftOutcome> = pool.install(|| {
            bucket
                .par_iter_mut()
                .map(|(_, resource)| detect(&mut **resource, frozen))
                .collect()
        });

        for ((_, resource), drift) in bucket.iter().zip(&drifts) {
            record(&**resource, drift, ledger, sink);
        }

        let applies: Vec<Option<ApplyResult>> = if opts.check_only {
            vec![None; bucket.len()]
        } else {
            pool.install(|| {
                bucket
                    .par_iter_mut()
                    .zip(drifts.par_iter())
                    .map(|((_, resource), drift)| Some(converge(&mut **resource, drift)))
                    .collect()
            })
        };

        for (((index, resource), drift), apply) in bucket.iter().zip(drifts).zip(applies) {
            if let Some(result) = &apply {
                sink.on_converged(resource.name(), result);
            }
            slots[*index] = Some(ResourceOutcome {
                name: resource.name().to_string(),
                kind: resource.kind().tag().to_string(),
                drift,
                apply,
            });
        }
    }

    slots.into_iter().flatten().collect()
}

/// Level of each resource in declaration order. Relies on validation having
/// rejected forward references.
fn dependency_levels(resources: &[BoxedResource]) -> Vec<usize> {
    let mut by_name: HashMap<&str, usize> = HashMap::with_capacity(resources.len());
    let mut levels = Vec::with_capacity(resources.len());

    for resource in resources {
        let level = resource
            .dependencies()
            .iter()
            .filter_map(|dep| by_name.get(dep.as_str()))
            .map(|level| level + 1)
            .max()
            .unwrap_or(0);
        by_name.insert(resource.name(), level);
        levels.push(level);
    }

    levels
}

fn detect(resource: &mut dyn Resource, ledger: &Ledger) -> DriftOutcome {
    match resource.detect_drift(ledger) {
        Ok(true) => DriftOutcome::Drifted,
        Ok(false) => DriftOutcome::InSync,
        Err(e) => {
            log::warn!("{}: could not determine drift: {e}", resource.name());
            DriftOutcome::Unknown {
                error: e.to_string(),
            }
        }
    }
}

fn record(
    resource: &dyn Resource,
    drift: &DriftOutcome,
    ledger: &mut Ledger,
    sink: &mut dyn ReportSink,
) {
    if drift.is_changed() {
        ledger.mark_changed(resource.name());
    }
    log::debug!("{}: {:?}", resource.description(), drift);
    sink.on_drift(resource.name(), resource.kind(), drift);
}

fn converge(resource: &mut dyn Resource, drift: &DriftOutcome) -> ApplyResult {
    if let DriftOutcome::Unknown { error } = drift {
        return ApplyResult::Skipped {
            reason: format!("drift unknown: {error}"),
        };
    }

    match resource.converge() {
        Ok(result) => {
            log::debug!("{}: {:?}", resource.name(), result);
            result
        }
        Err(e) => {
            log::warn!("{}: convergence failed: {e}", resource.name());
            ApplyResult::Failed {
                error: e.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryFileSystem, MemoryPackageManager, MemoryServiceManager, ServiceCall};
    use crate::report::NoReport;
    use std::sync::Arc;

    struct Fixture {
        fs: Arc<MemoryFileSystem>,
        packages: Arc<MemoryPackageManager>,
        services: Arc<MemoryServiceManager>,
        engine: Engine,
    }

    fn fixture() -> Fixture {
        let fs = Arc::new(MemoryFileSystem::new());
        let packages = Arc::new(MemoryPackageManager::new());
        let services = Arc::new(MemoryServiceManager::new());
        let engine = Engine::new(Probes::new(fs.clone(), packages.clone(), services.clone()));
        Fixture {
            fs,
            packages,
            services,
            engine,
        }
    }

    fn config_file() -> ResourceDescriptor {
        ResourceDescriptor::new("app_config", "file")
            .with_attr("path", "/etc/app")
            .with_attr("name", "config.conf")
            .with_attr("mode", "644")
            .with_attr("owner", "root")
            .with_attr("group", "root")
            .with_attr("content", "X=1")
    }

    fn app_service() -> ResourceDescriptor {
        ResourceDescriptor::new("appd", "service")
            .with_attr("name", "appd")
            .with_attr("state", "running")
            .depends_on("app_config")
    }

    #[derive(Default)]
    struct Recorder {
        events: Vec<String>,
    }

    impl ReportSink for Recorder {
        fn on_run_start(&mut self, count: usize, check_only: bool) {
            self.events.push(format!("start {count} {check_only}"));
        }
        fn on_drift(&mut self, name: &str, _kind: Kind, drift: &DriftOutcome) {
            self.events.push(format!("drift {name} {:?}", drift.as_bool()));
        }
        fn on_converged(&mut self, name: &str, result: &ApplyResult) {
            self.events.push(format!("converged {name} {result:?}"));
        }
        fn on_run_complete(&mut self, report: &RunReport) {
            self.events.push(format!("complete {}", report.resources.len()));
        }
    }

    #[test]
    fn test_validate_rejects_duplicates() {
        let descriptors = vec![config_file(), config_file()];
        assert_eq!(
            validate(&descriptors),
            Err(ValidationError::DuplicateName("app_config".into()))
        );
    }

    #[test]
    fn test_validate_rejects_unknown_dependency() {
        let descriptors = vec![app_service()];
        assert!(matches!(
            validate(&descriptors),
            Err(ValidationError::UnknownDependency { ref dependency, .. }) if dependency == "app_config"
        ));
    }

    #[test]
    fn test_validate_rejects_forward_dependency() {
        let descriptors = vec![app_service(), config_file()];
        assert!(matches!(
            validate(&descriptors),
            Err(ValidationError::ForwardDependency { ref resource, .. }) if resource == "appd"
        ));
    }

    #[test]
    fn test_validate_rejects_cycle() {
        let a = ResourceDescriptor::new("a", "dummy").depends_on("b");
        let b = ResourceDescriptor::new("b", "dummy").depends_on("a");
        assert!(matches!(validate(&[a, b]), Err(ValidationError::ForwardDependency { .. })));
    }

    #[test]
    fn test_validate_rejects_self_dependency() {
        let a = ResourceDescriptor::new("a", "dummy").depends_on("a");
        assert_eq!(validate(&[a]), Err(ValidationError::SelfDependency("a".into())));
    }

    #[test]
    fn test_validation_failure_prevents_any_mutation() {
        let f = fixture();
        let mut broken = config_file().with_attr("name", "other.conf");
        broken.name = "other".into();
        broken.attributes.remove("content");

        let result = f.engine.run(&[config_file(), broken], &RunOptions::apply(), &mut NoReport);

        assert!(matches!(result, Err(ValidationError::MissingField { .. })));
        assert!(f.fs.mutations().is_empty());
        assert_eq!(f.fs.probe_count(), 0);
    }

    #[test]
    fn test_check_only_never_mutates() {
        let f = fixture();
        let report = f
            .engine
            .run(&[config_file(), app_service()], &RunOptions::check(), &mut NoReport)
            .unwrap();

        assert_eq!(report.drifted().collect::<Vec<_>>(), vec!["app_config", "appd"]);
        assert!(report.resources.iter().all(|r| r.apply.is_none()));
        assert!(f.fs.mutations().is_empty());
        assert!(f.services.calls().is_empty());
    }

    #[test]
    fn test_dependency_propagation() {
        let f = fixture();
        f.services.set_active("appd", true);

        let report = f
            .engine
            .run(&[config_file(), app_service()], &RunOptions::check(), &mut NoReport)
            .unwrap();

        assert_eq!(report.get("appd").unwrap().drift, DriftOutcome::Drifted);
        assert_eq!(report.changed, vec!["app_config", "appd"]);
    }

    #[test]
    fn test_apply_reaches_fixed_point() {
        let f = fixture();
        f.services.set_active("appd", true);
        let descriptors = [config_file(), app_service()];

        let first = f.engine.run(&descriptors, &RunOptions::apply(), &mut NoReport).unwrap();
        assert_eq!(first.get("app_config").unwrap().apply, Some(ApplyResult::Created));
        assert_eq!(first.get("appd").unwrap().apply, Some(ApplyResult::Restarted));

        f.fs.clear_log();
        f.services.clear_calls();

        let second = f.engine.run(&descriptors, &RunOptions::apply(), &mut NoReport).unwrap();
        assert_eq!(second.drifted().count(), 0);
        assert!(second.changed.is_empty());
        assert!(f.fs.mutations().is_empty());
        assert!(f.services.calls().is_empty());
    }

    #[test]
    fn test_probe_failure_is_resource_local() {
        let f = fixture();
        f.fs.fail_probes_for("/etc/app");
        f.services.set_active("appd", true);
        let curl = ResourceDescriptor::new("curl", "package")
            .with_attr("name", "curl")
            .with_attr("version", "7.88.1");

        let report = f
            .engine
            .run(&[config_file(), app_service(), curl], &RunOptions::apply(), &mut NoReport)
            .unwrap();

        let config = report.get("app_config").unwrap();
        assert!(matches!(config.drift, DriftOutcome::Unknown { .. }));
        assert!(matches!(config.apply, Some(ApplyResult::Skipped { .. })));

        // unknown drift propagates: the dependent service is still restarted
        assert_eq!(report.get("appd").unwrap().apply, Some(ApplyResult::Restarted));
        assert_eq!(report.get("curl").unwrap().apply, Some(ApplyResult::Created));
        assert_eq!(f.packages.installs().len(), 1);
        assert!(!report.summary.is_success());
    }

    #[test]
    fn test_package_query_failure_still_restarts_dependents() {
        let f = fixture();
        f.packages.fail_probes_for("curl");
        f.services.set_active("appd", true);
        let curl = ResourceDescriptor::new("curl", "package")
            .with_attr("name", "curl")
            .with_attr("version", "7.88.1");
        let appd = ResourceDescriptor::new("appd", "service")
            .with_attr("name", "appd")
            .with_attr("state", "running")
            .depends_on("curl");

        let report = f.engine.run(&[curl, appd], &RunOptions::apply(), &mut NoReport).unwrap();

        let curl = report.get("curl").unwrap();
        assert!(matches!(curl.drift, DriftOutcome::Unknown { .. }));
        assert!(matches!(curl.apply, Some(ApplyResult::Skipped { .. })));
        assert!(f.packages.installs().is_empty());

        assert_eq!(report.get("appd").unwrap().apply, Some(ApplyResult::Restarted));
        assert_eq!(f.services.calls(), vec![ServiceCall::Restart("appd".into())]);
        assert_eq!(report.summary.unknown, 1);
    }

    #[test]
    fn test_service_query_failure_is_never_in_sync() {
        let f = fixture();
        f.services.fail_probes_for("appd");
        let appd = ResourceDescriptor::new("appd", "service")
            .with_attr("name", "appd")
            .with_attr("state", "stopped");

        let checked = f.engine.run(&[appd.clone()], &RunOptions::check(), &mut NoReport).unwrap();
        assert!(matches!(checked.get("appd").unwrap().drift, DriftOutcome::Unknown { .. }));
        assert_eq!(checked.summary.in_sync, 0);

        let applied = f.engine.run(&[appd], &RunOptions::apply(), &mut NoReport).unwrap();
        assert!(matches!(applied.get("appd").unwrap().apply, Some(ApplyResult::Skipped { .. })));
        assert!(f.services.calls().is_empty());
        assert!(!applied.summary.is_success());
    }

    #[test]
    fn test_stopped_service_with_changed_dependency_is_stopped() {
        let f = fixture();
        f.services.set_active("appd", true);
        let appd = app_service().with_attr("state", "stopped");

        let report = f
            .engine
            .run(&[config_file(), appd], &RunOptions::apply(), &mut NoReport)
            .unwrap();

        assert_eq!(report.get("appd").unwrap().apply, Some(ApplyResult::Stopped));
        assert_eq!(f.services.calls(), vec![ServiceCall::Stop("appd".into())]);
        assert!(!f.services.active("appd"));
    }

    #[test]
    fn test_mutation_failure_continues() {
        let f = fixture();
        f.fs.fail_mutations_for("/etc/app");
        f.services.set_active("appd", false);

        let report = f
            .engine
            .run(&[config_file(), app_service()], &RunOptions::apply(), &mut NoReport)
            .unwrap();

        assert!(matches!(
            report.get("app_config").unwrap().apply,
            Some(ApplyResult::Failed { .. })
        ));
        assert_eq!(report.get("appd").unwrap().apply, Some(ApplyResult::Restarted));
        assert_eq!(report.failures().count(), 1);
    }

    #[test]
    fn test_sink_sees_declaration_order() {
        let f = fixture();
        f.services.set_active("appd", true);
        let mut recorder = Recorder::default();

        f.engine
            .run(&[config_file(), app_service()], &RunOptions::apply(), &mut recorder)
            .unwrap();

        assert_eq!(
            recorder.events,
            vec![
                "start 2 false",
                "drift app_config Some(true)",
                "converged app_config Created",
                "drift appd Some(true)",
                "converged appd Restarted",
                "complete 2",
            ]
        );
    }

    #[test]
    fn test_levels() {
        let f = fixture();
        let descriptors = [
            ResourceDescriptor::new("a", "dummy"),
            ResourceDescriptor::new("b", "dummy"),
            ResourceDescriptor::new("c", "dummy").depends_on("a"),
            ResourceDescriptor::new("d", "dummy").depends_on("c").depends_on("b"),
        ];
        let resources: Vec<BoxedResource> = descriptors
            .iter()
            .map(|d| Kind::Generic.instantiate(d, &f.engine.probes).unwrap())
            .collect();

        assert_eq!(dependency_levels(&resources), vec![0, 0, 1, 2]);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let f = fixture();
        f.services.set_active("appd", true);
        let descriptors = [
            config_file(),
            ResourceDescriptor::new("curl", "package")
                .with_attr("name", "curl")
                .with_attr("version", "7.88.1"),
            app_service(),
        ];

        let report = f
            .engine
            .run(&descriptors, &RunOptions::apply().with_jobs(4), &mut NoReport)
            .unwrap();

        let names: Vec<_> = report.resources.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["app_config", "curl", "appd"]);
        assert_eq!(report.get("appd").unwrap().apply, Some(ApplyResult::Restarted));
        assert_eq!(f.services.calls(), vec![ServiceCall::Restart("appd".into())]);
    }
}
