//! End-to-end deferred loads against an in-memory descriptor provider.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use camino::{Utf8Path, Utf8PathBuf};
use pt_core::{
    DeferredProjectDescriptor, DescriptorMap, Language, LoadConfig, Project, ProjectId,
    ProjectReference, TrackerConfig,
};
use pt_loader::{
    AnalyzerDependencyCheck, DanglingReference, DeferredLoadOrchestrator, DescriptorProvider,
    LoadError, LoadState, ManifestProvider, ProviderError,
};
use pt_tracker::{ProjectTracker, RecordingHost, WorkspaceHost};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

// ============================================================================
// Fixtures
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Behavior {
    Serve,
    CancelDuringRequest,
    FailCancelled,
}

struct StaticProvider {
    descriptors: DescriptorMap,
    guids: BTreeMap<Utf8PathBuf, Uuid>,
    behavior: Behavior,
}

impl StaticProvider {
    fn new(descriptors: DescriptorMap) -> Self {
        Self {
            descriptors,
            guids: BTreeMap::new(),
            behavior: Behavior::Serve,
        }
    }

    fn with_behavior(mut self, behavior: Behavior) -> Self {
        self.behavior = behavior;
        self
    }

    fn with_guid(mut self, path: &str, guid: Uuid) -> Self {
        self.guids.insert(Utf8PathBuf::from(path), guid);
        self
    }
}

impl DescriptorProvider for StaticProvider {
    async fn project_descriptors(
        &self,
        _configuration: &str,
        cancel: &CancellationToken,
    ) -> Result<DescriptorMap, ProviderError> {
        match self.behavior {
            Behavior::Serve => Ok(self.descriptors.clone()),
            Behavior::CancelDuringRequest => {
                cancel.cancel();
                Ok(self.descriptors.clone())
            }
            Behavior::FailCancelled => Err(ProviderError::Cancelled),
        }
    }

    fn project_guid(&self, project_file: &Utf8Path) -> Result<Uuid, ProviderError> {
        self.guids
            .get(project_file)
            .copied()
            .ok_or_else(|| ProviderError::GuidUnavailable(project_file.to_owned()))
    }
}

#[derive(Default)]
struct CountingCheck {
    calls: AtomicUsize,
}

impl AnalyzerDependencyCheck for CountingCheck {
    fn reanalyze_solution_for_conflicts(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

fn descriptor(args: &[&str], target: Option<&str>, references: &[&str]) -> DeferredProjectDescriptor {
    DeferredProjectDescriptor {
        command_line_arguments: args.iter().map(|arg| (*arg).to_owned()).collect(),
        target_path: target.map(Utf8PathBuf::from),
        referenced_project_file_paths: references.iter().map(Utf8PathBuf::from).collect(),
    }
}

fn descriptors(entries: Vec<(&str, DeferredProjectDescriptor)>) -> DescriptorMap {
    entries
        .into_iter()
        .map(|(path, descriptor)| (Utf8PathBuf::from(path), descriptor))
        .collect()
}

fn tracker_with_host() -> (ProjectTracker, Arc<RecordingHost>) {
    let mut tracker = ProjectTracker::new(TrackerConfig::default());
    let host = Arc::new(RecordingHost::default());
    let dyn_host: Arc<dyn WorkspaceHost> = Arc::clone(&host) as Arc<dyn WorkspaceHost>;
    tracker.register_host(Arc::clone(&dyn_host)).unwrap();
    tracker.mark_host_ready(&dyn_host).unwrap();
    (tracker, host)
}

fn project_named<'a>(tracker: &'a ProjectTracker, name: &str) -> &'a Project {
    tracker
        .registry()
        .ids()
        .into_iter()
        .filter_map(|id| tracker.get_project(id))
        .find(|project| project.display_name == name)
        .unwrap()
}

fn names(tracker: &ProjectTracker, ids: &[ProjectId]) -> Vec<String> {
    ids.iter()
        .map(|id| tracker.get_project(*id).unwrap().display_name.clone())
        .collect()
}

/// A -> B -> C, each also listing the referenced binary on its command line.
fn chain() -> DescriptorMap {
    descriptors(vec![
        (
            "/sln/A/A.csproj",
            descriptor(
                &["/out:bin/A.dll", "/r:/sln/B/bin/B.dll", "Program.cs"],
                Some("/sln/A/bin/A.dll"),
                &["/sln/B/B.csproj"],
            ),
        ),
        (
            "/sln/B/B.csproj",
            descriptor(
                &["/out:bin/B.dll", "/r:/sln/C/bin/C.dll"],
                Some("/sln/B/bin/B.dll"),
                &["/sln/C/C.csproj"],
            ),
        ),
        (
            "/sln/C/C.csproj",
            descriptor(&["/out:bin/C.dll"], Some("/sln/C/bin/C.dll"), &[]),
        ),
    ])
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_chain_is_materialized_dependencies_first() {
    let (mut tracker, host) = tracker_with_host();
    let mut loader = DeferredLoadOrchestrator::new(StaticProvider::new(chain()), LoadConfig::default());

    let summary = loader.load(&mut tracker).await.unwrap();

    assert_eq!(summary.configuration, "Debug|Any CPU");
    assert_eq!(summary.descriptors, 3);
    assert_eq!(names(&tracker, &summary.created), vec!["C", "B", "A"]);
    assert!(summary.dangling.is_empty());
    assert_eq!(loader.state(), LoadState::Idle);

    let a = project_named(&tracker, "A");
    let b = project_named(&tracker, "B");
    assert!(a.references_project(b.id));
    assert_eq!(a.metadata_references().count(), 0);
    assert_eq!(a.bin_output_path, Some(Utf8PathBuf::from("/sln/A/bin/A.dll")));
    assert_eq!(a.source_files, vec![Utf8PathBuf::from("/sln/A/Program.cs")]);

    assert!(tracker.session().is_load_complete());
    assert!(tracker.session().used_deferred_load());
    assert_eq!(names(&tracker, &host.added_projects()), vec!["C", "B", "A"]);
    assert_eq!(
        host.kinds(),
        vec!["project_added", "project_added", "project_added", "start_pushing"]
    );
}

#[tokio::test]
async fn test_dangling_reference_keeps_binary_reference() {
    let (mut tracker, _host) = tracker_with_host();
    let provider = StaticProvider::new(descriptors(vec![(
        "/sln/P/P.csproj",
        descriptor(
            &["/out:bin/P.dll", "/r:/sln/out/q.dll"],
            Some("/sln/P/bin/P.dll"),
            &["/sln/Q/Q.csproj"],
        ),
    )]));
    let mut loader = DeferredLoadOrchestrator::new(provider, LoadConfig::default());

    let summary = loader.load(&mut tracker).await.unwrap();

    assert_eq!(
        summary.dangling,
        vec![DanglingReference {
            from: Utf8PathBuf::from("/sln/P/P.csproj"),
            to: Utf8PathBuf::from("/sln/Q/Q.csproj"),
        }]
    );
    let p = project_named(&tracker, "P");
    assert_eq!(p.project_references().count(), 0);
    let binaries: Vec<&str> = p
        .metadata_references()
        .map(|reference| reference.path.as_str())
        .collect();
    assert_eq!(binaries, vec!["/sln/out/q.dll"]);
}

#[tokio::test]
async fn test_reference_cycle_terminates() {
    let (mut tracker, _host) = tracker_with_host();
    let provider = StaticProvider::new(descriptors(vec![
        (
            "/sln/A/A.csproj",
            descriptor(&[], Some("/sln/A/bin/A.dll"), &["/sln/B/B.csproj"]),
        ),
        (
            "/sln/B/B.csproj",
            descriptor(&[], Some("/sln/B/bin/B.dll"), &["/sln/A/A.csproj"]),
        ),
    ]));
    let mut loader = DeferredLoadOrchestrator::new(provider, LoadConfig::default());

    let summary = loader.load(&mut tracker).await.unwrap();

    assert_eq!(summary.created.len(), 2);
    let a = project_named(&tracker, "A");
    let b = project_named(&tracker, "B");
    assert!(a.references_project(b.id));
    assert!(b.references_project(a.id));
    assert_eq!(tracker.registry().pushing_ids().len(), 2);
}

#[tokio::test]
async fn test_cancelled_during_request_registers_nothing() {
    let (mut tracker, host) = tracker_with_host();
    let provider = StaticProvider::new(chain()).with_behavior(Behavior::CancelDuringRequest);
    let mut loader = DeferredLoadOrchestrator::new(provider, LoadConfig::default());

    let result = loader.load(&mut tracker).await;

    assert!(matches!(result, Err(LoadError::Cancelled)));
    assert!(tracker.registry().is_empty());
    assert!(!tracker.session().is_load_complete());
    assert!(host.kinds().is_empty());
    assert_eq!(loader.state(), LoadState::Idle);
}

#[tokio::test]
async fn test_provider_cancellation_maps_to_cancelled() {
    let (mut tracker, _host) = tracker_with_host();
    let provider = StaticProvider::new(chain()).with_behavior(Behavior::FailCancelled);
    let mut loader = DeferredLoadOrchestrator::new(provider, LoadConfig::default());

    let err = loader.load(&mut tracker).await.unwrap_err();
    assert!(err.is_cancelled());
    assert!(tracker.registry().is_empty());
}

#[tokio::test]
async fn test_disabled_by_config() {
    let mut tracker = ProjectTracker::new(TrackerConfig {
        deferred_load: false,
    });
    let mut loader = DeferredLoadOrchestrator::new(StaticProvider::new(chain()), LoadConfig::default());

    let result = loader.load(&mut tracker).await;
    assert!(matches!(result, Err(LoadError::Disabled)));
    assert!(!tracker.session().used_deferred_load());
}

#[tokio::test]
async fn test_analyzer_check_runs_once() {
    let (mut tracker, _host) = tracker_with_host();
    let check = Arc::new(CountingCheck::default());
    let mut loader = DeferredLoadOrchestrator::new(StaticProvider::new(chain()), LoadConfig::default())
        .with_analyzer_check(Arc::clone(&check) as Arc<dyn AnalyzerDependencyCheck>);

    loader.load(&mut tracker).await.unwrap();
    assert_eq!(check.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_close_after_deferred_load_empties_registry() {
    let (mut tracker, host) = tracker_with_host();
    let mut loader = DeferredLoadOrchestrator::new(StaticProvider::new(chain()), LoadConfig::default());
    loader.load(&mut tracker).await.unwrap();
    host.take();

    tracker.before_close_solution();
    tracker.after_close_solution().unwrap();

    assert!(tracker.registry().is_empty());
    assert_eq!(tracker.shared().identity_count(), 0);
    assert_eq!(
        host.kinds(),
        vec!["stop_pushing", "solution_removed", "clear_solution", "solution_closed"]
    );
}

#[tokio::test]
async fn test_unknown_project_language_is_skipped() {
    let (mut tracker, _host) = tracker_with_host();
    let provider = StaticProvider::new(descriptors(vec![
        ("/sln/App/App.vbproj", descriptor(&[], Some("/sln/App/bin/App.dll"), &[])),
        ("/sln/Db/Db.sqlproj", descriptor(&[], Some("/sln/Db/bin/Db.dacpac"), &[])),
    ]));
    let mut loader = DeferredLoadOrchestrator::new(provider, LoadConfig::default());

    let summary = loader.load(&mut tracker).await.unwrap();

    assert_eq!(summary.skipped, vec![Utf8PathBuf::from("/sln/Db/Db.sqlproj")]);
    assert_eq!(summary.created.len(), 1);
    assert_eq!(project_named(&tracker, "App").language, Language::VisualBasic);
}

#[tokio::test]
async fn test_preexisting_project_is_referenced_through_its_binary() {
    let (mut tracker, _host) = tracker_with_host();
    let lib_id = tracker.shared().allocate_project_id();
    tracker
        .add_project(
            Project::new(lib_id, "Lib", Language::CSharp)
                .with_file_path("/sln/Lib/Lib.csproj")
                .with_bin_output_path("/sln/Lib/bin/Lib.dll"),
        )
        .unwrap();

    let provider = StaticProvider::new(descriptors(vec![(
        "/sln/App/App.csproj",
        descriptor(&[], Some("/sln/App/bin/App.dll"), &["/sln/Lib/Lib.csproj"]),
    )]));
    let mut loader = DeferredLoadOrchestrator::new(provider, LoadConfig::default());
    let summary = loader.load(&mut tracker).await.unwrap();

    let app = project_named(&tracker, "App");
    assert_eq!(summary.created, vec![app.id]);
    assert!(app.references_project(lib_id));
    assert!(app.references.iter().any(ProjectReference::is_converted));
}

#[tokio::test]
async fn test_project_guid_from_provider_or_synthetic() {
    let (mut tracker, _host) = tracker_with_host();
    let known = Uuid::new_v4();
    let provider = StaticProvider::new(descriptors(vec![
        ("/sln/A/A.csproj", descriptor(&[], None, &[])),
        ("/sln/B/B.csproj", descriptor(&[], None, &[])),
    ]))
    .with_guid("/sln/A/A.csproj", known);
    let mut loader = DeferredLoadOrchestrator::new(provider, LoadConfig::default());

    loader.load(&mut tracker).await.unwrap();

    assert_eq!(project_named(&tracker, "A").guid, known);
    let synthetic = project_named(&tracker, "B").guid;
    assert_ne!(synthetic, Uuid::nil());
    assert_ne!(synthetic, known);
}

#[tokio::test]
async fn test_duplicate_target_paths_stay_ambiguous() {
    let (mut tracker, _host) = tracker_with_host();
    let provider = StaticProvider::new(descriptors(vec![
        ("/sln/X/X.csproj", descriptor(&[], Some("/out/shared.dll"), &[])),
        ("/sln/Y/Y.csproj", descriptor(&[], Some("/out/shared.dll"), &[])),
        ("/sln/Z/Z.csproj", descriptor(&["/r:/out/shared.dll"], None, &[])),
    ]));
    let mut loader = DeferredLoadOrchestrator::new(provider, LoadConfig::default());

    loader.load(&mut tracker).await.unwrap();

    assert_eq!(
        tracker.shared().producers(Utf8Path::new("/out/shared.dll")).len(),
        2
    );
    let z = project_named(&tracker, "Z");
    assert_eq!(z.project_references().count(), 0);
    assert_eq!(z.metadata_references().count(), 1);
}

#[tokio::test]
async fn test_existing_project_file_keys_identity_by_path() {
    let dir = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
    let project_file = root.join("Core.csproj");
    std::fs::write(&project_file, "<Project />").unwrap();

    let (mut tracker, _host) = tracker_with_host();
    let provider = StaticProvider::new(descriptors(vec![(
        project_file.as_str(),
        descriptor(&["/out:bin/Core.dll"], None, &[]),
    )]));
    let mut loader = DeferredLoadOrchestrator::new(provider, LoadConfig::default());
    let summary = loader.load(&mut tracker).await.unwrap();

    let id = tracker
        .shared()
        .get_or_create_project_id_for_path(project_file.as_str(), "Core");
    assert_eq!(summary.created, vec![id]);
    assert_eq!(
        tracker.get_project(id).unwrap().bin_output_path,
        Some(root.join("bin/Core.dll"))
    );
}

#[tokio::test]
async fn test_load_from_manifest_file() {
    let dir = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
    let manifest = root.join("solution.json");
    std::fs::write(
        &manifest,
        r#"{
            "solution": "App.sln",
            "configurations": {
                "Release|x64": {
                    "App/App.csproj": {
                        "CommandLineArguments": ["/out:bin/App.dll"],
                        "TargetPath": "App/bin/App.dll",
                        "ReferencedProjectFilePaths": ["Core/Core.csproj"]
                    },
                    "Core/Core.csproj": {
                        "CommandLineArguments": ["/out:bin/Core.dll"],
                        "TargetPath": "Core/bin/Core.dll"
                    }
                }
            }
        }"#,
    )
    .unwrap();

    let provider = ManifestProvider::from_file(&manifest).await.unwrap();
    let config = LoadConfig {
        configuration: "Release".to_owned(),
        platform: "x64".to_owned(),
        batch_parallelism: Some(2),
    };
    let (mut tracker, _host) = tracker_with_host();
    let mut loader = DeferredLoadOrchestrator::new(provider, config);

    let summary = loader.load(&mut tracker).await.unwrap();

    assert_eq!(names(&tracker, &summary.created), vec!["Core", "App"]);
    let app = project_named(&tracker, "App");
    let core = project_named(&tracker, "Core");
    assert!(app.references_project(core.id));
    assert_eq!(core.file_path, Some(root.join("Core/Core.csproj")));
}

#[tokio::test]
async fn test_same_named_projects_in_different_directories_stay_distinct() {
    let (mut tracker, _host) = tracker_with_host();
    let provider = StaticProvider::new(descriptors(vec![
        (
            "/sln/App/App.csproj",
            descriptor(&[], Some("/sln/App/bin/App.dll"), &["/sln/Foo/Tests.csproj"]),
        ),
        ("/sln/Bar/Tests.csproj", descriptor(&[], Some("/sln/Bar/bin/Tests.dll"), &[])),
        ("/sln/Foo/Tests.csproj", descriptor(&[], Some("/sln/Foo/bin/Tests.dll"), &[])),
    ]));
    let mut loader = DeferredLoadOrchestrator::new(provider, LoadConfig::default());

    let summary = loader.load(&mut tracker).await.unwrap();

    assert_eq!(summary.created.len(), 3);
    let mut files: Vec<Utf8PathBuf> = summary
        .created
        .iter()
        .filter_map(|id| tracker.get_project(*id)?.file_path.clone())
        .collect();
    files.sort();
    assert_eq!(
        files,
        vec![
            Utf8PathBuf::from("/sln/App/App.csproj"),
            Utf8PathBuf::from("/sln/Bar/Tests.csproj"),
            Utf8PathBuf::from("/sln/Foo/Tests.csproj"),
        ]
    );

    let foo = tracker
        .registry()
        .projects_with_file_path(Utf8Path::new("/sln/Foo/Tests.csproj"))[0]
        .id;
    let app = project_named(&tracker, "App");
    assert!(app.references_project(foo));
    assert_eq!(app.project_references().count(), 1);
}

/// Registers two builds of the same project file, one per target framework.
fn register_cross_targeted_lib(tracker: &mut ProjectTracker) -> (ProjectId, ProjectId) {
    let mut register = |framework: &str| {
        let id = tracker.shared().allocate_project_id();
        tracker
            .add_project(
                Project::new(id, "Lib", Language::CSharp)
                    .with_file_path("/sln/Lib/Lib.csproj")
                    .with_bin_output_path(format!("/sln/Lib/bin/{framework}/Lib.dll")),
            )
            .unwrap();
        id
    };
    let net6 = register("net6.0");
    let net8 = register("net8.0");
    (net6, net8)
}

#[tokio::test]
async fn test_cross_targeted_reference_prefers_matching_output() {
    let (mut tracker, _host) = tracker_with_host();
    let (net6, net8) = register_cross_targeted_lib(&mut tracker);

    let provider = StaticProvider::new(descriptors(vec![(
        "/sln/App/App.csproj",
        descriptor(
            &["/r:/sln/Lib/bin/net8.0/Lib.dll"],
            Some("/sln/App/bin/App.dll"),
            &["/sln/Lib/Lib.csproj"],
        ),
    )]));
    let mut loader = DeferredLoadOrchestrator::new(provider, LoadConfig::default());
    loader.load(&mut tracker).await.unwrap();

    let app = project_named(&tracker, "App");
    assert!(app.references_project(net8));
    assert!(!app.references_project(net6));
    assert_eq!(app.metadata_references().count(), 0);
}

#[tokio::test]
async fn test_cross_targeted_reference_without_match_takes_first() {
    let (mut tracker, _host) = tracker_with_host();
    let (net6, net8) = register_cross_targeted_lib(&mut tracker);

    let provider = StaticProvider::new(descriptors(vec![(
        "/sln/App/App.csproj",
        descriptor(&[], Some("/sln/App/bin/App.dll"), &["/sln/Lib/Lib.csproj"]),
    )]));
    let mut loader = DeferredLoadOrchestrator::new(provider, LoadConfig::default());
    loader.load(&mut tracker).await.unwrap();

    let app = project_named(&tracker, "App");
    assert!(net6 < net8);
    assert!(app.references_project(net6));
    assert!(!app.references_project(net8));
}

#[tokio::test]
async fn test_existing_project_without_output_is_dangling() {
    let (mut tracker, _host) = tracker_with_host();
    let lib_id = tracker.shared().allocate_project_id();
    tracker
        .add_project(Project::new(lib_id, "Lib", Language::CSharp).with_file_path("/sln/Lib/Lib.csproj"))
        .unwrap();

    let provider = StaticProvider::new(descriptors(vec![(
        "/sln/App/App.csproj",
        descriptor(&[], Some("/sln/App/bin/App.dll"), &["/sln/Lib/Lib.csproj"]),
    )]));
    let mut loader = DeferredLoadOrchestrator::new(provider, LoadConfig::default());
    let summary = loader.load(&mut tracker).await.unwrap();

    assert_eq!(
        summary.dangling,
        vec![DanglingReference {
            from: Utf8PathBuf::from("/sln/App/App.csproj"),
            to: Utf8PathBuf::from("/sln/Lib/Lib.csproj"),
        }]
    );
    let app = project_named(&tracker, "App");
    assert!(app.references.is_empty());
}
