//! Deferred bulk loading.
//!
//! [`DeferredLoadOrchestrator`] populates a [`ProjectTracker`] from the
//! descriptors of a [`DescriptorProvider`] in one pass per solution:
//!
//! ```text
//! Idle -> DescriptorsRequested -> ProjectsConstructing -> Finishing -> Idle
//! ```
//!
//! - **DescriptorsRequested**: the only suspension point. Cancellation is
//!   checked as soon as the provider returns.
//! - **ProjectsConstructing**: command lines are parsed in parallel, then
//!   projects are materialized depth-first over their project references on
//!   the foreground thread.
//! - **Finishing**: every registered project starts pushing and the
//!   analyzer-dependency check is kicked off.

use std::sync::Arc;
use std::time::Instant;

use camino::{Utf8Path, Utf8PathBuf};
use pt_core::{
    DeferredProjectDescriptor, DescriptorMap, FxHashMap, FxHashSet, Language, LoadConfig,
    MetadataReference, OutputPathKey, Project, ProjectId, ProjectReference,
};
use pt_tracker::ProjectTracker;
use rayon::prelude::*;
use serde::Serialize;
use smallvec::SmallVec;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::command_line::{CommandLineParser, CscStyleParser, ParsedCommandLine};
use crate::error::LoadError;
use crate::provider::DescriptorProvider;

/// Phase of a deferred load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadState {
    /// No load in progress.
    #[default]
    Idle,
    /// Waiting for the descriptor provider.
    DescriptorsRequested,
    /// Materializing and registering projects.
    ProjectsConstructing,
    /// Pushing projects to hosts.
    Finishing,
}

/// Consistency check run once a deferred load has finished.
///
/// Implementations must not block; they schedule the work and return.
pub trait AnalyzerDependencyCheck: Send + Sync {
    /// Starts checking the solution's analyzers for conflicting dependencies.
    fn reanalyze_solution_for_conflicts(&self);
}

/// A project reference that could not be resolved to a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DanglingReference {
    /// The referencing project file.
    pub from: Utf8PathBuf,
    /// The referenced project file.
    pub to: Utf8PathBuf,
}

/// What a deferred load produced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadSummary {
    /// Configuration key the descriptors were requested for.
    pub configuration: String,
    /// Number of descriptors returned by the provider.
    pub descriptors: usize,
    /// Projects registered by this load, in registration order.
    pub created: Vec<ProjectId>,
    /// Project files skipped because their language is unknown.
    pub skipped: Vec<Utf8PathBuf>,
    /// Project references left as binary references.
    pub dangling: Vec<DanglingReference>,
}

/// Drives one deferred load per solution.
pub struct DeferredLoadOrchestrator<P, C = CscStyleParser> {
    provider: P,
    parser: C,
    config: LoadConfig,
    analyzer_check: Option<Arc<dyn AnalyzerDependencyCheck>>,
    state: LoadState,
}

impl<P> DeferredLoadOrchestrator<P, CscStyleParser>
where
    P: DescriptorProvider,
{
    /// Creates an orchestrator using [`CscStyleParser`].
    #[must_use]
    pub fn new(provider: P, config: LoadConfig) -> Self {
        Self::with_parser(provider, CscStyleParser, config)
    }
}

impl<P, C> DeferredLoadOrchestrator<P, C>
where
    P: DescriptorProvider,
    C: CommandLineParser,
{
    /// Creates an orchestrator with a custom command-line parser.
    #[must_use]
    pub fn with_parser(provider: P, parser: C, config: LoadConfig) -> Self {
        Self {
            provider,
            parser,
            config,
            analyzer_check: None,
            state: LoadState::Idle,
        }
    }

    /// Sets the check triggered when loading finishes.
    #[must_use]
    pub fn with_analyzer_check(mut self, check: Arc<dyn AnalyzerDependencyCheck>) -> Self {
        self.analyzer_check = Some(check);
        self
    }

    /// Returns the current phase.
    #[inline]
    #[must_use]
    pub const fn state(&self) -> LoadState {
        self.state
    }

    /// Returns the descriptor provider.
    #[inline]
    #[must_use]
    pub const fn provider(&self) -> &P {
        &self.provider
    }

    /// Loads every project of the active configuration into `tracker`.
    ///
    /// Returns [`LoadError::Cancelled`] if the solution session was cancelled
    /// while descriptors were requested; nothing is registered in that case.
    pub async fn load(&mut self, tracker: &mut ProjectTracker) -> Result<LoadSummary, LoadError> {
        if !tracker.config().deferred_load {
            return Err(LoadError::Disabled);
        }

        let result = self.run(tracker).await;
        self.state = LoadState::Idle;
        result
    }

    async fn run(&mut self, tracker: &mut ProjectTracker) -> Result<LoadSummary, LoadError> {
        let cancel = tracker.cancellation_token();
        let configuration = self.config.configuration_key();

        self.state = LoadState::DescriptorsRequested;
        info!(configuration = %configuration, "Getting project information - start");
        let started = Instant::now();
        let requested = self
            .provider
            .project_descriptors(&configuration, &cancel)
            .await;
        if cancel.is_cancelled() {
            info!("Deferred load cancelled");
            return Err(LoadError::Cancelled);
        }
        let descriptors = requested?;
        info!(
            count = descriptors.len(),
            took = ?started.elapsed(),
            "Getting project information - done"
        );

        self.state = LoadState::ProjectsConstructing;
        info!("Creating projects - start");
        let started = Instant::now();
        tracker.mark_deferred_load();
        let parsed = self.parse_all(tracker, &descriptors)?;

        let mut construction = Construction::new(tracker, &self.provider, &descriptors, &parsed);
        for path in descriptors.keys() {
            construction.materialize(path)?;
        }
        let mut summary = construction.finish();
        summary.configuration = configuration;
        summary.descriptors = descriptors.len();
        info!(
            created = summary.created.len(),
            skipped = summary.skipped.len(),
            dangling = summary.dangling.len(),
            took = ?started.elapsed(),
            "Creating projects - done"
        );

        self.state = LoadState::Finishing;
        info!("Pushing to workspace - start");
        let started = Instant::now();
        tracker.finish_load();
        if let Some(check) = &self.analyzer_check {
            check.reanalyze_solution_for_conflicts();
        }
        info!(took = ?started.elapsed(), "Pushing to workspace - done");

        Ok(summary)
    }

    /// Parses every descriptor's command line, in parallel.
    fn parse_all(
        &self,
        tracker: &ProjectTracker,
        descriptors: &DescriptorMap,
    ) -> Result<FxHashMap<Utf8PathBuf, ParsedCommandLine>, LoadError> {
        let jobs: Vec<(&Utf8PathBuf, &DeferredProjectDescriptor, Utf8PathBuf)> = descriptors
            .iter()
            .map(|(path, descriptor)| (path, descriptor, tracker.working_folder_for(path)))
            .collect();

        let parser = &self.parser;
        let parse = || {
            jobs.par_iter()
                .map(|(path, descriptor, base)| {
                    (
                        (*path).clone(),
                        parser.parse(&descriptor.command_line_arguments, base),
                    )
                })
                .collect::<FxHashMap<_, _>>()
        };

        match self.config.batch_parallelism {
            Some(threads) => {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .build()?;
                Ok(pool.install(parse))
            }
            None => Ok(parse()),
        }
    }
}

// ============================================================================
// Materialization
// ============================================================================

/// A project under construction, waiting for its references.
struct Frame {
    descriptor_path: Utf8PathBuf,
    project: Project,
    references: std::vec::IntoIter<Utf8PathBuf>,
    /// Project files of the projects referenced directly so far.
    direct_files: Vec<Utf8PathBuf>,
}

/// Lightweight view of a frame, for candidate search.
struct InProgress {
    file: Utf8PathBuf,
    language: Language,
    output: Option<OutputPathKey>,
}

enum Entered {
    /// Already registered or under construction.
    Existing(ProjectId),
    /// A new frame to process.
    New(Box<Frame>),
    /// No descriptor or unknown language.
    Unresolvable,
}

enum Step {
    Link(ProjectId),
    Recurse(Utf8PathBuf),
    Complete,
}

/// State of one materialization pass.
struct Construction<'a, P> {
    tracker: &'a mut ProjectTracker,
    provider: &'a P,
    descriptors: &'a DescriptorMap,
    parsed: &'a FxHashMap<Utf8PathBuf, ParsedCommandLine>,
    /// Target path to the project file that builds it.
    target_paths: FxHashMap<OutputPathKey, Utf8PathBuf>,
    /// Projects registered before this load started.
    preexisting: FxHashSet<ProjectId>,
    in_progress: FxHashMap<ProjectId, InProgress>,
    summary: LoadSummary,
}

impl<'a, P: DescriptorProvider> Construction<'a, P> {
    fn new(
        tracker: &'a mut ProjectTracker,
        provider: &'a P,
        descriptors: &'a DescriptorMap,
        parsed: &'a FxHashMap<Utf8PathBuf, ParsedCommandLine>,
    ) -> Self {
        let preexisting = tracker.registry().ids().into_iter().collect();
        Self {
            tracker,
            provider,
            descriptors,
            parsed,
            target_paths: build_target_paths(descriptors),
            preexisting,
            in_progress: FxHashMap::default(),
            summary: LoadSummary::default(),
        }
    }

    fn finish(self) -> LoadSummary {
        self.summary
    }

    /// Materializes the project at `path` and everything it references.
    fn materialize(&mut self, path: &Utf8Path) -> Result<Option<ProjectId>, LoadError> {
        let root = match self.enter(path) {
            Entered::Existing(id) => return Ok(Some(id)),
            Entered::Unresolvable => return Ok(None),
            Entered::New(frame) => frame,
        };

        let mut stack = vec![root];
        loop {
            let step = match stack.last_mut() {
                Some(frame) => self.next_step(frame),
                None => return Ok(None),
            };

            match step {
                Step::Link(id) => {
                    if let Some(frame) = stack.last_mut() {
                        self.link(frame, id);
                    }
                }
                Step::Recurse(reference) => match self.enter(&reference) {
                    Entered::Existing(id) => {
                        if let Some(frame) = stack.last_mut() {
                            self.link(frame, id);
                        }
                    }
                    Entered::New(child) => stack.push(child),
                    Entered::Unresolvable => {
                        if let Some(frame) = stack.last() {
                            self.dangling(frame, reference);
                        }
                    }
                },
                Step::Complete => {
                    let Some(frame) = stack.pop() else {
                        return Ok(None);
                    };
                    let id = self.complete(*frame)?;
                    match stack.last_mut() {
                        Some(parent) => self.link(parent, id),
                        None => return Ok(Some(id)),
                    }
                }
            }
        }
    }

    /// Decides what to do with the frame's next project reference.
    fn next_step(&self, frame: &mut Frame) -> Step {
        let Some(reference) = frame.references.next() else {
            return Step::Complete;
        };
        match self.find_candidate(&reference, &frame.descriptor_path) {
            Some(id) => Step::Link(id),
            None => Step::Recurse(reference),
        }
    }

    /// Resolves identity for `path` and opens a frame if it is new.
    fn enter(&mut self, path: &Utf8Path) -> Entered {
        let Some(language) = Language::from_project_file(path) else {
            debug!(project = %path, "Unknown project language, skipping");
            if self.descriptor(path).is_some() && !self.summary.skipped.iter().any(|skipped| skipped == path) {
                self.summary.skipped.push(path.to_owned());
            }
            return Entered::Unresolvable;
        };
        let Some((descriptor_path, descriptor)) = self.descriptor(path) else {
            return Entered::Unresolvable;
        };

        // Keyed by the descriptor's full path so same-named projects in
        // different directories stay distinct.
        let name = path.file_stem().unwrap_or(path.as_str()).to_owned();
        let id = self
            .tracker
            .shared()
            .get_or_create_project_id_for_path(descriptor_path.as_str(), &name);
        if self.in_progress.contains_key(&id) || self.tracker.contains_project(id) {
            return Entered::Existing(id);
        }

        let parsed = self
            .parsed
            .get(descriptor_path)
            .cloned()
            .unwrap_or_default();
        let guid = self.provider.project_guid(path).unwrap_or_else(|err| {
            warn!(project = %path, error = %err, "Project guid unavailable, using a synthetic one");
            Uuid::new_v4()
        });

        let mut project = Project::new(id, name, language).with_file_path(path.to_owned());
        project.guid = guid;
        project.bin_output_path = descriptor
            .target_path()
            .cloned()
            .or(parsed.output_path);
        project.source_files = parsed.source_files;
        project.additional_files = parsed.additional_files;
        project.analyzer_references = parsed.analyzer_references;
        project.options = descriptor.command_line_arguments.join(" ");

        self.in_progress.insert(
            id,
            InProgress {
                file: path.to_owned(),
                language,
                output: project.output_key(),
            },
        );
        debug!(project = %id, path = %path, "Materializing project");

        Entered::New(Box::new(Frame {
            descriptor_path: descriptor_path.clone(),
            project,
            references: descriptor.referenced_project_file_paths.clone().into_iter(),
            direct_files: Vec::new(),
        }))
    }

    /// Finds an existing or in-progress project for a referenced file.
    ///
    /// Several projects can share a file when it is cross-targeted. The one
    /// whose output is among the referencing project's binary references
    /// wins; otherwise the first one found.
    fn find_candidate(&self, reference: &Utf8Path, referencing: &Utf8Path) -> Option<ProjectId> {
        let language = Language::from_project_file(reference)?;

        let mut candidates: Vec<(ProjectId, Option<OutputPathKey>)> = self
            .tracker
            .registry()
            .projects_with_file_path(reference)
            .into_iter()
            .filter(|project| project.language == language)
            .map(|project| (project.id, project.output_key()))
            .collect();

        let mut pending: Vec<(ProjectId, Option<OutputPathKey>)> = self
            .in_progress
            .iter()
            .filter(|(_, entry)| {
                entry.language == language
                    && entry.file.as_str().eq_ignore_ascii_case(reference.as_str())
            })
            .map(|(id, entry)| (*id, entry.output.clone()))
            .collect();
        pending.sort_unstable_by_key(|(id, _)| *id);
        candidates.extend(pending);

        match candidates.as_slice() {
            [] => None,
            [(only, _)] => Some(*only),
            [(first, _), ..] => {
                let wanted: SmallVec<[OutputPathKey; 8]> = self
                    .parsed
                    .get(referencing)
                    .map(|parsed| {
                        parsed
                            .metadata_references
                            .iter()
                            .map(MetadataReference::key)
                            .collect()
                    })
                    .unwrap_or_default();
                let chosen = candidates
                    .iter()
                    .find(|(_, output)| output.as_ref().is_some_and(|key| wanted.contains(key)))
                    .map_or(*first, |(id, _)| *id);
                debug!(reference = %reference, candidates = candidates.len(), chosen = %chosen, "Cross-targeted reference");
                Some(chosen)
            }
        }
    }

    /// Adds a reference from the frame's project to `id`.
    ///
    /// Projects that were registered before this load are referenced
    /// through their output binary so the reconciler decides.
    fn link(&mut self, frame: &mut Frame, id: ProjectId) {
        if id == frame.project.id || frame.project.references_project(id) {
            return;
        }

        if self.preexisting.contains(&id) {
            let Some(existing) = self.tracker.get_project(id) else {
                return;
            };
            let Some(output) = existing.bin_output_path.clone() else {
                let target = existing
                    .file_path
                    .clone()
                    .unwrap_or_else(|| Utf8PathBuf::from(&existing.display_name));
                warn!(
                    project = %frame.descriptor_path,
                    reference = %id,
                    "Referenced project has no output path, dropping reference"
                );
                self.summary.dangling.push(DanglingReference {
                    from: frame.descriptor_path.clone(),
                    to: target,
                });
                return;
            };
            let key = OutputPathKey::new(&output);
            if !frame
                .project
                .metadata_references()
                .any(|reference| reference.key() == key)
            {
                frame.project.references.push(ProjectReference::binary(output));
            }
            return;
        }

        frame.project.references.push(ProjectReference::direct(id));
        let file = self
            .in_progress
            .get(&id)
            .map(|entry| entry.file.clone())
            .or_else(|| {
                self.tracker
                    .get_project(id)
                    .and_then(|project| project.file_path.clone())
            });
        if let Some(file) = file {
            frame.direct_files.push(file);
        }
    }

    fn dangling(&mut self, frame: &Frame, reference: Utf8PathBuf) {
        warn!(
            project = %frame.descriptor_path,
            reference = %reference,
            "Referenced project has no descriptor, keeping binary reference"
        );
        self.summary.dangling.push(DanglingReference {
            from: frame.descriptor_path.clone(),
            to: reference,
        });
    }

    /// Adds binary references and registers the project.
    fn complete(&mut self, frame: Frame) -> Result<ProjectId, LoadError> {
        let Frame {
            descriptor_path,
            mut project,
            direct_files,
            ..
        } = frame;
        let id = project.id;

        let mut seen: FxHashSet<OutputPathKey> = project
            .metadata_references()
            .map(MetadataReference::key)
            .collect();
        if let Some(parsed) = self.parsed.get(&descriptor_path) {
            for reference in &parsed.metadata_references {
                let key = reference.key();
                let covered = self.target_paths.get(&key).is_some_and(|file| {
                    direct_files
                        .iter()
                        .any(|direct| direct.as_str().eq_ignore_ascii_case(file.as_str()))
                });
                if covered {
                    debug!(project = %id, reference = %reference.path, "Binary covered by project reference");
                    continue;
                }
                if seen.insert(key) {
                    project
                        .references
                        .push(ProjectReference::Metadata(reference.clone()));
                }
            }
        }

        self.in_progress.remove(&id);
        self.tracker.add_project(project)?;
        self.summary.created.push(id);
        Ok(id)
    }

    /// Looks up a descriptor, falling back to a case-insensitive match.
    fn descriptor(&self, path: &Utf8Path) -> Option<(&'a Utf8PathBuf, &'a DeferredProjectDescriptor)> {
        let descriptors: &'a DescriptorMap = self.descriptors;
        descriptors.get_key_value(path).or_else(|| {
            descriptors
                .iter()
                .find(|(key, _)| key.as_str().eq_ignore_ascii_case(path.as_str()))
        })
    }
}

/// Maps each target path to the project file that builds it.
///
/// When two descriptors claim the same target the first one wins.
fn build_target_paths(descriptors: &DescriptorMap) -> FxHashMap<OutputPathKey, Utf8PathBuf> {
    let mut target_paths = FxHashMap::default();
    for (file, descriptor) in descriptors {
        let Some(target) = descriptor.target_path() else {
            continue;
        };
        let key = OutputPathKey::new(target);
        match target_paths.get(&key) {
            Some(existing) if existing != file => warn!(
                target = %target,
                kept = %existing,
                ignored = %file,
                "Duplicate target path"
            ),
            Some(_) => {}
            None => {
                target_paths.insert(key, file.clone());
            }
        }
    }
    target_paths
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(target: &str) -> DeferredProjectDescriptor {
        DeferredProjectDescriptor {
            target_path: Some(Utf8PathBuf::from(target)),
            ..DeferredProjectDescriptor::default()
        }
    }

    #[test]
    fn test_target_paths_first_wins() {
        let mut descriptors = DescriptorMap::new();
        descriptors.insert(Utf8PathBuf::from("/a/A.csproj"), descriptor("/out/x.dll"));
        descriptors.insert(Utf8PathBuf::from("/b/B.csproj"), descriptor("/OUT/X.dll"));
        descriptors.insert(Utf8PathBuf::from("/c/C.csproj"), descriptor(""));

        let target_paths = build_target_paths(&descriptors);
        assert_eq!(target_paths.len(), 1);
        assert_eq!(
            target_paths[&OutputPathKey::new(Utf8Path::new("/out/x.dll"))],
            Utf8PathBuf::from("/a/A.csproj")
        );
    }

    #[test]
    fn test_load_state_default() {
        assert_eq!(LoadState::default(), LoadState::Idle);
    }
}
