// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use ksubst::{
    config::ModeDefinition, git::GitWorkspace, Classification, ConnectionId, Depth, FileHandle,
    InclusionPolicy, Mode, ModeSession, NeverCancel, ProviderBatch, ResourceRef, Severity,
    StatusAggregator,
};

use anyhow::Result;
use git2::{Repository, RepositoryInitOptions};
use pretty_assertions::assert_eq;
use sealed_test::prelude::*;
use std::{
    collections::BTreeMap,
    env::set_current_dir,
    fs::{canonicalize, create_dir, create_dir_all, read_to_string, write},
    path::{Path, PathBuf},
};

pub(crate) struct RepoFixture {
    repo: Repository,
    root: PathBuf,
}

impl RepoFixture {
    pub(crate) fn new(path: impl AsRef<Path>) -> Result<Self> {
        let mut opts = RepositoryInitOptions::new();
        opts.initial_head("main");
        let repo = Repository::init_opts(path.as_ref(), &opts)?;

        // INVARIANT: Always provide valid name and email.
        //   - Git will complain if this is not set in CI/CD environments.
        let mut config = repo.config()?;
        config.set_str("user.name", "John Doe")?;
        config.set_str("user.email", "john@doe.com")?;

        let root = canonicalize(path.as_ref())?;
        Ok(Self { repo, root })
    }

    pub(crate) fn root(&self) -> &Path {
        self.root.as_path()
    }

    pub(crate) fn write(&self, filename: impl AsRef<Path>, contents: impl AsRef<str>) -> Result<()> {
        let path = self.root.join(filename);
        if let Some(parent) = path.parent() {
            create_dir_all(parent)?;
        }
        write(path, contents.as_ref())?;
        Ok(())
    }

    pub(crate) fn stage(&self, filename: impl AsRef<Path>, contents: impl AsRef<str>) -> Result<()> {
        self.write(filename.as_ref(), contents)?;
        let mut index = self.repo.index()?;
        index.add_path(filename.as_ref())?;
        index.write()?;
        Ok(())
    }

    pub(crate) fn unstage(&self, filename: impl AsRef<Path>) -> Result<()> {
        let mut index = self.repo.index()?;
        index.remove_path(filename.as_ref())?;
        index.write()?;
        Ok(())
    }

    pub(crate) fn stage_and_commit(&self, filename: impl AsRef<Path>, contents: impl AsRef<str>) -> Result<()> {
        self.stage(filename.as_ref(), contents)?;

        // INVARIANT: Always use new tree produced by index after staging new entry.
        let mut index = self.repo.index()?;
        let tree_oid = index.write_tree()?;
        let tree = self.repo.find_tree(tree_oid)?;

        // INVARIANT: Always determine latest parent commits to append to.
        let signature = self.repo.signature()?;
        let mut parents = Vec::new();
        if let Some(parent) = self.repo.head().ok().map(|head| head.target().unwrap()) {
            parents.push(self.repo.find_commit(parent)?);
        }
        let parents = parents.iter().collect::<Vec<_>>();

        // INVARIANT: Commit to HEAD by appending to obtained parent commits.
        self.repo.commit(
            Some("HEAD"),
            &signature,
            &signature,
            format!("chore: add {:?}", filename.as_ref()).as_ref(),
            &tree,
            &parents,
        )?;

        Ok(())
    }
}

fn open_session(workspace: &GitWorkspace) -> Result<ModeSession<'_, GitWorkspace>> {
    Ok(ModeSession::new(workspace, ModeDefinition::default().mode_patterns()?))
}

fn single_batch(workspace: &GitWorkspace, file: impl Into<PathBuf>, mode: Mode) -> ProviderBatch {
    let connection = workspace.connections().next().cloned().unwrap();
    let mut batch = ProviderBatch::new(connection.clone());
    batch.entries.insert(FileHandle::new(file, connection), mode);
    batch
}

#[sealed_test]
fn classify_files_by_repository_status() -> Result<()> {
    let fixture = RepoFixture::new("repo")?;
    fixture.stage_and_commit("clean.txt", "clean\n")?;
    fixture.stage_and_commit("edit.c", "int main;\n")?;
    fixture.stage_and_commit("gone.c", "int gone;\n")?;
    fixture.write("edit.c", "int main(void);\n")?;
    fixture.stage("new.png", "not really a png")?;
    fixture.unstage("gone.c")?;
    fixture.write("scratch.c", "untracked\n")?;

    let workspace = GitWorkspace::discover([fixture.root()])?;
    let session = open_session(&workspace)?;
    let scan = session.scan(&[ResourceRef::new(fixture.root())], Depth::Infinite, None);
    assert!(scan.problems.is_empty(), "{:?}", scan.problems);

    let result = scan
        .change_set
        .iter()
        .map(|record| {
            let name = record.file.path().strip_prefix(fixture.root()).unwrap();
            (
                name.display().to_string(),
                (record.classification, record.current_mode, record.proposed_mode),
            )
        })
        .collect::<BTreeMap<_, _>>();
    let expect = BTreeMap::from([
        ("clean.txt".to_string(), (Classification::Unchanged, Mode::TextWithExpansion, Mode::TextWithExpansion)),
        ("edit.c".to_string(), (Classification::Changed, Mode::TextWithExpansion, Mode::TextWithExpansion)),
        ("gone.c".to_string(), (Classification::Skip, Mode::TextWithExpansion, Mode::TextWithExpansion)),
        ("new.png".to_string(), (Classification::Added, Mode::TextWithExpansion, Mode::Binary)),
    ]);
    assert_eq!(result, expect);

    Ok(())
}

#[sealed_test]
fn apply_records_modes_and_rescan_is_noop() -> Result<()> {
    let fixture = RepoFixture::new("repo")?;
    fixture.stage_and_commit("README", "hello\n")?;
    fixture.stage("assets/logo.png", "not really a png")?;
    fixture.stage("assets/notes.txt", "notes\n")?;
    let roots = [ResourceRef::new(fixture.root().join("assets"))];

    let workspace = GitWorkspace::discover([fixture.root()])?;
    let session = open_session(&workspace)?;
    let mut scan = session.scan(&roots, Depth::Infinite, None);
    InclusionPolicy::default().apply(&mut scan.change_set);
    assert_eq!(scan.change_set.actionable_records().len(), 1);

    let mut applier = |batch: &ProviderBatch| workspace.apply(batch);
    let outcome = session.apply(&scan.change_set, &mut applier, &NeverCancel);
    assert_eq!(outcome.severity, Severity::Ok, "{}", outcome.message());
    assert_eq!(
        read_to_string(fixture.root().join(".gitattributes"))?,
        "/assets/logo.png ksubst=kb -text\n"
    );

    let workspace = GitWorkspace::discover([fixture.root()])?;
    let session = open_session(&workspace)?;
    let mut scan = session.scan(&roots, Depth::Infinite, None);
    InclusionPolicy::new(true, true).apply(&mut scan.change_set);
    assert!(scan.change_set.actionable_records().is_empty());

    let logo = scan
        .change_set
        .iter()
        .find(|record| record.file.path().ends_with("logo.png"))
        .map(|record| record.current_mode);
    assert_eq!(logo, Some(Mode::Binary));

    Ok(())
}

#[sealed_test]
fn binary_to_text_keeps_foreign_rules_and_asks_for_renormalisation() -> Result<()> {
    let fixture = RepoFixture::new("repo")?;
    fixture.stage_and_commit(".gitattributes", "*.dat binary\n")?;
    fixture.stage_and_commit("data.dat", "a,b,c\n")?;
    let roots = [ResourceRef::new(fixture.root().join("data.dat"))];

    let workspace = GitWorkspace::discover([fixture.root()])?;
    let session = open_session(&workspace)?;
    let mut scan = session.scan(&roots, Depth::Zero, Some(Mode::Text));
    let record = scan.change_set.iter().next().cloned();
    assert_eq!(
        record.map(|record| (record.classification, record.current_mode)),
        Some((Classification::Unchanged, Mode::Binary))
    );

    InclusionPolicy::default().apply(&mut scan.change_set);
    assert!(scan.change_set.actionable_records().is_empty());
    InclusionPolicy::new(true, false).apply(&mut scan.change_set);

    let mut applier = |batch: &ProviderBatch| workspace.apply(batch);
    let outcome = session.apply(&scan.change_set, &mut applier, &NeverCancel);
    assert_eq!(outcome.severity, Severity::Warning);
    assert!(outcome.message().contains("renormalise"), "{}", outcome.message());
    assert_eq!(
        read_to_string(fixture.root().join(".gitattributes"))?,
        "*.dat binary\n/data.dat ksubst=ko text\n"
    );

    Ok(())
}

#[sealed_test]
fn selection_spanning_repositories_is_batched_per_repository() -> Result<()> {
    let first = RepoFixture::new("first")?;
    let second = RepoFixture::new("second")?;
    first.stage("a.png", "png")?;
    second.stage("b.png", "png")?;

    let workspace = GitWorkspace::discover([first.root(), second.root()])?;
    assert_eq!(workspace.connections().count(), 2);

    let session = open_session(&workspace)?;
    let roots = [
        ResourceRef::new(first.root()),
        ResourceRef::new(second.root()),
        ResourceRef::new(first.root().join("a.png")),
    ];
    let scan = session.scan(&roots, Depth::Infinite, None);
    assert_eq!(scan.change_set.len(), 2);
    assert_eq!(session.batches(&scan.change_set).len(), 2);

    Ok(())
}

#[sealed_test]
fn unset_ksubst_attribute_falls_back_to_text_attribute() -> Result<()> {
    let fixture = RepoFixture::new("repo")?;
    fixture.stage_and_commit(".gitattributes", "*.bin -ksubst -text\n*.txt -ksubst\n")?;
    fixture.stage_and_commit("blob.bin", "blob")?;
    fixture.stage_and_commit("notes.txt", "notes\n")?;

    let workspace = GitWorkspace::discover([fixture.root()])?;
    let session = open_session(&workspace)?;
    let roots = [
        ResourceRef::new(fixture.root().join("blob.bin")),
        ResourceRef::new(fixture.root().join("notes.txt")),
    ];
    let scan = session.scan(&roots, Depth::Zero, None);
    assert!(scan.problems.is_empty(), "{:?}", scan.problems);

    let modes = scan
        .change_set
        .iter()
        .map(|record| record.current_mode)
        .collect::<Vec<_>>();
    assert_eq!(modes, vec![Mode::Binary, Mode::TextWithExpansion]);

    Ok(())
}

#[sealed_test]
fn relative_selection_finds_its_repository() -> Result<()> {
    let fixture = RepoFixture::new("repo")?;
    fixture.stage("a.png", "png")?;
    set_current_dir(fixture.root())?;

    let workspace = GitWorkspace::discover(["."])?;
    let session = open_session(&workspace)?;
    let roots = [ResourceRef::new("."), ResourceRef::new("a.png"), ResourceRef::new("./a.png")];
    let scan = session.scan(&roots, Depth::Infinite, None);
    assert!(scan.problems.is_empty(), "{:?}", scan.problems);

    let files = scan
        .change_set
        .iter()
        .map(|record| record.file.path().to_path_buf())
        .collect::<Vec<_>>();
    assert_eq!(files, vec![fixture.root().join("a.png")]);

    Ok(())
}

#[sealed_test]
fn nested_attributes_overriding_new_mode_is_an_error() -> Result<()> {
    let fixture = RepoFixture::new("repo")?;
    fixture.stage_and_commit("sub/.gitattributes", "* ksubst=kkv text\n")?;
    fixture.stage("sub/a.dat", "a,b,c\n")?;
    let roots = [ResourceRef::new(fixture.root().join("sub/a.dat"))];

    let workspace = GitWorkspace::discover([fixture.root()])?;
    let session = open_session(&workspace)?;
    let scan = session.scan(&roots, Depth::Zero, Some(Mode::Binary));
    assert_eq!(scan.change_set.actionable_records().len(), 1);

    let mut applier = |batch: &ProviderBatch| workspace.apply(batch);
    let outcome = session.apply(&scan.change_set, &mut applier, &NeverCancel);
    assert_eq!(outcome.severity, Severity::Error);
    assert!(outcome.message().contains("sub/a.dat stays -kkv"), "{}", outcome.message());

    Ok(())
}

#[sealed_test]
fn apply_to_unknown_repository_is_an_error() -> Result<()> {
    let fixture = RepoFixture::new("repo")?;
    let workspace = GitWorkspace::discover([fixture.root()])?;

    let batch = ProviderBatch::new(ConnectionId::new("nowhere"));
    let status = workspace.apply(&batch);
    assert_eq!(status.severity, Severity::Error);
    assert!(!status.server_error);
    assert_eq!(status.message, "nowhere is not an open repository");

    Ok(())
}

#[sealed_test]
fn unreadable_attributes_file_is_an_error() -> Result<()> {
    let fixture = RepoFixture::new("repo")?;
    fixture.stage("logo.png", "png")?;
    create_dir(fixture.root().join(".gitattributes"))?;

    let workspace = GitWorkspace::discover([fixture.root()])?;
    let batch = single_batch(&workspace, fixture.root().join("logo.png"), Mode::Binary);
    let mut applier = |batch: &ProviderBatch| workspace.apply(batch);
    let outcome = StatusAggregator::new(&NeverCancel).apply(&[batch], &mut applier);

    assert_eq!(outcome.severity, Severity::Error);
    let status = outcome.per_connection.values().next().cloned().unwrap();
    assert!(!status.server_error);
    assert_eq!(outcome.message(), status.message);
    assert!(
        outcome.message().contains("failed to read from attributes file"),
        "{}",
        outcome.message()
    );

    Ok(())
}

#[sealed_test]
fn locked_index_is_a_server_error() -> Result<()> {
    let fixture = RepoFixture::new("repo")?;
    fixture.stage("logo.png", "png")?;
    write(fixture.root().join(".git/index.lock"), "")?;

    let workspace = GitWorkspace::discover([fixture.root()])?;
    let batch = single_batch(&workspace, fixture.root().join("logo.png"), Mode::Binary);
    let mut applier = |batch: &ProviderBatch| workspace.apply(batch);
    let outcome = StatusAggregator::new(&NeverCancel).apply(&[batch], &mut applier);

    assert_eq!(outcome.severity, Severity::Error);
    let status = outcome.per_connection.values().next().cloned().unwrap();
    assert!(status.server_error);
    assert_eq!(outcome.message(), status.message);
    assert!(outcome.message().starts_with(fixture.root().to_str().unwrap()));

    Ok(())
}
