//! Builder tests over complete workspaces

mod common;

use common::write_file;
use kiln_build::{BuildError, Builder, NodeKind, SettingsOverrides};
use kiln_config::ConfigLoader;
use std::path::Path;
use tempfile::TempDir;

const MANIFEST: &str = r#"
[workspace]
name = "tiny"

[codegen]
metaprogram = ["types/type_metadata.cpp"]
descriptors = "types/types"
output = "types/generated"

[[project]]
name = "engine"
root = "engine"
kind = "shared"
include_dirs = ["engine/src", "types/generated"]
defines = ["TEXPORT"]
pch = "src/pch.h"
generated = true

[[project]]
name = "game"
root = "game"
kind = "executable"
dependencies = ["engine"]
run_args = ["res/"]
"#;

fn workspace() -> TempDir {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    write_file(root, "kiln.toml", MANIFEST);
    write_file(root, "types/type_metadata.cpp", "int main() {}\n");
    write_file(root, "types/types/transform.type", "");
    write_file(root, "types/types/mesh.type", "");
    write_file(root, "engine/src/pch.h", "#pragma once\n");
    write_file(root, "engine/src/engine.cpp", "");
    write_file(root, "game/src/main.cpp", "");
    dir
}

fn builder(root: &Path, executor: &Path) -> Builder {
    let config = ConfigLoader::new()
        .with_global_config_path(root.join("no-global.toml"))
        .load_from_directory(root)
        .unwrap();
    let overrides = SettingsOverrides {
        executor: Some(executor.to_path_buf()),
        ..Default::default()
    };
    Builder::from_config(&config, &overrides)
        .unwrap()
        .with_echo(false)
}

#[test]
fn test_from_config_resolves_projects() {
    let dir = workspace();
    let builder = builder(dir.path(), Path::new("ninja"));

    assert_eq!(builder.settings().root, dir.path());
    assert_eq!(builder.settings().bin_dir, dir.path().join("bin"));
    assert!(builder.projects().needs_codegen());
    assert_eq!(
        builder.projects().codegen().unwrap().config().output_dir,
        dir.path().join("types/generated")
    );
}

#[test]
fn test_regen_needs_codegen_outputs() {
    let dir = workspace();
    let builder = builder(dir.path(), Path::new("ninja"));

    // engine compiles generated sources that do not exist yet
    assert!(matches!(
        builder.regen(Some("engine")),
        Err(BuildError::MissingArtifact { .. })
    ));
    assert!(builder.regen(Some("game")).unwrap()[0].1.was_written());
}

#[test]
fn test_unknown_target() {
    let dir = workspace();
    let builder = builder(dir.path(), Path::new("ninja"));
    assert!(matches!(
        builder.build(Some("editor")),
        Err(BuildError::Configuration(_))
    ));
}

#[cfg(unix)]
mod with_executor {
    use super::*;
    use crate::common::{fake_ninja, invocations};
    use kiln_build::{CodegenStage, WriteReason, WriteResult};
    use std::fs;

    #[test]
    fn test_full_build() {
        let dir = workspace();
        let ninja = fake_ninja(dir.path());
        let builder = builder(dir.path(), &ninja);

        let outcome = builder.build(None).unwrap();

        let codegen = outcome.codegen.unwrap();
        assert_eq!(codegen.generated.len(), 2);
        assert_eq!(outcome.projects.len(), 2);
        assert_eq!(outcome.stats.projects_built, 2);
        assert_eq!(outcome.stats.descriptions_written, 4);
        // metaprogram, codegen, engine, game
        assert_eq!(invocations(dir.path()).len(), 4);

        assert!(dir.path().join("bin/engine.so").is_file());
        assert!(dir.path().join("bin/game.out").is_file());

        let engine = builder.projects().project("engine").unwrap();
        let graph = builder
            .projects()
            .plan_project(engine, builder.settings(), true)
            .unwrap();
        assert_eq!(graph.nodes_of_kind(NodeKind::CodegenCompile).count(), 2);
        assert_eq!(graph.nodes_of_kind(NodeKind::Pch).count(), 1);
    }

    #[test]
    fn test_second_build_writes_nothing() {
        let dir = workspace();
        let ninja = fake_ninja(dir.path());
        let builder = builder(dir.path(), &ninja);

        builder.build(None).unwrap();
        let outcome = builder.build(None).unwrap();
        assert_eq!(outcome.stats.descriptions_written, 0);
    }

    #[test]
    fn test_force_rewrites_everything() {
        let dir = workspace();
        let ninja = fake_ninja(dir.path());

        builder(dir.path(), &ninja).build(None).unwrap();
        let outcome = builder(dir.path(), &ninja)
            .with_force(true)
            .build(None)
            .unwrap();
        assert!(outcome
            .projects
            .iter()
            .all(|r| r.write == WriteResult::Written(WriteReason::Forced)));
    }

    #[test]
    fn test_codegen_norun() {
        let dir = workspace();
        let ninja = fake_ninja(dir.path());
        let builder = builder(dir.path(), &ninja);

        let report = builder.codegen(CodegenStage::MetaprogramOnly).unwrap();
        assert!(report.generated.is_empty());
        assert!(!dir.path().join("types/generated").exists());
    }

    #[test]
    fn test_clean_and_pch() {
        let dir = workspace();
        let ninja = fake_ninja(dir.path());
        let builder = builder(dir.path(), &ninja);

        assert!(builder.clean(None).unwrap().is_empty());
        builder.build(None).unwrap();

        let pchs = builder.pch(None).unwrap();
        assert_eq!(pchs, vec![dir.path().join("engine/build/pch.h.gch")]);

        let cleaned = builder.clean(None).unwrap();
        assert_eq!(cleaned, vec!["codegen", "engine", "game"]);
        let log = invocations(dir.path());
        assert!(log.last().unwrap().ends_with("-t clean"));
        assert!(log.iter().any(|l| l.ends_with("pch.h.gch ")));
    }

    #[test]
    fn test_clean_covers_codegen_stages() {
        let dir = workspace();
        let ninja = fake_ninja(dir.path());
        let builder = builder(dir.path(), &ninja);
        builder.build(None).unwrap();

        let pipeline = builder.projects().codegen().unwrap();
        let descriptions = [
            pipeline.metaprogram_description(),
            pipeline.codegen_description(),
        ];
        assert!(descriptions.iter().all(|d| d.is_file()));

        builder.clean(None).unwrap();

        let log = invocations(dir.path());
        for description in &descriptions {
            assert!(!description.exists());
            let dir = description.parent().unwrap().display().to_string();
            assert!(log.contains(&format!("{} -t clean", dir)));
        }
        assert!(!dir.path().join("types/generated").exists());
    }

    #[test]
    fn test_clean_one_project_leaves_codegen() {
        let dir = workspace();
        let ninja = fake_ninja(dir.path());
        let builder = builder(dir.path(), &ninja);
        builder.build(None).unwrap();

        assert_eq!(builder.clean(Some("game")).unwrap(), vec!["game"]);
        assert!(dir.path().join("types/generated").is_dir());
    }

    #[test]
    fn test_run_uses_published_artifact() {
        use std::os::unix::fs::PermissionsExt;

        let dir = workspace();
        let ninja = fake_ninja(dir.path());
        let builder = builder(dir.path(), &ninja);
        builder.build(None).unwrap();

        // Replace the touched artifact with a script that records its arguments
        let program = dir.path().join("bin/game.out");
        fs::write(&program, "#!/bin/sh\necho \"$@\" > ran.txt\n").unwrap();
        fs::set_permissions(&program, fs::Permissions::from_mode(0o755)).unwrap();

        assert_eq!(builder.run(None).unwrap(), program);
        let ran = fs::read_to_string(dir.path().join("bin/ran.txt")).unwrap();
        assert_eq!(ran.trim(), "res/");
    }
}
