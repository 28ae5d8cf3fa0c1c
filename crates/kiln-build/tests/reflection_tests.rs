//! Staged codegen tests

mod common;

use common::write_file;
use kiln_build::{
    BuildError, CodegenConfig, CodegenStage, GraphWriter, NodeKind, ReflectionPipeline,
};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn pipeline(root: &Path) -> ReflectionPipeline {
    ReflectionPipeline::new(CodegenConfig {
        name: "type_metadata".to_string(),
        metaprogram: vec![root.join("types/type_metadata.cpp")],
        descriptor_root: root.join("types/types"),
        extension: "type".to_string(),
        output_dir: root.join("types/generated"),
        build_dir: root.join("types/build"),
    })
}

fn workspace(descriptors: &[&str]) -> TempDir {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "types/type_metadata.cpp", "int main() {}\n");
    for descriptor in descriptors {
        write_file(dir.path(), &format!("types/types/{}", descriptor), "");
    }
    dir
}

#[test]
fn test_stage_b_refuses_without_generator() {
    let dir = workspace(&["a.type"]);
    let pipeline = pipeline(dir.path());
    let generator = dir.path().join("types/build/metaprogram/type_metadata.out");

    match pipeline.codegen_graph(&generator) {
        Err(BuildError::MissingArtifact { artifact, stage }) => {
            assert_eq!(artifact, generator);
            assert_eq!(stage, "metaprogram");
        }
        other => panic!("Expected MissingArtifact, got {:?}", other),
    }
}

#[test]
fn test_one_run_per_descriptor() {
    let dir = workspace(&["a.type", "b.type"]);
    let pipeline = pipeline(dir.path());
    let generator = write_file(dir.path(), "types/build/metaprogram/type_metadata.out", "");

    let graph = pipeline.codegen_graph(&generator).unwrap();
    let runs: Vec<_> = graph.nodes_of_kind(NodeKind::CodegenRun).collect();
    assert_eq!(runs.len(), 2);

    let gen = dir.path().join("types/generated");
    assert_eq!(runs[0].output, gen.join("a.type.cpp"));
    assert_eq!(runs[1].output, gen.join("b.type.cpp"));
    assert_eq!(runs[0].implicit_outputs, vec![gen.join("a.type.h")]);

    for run in &runs {
        assert_eq!(run.implicit_inputs, vec![generator.clone()]);
        // No run consumes another run's output
        assert!(run.inputs.iter().all(|i| graph.node(i).is_none()));
    }

    let terminal = graph.terminal().unwrap();
    assert_eq!(terminal.kind, NodeKind::Alias);
    assert_eq!(terminal.inputs.len(), 2);
}

#[test]
fn test_generator_protocol() {
    let dir = workspace(&["math/vec.type"]);
    let pipeline = pipeline(dir.path());
    let generator = write_file(dir.path(), "types/build/metaprogram/type_metadata.out", "");

    let graph = pipeline.codegen_graph(&generator).unwrap();
    let rule = graph.rule("generate").unwrap();
    assert_eq!(rule.command, "$generator -f $descriptor_dir $gendir $file");

    let run = graph.nodes_of_kind(NodeKind::CodegenRun).next().unwrap();
    assert_eq!(
        run.variables,
        vec![("file".to_string(), "math/vec.type".to_string())]
    );
    assert_eq!(
        run.output,
        dir.path().join("types/generated/math/vec.type.cpp")
    );
}

#[test]
fn test_missing_descriptor_root() {
    let dir = workspace(&[]);
    let pipeline = pipeline(dir.path());
    let generator = write_file(dir.path(), "types/build/metaprogram/type_metadata.out", "");

    assert!(matches!(
        pipeline.codegen_graph(&generator),
        Err(BuildError::SourceRootMissing { .. })
    ));
}

#[test]
fn test_generated_sources_require_stage_b() {
    let dir = workspace(&["a.type"]);
    assert!(matches!(
        pipeline(dir.path()).generated_sources(),
        Err(BuildError::MissingArtifact { .. })
    ));
}

#[test]
fn test_generated_sources_follow_current_descriptors() {
    let dir = workspace(&["a.type"]);
    let a = write_file(dir.path(), "types/generated/a.type.cpp", "");
    write_file(dir.path(), "types/generated/a.type.h", "");
    // Left behind by a descriptor that no longer exists
    write_file(dir.path(), "types/generated/gone.type.cpp", "");

    let sources: Vec<PathBuf> = pipeline(dir.path())
        .generated_sources()
        .unwrap()
        .into_iter()
        .map(|s| s.path)
        .collect();
    assert_eq!(sources, vec![a]);
}

#[test]
fn test_generated_sources_need_every_descriptor_generated() {
    let dir = workspace(&["a.type", "b.type"]);
    write_file(dir.path(), "types/generated/a.type.cpp", "");

    match pipeline(dir.path()).generated_sources() {
        Err(BuildError::MissingArtifact { artifact, stage }) => {
            assert_eq!(artifact, dir.path().join("types/generated/b.type.cpp"));
            assert_eq!(stage, "codegen");
        }
        other => panic!("Expected MissingArtifact, got {:?}", other),
    }
}

#[cfg(unix)]
mod with_executor {
    use super::*;
    use crate::common::{fake_ninja, invocations};
    use kiln_build::{BuildSettings, Executor, WriteResult};

    fn setup(dir: &Path) -> (BuildSettings, Executor) {
        let ninja = fake_ninja(dir);
        let settings = BuildSettings::for_root(dir).unwrap().with_executor(&ninja);
        (settings, Executor::new(ninja).with_echo(false))
    }

    #[test]
    fn test_full_pipeline() {
        let dir = workspace(&["a.type", "b.type"]);
        let (settings, executor) = setup(dir.path());
        let pipeline = pipeline(dir.path());
        let writer = GraphWriter::default();

        let report = pipeline
            .run(&settings, &executor, &writer, CodegenStage::Full, false)
            .unwrap();

        assert_eq!(report.generator, pipeline.generator_path(&settings));
        assert_eq!(report.generated.len(), 2);
        assert!(report.codegen_write.unwrap().was_written());
        assert_eq!(invocations(dir.path()).len(), 2);

        let generated: Vec<PathBuf> = pipeline
            .generated_sources()
            .unwrap()
            .into_iter()
            .map(|s| s.path)
            .collect();
        assert_eq!(generated, report.generated);
    }

    #[test]
    fn test_second_run_skips_writes() {
        let dir = workspace(&["a.type"]);
        let (settings, executor) = setup(dir.path());
        let pipeline = pipeline(dir.path());
        let writer = GraphWriter::default();

        pipeline
            .run(&settings, &executor, &writer, CodegenStage::Full, false)
            .unwrap();
        let report = pipeline
            .run(&settings, &executor, &writer, CodegenStage::Full, false)
            .unwrap();

        assert_eq!(report.metaprogram_write, WriteResult::Skipped);
        assert_eq!(report.codegen_write, Some(WriteResult::Skipped));
    }

    #[test]
    fn test_removed_descriptor_drops_its_outputs() {
        let dir = workspace(&["a.type", "b.type"]);
        let (settings, executor) = setup(dir.path());
        let pipeline = pipeline(dir.path());
        let writer = GraphWriter::default();

        pipeline
            .run(&settings, &executor, &writer, CodegenStage::Full, false)
            .unwrap();
        std::fs::remove_file(dir.path().join("types/types/b.type")).unwrap();
        let report = pipeline
            .run(&settings, &executor, &writer, CodegenStage::Full, false)
            .unwrap();

        let gen = dir.path().join("types/generated");
        assert_eq!(report.generated, vec![gen.join("a.type.cpp")]);
        assert!(!gen.join("b.type.cpp").exists());
        assert!(!gen.join("b.type.h").exists());

        let generated: Vec<PathBuf> = pipeline
            .generated_sources()
            .unwrap()
            .into_iter()
            .map(|s| s.path)
            .collect();
        assert_eq!(generated, report.generated);
    }

    #[test]
    fn test_clean_removes_both_stages() {
        let dir = workspace(&["a.type"]);
        let (settings, executor) = setup(dir.path());
        let pipeline = pipeline(dir.path());

        assert!(!pipeline.clean(&executor).unwrap());
        pipeline
            .run(&settings, &executor, &GraphWriter::default(), CodegenStage::Full, false)
            .unwrap();

        assert!(pipeline.clean(&executor).unwrap());
        assert!(!pipeline.codegen_description().exists());
        assert!(!pipeline.metaprogram_description().exists());
        assert!(!dir.path().join("types/generated").exists());

        let cleans = invocations(dir.path())
            .into_iter()
            .filter(|l| l.ends_with("-t clean"))
            .count();
        assert_eq!(cleans, 2);
    }

    #[test]
    fn test_metaprogram_only() {
        let dir = workspace(&["a.type"]);
        let (settings, executor) = setup(dir.path());
        let pipeline = pipeline(dir.path());

        let report = pipeline
            .run(
                &settings,
                &executor,
                &GraphWriter::default(),
                CodegenStage::MetaprogramOnly,
                false,
            )
            .unwrap();

        assert!(report.codegen_write.is_none());
        assert!(report.generator.is_file());
        assert!(!pipeline.codegen_description().exists());
        assert_eq!(invocations(dir.path()).len(), 1);
    }

    #[test]
    fn test_failed_metaprogram_build_stops_pipeline() {
        let dir = workspace(&["a.type"]);
        let (settings, _) = setup(dir.path());
        let pipeline = pipeline(dir.path());

        let result = pipeline.run(
            &settings,
            &Executor::new("false").with_echo(false),
            &GraphWriter::default(),
            CodegenStage::Full,
            false,
        );

        assert!(matches!(
            result,
            Err(BuildError::ExternalToolFailure { code: 1, .. })
        ));
        assert!(!pipeline.codegen_description().exists());
    }

    #[test]
    fn test_executor_that_builds_nothing() {
        let dir = workspace(&["a.type"]);
        let (settings, _) = setup(dir.path());
        let pipeline = pipeline(dir.path());

        let result = pipeline.run(
            &settings,
            &Executor::new("true").with_echo(false),
            &GraphWriter::default(),
            CodegenStage::Full,
            false,
        );

        match result {
            Err(BuildError::MissingArtifact { stage, .. }) => assert_eq!(stage, "metaprogram"),
            other => panic!("Expected MissingArtifact, got {:?}", other),
        }
    }
}
