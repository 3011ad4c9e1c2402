//! Saving a development host's configuration and replaying it.

mod common;

use common::{settings, write, Calls, Relabel, Upper};
use recast_compiler::{CompilerRegistry, PluginDescriptor};
use recast_host::{CompilerHost, HostError, HostMode, HostSnapshot, SNAPSHOT_FILE};
use serde_json::json;

fn registry(upper: &Calls, tsc: &Calls) -> CompilerRegistry {
    CompilerRegistry::build([
        PluginDescriptor::standalone(Upper::new(upper)),
        PluginDescriptor::standalone(Relabel::new(
            "tsc",
            "text/typescript",
            "application/javascript",
            tsc,
        )),
    ])
}

#[tokio::test]
async fn read_only_host_replays_without_compilers() {
    let dir = tempfile::tempdir().unwrap();
    let files = [
        write(dir.path(), "a.lower", "hi"),
        write(dir.path(), "src/app.ts", "let a: number = 1;\n"),
        write(dir.path(), "vendor.min.lower", format!("{}\n", "x=1;".repeat(40))),
        write(dir.path(), "img/logo.png", [0x89, b'P', b'N', b'G', 0xff]),
    ];
    let upper = Calls::default();
    let tsc = Calls::default();

    let dev = CompilerHost::new(settings(dir.path()), registry(&upper, &tsc));
    let mut expected = Vec::new();
    for file in &files {
        expected.push(dev.compile(file).await.unwrap());
    }
    let saved = dev.save_configuration().await.unwrap();
    assert_eq!(saved, dev.cache_root().join(SNAPSHOT_FILE));
    assert_eq!((upper.get(), tsc.get()), (1, 1));

    let prod = CompilerHost::read_only_from_configuration(settings(dir.path()))
        .await
        .unwrap();
    assert_eq!(prod.mode(), HostMode::ReadOnly);
    assert!(prod.fingerprints().is_frozen());
    for (file, want) in files.iter().zip(&expected) {
        assert_eq!(&prod.compile(file).await.unwrap(), want);
    }
    assert_eq!((upper.get(), tsc.get()), (1, 1));
    assert_eq!(
        prod.compiler_for("text/x-lower").unwrap().identity(),
        dev.compiler_for("text/x-lower").unwrap().identity()
    );
}

#[tokio::test]
async fn replay_matches_paths_compiled_through_parent_components() {
    let dir = tempfile::tempdir().unwrap();
    let src = write(dir.path(), "a.lower", "hi");
    std::fs::create_dir_all(dir.path().join("src")).unwrap();
    let upper = Calls::default();

    let dev = CompilerHost::new(settings(dir.path()), registry(&upper, &Calls::default()));
    let compiled = dev
        .compile(&dir.path().join("src").join("..").join("a.lower"))
        .await
        .unwrap();
    dev.save_configuration().await.unwrap();

    let prod = CompilerHost::read_only_from_configuration(settings(dir.path()))
        .await
        .unwrap();
    assert_eq!(prod.compile(&src).await.unwrap(), compiled);
    assert_eq!(upper.get(), 1);
}

#[tokio::test]
async fn read_only_host_rejects_unknown_files() {
    let dir = tempfile::tempdir().unwrap();
    let known = write(dir.path(), "a.lower", "hi");
    let dev = CompilerHost::new(settings(dir.path()), registry(&Calls::default(), &Calls::default()));
    dev.compile(&known).await.unwrap();
    dev.save_configuration().await.unwrap();

    let fresh = write(dir.path(), "b.lower", "never compiled");
    let prod = CompilerHost::read_only_from_configuration(settings(dir.path()))
        .await
        .unwrap();
    let err = prod.compile(&fresh).await.unwrap_err();
    assert!(matches!(err, HostError::NotPrecompiled { .. }));
}

#[tokio::test]
async fn read_only_host_treats_missing_entries_as_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let src = write(dir.path(), "a.lower", "hi");
    let upper = Calls::default();
    let dev = CompilerHost::new(settings(dir.path()), registry(&upper, &Calls::default()));
    dev.compile(&src).await.unwrap();
    dev.save_configuration().await.unwrap();
    std::fs::remove_dir_all(dev.cache_for("text/x-lower").unwrap().root()).unwrap();

    let prod = CompilerHost::read_only_from_configuration(settings(dir.path()))
        .await
        .unwrap();
    let err = prod.compile(&src).await.unwrap_err();
    assert!(matches!(err, HostError::NotPrecompiled { .. }));
    assert_eq!(upper.get(), 1);
}

#[tokio::test]
async fn read_only_host_needs_a_saved_configuration() {
    let dir = tempfile::tempdir().unwrap();
    let err = CompilerHost::read_only_from_configuration(settings(dir.path()))
        .await
        .unwrap_err();
    assert!(matches!(err, HostError::Io { .. }));
}

#[tokio::test]
async fn development_resumes_with_saved_fingerprints() {
    let dir = tempfile::tempdir().unwrap();
    let src = write(dir.path(), "a.lower", "hi");
    let other = write(dir.path(), "app.ts", "let b = 2;\n");
    let upper = Calls::default();
    let tsc = Calls::default();

    let first = CompilerHost::new(settings(dir.path()), registry(&upper, &tsc));
    first.compile(&src).await.unwrap();
    first.compile(&other).await.unwrap();
    first.save_configuration().await.unwrap();

    let resumed = CompilerHost::from_configuration(settings(dir.path()), registry(&upper, &tsc))
        .await
        .unwrap();
    assert_eq!(resumed.mode(), HostMode::Development);
    assert_eq!(resumed.fingerprints().len(), 2);
    assert!(!resumed.fingerprints().is_frozen());
    resumed.compile(&src).await.unwrap();
    resumed.compile(&other).await.unwrap();
    assert_eq!((upper.get(), tsc.get()), (1, 1));

    let new_file = write(dir.path(), "b.lower", "new");
    assert_eq!(resumed.compile(&new_file).await.unwrap().code_str(), Some("NEW"));
    assert_eq!(upper.get(), 2);
}

#[tokio::test]
async fn resumed_option_change_only_cools_that_compiler() {
    let dir = tempfile::tempdir().unwrap();
    let src = write(dir.path(), "a.lower", "hi");
    let other = write(dir.path(), "app.ts", "let b = 2;\n");
    let upper = Calls::default();
    let tsc = Calls::default();

    let first = CompilerHost::new(settings(dir.path()), registry(&upper, &tsc));
    first.compile(&src).await.unwrap();
    first.compile(&other).await.unwrap();
    first.save_configuration().await.unwrap();

    let changed = CompilerRegistry::build([
        PluginDescriptor::standalone(Upper::with_options(&upper, json!({"loud": true}))),
        PluginDescriptor::standalone(Relabel::new(
            "tsc",
            "text/typescript",
            "application/javascript",
            &tsc,
        )),
    ]);
    let resumed = CompilerHost::from_configuration(settings(dir.path()), changed)
        .await
        .unwrap();
    resumed.compile(&src).await.unwrap();
    resumed.compile(&other).await.unwrap();
    assert_eq!((upper.get(), tsc.get()), (2, 1));
}

#[tokio::test]
async fn snapshot_records_routed_identities() {
    let dir = tempfile::tempdir().unwrap();
    let host = CompilerHost::new(
        settings(dir.path()),
        registry(&Calls::default(), &Calls::default()),
    );
    host.save_configuration().await.unwrap();

    let snapshot = HostSnapshot::load(host.cache_root()).await.unwrap();
    assert_eq!(
        snapshot.compilers.keys().collect::<Vec<_>>(),
        vec!["text/typescript", "text/x-lower"]
    );
    let upper = &snapshot.compilers["text/x-lower"];
    assert_eq!(upper.name, "upper");
    assert_eq!(upper.compiler_version, "1.0.0");
    assert_eq!(upper.input_mime_types, vec!["text/x-lower"]);
    assert_eq!(snapshot.passthrough.name, "passthrough");
}

#[test]
fn blocking_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let src = write(dir.path(), "a.lower", "hi");
    let upper = Calls::default();

    let dev = CompilerHost::new(settings(dir.path()), registry(&upper, &Calls::default()));
    let compiled = dev.compile_blocking(&src).unwrap();
    dev.save_configuration_blocking().unwrap();

    let prod = CompilerHost::read_only_from_configuration_blocking(settings(dir.path())).unwrap();
    assert_eq!(prod.compile_blocking(&src).unwrap(), compiled);

    let resumed = CompilerHost::from_configuration_blocking(
        settings(dir.path()),
        registry(&upper, &Calls::default()),
    )
    .unwrap();
    assert_eq!(resumed.compile_blocking(&src).unwrap(), compiled);
    assert_eq!(upper.get(), 1);
}
