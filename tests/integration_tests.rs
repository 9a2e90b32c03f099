//! 集成测试 - 脚本缓存的端到端场景

mod common;

use common::{cache_with_files, cache_with_roots, run_value, write};
use hotscript_workspace::cache::{CacheError, ResourceError};
use hotscript_workspace::lang::{Binding, CompileError, Value};
use hotscript_workspace::vfs::{Fault, MemoryFileSystem};
use hotscript_workspace::{Engine, EngineConfig};
use std::path::Path;
use std::sync::{Arc, Barrier};
use std::thread;

#[test]
fn test_touching_import_recompiles_importer_once() {
    let (fs, cache) = cache_with_files(&[
        ("a.hs", "import b; return b.value * 2;"),
        ("b.hs", "pub var value = 10;"),
    ]);

    assert_eq!(run_value(&cache, "a.hs"), Value::Int(20));
    assert_eq!(run_value(&cache, "a.hs"), Value::Int(20));
    assert_eq!(cache.stats().compilations, 1);

    write(&fs, "/scripts/b.hs", "pub var value = 21;");
    assert_eq!(run_value(&cache, "a.hs"), Value::Int(42));
    assert_eq!(run_value(&cache, "a.hs"), Value::Int(42));
    assert_eq!(cache.stats().compilations, 2);

    // 只改时间戳也算改变
    fs.touch(Path::new("/scripts/b.hs")).unwrap();
    assert!(!cache.is_fresh("a.hs"));
    run_value(&cache, "a.hs");
    assert_eq!(cache.stats().compilations, 3);
    assert_eq!(fs.open_handles(), 0);
}

#[test]
fn test_script_only_in_second_root() {
    let fs = MemoryFileSystem::new();
    write(&fs, "/r1/other.hs", "return 0;");
    write(&fs, "/r2/x.hs", r#"return "from r2";"#);
    let cache = cache_with_roots(&fs, &["/r1", "/r2"]);

    assert_eq!(run_value(&cache, "x.hs"), Value::from("from r2"));
    let entry = cache.entry("x.hs").unwrap();
    assert_eq!(entry.resource().root(), 1);
}

#[test]
fn test_concurrent_runs_compile_once() {
    let (_fs, cache) = cache_with_files(&[("y.hs", "var n = 0; while (n < 100) { n = n + 1; } return n;")]);
    let cache = Arc::new(cache);
    let barrier = Arc::new(Barrier::new(2));

    let workers: Vec<_> = (0..2)
        .map(|_| {
            let cache = Arc::clone(&cache);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                let output = cache.run("y.hs", &mut Binding::new()).unwrap();
                (output.value, cache.fetch("y.hs").unwrap())
            })
        })
        .collect();

    let results: Vec<_> = workers.into_iter().map(|w| w.join().unwrap()).collect();
    assert_eq!(cache.stats().compilations, 1);
    assert!(results.iter().all(|(value, _)| *value == Value::Int(100)));
    assert!(Arc::ptr_eq(&results[0].1, &results[1].1));
}

#[test]
fn test_missing_everywhere_lists_each_root() {
    let fs = MemoryFileSystem::new();
    write(&fs, "/r1/unrelated.hs", "return 1;");
    let cache = cache_with_roots(&fs, &["/r1", "/r2"]);

    let err = cache.fetch("z.hs").unwrap_err();
    match &err {
        CacheError::ResourceUnavailable(ResourceError::NotFound { name, attempts }) => {
            assert_eq!(name, "z.hs");
            let roots: Vec<_> = attempts.iter().map(|a| a.root.as_str()).collect();
            assert_eq!(roots, vec!["/r1", "/r2"]);
            assert!(attempts.iter().all(|a| a.reason.is_not_found()));
        }
        other => panic!("unexpected {:?}", other),
    }
    assert!(cache.entry("z.hs").is_none());
}

#[test]
fn test_failed_recompile_keeps_old_entry() {
    let (fs, cache) = cache_with_files(&[("w.hs", "return 1;")]);
    assert_eq!(run_value(&cache, "w.hs"), Value::Int(1));
    let before = cache.entry("w.hs").unwrap();

    write(&fs, "/scripts/w.hs", "return (1;");
    let err = cache.fetch("w.hs").unwrap_err();
    assert!(err.is_compile());
    assert!(matches!(
        err.cause::<CompileError>(),
        Some(CompileError::Parser { .. })
    ));

    let after = cache.entry("w.hs").unwrap();
    assert!(Arc::ptr_eq(&before, &after));
    assert!(!cache.is_fresh("w.hs"));

    // 修好之后恢复
    write(&fs, "/scripts/w.hs", "return 2;");
    assert_eq!(run_value(&cache, "w.hs"), Value::Int(2));
}

#[test]
fn test_handles_released_when_dependency_probe_fails() {
    let (fs, cache) = cache_with_files(&[
        ("main.hs", "import dep; return dep.x;"),
        ("dep.hs", "pub var x = 7;"),
    ]);
    assert_eq!(run_value(&cache, "main.hs"), Value::Int(7));

    fs.inject_fault(Path::new("/scripts/dep.hs"), Fault::Metadata);
    assert!(cache.fetch("main.hs").is_err());
    assert_eq!(fs.open_handles(), 0);

    fs.clear_faults();
    assert_eq!(run_value(&cache, "main.hs"), Value::Int(7));
    assert_eq!(fs.open_handles(), 0);
    assert_eq!(fs.leaked_handles(), 0);
}

#[test]
fn test_engine_over_native_directory() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("hello.hs"), r#"print "hi"; return arg;"#).unwrap();

    let config = EngineConfig::with_roots([dir.path().to_string_lossy().to_string()]);
    let engine = Engine::new(config).unwrap();
    let mut binding = Binding::new().with("arg", "there");
    let output = engine.run("hello.hs", &mut binding).unwrap();
    assert_eq!(output.stdout, vec!["hi".to_string()]);
    assert_eq!(output.value, Value::from("there"));
}

#[test]
fn test_deeply_nested_script_is_a_compile_error() {
    let (fs, cache) = cache_with_files(&[("deep.hs", "return 1;")]);
    assert_eq!(run_value(&cache, "deep.hs"), Value::Int(1));
    let before = cache.entry("deep.hs").unwrap();

    let nested = format!("return {}1{};", "(".repeat(50_000), ")".repeat(50_000));
    write(&fs, "/scripts/deep.hs", &nested);
    let err = cache.fetch("deep.hs").unwrap_err();
    assert!(err.is_compile());
    assert!(Arc::ptr_eq(&before, &cache.entry("deep.hs").unwrap()));
    assert_eq!(fs.open_handles(), 0);
}

#[test]
fn test_shadowed_dependency_probes_recorded_root() {
    let fs = MemoryFileSystem::new();
    write(&fs, "/r1/a.hs", "import b; return b.value;");
    write(&fs, "/r2/b.hs", "pub var value = 2;");
    let cache = cache_with_roots(&fs, &["/r1", "/r2"]);
    assert_eq!(run_value(&cache, "a.hs"), Value::Int(2));

    // 依赖按记录的资源探测，更高优先级根里的新文件不会触发重编译
    write(&fs, "/r1/b.hs", "pub var value = 1;");
    assert!(cache.is_fresh("a.hs"));
    assert_eq!(run_value(&cache, "a.hs"), Value::Int(2));

    cache.evict("a.hs");
    assert_eq!(run_value(&cache, "a.hs"), Value::Int(1));
}
